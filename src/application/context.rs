//! Cancellation and deadline propagation for a single inbound call.
//!
//! A [`CallContext`] is cheap to clone and is handed to every remote call made
//! on behalf of one request. It ends when any of its cancellation signals fires
//! or when its deadline passes, whichever comes first.

use std::future::Future;
use std::time::Duration;

use futures::future::select_all;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::domain::errors::Interrupt;

#[derive(Debug, Clone)]
pub struct CallContext {
    deadline: Option<Instant>,
    signals: Vec<watch::Receiver<bool>>,
}

/// Fires the cancellation signal of the context it was created with.
/// Dropping it without calling [`CancelHandle::cancel`] leaves the context live.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl CallContext {
    /// A context that never ends on its own.
    pub fn background() -> Self {
        Self {
            deadline: None,
            signals: Vec::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().with_deadline(Instant::now() + timeout)
    }

    pub fn cancellable() -> (Self, CancelHandle) {
        Self::background().child()
    }

    /// Keeps the earlier of the current deadline and `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// A context that ends when `self` ends or when the returned handle fires.
    pub fn child(&self) -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        let mut signals = self.signals.clone();
        signals.push(receiver);
        (
            Self {
                deadline: self.deadline,
                signals,
            },
            CancelHandle { sender },
        )
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking check, suitable before starting new work.
    pub fn interrupted(&self) -> Option<Interrupt> {
        if self.signals.iter().any(|rx| *rx.borrow()) {
            return Some(Interrupt::Cancelled);
        }
        match self.deadline {
            Some(at) if Instant::now() >= at => Some(Interrupt::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context has ended.
    pub async fn done(&self) -> Interrupt {
        let cancelled = wait_any(self.signals.clone());
        match self.deadline {
            Some(at) => tokio::select! {
                _ = cancelled => Interrupt::Cancelled,
                _ = tokio::time::sleep_until(at) => Interrupt::DeadlineExceeded,
            },
            None => {
                cancelled.await;
                Interrupt::Cancelled
            }
        }
    }

    /// Drives `fut` unless the context ends first, in which case `fut` is dropped.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupt>
    where
        F: Future,
    {
        if let Some(interrupt) = self.interrupted() {
            return Err(interrupt);
        }
        tokio::select! {
            biased;
            interrupt = self.done() => Err(interrupt),
            output = fut => Ok(output),
        }
    }
}

async fn wait_any(signals: Vec<watch::Receiver<bool>>) {
    if signals.is_empty() {
        return std::future::pending().await;
    }
    let waits = signals.into_iter().map(|rx| Box::pin(wait_for_signal(rx)));
    select_all(waits).await;
}

async fn wait_for_signal(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        // A dropped handle can no longer cancel.
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}
