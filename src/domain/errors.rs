use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use super::order::StockAdjustment;

/// Why a call context ended before the work it guarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupt {
    #[error("call cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Failure reported by a remote capability (user service, catalog).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("not found")]
    NotFound,
    #[error("insufficient stock (available {available})")]
    InsufficientStock { available: i32 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("call cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl From<Interrupt> for RemoteError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Cancelled => RemoteError::Cancelled,
            Interrupt::DeadlineExceeded => RemoteError::DeadlineExceeded,
        }
    }
}

/// Cause of a failed storage call, shared so the error stays `Clone`.
pub type StoreCause = Arc<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("order not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[source] StoreCause),
    #[error("storage call interrupted: {0}")]
    Interrupted(Interrupt),
}

impl StoreError {
    pub fn database<E>(cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Database(Arc::new(cause))
    }

    /// A database failure with no underlying error value.
    pub fn other(message: impl Into<String>) -> Self {
        let cause: Box<dyn std::error::Error + Send + Sync> = message.into().into();
        StoreError::Database(Arc::from(cause))
    }
}

/// The single typed failure returned by every order operation.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("invalid order data: {0}")]
    InvalidInput(String),

    #[error("user validation failed for user {user_id}: {source}")]
    UserValidationFailed {
        user_id: String,
        #[source]
        source: RemoteError,
    },

    #[error("failed to fetch product details for product {product_id}: {source}")]
    ProductFetchFailed {
        product_id: String,
        #[source]
        source: RemoteError,
    },

    #[error(
        "insufficient stock for product {product_id} (requested {requested}, available {available})"
    )]
    InsufficientStockForOrder {
        product_id: String,
        requested: i32,
        available: i32,
    },

    /// Stock commits in `applied` went through before the failing one and
    /// were not reverted.
    #[error("failed to update stock for product {product_id}: {source}; manual stock correction might be needed")]
    ProductStockUpdateFailed {
        product_id: String,
        #[source]
        source: RemoteError,
        applied: Vec<StockAdjustment>,
    },

    #[error("order storage failed: {0}")]
    Storage(#[source] StoreError),

    #[error("order {0} not found")]
    OrderNotFound(Uuid),
}

impl OrderError {
    fn remote_cause(&self) -> Option<&RemoteError> {
        match self {
            OrderError::UserValidationFailed { source, .. }
            | OrderError::ProductFetchFailed { source, .. }
            | OrderError::ProductStockUpdateFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// True when the wrapped remote cause says the entity does not exist.
    pub fn is_not_found_cause(&self) -> bool {
        matches!(self.remote_cause(), Some(RemoteError::NotFound))
    }

    /// True when the wrapped remote cause is a transport failure rather than
    /// an answer from the remote side.
    pub fn is_transport_cause(&self) -> bool {
        matches!(self.remote_cause(), Some(RemoteError::Transport(_)))
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(
            self.remote_cause(),
            Some(RemoteError::Cancelled | RemoteError::DeadlineExceeded)
        ) || matches!(self, OrderError::Storage(StoreError::Interrupted(_)))
    }
}
