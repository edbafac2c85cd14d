//! In-process adapters for every port.
//!
//! They keep their state behind a single lock, record the calls made to them,
//! and can be told to fail, which makes them the standard doubles in tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::{RemoteError, StoreError};
use crate::domain::order::{NewOrder, Order, OrderStatus, ProductSnapshot, StockAdjustment};
use crate::domain::ports::{Catalog, OrderStore, UserValidator};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Users ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct UserState {
    users: HashSet<String>,
    lookups: Vec<String>,
    failure: Option<RemoteError>,
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    state: Mutex<UserState>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user_id: impl Into<String>) -> Self {
        lock(&self.state).users.insert(user_id.into());
        self
    }

    /// Every lookup fails with `error` until cleared.
    pub fn fail_with(&self, error: Option<RemoteError>) {
        lock(&self.state).failure = error;
    }

    pub fn lookups(&self) -> Vec<String> {
        lock(&self.state).lookups.clone()
    }
}

#[async_trait]
impl UserValidator for InMemoryUserDirectory {
    async fn get_user(&self, user_id: &str) -> Result<(), RemoteError> {
        let mut state = lock(&self.state);
        state.lookups.push(user_id.to_string());
        if let Some(error) = state.failure.clone() {
            return Err(error);
        }
        if state.users.contains(user_id) {
            Ok(())
        } else {
            Err(RemoteError::NotFound)
        }
    }
}

// ── Catalog ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct CatalogState {
    products: HashMap<String, ProductSnapshot>,
    fetches: Vec<String>,
    adjustments: Vec<StockAdjustment>,
    fetch_failures: HashMap<String, RemoteError>,
    adjust_failures: HashMap<String, RemoteError>,
    fetch_delays: HashMap<String, Duration>,
    adjust_delays: HashMap<String, Duration>,
}

/// Stock adjustments are applied under the catalog lock, so concurrent
/// adjustments of one product serialise and stock never goes negative.
#[derive(Default)]
pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(
        self,
        product_id: impl Into<String>,
        price: BigDecimal,
        stock_quantity: i32,
    ) -> Self {
        let product_id = product_id.into();
        lock(&self.state).products.insert(
            product_id.clone(),
            ProductSnapshot {
                product_id,
                price,
                stock_quantity,
            },
        );
        self
    }

    pub fn fail_fetch(&self, product_id: impl Into<String>, error: RemoteError) {
        lock(&self.state)
            .fetch_failures
            .insert(product_id.into(), error);
    }

    pub fn fail_adjust(&self, product_id: impl Into<String>, error: RemoteError) {
        lock(&self.state)
            .adjust_failures
            .insert(product_id.into(), error);
    }

    /// Delays reads of `product_id`; a cancelled caller stops waiting.
    pub fn delay_fetch(&self, product_id: impl Into<String>, delay: Duration) {
        lock(&self.state)
            .fetch_delays
            .insert(product_id.into(), delay);
    }

    /// Delays stock adjustments of `product_id` before they are applied.
    pub fn delay_adjust(&self, product_id: impl Into<String>, delay: Duration) {
        lock(&self.state)
            .adjust_delays
            .insert(product_id.into(), delay);
    }

    pub fn stock_of(&self, product_id: &str) -> Option<i32> {
        lock(&self.state)
            .products
            .get(product_id)
            .map(|p| p.stock_quantity)
    }

    pub fn fetch_calls(&self) -> Vec<String> {
        lock(&self.state).fetches.clone()
    }

    /// Every adjustment attempted, successful or not, in call order.
    pub fn adjust_calls(&self) -> Vec<StockAdjustment> {
        lock(&self.state).adjustments.clone()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_product(&self, product_id: &str) -> Result<ProductSnapshot, RemoteError> {
        let delay = {
            let mut state = lock(&self.state);
            state.fetches.push(product_id.to_string());
            state.fetch_delays.get(product_id).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = lock(&self.state);
        if let Some(error) = state.fetch_failures.get(product_id) {
            return Err(error.clone());
        }
        state
            .products
            .get(product_id)
            .cloned()
            .ok_or(RemoteError::NotFound)
    }

    async fn adjust_stock(&self, product_id: &str, delta: i32) -> Result<i32, RemoteError> {
        let delay = lock(&self.state).adjust_delays.get(product_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        state.adjustments.push(StockAdjustment {
            product_id: product_id.to_string(),
            delta,
        });
        if let Some(error) = state.adjust_failures.get(product_id) {
            return Err(error.clone());
        }
        let product = state
            .products
            .get_mut(product_id)
            .ok_or(RemoteError::NotFound)?;
        let available = product.stock_quantity;
        match available.checked_add(delta) {
            Some(stock) if stock >= 0 => {
                product.stock_quantity = stock;
                Ok(stock)
            }
            _ => Err(RemoteError::InsufficientStock { available }),
        }
    }
}

// ── Orders ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct OrderState {
    orders: Vec<Order>,
    failure: Option<StoreError>,
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    state: Mutex<OrderState>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write fails with `error` until cleared.
    pub fn fail_writes(&self, error: Option<StoreError>) {
        lock(&self.state).failure = error;
    }

    pub fn len(&self) -> usize {
        lock(&self.state).orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut state = lock(&self.state);
        if let Some(error) = state.failure.clone() {
            return Err(error);
        }
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id: order.user_id,
            items: order.items,
            total_amount: order.total_amount,
            status: order.status,
            created_at: now,
            updated_at: now,
        };
        state.orders.push(order.clone());
        Ok(order)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Order, StoreError> {
        lock(&self.state)
            .orders
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_by_user_id(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, StoreError> {
        let state = lock(&self.state);
        // Newest insertions first, so equal timestamps still list most recent first.
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, StoreError> {
        let mut state = lock(&self.state);
        if let Some(error) = state.failure.clone() {
            return Err(error);
        }
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(StoreError::NotFound)?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}
