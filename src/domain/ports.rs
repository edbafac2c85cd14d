use async_trait::async_trait;
use uuid::Uuid;

use super::errors::{RemoteError, StoreError};
use super::order::{NewOrder, Order, OrderStatus, ProductSnapshot, StockAdjustment};

/// Confirms that a user identity exists in the user service.
#[async_trait]
pub trait UserValidator: Send + Sync + 'static {
    async fn get_user(&self, user_id: &str) -> Result<(), RemoteError>;
}

/// Product price/stock reads and atomic stock adjustments.
///
/// `adjust_stock` must be atomic against concurrent adjustments of the same
/// product and must reject, with `RemoteError::InsufficientStock`, any delta
/// that would drive stock below zero, whatever an earlier read returned.
#[async_trait]
pub trait Catalog: Send + Sync + 'static {
    async fn get_product(&self, product_id: &str) -> Result<ProductSnapshot, RemoteError>;

    /// Returns the stock level after the adjustment.
    async fn adjust_stock(&self, product_id: &str, delta: i32) -> Result<i32, RemoteError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
    /// Writes the order and all of its items as one unit, assigning the
    /// identifier and timestamps.
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError>;
    async fn get_by_id(&self, id: Uuid) -> Result<Order, StoreError>;
    /// Most recent first.
    async fn list_by_user_id(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, StoreError>;
    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InconsistencyStage {
    /// A stock commit failed after earlier commits were applied.
    StockCommit,
    /// Every commit was applied but the order could not be written.
    Persistence,
}

/// Stock that moved without a matching order record.
#[derive(Debug, Clone)]
pub struct InconsistencyReport {
    pub stage: InconsistencyStage,
    pub user_id: String,
    pub applied: Vec<StockAdjustment>,
    pub cause: String,
}

/// Hook invoked whenever an order run leaves committed stock behind.
#[async_trait]
pub trait StockCompensation: Send + Sync + 'static {
    async fn on_inconsistency(&self, report: &InconsistencyReport);
}
