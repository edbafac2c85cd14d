use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::errors::{OrderError, RemoteError, StoreError};
use crate::domain::order::{
    NewOrder, Order, OrderItem, OrderStatus, RequestedItem, StockAdjustment,
};
use crate::domain::ports::{
    Catalog, InconsistencyReport, InconsistencyStage, OrderStore, StockCompensation,
    UserValidator,
};

use super::compensation::ManualReconciliation;
use super::context::CallContext;
use super::stock_plan::{PricedLine, StockPlan};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Creates orders by coordinating the user service, the product catalog and
/// the local order store. There is no transaction spanning the three: stock
/// committed before a later failure stays committed and is handed to the
/// [`StockCompensation`] hook.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    users: Arc<dyn UserValidator>,
    catalog: Arc<dyn Catalog>,
    compensation: Arc<dyn StockCompensation>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        users: Arc<dyn UserValidator>,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        Self {
            store,
            users,
            catalog,
            compensation: Arc::new(ManualReconciliation),
        }
    }

    pub fn with_compensation(mut self, compensation: Arc<dyn StockCompensation>) -> Self {
        self.compensation = compensation;
        self
    }

    /// Validates the user, prices and checks every item concurrently, commits
    /// the stock of each distinct product one at a time, then writes the order.
    ///
    /// Once the stock plan is accepted, committing and writing run on their own
    /// task. Dropping the returned future after that point does not stop them.
    pub async fn create_order(
        &self,
        ctx: &CallContext,
        user_id: &str,
        items: Vec<RequestedItem>,
    ) -> Result<Order, OrderError> {
        validate_request(user_id, &items)?;

        guarded(ctx, self.users.get_user(user_id))
            .await
            .map_err(|source| {
                log::warn!("Error validating user {}: {}", user_id, source);
                OrderError::UserValidationFailed {
                    user_id: user_id.to_string(),
                    source,
                }
            })?;
        log::info!("User {} validated successfully", user_id);

        let lines = self.price_items(ctx, &items).await?;
        let plan = StockPlan::from_lines(&lines)?;
        plan.ensure_available()?;

        let order = NewOrder::pending(user_id, lines.into_iter().map(|l| l.item).collect());
        let settle = tokio::spawn(self.clone().settle(user_id.to_string(), plan, order));
        match settle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Order settlement task for user {} failed: {}", user_id, e);
                Err(OrderError::Storage(StoreError::database(e)))
            }
        }
    }

    async fn settle(
        self,
        user_id: String,
        plan: StockPlan,
        order: NewOrder,
    ) -> Result<Order, OrderError> {
        let user_id = user_id.as_str();
        let applied = self.commit_stock(user_id, &plan).await?;

        match self.store.create(order).await {
            Ok(order) => {
                log::info!("Order {} created for user {}", order.id, user_id);
                Ok(order)
            }
            Err(e) => {
                log::error!("Error writing order for user {}: {}", user_id, e);
                self.report_inconsistency(
                    InconsistencyStage::Persistence,
                    user_id,
                    applied,
                    e.to_string(),
                )
                .await;
                Err(OrderError::Storage(e))
            }
        }
    }

    pub async fn get_order(&self, ctx: &CallContext, id: Uuid) -> Result<Order, OrderError> {
        match ctx.run(self.store.get_by_id(id)).await {
            Ok(Ok(order)) => Ok(order),
            Ok(Err(StoreError::NotFound)) => Err(OrderError::OrderNotFound(id)),
            Ok(Err(e)) => Err(OrderError::Storage(e)),
            Err(interrupt) => Err(OrderError::Storage(StoreError::Interrupted(interrupt))),
        }
    }

    /// `page` is 1-based. Out-of-range values fall back to the first page and
    /// the default page size.
    pub async fn list_user_orders(
        &self,
        ctx: &CallContext,
        user_id: &str,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<Order>, OrderError> {
        if user_id.trim().is_empty() {
            return Err(OrderError::InvalidInput("user id is required".into()));
        }
        let (limit, offset) = page_window(page, page_size);
        ctx.run(self.store.list_by_user_id(user_id, limit, offset))
            .await
            .map_err(|interrupt| OrderError::Storage(StoreError::Interrupted(interrupt)))?
            .map_err(OrderError::Storage)
    }

    pub async fn update_order_status(
        &self,
        ctx: &CallContext,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, OrderError> {
        match ctx.run(self.store.update_status(id, status)).await {
            Ok(Ok(order)) => {
                log::info!("Order {} moved to {}", id, status);
                Ok(order)
            }
            Ok(Err(StoreError::NotFound)) => Err(OrderError::OrderNotFound(id)),
            Ok(Err(e)) => Err(OrderError::Storage(e)),
            Err(interrupt) => Err(OrderError::Storage(StoreError::Interrupted(interrupt))),
        }
    }

    /// One task per requested item. Outcomes flow to this collector over a
    /// channel; the first failure received cancels the remaining reads. Every
    /// task is joined before returning.
    async fn price_items(
        &self,
        ctx: &CallContext,
        items: &[RequestedItem],
    ) -> Result<Vec<PricedLine>, OrderError> {
        let (group, cancel_group) = ctx.child();
        let (tx, mut rx) = mpsc::channel(items.len());

        let mut tasks = Vec::with_capacity(items.len());
        for (index, item) in items.iter().cloned().enumerate() {
            let tx = tx.clone();
            let catalog = Arc::clone(&self.catalog);
            let group = group.clone();
            let product_id = item.product_id.clone();
            let handle = tokio::spawn(async move {
                let outcome = price_item(catalog.as_ref(), &group, item).await;
                let _ = tx.send((index, outcome)).await;
            });
            tasks.push((product_id, handle));
        }
        drop(tx);

        let mut first_error: Option<OrderError> = None;
        let mut priced: Vec<Option<PricedLine>> = (0..items.len()).map(|_| None).collect();
        while let Some((index, outcome)) = rx.recv().await {
            match outcome {
                Ok(line) => priced[index] = Some(line),
                Err(e) if first_error.is_none() => {
                    log::warn!("Order item rejected, cancelling remaining reads: {}", e);
                    cancel_group.cancel();
                    first_error = Some(e);
                }
                Err(e) => log::debug!("Discarding later item failure: {}", e),
            }
        }

        for (product_id, handle) in tasks {
            if let Err(e) = handle.await {
                log::error!("Product read task for {} failed: {}", product_id, e);
                first_error.get_or_insert(OrderError::ProductFetchFailed {
                    product_id,
                    source: RemoteError::Transport(format!("product read task failed: {e}")),
                });
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        priced
            .into_iter()
            .zip(items)
            .map(|(line, item)| {
                line.ok_or_else(|| OrderError::ProductFetchFailed {
                    product_id: item.product_id.clone(),
                    source: RemoteError::Transport("no outcome recorded for item".into()),
                })
            })
            .collect()
    }

    /// Sequential and fail-fast. Adjustments applied before a failure are
    /// reported, not reverted.
    async fn commit_stock(
        &self,
        user_id: &str,
        plan: &StockPlan,
    ) -> Result<Vec<StockAdjustment>, OrderError> {
        let mut applied = Vec::with_capacity(plan.len());
        for adjustment in plan.adjustments() {
            log::info!(
                "Updating stock for product {} by {}",
                adjustment.product_id,
                adjustment.delta
            );
            match self
                .catalog
                .adjust_stock(&adjustment.product_id, adjustment.delta)
                .await
            {
                Ok(stock) => {
                    log::info!(
                        "Stock updated for product {}, new stock {}",
                        adjustment.product_id,
                        stock
                    );
                    applied.push(adjustment);
                }
                Err(source) => {
                    log::error!(
                        "Failed to update stock for product {}: {}",
                        adjustment.product_id,
                        source
                    );
                    if !applied.is_empty() {
                        self.report_inconsistency(
                            InconsistencyStage::StockCommit,
                            user_id,
                            applied.clone(),
                            source.to_string(),
                        )
                        .await;
                    }
                    return Err(OrderError::ProductStockUpdateFailed {
                        product_id: adjustment.product_id,
                        source,
                        applied,
                    });
                }
            }
        }
        Ok(applied)
    }

    async fn report_inconsistency(
        &self,
        stage: InconsistencyStage,
        user_id: &str,
        applied: Vec<StockAdjustment>,
        cause: String,
    ) {
        let report = InconsistencyReport {
            stage,
            user_id: user_id.to_string(),
            applied,
            cause,
        };
        self.compensation.on_inconsistency(&report).await;
    }
}

async fn price_item(
    catalog: &dyn Catalog,
    ctx: &CallContext,
    item: RequestedItem,
) -> Result<PricedLine, OrderError> {
    let snapshot = guarded(ctx, catalog.get_product(&item.product_id))
        .await
        .map_err(|source| OrderError::ProductFetchFailed {
            product_id: item.product_id.clone(),
            source,
        })?;
    log::debug!(
        "Fetched product {}: price {}, stock {}",
        snapshot.product_id,
        snapshot.price,
        snapshot.stock_quantity
    );

    if item.quantity > snapshot.stock_quantity {
        return Err(OrderError::InsufficientStockForOrder {
            product_id: item.product_id,
            requested: item.quantity,
            available: snapshot.stock_quantity,
        });
    }

    Ok(PricedLine {
        item: OrderItem {
            product_id: item.product_id,
            quantity: item.quantity,
            price_at_purchase: snapshot.price,
        },
        available: snapshot.stock_quantity,
    })
}

async fn guarded<T, F>(ctx: &CallContext, fut: F) -> Result<T, RemoteError>
where
    F: Future<Output = Result<T, RemoteError>>,
{
    ctx.run(fut).await.map_err(RemoteError::from)?
}

/// Longest user or product id the order store can hold.
pub const MAX_ID_LEN: usize = 255;

fn validate_request(user_id: &str, items: &[RequestedItem]) -> Result<(), OrderError> {
    if user_id.trim().is_empty() {
        return Err(OrderError::InvalidInput("user id is required".into()));
    }
    if user_id.chars().count() > MAX_ID_LEN {
        return Err(OrderError::InvalidInput(format!(
            "user id must be at most {MAX_ID_LEN} characters"
        )));
    }
    if items.is_empty() {
        return Err(OrderError::InvalidInput(
            "at least one item is required in the order".into(),
        ));
    }
    for item in items {
        if item.product_id.trim().is_empty() {
            return Err(OrderError::InvalidInput(
                "product id is required for all items".into(),
            ));
        }
        if item.product_id.chars().count() > MAX_ID_LEN {
            return Err(OrderError::InvalidInput(format!(
                "product id must be at most {MAX_ID_LEN} characters"
            )));
        }
        if item.quantity <= 0 {
            return Err(OrderError::InvalidInput(format!(
                "quantity for product {} must be positive",
                item.product_id
            )));
        }
    }
    Ok(())
}

/// Returns the `(page, page_size)` a listing actually uses.
pub fn normalize_page(page: i64, page_size: i64) -> (i64, i64) {
    let page = if page <= 0 { 1 } else { page };
    let page_size = if page_size <= 0 || page_size > MAX_PAGE_SIZE {
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    };
    (page, page_size)
}

/// Returns `(limit, offset)` for a 1-based page.
fn page_window(page: i64, page_size: i64) -> (i64, i64) {
    let (page, page_size) = normalize_page(page, page_size);
    (page_size, (page - 1).saturating_mul(page_size))
}
