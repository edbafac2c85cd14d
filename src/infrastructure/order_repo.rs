use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::StoreError;
use crate::domain::order::{NewOrder, Order, OrderStatus};
use crate::domain::ports::OrderStore;
use crate::schema::{order_items, orders};

use super::models::{NewOrderItemRow, NewOrderRow, OrderItemRow, OrderRow};

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        StoreError::database(e)
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(e: r2d2::Error) -> Self {
        StoreError::database(e)
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

pub struct DieselOrderStore {
    pool: DbPool,
}

impl DieselOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Runs blocking Diesel work off the async executor.
    async fn with_conn<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            work(&mut conn)
        })
        .await
        .map_err(StoreError::database)?
    }
}

fn load_items(conn: &mut PgConnection, order: &OrderRow) -> Result<Vec<OrderItemRow>, StoreError> {
    Ok(OrderItemRow::belonging_to(order)
        .select(OrderItemRow::as_select())
        .order(order_items::position.asc())
        .load(conn)?)
}

#[async_trait]
impl OrderStore for DieselOrderStore {
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError> {
        self.with_conn(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                // 1. Insert the order
                let order_id = Uuid::new_v4();
                let row = diesel::insert_into(orders::table)
                    .values(&NewOrderRow {
                        id: order_id,
                        user_id: order.user_id.clone(),
                        total_amount: order.total_amount.clone(),
                        status: order.status.as_str().to_string(),
                    })
                    .returning(OrderRow::as_returning())
                    .get_result(conn)?;

                // 2. Insert its items, keeping request order
                let new_items = order
                    .items
                    .iter()
                    .enumerate()
                    .map(|(position, item)| {
                        let position = i32::try_from(position).map_err(StoreError::database)?;
                        Ok(NewOrderItemRow {
                            id: Uuid::new_v4(),
                            order_id,
                            position,
                            product_id: item.product_id.clone(),
                            quantity: item.quantity,
                            price_at_purchase: item.price_at_purchase.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, StoreError>>()?;
                let items = diesel::insert_into(order_items::table)
                    .values(&new_items)
                    .returning(OrderItemRow::as_returning())
                    .get_results(conn)?;

                row.into_order(items)
            })
        })
        .await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Order, StoreError> {
        self.with_conn(move |conn| {
            let row = orders::table
                .find(id)
                .select(OrderRow::as_select())
                .first(conn)
                .optional()?;

            let Some(row) = row else {
                return Err(StoreError::NotFound);
            };

            let items = load_items(conn, &row)?;
            row.into_order(items)
        })
        .await
    }

    async fn list_by_user_id(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let rows = orders::table
                    .filter(orders::user_id.eq(&user_id))
                    .select(OrderRow::as_select())
                    .order(orders::created_at.desc())
                    .then_order_by(orders::id.asc())
                    .limit(limit)
                    .offset(offset)
                    .load(conn)?;

                let items = OrderItemRow::belonging_to(&rows)
                    .select(OrderItemRow::as_select())
                    .order(order_items::position.asc())
                    .load(conn)?
                    .grouped_by(&rows);

                rows.into_iter()
                    .zip(items)
                    .map(|(row, items)| row.into_order(items))
                    .collect()
            })
        })
        .await
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, StoreError> {
        self.with_conn(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let row = diesel::update(orders::table.find(id))
                    .set((
                        orders::status.eq(status.as_str()),
                        orders::updated_at.eq(Utc::now()),
                    ))
                    .returning(OrderRow::as_returning())
                    .get_result(conn)
                    .optional()?;

                let Some(row) = row else {
                    return Err(StoreError::NotFound);
                };

                let items = load_items(conn, &row)?;
                row.into_order(items)
            })
        })
        .await
    }
}
