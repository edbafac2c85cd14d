use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::errors::StoreError;
use crate::domain::order::{Order, OrderItem, OrderStatus};
use crate::schema::{order_items, orders};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: Uuid,
    pub user_id: String,
    pub total_amount: BigDecimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub id: Uuid,
    pub user_id: String,
    pub total_amount: BigDecimal,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = order_items)]
#[diesel(belongs_to(OrderRow, foreign_key = order_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub position: i32,
    pub product_id: String,
    pub quantity: i32,
    pub price_at_purchase: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_items)]
pub struct NewOrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub position: i32,
    pub product_id: String,
    pub quantity: i32,
    pub price_at_purchase: BigDecimal,
}

impl OrderRow {
    /// Assembles the domain order; items come back in their original request order.
    pub fn into_order(self, mut items: Vec<OrderItemRow>) -> Result<Order, StoreError> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(StoreError::database)?;
        items.sort_by_key(|item| item.position);
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            items: items
                .into_iter()
                .map(|item| OrderItem {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price_at_purchase: item.price_at_purchase,
                })
                .collect(),
            total_amount: self.total_amount,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
