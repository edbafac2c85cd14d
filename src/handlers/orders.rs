use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::{normalize_page, CallContext, OrderService};
use crate::domain::order::{Order, OrderItem, OrderStatus, RequestedItem};
use crate::errors::AppError;

use super::ApiSettings;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderItemRequest {
    pub product_id: String,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub items: Vec<CreateOrderItemRequest>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub quantity: i32,
    /// Decimal price as a string to avoid floating-point issues, e.g. "9.99"
    pub price_at_purchase: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: String,
    pub items: Vec<OrderItemResponse>,
    pub total_amount: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            items: order.items.into_iter().map(OrderItemResponse::from).collect(),
            total_amount: order.total_amount.to_string(),
            status: order.status.to_string(),
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
        }
    }
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
            price_at_purchase: item.price_at_purchase.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    /// One of PENDING, PROCESSING, COMPLETED, CANCELLED.
    pub status: String,
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of orders per page. Defaults to 10, maximum 100.
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    10
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub page: i64,
    pub page_size: i64,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Validates the user, prices every item against the product catalog,
/// reserves stock and stores the order as PENDING.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = OrderResponse),
        (status = 400, description = "Invalid order data or unknown user"),
        (status = 409, description = "Unknown product or insufficient stock"),
        (status = 502, description = "A remote service could not be reached"),
        (status = 504, description = "The request deadline passed"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    service: web::Data<OrderService>,
    settings: web::Data<ApiSettings>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    if body.items.len() > settings.max_order_items {
        return Err(AppError::BadRequest(format!(
            "an order may contain at most {} items",
            settings.max_order_items
        )));
    }

    let items = body
        .items
        .into_iter()
        .map(|item| RequestedItem::new(item.product_id, item.quantity))
        .collect();
    let ctx = CallContext::with_timeout(settings.request_timeout);
    let order = service.create_order(&ctx, &body.user_id, items).await?;

    Ok(HttpResponse::Created().json(OrderResponse::from(order)))
}

/// GET /orders/{id}
///
/// Returns the order together with its items.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    service: web::Data<OrderService>,
    settings: web::Data<ApiSettings>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let ctx = CallContext::with_timeout(settings.request_timeout);
    let order = service.get_order(&ctx, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// PATCH /orders/{id}/status
#[utoipa::path(
    patch,
    path = "/orders/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = OrderResponse),
        (status = 400, description = "Unknown status"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn update_order_status(
    service: web::Data<OrderService>,
    settings: web::Data<ApiSettings>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let status = body
        .status
        .parse::<OrderStatus>()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let ctx = CallContext::with_timeout(settings.request_timeout);
    let order = service
        .update_order_status(&ctx, path.into_inner(), status)
        .await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// GET /users/{user_id}/orders
///
/// Returns one page of the user's orders, most recent first, items included.
#[utoipa::path(
    get,
    path = "/users/{user_id}/orders",
    params(
        ("user_id" = String, Path, description = "User identifier"),
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("page_size" = Option<i64>, Query, description = "Orders per page (default 10, max 100)"),
    ),
    responses(
        (status = 200, description = "Page of orders", body = ListOrdersResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn list_user_orders(
    service: web::Data<OrderService>,
    settings: web::Data<ApiSettings>,
    path: web::Path<String>,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let (page, page_size) = normalize_page(params.page, params.page_size);
    let ctx = CallContext::with_timeout(settings.request_timeout);
    let orders = service
        .list_user_orders(&ctx, &path.into_inner(), page, page_size)
        .await?;

    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        items: orders.into_iter().map(OrderResponse::from).collect(),
        page,
        page_size,
    }))
}
