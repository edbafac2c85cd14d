pub mod orders;

use std::time::Duration;

use actix_web::HttpResponse;
use utoipa::OpenApi;

use crate::config::AppConfig;

/// Per-request limits applied at the HTTP edge.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub max_order_items: usize,
    pub request_timeout: Duration,
}

impl From<&AppConfig> for ApiSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_order_items: config.max_order_items,
            request_timeout: config.request_timeout,
        }
    }
}

/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up")),
    tag = "health"
)]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        orders::create_order,
        orders::get_order,
        orders::update_order_status,
        orders::list_user_orders,
        health,
    ),
    components(schemas(
        orders::CreateOrderRequest,
        orders::CreateOrderItemRequest,
        orders::OrderResponse,
        orders::OrderItemResponse,
        orders::UpdateStatusRequest,
        orders::ListOrdersResponse,
    )),
    tags(
        (name = "orders", description = "Order creation and lookup"),
        (name = "health", description = "Liveness"),
    )
)]
pub struct ApiDoc;
