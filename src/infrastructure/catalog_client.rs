use std::str::FromStr;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::domain::errors::RemoteError;
use crate::domain::order::ProductSnapshot;
use crate::domain::ports::Catalog;

use super::remote::{segment_url, status_error};

/// Product service wire shape. Prices may arrive as JSON numbers or strings.
#[derive(Debug, Deserialize)]
struct ProductBody {
    id: String,
    price: PriceField,
    stock_quantity: i32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PriceField {
    Text(String),
    Number(serde_json::Number),
}

impl PriceField {
    fn to_decimal(&self) -> Result<BigDecimal, RemoteError> {
        let raw = match self {
            PriceField::Text(text) => text.clone(),
            PriceField::Number(number) => number.to_string(),
        };
        BigDecimal::from_str(&raw)
            .map_err(|e| RemoteError::Transport(format!("invalid price '{raw}': {e}")))
    }
}

#[derive(Debug, Serialize)]
struct StockChange {
    quantity_change: i32,
}

/// Body the product service may attach to a 409.
#[derive(Debug, Default, Deserialize)]
struct ConflictBody {
    #[serde(default, alias = "stock_quantity")]
    available: i32,
}

/// Reads products and adjusts stock through the product service's HTTP API.
pub struct HttpCatalog {
    client: Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn product_url(&self, product_id: &str) -> Result<Url, RemoteError> {
        segment_url(&self.base_url, &["api", "v1", "products", product_id])
    }

    fn stock_url(&self, product_id: &str) -> Result<Url, RemoteError> {
        segment_url(&self.base_url, &["api", "v1", "products", product_id, "stock"])
    }
}

async fn read_product(response: Response) -> Result<ProductSnapshot, RemoteError> {
    let body: ProductBody = response.json().await?;
    Ok(ProductSnapshot {
        price: body.price.to_decimal()?,
        product_id: body.id,
        stock_quantity: body.stock_quantity,
    })
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn get_product(&self, product_id: &str) -> Result<ProductSnapshot, RemoteError> {
        let response = self
            .client
            .get(self.product_url(product_id)?)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return read_product(response).await;
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }

    async fn adjust_stock(&self, product_id: &str, delta: i32) -> Result<i32, RemoteError> {
        let response = self
            .client
            .patch(self.stock_url(product_id)?)
            .json(&StockChange {
                quantity_change: delta,
            })
            .send()
            .await?;
        match response.status() {
            status if status.is_success() => {
                Ok(read_product(response).await?.stock_quantity)
            }
            StatusCode::CONFLICT => {
                let body = response.text().await.unwrap_or_default();
                let conflict: ConflictBody = serde_json::from_str(&body).unwrap_or_default();
                Err(RemoteError::InsufficientStock {
                    available: conflict.available,
                })
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(status_error(status, &body))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use actix_web::{web, HttpResponse};
    use serde_json::{json, Value};

    use super::*;
    use crate::infrastructure::remote::{build_client, stub};

    async fn get_product(path: web::Path<String>) -> HttpResponse {
        match path.as_str() {
            "p1" => HttpResponse::Ok().json(json!({ "id": "p1", "price": 10.99, "stock_quantity": 4 })),
            "p2" => HttpResponse::Ok().json(json!({ "id": "p2", "price": "0.10", "stock_quantity": 0 })),
            _ => HttpResponse::NotFound().finish(),
        }
    }

    async fn patch_stock(path: web::Path<String>, body: web::Json<Value>) -> HttpResponse {
        let change = body["quantity_change"].as_i64().unwrap_or(0);
        match path.as_str() {
            "p1" if change >= -4 => HttpResponse::Ok().json(json!({
                "id": "p1",
                "price": 10.99,
                "stock_quantity": 4 + change,
            })),
            "p1" => HttpResponse::Conflict().json(json!({ "error": "insufficient stock", "available": 4 })),
            "p3" => HttpResponse::Conflict().body("insufficient stock"),
            _ => HttpResponse::NotFound().finish(),
        }
    }

    fn product_routes(cfg: &mut web::ServiceConfig) {
        cfg.route("/api/v1/products/{id}", web::get().to(get_product))
            .route("/api/v1/products/{id}/stock", web::patch().to(patch_stock));
    }

    fn catalog() -> HttpCatalog {
        HttpCatalog::new(
            build_client(Duration::from_secs(2)).expect("client"),
            stub::serve(product_routes),
        )
    }

    #[tokio::test]
    async fn numeric_price_is_read_exactly() {
        let product = catalog().get_product("p1").await.expect("product");

        assert_eq!(product.product_id, "p1");
        assert_eq!(product.price, BigDecimal::from_str("10.99").expect("decimal"));
        assert_eq!(product.stock_quantity, 4);
    }

    #[tokio::test]
    async fn string_price_is_accepted() {
        let product = catalog().get_product("p2").await.expect("product");
        assert_eq!(product.price, BigDecimal::from_str("0.10").expect("decimal"));
    }

    #[tokio::test]
    async fn missing_product_is_not_found() {
        assert_eq!(catalog().get_product("nope").await, Err(RemoteError::NotFound));
    }

    #[tokio::test]
    async fn adjust_stock_returns_new_stock() {
        assert_eq!(catalog().adjust_stock("p1", -3).await, Ok(1));
    }

    #[tokio::test]
    async fn product_id_cannot_escape_its_path_segment() {
        let (base_url, seen) =
            stub::recording(json!({ "id": "p1", "price": "1.00", "stock_quantity": 7 }));
        let catalog = HttpCatalog::new(build_client(Duration::from_secs(2)).expect("client"), base_url);

        catalog.get_product("p1?x=").await.expect("product");
        catalog.adjust_stock("p1?x=", -1).await.expect("stock");
        catalog.get_product("../../users/u1").await.expect("product");
        catalog.adjust_stock("a/b", -1).await.expect("stock");

        assert_eq!(
            stub::seen_paths(&seen),
            vec![
                "/api/v1/products/p1%3Fx=".to_string(),
                "/api/v1/products/p1%3Fx=/stock".to_string(),
                "/api/v1/products/..%2F..%2Fusers%2Fu1".to_string(),
                "/api/v1/products/a%2Fb/stock".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn dot_product_id_is_not_found_without_a_request() {
        let (base_url, seen) =
            stub::recording(json!({ "id": "p1", "price": "1.00", "stock_quantity": 7 }));
        let catalog = HttpCatalog::new(build_client(Duration::from_secs(2)).expect("client"), base_url);

        assert_eq!(catalog.get_product("..").await, Err(RemoteError::NotFound));
        assert_eq!(catalog.adjust_stock(".", -1).await, Err(RemoteError::NotFound));
        assert!(stub::seen_paths(&seen).is_empty());
    }

    #[tokio::test]
    async fn conflict_maps_to_insufficient_stock() {
        let catalog = catalog();

        assert_eq!(
            catalog.adjust_stock("p1", -5).await,
            Err(RemoteError::InsufficientStock { available: 4 })
        );
        assert_eq!(
            catalog.adjust_stock("p3", -1).await,
            Err(RemoteError::InsufficientStock { available: 0 })
        );
    }
}
