use async_trait::async_trait;
use reqwest::Client;

use crate::domain::errors::RemoteError;
use crate::domain::ports::UserValidator;

use super::remote::{segment_url, status_error};

/// Checks users against `GET {base_url}/api/v1/users/{id}`.
pub struct HttpUserValidator {
    client: Client,
    base_url: String,
}

impl HttpUserValidator {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl UserValidator for HttpUserValidator {
    async fn get_user(&self, user_id: &str) -> Result<(), RemoteError> {
        let url = segment_url(&self.base_url, &["api", "v1", "users", user_id])?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use actix_web::{web, HttpResponse};

    use super::*;
    use crate::infrastructure::remote::{build_client, stub};

    fn user_routes(cfg: &mut web::ServiceConfig) {
        cfg.route(
            "/api/v1/users/{id}",
            web::get().to(|path: web::Path<String>| async move {
                match path.as_str() {
                    "u1" => HttpResponse::Ok().json(serde_json::json!({ "id": "u1" })),
                    "boom" => HttpResponse::InternalServerError().body("database down"),
                    _ => HttpResponse::NotFound().finish(),
                }
            }),
        );
    }

    fn validator(base_url: String) -> HttpUserValidator {
        HttpUserValidator::new(build_client(Duration::from_secs(2)).expect("client"), base_url)
    }

    #[tokio::test]
    async fn existing_user_validates() {
        let users = validator(stub::serve(user_routes));
        assert_eq!(users.get_user("u1").await, Ok(()));
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let users = validator(stub::serve(user_routes));
        assert_eq!(users.get_user("ghost").await, Err(RemoteError::NotFound));
    }

    #[tokio::test]
    async fn server_error_is_a_transport_failure() {
        let users = validator(stub::serve(user_routes));
        assert!(matches!(users.get_user("boom").await, Err(RemoteError::Transport(_))));
    }

    #[tokio::test]
    async fn user_id_cannot_escape_its_path_segment() {
        let (base_url, seen) = stub::recording(serde_json::json!({ "id": "u1" }));
        let users = validator(base_url);

        users.get_user("u1/../../admin").await.expect("lookup");
        users.get_user("u1?role=admin").await.expect("lookup");

        assert_eq!(
            stub::seen_paths(&seen),
            vec![
                "/api/v1/users/u1%2F..%2F..%2Fadmin".to_string(),
                "/api/v1/users/u1%3Frole=admin".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn dot_user_id_is_not_found_without_a_request() {
        let (base_url, seen) = stub::recording(serde_json::json!({ "id": "u1" }));
        let users = validator(base_url);

        assert_eq!(users.get_user("..").await, Err(RemoteError::NotFound));
        assert!(stub::seen_paths(&seen).is_empty());
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_failure() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .expect("bind failed")
            .local_addr()
            .expect("addr failed")
            .port();
        let users = validator(format!("http://127.0.0.1:{port}"));
        assert!(matches!(users.get_user("u1").await, Err(RemoteError::Transport(_))));
    }
}
