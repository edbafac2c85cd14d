use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use thiserror::Error;

use crate::domain::errors::OrderError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    GatewayTimeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        let message = e.to_string();
        if e.is_interrupted() {
            return AppError::GatewayTimeout(message);
        }
        match e {
            OrderError::InvalidInput(_) => AppError::BadRequest(message),
            OrderError::UserValidationFailed { .. } if e.is_not_found_cause() => {
                AppError::BadRequest(message)
            }
            OrderError::ProductFetchFailed { .. } if e.is_not_found_cause() => {
                AppError::Conflict(message)
            }
            OrderError::UserValidationFailed { .. } | OrderError::ProductFetchFailed { .. }
                if e.is_transport_cause() =>
            {
                AppError::BadGateway(message)
            }
            OrderError::InsufficientStockForOrder { .. } => AppError::Conflict(message),
            OrderError::OrderNotFound(_) => AppError::NotFound(message),
            OrderError::UserValidationFailed { .. }
            | OrderError::ProductFetchFailed { .. }
            | OrderError::ProductStockUpdateFailed { .. }
            | OrderError::Storage(_) => AppError::Internal(message),
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": message }))
    }
}
