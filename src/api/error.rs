use crate::utils::error::{AppError, ErrorSeverity};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<&AppError> for ErrorBody {
    fn from(err: &AppError) -> Self {
        let details = match err {
            AppError::ValidationError { field, .. } => Some(json!({ "field": field })),
            AppError::ContractViolation { errors } => Some(json!({ "errors": errors })),
            AppError::Forbidden { required } => Some(json!({ "required_role": required })),
            AppError::RateLimited { retry_after_secs } => {
                Some(json!({ "retry_after": retry_after_secs }))
            }
            _ => None,
        };
        Self {
            error: err.code(),
            message: err.user_friendly_message(),
            details,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::High => {
                tracing::error!("❌ {} ({}): {}", status, self.code(), self)
            }
            ErrorSeverity::Medium => tracing::warn!("⚠️  {} ({}): {}", status, self.code(), self),
            ErrorSeverity::Low => tracing::debug!("{} ({}): {}", status, self.code(), self),
        }

        let mut response = (status, Json(ErrorBody::from(&self))).into_response();
        if let AppError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}
