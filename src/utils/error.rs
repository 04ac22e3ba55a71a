use crate::core::auth::Role;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Validation error on {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Request does not match contract: {}", errors.join("; "))]
    ContractViolation { errors: Vec<String> },

    #[error("{resource} not found: {key}")]
    NotFound { resource: String, key: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Unauthenticated")]
    Unauthorized,

    #[error("Requires role {required}")]
    Forbidden { required: Role },

    #[error("Rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("{provider} responded with {status}: {message}")]
    UpstreamError {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Unusable AI response: {message}")]
    AiResponseError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Access,
    Upstream,
    Storage,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>, key: impl ToString) -> Self {
        AppError::NotFound {
            resource: resource.into(),
            key: key.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict {
            message: message.into(),
        }
    }

    pub fn ai_response(message: impl Into<String>) -> Self {
        AppError::AiResponseError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::ConfigError { .. }
            | AppError::MissingConfigError { .. }
            | AppError::InvalidConfigValueError { .. }
            | AppError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            AppError::ValidationError { .. }
            | AppError::ContractViolation { .. }
            | AppError::NotFound { .. }
            | AppError::Conflict { .. } => ErrorCategory::Input,
            AppError::Unauthorized | AppError::Forbidden { .. } | AppError::RateLimited { .. } => {
                ErrorCategory::Access
            }
            AppError::ApiError(_)
            | AppError::UpstreamError { .. }
            | AppError::AiResponseError { .. } => ErrorCategory::Upstream,
            AppError::IoError(_) | AppError::CsvError(_) => ErrorCategory::Storage,
            AppError::SerializationError(_) | AppError::ProcessingError { .. } => {
                ErrorCategory::Internal
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::Access => ErrorSeverity::Low,
            ErrorCategory::Upstream => ErrorSeverity::Medium,
            ErrorCategory::Storage | ErrorCategory::Internal => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// 穩定的錯誤代碼，作為 JSON 回應中的 `error` 欄位
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError { .. } => "validation_failed",
            AppError::ContractViolation { .. } => "contract_violation",
            AppError::NotFound { .. } => "not_found",
            AppError::Conflict { .. } => "conflict",
            AppError::Unauthorized => "unauthenticated",
            AppError::Forbidden { .. } => "forbidden",
            AppError::RateLimited { .. } => "too_many_requests",
            AppError::ApiError(_) | AppError::UpstreamError { .. } => "upstream_failure",
            AppError::AiResponseError { .. } => "ai_response_invalid",
            AppError::ConfigError { .. }
            | AppError::MissingConfigError { .. }
            | AppError::InvalidConfigValueError { .. }
            | AppError::ConfigValidationError { .. } => "not_configured",
            _ => "internal_error",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            AppError::ValidationError { .. } | AppError::ContractViolation { .. } => 422,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Unauthorized => 401,
            AppError::Forbidden { .. } => 403,
            AppError::RateLimited { .. } => 429,
            AppError::ApiError(_)
            | AppError::UpstreamError { .. }
            | AppError::AiResponseError { .. } => 502,
            AppError::ConfigError { .. }
            | AppError::MissingConfigError { .. }
            | AppError::InvalidConfigValueError { .. }
            | AppError::ConfigValidationError { .. } => 503,
            _ => 500,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            AppError::MissingConfigError { field } => {
                format!("Set `{}` in the configuration file or its environment variable", field)
            }
            AppError::InvalidConfigValueError { field, .. }
            | AppError::ConfigValidationError { field, .. } => {
                format!("Fix the value of `{}` in the configuration file", field)
            }
            AppError::ConfigError { .. } => "Check the configuration file".to_string(),
            AppError::ValidationError { field, .. } => format!("Correct the `{}` field", field),
            AppError::ContractViolation { .. } => {
                "Send a request body matching the documented shape".to_string()
            }
            AppError::Unauthorized => "Log in again to obtain a fresh token".to_string(),
            AppError::Forbidden { required } => {
                format!("Ask a super admin for the `{}` role", required)
            }
            AppError::RateLimited { retry_after_secs } => {
                format!("Wait {} seconds before retrying", retry_after_secs)
            }
            AppError::ApiError(_) | AppError::UpstreamError { .. } => {
                "Check provider credentials and availability, then retry".to_string()
            }
            AppError::AiResponseError { .. } => {
                "Retry the generation; the model returned an unexpected shape".to_string()
            }
            AppError::IoError(_) => "Check that the data directory is writable".to_string(),
            _ => "Retry the operation; report it if the problem persists".to_string(),
        }
    }

    /// 對外顯示的訊息，不洩漏內部細節
    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::Access => self.to_string(),
            ErrorCategory::Upstream => match self {
                AppError::AiResponseError { .. } => {
                    "The AI provider returned an unusable response".to_string()
                }
                _ => "An upstream provider is unavailable".to_string(),
            },
            ErrorCategory::Configuration => "This feature is not configured".to_string(),
            ErrorCategory::Storage | ErrorCategory::Internal => {
                "Internal server error".to_string()
            }
        }
    }
}
