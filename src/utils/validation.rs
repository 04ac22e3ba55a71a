use crate::utils::error::{AppError, Result};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(AppError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(AppError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(AppError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(AppError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(AppError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(AppError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(AppError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

// 以下為請求輸入驗證，錯誤回傳 ValidationError (422)

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
            .expect("email regex is valid")
    })
}

pub fn validate_email(field_name: &str, email: &str) -> Result<()> {
    let email = email.trim();
    if email.len() > 254 || !email_regex().is_match(email) {
        return Err(AppError::validation(
            field_name,
            "must be a valid email address",
        ));
    }
    Ok(())
}

/// 以字元數 (非位元組) 檢查長度，並忽略前後空白
pub fn validate_length(field_name: &str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = value.trim().chars().count();
    if len < min {
        return Err(AppError::validation(
            field_name,
            if min <= 1 {
                "is required".to_string()
            } else {
                format!("must be at least {} characters", min)
            },
        ));
    }
    if len > max {
        return Err(AppError::validation(
            field_name,
            format!("must be at most {} characters", max),
        ));
    }
    Ok(())
}

pub fn validate_optional_url(field_name: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) if !v.trim().is_empty() => {
            // 允許站內相對路徑 (例如上傳圖片)
            if v.starts_with('/') {
                return Ok(());
            }
            validate_url(field_name, v)
                .map_err(|_| AppError::validation(field_name, "must be a valid URL"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("ai.text.base_url", "https://example.com").is_ok());
        assert!(validate_url("ai.text.base_url", "http://example.com").is_ok());
        assert!(validate_url("ai.text.base_url", "").is_err());
        assert!(validate_url("ai.text.base_url", "invalid-url").is_err());
        assert!(validate_url("ai.text.base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("rate_limits.chat.max_requests", 5, 1).is_ok());
        assert!(validate_positive_number("rate_limits.chat.max_requests", 0, 1).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("email", "jane@example.com").is_ok());
        assert!(validate_email("email", "  jane.doe+news@mail.example.co  ").is_ok());
        assert!(validate_email("email", "jane@").is_err());
        assert!(validate_email("email", "not an email").is_err());
        assert!(validate_email("email", "a@b").is_err());
    }

    #[test]
    fn test_validate_length_counts_chars() {
        assert!(validate_length("message", "héllo wörld", 10, 20).is_ok());
        assert!(validate_length("message", "   short  ", 10, 20).is_err());
        assert!(validate_length("name", "", 1, 20).is_err());
        assert!(validate_length("name", &"x".repeat(21), 1, 20).is_err());
    }

    #[test]
    fn test_validate_optional_url() {
        assert!(validate_optional_url("logo_url", None).is_ok());
        assert!(validate_optional_url("logo_url", Some("")).is_ok());
        assert!(validate_optional_url("logo_url", Some("/uploads/ai/x.png")).is_ok());
        assert!(validate_optional_url("logo_url", Some("https://cdn.example.com/a.png")).is_ok());
        assert!(validate_optional_url("logo_url", Some("javascript:alert(1)")).is_err());
    }
}
