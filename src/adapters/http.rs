use crate::utils::error::Result;
use reqwest::Client;
use std::time::Duration;

pub const USER_AGENT: &str = concat!("site-cms/", env!("CARGO_PKG_VERSION"));

/// 建立共用的 HTTP client (所有外部 API 呼叫共用連線池)
pub fn build_client(timeout_seconds: u64) -> Result<Client> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_seconds))
        .connect_timeout(Duration::from_secs(timeout_seconds.min(10)))
        .build()?;
    Ok(client)
}

/// 從供應商的錯誤回應中取出可讀訊息
///
/// OpenAI / OpenRouter 使用 `{"error": {"message": ...}}`，SerpAPI 使用 `{"error": "..."}`。
pub fn extract_error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = json["error"]["message"].as_str() {
            return message.to_string();
        }
        if let Some(message) = json["error"].as_str() {
            return message.to_string();
        }
        if let Some(message) = json["message"].as_str() {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.chars().take(300).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_message_shapes() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"Invalid API key","code":401}}"#),
            "Invalid API key"
        );
        assert_eq!(
            extract_error_message(r#"{"error":"Invalid API key. Your API key should be here"}"#),
            "Invalid API key. Your API key should be here"
        );
        assert_eq!(extract_error_message("  Bad Gateway "), "Bad Gateway");
        assert_eq!(extract_error_message(""), "empty response body");
    }
}
