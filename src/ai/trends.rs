use crate::adapters::http::{build_client, extract_error_message};
use crate::ai::TrendTopic;
use crate::config::TrendsConfig;
use crate::domain::ports::TrendSource;
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashSet;

const PROVIDER: &str = "serpapi";
const TIMEOUT_SECONDS: u64 = 20;

/// SerpAPI Google Trends 的相關搜尋 (`data_type=RELATED_QUERIES`)
pub struct SerpApiTrends {
    client: Client,
    config: TrendsConfig,
}

impl SerpApiTrends {
    pub fn new(config: &TrendsConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AppError::MissingConfigError {
                field: "ai.trends.api_key".to_string(),
            });
        }
        Ok(Self {
            client: build_client(TIMEOUT_SECONDS)?,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl TrendSource for SerpApiTrends {
    async fn related_queries(&self, keyword: &str, limit: usize) -> Result<Vec<TrendTopic>> {
        let mut query = vec![
            ("engine", "google_trends"),
            ("data_type", "RELATED_QUERIES"),
            ("q", keyword),
            ("api_key", self.config.api_key.trim()),
        ];
        if let Some(geo) = self.config.geo.as_deref() {
            query.push(("geo", geo));
        }

        tracing::debug!("📈 Looking up trends for `{}`", keyword);
        let response = self.client.get(&self.config.endpoint).query(&query).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(AppError::UpstreamError {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                message: extract_error_message(&text),
            });
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| AppError::ai_response(format!("SerpAPI returned invalid JSON: {}", e)))?;
        if let Some(message) = json["error"].as_str() {
            return Err(AppError::UpstreamError {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                message: message.to_string(),
            });
        }

        let topics = parse_related_queries(&json, limit);
        tracing::info!("📈 {} trend topics for `{}`", topics.len(), keyword);
        Ok(topics)
    }
}

/// 先取 rising 再取 top，不分大小寫去重並截到 `limit`
pub fn parse_related_queries(json: &Value, limit: usize) -> Vec<TrendTopic> {
    let mut seen = HashSet::new();
    let mut topics = Vec::new();

    for bucket in ["rising", "top"] {
        let Some(items) = json["related_queries"][bucket].as_array() else {
            continue;
        };
        for item in items {
            if topics.len() >= limit {
                return topics;
            }
            let query = item["query"].as_str().map(str::trim);
            let Some(query) = query.filter(|q| !q.is_empty()) else {
                continue;
            };
            if !seen.insert(query.to_lowercase()) {
                continue;
            }
            let value = trend_value(&item["value"])
                .or_else(|| trend_value(&item["extracted_value"]))
                .unwrap_or_default();
            topics.push(TrendTopic {
                query: query.to_string(),
                value,
            });
        }
    }

    topics
}

fn trend_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rising_then_top_with_dedupe() {
        let json = json!({
            "related_queries": {
                "rising": [
                    { "query": "rust axum", "value": "+250%", "extracted_value": 250 },
                    { "query": "Rust Web Framework", "value": "Breakout" }
                ],
                "top": [
                    { "query": "rust web framework", "value": "100", "extracted_value": 100 },
                    { "query": "rust tokio", "value": 80 },
                    { "query": "rust serde", "value": "40" }
                ]
            }
        });

        let topics = parse_related_queries(&json, 3);
        let queries: Vec<&str> = topics.iter().map(|t| t.query.as_str()).collect();
        assert_eq!(queries, vec!["rust axum", "Rust Web Framework", "rust tokio"]);
        assert_eq!(topics[1].value, "Breakout");
        assert_eq!(topics[2].value, "80");
    }

    #[test]
    fn test_missing_value_is_empty_not_null() {
        let json = json!({
            "related_queries": {
                "top": [
                    { "query": "rust htmx" },
                    { "query": "rust leptos", "value": null, "extracted_value": 55 },
                    { "query": "rust yew", "value": null, "extracted_value": null }
                ]
            }
        });

        let topics = parse_related_queries(&json, 5);
        let values: Vec<&str> = topics.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["", "55", ""]);
    }

    #[test]
    fn test_parse_missing_sections() {
        assert!(parse_related_queries(&json!({}), 5).is_empty());
    }
}
