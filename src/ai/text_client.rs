use crate::adapters::http::{build_client, extract_error_message};
use crate::ai::{ChatMessage, Completion, CompletionOptions};
use crate::config::{ProviderConfig, TextConfig};
use crate::domain::ports::TextGenerator;
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

/// OpenAI 相容的 `/chat/completions` 客戶端，主要供應商失敗時改用備援
pub struct AiTextClient {
    client: Client,
    primary: ProviderConfig,
    fallback: Option<ProviderConfig>,
    temperature: f32,
    max_tokens: u32,
}

impl AiTextClient {
    pub fn new(config: &TextConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_seconds)?,
            primary: config.primary.clone(),
            fallback: config.fallback.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.providers().next().is_some()
    }

    fn providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        std::iter::once(&self.primary)
            .chain(self.fallback.as_ref())
            .filter(|p| p.is_configured())
    }

    async fn call(
        &self,
        provider: &ProviderConfig,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion> {
        let url = format!("{}/chat/completions", provider.base_url.trim_end_matches('/'));
        let body = ChatCompletionRequest {
            model: &provider.model,
            messages,
            temperature: options.temperature.unwrap_or(self.temperature),
            max_tokens: options.max_tokens.unwrap_or(self.max_tokens),
            response_format: options
                .json
                .then(|| serde_json::json!({ "type": "json_object" })),
        };

        let mut request = self
            .client
            .post(&url)
            .bearer_auth(provider.api_key.trim())
            .json(&body);
        for (name, value) in &provider.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let started = Instant::now();
        tracing::debug!("🤖 {} → {} ({} messages)", provider.name, url, messages.len());
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(AppError::UpstreamError {
                provider: provider.name.clone(),
                status: status.as_u16(),
                message: extract_error_message(&text),
            });
        }

        let json: Value = serde_json::from_str(&text).map_err(|e| {
            AppError::ai_response(format!("{} returned invalid JSON: {}", provider.name, e))
        })?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                AppError::ai_response(format!("{} returned an empty completion", provider.name))
            })?;
        let model = json["model"].as_str().unwrap_or(&provider.model).to_string();

        tracing::info!(
            "🤖 {} completion from {} in {}ms",
            provider.name,
            model,
            started.elapsed().as_millis()
        );
        Ok(Completion {
            content: content.to_string(),
            model,
            provider: provider.name.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for AiTextClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion> {
        let mut last_error = None;
        for provider in self.providers() {
            match self.call(provider, messages, options).await {
                Ok(completion) => return Ok(completion),
                Err(e) => {
                    tracing::warn!("⚠️  {} failed: {}", provider.name, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::MissingConfigError {
            field: "ai.text.primary.api_key".to_string(),
        }))
    }
}
