use crate::adapters::http::{build_client, extract_error_message};
use crate::ai::GeneratedImage;
use crate::config::ImageConfig;
use crate::domain::ports::{ImageGenerator, Storage};
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;

const PROVIDER: &str = "image";

/// Workers 風格的圖片生成端點：POST `{prompt, width, height}`，
/// 回應可能是圖片位元組，或含 base64 `image` / `result.image` 的 JSON
pub struct WorkersImageClient {
    client: Client,
    config: ImageConfig,
    uploads: Arc<dyn Storage>,
    url_prefix: String,
}

impl WorkersImageClient {
    pub fn new(config: &ImageConfig, uploads: Arc<dyn Storage>, url_prefix: &str) -> Result<Self> {
        if !config.is_configured() {
            return Err(AppError::MissingConfigError {
                field: "ai.image.endpoint".to_string(),
            });
        }
        Ok(Self {
            client: build_client(config.timeout_seconds)?,
            config: config.clone(),
            uploads,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        })
    }

    async fn request_image(&self, prompt: &str) -> Result<(Vec<u8>, String)> {
        let mut body = json!({ "prompt": prompt });
        if let Some(width) = self.config.width {
            body["width"] = json!(width);
        }
        if let Some(height) = self.config.height {
            body["height"] = json!(height);
        }

        let mut request = self.client.post(&self.config.endpoint).json(&body);
        if !self.config.api_key.trim().is_empty() {
            request = request.bearer_auth(self.config.api_key.trim());
        }

        let response = request.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(AppError::UpstreamError {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                message: extract_error_message(&String::from_utf8_lossy(&bytes)),
            });
        }

        if content_type.starts_with("image/") {
            return Ok((bytes.to_vec(), content_type));
        }

        decode_json_image(&bytes)
    }
}

fn decode_json_image(body: &[u8]) -> Result<(Vec<u8>, String)> {
    let json: Value = serde_json::from_slice(body)
        .map_err(|e| {
            AppError::ai_response(format!("image response is neither an image nor JSON: {}", e))
        })?;
    let encoded = json["image"]
        .as_str()
        .or_else(|| json["result"]["image"].as_str())
        .ok_or_else(|| AppError::ai_response("image response has no `image` field"))?;

    // 也接受 data URL
    let (mime, data) = match encoded.strip_prefix("data:") {
        Some(rest) => match rest.split_once(";base64,") {
            Some((mime, data)) => (mime.to_string(), data),
            None => return Err(AppError::ai_response("unsupported data URL in image response")),
        },
        None => ("image/png".to_string(), encoded),
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| AppError::ai_response(format!("invalid base64 image: {}", e)))?;
    if bytes.is_empty() {
        return Err(AppError::ai_response("image response is empty"));
    }
    let mime = sniff_mime(&bytes).map(str::to_string).unwrap_or(mime);
    Ok((bytes, mime))
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.len() > 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

fn extension_for(content_type: &str) -> &'static str {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

#[async_trait]
impl ImageGenerator for WorkersImageClient {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage> {
        let (bytes, content_type) = self.request_image(prompt).await?;
        let path = format!("ai/{}.{}", uuid::Uuid::new_v4(), extension_for(&content_type));
        self.uploads.write_file(&path, &bytes).await?;

        tracing::info!("🖼️  Stored generated image {} ({} bytes)", path, bytes.len());
        Ok(GeneratedImage {
            url: format!("{}/{}", self.url_prefix, path),
            path,
            bytes: bytes.len(),
        })
    }
}
