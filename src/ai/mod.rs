//! AI integrations: an OpenAI-compatible text client, image generation,
//! trend lookup, and the services built on them (blog generation, content
//! suggestions, the public chat proxy).

pub mod blog;
pub mod chat;
pub mod content;
pub mod html;
pub mod image_client;
pub mod prompt;
pub mod text_client;
pub mod trends;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// 要求供應商回傳 JSON 物件
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    /// 供應商回報的模型名稱
    pub model: String,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// 對外網址 (上傳目錄前綴 + 路徑)
    pub url: String,
    /// 儲存於上傳目錄下的相對路徑
    pub path: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendTopic {
    pub query: String,
    pub value: String,
}
