use crate::ai::{ChatMessage, Completion, CompletionOptions, GeneratedImage, TrendTopic};
use crate::utils::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>>;
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;
}

/// OpenAI 相容的文字生成
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage>;
}

#[async_trait]
pub trait TrendSource: Send + Sync {
    async fn related_queries(&self, keyword: &str, limit: usize) -> Result<Vec<TrendTopic>>;
}
