use crate::ai::{ChatMessage, ChatRole, CompletionOptions};
use crate::config::ChatConfig;
use crate::core::content::ContentService;
use crate::domain::ports::TextGenerator;
use crate::utils::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub model: String,
}

/// 網站聊天機器人代理：驗證對話、加上系統提示詞後轉給文字模型
pub struct ChatService {
    text: Arc<dyn TextGenerator>,
    content: Arc<ContentService>,
    config: ChatConfig,
}

impl ChatService {
    pub fn new(
        text: Arc<dyn TextGenerator>,
        content: Arc<ContentService>,
        config: ChatConfig,
    ) -> Self {
        Self { text, content, config }
    }

    pub fn validate(&self, messages: &[ChatMessage]) -> Result<()> {
        if messages.is_empty() || messages.len() > self.config.max_messages {
            return Err(AppError::validation(
                "messages",
                format!("must contain between 1 and {} messages", self.config.max_messages),
            ));
        }

        for (i, message) in messages.iter().enumerate() {
            let field = format!("messages[{}]", i);
            if message.role == ChatRole::System {
                return Err(AppError::validation(field, "role must be `user` or `assistant`"));
            }
            let chars = message.content.trim().chars().count();
            if chars == 0 || chars > self.config.max_message_chars {
                return Err(AppError::validation(
                    field,
                    format!("content must be 1 to {} characters", self.config.max_message_chars),
                ));
            }
        }

        if messages.last().map(|m| m.role) != Some(ChatRole::User) {
            return Err(AppError::validation(
                "messages",
                "the last message must come from the user",
            ));
        }
        Ok(())
    }

    async fn system_prompt(&self) -> String {
        let mut prompt = self.config.system_prompt.trim().to_string();
        if self.config.include_services {
            let services = self.content.list_services().await;
            if !services.is_empty() {
                prompt.push_str("\n\nServices we offer:\n");
                for service in services {
                    prompt.push_str(&format!("- {}: {}\n", service.title, service.summary));
                }
            }
        }
        prompt
    }

    pub async fn reply(&self, request: ChatRequest) -> Result<ChatReply> {
        self.validate(&request.messages)?;

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ChatMessage::system(self.system_prompt().await));
        messages.extend(request.messages.into_iter().map(|m| ChatMessage {
            role: m.role,
            content: m.content.trim().to_string(),
        }));

        let options = CompletionOptions {
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            json: false,
        };
        let completion = self.text.complete(&messages, &options).await?;
        tracing::debug!("💬 Chat reply from {} ({} turns)", completion.model, messages.len() - 1);

        Ok(ChatReply {
            reply: completion.content,
            model: completion.model,
        })
    }
}
