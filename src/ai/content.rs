use crate::ai::prompt::{
    self, CASE_STUDY_PROMPT, REWRITE_PROMPT, SEO_META_PROMPT, SERVICE_DESCRIPTION_PROMPT,
};
use crate::ai::{ChatMessage, CompletionOptions};
use crate::domain::ports::TextGenerator;
use crate::utils::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

const SYSTEM: &str = "You are an expert copywriter for a digital agency. \
Always answer with a single JSON object and nothing else.";
const DEFAULT_TONE: &str = "professional";
const MAX_INPUT_CHARS: usize = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    ServiceDescription,
    CaseStudy,
    SeoMeta,
    Rewrite,
}

impl ContentKind {
    fn template(&self) -> &'static str {
        match self {
            ContentKind::ServiceDescription => SERVICE_DESCRIPTION_PROMPT,
            ContentKind::CaseStudy => CASE_STUDY_PROMPT,
            ContentKind::SeoMeta => SEO_META_PROMPT,
            ContentKind::Rewrite => REWRITE_PROMPT,
        }
    }

    pub fn required_inputs(&self) -> &'static [&'static str] {
        match self {
            ContentKind::ServiceDescription => &["title"],
            ContentKind::CaseStudy => &["title", "client_name"],
            ContentKind::SeoMeta => &["title", "content"],
            ContentKind::Rewrite => &["text"],
        }
    }

    fn optional_inputs(&self) -> &'static [&'static str] {
        match self {
            ContentKind::ServiceDescription => &["notes"],
            ContentKind::CaseStudy => &["industry", "notes"],
            ContentKind::SeoMeta => &[],
            ContentKind::Rewrite => &["instructions"],
        }
    }

    /// 模型回覆必須包含的鍵
    pub fn output_keys(&self) -> &'static [&'static str] {
        match self {
            ContentKind::ServiceDescription => &["summary", "description", "features"],
            ContentKind::CaseStudy => &["summary", "challenge", "solution", "results"],
            ContentKind::SeoMeta => &["meta_title", "meta_description"],
            ContentKind::Rewrite => &["text"],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentRequest {
    pub kind: ContentKind,
    #[serde(default)]
    pub input: HashMap<String, String>,
    pub tone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentSuggestion {
    pub kind: ContentKind,
    pub fields: Map<String, Value>,
    pub model: String,
}

/// 後台編輯器用的文案建議 (不會寫入資料)
pub struct AiContentService {
    text: Arc<dyn TextGenerator>,
}

impl AiContentService {
    pub fn new(text: Arc<dyn TextGenerator>) -> Self {
        Self { text }
    }

    pub async fn generate(&self, request: ContentRequest) -> Result<ContentSuggestion> {
        let kind = request.kind;
        let mut vars: HashMap<&str, String> = HashMap::new();

        for &key in kind.required_inputs() {
            let value = request
                .input
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AppError::validation(format!("input.{}", key), "is required"))?;
            if value.chars().count() > MAX_INPUT_CHARS {
                return Err(AppError::validation(
                    format!("input.{}", key),
                    format!("must be at most {} characters", MAX_INPUT_CHARS),
                ));
            }
            vars.insert(key, value.to_string());
        }
        for &key in kind.optional_inputs() {
            let value = request
                .input
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .unwrap_or("(none)");
            vars.insert(key, value.chars().take(MAX_INPUT_CHARS).collect());
        }
        let tone = request
            .tone
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TONE);
        vars.insert("tone", tone.to_string());

        let user_prompt = prompt::render(kind.template(), &vars)?;
        let messages = [ChatMessage::system(SYSTEM), ChatMessage::user(user_prompt)];
        let options = CompletionOptions {
            json: true,
            ..Default::default()
        };
        let completion = self.text.complete(&messages, &options).await?;

        let fields = match prompt::extract_json_object(&completion.content)? {
            Value::Object(map) => map,
            _ => return Err(AppError::ai_response("model reply JSON is not an object")),
        };
        let missing: Vec<&str> = kind
            .output_keys()
            .iter()
            .copied()
            .filter(|key| fields.get(*key).is_none_or(Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(AppError::ai_response(format!(
                "model reply is missing: {}",
                missing.join(", ")
            )));
        }

        // 只保留預期的鍵
        let fields: Map<String, Value> = fields
            .into_iter()
            .filter(|(key, _)| kind.output_keys().contains(&key.as_str()))
            .collect();

        tracing::info!("✨ Generated {:?} suggestion with {}", kind, completion.model);
        Ok(ContentSuggestion {
            kind,
            fields,
            model: completion.model,
        })
    }
}
