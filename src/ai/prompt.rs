//! 提示詞模板與模型輸出的 JSON 擷取

use crate::utils::error::{AppError, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([a-z][a-z0-9_]*)\}").expect("placeholder regex is valid"))
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("fence regex is valid")
    })
}

/// 以 `vars` 取代 `{name}` 佔位符，任何未提供的佔位符都視為錯誤
pub fn render(template: &str, vars: &HashMap<&str, String>) -> Result<String> {
    let mut missing = Vec::new();
    let rendered = placeholder_re().replace_all(template, |caps: &regex::Captures| {
        let name = &caps[1];
        match vars.get(name) {
            Some(value) => value.clone(),
            None => {
                missing.push(name.to_string());
                caps[0].to_string()
            }
        }
    });

    if !missing.is_empty() {
        missing.dedup();
        return Err(AppError::ProcessingError {
            message: format!("Unresolved prompt placeholders: {}", missing.join(", ")),
        });
    }
    Ok(rendered.into_owned())
}

/// 從模型回覆中取出 JSON 物件：先去掉 ``` 區塊，再取最外層的 `{...}`
pub fn extract_json_object(text: &str) -> Result<Value> {
    let inner = fence_re()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text);

    let start = inner.find('{');
    let end = inner.rfind('}');
    let candidate = match (start, end) {
        (Some(start), Some(end)) if end > start => &inner[start..=end],
        _ => {
            return Err(AppError::ai_response("model reply contains no JSON object"));
        }
    };

    let value: Value = serde_json::from_str(candidate)
        .map_err(|e| AppError::ai_response(format!("model reply is not valid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(AppError::ai_response("model reply JSON is not an object"));
    }
    Ok(value)
}

pub const BLOG_SYSTEM: &str = "You are a senior content strategist and copywriter for a digital agency. \
You write accurate, well-structured long-form articles in clean semantic HTML. \
Always answer with a single JSON object and nothing else.";

pub const BLOG_PROMPT: &str = r#"Write a blog article about: {topic}

Target audience: {audience}
Tone: {tone}
Number of sections: {sections}
Keywords to cover naturally: {keywords}
Related search trends: {trends}

Return a JSON object with exactly these keys:
- "title": article title (max 80 characters)
- "excerpt": one or two sentence summary (max 200 characters)
- "meta_title": SEO title (max 60 characters)
- "meta_description": SEO description (max 160 characters)
- "category": a single short category name
- "tags": array of 3 to 6 lowercase tags
- "cover_image_prompt": a short visual description for the cover image
- "sections": array of objects with "heading" (plain text), "html" (paragraphs and lists only, no h1 or h2) and "image_prompt" (short visual description, or null)
"#;

pub const SERVICE_DESCRIPTION_PROMPT: &str = r#"Write marketing copy for the agency service "{title}".
Notes from the team: {notes}
Tone: {tone}

Return a JSON object with keys:
- "summary": one sentence (max 200 characters)
- "description": 2 to 4 short HTML paragraphs
- "features": array of 3 to 6 short feature bullet strings
"#;

pub const CASE_STUDY_PROMPT: &str = r#"Write a case study for the project "{title}" delivered for {client_name}.
Industry: {industry}
Notes from the team: {notes}
Tone: {tone}

Return a JSON object with keys:
- "summary": one or two sentences
- "challenge": HTML paragraphs describing the client's challenge
- "solution": HTML paragraphs describing what the agency built
- "results": array of 3 to 5 short measurable outcome strings
"#;

pub const SEO_META_PROMPT: &str = r#"Write SEO metadata for the page titled "{title}".
Page content:
{content}

Return a JSON object with keys:
- "meta_title": at most 60 characters
- "meta_description": at most 160 characters
"#;

pub const REWRITE_PROMPT: &str = r#"Rewrite the following text. Tone: {tone}. Extra instructions: {instructions}

Text:
{text}

Return a JSON object with the single key "text" holding the rewritten text.
"#;
