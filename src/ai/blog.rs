//! AI 部落格文章生成：研究 → 撰稿 → 解析 → 配圖 → 組裝，結果存為草稿

use crate::ai::html;
use crate::ai::prompt::{self, BLOG_PROMPT, BLOG_SYSTEM};
use crate::ai::{ChatMessage, CompletionOptions, TrendTopic};
use crate::config::BlogConfig;
use crate::core::content::{ContentService, PostInput};
use crate::domain::model::{Post, PublishStatus, SeoMeta};
use crate::domain::ports::{ImageGenerator, TextGenerator, TrendSource};
use crate::utils::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

const MAX_SECTIONS: usize = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlogRequest {
    pub topic: Option<String>,
    /// 查詢趨勢用的關鍵字；未提供時使用主題或設定中的種子關鍵字
    pub keyword: Option<String>,
    /// 即使已指定主題，也以最熱門的相關搜尋取代
    #[serde(default)]
    pub use_trends: bool,
    pub tone: Option<String>,
    pub audience: Option<String>,
    pub sections: Option<usize>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub category: Option<String>,
    pub generate_images: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DraftSection {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    html: String,
    #[serde(default)]
    image_prompt: Option<String>,
}

/// 模型回傳的文章結構
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct BlogDraft {
    title: String,
    excerpt: Option<String>,
    meta_title: Option<String>,
    meta_description: Option<String>,
    category: Option<String>,
    tags: Vec<String>,
    cover_image_prompt: Option<String>,
    sections: Vec<DraftSection>,
}

#[derive(Debug, Clone)]
struct Research {
    topic: String,
    trends: Vec<TrendTopic>,
}

#[derive(Debug, Default)]
struct Illustrations {
    cover: Option<String>,
    /// (段落索引, 圖片網址, 替代文字)
    sections: Vec<(usize, String, String)>,
    generated: usize,
    failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlogGeneration {
    pub post: Post,
    pub topic: String,
    pub trends: Vec<TrendTopic>,
    pub model: String,
    pub images_generated: usize,
    pub images_failed: usize,
}

pub struct AiBlogService {
    text: Arc<dyn TextGenerator>,
    images: Option<Arc<dyn ImageGenerator>>,
    trends: Option<Arc<dyn TrendSource>>,
    content: Arc<ContentService>,
    config: BlogConfig,
    trend_limit: usize,
}

impl AiBlogService {
    pub fn new(
        text: Arc<dyn TextGenerator>,
        images: Option<Arc<dyn ImageGenerator>>,
        trends: Option<Arc<dyn TrendSource>>,
        content: Arc<ContentService>,
        config: BlogConfig,
        trend_limit: usize,
    ) -> Self {
        Self {
            text,
            images,
            trends,
            content,
            config,
            trend_limit: trend_limit.max(1),
        }
    }

    /// 生成並儲存一篇草稿；文字或解析失敗時不會寫入任何資料
    pub async fn generate(
        &self,
        request: BlogRequest,
        author_id: Option<u64>,
    ) -> Result<BlogGeneration> {
        let started = Instant::now();
        tracing::info!("✍️  Starting blog generation...");

        tracing::info!("🔎 Researching topic...");
        let research = self.research(&request).await?;
        tracing::info!("🔎 Topic `{}` with {} trends", research.topic, research.trends.len());

        tracing::info!("🤖 Drafting article...");
        let (raw, model) = self.draft(&research, &request).await?;

        let draft = parse_draft(&raw)?;
        tracing::info!(
            "📄 Parsed draft `{}` with {} sections",
            draft.title,
            draft.sections.len()
        );

        let illustrations = if request.generate_images.unwrap_or(self.config.generate_images) {
            tracing::info!("🖼️  Generating images...");
            self.illustrate(&draft).await
        } else {
            Illustrations::default()
        };

        let input = assemble(&draft, &illustrations, request.category.as_deref());
        let post = self.content.save_post(None, input, author_id, true).await?;

        tracing::info!(
            "✅ Generated post #{} `{}` in {}ms ({} images, {} failed)",
            post.id,
            post.slug,
            started.elapsed().as_millis(),
            illustrations.generated,
            illustrations.failed
        );
        Ok(BlogGeneration {
            post,
            topic: research.topic,
            trends: research.trends,
            model,
            images_generated: illustrations.generated,
            images_failed: illustrations.failed,
        })
    }

    /// 沒有主題或要求使用趨勢時查詢相關搜尋，並以最熱門者為主題
    async fn research(&self, request: &BlogRequest) -> Result<Research> {
        let topic = non_empty(request.topic.as_deref());
        let seed = non_empty(request.keyword.as_deref())
            .or(topic)
            .or(non_empty(self.config.seed_keyword.as_deref()));
        let Some(seed) = seed else {
            return Err(AppError::validation(
                "topic",
                "provide a topic or keyword, or configure a seed keyword",
            ));
        };

        if topic.is_some() && !request.use_trends {
            return Ok(Research {
                topic: seed_topic(topic, seed),
                trends: Vec::new(),
            });
        }

        let trends = match &self.trends {
            Some(source) => source
                .related_queries(seed, self.trend_limit)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!("⚠️  Trend lookup for `{}` failed: {}", seed, e);
                    Vec::new()
                }),
            None => {
                tracing::warn!("⚠️  Trends are not configured, skipping lookup for `{}`", seed);
                Vec::new()
            }
        };

        let topic = match trends.first() {
            Some(top) => top.query.clone(),
            None => seed_topic(topic, seed),
        };
        Ok(Research { topic, trends })
    }

    async fn draft(&self, research: &Research, request: &BlogRequest) -> Result<(String, String)> {
        let sections = request
            .sections
            .unwrap_or(self.config.default_sections)
            .clamp(1, MAX_SECTIONS);
        let keywords = if request.keywords.is_empty() {
            "(none)".to_string()
        } else {
            request.keywords.join(", ")
        };
        let trends = if research.trends.is_empty() {
            "(none)".to_string()
        } else {
            research
                .trends
                .iter()
                .map(|t| t.query.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut vars = HashMap::new();
        vars.insert("topic", research.topic.clone());
        vars.insert(
            "tone",
            non_empty(request.tone.as_deref())
                .unwrap_or(&self.config.default_tone)
                .to_string(),
        );
        vars.insert(
            "audience",
            non_empty(request.audience.as_deref())
                .unwrap_or(&self.config.default_audience)
                .to_string(),
        );
        vars.insert("sections", sections.to_string());
        vars.insert("keywords", keywords);
        vars.insert("trends", trends);
        let user_prompt = prompt::render(BLOG_PROMPT, &vars)?;

        let messages = [ChatMessage::system(BLOG_SYSTEM), ChatMessage::user(user_prompt)];
        let options = CompletionOptions {
            temperature: None,
            max_tokens: Some(self.config.max_tokens),
            json: true,
        };
        let completion = self.text.complete(&messages, &options).await?;
        Ok((completion.content, completion.model))
    }

    async fn illustrate(&self, draft: &BlogDraft) -> Illustrations {
        let mut out = Illustrations::default();
        let Some(images) = &self.images else {
            return out;
        };

        if let Some(prompt) = non_empty(draft.cover_image_prompt.as_deref()) {
            match images.generate(prompt).await {
                Ok(image) => {
                    out.cover = Some(image.url);
                    out.generated += 1;
                }
                Err(e) => {
                    tracing::warn!("⚠️  Cover image failed: {}", e);
                    out.failed += 1;
                }
            }
        }

        for (index, section) in draft.sections.iter().enumerate() {
            let Some(prompt) = non_empty(section.image_prompt.as_deref()) else {
                continue;
            };
            match images.generate(prompt).await {
                Ok(image) => {
                    out.sections.push((index, image.url, section.heading.clone()));
                    out.generated += 1;
                }
                Err(e) => {
                    tracing::warn!("⚠️  Image for section {} failed: {}", index + 1, e);
                    out.failed += 1;
                }
            }
        }

        out
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn seed_topic(topic: Option<&str>, seed: &str) -> String {
    topic.unwrap_or(seed).to_string()
}

fn clip(value: &str, max_chars: usize) -> String {
    let value = value.trim();
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        value.chars().take(max_chars).collect::<String>().trim_end().to_string()
    }
}

fn parse_draft(raw: &str) -> Result<BlogDraft> {
    let value = prompt::extract_json_object(raw)?;
    let draft: BlogDraft = serde_json::from_value(value)
        .map_err(|e| AppError::ai_response(format!("unexpected article structure: {}", e)))?;

    if draft.title.trim().is_empty() {
        return Err(AppError::ai_response("generated article has no title"));
    }
    if !draft.sections.iter().any(|s| !s.html.trim().is_empty()) {
        return Err(AppError::ai_response("generated article has no sections"));
    }
    Ok(draft)
}

fn assemble(draft: &BlogDraft, illustrations: &Illustrations, category: Option<&str>) -> PostInput {
    let mut body = String::new();
    for section in draft.sections.iter().filter(|s| !s.html.trim().is_empty()) {
        let heading = section.heading.trim();
        if !heading.is_empty() {
            body.push_str(&format!(
                "<h2 id=\"{}\">{}</h2>\n",
                html::heading_id(heading),
                html::escape(heading)
            ));
        }
        body.push_str(section.html.trim());
        body.push('\n');
    }

    // 圖片依段落標題順序插入；沒有對應標題時附加在文末
    let headed: Vec<usize> = draft
        .sections
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.html.trim().is_empty() && !s.heading.trim().is_empty())
        .map(|(i, _)| i)
        .collect();
    for (index, url, alt) in &illustrations.sections {
        let figure = html::figure(url, alt);
        let inserted = headed
            .iter()
            .position(|i| i == index)
            .and_then(|nth| html::insert_after_heading(&body, nth, &figure));
        match inserted {
            Some(updated) => body = updated,
            None => body.push_str(&figure),
        }
    }

    let excerpt = non_empty(draft.excerpt.as_deref()).map(|e| clip(e, 300));
    PostInput {
        title: clip(&draft.title, 200),
        slug: None,
        excerpt,
        body,
        cover_image: illustrations.cover.clone(),
        category: non_empty(category)
            .or(non_empty(draft.category.as_deref()))
            .map(str::to_string),
        tags: draft.tags.iter().take(10).map(|t| t.to_lowercase()).collect(),
        status: PublishStatus::Draft,
        is_featured: false,
        published_at: None,
        seo: SeoMeta {
            meta_title: non_empty(draft.meta_title.as_deref()).map(|t| clip(t, 70)),
            meta_description: non_empty(draft.meta_description.as_deref()).map(|d| clip(d, 320)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const RAW: &str = r#"```json
{
  "title": "Shipping Faster with Rust",
  "excerpt": "Why teams pick Rust for web backends.",
  "meta_title": "Shipping Faster with Rust",
  "meta_description": "A practical look at Rust for web backends.",
  "category": "Engineering",
  "tags": ["Rust", "backend"],
  "cover_image_prompt": "a crab building a server rack",
  "sections": [
    { "heading": "Why Rust", "html": "<p>Safety and speed.</p>", "image_prompt": "a fast crab" },
    { "heading": "Getting Started", "html": "<p>Install rustup.</p>", "image_prompt": null }
  ]
}
```"#;

    #[test]
    fn test_parse_draft() {
        let draft = parse_draft(RAW).unwrap();
        assert_eq!(draft.title, "Shipping Faster with Rust");
        assert_eq!(draft.sections.len(), 2);
        assert_eq!(draft.sections[0].image_prompt.as_deref(), Some("a fast crab"));
        assert!(draft.sections[1].image_prompt.is_none());
    }

    #[test]
    fn test_parse_draft_rejects_empty_article() {
        assert!(matches!(
            parse_draft(r#"{"title": "x", "sections": []}"#),
            Err(AppError::AiResponseError { .. })
        ));
        let untitled = r#"{"title": "", "sections": [{"heading": "a", "html": "<p>b</p>"}]}"#;
        assert!(parse_draft(untitled).is_err());
    }

    #[test]
    fn test_assemble_inserts_figures_after_headings() {
        let draft = parse_draft(RAW).unwrap();
        let illustrations = Illustrations {
            cover: Some("/uploads/ai/cover.png".to_string()),
            sections: vec![(0, "/uploads/ai/one.png".to_string(), "Why Rust".to_string())],
            generated: 2,
            failed: 0,
        };

        let input = assemble(&draft, &illustrations, None);
        assert_eq!(input.status, PublishStatus::Draft);
        assert_eq!(input.category.as_deref(), Some("Engineering"));
        assert_eq!(input.tags, vec!["rust", "backend"]);
        assert_eq!(input.cover_image.as_deref(), Some("/uploads/ai/cover.png"));
        assert!(input.body.starts_with(
            "<h2 id=\"why-rust\">Why Rust</h2><figure><img src=\"/uploads/ai/one.png\""
        ));
        assert!(input.body.contains("<h2 id=\"getting-started\">Getting Started</h2>"));
    }

    struct CountingTrends {
        lookups: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl TrendSource for CountingTrends {
        async fn related_queries(&self, keyword: &str, limit: usize) -> Result<Vec<TrendTopic>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::UpstreamError {
                    provider: "serpapi".to_string(),
                    status: 401,
                    message: "Invalid API key.".to_string(),
                });
            }
            Ok([format!("{} axum", keyword), format!("{} tutorial", keyword)]
                .into_iter()
                .take(limit)
                .map(|query| TrendTopic {
                    query,
                    value: "100".to_string(),
                })
                .collect())
        }
    }

    struct UnusedText;

    #[async_trait]
    impl TextGenerator for UnusedText {
        async fn complete(
            &self,
            _: &[ChatMessage],
            _: &CompletionOptions,
        ) -> Result<crate::ai::Completion> {
            Err(AppError::ai_response("not used"))
        }
    }

    fn service(
        trends: Option<Arc<CountingTrends>>,
        seed: Option<&str>,
        limit: usize,
    ) -> AiBlogService {
        let config = BlogConfig {
            seed_keyword: seed.map(str::to_string),
            ..Default::default()
        };
        let content = Arc::new(ContentService::new(Arc::new(crate::core::Store::in_memory())));
        AiBlogService::new(
            Arc::new(UnusedText),
            None,
            trends.map(|t| t as Arc<dyn TrendSource>),
            content,
            config,
            limit,
        )
    }

    fn counting(fail: bool) -> Arc<CountingTrends> {
        Arc::new(CountingTrends {
            lookups: AtomicUsize::new(0),
            fail,
        })
    }

    #[tokio::test]
    async fn test_research_without_topic_always_consults_trends() {
        let trends = counting(false);
        let blog = service(Some(trends.clone()), Some("rust"), 5);
        let request = BlogRequest {
            use_trends: false,
            ..Default::default()
        };

        let research = blog.research(&request).await.unwrap();
        assert_eq!(trends.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(research.topic, "rust axum");
        assert_eq!(research.trends.len(), 2);
    }

    #[tokio::test]
    async fn test_research_topic_with_trends_takes_top_query() {
        let trends = counting(false);
        let blog = service(Some(trends.clone()), None, 1);
        let request = BlogRequest {
            topic: Some("Rust web backends".to_string()),
            keyword: Some("rust".to_string()),
            use_trends: true,
            ..Default::default()
        };

        let research = blog.research(&request).await.unwrap();
        assert_eq!(trends.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(research.topic, "rust axum");
        // 筆數依設定的上限
        assert_eq!(research.trends.len(), 1);
    }

    #[tokio::test]
    async fn test_research_topic_without_trends_skips_lookup() {
        let trends = counting(false);
        let blog = service(Some(trends.clone()), None, 5);
        let request = BlogRequest {
            topic: Some("Rust web backends".to_string()),
            ..Default::default()
        };

        let research = blog.research(&request).await.unwrap();
        assert_eq!(trends.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(research.topic, "Rust web backends");
        assert!(research.trends.is_empty());
    }

    #[tokio::test]
    async fn test_research_falls_back_to_seed() {
        let trends = counting(true);
        let blog = service(Some(trends.clone()), Some("rust"), 5);
        let research = blog.research(&BlogRequest::default()).await.unwrap();
        assert_eq!(trends.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(research.topic, "rust");
        assert!(research.trends.is_empty());

        // 未設定趨勢來源時同樣以種子關鍵字為主題
        let blog = service(None, Some("rust"), 5);
        assert_eq!(blog.research(&BlogRequest::default()).await.unwrap().topic, "rust");

        let blog = service(None, None, 5);
        assert!(matches!(
            blog.research(&BlogRequest::default()).await,
            Err(AppError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_assemble_prefers_requested_category() {
        let draft = parse_draft(RAW).unwrap();
        let input = assemble(&draft, &Illustrations::default(), Some("News"));
        assert_eq!(input.category.as_deref(), Some("News"));
        assert!(!input.body.contains("<figure>"));
    }
}
