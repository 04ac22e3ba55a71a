use crate::ai::html;
use crate::core::store::{slugify, unique_slug, Store};
use crate::domain::model::{
    Brand, CaseStudy, Page, Post, PublishStatus, SeoMeta, Service, Testimonial,
};
use crate::utils::error::{AppError, Result};
use crate::utils::validation::{validate_length, validate_optional_url, Validate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

const POSTS_PER_PAGE: usize = 10;
const MAX_POSTS_PER_PAGE: usize = 50;
const RELATED_POSTS: usize = 3;
const EXCERPT_CHARS: usize = 200;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceInput {
    pub title: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    pub icon: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub seo: SeoMeta,
}

impl Validate for ServiceInput {
    fn validate(&self) -> Result<()> {
        validate_length("title", &self.title, 1, 200)?;
        validate_length("summary", &self.summary, 0, 500)?;
        validate_seo(&self.seo)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseStudyInput {
    pub title: String,
    pub slug: Option<String>,
    pub client_name: String,
    pub industry: Option<String>,
    pub service_slug: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub challenge: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub results: Vec<String>,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub status: PublishStatus,
    #[serde(default)]
    pub is_featured: bool,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seo: SeoMeta,
}

impl Validate for CaseStudyInput {
    fn validate(&self) -> Result<()> {
        validate_length("title", &self.title, 1, 200)?;
        validate_length("client_name", &self.client_name, 1, 150)?;
        validate_length("summary", &self.summary, 0, 1000)?;
        validate_optional_url("cover_image", self.cover_image.as_deref())?;
        validate_seo(&self.seo)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostInput {
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    #[serde(default)]
    pub body: String,
    pub cover_image: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: PublishStatus,
    #[serde(default)]
    pub is_featured: bool,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seo: SeoMeta,
}

impl Validate for PostInput {
    fn validate(&self) -> Result<()> {
        validate_length("title", &self.title, 1, 200)?;
        if let Some(excerpt) = &self.excerpt {
            validate_length("excerpt", excerpt, 0, 500)?;
        }
        if self.status == PublishStatus::Published {
            validate_length("body", &html::strip_tags(&self.body), 1, usize::MAX)?;
        }
        validate_optional_url("cover_image", self.cover_image.as_deref())?;
        if self.tags.len() > 20 {
            return Err(AppError::validation("tags", "at most 20 tags"));
        }
        validate_seo(&self.seo)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestimonialInput {
    pub author_name: String,
    pub author_title: Option<String>,
    pub company: Option<String>,
    pub quote: String,
    pub rating: u8,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i32,
}

impl Validate for TestimonialInput {
    fn validate(&self) -> Result<()> {
        validate_length("author_name", &self.author_name, 1, 100)?;
        validate_length("quote", &self.quote, 1, 2000)?;
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::validation("rating", "must be between 1 and 5"));
        }
        validate_optional_url("avatar_url", self.avatar_url.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrandInput {
    pub name: String,
    pub slug: Option<String>,
    pub logo_url: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Validate for BrandInput {
    fn validate(&self) -> Result<()> {
        validate_length("name", &self.name, 1, 150)?;
        validate_optional_url("logo_url", self.logo_url.as_deref())?;
        validate_optional_url("website", self.website.as_deref())
    }
}

fn validate_seo(seo: &SeoMeta) -> Result<()> {
    if let Some(title) = &seo.meta_title {
        validate_length("seo.meta_title", title, 0, 70)?;
    }
    if let Some(description) = &seo.meta_description {
        validate_length("seo.meta_description", description, 0, 320)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseStudyFilter {
    pub industry: Option<String>,
    pub service: Option<String>,
    pub featured: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub featured: Option<bool>,
}

/// 列表用的文章摘要 (不含內文)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: u64,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub cover_image: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub is_featured: bool,
    pub reading_minutes: u32,
    pub published_at: Option<DateTime<Utc>>,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            slug: post.slug.clone(),
            excerpt: post.excerpt.clone(),
            cover_image: post.cover_image.clone(),
            category: post.category.clone(),
            tags: post.tags.clone(),
            is_featured: post.is_featured,
            reading_minutes: post.reading_minutes,
            published_at: post.published_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub related: Vec<PostSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryCount {
    pub name: String,
    pub count: usize,
}

/// 處理 slug：明確指定者須未被使用，否則由標題產生唯一 slug
fn resolve_slug(
    requested: Option<&str>,
    title: &str,
    current: Option<&str>,
    taken: impl Fn(&str) -> bool,
) -> Result<String> {
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(requested) => {
            let slug = slugify(requested);
            if Some(slug.as_str()) != current && taken(&slug) {
                return Err(AppError::conflict(format!("slug `{}` is already taken", slug)));
            }
            Ok(slug)
        }
        None => match current {
            Some(current) => Ok(current.to_string()),
            None => Ok(unique_slug(&slugify(title), taken)),
        },
    }
}

fn publish_time(
    status: PublishStatus,
    requested: Option<DateTime<Utc>>,
    existing: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match (status, requested.or(existing)) {
        (PublishStatus::Published, None) => Some(now),
        (_, at) => at,
    }
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

pub struct ContentService {
    store: Arc<Store>,
}

impl ContentService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    // ---- 公開端點 ----

    pub async fn list_services(&self) -> Vec<Service> {
        let mut services: Vec<Service> = self
            .store
            .read(|data| data.services.iter().filter(|s| s.is_active).cloned().collect())
            .await;
        services.sort_by_key(|s| (s.sort_order, s.id));
        services
    }

    pub async fn get_service(&self, slug: &str) -> Result<Service> {
        self.store
            .read(|data| data.services.find(|s| s.is_active && s.slug == slug).cloned())
            .await
            .ok_or_else(|| AppError::not_found("service", slug))
    }

    pub async fn list_case_studies(&self, filter: &CaseStudyFilter) -> Vec<CaseStudy> {
        let now = Utc::now();
        let mut items: Vec<CaseStudy> = self
            .store
            .read(|data| {
                data.case_studies
                    .iter()
                    .filter(|c| {
                        c.status == PublishStatus::Published
                            && c.published_at.is_some_and(|at| at <= now)
                    })
                    .filter(|c| {
                        filter.industry.as_ref().is_none_or(|industry| {
                            c.industry
                                .as_ref()
                                .is_some_and(|i| i.eq_ignore_ascii_case(industry))
                        })
                    })
                    .filter(|c| {
                        filter
                            .service
                            .as_ref()
                            .is_none_or(|service| c.service_slug.as_ref() == Some(service))
                    })
                    .filter(|c| filter.featured.is_none_or(|f| c.is_featured == f))
                    .cloned()
                    .collect()
            })
            .await;
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(b.id.cmp(&a.id)));
        items
    }

    pub async fn get_case_study(&self, slug: &str) -> Result<CaseStudy> {
        let now = Utc::now();
        self.store
            .read(|data| {
                data.case_studies
                    .find(|c| {
                        c.slug == slug
                            && c.status == PublishStatus::Published
                            && c.published_at.is_some_and(|at| at <= now)
                    })
                    .cloned()
            })
            .await
            .ok_or_else(|| AppError::not_found("case study", slug))
    }

    async fn visible_posts(&self) -> Vec<Post> {
        let now = Utc::now();
        let mut posts: Vec<Post> = self
            .store
            .read(|data| data.posts.iter().filter(|p| p.is_visible_at(now)).cloned().collect())
            .await;
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(b.id.cmp(&a.id)));
        posts
    }

    pub async fn list_posts(&self, query: &PostQuery) -> Page<PostSummary> {
        let search = query
            .search
            .as_ref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let summaries: Vec<PostSummary> = self
            .visible_posts()
            .await
            .iter()
            .filter(|p| {
                query.category.as_ref().is_none_or(|category| {
                    p.category
                        .as_ref()
                        .is_some_and(|c| c.eq_ignore_ascii_case(category))
                })
            })
            .filter(|p| {
                query
                    .tag
                    .as_ref()
                    .is_none_or(|tag| p.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            })
            .filter(|p| {
                search.as_ref().is_none_or(|needle| {
                    p.title.to_lowercase().contains(needle)
                        || p.excerpt.to_lowercase().contains(needle)
                })
            })
            .filter(|p| query.featured.is_none_or(|f| p.is_featured == f))
            .map(PostSummary::from)
            .collect();

        Page::paginate(
            &summaries,
            query.page,
            query.per_page,
            POSTS_PER_PAGE,
            MAX_POSTS_PER_PAGE,
        )
    }

    pub async fn get_post(&self, slug: &str) -> Result<PostDetail> {
        let posts = self.visible_posts().await;
        let post = posts
            .iter()
            .find(|p| p.slug == slug)
            .cloned()
            .ok_or_else(|| AppError::not_found("post", slug))?;

        let related = match &post.category {
            Some(category) => posts
                .iter()
                .filter(|p| p.id != post.id && p.category.as_ref() == Some(category))
                .take(RELATED_POSTS)
                .map(PostSummary::from)
                .collect(),
            None => Vec::new(),
        };

        Ok(PostDetail { post, related })
    }

    pub async fn post_categories(&self) -> Vec<CategoryCount> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for post in self.visible_posts().await {
            if let Some(category) = post.category {
                *counts.entry(category).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .map(|(name, count)| CategoryCount { name, count })
            .collect()
    }

    pub async fn list_testimonials(&self, featured: Option<bool>) -> Vec<Testimonial> {
        let mut items: Vec<Testimonial> = self
            .store
            .read(|data| {
                data.testimonials
                    .iter()
                    .filter(|t| t.is_active && featured.is_none_or(|f| t.is_featured == f))
                    .cloned()
                    .collect()
            })
            .await;
        items.sort_by_key(|t| (t.sort_order, t.id));
        items
    }

    pub async fn list_brands(&self) -> Vec<Brand> {
        let mut items: Vec<Brand> = self
            .store
            .read(|data| data.brands.iter().filter(|b| b.is_active).cloned().collect())
            .await;
        items.sort_by_key(|b| (b.sort_order, b.id));
        items
    }

    // ---- 後台：服務 ----

    pub async fn admin_list_services(&self) -> Vec<Service> {
        let mut items: Vec<Service> = self
            .store
            .read(|data| data.services.iter().cloned().collect())
            .await;
        items.sort_by_key(|s| (s.sort_order, s.id));
        items
    }

    pub async fn admin_get_service(&self, id: u64) -> Result<Service> {
        self.store
            .read(|data| data.services.get(id).cloned())
            .await
            .ok_or_else(|| AppError::not_found("service", id))
    }

    pub async fn save_service(&self, id: Option<u64>, input: ServiceInput) -> Result<Service> {
        input.validate()?;
        let now = Utc::now();

        let saved = self
            .store
            .write(|data| {
                let current = match id {
                    Some(id) => Some(
                        data.services
                            .get(id)
                            .cloned()
                            .ok_or_else(|| AppError::not_found("service", id))?,
                    ),
                    None => None,
                };
                let slug = resolve_slug(
                    input.slug.as_deref(),
                    &input.title,
                    current.as_ref().map(|c| c.slug.as_str()),
                    |s| data.services.find(|x| x.slug == s).is_some(),
                )?;

                let build = |id: u64, created_at: DateTime<Utc>| Service {
                    id,
                    title: input.title.trim().to_string(),
                    slug,
                    summary: input.summary.trim().to_string(),
                    description: html::sanitize(&input.description),
                    icon: clean_optional(input.icon),
                    features: clean_list(input.features),
                    sort_order: input.sort_order,
                    is_active: input.is_active,
                    seo: input.seo,
                    created_at,
                    updated_at: now,
                };

                Ok(match current {
                    Some(current) => {
                        let updated = build(current.id, current.created_at);
                        if let Some(slot) = data.services.get_mut(current.id) {
                            *slot = updated.clone();
                        }
                        updated
                    }
                    None => data.services.insert_with(|id| build(id, now)).clone(),
                })
            })
            .await?;

        tracing::info!("🧩 Saved service #{} `{}`", saved.id, saved.slug);
        Ok(saved)
    }

    pub async fn delete_service(&self, id: u64) -> Result<()> {
        self.store
            .write(|data| {
                data.services
                    .remove(id)
                    .map(|_| ())
                    .ok_or_else(|| AppError::not_found("service", id))
            })
            .await
    }

    // ---- 後台：案例 ----

    pub async fn admin_list_case_studies(&self) -> Vec<CaseStudy> {
        let mut items: Vec<CaseStudy> =
            self.store.read(|data| data.case_studies.iter().cloned().collect()).await;
        items.sort_by(|a, b| b.id.cmp(&a.id));
        items
    }

    pub async fn admin_get_case_study(&self, id: u64) -> Result<CaseStudy> {
        self.store
            .read(|data| data.case_studies.get(id).cloned())
            .await
            .ok_or_else(|| AppError::not_found("case study", id))
    }

    pub async fn save_case_study(
        &self,
        id: Option<u64>,
        input: CaseStudyInput,
    ) -> Result<CaseStudy> {
        input.validate()?;
        let now = Utc::now();

        let saved = self
            .store
            .write(|data| {
                let current = match id {
                    Some(id) => Some(
                        data.case_studies
                            .get(id)
                            .cloned()
                            .ok_or_else(|| AppError::not_found("case study", id))?,
                    ),
                    None => None,
                };
                let service_slug = clean_optional(input.service_slug);
                if let Some(service) = &service_slug {
                    if data.services.find(|s| &s.slug == service).is_none() {
                        return Err(AppError::validation(
                            "service_slug",
                            format!("unknown service `{}`", service),
                        ));
                    }
                }
                let slug = resolve_slug(
                    input.slug.as_deref(),
                    &input.title,
                    current.as_ref().map(|c| c.slug.as_str()),
                    |s| data.case_studies.find(|x| x.slug == s).is_some(),
                )?;
                let published_at = publish_time(
                    input.status,
                    input.published_at,
                    current.as_ref().and_then(|c| c.published_at),
                    now,
                );

                let build = |id: u64, created_at: DateTime<Utc>| CaseStudy {
                    id,
                    title: input.title.trim().to_string(),
                    slug,
                    client_name: input.client_name.trim().to_string(),
                    industry: clean_optional(input.industry),
                    service_slug,
                    summary: input.summary.trim().to_string(),
                    challenge: html::sanitize(&input.challenge),
                    solution: html::sanitize(&input.solution),
                    results: clean_list(input.results),
                    cover_image: clean_optional(input.cover_image),
                    status: input.status,
                    is_featured: input.is_featured,
                    published_at,
                    seo: input.seo,
                    created_at,
                    updated_at: now,
                };

                Ok(match current {
                    Some(current) => {
                        let updated = build(current.id, current.created_at);
                        if let Some(slot) = data.case_studies.get_mut(current.id) {
                            *slot = updated.clone();
                        }
                        updated
                    }
                    None => data.case_studies.insert_with(|id| build(id, now)).clone(),
                })
            })
            .await?;

        tracing::info!("📁 Saved case study #{} `{}` ({:?})", saved.id, saved.slug, saved.status);
        Ok(saved)
    }

    pub async fn delete_case_study(&self, id: u64) -> Result<()> {
        self.store
            .write(|data| {
                data.case_studies
                    .remove(id)
                    .map(|_| ())
                    .ok_or_else(|| AppError::not_found("case study", id))
            })
            .await
    }

    // ---- 後台：文章 ----

    pub async fn admin_list_posts(
        &self,
        query: &PostQuery,
        status: Option<PublishStatus>,
    ) -> Page<Post> {
        let mut items: Vec<Post> = self
            .store
            .read(|data| {
                data.posts
                    .iter()
                    .filter(|p| status.is_none_or(|s| p.status == s))
                    .cloned()
                    .collect()
            })
            .await;
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Page::paginate(&items, query.page, query.per_page, POSTS_PER_PAGE, MAX_POSTS_PER_PAGE)
    }

    pub async fn admin_get_post(&self, id: u64) -> Result<Post> {
        self.store
            .read(|data| data.posts.get(id).cloned())
            .await
            .ok_or_else(|| AppError::not_found("post", id))
    }

    /// 建立或更新文章；`author_id` 只在建立時寫入
    pub async fn save_post(
        &self,
        id: Option<u64>,
        input: PostInput,
        author_id: Option<u64>,
        ai_generated: bool,
    ) -> Result<Post> {
        input.validate()?;
        let now = Utc::now();
        let body = html::sanitize(&input.body);
        let excerpt = match clean_optional(input.excerpt) {
            Some(excerpt) => excerpt,
            None => html::excerpt(&body, EXCERPT_CHARS),
        };
        let reading_minutes = html::reading_minutes(&body);

        let saved = self
            .store
            .write(|data| {
                let current = match id {
                    Some(id) => Some(
                        data.posts
                            .get(id)
                            .cloned()
                            .ok_or_else(|| AppError::not_found("post", id))?,
                    ),
                    None => None,
                };
                let slug = resolve_slug(
                    input.slug.as_deref(),
                    &input.title,
                    current.as_ref().map(|c| c.slug.as_str()),
                    |s| data.posts.find(|x| x.slug == s).is_some(),
                )?;
                let published_at = publish_time(
                    input.status,
                    input.published_at,
                    current.as_ref().and_then(|c| c.published_at),
                    now,
                );

                let build = |id: u64,
                             created_at: DateTime<Utc>,
                             author_id: Option<u64>,
                             ai_generated: bool| Post {
                    id,
                    title: input.title.trim().to_string(),
                    slug,
                    excerpt,
                    body,
                    cover_image: clean_optional(input.cover_image),
                    category: clean_optional(input.category),
                    tags: clean_list(input.tags),
                    author_id,
                    status: input.status,
                    is_featured: input.is_featured,
                    reading_minutes,
                    published_at,
                    seo: input.seo,
                    ai_generated,
                    created_at,
                    updated_at: now,
                };

                Ok(match current {
                    Some(current) => {
                        let updated = build(
                            current.id,
                            current.created_at,
                            current.author_id,
                            current.ai_generated,
                        );
                        if let Some(slot) = data.posts.get_mut(current.id) {
                            *slot = updated.clone();
                        }
                        updated
                    }
                    None => data
                        .posts
                        .insert_with(|id| build(id, now, author_id, ai_generated))
                        .clone(),
                })
            })
            .await?;

        tracing::info!("📝 Saved post #{} `{}` ({:?})", saved.id, saved.slug, saved.status);
        Ok(saved)
    }

    pub async fn delete_post(&self, id: u64) -> Result<()> {
        self.store
            .write(|data| {
                data.posts
                    .remove(id)
                    .map(|_| ())
                    .ok_or_else(|| AppError::not_found("post", id))
            })
            .await
    }

    // ---- 後台：推薦 ----

    pub async fn admin_list_testimonials(&self) -> Vec<Testimonial> {
        let mut items: Vec<Testimonial> =
            self.store.read(|data| data.testimonials.iter().cloned().collect()).await;
        items.sort_by_key(|t| (t.sort_order, t.id));
        items
    }

    pub async fn admin_get_testimonial(&self, id: u64) -> Result<Testimonial> {
        self.store
            .read(|data| data.testimonials.get(id).cloned())
            .await
            .ok_or_else(|| AppError::not_found("testimonial", id))
    }

    pub async fn save_testimonial(
        &self,
        id: Option<u64>,
        input: TestimonialInput,
    ) -> Result<Testimonial> {
        input.validate()?;
        let now = Utc::now();

        self.store
            .write(|data| {
                let created_at = match id {
                    Some(id) => {
                        data.testimonials
                            .get(id)
                            .ok_or_else(|| AppError::not_found("testimonial", id))?
                            .created_at
                    }
                    None => now,
                };
                let build = |id: u64| Testimonial {
                    id,
                    author_name: input.author_name.trim().to_string(),
                    author_title: clean_optional(input.author_title),
                    company: clean_optional(input.company),
                    quote: input.quote.trim().to_string(),
                    rating: input.rating,
                    avatar_url: clean_optional(input.avatar_url),
                    is_featured: input.is_featured,
                    is_active: input.is_active,
                    sort_order: input.sort_order,
                    created_at,
                    updated_at: now,
                };

                Ok(match id {
                    Some(id) => {
                        let updated = build(id);
                        if let Some(slot) = data.testimonials.get_mut(id) {
                            *slot = updated.clone();
                        }
                        updated
                    }
                    None => data.testimonials.insert_with(build).clone(),
                })
            })
            .await
    }

    pub async fn delete_testimonial(&self, id: u64) -> Result<()> {
        self.store
            .write(|data| {
                data.testimonials
                    .remove(id)
                    .map(|_| ())
                    .ok_or_else(|| AppError::not_found("testimonial", id))
            })
            .await
    }

    // ---- 後台：品牌 ----

    pub async fn admin_list_brands(&self) -> Vec<Brand> {
        let mut items: Vec<Brand> = self
            .store
            .read(|data| data.brands.iter().cloned().collect())
            .await;
        items.sort_by_key(|b| (b.sort_order, b.id));
        items
    }

    pub async fn admin_get_brand(&self, id: u64) -> Result<Brand> {
        self.store
            .read(|data| data.brands.get(id).cloned())
            .await
            .ok_or_else(|| AppError::not_found("brand", id))
    }

    pub async fn save_brand(&self, id: Option<u64>, input: BrandInput) -> Result<Brand> {
        input.validate()?;
        let now = Utc::now();

        self.store
            .write(|data| {
                let current = match id {
                    Some(id) => Some(
                        data.brands
                            .get(id)
                            .cloned()
                            .ok_or_else(|| AppError::not_found("brand", id))?,
                    ),
                    None => None,
                };
                let slug = resolve_slug(
                    input.slug.as_deref(),
                    &input.name,
                    current.as_ref().map(|c| c.slug.as_str()),
                    |s| data.brands.find(|x| x.slug == s).is_some(),
                )?;
                let build = |id: u64, created_at: DateTime<Utc>| Brand {
                    id,
                    name: input.name.trim().to_string(),
                    slug,
                    logo_url: clean_optional(input.logo_url),
                    website: clean_optional(input.website),
                    sort_order: input.sort_order,
                    is_active: input.is_active,
                    created_at,
                    updated_at: now,
                };

                Ok(match current {
                    Some(current) => {
                        let updated = build(current.id, current.created_at);
                        if let Some(slot) = data.brands.get_mut(current.id) {
                            *slot = updated.clone();
                        }
                        updated
                    }
                    None => data.brands.insert_with(|id| build(id, now)).clone(),
                })
            })
            .await
    }

    pub async fn delete_brand(&self, id: u64) -> Result<()> {
        self.store
            .write(|data| {
                data.brands
                    .remove(id)
                    .map(|_| ())
                    .ok_or_else(|| AppError::not_found("brand", id))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn service() -> ContentService {
        ContentService::new(Arc::new(Store::in_memory()))
    }

    fn post(title: &str, category: &str, status: PublishStatus) -> PostInput {
        PostInput {
            title: title.to_string(),
            body: format!("<p>{} body text</p>", title),
            category: Some(category.to_string()),
            status,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_post_visibility_and_slug_generation() {
        let content = service();

        let published = content
            .save_post(None, post("Hello World", "News", PublishStatus::Published), Some(1), false)
            .await
            .unwrap();
        assert_eq!(published.slug, "hello-world");
        assert!(published.published_at.is_some());
        assert_eq!(published.reading_minutes, 1);
        assert_eq!(published.excerpt, "Hello World body text");

        let draft = content
            .save_post(None, post("Hello World", "News", PublishStatus::Draft), None, false)
            .await
            .unwrap();
        assert_eq!(draft.slug, "hello-world-2");

        let mut scheduled = post("Future", "News", PublishStatus::Published);
        scheduled.published_at = Some(Utc::now() + Duration::days(3));
        content.save_post(None, scheduled, None, false).await.unwrap();

        let page = content.list_posts(&PostQuery::default()).await;
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].slug, "hello-world");

        assert!(content.get_post("hello-world-2").await.is_err());
        assert!(content.get_post("future").await.is_err());
    }

    #[tokio::test]
    async fn test_explicit_slug_conflict() {
        let content = service();
        let mut input = post("First", "News", PublishStatus::Draft);
        input.slug = Some("launch".to_string());
        let first = content.save_post(None, input.clone(), None, false).await.unwrap();

        assert!(matches!(
            content.save_post(None, input.clone(), None, false).await,
            Err(AppError::Conflict { .. })
        ));

        // 更新自己時保留原 slug 不算衝突
        let updated = content.save_post(Some(first.id), input, None, false).await.unwrap();
        assert_eq!(updated.slug, "launch");
        assert_eq!(updated.created_at, first.created_at);
    }

    #[tokio::test]
    async fn test_post_filters_related_and_categories() {
        let content = service();
        let seeds = [
            ("Alpha SEO", "Marketing"),
            ("Beta Ads", "Marketing"),
            ("Gamma Rust", "Engineering"),
        ];
        for (title, category) in seeds {
            let mut input = post(title, category, PublishStatus::Published);
            input.tags = vec!["growth".to_string()];
            content.save_post(None, input, None, false).await.unwrap();
        }

        let page = content
            .list_posts(&PostQuery {
                category: Some("marketing".to_string()),
                ..Default::default()
            })
            .await;
        assert_eq!(page.total, 2);

        let page = content
            .list_posts(&PostQuery {
                search: Some("rust".to_string()),
                ..Default::default()
            })
            .await;
        assert_eq!(page.data[0].title, "Gamma Rust");

        let detail = content.get_post("alpha-seo").await.unwrap();
        assert_eq!(detail.related.len(), 1);
        assert_eq!(detail.related[0].slug, "beta-ads");

        let categories = content.post_categories().await;
        assert_eq!(
            categories,
            vec![
                CategoryCount { name: "Engineering".to_string(), count: 1 },
                CategoryCount { name: "Marketing".to_string(), count: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn test_services_order_and_inactive_hidden() {
        let content = service();
        let seeds = [("Web Design", 2, true), ("SEO", 1, true), ("Legacy", 0, false)];
        for (title, order, active) in seeds {
            content
                .save_service(
                    None,
                    ServiceInput {
                        title: title.to_string(),
                        sort_order: order,
                        is_active: active,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let services = content.list_services().await;
        let slugs: Vec<&str> = services.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(slugs, vec!["seo", "web-design"]);
        assert!(content.get_service("legacy").await.is_err());
        assert_eq!(content.admin_list_services().await.len(), 3);
    }

    #[tokio::test]
    async fn test_case_study_requires_known_service() {
        let content = service();
        let input = CaseStudyInput {
            title: "Shop relaunch".to_string(),
            client_name: "Acme".to_string(),
            service_slug: Some("web-design".to_string()),
            status: PublishStatus::Published,
            ..Default::default()
        };
        assert!(matches!(
            content.save_case_study(None, input.clone()).await,
            Err(AppError::ValidationError { .. })
        ));

        content
            .save_service(
                None,
                ServiceInput {
                    title: "Web Design".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let saved = content.save_case_study(None, input).await.unwrap();
        assert!(saved.published_at.is_some());

        let filtered = content
            .list_case_studies(&CaseStudyFilter {
                service: Some("web-design".to_string()),
                ..Default::default()
            })
            .await;
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn test_testimonial_rating_bounds() {
        let content = service();
        let mut input = TestimonialInput {
            author_name: "Jane".to_string(),
            quote: "Great team".to_string(),
            rating: 6,
            ..Default::default()
        };
        assert!(content.save_testimonial(None, input.clone()).await.is_err());

        input.rating = 5;
        input.is_active = true;
        let saved = content.save_testimonial(None, input).await.unwrap();
        assert_eq!(content.list_testimonials(None).await[0].id, saved.id);
        assert!(content.list_testimonials(Some(true)).await.is_empty());
    }
}
