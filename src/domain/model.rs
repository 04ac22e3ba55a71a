use crate::core::auth::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoMeta {
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: u64,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub description: String,
    pub icon: Option<String>,
    pub features: Vec<String>,
    pub sort_order: i32,
    pub is_active: bool,
    #[serde(default)]
    pub seo: SeoMeta,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseStudy {
    pub id: u64,
    pub title: String,
    pub slug: String,
    pub client_name: String,
    pub industry: Option<String>,
    /// 對應的服務 slug
    pub service_slug: Option<String>,
    pub summary: String,
    pub challenge: String,
    pub solution: String,
    pub results: Vec<String>,
    pub cover_image: Option<String>,
    pub status: PublishStatus,
    pub is_featured: bool,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seo: SeoMeta,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub body: String,
    pub cover_image: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub author_id: Option<u64>,
    pub status: PublishStatus,
    pub is_featured: bool,
    pub reading_minutes: u32,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seo: SeoMeta,
    #[serde(default)]
    pub ai_generated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// 已發佈且發佈時間已到才對外可見
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.status == PublishStatus::Published && self.published_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Testimonial {
    pub id: u64,
    pub author_name: String,
    pub author_title: Option<String>,
    pub company: Option<String>,
    pub quote: String,
    pub rating: u8,
    pub avatar_url: Option<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
    pub website: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub subject: Option<String>,
    pub message: String,
    pub client_ip: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Subscribed,
    Unsubscribed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsletterSubscriber {
    pub id: u64,
    pub email: String,
    pub name: Option<String>,
    pub status: SubscriptionStatus,
    pub subscribed_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryStatus {
    New,
    Contacted,
    Qualified,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inquiry {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub service_slug: Option<String>,
    pub budget: Option<String>,
    pub timeline: Option<String>,
    pub details: String,
    pub status: InquiryStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password_hash: String,
    pub password_salt: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 對外回傳的使用者資料 (不含密碼雜湊)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            is_active: user.is_active,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiToken {
    pub id: u64,
    pub user_id: u64,
    pub name: String,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl<T: Clone> Page<T> {
    pub fn paginate(
        items: &[T],
        page: Option<usize>,
        per_page: Option<usize>,
        default_per_page: usize,
        max_per_page: usize,
    ) -> Self {
        let page = page.unwrap_or(1).max(1);
        let per_page = per_page.unwrap_or(default_per_page).clamp(1, max_per_page);
        let total = items.len();
        let total_pages = total.div_ceil(per_page);

        // 頁數來自查詢字串，可能極大
        let start = page.saturating_sub(1).saturating_mul(per_page).min(total);
        let end = start.saturating_add(per_page).min(total);

        Page {
            data: items[start..end].to_vec(),
            page,
            per_page,
            total,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_clamps_and_slices() {
        let items: Vec<u32> = (1..=23).collect();

        let page = Page::paginate(&items, Some(3), Some(10), 10, 50);
        assert_eq!(page.data, vec![21, 22, 23]);
        assert_eq!(page.total, 23);
        assert_eq!(page.total_pages, 3);

        let page = Page::paginate(&items, Some(0), Some(500), 10, 50);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 50);
        assert_eq!(page.data.len(), 23);

        // 超出範圍的頁數回傳空資料
        let page = Page::paginate(&items, Some(9), None, 10, 50);
        assert!(page.data.is_empty());
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_paginate_huge_page_is_empty() {
        let page = Page::paginate(&[1, 2, 3], Some(usize::MAX), None, 10, 50);
        assert!(page.data.is_empty());
        assert_eq!(page.page, usize::MAX);
        assert_eq!(page.total, 3);
    }
}
