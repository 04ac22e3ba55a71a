use crate::core::store::Store;
use crate::domain::model::{
    ContactMessage, Inquiry, InquiryStatus, NewsletterSubscriber, PublishStatus,
    SubscriptionStatus,
};
use crate::utils::error::{AppError, Result};
use crate::utils::validation::{validate_email, validate_length, Validate};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactInput {
    pub name: String,
    pub email: String,
    pub message: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub subject: Option<String>,
}

impl Validate for ContactInput {
    fn validate(&self) -> Result<()> {
        validate_length("name", &self.name, 1, 100)?;
        validate_email("email", &self.email)?;
        validate_length("message", &self.message, 10, 5000)?;
        if let Some(phone) = &self.phone {
            validate_length("phone", phone, 0, 40)?;
        }
        if let Some(subject) = &self.subject {
            validate_length("subject", subject, 0, 200)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InquiryInput {
    pub name: String,
    pub email: String,
    pub details: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    /// 服務 slug
    pub service: Option<String>,
    pub budget: Option<String>,
    pub timeline: Option<String>,
}

impl Validate for InquiryInput {
    fn validate(&self) -> Result<()> {
        validate_length("name", &self.name, 1, 100)?;
        validate_email("email", &self.email)?;
        validate_length("details", &self.details, 10, 5000)?;
        if let Some(phone) = &self.phone {
            validate_length("phone", phone, 0, 40)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InquiryUpdate {
    pub status: InquiryStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeOutcome {
    pub email: String,
    pub already_subscribed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardStats {
    pub unread_contacts: usize,
    pub active_subscribers: usize,
    pub new_inquiries: usize,
    pub published_posts: usize,
    pub draft_posts: usize,
    pub services: usize,
    pub case_studies: usize,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct LeadService {
    store: Arc<Store>,
}

impl LeadService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub async fn submit_contact(
        &self,
        input: ContactInput,
        client_ip: Option<String>,
    ) -> Result<ContactMessage> {
        input.validate()?;
        let now = Utc::now();

        let message = self
            .store
            .write(|data| {
                Ok(data
                    .contacts
                    .insert_with(|id| ContactMessage {
                        id,
                        name: input.name.trim().to_string(),
                        email: normalize_email(&input.email),
                        phone: clean_optional(input.phone),
                        company: clean_optional(input.company),
                        subject: clean_optional(input.subject),
                        message: input.message.trim().to_string(),
                        client_ip,
                        is_read: false,
                        created_at: now,
                    })
                    .clone())
            })
            .await?;

        tracing::info!("✉️ Contact message #{} from {}", message.id, message.email);
        Ok(message)
    }

    pub async fn subscribe(&self, email: &str, name: Option<String>) -> Result<SubscribeOutcome> {
        validate_email("email", email)?;
        let email = normalize_email(email);
        let now = Utc::now();

        let already_subscribed = self
            .store
            .write(|data| {
                let existing = data
                    .subscribers
                    .iter_mut()
                    .find(|s| s.email == email);
                match existing {
                    Some(subscriber) if subscriber.status == SubscriptionStatus::Subscribed => {
                        Ok(true)
                    }
                    Some(subscriber) => {
                        // 曾取消訂閱者重新啟用
                        subscriber.status = SubscriptionStatus::Subscribed;
                        subscriber.subscribed_at = now;
                        subscriber.unsubscribed_at = None;
                        if let Some(name) = clean_optional(name) {
                            subscriber.name = Some(name);
                        }
                        Ok(false)
                    }
                    None => {
                        data.subscribers.insert_with(|id| NewsletterSubscriber {
                            id,
                            email: email.clone(),
                            name: clean_optional(name),
                            status: SubscriptionStatus::Subscribed,
                            subscribed_at: now,
                            unsubscribed_at: None,
                        });
                        Ok(false)
                    }
                }
            })
            .await?;

        if !already_subscribed {
            tracing::info!("📰 {} subscribed to the newsletter", email);
        }
        Ok(SubscribeOutcome {
            email,
            already_subscribed,
        })
    }

    pub async fn unsubscribe(&self, email: &str) -> Result<()> {
        let email = normalize_email(email);
        let now = Utc::now();

        self.store
            .write(|data| {
                let subscriber = data
                    .subscribers
                    .iter_mut()
                    .find(|s| s.email == email)
                    .ok_or_else(|| AppError::not_found("subscriber", &email))?;
                if subscriber.status == SubscriptionStatus::Subscribed {
                    subscriber.status = SubscriptionStatus::Unsubscribed;
                    subscriber.unsubscribed_at = Some(now);
                }
                Ok(())
            })
            .await?;

        tracing::info!("📰 {} unsubscribed", email);
        Ok(())
    }

    pub async fn submit_inquiry(&self, input: InquiryInput) -> Result<Inquiry> {
        input.validate()?;
        let now = Utc::now();

        let inquiry = self
            .store
            .write(|data| {
                let service_slug = clean_optional(input.service);
                if let Some(slug) = &service_slug {
                    if data.services.find(|s| s.is_active && &s.slug == slug).is_none() {
                        return Err(AppError::validation(
                            "service",
                            format!("unknown service `{}`", slug),
                        ));
                    }
                }
                Ok(data
                    .inquiries
                    .insert_with(|id| Inquiry {
                        id,
                        name: input.name.trim().to_string(),
                        email: normalize_email(&input.email),
                        phone: clean_optional(input.phone),
                        company: clean_optional(input.company),
                        service_slug,
                        budget: clean_optional(input.budget),
                        timeline: clean_optional(input.timeline),
                        details: input.details.trim().to_string(),
                        status: InquiryStatus::New,
                        notes: None,
                        created_at: now,
                        updated_at: now,
                    })
                    .clone())
            })
            .await?;

        tracing::info!(
            "💼 Inquiry #{} from {} (service: {})",
            inquiry.id,
            inquiry.email,
            inquiry.service_slug.as_deref().unwrap_or("-")
        );
        Ok(inquiry)
    }

    // ---- 後台 ----

    pub async fn list_contacts(&self, unread_only: bool) -> Vec<ContactMessage> {
        let mut items: Vec<ContactMessage> = self
            .store
            .read(|data| {
                data.contacts
                    .iter()
                    .filter(|c| !unread_only || !c.is_read)
                    .cloned()
                    .collect()
            })
            .await;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        items
    }

    pub async fn mark_contact_read(&self, id: u64) -> Result<ContactMessage> {
        self.store
            .write(|data| {
                let contact = data
                    .contacts
                    .get_mut(id)
                    .ok_or_else(|| AppError::not_found("contact message", id))?;
                contact.is_read = true;
                Ok(contact.clone())
            })
            .await
    }

    pub async fn delete_contact(&self, id: u64) -> Result<()> {
        self.store
            .write(|data| {
                data.contacts
                    .remove(id)
                    .map(|_| ())
                    .ok_or_else(|| AppError::not_found("contact message", id))
            })
            .await
    }

    pub async fn list_subscribers(
        &self,
        status: Option<SubscriptionStatus>,
    ) -> Vec<NewsletterSubscriber> {
        self.store
            .read(|data| {
                data.subscribers
                    .iter()
                    .filter(|s| status.is_none_or(|st| s.status == st))
                    .cloned()
                    .collect()
            })
            .await
    }

    /// 匯出訂閱者為 CSV
    pub async fn export_subscribers_csv(
        &self,
        status: Option<SubscriptionStatus>,
    ) -> Result<String> {
        let subscribers = self.list_subscribers(status).await;
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["email", "name", "status", "subscribed_at", "unsubscribed_at"])?;

        for subscriber in &subscribers {
            let status = match subscriber.status {
                SubscriptionStatus::Subscribed => "subscribed",
                SubscriptionStatus::Unsubscribed => "unsubscribed",
            };
            let subscribed_at = subscriber.subscribed_at.to_rfc3339();
            let unsubscribed_at = subscriber
                .unsubscribed_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_default();
            writer.write_record([
                subscriber.email.as_str(),
                subscriber.name.as_deref().unwrap_or(""),
                status,
                subscribed_at.as_str(),
                unsubscribed_at.as_str(),
            ])?;
        }

        let bytes = writer.into_inner().map_err(|e| AppError::ProcessingError {
            message: format!("CSV flush failed: {}", e),
        })?;
        String::from_utf8(bytes).map_err(|e| AppError::ProcessingError {
            message: format!("CSV is not UTF-8: {}", e),
        })
    }

    pub async fn list_inquiries(&self, status: Option<InquiryStatus>) -> Vec<Inquiry> {
        let mut items: Vec<Inquiry> = self
            .store
            .read(|data| {
                data.inquiries
                    .iter()
                    .filter(|i| status.is_none_or(|st| i.status == st))
                    .cloned()
                    .collect()
            })
            .await;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        items
    }

    pub async fn update_inquiry(&self, id: u64, update: InquiryUpdate) -> Result<Inquiry> {
        if let Some(notes) = &update.notes {
            validate_length("notes", notes, 0, 5000)?;
        }
        self.store
            .write(|data| {
                let inquiry = data
                    .inquiries
                    .get_mut(id)
                    .ok_or_else(|| AppError::not_found("inquiry", id))?;
                inquiry.status = update.status;
                if update.notes.is_some() {
                    inquiry.notes = clean_optional(update.notes);
                }
                inquiry.updated_at = Utc::now();
                Ok(inquiry.clone())
            })
            .await
    }

    pub async fn delete_inquiry(&self, id: u64) -> Result<()> {
        self.store
            .write(|data| {
                data.inquiries
                    .remove(id)
                    .map(|_| ())
                    .ok_or_else(|| AppError::not_found("inquiry", id))
            })
            .await
    }

    pub async fn stats(&self) -> DashboardStats {
        self.store
            .read(|data| DashboardStats {
                unread_contacts: data.contacts.iter().filter(|c| !c.is_read).count(),
                active_subscribers: data
                    .subscribers
                    .iter()
                    .filter(|s| s.status == SubscriptionStatus::Subscribed)
                    .count(),
                new_inquiries: data
                    .inquiries
                    .iter()
                    .filter(|i| i.status == InquiryStatus::New)
                    .count(),
                published_posts: data
                    .posts
                    .iter()
                    .filter(|p| p.status == PublishStatus::Published)
                    .count(),
                draft_posts: data
                    .posts
                    .iter()
                    .filter(|p| p.status == PublishStatus::Draft)
                    .count(),
                services: data.services.len(),
                case_studies: data.case_studies.len(),
            })
            .await
    }
}
