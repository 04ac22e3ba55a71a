use crate::ai::blog::{BlogGeneration, BlogRequest};
use crate::ai::chat::{ChatReply, ChatRequest};
use crate::ai::content::{ContentRequest, ContentSuggestion};
use crate::ai::TrendTopic;
use crate::api::extract::{ApiJson, ApiQuery, AuthUser};
use crate::api::{limited, AppState};
use crate::core::Role;
use crate::utils::error::{AppError, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/chat", limited(post(chat), state, "chat"))
        .route("/api/admin/ai/blog", limited(post(generate_blog), state, "ai"))
        .route("/api/admin/ai/content", limited(post(generate_content), state, "ai"))
        .route("/api/admin/ai/trends", limited(get(trends), state, "ai"))
}

async fn chat(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ChatRequest>,
) -> Result<Json<ChatReply>> {
    Ok(Json(state.chat.reply(request).await?))
}

async fn generate_blog(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiJson(request): ApiJson<BlogRequest>,
) -> Result<(StatusCode, Json<BlogGeneration>)> {
    ctx.require(Role::Author)?;
    tracing::info!("✍️  Blog generation requested by {}", ctx.user.email);
    let generation = state.blog.generate(request, Some(ctx.user.id)).await?;
    Ok((StatusCode::CREATED, Json(generation)))
}

async fn generate_content(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiJson(request): ApiJson<ContentRequest>,
) -> Result<Json<ContentSuggestion>> {
    ctx.require(Role::Author)?;
    Ok(Json(state.ai_content.generate(request).await?))
}

#[derive(Debug, Deserialize)]
struct TrendsQuery {
    keyword: String,
    limit: Option<usize>,
}

async fn trends(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiQuery(query): ApiQuery<TrendsQuery>,
) -> Result<Json<Vec<TrendTopic>>> {
    ctx.require(Role::Author)?;
    let source = state.trends.as_ref().ok_or_else(|| AppError::MissingConfigError {
        field: "ai.trends.api_key".to_string(),
    })?;
    let keyword = query.keyword.trim();
    if keyword.is_empty() {
        return Err(AppError::validation("keyword", "is required"));
    }
    let limit = query
        .limit
        .unwrap_or(state.config.ai.trends.limit)
        .clamp(1, 25);
    Ok(Json(source.related_queries(keyword, limit).await?))
}
