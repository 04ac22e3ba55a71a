use crate::api::extract::{ApiPath, ApiQuery};
use crate::api::AppState;
use crate::core::content::{CaseStudyFilter, CategoryCount, PostDetail, PostQuery, PostSummary};
use crate::domain::model::{Brand, CaseStudy, Page, Service, Testimonial};
use crate::utils::error::Result;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/services", get(list_services))
        .route("/api/services/:slug", get(get_service))
        .route("/api/case-studies", get(list_case_studies))
        .route("/api/case-studies/:slug", get(get_case_study))
        .route("/api/posts", get(list_posts))
        .route("/api/posts/categories", get(post_categories))
        .route("/api/posts/:slug", get(get_post))
        .route("/api/testimonials", get(list_testimonials))
        .route("/api/brands", get(list_brands))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "ai": state.ai_status,
    }))
}

async fn list_services(State(state): State<AppState>) -> Json<Vec<Service>> {
    Json(state.content.list_services().await)
}

async fn get_service(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<Service>> {
    Ok(Json(state.content.get_service(&slug).await?))
}

async fn list_case_studies(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<CaseStudyFilter>,
) -> Json<Vec<CaseStudy>> {
    Json(state.content.list_case_studies(&filter).await)
}

async fn get_case_study(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<CaseStudy>> {
    Ok(Json(state.content.get_case_study(&slug).await?))
}

async fn list_posts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PostQuery>,
) -> Json<Page<PostSummary>> {
    Json(state.content.list_posts(&query).await)
}

async fn post_categories(State(state): State<AppState>) -> Json<Vec<CategoryCount>> {
    Json(state.content.post_categories().await)
}

async fn get_post(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<PostDetail>> {
    Ok(Json(state.content.get_post(&slug).await?))
}

#[derive(Debug, Deserialize)]
struct TestimonialQuery {
    featured: Option<bool>,
}

async fn list_testimonials(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TestimonialQuery>,
) -> Json<Vec<Testimonial>> {
    Json(state.content.list_testimonials(query.featured).await)
}

async fn list_brands(State(state): State<AppState>) -> Json<Vec<Brand>> {
    Json(state.content.list_brands().await)
}
