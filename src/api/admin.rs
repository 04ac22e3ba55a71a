//! 後台 API：登入、內容管理、名單管理與使用者管理
//!
//! 權限：文章需 author；服務、案例、評價、品牌需 editor；
//! 名單與統計需 admin；使用者管理需 super_admin。

use crate::api::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::api::{limited, AppState};
use crate::core::auth::{IssuedToken, NewUser, Role, UserUpdate};
use crate::core::content::{
    BrandInput, CaseStudyInput, PostInput, PostQuery, ServiceInput, TestimonialInput,
};
use crate::core::leads::{DashboardStats, InquiryUpdate};
use crate::domain::model::{
    Brand, CaseStudy, ContactMessage, Inquiry, InquiryStatus, NewsletterSubscriber, Page, Post,
    PublishStatus, Service, SubscriptionStatus, Testimonial, UserProfile,
};
use crate::utils::error::{AppError, Result};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/admin/login", limited(post(login), state, "login"))
        .route("/api/admin/logout", post(logout))
        .route("/api/admin/me", get(me))
        .route("/api/admin/stats", get(stats))
        // 內容
        .route("/api/admin/services", get(list_services).post(create_service))
        .route(
            "/api/admin/services/:id",
            get(get_service).put(update_service).delete(delete_service),
        )
        .route(
            "/api/admin/case-studies",
            get(list_case_studies).post(create_case_study),
        )
        .route(
            "/api/admin/case-studies/:id",
            get(get_case_study)
                .put(update_case_study)
                .delete(delete_case_study),
        )
        .route("/api/admin/posts", get(list_posts).post(create_post))
        .route(
            "/api/admin/posts/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route(
            "/api/admin/testimonials",
            get(list_testimonials).post(create_testimonial),
        )
        .route(
            "/api/admin/testimonials/:id",
            get(get_testimonial)
                .put(update_testimonial)
                .delete(delete_testimonial),
        )
        .route("/api/admin/brands", get(list_brands).post(create_brand))
        .route(
            "/api/admin/brands/:id",
            get(get_brand).put(update_brand).delete(delete_brand),
        )
        // 名單
        .route("/api/admin/contacts", get(list_contacts))
        .route("/api/admin/contacts/:id", axum::routing::delete(delete_contact))
        .route("/api/admin/contacts/:id/read", patch(mark_contact_read))
        .route("/api/admin/subscribers", get(list_subscribers))
        .route("/api/admin/subscribers/export", get(export_subscribers))
        .route("/api/admin/inquiries", get(list_inquiries))
        .route(
            "/api/admin/inquiries/:id",
            patch(update_inquiry).delete(delete_inquiry),
        )
        // 使用者
        .route("/api/admin/users", get(list_users).post(create_user))
        .route(
            "/api/admin/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

// ---- 登入 ----

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<IssuedToken>> {
    Ok(Json(state.auth.login(&request.email, &request.password).await?))
}

async fn logout(State(state): State<AppState>, AuthUser(ctx): AuthUser) -> Result<StatusCode> {
    state.auth.logout(&ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(AuthUser(ctx): AuthUser) -> Json<UserProfile> {
    Json(ctx.user)
}

async fn stats(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<DashboardStats>> {
    ctx.require(Role::Admin)?;
    Ok(Json(state.leads.stats().await))
}

// ---- 服務 ----

async fn list_services(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<Vec<Service>>> {
    ctx.require(Role::Editor)?;
    Ok(Json(state.content.admin_list_services().await))
}

async fn get_service(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<Service>> {
    ctx.require(Role::Editor)?;
    Ok(Json(state.content.admin_get_service(id).await?))
}

async fn create_service(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiJson(input): ApiJson<ServiceInput>,
) -> Result<(StatusCode, Json<Service>)> {
    ctx.require(Role::Editor)?;
    let service = state.content.save_service(None, input).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

async fn update_service(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
    ApiJson(input): ApiJson<ServiceInput>,
) -> Result<Json<Service>> {
    ctx.require(Role::Editor)?;
    Ok(Json(state.content.save_service(Some(id), input).await?))
}

async fn delete_service(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode> {
    ctx.require(Role::Editor)?;
    state.content.delete_service(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- 案例 ----

async fn list_case_studies(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<Vec<CaseStudy>>> {
    ctx.require(Role::Editor)?;
    Ok(Json(state.content.admin_list_case_studies().await))
}

async fn get_case_study(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<CaseStudy>> {
    ctx.require(Role::Editor)?;
    Ok(Json(state.content.admin_get_case_study(id).await?))
}

async fn create_case_study(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiJson(input): ApiJson<CaseStudyInput>,
) -> Result<(StatusCode, Json<CaseStudy>)> {
    ctx.require(Role::Editor)?;
    let case_study = state.content.save_case_study(None, input).await?;
    Ok((StatusCode::CREATED, Json(case_study)))
}

async fn update_case_study(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
    ApiJson(input): ApiJson<CaseStudyInput>,
) -> Result<Json<CaseStudy>> {
    ctx.require(Role::Editor)?;
    Ok(Json(state.content.save_case_study(Some(id), input).await?))
}

async fn delete_case_study(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode> {
    ctx.require(Role::Editor)?;
    state.content.delete_case_study(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- 文章 ----

#[derive(Debug, Deserialize)]
struct StatusFilter<T> {
    status: Option<T>,
}

/// author 只能修改自己的文章，editor 以上不受限
async fn ensure_post_access(
    state: &AppState,
    ctx: &crate::core::AuthContext,
    id: u64,
) -> Result<()> {
    ctx.require(Role::Author)?;
    if ctx.user.role.satisfies(Role::Editor) {
        return Ok(());
    }
    let post = state.content.admin_get_post(id).await?;
    if post.author_id == Some(ctx.user.id) {
        Ok(())
    } else {
        Err(AppError::Forbidden {
            required: Role::Editor,
        })
    }
}

async fn list_posts(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiQuery(query): ApiQuery<PostQuery>,
    ApiQuery(filter): ApiQuery<StatusFilter<PublishStatus>>,
) -> Result<Json<Page<Post>>> {
    ctx.require(Role::Author)?;
    Ok(Json(state.content.admin_list_posts(&query, filter.status).await))
}

async fn get_post(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<Post>> {
    ctx.require(Role::Author)?;
    Ok(Json(state.content.admin_get_post(id).await?))
}

async fn create_post(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiJson(input): ApiJson<PostInput>,
) -> Result<(StatusCode, Json<Post>)> {
    ctx.require(Role::Author)?;
    let post = state
        .content
        .save_post(None, input, Some(ctx.user.id), false)
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn update_post(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
    ApiJson(input): ApiJson<PostInput>,
) -> Result<Json<Post>> {
    ensure_post_access(&state, &ctx, id).await?;
    Ok(Json(state.content.save_post(Some(id), input, None, false).await?))
}

async fn delete_post(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode> {
    ensure_post_access(&state, &ctx, id).await?;
    state.content.delete_post(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- 評價 ----

async fn list_testimonials(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<Vec<Testimonial>>> {
    ctx.require(Role::Editor)?;
    Ok(Json(state.content.admin_list_testimonials().await))
}

async fn get_testimonial(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<Testimonial>> {
    ctx.require(Role::Editor)?;
    Ok(Json(state.content.admin_get_testimonial(id).await?))
}

async fn create_testimonial(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiJson(input): ApiJson<TestimonialInput>,
) -> Result<(StatusCode, Json<Testimonial>)> {
    ctx.require(Role::Editor)?;
    let testimonial = state.content.save_testimonial(None, input).await?;
    Ok((StatusCode::CREATED, Json(testimonial)))
}

async fn update_testimonial(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
    ApiJson(input): ApiJson<TestimonialInput>,
) -> Result<Json<Testimonial>> {
    ctx.require(Role::Editor)?;
    Ok(Json(state.content.save_testimonial(Some(id), input).await?))
}

async fn delete_testimonial(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode> {
    ctx.require(Role::Editor)?;
    state.content.delete_testimonial(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- 品牌 ----

async fn list_brands(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<Vec<Brand>>> {
    ctx.require(Role::Editor)?;
    Ok(Json(state.content.admin_list_brands().await))
}

async fn get_brand(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<Brand>> {
    ctx.require(Role::Editor)?;
    Ok(Json(state.content.admin_get_brand(id).await?))
}

async fn create_brand(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiJson(input): ApiJson<BrandInput>,
) -> Result<(StatusCode, Json<Brand>)> {
    ctx.require(Role::Editor)?;
    let brand = state.content.save_brand(None, input).await?;
    Ok((StatusCode::CREATED, Json(brand)))
}

async fn update_brand(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
    ApiJson(input): ApiJson<BrandInput>,
) -> Result<Json<Brand>> {
    ctx.require(Role::Editor)?;
    Ok(Json(state.content.save_brand(Some(id), input).await?))
}

async fn delete_brand(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode> {
    ctx.require(Role::Editor)?;
    state.content.delete_brand(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- 名單 ----

#[derive(Debug, Deserialize)]
struct ContactQuery {
    #[serde(default)]
    unread: bool,
}

async fn list_contacts(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiQuery(query): ApiQuery<ContactQuery>,
) -> Result<Json<Vec<ContactMessage>>> {
    ctx.require(Role::Admin)?;
    Ok(Json(state.leads.list_contacts(query.unread).await))
}

async fn mark_contact_read(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<ContactMessage>> {
    ctx.require(Role::Admin)?;
    Ok(Json(state.leads.mark_contact_read(id).await?))
}

async fn delete_contact(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode> {
    ctx.require(Role::Admin)?;
    state.leads.delete_contact(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_subscribers(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiQuery(filter): ApiQuery<StatusFilter<SubscriptionStatus>>,
) -> Result<Json<Vec<NewsletterSubscriber>>> {
    ctx.require(Role::Admin)?;
    Ok(Json(state.leads.list_subscribers(filter.status).await))
}

async fn export_subscribers(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiQuery(filter): ApiQuery<StatusFilter<SubscriptionStatus>>,
) -> Result<impl IntoResponse> {
    ctx.require(Role::Admin)?;
    let csv = state.leads.export_subscribers_csv(filter.status).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"subscribers.csv\"",
            ),
        ],
        csv,
    ))
}

async fn list_inquiries(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiQuery(filter): ApiQuery<StatusFilter<InquiryStatus>>,
) -> Result<Json<Vec<Inquiry>>> {
    ctx.require(Role::Admin)?;
    Ok(Json(state.leads.list_inquiries(filter.status).await))
}

async fn update_inquiry(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
    ApiJson(update): ApiJson<InquiryUpdate>,
) -> Result<Json<Inquiry>> {
    ctx.require(Role::Admin)?;
    Ok(Json(state.leads.update_inquiry(id, update).await?))
}

async fn delete_inquiry(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode> {
    ctx.require(Role::Admin)?;
    state.leads.delete_inquiry(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- 使用者 ----

async fn list_users(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<Vec<UserProfile>>> {
    ctx.require(Role::SuperAdmin)?;
    Ok(Json(state.auth.list_users().await))
}

async fn get_user(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<UserProfile>> {
    ctx.require(Role::SuperAdmin)?;
    Ok(Json(state.auth.get_user(id).await?))
}

async fn create_user(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiJson(input): ApiJson<NewUser>,
) -> Result<(StatusCode, Json<UserProfile>)> {
    ctx.require(Role::SuperAdmin)?;
    let user = state.auth.create_user(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_user(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
    ApiJson(update): ApiJson<UserUpdate>,
) -> Result<Json<UserProfile>> {
    ctx.require(Role::SuperAdmin)?;
    Ok(Json(state.auth.update_user(&ctx, id, update).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode> {
    ctx.require(Role::SuperAdmin)?;
    state.auth.delete_user(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
