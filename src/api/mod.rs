//! HTTP 介面：公開內容 API、名單收集、後台管理與 AI 端點

pub mod admin;
pub mod ai;
pub mod error;
pub mod extract;
pub mod leads;
pub mod middleware;
pub mod public;

use crate::adapters::LocalStorage;
use crate::ai::blog::AiBlogService;
use crate::ai::chat::ChatService;
use crate::ai::content::AiContentService;
use crate::ai::image_client::WorkersImageClient;
use crate::ai::text_client::AiTextClient;
use crate::ai::trends::SerpApiTrends;
use crate::config::AppConfig;
use crate::core::{AuthService, ContentService, ContractRegistry, LeadService, RateLimiter, Store};
use crate::domain::ports::{ImageGenerator, Storage, TextGenerator, TrendSource};
use crate::utils::error::{AppError, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Uri};
use axum::routing::MethodRouter;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// 所有處理函式共用的狀態
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<Store>,
    pub content: Arc<ContentService>,
    pub leads: Arc<LeadService>,
    pub auth: Arc<AuthService>,
    pub limiter: Arc<RateLimiter>,
    pub contracts: Arc<ContractRegistry>,
    pub blog: Arc<AiBlogService>,
    pub ai_content: Arc<AiContentService>,
    pub chat: Arc<ChatService>,
    pub trends: Option<Arc<dyn TrendSource>>,
    pub ai_status: AiStatus,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct AiStatus {
    pub text: bool,
    pub images: bool,
    pub trends: bool,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<Store>) -> Result<Self> {
        let content = Arc::new(ContentService::new(store.clone()));
        let leads = Arc::new(LeadService::new(store.clone()));
        let auth = Arc::new(AuthService::new(store.clone(), &config.auth));
        let limiter = Arc::new(RateLimiter::new(config.all_rate_limits()));
        let contracts = Arc::new(ContractRegistry::builtin()?);

        let text_client = AiTextClient::new(&config.ai.text)?;
        let text_configured = text_client.is_configured();
        let text: Arc<dyn TextGenerator> = Arc::new(text_client);

        let images: Option<Arc<dyn ImageGenerator>> = if config.ai.image.is_configured() {
            let uploads: Arc<dyn Storage> =
                Arc::new(LocalStorage::new(&config.storage.uploads_dir));
            Some(Arc::new(WorkersImageClient::new(
                &config.ai.image,
                uploads,
                &config.storage.uploads_url_prefix,
            )?))
        } else {
            None
        };

        let trends: Option<Arc<dyn TrendSource>> = if config.ai.trends.api_key.trim().is_empty() {
            None
        } else {
            Some(Arc::new(SerpApiTrends::new(&config.ai.trends)?))
        };

        let ai_status = AiStatus {
            text: text_configured,
            images: images.is_some(),
            trends: trends.is_some(),
        };
        tracing::info!(
            "🤖 AI providers: text={} images={} trends={}",
            ai_status.text,
            ai_status.images,
            ai_status.trends
        );

        let blog = Arc::new(AiBlogService::new(
            text.clone(),
            images,
            trends.clone(),
            content.clone(),
            config.ai.blog.clone(),
            config.ai.trends.limit,
        ));
        let ai_content = Arc::new(AiContentService::new(text.clone()));
        let chat = Arc::new(ChatService::new(text, content.clone(), config.ai.chat.clone()));

        Ok(Self {
            config: Arc::new(config),
            store,
            content,
            leads,
            auth,
            limiter,
            contracts,
            blog,
            ai_content,
            chat,
            trends,
            ai_status,
        })
    }
}

/// 套用指定的限流規則
pub(crate) fn limited(
    route: MethodRouter<AppState>,
    state: &AppState,
    rule: &'static str,
) -> MethodRouter<AppState> {
    route.layer(axum::middleware::from_fn_with_state(
        middleware::RateLimitState {
            app: state.clone(),
            rule,
        },
        middleware::rate_limit,
    ))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("⚠️  Ignoring invalid CORS origin `{}`", o);
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

async fn fallback(uri: Uri) -> AppError {
    AppError::not_found("route", uri.path())
}

pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let api = Router::new()
        .merge(public::routes())
        .merge(leads::routes(&state))
        .merge(admin::routes(&state))
        .merge(ai::routes(&state))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::enforce_contract,
        ));

    Router::new()
        .merge(api)
        .nest_service(
            &config.storage.uploads_url_prefix,
            ServeDir::new(&config.storage.uploads_dir),
        )
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(config.server.body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.server.cors_origins))
        .with_state(state)
}
