use crate::api::extract::client_key;
use crate::api::AppState;
use crate::core::RateLimitDecision;
use crate::utils::error::AppError;
use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use std::net::SocketAddr;

const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// 某條路由使用的限流規則
#[derive(Clone)]
pub struct RateLimitState {
    pub app: AppState,
    pub rule: &'static str,
}

pub async fn rate_limit(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
    );

    match state.app.limiter.check(state.rule, &client) {
        RateLimitDecision::Allowed { limit, remaining } => {
            let mut response = next.run(request).await;
            if limit != usize::MAX {
                let headers = response.headers_mut();
                headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
                headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
            }
            response
        }
        RateLimitDecision::Limited { limit, retry_after } => {
            // 不足一秒也至少等一秒
            let retry_after_secs = retry_after.as_secs().max(1);
            let mut response = AppError::RateLimited { retry_after_secs }.into_response();
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(0usize));
            response
        }
    }
}

/// 依 `<METHOD> <route>` 驗證 JSON 請求，並視設定檢查回應
pub async fn enforce_contract(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let matched = request.extensions().get::<MatchedPath>();
    let Some(route) = matched.map(|p| p.as_str().to_string()) else {
        return next.run(request).await;
    };
    let method = request.method().as_str().to_string();
    let Some(contract) = state.contracts.get(&method, &route) else {
        return next.run(request).await;
    };

    let contracts = &state.config.contracts;
    let request = if contracts.validate_requests && contract.has_request_schema() {
        match check_request(&state, contract, request).await {
            Ok(request) => request,
            Err(e) => return e.into_response(),
        }
    } else {
        request
    };

    let response = next.run(request).await;
    let check = contracts.validate_responses
        && contract.has_response_schema()
        && response.status().is_success();
    if !check {
        return response;
    }

    // 回應不符只記錄，不影響客戶端
    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("❌ Failed to buffer response for {} {}: {}", method, route, e);
            return AppError::ProcessingError {
                message: "failed to read response body".to_string(),
            }
            .into_response();
        }
    };
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(json) => {
            if let Err(AppError::ContractViolation { errors }) = contract.check_response(&json) {
                tracing::warn!(
                    "📜 Response contract violated for {} {}: {:?}",
                    method,
                    route,
                    errors
                );
            }
        }
        Err(e) => tracing::warn!("📜 Response for {} {} is not JSON: {}", method, route, e),
    }
    Response::from_parts(parts, Body::from(bytes))
}

async fn check_request(
    state: &AppState,
    contract: &crate::core::Contract,
    request: Request,
) -> Result<Request, AppError> {
    let (parts, body) = request.into_parts();
    let is_json = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if !is_json {
        return Err(AppError::validation("body", "expected an application/json body"));
    }

    let bytes = to_bytes(body, state.config.server.body_limit_bytes)
        .await
        .map_err(|_| AppError::validation("body", "request body is too large"))?;
    let json: Value = serde_json::from_slice(&bytes)
        .map_err(|e| AppError::validation("body", format!("invalid JSON: {}", e)))?;
    contract.check_request(&json)?;

    Ok(Request::from_parts(parts, Body::from(bytes)))
}
