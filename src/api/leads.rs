use crate::api::extract::{ApiJson, ClientIp};
use crate::api::{limited, AppState};
use crate::core::leads::{ContactInput, InquiryInput, SubscribeOutcome};
use crate::utils::error::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/contact", limited(post(submit_contact), state, "contact"))
        .route(
            "/api/newsletter/subscribe",
            limited(post(subscribe), state, "newsletter"),
        )
        .route(
            "/api/newsletter/unsubscribe",
            limited(post(unsubscribe), state, "newsletter"),
        )
        .route("/api/inquiries", limited(post(submit_inquiry), state, "inquiry"))
}

async fn submit_contact(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(input): ApiJson<ContactInput>,
) -> Result<(StatusCode, Json<Value>)> {
    let message = state.leads.submit_contact(input, ip).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": message.id,
            "message": "Thanks for reaching out. We will get back to you shortly."
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct NewsletterRequest {
    email: String,
    name: Option<String>,
}

async fn subscribe(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewsletterRequest>,
) -> Result<(StatusCode, Json<SubscribeOutcome>)> {
    let outcome = state.leads.subscribe(&request.email, request.name).await?;
    let status = if outcome.already_subscribed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome)))
}

async fn unsubscribe(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewsletterRequest>,
) -> Result<Json<Value>> {
    state.leads.unsubscribe(&request.email).await?;
    Ok(Json(json!({ "message": "You have been unsubscribed." })))
}

async fn submit_inquiry(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<InquiryInput>,
) -> Result<(StatusCode, Json<Value>)> {
    let inquiry = state.leads.submit_inquiry(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": inquiry.id,
            "message": "Thanks! Our team will review your project and contact you."
        })),
    ))
}
