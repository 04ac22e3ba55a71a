mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;
use site_cms::core::content::ServiceInput;
use site_cms::domain::model::SubscriptionStatus;

fn contact_body() -> serde_json::Value {
    json!({
        "name": "Jane Doe",
        "email": "Jane@Example.com",
        "message": "We would like a quote for a new marketing site.",
        "company": "Acme"
    })
}

#[tokio::test]
async fn test_contact_submission_is_stored() -> Result<()> {
    let app = TestApp::new().await?;
    let response = app.post("/api/contact", contact_body()).await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["id"], 1);
    assert_eq!(response.headers["x-ratelimit-limit"], "5");
    assert_eq!(response.headers["x-ratelimit-remaining"], "4");

    let contacts = app.state.leads.list_contacts(false).await;
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].email, "jane@example.com");
    assert_eq!(contacts[0].client_ip.as_deref(), Some("198.51.100.7"));
    assert!(!contacts[0].is_read);
    Ok(())
}

#[tokio::test]
async fn test_contact_contract_rejects_bad_payload() -> Result<()> {
    let app = TestApp::new().await?;
    let response = app
        .post("/api/contact", json!({ "name": "Jane", "email": "jane@example.com", "spam": true }))
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["error"], "contract_violation");
    assert!(!response.body["details"]["errors"].as_array().unwrap().is_empty());
    assert!(app.state.leads.list_contacts(false).await.is_empty());

    // 格式正確但 email 無效時由服務層驗證
    let mut body = contact_body();
    body["email"] = json!("not-an-email");
    let response = app.post("/api/contact", body).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["error"], "validation_failed");
    assert_eq!(response.body["details"]["field"], "email");
    Ok(())
}

#[tokio::test]
async fn test_contact_rate_limit() -> Result<()> {
    let app = TestApp::with_config(
        r#"
[rate_limits.contact]
max_requests = 2
window_secs = 60
"#,
    )
    .await?;

    assert_eq!(app.post("/api/contact", contact_body()).await.status, StatusCode::CREATED);
    assert_eq!(app.post("/api/contact", contact_body()).await.status, StatusCode::CREATED);

    let limited = app.post("/api/contact", contact_body()).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.body["error"], "too_many_requests");
    let retry_after: u64 = limited.headers["retry-after"].to_str()?.parse()?;
    assert!((1..=60).contains(&retry_after));
    assert_eq!(limited.headers["x-ratelimit-remaining"], "0");
    assert_eq!(app.state.leads.list_contacts(false).await.len(), 2);

    // 其他規則不受影響
    let subscribe = app
        .post("/api/newsletter/subscribe", json!({ "email": "a@example.com" }))
        .await;
    assert_eq!(subscribe.status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn test_newsletter_is_idempotent_and_reactivates() -> Result<()> {
    let app = TestApp::new().await?;

    let first = app
        .post("/api/newsletter/subscribe", json!({ "email": "Reader@Example.com", "name": "Reader" }))
        .await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body, json!({ "email": "reader@example.com", "already_subscribed": false }));

    let again = app
        .post("/api/newsletter/subscribe", json!({ "email": "reader@example.com" }))
        .await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.body["already_subscribed"], true);

    let unsubscribe = app
        .post("/api/newsletter/unsubscribe", json!({ "email": "reader@example.com" }))
        .await;
    assert_eq!(unsubscribe.status, StatusCode::OK);
    let subscribers = app.state.leads.list_subscribers(None).await;
    assert_eq!(subscribers.len(), 1);
    assert_eq!(subscribers[0].status, SubscriptionStatus::Unsubscribed);

    let back = app
        .post("/api/newsletter/subscribe", json!({ "email": "reader@example.com" }))
        .await;
    assert_eq!(back.status, StatusCode::CREATED);
    let subscribers = app.state.leads.list_subscribers(Some(SubscriptionStatus::Subscribed)).await;
    assert_eq!(subscribers.len(), 1);
    assert_eq!(subscribers[0].name.as_deref(), Some("Reader"));

    let unknown = app
        .post("/api/newsletter/unsubscribe", json!({ "email": "ghost@example.com" }))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_inquiry_requires_known_active_service() -> Result<()> {
    let app = TestApp::new().await?;
    app.state
        .content
        .save_service(
            None,
            ServiceInput {
                title: "Mobile Apps".to_string(),
                is_active: true,
                ..Default::default()
            },
        )
        .await?;

    let body = json!({
        "name": "Sam",
        "email": "sam@example.com",
        "details": "We need an iOS and Android app for our stores.",
        "service": "mobile-apps",
        "budget": "$20k-$50k"
    });
    let created = app.post("/api/inquiries", body.clone()).await;
    assert_eq!(created.status, StatusCode::CREATED);

    let mut unknown = body;
    unknown["service"] = json!("time-travel");
    let rejected = app.post("/api/inquiries", unknown).await;
    assert_eq!(rejected.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(rejected.body["details"]["field"], "service");

    let inquiries = app.state.leads.list_inquiries(None).await;
    assert_eq!(inquiries.len(), 1);
    assert_eq!(inquiries[0].service_slug.as_deref(), Some("mobile-apps"));
    Ok(())
}

#[tokio::test]
async fn test_non_json_body_is_rejected() -> Result<()> {
    let app = TestApp::new().await?;
    let response = app.request("POST", "/api/contact", None, None).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["error"], "validation_failed");
    Ok(())
}
