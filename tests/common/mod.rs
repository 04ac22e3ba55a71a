#![allow(dead_code)]

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use site_cms::core::auth::{NewUser, Role};
use site_cms::{build_router, AppConfig, AppState, Store};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// 記憶體資料庫 + 暫存上傳目錄的測試用應用程式
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub uploads: TempDir,
}

impl TestApp {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config("").await
    }

    /// `extra_toml` 會附加在基本設定之後
    pub async fn with_config(extra_toml: &str) -> anyhow::Result<Self> {
        let uploads = TempDir::new()?;
        let uploads_path = uploads.path().to_string_lossy().replace('\\', "/");
        let toml = format!(
            r#"
[storage]
persist = false
uploads_dir = "{}"

{}
"#,
            uploads_path, extra_toml
        );
        let config = AppConfig::from_toml_str(&toml)?;
        let state = AppState::new(config, Arc::new(Store::in_memory()))?;
        Ok(Self {
            router: build_router(state.clone()),
            state,
            uploads,
        })
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "198.51.100.7");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request("GET", uri, None, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.request("POST", uri, None, Some(body)).await
    }

    /// 建立指定角色的使用者並登入，回傳 bearer token
    pub async fn token_for(&self, role: Role) -> String {
        let email = format!("{}@example.com", role);
        self.state
            .auth
            .create_user(NewUser {
                name: format!("{} user", role),
                email: email.clone(),
                password: PASSWORD.to_string(),
                role,
            })
            .await
            .unwrap();
        self.state.auth.login(&email, PASSWORD).await.unwrap().token
    }
}
