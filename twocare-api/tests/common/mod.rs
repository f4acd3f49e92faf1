/// Common test utilities for API tests
///
/// Builds the full router over the in-memory store, object storage and a
/// manual clock, so requests go through the real middleware stack without
/// PostgreSQL or Supabase.
use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;
use twocare_api::app::{build_router, AppState};
use twocare_shared::auth::jwt::{create_token, Claims};
use twocare_shared::clock::ManualClock;
use twocare_shared::config::Config;
use twocare_shared::db::MemoryStore;
use twocare_shared::models::user::User;
use twocare_shared::services::ServiceContext;
use twocare_shared::storage::MemoryStorage;

pub const BOUNDARY: &str = "twocare-test-boundary";

/// Test context holding the router and its collaborators
pub struct TestContext {
    pub app: axum::Router,
    pub store: Arc<MemoryStore>,
    pub storage: Arc<MemoryStorage>,
    pub clock: Arc<ManualClock>,
    pub config: Arc<Config>,
}

impl TestContext {
    pub fn new() -> Self {
        let vars: HashMap<String, String> = [
            ("DATABASE_URL", "postgresql://localhost/twocare_test"),
            ("JWT_SECRET", "test-access-secret-that-is-long-enough"),
            ("JWT_REFRESH_SECRET", "test-refresh-secret-that-is-long-enough"),
            ("FRONTEND_URL", "https://app.twocare.test"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let config = Arc::new(Config::from_map(&vars).unwrap());

        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let services = ServiceContext::new(store.clone(), storage.clone(), clock.clone(), config.clone());
        let app = build_router(AppState::new(services));

        Self {
            app,
            store,
            storage,
            clock,
            config,
        }
    }

    /// Inserts a user and returns it with a valid access token
    pub fn user(&self, first_name: &str) -> (User, String) {
        let email = format!("{}@example.com", first_name.to_lowercase());
        let user = self.store.insert_user(&email, first_name, "unused-hash");
        let claims = Claims::access(user.id, &user.email, user.role, self.config.jwt.expires_in);
        let token = create_token(&claims, &self.config.jwt.secret).unwrap();
        (user, token)
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Sends a JSON request; `body` of `None` sends no body
    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (u16, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.send(request).await;
        let status = response.status().as_u16();
        (status, body_json(response).await)
    }

    /// Sends a multipart upload with a single `file` field
    pub async fn upload(&self, uri: &str, token: &str, content_type: &str, data: &[u8]) -> (u16, Value) {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"upload\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();

        let response = self.send(request).await;
        let status = response.status().as_u16();
        (status, body_json(response).await)
    }
}

/// Reads a response body as JSON; an empty body reads as `Value::Null`
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}
