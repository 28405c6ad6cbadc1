#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use coursemaster_api::{
    config::Config, create_router, models::user::UserRole, services::indexes, services::AppState,
};
use mongodb::bson::oid::ObjectId;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const METRICS_AUTH: &str = "metrics:secret";
pub const ADMIN_KEY: &str = "test-admin-key";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    /// Upload root; removed when the app is dropped
    pub uploads: TempDir,
}

/// Builds the full router against a throwaway database name. Neither the MongoDB
/// nor the Redis client connects until a request needs it, so tests that stop
/// before storage run without either service.
pub async fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // Keep repeated registrations in one run under the per-IP window
    std::env::set_var("RATE_LIMIT_DISABLED", "1");

    let uploads = tempfile::tempdir().unwrap();
    let config = Config {
        mongo_uri: std::env::var("TEST_MONGO_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
        mongo_database: format!("coursemaster_test_{}", uuid::Uuid::new_v4().simple()),
        redis_uri: std::env::var("TEST_REDIS_URI")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379/15".to_string()),
        jwt_secret: "integration-test-secret".to_string(),
        jwt_expires_in_seconds: 3600,
        admin_registration_key: Some(ADMIN_KEY.to_string()),
        upload_dir: uploads.path().to_string_lossy().into_owned(),
        public_url: "http://localhost:5000".to_string(),
        port: 0,
        metrics_auth: METRICS_AUTH.to_string(),
    };

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .unwrap();
    let redis_client = redis::Client::open(config.redis_uri.clone()).unwrap();

    let state = Arc::new(
        AppState::new(config, mongo_client, redis_client)
            .await
            .unwrap(),
    );

    TestApp {
        router: create_router(state.clone()),
        state,
        uploads,
    }
}

/// Like [`create_test_app`] but with indexes in place; needs a live MongoDB.
pub async fn create_db_test_app() -> TestApp {
    let app = create_test_app().await;
    indexes::ensure_indexes(&app.state.mongo).await.unwrap();
    app
}

impl TestApp {
    /// A signed token for a user that need not exist in the database
    pub fn token_for(&self, role: UserRole) -> String {
        self.state.jwt.issue(&ObjectId::new(), role).unwrap()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    pub async fn cleanup(&self) {
        let _ = self.state.mongo.drop().await;
    }
}

pub fn error_message(body: &Value) -> &str {
    body["error"].as_str().unwrap_or_default()
}
