use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use serde_json::json;
use std::{sync::Arc, time::Duration};

use crate::metrics;
use crate::services::AppState;

pub mod admin;
pub mod auth;
pub mod courses;
pub mod quizzes;
pub mod students;
pub mod uploads;

pub async fn home() -> impl IntoResponse {
    Json(json!({ "message": "CourseMaster API" }))
}

/// Outcome of probing one backing service
#[derive(Debug, Serialize)]
struct DependencyHealth {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl DependencyHealth {
    fn up(message: &'static str) -> Self {
        Self { status: "healthy", message: Some(message), error: None }
    }

    fn down(error: String) -> Self {
        Self { status: "unhealthy", message: None, error: Some(error) }
    }

    fn is_up(&self) -> bool {
        self.error.is_none()
    }
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (mongodb, redis) = tokio::join!(check_mongodb(&state), check_redis(&state));

    let (status_code, status) = if mongodb.is_up() && redis.is_up() {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": "coursemaster-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": { "mongodb": mongodb, "redis": redis }
        })),
    )
}

async fn check_mongodb(state: &AppState) -> DependencyHealth {
    let ping = state.mongo.run_command(mongodb::bson::doc! { "ping": 1 });
    match tokio::time::timeout(Duration::from_secs(1), ping).await {
        Ok(Ok(_)) => DependencyHealth::up("MongoDB connection successful"),
        Ok(Err(e)) => DependencyHealth::down(format!("MongoDB error: {}", e)),
        Err(_) => DependencyHealth::down("MongoDB timeout after 1s".to_string()),
    }
}

async fn check_redis(state: &AppState) -> DependencyHealth {
    let mut conn = match state.redis_connection().await {
        Ok(conn) => conn,
        Err(e) => return DependencyHealth::down(format!("Redis error: {}", e)),
    };

    let mut ping_cmd = redis::cmd("PING");
    let ping = ping_cmd.query_async::<String>(&mut conn);
    match tokio::time::timeout(Duration::from_millis(500), ping).await {
        Ok(Ok(_)) => DependencyHealth::up("Redis connection successful"),
        Ok(Err(e)) => DependencyHealth::down(format!("Redis error: {}", e)),
        Err(_) => DependencyHealth::down("Redis timeout after 500ms".to_string()),
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

fn basic_credentials(value: &str) -> Option<String> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    String::from_utf8(decoded).ok()
}

/// Protects /metrics with HTTP Basic auth against `metrics.auth` (`user:password`)
pub async fn metrics_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(basic_credentials)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if credentials != state.config.metrics_auth {
        tracing::warn!("Rejected metrics scrape with wrong credentials");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_credentials() {
        let encoded = general_purpose::STANDARD.encode("admin:changeme");
        assert_eq!(
            basic_credentials(&format!("Basic {}", encoded)).as_deref(),
            Some("admin:changeme")
        );
        assert_eq!(basic_credentials("Bearer abc"), None);
        assert_eq!(basic_credentials("Basic %%%"), None);
    }

    #[test]
    fn test_dependency_health_shape() {
        let up = serde_json::to_value(DependencyHealth::up("ok")).unwrap();
        assert_eq!(up, json!({ "status": "healthy", "message": "ok" }));

        let down = DependencyHealth::down("refused".to_string());
        assert!(!down.is_up());
        assert_eq!(
            serde_json::to_value(down).unwrap(),
            json!({ "status": "unhealthy", "error": "refused" })
        );
    }
}
