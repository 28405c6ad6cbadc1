use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::AppError;
use crate::services::AppState;

/// Fixed-window limit for one endpoint family
#[derive(Debug, Clone, Copy)]
struct RateRule {
    name: &'static str,
    limit: u32,
    window_seconds: u64,
    /// Env var overriding `limit`
    env_override: &'static str,
}

// 10 attempts per 5 minutes
const LOGIN_RULE: RateRule = RateRule {
    name: "login",
    limit: 10,
    window_seconds: 300,
    env_override: "RATE_LIMIT_LOGIN_ATTEMPTS",
};

// 5 registrations per hour
const REGISTER_RULE: RateRule = RateRule {
    name: "register",
    limit: 5,
    window_seconds: 3600,
    env_override: "RATE_LIMIT_REGISTER_ATTEMPTS",
};

// INCR within the window; the first hit starts the expiry
const FIXED_WINDOW_SCRIPT: &str = r#"
    local hits = redis.call('INCR', KEYS[1])
    if hits == 1 then
        redis.call('EXPIRE', KEYS[1], ARGV[2])
    end
    if hits > tonumber(ARGV[1]) then
        return 0
    end
    return 1
"#;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Client address, trusting proxy headers first:
/// X-Forwarded-For, Forwarded, X-Real-IP, then the socket peer.
fn client_ip(headers: &HeaderMap, extensions: &axum::http::Extensions) -> String {
    let forwarded_for = header_str(headers, "x-forwarded-for")
        .and_then(|list| list.split(',').next())
        .map(str::trim);

    let forwarded = || {
        header_str(headers, "forwarded")?
            .split(';')
            .find_map(|part| part.trim().strip_prefix("for="))
            .map(|v| v.trim().trim_matches('"'))
    };

    let real_ip = || header_str(headers, "x-real-ip").map(str::trim);

    forwarded_for
        .or_else(forwarded)
        .or_else(real_ip)
        .map(str::to_string)
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn rate_limit_disabled() -> bool {
    std::env::var("RATE_LIMIT_DISABLED").unwrap_or_default() == "1"
}

fn effective_limit(rule: &RateRule) -> u32 {
    std::env::var(rule.env_override)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(rule.limit)
}

fn rate_key(rule: &RateRule, client_ip: &str) -> String {
    format!("ratelimit:{}:{}", rule.name, client_ip)
}

async fn enforce(
    state: &AppState,
    rule: RateRule,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if rate_limit_disabled() {
        tracing::debug!("Rate limiting disabled via RATE_LIMIT_DISABLED=1");
        return Ok(next.run(request).await);
    }

    let ip = client_ip(request.headers(), request.extensions());
    let key = rate_key(&rule, &ip);

    match check_rate_limit_with_window(state, &key, effective_limit(&rule), rule.window_seconds)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("{} rate limit exceeded for IP: {}", rule.name, ip);
            return Err(AppError::TooManyRequests(
                "Too many requests, please try again later".to_string(),
            ));
        }
        // Redis outages must not block sign-in
        Err(e) => tracing::warn!("{} rate limit check skipped: {:#}", rule.name, e),
    }

    Ok(next.run(request).await)
}

/// Allows 10 login attempts per 5 minutes per IP
pub async fn login_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce(&state, LOGIN_RULE, request, next).await
}

/// Allows 5 registrations per hour per IP
pub async fn register_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce(&state, REGISTER_RULE, request, next).await
}

async fn check_rate_limit_with_window(
    state: &AppState,
    key: &str,
    limit: u32,
    window_seconds: u64,
) -> anyhow::Result<bool> {
    let mut conn = state.redis_connection().await?;

    let allowed: u32 = redis::Script::new(FIXED_WINDOW_SCRIPT)
        .key(key)
        .arg(limit)
        .arg(window_seconds)
        .invoke_async(&mut conn)
        .await?;

    Ok(allowed == 1)
}
