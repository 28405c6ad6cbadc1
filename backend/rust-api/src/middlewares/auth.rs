use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::user::UserRole;
use crate::services::{auth_service, AppState};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String,  // user_id
    pub role: String, // student, instructor, admin
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("No token, authorization denied")]
    MissingToken,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Token expired")]
    ExpiredToken,
    #[error("Token has been revoked")]
    RevokedToken,
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::unauthorized(err.to_string())
    }
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_seconds: i64,
}

impl JwtService {
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }

    pub fn issue(&self, user_id: &ObjectId, role: UserRole) -> Result<String, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let claims = JwtClaims {
            sub: user_id.to_hex(),
            role: role.as_str().to_string(),
            exp: (now + self.ttl_seconds) as usize,
            iat: now as usize,
        };
        self.generate_token(claims)
    }

    pub fn generate_token(&self, claims: JwtClaims) -> Result<String, AuthError> {
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|_| AuthError::InvalidToken)
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let validation = Validation::default();

        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })
    }
}

/// The authenticated caller, placed in request extensions by the auth middlewares.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: ObjectId,
    pub role: UserRole,
    /// Raw bearer token, kept so logout can revoke it
    pub token: String,
    /// Unix seconds
    pub expires_at: i64,
}

impl AuthUser {
    pub fn from_claims(claims: &JwtClaims, token: &str) -> Result<Self, AuthError> {
        let id = ObjectId::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        let role = claims
            .role
            .parse::<UserRole>()
            .map_err(|_| AuthError::InvalidToken)?;
        Ok(Self {
            id,
            role,
            token: token.to_string(),
            expires_at: claims.exp as i64,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn ensure_staff(&self) -> AppResult<()> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::forbidden("Access denied. Instructor or admin only."))
        }
    }

    pub fn ensure_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("Access denied. Admin only."))
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AuthError::MissingToken.into())
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthUser>().cloned())
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, AuthError> {
    let claims = state.jwt.validate_token(token).map_err(|e| {
        tracing::warn!("JWT validation failed: {}", e);
        e
    })?;

    // Revocation lookups fail open so a Redis outage does not lock everyone out
    match auth_service::is_token_revoked(state, token).await {
        Ok(true) => return Err(AuthError::RevokedToken),
        Ok(false) => {}
        Err(e) => tracing::warn!("Token revocation check skipped: {:#}", e),
    }

    let user = AuthUser::from_claims(&claims, token)?;
    tracing::debug!("Authenticated user: {} (role: {})", claims.sub, claims.role);
    Ok(user)
}

/// Middleware: requires a valid bearer token
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or(AuthError::MissingToken)?
        .to_string();

    let user = authenticate(&state, &token).await?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Optional auth - anonymous requests pass, but a token that is present must be valid
pub async fn optional_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(token) = bearer_token(request.headers()).map(str::to_string) {
        let user = authenticate(&state, &token).await?;
        request.extensions_mut().insert(user);
    }

    Ok(next.run(request).await)
}

/// Runs after `auth_middleware`
pub async fn admin_guard_middleware(request: Request, next: Next) -> Result<Response, AppError> {
    match request.extensions().get::<AuthUser>() {
        Some(user) if user.is_admin() => Ok(next.run(request).await),
        Some(user) => {
            tracing::warn!("Access denied: admin role required (user {})", user.id);
            Err(AppError::forbidden("Access denied. Admin only."))
        }
        None => Err(AuthError::MissingToken.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_jwt_generation_and_validation() {
        let service = JwtService::new("test-secret", 3600);
        let user_id = ObjectId::new();

        let token = service.issue(&user_id, UserRole::Instructor).unwrap();
        let claims = service.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_hex());
        assert_eq!(claims.role, "instructor");
        assert!(claims.exp > claims.iat);

        let user = AuthUser::from_claims(&claims, &token).unwrap();
        assert_eq!(user.id, user_id);
        assert!(user.is_staff());
        assert!(!user.is_admin());
    }

    #[test]
    fn test_expired_and_foreign_tokens() {
        let service = JwtService::new("test-secret", 3600);
        let now = chrono::Utc::now().timestamp();
        let expired = service
            .generate_token(JwtClaims {
                sub: ObjectId::new().to_hex(),
                role: "student".to_string(),
                exp: (now - 3600) as usize,
                iat: (now - 7200) as usize,
            })
            .unwrap();
        assert_eq!(
            service.validate_token(&expired).unwrap_err(),
            AuthError::ExpiredToken
        );

        let other = JwtService::new("another-secret", 3600);
        let token = other.issue(&ObjectId::new(), UserRole::Student).unwrap();
        assert_eq!(
            service.validate_token(&token).unwrap_err(),
            AuthError::InvalidToken
        );
    }

    #[test]
    fn test_claims_with_unknown_role_are_rejected() {
        let claims = JwtClaims {
            sub: ObjectId::new().to_hex(),
            role: "teacher".to_string(),
            exp: 0,
            iat: 0,
        };
        assert!(AuthUser::from_claims(&claims, "t").is_err());
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }
}
