use anyhow::Context;
use bcrypt::{hash, verify};
use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::{Collection, Database};
use redis::AsyncCommands;
use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};
use crate::metrics::record_auth_event;
use crate::middlewares::auth::{AuthUser, JwtService};
use crate::models::user::{AuthResponse, LoginRequest, RegisterRequest, User, UserProfile, UserRole};
use crate::models::USERS;
use crate::services::AppState;
use crate::utils::mongo::is_duplicate_key;

const BCRYPT_COST: u32 = 10;

pub struct AuthService {
    mongo: Database,
    jwt_service: JwtService,
    admin_registration_key: Option<String>,
}

impl AuthService {
    pub fn new(state: &AppState) -> Self {
        Self {
            mongo: state.mongo.clone(),
            jwt_service: state.jwt.clone(),
            admin_registration_key: state.config.admin_registration_key.clone(),
        }
    }

    fn users(&self) -> Collection<User> {
        self.mongo.collection::<User>(USERS)
    }

    pub fn hash_password(password: &str) -> anyhow::Result<String> {
        hash(password, BCRYPT_COST).context("Failed to hash password")
    }

    pub fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
        verify(password, hash).context("Failed to verify password")
    }

    /// Register a new user and sign them in
    pub async fn register(&self, req: RegisterRequest) -> AppResult<AuthResponse> {
        let email = normalize_email(&req.email);

        let existing_user = self
            .users()
            .find_one(doc! { "email": &email })
            .await
            .context("Failed to check existing user")?;
        if existing_user.is_some() {
            return Err(AppError::conflict("User already exists"));
        }

        let role = req.role.unwrap_or_default();
        if role == UserRole::Admin
            && !admin_key_matches(
                self.admin_registration_key.as_deref(),
                req.registration_key.as_deref(),
            )
        {
            tracing::warn!("Admin registration rejected for {}", email);
            return Err(AppError::forbidden("Invalid admin registration key"));
        }

        let mut user = User {
            id: None,
            name: req.name.trim().to_string(),
            email,
            password_hash: Self::hash_password(&req.password)?,
            role,
            avatar: String::new(),
            bio: String::new(),
            phone: String::new(),
            enrolled_courses: Vec::new(),
            created_at: Utc::now(),
        };

        let insert_result = match self.users().insert_one(&user).await {
            Ok(result) => result,
            Err(e) if is_duplicate_key(&e) => return Err(AppError::conflict("User already exists")),
            Err(e) => return Err(anyhow::Error::new(e).context("Failed to insert user").into()),
        };

        let user_id = insert_result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow::anyhow!("Failed to get inserted user ID"))?;
        user.id = Some(user_id);

        let token = self.sign(&user_id, role)?;
        record_auth_event("register", true);
        tracing::info!("User registered: {} ({})", user_id, role.as_str());

        Ok(AuthResponse {
            token,
            user: UserProfile::from(user),
        })
    }

    pub async fn login(&self, req: LoginRequest) -> AppResult<AuthResponse> {
        let email = normalize_email(&req.email);

        let user = self
            .users()
            .find_one(doc! { "email": &email })
            .await
            .context("Failed to query user")?;

        let Some(user) = user else {
            record_auth_event("login", false);
            return Err(AppError::unauthorized("Invalid credentials"));
        };

        if !Self::verify_password(&req.password, &user.password_hash)? {
            record_auth_event("login", false);
            tracing::warn!("Failed login for {}", email);
            return Err(AppError::unauthorized("Invalid credentials"));
        }

        let user_id = user
            .id
            .ok_or_else(|| anyhow::anyhow!("Stored user has no id"))?;
        let token = self.sign(&user_id, user.role)?;
        record_auth_event("login", true);

        Ok(AuthResponse {
            token,
            user: UserProfile::from(user),
        })
    }

    fn sign(&self, user_id: &ObjectId, role: UserRole) -> anyhow::Result<String> {
        self.jwt_service
            .issue(user_id, role)
            .map_err(|e| anyhow::anyhow!("Failed to sign token: {}", e))
    }

    pub async fn current_user(&self, user_id: &ObjectId) -> AppResult<UserProfile> {
        self.users()
            .find_one(doc! { "_id": user_id })
            .await
            .context("Failed to query user")?
            .map(UserProfile::from)
            .ok_or_else(|| AppError::unauthorized("User not found"))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Admin self-registration is disabled when no key is configured.
fn admin_key_matches(configured: Option<&str>, provided: Option<&str>) -> bool {
    match (configured, provided) {
        (Some(expected), Some(given)) => expected == given,
        _ => false,
    }
}

fn revoked_key(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("revoked:{}", hex::encode(digest))
}

/// Store the token's hash until it would have expired anyway.
pub async fn revoke_token(state: &AppState, user: &AuthUser) -> anyhow::Result<()> {
    let ttl = (user.expires_at - Utc::now().timestamp()).max(1) as u64;
    let mut conn = state.redis_connection().await?;
    let _: () = conn
        .set_ex(revoked_key(&user.token), user.id.to_hex(), ttl)
        .await
        .context("Failed to store revoked token")?;
    record_auth_event("logout", true);
    Ok(())
}

pub async fn is_token_revoked(state: &AppState, token: &str) -> anyhow::Result<bool> {
    let mut conn = state.redis_connection().await?;
    let revoked: bool = conn
        .exists(revoked_key(token))
        .await
        .context("Failed to check revoked token")?;
    Ok(revoked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing() {
        let hashed = AuthService::hash_password("secret123").unwrap();
        assert_ne!(hashed, "secret123");
        assert!(AuthService::verify_password("secret123", &hashed).unwrap());
        assert!(!AuthService::verify_password("wrong", &hashed).unwrap());
    }

    #[test]
    fn test_admin_key_matching() {
        assert!(admin_key_matches(Some("k"), Some("k")));
        assert!(!admin_key_matches(Some("k"), Some("x")));
        assert!(!admin_key_matches(Some("k"), None));
        assert!(!admin_key_matches(None, Some("k")));
        assert!(!admin_key_matches(None, None));
    }

    #[test]
    fn test_revoked_key_hashes_token() {
        assert_eq!(
            revoked_key("abc"),
            "revoked:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Jane@Example.COM "), "jane@example.com");
    }
}
