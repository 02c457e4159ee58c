use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use uuid::Uuid;

use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    Claims, CreateUserRequest, LoginRequest, LoginResponse, RefreshToken, User, UserResponse,
    UserRole,
};
use crate::validation::Validate;

/// Authentication service
pub struct AuthService;

impl AuthService {
    /// Register a new account
    ///
    /// The first account, and any address listed in `auth.admin_emails`,
    /// becomes an administrator.
    pub async fn register(
        db: &Database,
        config: &Config,
        req: CreateUserRequest,
    ) -> Result<UserResponse> {
        req.validate()?;
        let email = req.email.trim().to_lowercase();
        let password_hash = Self::hash_password(&req.password)?;

        let mut tx = db.pool().begin().await?;

        let existing: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(tx.as_mut())
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(tx.as_mut())
            .await?;

        let role = if count == 0 || config.auth.is_admin_email(&email) {
            UserRole::Admin
        } else {
            UserRole::User
        };

        let user_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user_id)
        .bind(&email)
        .bind(req.name.trim())
        .bind(&password_hash)
        .bind(role.as_str())
        .bind(&now)
        .bind(&now)
        .execute(tx.as_mut())
        .await?;

        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&user_id)
            .fetch_one(tx.as_mut())
            .await?;

        tx.commit().await?;

        tracing::info!("Registered {} with role {}", user.email, user.role);
        Ok(UserResponse::from(user))
    }

    /// Login user
    pub async fn login(db: &Database, config: &Config, req: LoginRequest) -> Result<LoginResponse> {
        let user: User = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(req.email.trim().to_lowercase())
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

        if !Self::verify_password(&req.password, &user.password_hash)? {
            return Err(AppError::Unauthorized("Invalid email or password".to_string()));
        }

        if !user.is_active {
            return Err(AppError::Forbidden("Account is disabled".to_string()));
        }

        let access_token = Self::generate_access_token(&user, config)?;
        let refresh_token = Self::generate_refresh_token(db, &user.id, config).await?;

        Ok(LoginResponse {
            access_token,
            refresh_token: Some(refresh_token),
            token_type: "Bearer".to_string(),
            expires_in: config.jwt.access_token_expire_minutes * 60,
            user: UserResponse::from(user),
        })
    }

    /// Exchange a refresh token for a new token pair; the old one is consumed
    pub async fn refresh_token(
        db: &Database,
        config: &Config,
        refresh_token: &str,
    ) -> Result<LoginResponse> {
        let mut tx = db.pool().begin().await?;

        let token_hash = Self::hash_token(refresh_token);

        let stored_token: RefreshToken =
            sqlx::query_as("SELECT * FROM refresh_tokens WHERE token_hash = ?")
                .bind(&token_hash)
                .fetch_optional(tx.as_mut())
                .await?
                .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;

        let expires_at = chrono::DateTime::parse_from_rfc3339(&stored_token.expires_at)
            .map_err(|_| AppError::Internal("Invalid token expiry format".to_string()))?;

        if expires_at < Utc::now() {
            sqlx::query("DELETE FROM refresh_tokens WHERE id = ?")
                .bind(&stored_token.id)
                .execute(tx.as_mut())
                .await?;
            tx.commit().await?;
            return Err(AppError::Unauthorized("Refresh token expired".to_string()));
        }

        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&stored_token.user_id)
            .fetch_one(tx.as_mut())
            .await?;

        if !user.is_active {
            return Err(AppError::Forbidden("Account is disabled".to_string()));
        }

        let access_token = Self::generate_access_token(&user, config)?;
        let new_refresh_token =
            Self::generate_refresh_token_tx(tx.as_mut(), &user.id, config).await?;

        sqlx::query("DELETE FROM refresh_tokens WHERE id = ?")
            .bind(&stored_token.id)
            .execute(tx.as_mut())
            .await?;

        tx.commit().await?;

        Ok(LoginResponse {
            access_token,
            refresh_token: Some(new_refresh_token),
            token_type: "Bearer".to_string(),
            expires_in: config.jwt.access_token_expire_minutes * 60,
            user: UserResponse::from(user),
        })
    }

    /// Revoke every session of a user: access tokens via the version bump,
    /// refresh tokens by deletion
    pub async fn revoke_sessions(db: &Database, user_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut tx = db.pool().begin().await?;
        sqlx::query(
            "UPDATE users SET token_version = token_version + 1, updated_at = ? WHERE id = ?",
        )
        .bind(&now)
        .bind(user_id)
        .execute(tx.as_mut())
        .await?;
        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(tx.as_mut())
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Logout user (invalidate all of their tokens)
    pub async fn logout(db: &Database, user_id: &str) -> Result<()> {
        Self::revoke_sessions(db, user_id).await
    }

    fn generate_access_token(user: &User, config: &Config) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::minutes(config.jwt.access_token_expire_minutes as i64);

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            ver: user.token_version,
            jti: Uuid::new_v4().to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt.secret.as_bytes()),
        )?;

        Ok(token)
    }

    async fn generate_refresh_token(
        db: &Database,
        user_id: &str,
        config: &Config,
    ) -> Result<String> {
        let mut tx = db.pool().begin().await?;
        let token = Self::generate_refresh_token_tx(tx.as_mut(), user_id, config).await?;
        tx.commit().await?;
        Ok(token)
    }

    async fn generate_refresh_token_tx(
        conn: &mut sqlx::SqliteConnection,
        user_id: &str,
        config: &Config,
    ) -> Result<String> {
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let token_hash = Self::hash_token(&token);

        let id = Uuid::new_v4().to_string();
        let expires_at =
            (Utc::now() + Duration::days(config.jwt.refresh_token_expire_days as i64)).to_rfc3339();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&token_hash)
        .bind(&expires_at)
        .bind(&now)
        .execute(conn)
        .await?;

        Ok(token)
    }

    /// Validate access token and extract claims; previous secrets are still accepted
    pub fn validate_token(token: &str, config: &Config) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let keys = std::iter::once(config.jwt.secret.as_str())
            .chain(config.jwt.previous_secrets.iter().map(|s| s.as_str()));

        for secret in keys {
            if let Ok(token_data) = decode::<Claims>(
                token,
                &DecodingKey::from_secret(secret.as_bytes()),
                &validation,
            ) {
                return Ok(token_data.claims);
            }
        }

        Err(AppError::Unauthorized("Invalid token".to_string()))
    }

    fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?
            .to_string();

        Ok(password_hash)
    }

    fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Refresh tokens are only stored as SHA-256 hex digests
    fn hash_token(token: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            name: "Someone".to_string(),
            password: "correct horse".to_string(),
        }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_user_and_listed_emails_are_admins() {
        let db = Database::in_memory().await.unwrap();
        let mut config = Config::default();
        config.auth.admin_emails = vec!["editor@example.com".to_string()];

        let first = AuthService::register(&db, &config, signup("owner@example.com"))
            .await
            .unwrap();
        let second = AuthService::register(&db, &config, signup("reader@example.com"))
            .await
            .unwrap();
        let listed = AuthService::register(&db, &config, signup("Editor@Example.com"))
            .await
            .unwrap();

        assert_eq!(first.role, "admin");
        assert_eq!(second.role, "user");
        assert_eq!(listed.role, "admin");
        assert_eq!(listed.email, "editor@example.com");

        let duplicate = AuthService::register(&db, &config, signup("OWNER@example.com")).await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_login_and_refresh_rotation() {
        let db = Database::in_memory().await.unwrap();
        let config = Config::default();
        AuthService::register(&db, &config, signup("owner@example.com"))
            .await
            .unwrap();

        let bad = AuthService::login(&db, &config, login("owner@example.com", "wrong")).await;
        assert!(matches!(bad, Err(AppError::Unauthorized(_))));

        let session = AuthService::login(&db, &config, login("owner@example.com", "correct horse"))
            .await
            .unwrap();
        let claims = AuthService::validate_token(&session.access_token, &config).unwrap();
        assert_eq!(claims.email, "owner@example.com");
        assert_eq!(claims.role, "admin");

        let old_refresh = session.refresh_token.unwrap();
        let rotated = AuthService::refresh_token(&db, &config, &old_refresh)
            .await
            .unwrap();
        assert!(rotated.refresh_token.is_some());

        // a consumed refresh token cannot be replayed
        let replay = AuthService::refresh_token(&db, &config, &old_refresh).await;
        assert!(matches!(replay, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_weak_signup_is_rejected() {
        let db = Database::in_memory().await.unwrap();
        let mut req = signup("not-an-email");
        req.password = "short".to_string();
        let err = AuthService::register(&db, &Config::default(), req)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(errors) if errors.len() == 2));
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let mut config = Config::default();
        config.jwt.secret = "first".to_string();
        let user = User {
            id: "u1".to_string(),
            email: "a@example.com".to_string(),
            name: "A".to_string(),
            password_hash: String::new(),
            role: "admin".to_string(),
            is_active: true,
            token_version: 0,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let token = AuthService::generate_access_token(&user, &config).unwrap();

        config.jwt.secret = "second".to_string();
        assert!(AuthService::validate_token(&token, &config).is_err());

        config.jwt.previous_secrets = vec!["first".to_string()];
        assert!(AuthService::validate_token(&token, &config).is_ok());
    }
}
