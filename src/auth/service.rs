/// Token lifecycle: issuance, login/signup, rotation, revocation.
///
/// Invariants upheld here:
/// - the raw refresh token never reaches the store, only its SHA-256 hash
/// - a refresh token is usable for exactly one rotation; the old record is
///   revoked in the same atomic store operation that persists its successor
/// - login failures do not reveal whether the email exists

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::jwt::{
    generate_access_token, generate_refresh_token, validate_access_token, validate_refresh_token,
};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::principal::{Principal, Role};
use crate::auth::refresh_token::NewRefreshToken;
use crate::configuration::{JwtSettings, PasswordSettings};
use crate::error::{AppError, AuthError, ValidationError};
use crate::store::{NewUser, Store, User};
use crate::validators::{is_valid_display_name, is_valid_email, is_valid_password};

/// Access + refresh token pair handed to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

struct MintedPair {
    tokens: TokenPair,
    record: NewRefreshToken,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    jwt: JwtSettings,
    bcrypt_cost: u32,
    /// Verified against on unknown emails so both login failures cost one
    /// bcrypt verification.
    dummy_hash: String,
}

impl AuthService {
    /// # Errors
    /// Fails if the bcrypt cost is out of range.
    pub fn new(
        store: Arc<dyn Store>,
        jwt: JwtSettings,
        password: &PasswordSettings,
    ) -> Result<Self, AppError> {
        let dummy_hash = hash_password("reservagym-dummy-password", password.bcrypt_cost)?;
        Ok(Self {
            store,
            jwt,
            bcrypt_cost: password.bcrypt_cost,
            dummy_hash,
        })
    }

    pub fn jwt_settings(&self) -> &JwtSettings {
        &self.jwt
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Create a USER account and issue its first token pair.
    ///
    /// # Errors
    /// `ValidationError` for malformed input or an already registered email
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<TokenPair, AppError> {
        let email = is_valid_email(email)?;
        is_valid_password(password)?;
        let name = is_valid_display_name(name)?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ValidationError::AlreadyExists("email".to_string()).into());
        }

        let password_hash = hash_password(password, self.bcrypt_cost)?;
        let user = self
            .store
            .create_user(NewUser {
                email,
                password_hash,
                name,
                role: Role::User,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User signed up");
        self.issue(user.id, &user.email, user.role).await
    }

    /// # Errors
    /// `AuthError::InvalidCredentials` for an unknown email or a wrong password
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        // A malformed email cannot belong to any account.
        let user = match is_valid_email(email) {
            Ok(email) => self.store.find_user_by_email(&email).await?,
            Err(_) => None,
        };

        let user = match user {
            Some(user) => user,
            None => {
                let _ = verify_password(password, &self.dummy_hash);
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials.into());
        }

        tracing::info!(user_id = %user.id, "User logged in");
        self.issue(user.id, &user.email, user.role).await
    }

    /// Mint a token pair and persist the refresh token's hash.
    pub async fn issue(&self, user_id: Uuid, email: &str, role: Role) -> Result<TokenPair, AppError> {
        let minted = self.mint(user_id, email, role)?;
        self.store.insert_refresh_token(minted.record).await?;
        Ok(minted.tokens)
    }

    /// Exchange a refresh token for a new pair, revoking the presented one.
    ///
    /// # Errors
    /// - `TokenInvalid`: bad signature/format, or hash mismatch
    /// - `TokenExpired`: past the JWT `exp`
    /// - `TokenRevoked`: no record, revoked, expired record, or lost a
    ///   concurrent rotation
    /// - `UserNotFound`: the owner no longer exists
    pub async fn refresh(&self, raw_refresh_token: &str) -> Result<TokenPair, AppError> {
        let claims = validate_refresh_token(raw_refresh_token, &self.jwt)?;
        let jti = claims.jti()?;

        let record = self
            .store
            .find_refresh_token(jti)
            .await?
            .filter(|record| record.is_active(Utc::now()))
            .ok_or(AuthError::TokenRevoked)?;

        if !record.matches(raw_refresh_token) {
            tracing::warn!(jti = %jti, "Refresh token hash mismatch");
            return Err(AuthError::TokenInvalid.into());
        }

        let user = self.owner_of(record.user_id).await?;
        let minted = self.mint(user.id, &user.email, user.role)?;
        let next_jti = minted.record.id;

        if !self.store.rotate_refresh_token(jti, minted.record).await? {
            tracing::warn!(user_id = %user.id, jti = %jti, "Refresh token reuse detected");
            return Err(AuthError::TokenRevoked.into());
        }

        tracing::info!(user_id = %user.id, jti = %jti, next_jti = %next_jti, "Refresh token rotated");
        Ok(minted.tokens)
    }

    /// Revoke a refresh token. Never fails: the client clears its state
    /// whatever happens here.
    pub async fn logout(&self, raw_refresh_token: &str) {
        let jti = match validate_refresh_token(raw_refresh_token, &self.jwt)
            .and_then(|claims| claims.jti())
        {
            Ok(jti) => jti,
            Err(e) => {
                tracing::debug!(error = %e, "Logout with unusable refresh token");
                return;
            }
        };

        match self.store.revoke_refresh_token(jti).await {
            Ok(true) => tracing::info!(jti = %jti, "Refresh token revoked on logout"),
            Ok(false) => tracing::debug!(jti = %jti, "Logout for unknown or already revoked token"),
            Err(e) => tracing::error!(jti = %jti, error = %e, "Logout could not reach the store"),
        }
    }

    /// Resolve the identity behind an access token.
    ///
    /// # Errors
    /// `TokenInvalid` or `TokenExpired`
    pub fn whoami(&self, access_token: &str) -> Result<Principal, AuthError> {
        validate_access_token(access_token, &self.jwt)?.into_principal()
    }

    async fn owner_of(&self, user_id: Uuid) -> Result<User, AppError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::UserNotFound.into())
    }

    fn mint(&self, user_id: Uuid, email: &str, role: Role) -> Result<MintedPair, AppError> {
        let jti = Uuid::new_v4();
        let access_token = generate_access_token(&user_id, email, role, &self.jwt)?;
        let refresh_token = generate_refresh_token(&user_id, email, jti, &self.jwt)?;
        let record = NewRefreshToken::new(jti, user_id, &refresh_token, self.jwt.refresh_token_expiry);

        Ok(MintedPair {
            tokens: TokenPair {
                access_token,
                refresh_token,
            },
            record,
        })
    }
}
