/// Refresh Token Records
///
/// Refresh tokens are:
/// - Signed JWTs whose `jti` keys a persisted record
/// - Hashed with SHA-256 before storage (never store plaintext)
/// - Single-use: each refresh revokes the record and links its successor

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Persisted state of one refresh token.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    /// The token's `jti`
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    /// `jti` of the token that replaced this one
    pub replaced_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    /// Neither revoked nor past its expiry.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at >= now
    }

    /// Compare the stored hash with the hash of a presented raw token.
    pub fn matches(&self, raw_token: &str) -> bool {
        self.token_hash == hash_token(raw_token)
    }
}

/// A record about to be inserted.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl NewRefreshToken {
    pub fn new(jti: Uuid, user_id: Uuid, raw_token: &str, expiry_seconds: i64) -> Self {
        Self {
            id: jti,
            user_id,
            token_hash: hash_token(raw_token),
            expires_at: Utc::now() + Duration::seconds(expiry_seconds),
        }
    }

    pub fn into_record(self, created_at: DateTime<Utc>) -> RefreshTokenRecord {
        RefreshTokenRecord {
            id: self.id,
            user_id: self.user_id,
            token_hash: self.token_hash,
            expires_at: self.expires_at,
            revoked: false,
            replaced_by: None,
            created_at,
            revoked_at: None,
        }
    }
}

/// Hash a refresh token using SHA-256 (lowercase hex)
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
