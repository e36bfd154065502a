/// JWT Claims structures
///
/// Access tokens identify the caller for one request window; refresh tokens
/// carry a `jti` that keys their persisted record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::principal::{Principal, Role};
use crate::error::AuthError;

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
}

impl AccessClaims {
    pub fn new(user_id: Uuid, email: String, role: Role, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            email,
            role,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    /// Convert validated claims into the caller's identity.
    ///
    /// # Errors
    /// Returns `TokenInvalid` if the subject is not a UUID
    pub fn into_principal(self) -> Result<Principal, AuthError> {
        let sub = Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenInvalid)?;
        Ok(Principal {
            sub,
            email: self.email,
            role: self.role,
        })
    }
}

/// JWT Claims for refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub sub: String,
    pub email: String,
    /// Unique token id, the lookup key of the persisted record
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl RefreshClaims {
    pub fn new(user_id: Uuid, email: String, jti: Uuid, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            email,
            jti: jti.to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    pub fn jti(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.jti).map_err(|_| AuthError::TokenInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_claims_creation() {
        let user_id = Uuid::new_v4();
        let claims = AccessClaims::new(
            user_id,
            "test@example.com".to_string(),
            Role::User,
            900,
            "test".to_string(),
        );

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.exp - claims.iat, 900);
        assert_eq!(claims.role, Role::User);
    }

    #[test]
    fn test_into_principal() {
        let user_id = Uuid::new_v4();
        let claims = AccessClaims::new(
            user_id,
            "admin@example.com".to_string(),
            Role::Admin,
            900,
            "test".to_string(),
        );

        let principal = claims.into_principal().unwrap();
        assert_eq!(principal.sub, user_id);
        assert_eq!(principal.email, "admin@example.com");
        assert_eq!(principal.role, Role::Admin);
    }

    #[test]
    fn test_invalid_subject() {
        let mut claims = AccessClaims::new(
            Uuid::new_v4(),
            "test@example.com".to_string(),
            Role::User,
            900,
            "test".to_string(),
        );
        claims.sub = "invalid-uuid".to_string();

        assert_eq!(claims.into_principal().unwrap_err(), AuthError::TokenInvalid);
    }

    #[test]
    fn test_refresh_claims_jti() {
        let jti = Uuid::new_v4();
        let claims = RefreshClaims::new(
            Uuid::new_v4(),
            "test@example.com".to_string(),
            jti,
            60,
            "test".to_string(),
        );
        assert_eq!(claims.jti().unwrap(), jti);
    }
}
