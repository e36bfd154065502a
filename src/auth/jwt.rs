/// JWT Token Generation and Validation
///
/// Access and refresh tokens are both HS256 JWTs, signed with separate
/// secrets from `JwtSettings`.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::auth::claims::{AccessClaims, RefreshClaims};
use crate::auth::principal::Role;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Generate a new access token for a user
///
/// # Errors
/// Returns error if token generation fails
pub fn generate_access_token(
    user_id: &Uuid,
    email: &str,
    role: Role,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = AccessClaims::new(
        *user_id,
        email.to_string(),
        role,
        config.access_token_expiry,
        config.issuer.clone(),
    );

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.access_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Generate a refresh token carrying `jti`
///
/// # Errors
/// Returns error if token generation fails
pub fn generate_refresh_token(
    user_id: &Uuid,
    email: &str,
    jti: Uuid,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = RefreshClaims::new(
        *user_id,
        email.to_string(),
        jti,
        config.refresh_token_expiry,
        config.issuer.clone(),
    );

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.refresh_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Validate and extract claims from an access token
///
/// # Errors
/// `TokenExpired` past `exp`, `TokenInvalid` for anything else (bad
/// signature, wrong issuer, malformed)
pub fn validate_access_token(token: &str, config: &JwtSettings) -> Result<AccessClaims, AuthError> {
    decode_with(token, config.access_secret.as_bytes(), &config.issuer)
}

/// Validate the signature and expiry of a refresh token
///
/// Only proves the token was minted by us; the persisted record decides
/// whether it is still usable.
pub fn validate_refresh_token(
    token: &str,
    config: &JwtSettings,
) -> Result<RefreshClaims, AuthError> {
    decode_with(token, config.refresh_secret.as_bytes(), &config.issuer)
}

fn decode_with<T: DeserializeOwned>(token: &str, secret: &[u8], issuer: &str) -> Result<T, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    validation.leeway = 0;

    decode::<T>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => {
                tracing::debug!("JWT validation error: {}", e);
                AuthError::TokenInvalid
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            access_secret: "test-access-secret-at-least-32-characters".to_string(),
            refresh_secret: "test-refresh-secret-at-least-32-characters".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        }
    }

    #[test]
    fn test_generate_and_validate_token() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let token = generate_access_token(&user_id, "test@example.com", Role::Admin, &config)
            .expect("Failed to generate token");
        let claims = validate_access_token(&token, &config).expect("Failed to validate token");

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.iss, "test");
    }

    #[test]
    fn test_invalid_token() {
        let config = get_test_config();
        assert_eq!(
            validate_access_token("invalid.token.here", &config).unwrap_err(),
            AuthError::TokenInvalid
        );
    }

    #[test]
    fn test_tampered_token() {
        let config = get_test_config();
        let token = generate_access_token(&Uuid::new_v4(), "test@example.com", Role::User, &config)
            .expect("Failed to generate token");

        let tampered = format!("{}X", token);
        assert!(validate_access_token(&tampered, &config).is_err());
    }

    #[test]
    fn test_expired_token() {
        let mut config = get_test_config();
        config.access_token_expiry = -10;
        let token = generate_access_token(&Uuid::new_v4(), "test@example.com", Role::User, &config)
            .expect("Failed to generate token");

        assert_eq!(
            validate_access_token(&token, &config).unwrap_err(),
            AuthError::TokenExpired
        );
    }

    #[test]
    fn test_wrong_issuer() {
        let mut config = get_test_config();
        let token = generate_access_token(&Uuid::new_v4(), "test@example.com", Role::User, &config)
            .expect("Failed to generate token");

        config.issuer = "wrong-issuer".to_string();
        assert!(validate_access_token(&token, &config).is_err());
    }

    #[test]
    fn test_secrets_are_not_interchangeable() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let refresh = generate_refresh_token(&user_id, "test@example.com", Uuid::new_v4(), &config)
            .expect("Failed to generate token");
        let access = generate_access_token(&user_id, "test@example.com", Role::User, &config)
            .expect("Failed to generate token");

        assert!(validate_refresh_token(&refresh, &config).is_ok());
        assert!(validate_access_token(&refresh, &config).is_err());
        assert!(validate_refresh_token(&access, &config).is_err());
    }
}
