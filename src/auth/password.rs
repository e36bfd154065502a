/// Password Hashing and Verification
///
/// bcrypt with a cost factor fixed per deployment (`password.bcrypt_cost`).

use bcrypt::{hash, verify};

use crate::error::AppError;

/// Hash a password using bcrypt
///
/// # Errors
/// Returns error if bcrypt rejects the cost or hashing fails
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// # Errors
/// Returns error if the stored hash is malformed
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4 /* bcrypt minimum cost; bcrypt::MIN_COST is private */;

    #[test]
    fn test_hash_password() {
        let password = "secret12";
        let hash = hash_password(password, TEST_COST).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("secret12", TEST_COST).expect("Failed to hash password");
        assert!(verify_password("secret12", &hash).expect("Failed to verify password"));
    }

    #[test]
    fn test_verify_wrong_password() {
        let hash = hash_password("secret12", TEST_COST).expect("Failed to hash password");
        assert!(!verify_password("secret13", &hash).expect("Failed to verify password"));
    }

    #[test]
    fn test_same_password_different_hashes() {
        let first = hash_password("secret12", TEST_COST).unwrap();
        let second = hash_password("secret12", TEST_COST).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_invalid_cost_rejected() {
        assert!(hash_password("secret12", 2).is_err());
    }

    #[test]
    fn test_malformed_hash() {
        assert!(verify_password("secret12", "not-a-bcrypt-hash").is_err());
    }
}
