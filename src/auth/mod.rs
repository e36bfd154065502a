/// Authentication module
///
/// JWT generation/validation, password hashing, refresh token records,
/// and the token lifecycle service built on them.

mod claims;
mod jwt;
mod password;
pub mod principal;
pub mod refresh_token;
pub mod service;

pub use claims::{AccessClaims, RefreshClaims};
pub use jwt::{
    generate_access_token, generate_refresh_token, validate_access_token, validate_refresh_token,
};
pub use password::{hash_password, verify_password};
pub use principal::{can_list_all, Principal, Role};
pub use service::{AuthService, TokenPair};
