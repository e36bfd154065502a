/// Authentication Routes
///
/// Signup, login, token refresh, logout and current identity. Token
/// lifecycle rules live in `AuthService`; handlers only translate HTTP.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthService, Principal, TokenPair};
use crate::error::{AppError, ErrorContext};

/// User registration request
#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Logout request. A missing token is accepted; there is nothing to revoke.
#[derive(Deserialize, Default)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Authentication response with access and refresh tokens
#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl AuthResponse {
    fn new(tokens: TokenPair, expires_in: i64) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

#[derive(Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// POST /auth/signup
///
/// # Errors
/// - 400: invalid email, password or name
/// - 409: email already registered
pub async fn signup(
    form: web::Json<SignupRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_signup");
    let form = form.into_inner();

    let tokens = auth
        .signup(&form.email, &form.password, form.name.as_deref())
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    tracing::info!(request_id = %context.request_id, "Signup completed");

    Ok(HttpResponse::Created().json(AuthResponse::new(
        tokens,
        auth.jwt_settings().access_token_expiry,
    )))
}

/// POST /auth/login
///
/// Unknown email and wrong password produce the same 401 body.
pub async fn login(
    form: web::Json<LoginRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let tokens = auth.login(&form.email, &form.password).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    tracing::info!(request_id = %context.request_id, "Login completed");

    Ok(HttpResponse::Ok().json(AuthResponse::new(
        tokens,
        auth.jwt_settings().access_token_expiry,
    )))
}

/// POST /auth/refresh
///
/// Rotates the refresh token: the presented token is revoked and can never
/// be exchanged again.
///
/// # Errors
/// - 401: invalid, expired, revoked or already rotated token
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let tokens = auth.refresh(&form.refresh_token).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    tracing::info!(request_id = %context.request_id, "Token refreshed successfully");

    Ok(HttpResponse::Ok().json(AuthResponse::new(
        tokens,
        auth.jwt_settings().access_token_expiry,
    )))
}

/// POST /auth/logout
///
/// Always answers `{ "ok": true }`, even for a malformed body.
pub async fn logout(
    form: Option<web::Json<LogoutRequest>>,
    auth: web::Data<AuthService>,
) -> HttpResponse {
    let form = form.map(web::Json::into_inner).unwrap_or_default();

    match form.refresh_token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => auth.logout(token).await,
        _ => tracing::debug!("Logout without refresh token"),
    }

    HttpResponse::Ok().json(OkResponse { ok: true })
}

/// GET /auth/me
///
/// **Requires valid JWT access token**; the principal is injected by
/// `JwtMiddleware`.
pub async fn me(principal: web::ReqData<Principal>) -> HttpResponse {
    HttpResponse::Ok().json(principal.into_inner())
}
