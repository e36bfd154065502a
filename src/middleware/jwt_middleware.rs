/// JWT Authentication Middleware
///
/// Validates the bearer access token and injects the caller's `Principal`
/// into request extensions for route handlers.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::validate_access_token;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// JWT middleware for protecting routes
pub struct JwtMiddleware {
    jwt_config: JwtSettings,
}

impl JwtMiddleware {
    pub fn new(jwt_config: JwtSettings) -> Self {
        Self { jwt_config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            jwt_config: self.jwt_config.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    jwt_config: JwtSettings,
}

/// Extract the token from `Authorization: Bearer <token>`.
fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn reject<B: 'static>(error: AuthError) -> LocalBoxFuture<'static, Result<ServiceResponse<B>, Error>> {
    let error: Error = AppError::Auth(error).into();
    Box::pin(async move { Err::<ServiceResponse<B>, Error>(error) })
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = match bearer_token(&req) {
            Some(token) => token,
            None => {
                tracing::debug!(path = %req.path(), "Missing or malformed Authorization header");
                return reject(AuthError::MissingToken);
            }
        };

        let principal = match validate_access_token(&token, &self.jwt_config)
            .and_then(|claims| claims.into_principal())
        {
            Ok(principal) => principal,
            Err(e) => {
                tracing::debug!(path = %req.path(), error = %e, "Access token rejected");
                return reject(e);
            }
        };

        tracing::debug!(user_id = %principal.sub, role = %principal.role, "JWT validated successfully");
        req.extensions_mut().insert(principal);

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}
