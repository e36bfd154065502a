/// Reserva Routes
///
/// Owner-scoped CRUD plus the admin listing. Every handler runs behind
/// `JwtMiddleware`, so a `Principal` is always present.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{can_list_all, AuthService, Principal};
use crate::error::{AppError, AuthError, ErrorContext};
use crate::reservas::{CreateReservaRequest, UpdateReservaRequest};
use crate::routes::auth::OkResponse;
use crate::validators::page_bounds;

#[derive(Deserialize)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub take: Option<i64>,
}

fn not_found() -> AppError {
    AppError::NotFound("reserva".to_string())
}

/// POST /reservas
pub async fn create_reserva(
    form: web::Json<CreateReservaRequest>,
    principal: web::ReqData<Principal>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("reserva_create").with_user_id(principal.sub.to_string());

    let new_reserva = form.into_inner().validate(principal.sub)?;
    let reserva = auth.store().create_reserva(new_reserva).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %principal.sub,
        reserva_id = %reserva.id,
        "Reserva created"
    );

    Ok(HttpResponse::Created().json(reserva))
}

/// GET /reservas?skip=&take=
pub async fn list_reservas(
    query: web::Query<PageQuery>,
    principal: web::ReqData<Principal>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let (skip, take) = page_bounds(query.skip, query.take);
    let reservas = auth
        .store()
        .list_reservas_for_user(principal.sub, skip, take)
        .await?;

    Ok(HttpResponse::Ok().json(reservas))
}

/// GET /reservas/admin/all?skip=&take=
///
/// # Errors
/// - 403: the caller lacks the capability to list every reserva
pub async fn list_all_reservas(
    query: web::Query<PageQuery>,
    principal: web::ReqData<Principal>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    if !can_list_all(&principal) {
        tracing::warn!(user_id = %principal.sub, role = %principal.role, "Admin listing refused");
        return Err(AuthError::Forbidden.into());
    }

    let (skip, take) = page_bounds(query.skip, query.take);
    let reservas = auth.store().list_all_reservas(skip, take).await?;

    Ok(HttpResponse::Ok().json(reservas))
}

/// GET /reservas/{id}
pub async fn get_reserva(
    path: web::Path<Uuid>,
    principal: web::ReqData<Principal>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let reserva = auth
        .store()
        .find_reserva(principal.sub, path.into_inner())
        .await?
        .ok_or_else(not_found)?;

    Ok(HttpResponse::Ok().json(reserva))
}

/// PATCH /reservas/{id}
///
/// Partial update. A `null` field clears it, an absent field is left alone.
pub async fn update_reserva(
    path: web::Path<Uuid>,
    form: web::Json<UpdateReservaRequest>,
    principal: web::ReqData<Principal>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let changes = form.into_inner().validate()?;

    let reserva = auth
        .store()
        .update_reserva(principal.sub, id, changes)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(user_id = %principal.sub, reserva_id = %id, "Reserva updated");
    Ok(HttpResponse::Ok().json(reserva))
}

/// DELETE /reservas/{id}
pub async fn delete_reserva(
    path: web::Path<Uuid>,
    principal: web::ReqData<Principal>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    if !auth.store().delete_reserva(principal.sub, id).await? {
        return Err(not_found());
    }

    tracing::info!(user_id = %principal.sub, reserva_id = %id, "Reserva deleted");
    Ok(HttpResponse::Ok().json(OkResponse { ok: true }))
}
