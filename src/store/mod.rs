/// Persistence layer.
///
/// The service layer talks to storage through these traits so the same
/// token lifecycle runs against Postgres in production and an in-memory
/// store in tests and local runs.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::principal::Role;
use crate::auth::refresh_token::{NewRefreshToken, RefreshTokenRecord};
use crate::error::AppError;
use crate::reservas::{NewReserva, Reserva, ReservaChanges};

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub role: Role,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `ValidationError::AlreadyExists("email")` on a duplicate email.
    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert_refresh_token(&self, token: NewRefreshToken) -> Result<(), AppError>;
    async fn find_refresh_token(&self, jti: Uuid) -> Result<Option<RefreshTokenRecord>, AppError>;
    /// Revoke `current` (linking it to `next`) and insert `next`, as one
    /// atomic unit, iff `current` is still unrevoked.
    ///
    /// Returns `false` without writing anything when `current` was already
    /// revoked, i.e. another rotation won.
    async fn rotate_refresh_token(
        &self,
        current: Uuid,
        next: NewRefreshToken,
    ) -> Result<bool, AppError>;
    /// Returns whether a record was revoked by this call.
    async fn revoke_refresh_token(&self, jti: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait ReservaStore: Send + Sync {
    async fn create_reserva(&self, new_reserva: NewReserva) -> Result<Reserva, AppError>;
    /// Newest first.
    async fn list_reservas_for_user(
        &self,
        user_id: Uuid,
        skip: i64,
        take: i64,
    ) -> Result<Vec<Reserva>, AppError>;
    async fn list_all_reservas(&self, skip: i64, take: i64) -> Result<Vec<Reserva>, AppError>;
    async fn find_reserva(&self, user_id: Uuid, id: Uuid) -> Result<Option<Reserva>, AppError>;
    async fn update_reserva(
        &self,
        user_id: Uuid,
        id: Uuid,
        changes: ReservaChanges,
    ) -> Result<Option<Reserva>, AppError>;
    async fn delete_reserva(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError>;
}

/// Everything the application needs from storage.
pub trait Store: UserStore + RefreshTokenStore + ReservaStore {}

impl<T> Store for T where T: UserStore + RefreshTokenStore + ReservaStore {}
