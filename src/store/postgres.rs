use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::refresh_token::{NewRefreshToken, RefreshTokenRecord};
use crate::error::{AppError, DatabaseError, ValidationError};
use crate::reservas::{NewReserva, Reserva, ReservaChanges};
use crate::store::{NewUser, RefreshTokenStore, ReservaStore, User, UserStore};

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    name: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            name: row.name,
            role: row.role.parse()?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReservaRow {
    id: Uuid,
    user_id: Uuid,
    holder_name: String,
    description: Option<String>,
    status: String,
    due_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReservaRow> for Reserva {
    type Error = AppError;

    fn try_from(row: ReservaRow) -> Result<Self, Self::Error> {
        Ok(Reserva {
            id: row.id,
            user_id: row.user_id,
            holder_name: row.holder_name,
            description: row.description,
            status: row.status.parse()?,
            due_date: row.due_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, name, role, created_at";
const RESERVA_COLUMNS: &str =
    "id, user_id, holder_name, description, status, due_date, created_at, updated_at";

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, name, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.name)
        .bind(new_user.role.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                AppError::Validation(ValidationError::AlreadyExists("email".to_string()))
            }
            other => other,
        })?;

        row.try_into()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn insert_refresh_token(&self, token: NewRefreshToken) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, revoked, created_at)
            VALUES ($1, $2, $3, $4, false, $5)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_refresh_token(&self, jti: Uuid) -> Result<Option<RefreshTokenRecord>, AppError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            SELECT id, user_id, token_hash, expires_at, revoked, replaced_by, created_at, revoked_at
            FROM refresh_tokens
            WHERE id = $1
            "#,
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn rotate_refresh_token(
        &self,
        current: Uuid,
        next: NewRefreshToken,
    ) -> Result<bool, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // The successor row must exist before the old row can reference it.
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, revoked, created_at)
            VALUES ($1, $2, $3, $4, false, $5)
            "#,
        )
        .bind(next.id)
        .bind(next.user_id)
        .bind(&next.token_hash)
        .bind(next.expires_at)
        .bind(now)
        .execute(&mut tx)
        .await?;

        // Row lock on `current`: a concurrent rotation blocks here and then
        // sees revoked = true, matching zero rows.
        let revoked = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = true, revoked_at = $1, replaced_by = $2
            WHERE id = $3 AND revoked = false
            "#,
        )
        .bind(now)
        .bind(next.id)
        .bind(current)
        .execute(&mut tx)
        .await?
        .rows_affected();

        if revoked == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn revoke_refresh_token(&self, jti: Uuid) -> Result<bool, AppError> {
        let revoked = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = true, revoked_at = $1
            WHERE id = $2 AND revoked = false
            "#,
        )
        .bind(Utc::now())
        .bind(jti)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(revoked > 0)
    }
}

#[async_trait]
impl ReservaStore for PgStore {
    async fn create_reserva(&self, new_reserva: NewReserva) -> Result<Reserva, AppError> {
        let now = Utc::now();
        sqlx::query_as::<_, ReservaRow>(&format!(
            r#"
            INSERT INTO reservas (id, user_id, holder_name, description, status, due_date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {}
            "#,
            RESERVA_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new_reserva.user_id)
        .bind(&new_reserva.holder_name)
        .bind(&new_reserva.description)
        .bind(new_reserva.status.as_str())
        .bind(new_reserva.due_date)
        .bind(now)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn list_reservas_for_user(
        &self,
        user_id: Uuid,
        skip: i64,
        take: i64,
    ) -> Result<Vec<Reserva>, AppError> {
        sqlx::query_as::<_, ReservaRow>(&format!(
            r#"
            SELECT {} FROM reservas
            WHERE user_id = $1
            ORDER BY created_at DESC
            OFFSET $2 LIMIT $3
            "#,
            RESERVA_COLUMNS
        ))
        .bind(user_id)
        .bind(skip)
        .bind(take)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Reserva::try_from)
        .collect()
    }

    async fn list_all_reservas(&self, skip: i64, take: i64) -> Result<Vec<Reserva>, AppError> {
        sqlx::query_as::<_, ReservaRow>(&format!(
            "SELECT {} FROM reservas ORDER BY created_at DESC OFFSET $1 LIMIT $2",
            RESERVA_COLUMNS
        ))
        .bind(skip)
        .bind(take)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Reserva::try_from)
        .collect()
    }

    async fn find_reserva(&self, user_id: Uuid, id: Uuid) -> Result<Option<Reserva>, AppError> {
        sqlx::query_as::<_, ReservaRow>(&format!(
            "SELECT {} FROM reservas WHERE id = $1 AND user_id = $2",
            RESERVA_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Reserva::try_from)
        .transpose()
    }

    async fn update_reserva(
        &self,
        user_id: Uuid,
        id: Uuid,
        changes: ReservaChanges,
    ) -> Result<Option<Reserva>, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ReservaRow>(&format!(
            "SELECT {} FROM reservas WHERE id = $1 AND user_id = $2 FOR UPDATE",
            RESERVA_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut tx)
        .await?;

        let mut reserva = match row {
            Some(row) => Reserva::try_from(row)?,
            None => return Ok(None),
        };
        changes.apply(&mut reserva, Utc::now());

        sqlx::query(
            r#"
            UPDATE reservas
            SET holder_name = $1, description = $2, status = $3, due_date = $4, updated_at = $5
            WHERE id = $6
            "#,
        )
        .bind(&reserva.holder_name)
        .bind(&reserva.description)
        .bind(reserva.status.as_str())
        .bind(reserva.due_date)
        .bind(reserva.updated_at)
        .bind(reserva.id)
        .execute(&mut tx)
        .await?;

        tx.commit().await?;
        Ok(Some(reserva))
    }

    async fn delete_reserva(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let deleted = sqlx::query("DELETE FROM reservas WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }
}
