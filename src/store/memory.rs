use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::auth::refresh_token::{NewRefreshToken, RefreshTokenRecord};
use crate::error::{AppError, DatabaseError, ValidationError};
use crate::reservas::{NewReserva, Reserva, ReservaChanges};
use crate::store::{NewUser, RefreshTokenStore, ReservaStore, User, UserStore};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    refresh_tokens: HashMap<Uuid, RefreshTokenRecord>,
    reservas: HashMap<Uuid, Reserva>,
}

/// Process-local store. Every operation runs under one lock, so a rotation
/// is trivially atomic.
pub struct InMemoryStore {
    state: Mutex<State>,
    available: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: while unavailable every call fails like a dropped
    /// connection pool would.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of refresh-token records ever persisted.
    pub fn refresh_token_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.refresh_tokens.len())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, AppError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(AppError::Database(DatabaseError::ConnectionPool(
                "in-memory store unavailable".to_string(),
            )));
        }
        self.state
            .lock()
            .map_err(|_| AppError::Internal("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let mut state = self.lock()?;
        if state.users.values().any(|u| u.email == new_user.email) {
            return Err(ValidationError::AlreadyExists("email".to_string()).into());
        }

        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            name: new_user.name,
            role: new_user.role,
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let state = self.lock()?;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let state = self.lock()?;
        Ok(state.users.get(&id).cloned())
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryStore {
    async fn insert_refresh_token(&self, token: NewRefreshToken) -> Result<(), AppError> {
        let mut state = self.lock()?;
        if state.refresh_tokens.contains_key(&token.id) {
            return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                "refresh token id".to_string(),
            )));
        }
        state
            .refresh_tokens
            .insert(token.id, token.into_record(Utc::now()));
        Ok(())
    }

    async fn find_refresh_token(&self, jti: Uuid) -> Result<Option<RefreshTokenRecord>, AppError> {
        let state = self.lock()?;
        Ok(state.refresh_tokens.get(&jti).cloned())
    }

    async fn rotate_refresh_token(
        &self,
        current: Uuid,
        next: NewRefreshToken,
    ) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        let now = Utc::now();

        match state.refresh_tokens.get_mut(&current) {
            Some(record) if !record.revoked => {
                record.revoked = true;
                record.revoked_at = Some(now);
                record.replaced_by = Some(next.id);
            }
            _ => return Ok(false),
        }

        state.refresh_tokens.insert(next.id, next.into_record(now));
        Ok(true)
    }

    async fn revoke_refresh_token(&self, jti: Uuid) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        match state.refresh_tokens.get_mut(&jti) {
            Some(record) if !record.revoked => {
                record.revoked = true;
                record.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn page(mut reservas: Vec<Reserva>, skip: i64, take: i64) -> Vec<Reserva> {
    reservas.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    reservas
        .into_iter()
        .skip(skip.max(0) as usize)
        .take(take.max(0) as usize)
        .collect()
}

#[async_trait]
impl ReservaStore for InMemoryStore {
    async fn create_reserva(&self, new_reserva: NewReserva) -> Result<Reserva, AppError> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let reserva = Reserva {
            id: Uuid::new_v4(),
            user_id: new_reserva.user_id,
            holder_name: new_reserva.holder_name,
            description: new_reserva.description,
            status: new_reserva.status,
            due_date: new_reserva.due_date,
            created_at: now,
            updated_at: now,
        };
        state.reservas.insert(reserva.id, reserva.clone());
        Ok(reserva)
    }

    async fn list_reservas_for_user(
        &self,
        user_id: Uuid,
        skip: i64,
        take: i64,
    ) -> Result<Vec<Reserva>, AppError> {
        let state = self.lock()?;
        let owned = state
            .reservas
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        Ok(page(owned, skip, take))
    }

    async fn list_all_reservas(&self, skip: i64, take: i64) -> Result<Vec<Reserva>, AppError> {
        let state = self.lock()?;
        Ok(page(state.reservas.values().cloned().collect(), skip, take))
    }

    async fn find_reserva(&self, user_id: Uuid, id: Uuid) -> Result<Option<Reserva>, AppError> {
        let state = self.lock()?;
        Ok(state
            .reservas
            .get(&id)
            .filter(|r| r.user_id == user_id)
            .cloned())
    }

    async fn update_reserva(
        &self,
        user_id: Uuid,
        id: Uuid,
        changes: ReservaChanges,
    ) -> Result<Option<Reserva>, AppError> {
        let mut state = self.lock()?;
        match state.reservas.get_mut(&id) {
            Some(reserva) if reserva.user_id == user_id => {
                changes.apply(reserva, Utc::now());
                Ok(Some(reserva.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_reserva(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        let owned = state
            .reservas
            .get(&id)
            .map_or(false, |r| r.user_id == user_id);
        if owned {
            state.reservas.remove(&id);
        }
        Ok(owned)
    }
}
