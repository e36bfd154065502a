//! Store tests against a live Postgres. Run with `--ignored` once the
//! database from `configuration.yaml` is reachable.

use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use reservagym::auth::refresh_token::NewRefreshToken;
use reservagym::auth::{validate_refresh_token, AuthService, Role};
use reservagym::configuration::{get_configuration, DatabaseSettings, JwtSettings, PasswordSettings};
use reservagym::error::{AppError, AuthError, ValidationError};
use reservagym::store::{NewUser, PgStore, RefreshTokenStore, UserStore};

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

async fn spawn_pool() -> PgPool {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = Uuid::new_v4().to_string();
    configure_database(&configuration.database).await
}

async fn spawn_store() -> PgStore {
    PgStore::new(spawn_pool().await)
}

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        password_hash: "$2b$04$hash".to_string(),
        name: None,
        role: Role::User,
    }
}

#[tokio::test]
#[ignore]
async fn duplicate_email_is_already_exists() {
    let store = spawn_store().await;
    store.create_user(new_user("dup@example.com")).await.unwrap();

    let err = store.create_user(new_user("dup@example.com")).await.unwrap_err();

    assert!(matches!(
        err,
        AppError::Validation(ValidationError::AlreadyExists(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn concurrent_rotations_have_one_winner() {
    let store = Arc::new(spawn_store().await);
    let user = store.create_user(new_user("race@example.com")).await.unwrap();

    let current = Uuid::new_v4();
    store
        .insert_refresh_token(NewRefreshToken::new(current, user.id, "raw-current", 3600))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        let user_id = user.id;
        handles.push(tokio::spawn(async move {
            let next = NewRefreshToken::new(Uuid::new_v4(), user_id, &format!("raw-{}", i), 3600);
            store.rotate_refresh_token(current, next).await.unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(1, winners);

    let record = store.find_refresh_token(current).await.unwrap().unwrap();
    assert!(record.revoked);
    let successor = record.replaced_by.expect("winner links its successor");
    assert!(store.find_refresh_token(successor).await.unwrap().is_some());
}

#[tokio::test]
#[ignore]
async fn revoke_is_idempotent() {
    let store = spawn_store().await;
    let user = store.create_user(new_user("revoke@example.com")).await.unwrap();
    let jti = Uuid::new_v4();
    store
        .insert_refresh_token(NewRefreshToken::new(jti, user.id, "raw", 3600))
        .await
        .unwrap();

    assert!(store.revoke_refresh_token(jti).await.unwrap());
    assert!(!store.revoke_refresh_token(jti).await.unwrap());
    assert!(!store.revoke_refresh_token(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn deleting_a_user_keeps_refresh_records() {
    let pool = spawn_pool().await;
    let jwt = JwtSettings {
        access_secret: "pg-access-secret".to_string(),
        refresh_secret: "pg-refresh-secret".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 3600,
        issuer: "reservagym-tests".to_string(),
    };
    let auth = AuthService::new(
        Arc::new(PgStore::new(pool.clone())),
        jwt.clone(),
        &PasswordSettings {
            bcrypt_cost: 4 /* bcrypt minimum cost; bcrypt::MIN_COST is private */,
        },
    )
    .unwrap();

    let tokens = auth.signup("gone@example.com", "password123", None).await.unwrap();
    let jti = validate_refresh_token(&tokens.refresh_token, &jwt)
        .unwrap()
        .jti()
        .unwrap();

    sqlx::query("DELETE FROM users WHERE email = $1")
        .bind("gone@example.com")
        .execute(&pool)
        .await
        .expect("Failed to delete user");

    let store = PgStore::new(pool);
    assert!(store.find_refresh_token(jti).await.unwrap().is_some());

    let err = auth.refresh(&tokens.refresh_token).await.unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::UserNotFound)));
}
