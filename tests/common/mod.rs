#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;

use reservagym::auth::{hash_password, AuthService, Role};
use reservagym::configuration::{JwtSettings, PasswordSettings};
use reservagym::startup::run;
use reservagym::store::{InMemoryStore, NewUser, UserStore};
use serde_json::{json, Value};

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryStore>,
    pub jwt: JwtSettings,
    pub client: reqwest::Client,
}

pub fn jwt_settings() -> JwtSettings {
    JwtSettings {
        access_secret: "integration-access-secret".to_string(),
        refresh_secret: "integration-refresh-secret".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 3600,
        issuer: "reservagym-tests".to_string(),
    }
}

pub async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let store = Arc::new(InMemoryStore::new());
    let jwt = jwt_settings();
    let auth = AuthService::new(
        store.clone(),
        jwt.clone(),
        &PasswordSettings {
            bcrypt_cost: 4 /* bcrypt minimum cost; bcrypt::MIN_COST is private */,
        },
    )
    .expect("Failed to build auth service");

    let server = run(listener, auth, None).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        jwt,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Sign up and return the response body with the token pair.
    pub async fn signup(&self, email: &str, password: &str) -> Value {
        let response = self
            .post_json("/auth/signup", &json!({ "email": email, "password": password }))
            .await;
        assert_eq!(201, response.status().as_u16());
        response.json().await.expect("Failed to parse response")
    }

    pub async fn access_token_for(&self, email: &str) -> String {
        let body = self.signup(email, "password123").await;
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Admins cannot sign up; seed one straight into the store and log in.
    pub async fn admin_access_token(&self) -> String {
        self.store
            .create_user(NewUser {
                email: "admin@example.com".to_string(),
                password_hash: hash_password("adminpass", 4 /* bcrypt minimum cost; bcrypt::MIN_COST is private */).unwrap(),
                name: None,
                role: Role::Admin,
            })
            .await
            .expect("Failed to seed admin");

        let response = self
            .post_json(
                "/auth/login",
                &json!({ "email": "admin@example.com", "password": "adminpass" }),
            )
            .await;
        assert_eq!(200, response.status().as_u16());
        let body: Value = response.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_string()
    }
}
