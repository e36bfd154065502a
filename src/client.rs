/// HTTP session client for the reservation API.
///
/// Holds the current token pair in memory and attaches the access token to
/// every request. When a request comes back 401 the client refreshes once and
/// retries the request once. Concurrent 401s share a single refresh call.

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::auth::TokenPair;

/// Errors surfaced by `SessionClient`.
///
/// `Clone` so one refresh failure can be handed to every waiting request.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The request never produced a response.
    Transport(String),
    /// The server answered with a non-success status.
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },
    /// The response body did not have the expected shape.
    Decode(String),
    /// The session was cleared or replaced while a refresh was in flight.
    SessionEnded,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Transport(msg) => write!(f, "Transport error: {}", msg),
            ClientError::Status {
                status, message, ..
            } => write!(f, "Server returned {}: {}", status, message),
            ClientError::Decode(msg) => write!(f, "Unexpected response body: {}", msg),
            ClientError::SessionEnded => write!(f, "Session ended during token refresh"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl ClientError {
    /// HTTP status for `Status` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED.as_u16())
    }

    async fn from_response(response: Response) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            code: Option<String>,
            message: Option<String>,
        }

        let status = response.status();
        let body = response.json::<ErrorBody>().await.ok();
        let (code, message) = match body {
            Some(body) => (body.code, body.message),
            None => (None, None),
        };

        ClientError::Status {
            status: status.as_u16(),
            code,
            message: message.unwrap_or_else(|| status.to_string()),
        }
    }
}

type SharedRefresh = Shared<BoxFuture<'static, Result<TokenPair, ClientError>>>;

/// Tokens plus a generation bumped whenever the caller sets or clears
/// them. A refresh only stores its result into the generation it started in.
#[derive(Default)]
struct Session {
    tokens: Option<TokenPair>,
    generation: u64,
}

/// What a request that got a 401 should do next.
enum Recovery {
    /// No tokens held: the 401 stands.
    Unauthenticated,
    /// The access token was replaced after the request was sent.
    Retry,
    /// Await this refresh, started in session `generation`.
    Refresh(SharedRefresh, u64),
}

struct Inner {
    http_client: reqwest::Client,
    base_url: String,
    session: RwLock<Session>,
    /// The refresh currently in flight and the generation it started in.
    /// Cleared by the refresh future itself whichever way it ends.
    refreshing: Mutex<Option<(SharedRefresh, u64)>>,
}

impl Inner {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn tokens(&self) -> Option<TokenPair> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tokens
            .clone()
    }

    /// Replace the tokens and start a new session generation.
    fn start_session(&self, tokens: Option<TokenPair>) {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        session.tokens = tokens;
        session.generation += 1;
    }

    /// Store refreshed tokens unless the session changed since `generation`.
    fn store_refreshed(&self, generation: u64, tokens: TokenPair) -> bool {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        if session.generation != generation {
            return false;
        }
        session.tokens = Some(tokens);
        true
    }

    /// Clear the tokens unless the session changed since `generation`.
    fn end_session(&self, generation: u64) {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        if session.generation == generation {
            session.tokens = None;
            session.generation += 1;
        }
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        access_token: Option<&str>,
    ) -> Result<Response, ClientError> {
        let mut request = self.http_client.request(method, self.url(path));
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await.map_err(|e| {
            tracing::error!("Request to {} failed: {}", path, e);
            ClientError::from(e)
        })
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenPair, ClientError> {
        let body = json!({ "refresh_token": refresh_token });
        let response = self
            .dispatch(Method::POST, "/auth/refresh", Some(&body), None)
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::from_response(response).await);
        }

        Ok(response.json::<TokenPair>().await?)
    }

    /// Best-effort server-side revocation.
    async fn revoke(&self, refresh_token: Option<&str>) {
        let body = json!({ "refresh_token": refresh_token });
        if let Err(e) = self
            .dispatch(Method::POST, "/auth/logout", Some(&body), None)
            .await
        {
            tracing::warn!("Logout request failed: {}", e);
        }
    }
}

/// Token-holding API client. Cheap to clone; clones share tokens and the
/// in-flight refresh.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

impl SessionClient {
    pub fn new(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(Inner {
                http_client,
                base_url: base_url.into(),
                session: RwLock::new(Session::default()),
                refreshing: Mutex::new(None),
            }),
        }
    }

    pub fn tokens(&self) -> Option<TokenPair> {
        self.inner.tokens()
    }

    /// Start a session with `tokens`. A refresh still in flight from the
    /// previous session will not overwrite them.
    pub fn set_tokens(&self, tokens: TokenPair) {
        self.inner.start_session(Some(tokens));
    }

    pub fn clear_tokens(&self) {
        self.inner.start_session(None);
    }

    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<TokenPair, ClientError> {
        let body = json!({ "email": email, "password": password, "name": name });
        self.authenticate("/auth/signup", body).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, ClientError> {
        let body = json!({ "email": email, "password": password });
        self.authenticate("/auth/login", body).await
    }

    /// Revoke the refresh token server-side and drop local state. Local
    /// tokens are cleared even if the server cannot be reached. A refresh
    /// in flight at this point revokes its own result instead of storing it.
    pub async fn logout(&self) {
        let refresh_token = self.tokens().map(|tokens| tokens.refresh_token);
        self.clear_tokens();
        self.inner.revoke(refresh_token.as_deref()).await;
    }

    pub async fn me<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        self.send(Method::GET, "/auth/me", None).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, ClientError> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn patch<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, ClientError> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(Method::DELETE, path, None).await
    }

    /// Send an authenticated request and decode a JSON response.
    ///
    /// On 401 the request is retried at most once, after the shared refresh
    /// (or directly, if another request already replaced the access token).
    /// A failed refresh clears the stored tokens.
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let used_access = self.tokens().map(|tokens| tokens.access_token);
        let response = self
            .inner
            .dispatch(method.clone(), path, body.as_ref(), used_access.as_deref())
            .await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            self.recover_unauthorized(response, used_access).await?;
            let access = self.tokens().map(|tokens| tokens.access_token);
            self.inner
                .dispatch(method, path, body.as_ref(), access.as_deref())
                .await?
        } else {
            response
        };

        if !response.status().is_success() {
            return Err(ClientError::from_response(response).await);
        }

        Ok(response.json::<T>().await?)
    }

    /// Make the stored tokens usable again after a 401, or fail.
    async fn recover_unauthorized(
        &self,
        response: Response,
        used_access: Option<String>,
    ) -> Result<(), ClientError> {
        let (refresh, generation) = match self.plan_recovery(used_access.as_deref()) {
            Recovery::Unauthenticated => return Err(ClientError::from_response(response).await),
            Recovery::Retry => {
                tracing::debug!("Access token replaced while the request was in flight");
                return Ok(());
            }
            Recovery::Refresh(refresh, generation) => (refresh, generation),
        };

        match refresh.await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.inner.end_session(generation);
                Err(e)
            }
        }
    }

    /// Decide under the slot lock, so a refresh that completes concurrently
    /// is either joined or already visible in the stored tokens.
    fn plan_recovery(&self, used_access: Option<&str>) -> Recovery {
        let mut slot = self
            .inner
            .refreshing
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let (current, generation) = {
            let session = self.inner.session.read().unwrap_or_else(PoisonError::into_inner);
            (session.tokens.clone(), session.generation)
        };
        let current = match current {
            Some(tokens) => tokens,
            None => return Recovery::Unauthenticated,
        };

        match slot.as_ref() {
            Some((in_flight, started_in)) if *started_in == generation => {
                return Recovery::Refresh(in_flight.clone(), generation);
            }
            // The caller replaced the tokens after that refresh started.
            Some(_) => return Recovery::Retry,
            None => {}
        }

        if used_access != Some(current.access_token.as_str()) {
            return Recovery::Retry;
        }

        let refresh = self.start_refresh(current.refresh_token, generation);
        *slot = Some((refresh.clone(), generation));
        Recovery::Refresh(refresh, generation)
    }

    fn start_refresh(&self, refresh_token: String, generation: u64) -> SharedRefresh {
        let inner = Arc::clone(&self.inner);
        async move {
            let result = match inner.exchange_refresh_token(&refresh_token).await {
                Ok(tokens) => {
                    if inner.store_refreshed(generation, tokens.clone()) {
                        Ok(tokens)
                    } else {
                        tracing::info!("Session ended during refresh, revoking the new token");
                        inner.revoke(Some(&tokens.refresh_token)).await;
                        Err(ClientError::SessionEnded)
                    }
                }
                Err(e) => {
                    tracing::warn!("Token refresh failed: {}", e);
                    Err(e)
                }
            };
            *inner
                .refreshing
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = None;
            result
        }
        .boxed()
        .shared()
    }

    async fn authenticate(&self, path: &str, body: Value) -> Result<TokenPair, ClientError> {
        let response = self
            .inner
            .dispatch(Method::POST, path, Some(&body), None)
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::from_response(response).await);
        }

        let tokens = response.json::<TokenPair>().await?;
        self.set_tokens(tokens.clone());
        Ok(tokens)
    }
}
