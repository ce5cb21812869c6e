//! Authentication and session management

mod types;
pub(crate) mod session;
mod storage;

use log::{debug, info, warn};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{ApiError, ErrorKind, Result};
use crate::fetch::ApiClient;

use session::SessionState;

pub use session::{token_expired, Session};
pub use storage::*;
pub use types::*;

/// Stateless mapping of the auth endpoints
#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
}

impl AuthService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse> {
        self.api
            .post_public("/auth/login", serde_json::to_value(credentials)?)
            .await
    }

    pub async fn register(&self, account: &RegisterRequest) -> Result<AuthResponse> {
        self.api
            .post_public("/auth/register", serde_json::to_value(account)?)
            .await
    }

    /// Invalidate a refresh token server-side
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        self.api
            .post::<serde_json::Value>("/auth/logout", Some(json!({ "refresh": refresh_token })))
            .await
            .map(|_| ())
    }

    /// The user the current access token belongs to
    pub async fn me(&self) -> Result<User> {
        self.api.get("/auth/me", None).await
    }

    pub async fn update_profile(&self, patch: &UpdateProfileRequest) -> Result<User> {
        self.api
            .put("/users/me/profile", serde_json::to_value(patch)?)
            .await
    }
}

/// Process-wide authentication state with its mutators.
///
/// The user snapshot only ever changes through `login`, `register`, `fetch_user`,
/// `update_user` and `logout`. Each mutator applies its result in one step once its
/// network call has completed, so concurrent duplicates leave the state of whichever
/// finished last.
#[derive(Clone)]
pub struct SessionStore {
    api: ApiClient,
    service: AuthService,
}

impl SessionStore {
    pub fn new(api: ApiClient) -> Self {
        let service = AuthService::new(api.clone());
        Self { api, service }
    }

    fn state(&self) -> &Arc<SessionState> {
        self.api.session()
    }

    /// Snapshot of the current session
    pub fn session(&self) -> Session {
        self.state().snapshot()
    }

    pub fn user(&self) -> Option<User> {
        self.session().user
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_authenticated()
    }

    /// Receiver that observes every change of `is_authenticated`
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state().subscribe()
    }

    /// Restore a persisted session at process start.
    ///
    /// Loads the stored tokens, refreshes a known-expired access token once, then
    /// fetches the current user. Unrecoverable sessions are cleared silently.
    pub async fn init(&self) -> Result<Option<User>> {
        let state = self.state();
        let (access, refresh) = state.load_tokens().await;
        if access.is_none() && refresh.is_none() {
            debug!("No persisted session");
            return Ok(None);
        }
        state.restore_tokens(access.clone(), refresh.clone());

        let expired = access.as_deref().map(token_expired).unwrap_or(true);
        if expired {
            if refresh.is_none() {
                info!("Persisted access token expired and no refresh token is stored");
                state.clear_all().await;
                return Ok(None);
            }
            if let Err(e) = self.api.refresh_access_token(access.as_deref()).await {
                if e.kind() == ErrorKind::Network {
                    return Err(e);
                }
                warn!("Could not refresh persisted session: {}", e);
                state.clear_all().await;
                return Ok(None);
            }
        }

        self.fetch_user().await
    }

    /// Sign in and store the user with both tokens.
    ///
    /// On failure the previous state is left untouched.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<User> {
        let response = self.service.login(credentials).await?;
        self.apply_auth_response(response).await
    }

    /// Create an account; success behaves as an implicit login
    pub async fn register(&self, account: &RegisterRequest) -> Result<User> {
        let response = self.service.register(account).await?;
        self.apply_auth_response(response).await
    }

    async fn apply_auth_response(&self, response: AuthResponse) -> Result<User> {
        let tokens = response
            .token_pair()
            .ok_or_else(|| ApiError::decode("auth response carried no tokens"))?;
        let user = response.user;
        self.state().establish(user.clone(), tokens);
        self.state().persist_current().await;
        info!("Signed in as {}", user.username);
        Ok(user)
    }

    /// Sign out. The server-side invalidation is best effort; local state and
    /// persisted tokens are always cleared.
    pub async fn logout(&self) {
        if let Some(refresh) = self.state().refresh_token() {
            if let Err(e) = self.service.logout(&refresh).await {
                debug!("Server-side logout failed, clearing locally: {}", e);
            }
        }
        self.state().clear_all().await;
    }

    /// Refresh the stored user from `/auth/me`.
    ///
    /// Without both tokens (in memory or persisted) no request is made and
    /// `Ok(None)` is returned; a lone access token is discarded. An expired or invalid session is cleared and also
    /// yields `Ok(None)`; transient failures are returned and keep the session.
    pub async fn fetch_user(&self) -> Result<Option<User>> {
        let state = self.state();
        if state.access_token().is_none() {
            let (access, refresh) = state.load_tokens().await;
            if access.is_none() {
                return Ok(None);
            }
            if refresh.is_none() {
                info!("Persisted access token has no refresh token, clearing it");
                state.clear_all().await;
                return Ok(None);
            }
            state.restore_tokens(access, refresh);
        } else if state.refresh_token().is_none() {
            state.clear_all().await;
            return Ok(None);
        }

        let epoch = state.epoch();
        match self.service.me().await {
            Ok(user) => {
                if state.replace_user_if(epoch, user.clone()) {
                    Ok(Some(user))
                } else {
                    debug!("Discarding user fetched for a replaced session");
                    Ok(state.snapshot().user)
                }
            }
            Err(e) if session_rejected(&e) => {
                info!("Stored session is no longer valid: {}", e);
                if state.epoch() == epoch {
                    state.clear_all().await;
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Send a profile update and replace the stored user with the server's copy
    pub async fn update_user(&self, patch: &UpdateProfileRequest) -> Result<User> {
        let state = self.state();
        if state.access_token().is_none() {
            return Err(ApiError::auth(None, "Not logged in"));
        }

        let epoch = state.epoch();
        let user = self.service.update_profile(patch).await?;
        if !state.replace_user_if(epoch, user.clone()) {
            return Err(ApiError::auth(
                None,
                "Session ended before the profile update completed",
            ));
        }
        Ok(user)
    }
}

fn session_rejected(err: &ApiError) -> bool {
    match err {
        ApiError::Auth { .. } => true,
        ApiError::Http { status, .. } => matches!(status, 401 | 403 | 404),
        _ => false,
    }
}
