//! Session state shared by the session store and the HTTP client adapter

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::{info, warn};
use serde::Deserialize;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

use super::storage::TokenStorage;
use super::types::{TokenPair, User};
use crate::config::ClientOptions;

/// Snapshot of the client-side session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    /// The signed-in user, present only together with both tokens
    pub user: Option<User>,

    /// The access token
    pub access_token: Option<String>,

    /// The refresh token
    pub refresh_token: Option<String>,
}

impl Session {
    /// Derived from the stored state, never tracked separately
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.access_token.is_some() && self.refresh_token.is_some()
    }
}

#[derive(Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

/// Check whether a JWT access token has a past `exp` claim.
///
/// The signature is not verified; opaque tokens are never considered expired.
pub fn token_expired(token: &str) -> bool {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    match decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => match data.claims.exp {
            Some(exp) => exp <= now_secs(),
            None => false,
        },
        Err(_) => false,
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs() as i64
}

struct Guarded {
    session: Session,
    // Bumped whenever the session is replaced or cleared
    epoch: u64,
}

/// Process-wide session state.
///
/// All writes happen under one lock without crossing an await point; persistence
/// re-reads the current state so storage converges on the last completed write.
pub(crate) struct SessionState {
    inner: RwLock<Guarded>,
    storage: Arc<dyn TokenStorage>,
    persist: bool,
    access_key: String,
    refresh_key: String,
    persist_lock: tokio::sync::Mutex<()>,
    pub(crate) refresh_lock: tokio::sync::Mutex<()>,
    auth_tx: watch::Sender<bool>,
}

impl SessionState {
    pub(crate) fn new(storage: Arc<dyn TokenStorage>, options: &ClientOptions) -> Self {
        let (auth_tx, _) = watch::channel(false);
        Self {
            inner: RwLock::new(Guarded {
                session: Session::default(),
                epoch: 0,
            }),
            storage,
            persist: options.persist_session,
            access_key: options.access_token_key.clone(),
            refresh_key: options.refresh_token_key.clone(),
            persist_lock: tokio::sync::Mutex::new(()),
            refresh_lock: tokio::sync::Mutex::new(()),
            auth_tx,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Guarded> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Guarded> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn snapshot(&self) -> Session {
        self.read().session.clone()
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.read().epoch
    }

    pub(crate) fn access_token(&self) -> Option<String> {
        self.read().session.access_token.clone()
    }

    /// Access token together with the epoch it belongs to
    pub(crate) fn access_token_at(&self) -> (Option<String>, u64) {
        let guard = self.read();
        (guard.session.access_token.clone(), guard.epoch)
    }

    pub(crate) fn refresh_token(&self) -> Option<String> {
        self.read().session.refresh_token.clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.auth_tx.subscribe()
    }

    fn publish(&self, authenticated: bool) {
        self.auth_tx.send_if_modified(|current| {
            if *current != authenticated {
                *current = authenticated;
                true
            } else {
                false
            }
        });
    }

    /// Replace user and tokens in one step
    pub(crate) fn establish(&self, user: User, tokens: TokenPair) {
        let authenticated = {
            let mut guard = self.write();
            guard.session = Session {
                user: Some(user),
                access_token: Some(tokens.access),
                refresh_token: Some(tokens.refresh),
            };
            guard.epoch += 1;
            guard.session.is_authenticated()
        };
        info!("Session established");
        self.publish(authenticated);
    }

    /// Replace the user if the session was not replaced or cleared since `epoch`
    pub(crate) fn replace_user_if(&self, epoch: u64, user: User) -> bool {
        let authenticated = {
            let mut guard = self.write();
            if guard.epoch != epoch
                || guard.session.access_token.is_none()
                || guard.session.refresh_token.is_none()
            {
                return false;
            }
            guard.session.user = Some(user);
            guard.session.is_authenticated()
        };
        self.publish(authenticated);
        true
    }

    /// Load persisted tokens into an empty session
    pub(crate) fn restore_tokens(&self, access: Option<String>, refresh: Option<String>) {
        let mut guard = self.write();
        guard.session.access_token = access;
        guard.session.refresh_token = refresh;
        guard.epoch += 1;
    }

    /// Install a refreshed access token if `used_refresh` is still the stored refresh
    /// token, rotating it when the server issued a new one
    pub(crate) fn rotate_tokens(
        &self,
        used_refresh: &str,
        access: String,
        refresh: Option<String>,
    ) -> bool {
        let mut guard = self.write();
        if guard.session.refresh_token.as_deref() != Some(used_refresh) {
            return false;
        }
        guard.session.access_token = Some(access);
        if let Some(refresh) = refresh {
            guard.session.refresh_token = Some(refresh);
        }
        true
    }

    /// Drop user and tokens from memory
    pub(crate) fn clear(&self) {
        {
            let mut guard = self.write();
            guard.session = Session::default();
            guard.epoch += 1;
        }
        info!("Session cleared");
        self.publish(false);
    }

    /// Read persisted tokens
    pub(crate) async fn load_tokens(&self) -> (Option<String>, Option<String>) {
        let access = self.load(&self.access_key).await;
        let refresh = self.load(&self.refresh_key).await;
        (access, refresh)
    }

    async fn load(&self, key: &str) -> Option<String> {
        match self.storage.get(key).await {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!("Failed to read {} from token storage: {}", key, e);
                None
            }
        }
    }

    /// Write the current in-memory tokens to storage
    pub(crate) async fn persist_current(&self) {
        if self.persist {
            self.write_snapshot().await;
        }
    }

    async fn write_snapshot(&self) {
        let _guard = self.persist_lock.lock().await;
        let session = self.snapshot();
        self.store(&self.access_key, session.access_token.as_deref())
            .await;
        self.store(&self.refresh_key, session.refresh_token.as_deref())
            .await;
    }

    async fn store(&self, key: &str, value: Option<&str>) {
        let result = match value {
            Some(value) => self.storage.set(key, value).await,
            None => self.storage.remove(key).await,
        };
        if let Err(e) = result {
            warn!("Failed to update {} in token storage: {}", key, e);
        }
    }

    /// Remove both tokens from storage regardless of the in-memory state
    pub(crate) async fn erase_persisted(&self) {
        let _guard = self.persist_lock.lock().await;
        self.store(&self.access_key, None).await;
        self.store(&self.refresh_key, None).await;
    }

    /// Clear memory and storage
    pub(crate) async fn clear_all(&self) {
        self.clear();
        self.erase_persisted().await;
    }

    /// Clear memory and storage only if the session is still the one seen at
    /// `epoch`. Storage is rewritten from memory so a session established in the
    /// meantime keeps its persisted tokens.
    pub(crate) async fn clear_all_if(&self, epoch: u64) -> bool {
        {
            let mut guard = self.write();
            if guard.epoch != epoch {
                return false;
            }
            guard.session = Session::default();
            guard.epoch += 1;
        }
        info!("Session cleared");
        self.publish(false);
        self.write_snapshot().await;
        true
    }
}
