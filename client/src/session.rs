//! Session state ownership
//!
//! `SessionStore` is the single owner of credentials, the signed-in user,
//! and the inactivity deadline. Every other part of the client reads through
//! it; nothing else holds tokens. Mutations also republish the session
//! phase on a watch channel so the real-time bridge can follow along
//! without being wired to the auth flow directly.

use crate::models::{UiPreferences, User};
use crate::persist::{self, PersistedState, STATE_KEY};
use crate::throttle::{LoginThrottle, ThrottleConfig};
use chrono::{DateTime, Duration, Utc};
use common::storage::FileStore;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tracing::{debug, error, info, warn};

/// Broadcast view of the session lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    /// No usable credentials
    Anonymous,
    /// Signed in with the given access token
    Authenticated { access_token: String },
}

/// Access and refresh token issued together by the backend
///
/// Credentials only ever move through the store as a pair, so a session can
/// never hold one token without the other.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Everything the session owns, in one place
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
    /// Instant the session dies unless activity extends it
    pub session_expiry: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub throttle: LoginThrottle,
    pub preferences: UiPreferences,
    /// Transient UI flag, never persisted
    pub is_loading: bool,
    /// Transient UI message, never persisted
    pub error: Option<String>,
}

/// Shared, cloneable handle to the session state
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<SessionState>>,
    phase_tx: Arc<watch::Sender<SessionPhase>>,
    session_timeout: Duration,
    throttle_config: ThrottleConfig,
    file: Option<FileStore>,
}

impl SessionStore {
    /// Create a store with the given inactivity timeout
    ///
    /// When `file` is given, every mutation writes the persistable slice of
    /// the state back to disk under [`STATE_KEY`].
    pub fn new(
        session_timeout: std::time::Duration,
        throttle_config: ThrottleConfig,
        file: Option<FileStore>,
    ) -> Self {
        let (phase_tx, _) = watch::channel(SessionPhase::Anonymous);
        Self {
            inner: Arc::new(RwLock::new(SessionState::default())),
            phase_tx: Arc::new(phase_tx),
            session_timeout: Duration::seconds(session_timeout.as_secs() as i64),
            throttle_config,
            file,
        }
    }

    /// Subscribe to session phase changes
    ///
    /// The receiver immediately observes the current phase.
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    /// Current session phase
    pub fn phase(&self) -> SessionPhase {
        self.phase_tx.borrow().clone()
    }

    /// Install a full set of credentials after a successful login
    ///
    /// The token pair and user land together; partial sessions cannot be
    /// expressed. Starts a fresh inactivity window and clears any throttle
    /// state.
    pub async fn set_credentials(&self, tokens: TokenPair, user: User) {
        self.set_credentials_at(tokens, user, Utc::now()).await
    }

    pub(crate) async fn set_credentials_at(
        &self,
        tokens: TokenPair,
        user: User,
        now: DateTime<Utc>,
    ) {
        let user_id = user.id;
        let access_token = tokens.access_token.clone();
        let snapshot = {
            let mut state = self.inner.write().await;
            state.access_token = Some(tokens.access_token);
            state.refresh_token = Some(tokens.refresh_token);
            state.user = Some(user);
            state.session_expiry = Some(now + self.session_timeout);
            state.last_activity = Some(now);
            state.throttle.reset();
            state.is_loading = false;
            state.error = None;
            persist::snapshot(&state)
        };

        self.publish_phase(SessionPhase::Authenticated { access_token });
        self.persist(&snapshot).await;
        info!("Session established for user: {}", user_id);
    }

    /// Commit a refreshed token pair
    ///
    /// The user stays as-is; the inactivity deadline only ever moves
    /// forward.
    pub async fn apply_refresh(&self, tokens: TokenPair) {
        self.apply_refresh_at(tokens, Utc::now()).await
    }

    pub(crate) async fn apply_refresh_at(&self, tokens: TokenPair, now: DateTime<Utc>) {
        let access_token = tokens.access_token.clone();
        let snapshot = {
            let mut state = self.inner.write().await;
            state.access_token = Some(tokens.access_token);
            state.refresh_token = Some(tokens.refresh_token);
            let candidate = now + self.session_timeout;
            state.session_expiry = Some(
                state
                    .session_expiry
                    .map_or(candidate, |current| current.max(candidate)),
            );
            state.last_activity = Some(now);
            persist::snapshot(&state)
        };

        self.publish_phase(SessionPhase::Authenticated { access_token });
        self.persist(&snapshot).await;
        debug!("Refreshed credentials committed");
    }

    /// Record user-attributable activity, sliding the inactivity deadline
    ///
    /// No-op while signed out. The deadline never moves backwards.
    pub async fn touch_activity(&self) {
        self.touch_activity_at(Utc::now()).await
    }

    pub(crate) async fn touch_activity_at(&self, now: DateTime<Utc>) {
        let snapshot = {
            let mut state = self.inner.write().await;
            if state.access_token.is_none() {
                return;
            }
            state.last_activity = Some(now);
            let candidate = now + self.session_timeout;
            state.session_expiry = Some(
                state
                    .session_expiry
                    .map_or(candidate, |current| current.max(candidate)),
            );
            persist::snapshot(&state)
        };

        self.persist(&snapshot).await;
    }

    /// Drop the session entirely: state, persisted snapshot, and phase
    pub async fn clear(&self) {
        {
            let mut state = self.inner.write().await;
            *state = SessionState::default();
        }
        self.publish_phase(SessionPhase::Anonymous);
        self.clear_storage().await;
        info!("Session cleared");
    }

    /// Tear the session down if the inactivity deadline has passed
    ///
    /// Returns whether a teardown happened. Calling this again after it
    /// returned true is a no-op, so overlapping sweeps are harmless.
    pub async fn expire_if_due(&self, now: DateTime<Utc>) -> bool {
        {
            let mut state = self.inner.write().await;
            let due = state.access_token.is_some()
                && state.session_expiry.is_some_and(|expiry| now >= expiry);
            if !due {
                return false;
            }
            *state = SessionState::default();
        }
        self.publish_phase(SessionPhase::Anonymous);
        self.clear_storage().await;
        info!("Session expired after inactivity");
        true
    }

    /// Replace the cached user profile
    pub async fn update_user(&self, user: User) {
        let snapshot = {
            let mut state = self.inner.write().await;
            state.user = Some(user);
            persist::snapshot(&state)
        };
        self.persist(&snapshot).await;
    }

    /// Replace the UI preferences
    pub async fn set_preferences(&self, preferences: UiPreferences) {
        let snapshot = {
            let mut state = self.inner.write().await;
            state.preferences = preferences;
            persist::snapshot(&state)
        };
        self.persist(&snapshot).await;
    }

    /// Check the login throttle, clearing any expired lock
    pub async fn login_allowed(&self) -> bool {
        let (allowed, snapshot) = {
            let mut state = self.inner.write().await;
            let allowed = state.throttle.is_allowed(&self.throttle_config, Utc::now());
            (allowed, persist::snapshot(&state))
        };
        self.persist(&snapshot).await;
        allowed
    }

    /// Count a failed login towards the throttle
    pub async fn record_login_failure(&self) {
        let snapshot = {
            let mut state = self.inner.write().await;
            state.throttle.record_failure(&self.throttle_config, Utc::now());
            persist::snapshot(&state)
        };
        self.persist(&snapshot).await;
    }

    /// Mark an in-flight auth operation for the UI
    pub async fn set_loading(&self, loading: bool) {
        let mut state = self.inner.write().await;
        state.is_loading = loading;
    }

    /// Record a user-visible error message
    pub async fn set_error(&self, error: Option<String>) {
        let mut state = self.inner.write().await;
        state.error = error;
    }

    /// Load any persisted snapshot from disk into the live state
    ///
    /// An unreadable snapshot is discarded rather than surfaced; a client
    /// that cannot restore simply starts signed out.
    pub async fn rehydrate(&self) {
        let Some(file) = &self.file else { return };

        let blob = match file.read(STATE_KEY).await {
            Ok(Some(blob)) => blob,
            Ok(None) => return,
            Err(e) => {
                warn!("Failed to read persisted session state: {}", e);
                return;
            }
        };

        match serde_json::from_str::<PersistedState>(&blob) {
            Ok(persisted) => self.restore_from(persisted).await,
            Err(e) => {
                warn!("Discarding unreadable session snapshot: {}", e);
                self.clear_storage().await;
            }
        }
    }

    /// Adopt a snapshot read back from disk
    pub(crate) async fn restore_from(&self, persisted: PersistedState) {
        let access_token = {
            let mut state = self.inner.write().await;
            *state = persist::restore(persisted);
            state.access_token.clone()
        };
        if let Some(access_token) = access_token {
            self.publish_phase(SessionPhase::Authenticated { access_token });
        }
        info!("Session state restored from disk");
    }

    /// Whether a live, unexpired session is present
    pub async fn is_authenticated(&self) -> bool {
        let state = self.inner.read().await;
        state.access_token.is_some()
            && state.session_expiry.is_some_and(|expiry| Utc::now() < expiry)
    }

    /// Current access token, if any
    pub async fn access_token(&self) -> Option<String> {
        self.inner.read().await.access_token.clone()
    }

    /// Current refresh token, if any
    pub async fn refresh_token(&self) -> Option<String> {
        self.inner.read().await.refresh_token.clone()
    }

    /// Signed-in user profile, if any
    pub async fn current_user(&self) -> Option<User> {
        self.inner.read().await.user.clone()
    }

    /// Instant the session will expire without further activity
    pub async fn session_expiry(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.session_expiry
    }

    /// Current UI preferences
    pub async fn preferences(&self) -> UiPreferences {
        self.inner.read().await.preferences.clone()
    }

    /// Whether an auth operation is in flight
    pub async fn is_loading(&self) -> bool {
        self.inner.read().await.is_loading
    }

    /// Last recorded user-visible error
    pub async fn last_error(&self) -> Option<String> {
        self.inner.read().await.error.clone()
    }

    #[cfg(test)]
    pub(crate) async fn state(&self) -> SessionState {
        self.inner.read().await.clone()
    }

    fn publish_phase(&self, phase: SessionPhase) {
        self.phase_tx.send_if_modified(|current| {
            if *current != phase {
                *current = phase;
                true
            } else {
                false
            }
        });
    }

    /// Write the persistable slice to disk; failures are logged, never fatal
    async fn persist(&self, snapshot: &PersistedState) {
        let Some(file) = &self.file else { return };

        match serde_json::to_string(snapshot) {
            Ok(blob) => {
                if let Err(e) = file.write(STATE_KEY, &blob).await {
                    error!("Failed to persist session state: {}", e);
                }
            }
            Err(e) => error!("Failed to encode session state: {}", e),
        }
    }

    async fn clear_storage(&self) {
        let Some(file) = &self.file else { return };

        if let Err(e) = file.delete(STATE_KEY).await {
            error!("Failed to clear persisted session state: {}", e);
        }
    }
}
