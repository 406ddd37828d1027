//! Persisted session snapshot
//!
//! Exactly one slice of the session survives a restart, and it is defined
//! by the fields of [`PersistedState`] rather than by filtering logic:
//! anything not in the DTO is gone after a restart. Volatile UI flags are
//! reinstated to their quiescent defaults by [`restore`] no matter what an
//! old or hand-edited blob claims.

use crate::models::{UiPreferences, User};
use crate::session::SessionState;
use crate::throttle::LoginThrottle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage key for the session snapshot
///
/// The version suffix guards the format: incompatible layout changes bump
/// it, and blobs written under an old key are simply never read again.
pub const STATE_KEY: &str = "kurso.state.v1";

/// The slice of session state that is allowed to touch disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
    pub session_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub throttle: LoginThrottle,
    #[serde(default)]
    pub preferences: UiPreferences,
}

/// Project the live state down to its persistable slice
pub fn snapshot(state: &SessionState) -> PersistedState {
    PersistedState {
        access_token: state.access_token.clone(),
        refresh_token: state.refresh_token.clone(),
        user: state.user.clone(),
        session_expiry: state.session_expiry,
        throttle: state.throttle.clone(),
        preferences: state.preferences.clone(),
    }
}

/// Rebuild live state from a snapshot
///
/// `is_loading` and `error` always come back as `false`/`None`, and
/// `last_activity` restarts empty; only the snapshot fields carry over.
pub fn restore(persisted: PersistedState) -> SessionState {
    SessionState {
        access_token: persisted.access_token,
        refresh_token: persisted.refresh_token,
        user: persisted.user,
        session_expiry: persisted.session_expiry,
        last_activity: None,
        throttle: persisted.throttle,
        preferences: persisted.preferences,
        is_loading: false,
        error: None,
    }
}
