//! Login throttle for slowing down repeated failed sign-ins
//!
//! This is client-side UX only: it saves the user from hammering the
//! backend, which enforces its own limits regardless.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Throttle configuration
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Maximum number of failed attempts allowed
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Lock duration in seconds
    pub lock_seconds: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300, // 5 minutes
            lock_seconds: 900,   // 15 minutes
        }
    }
}

/// Failed-attempt state for the single local user
///
/// Timestamps are wall-clock so the state survives a restart inside the
/// persisted session snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginThrottle {
    /// Number of failed attempts in the current window
    attempts: u32,
    /// Last failed attempt time
    last_failure: Option<DateTime<Utc>>,
    /// Lock expiration time
    lock_expires: Option<DateTime<Utc>>,
}

impl LoginThrottle {
    /// Check whether a login attempt may proceed
    pub fn is_allowed(&mut self, config: &ThrottleConfig, now: DateTime<Utc>) -> bool {
        // Check if the lock has expired
        if let Some(lock_expires) = self.lock_expires {
            if now >= lock_expires {
                // Lock expired, reset attempts
                self.attempts = 0;
                self.lock_expires = None;
            } else {
                // Still locked
                return false;
            }
        }

        // Check if the window has expired
        if let Some(last_failure) = self.last_failure {
            if now - last_failure >= Duration::seconds(config.window_seconds as i64) {
                self.attempts = 0;
            }
        }

        true
    }

    /// Record a failed attempt, locking once the limit is reached
    pub fn record_failure(&mut self, config: &ThrottleConfig, now: DateTime<Utc>) {
        // A failure outside the window starts a fresh count
        if let Some(last_failure) = self.last_failure {
            if now - last_failure >= Duration::seconds(config.window_seconds as i64) {
                self.attempts = 0;
            }
        }

        self.attempts += 1;
        self.last_failure = Some(now);

        if self.attempts >= config.max_attempts {
            self.lock_expires = Some(now + Duration::seconds(config.lock_seconds as i64));
            info!(
                "Login locked for {} seconds after {} failed attempts",
                config.lock_seconds, self.attempts
            );
        }
    }

    /// Clear all throttle state after a successful login
    pub fn reset(&mut self) {
        *self = LoginThrottle::default();
    }

    /// Number of failed attempts in the current window
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
