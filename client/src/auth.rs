//! Authentication flow
//!
//! Login, logout, and profile sync on top of the dispatcher. Wire shapes
//! mirror the backend's auth routes.

use crate::Client;
use crate::models::User;
use crate::session::TokenPair;
use crate::validation;
use common::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Request for user login
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response for a successful login
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: User,
}

/// Request to revoke a refresh token
#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

impl Client {
    /// Sign in and establish a session
    ///
    /// Input is validated locally first, and a throttled account is refused
    /// without touching the network. On success the full credential set
    /// lands atomically in the session store, which also wakes the
    /// real-time bridge.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<User> {
        validation::validate_login(email, password)?;

        if !self.session.login_allowed().await {
            return Err(ApiError::Validation {
                message: "Too many failed sign-in attempts; please try again later".to_string(),
                field_errors: HashMap::new(),
            });
        }

        info!("Login attempt for: {}", email);
        self.session.set_loading(true).await;
        self.session.set_error(None).await;

        // Whatever a previous account loaded must not leak into this one
        self.stores.reset();
        self.cache.clear();

        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        match self
            .dispatcher
            .post::<_, LoginResponse>("auth/login", &request)
            .await
        {
            Ok(response) => {
                let user = response.user.clone();
                self.session
                    .set_credentials(
                        TokenPair {
                            access_token: response.access_token,
                            refresh_token: response.refresh_token,
                        },
                        response.user,
                    )
                    .await;
                Ok(user)
            }
            Err(e) => {
                if matches!(e, ApiError::Unauthorized) {
                    self.session.record_login_failure().await;
                }
                self.session.set_loading(false).await;
                self.session.set_error(Some(e.to_string())).await;
                self.observe_failure("auth/login", &e);
                Err(e)
            }
        }
    }

    /// Sign out
    ///
    /// Revokes the refresh token server-side on a best-effort basis, then
    /// tears everything down locally: the socket closes first, then
    /// credentials, persisted state, and cached responses go.
    pub async fn logout(&self) {
        info!("Logout requested");

        if let Some(refresh_token) = self.session.refresh_token().await {
            let request = LogoutRequest { refresh_token };
            if let Err(e) = self
                .dispatcher
                .post::<_, serde_json::Value>("auth/logout", &request)
                .await
            {
                warn!("Server-side logout failed: {}", e);
            }
        }

        // Socket teardown strictly precedes the credential wipe
        self.close_realtime_channel().await;
        self.session.clear().await;
        self.cache.clear();
    }

    /// Fetch the signed-in user's profile and sync it into the session
    ///
    /// This runs as a probe on cold start, where failing is the expected
    /// outcome for a signed-out client; its failures are excluded from the
    /// user-facing failure feed.
    pub async fn me(&self) -> ApiResult<User> {
        let result = self.dispatcher.get::<User>("auth/me").await;
        match &result {
            Ok(user) => self.session.update_user(user.clone()).await,
            Err(e) => self.observe_failure("auth/me", e),
        }
        result
    }
}
