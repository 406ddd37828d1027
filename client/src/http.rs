//! Authenticated request dispatch
//!
//! All backend traffic funnels through [`Dispatcher`]. It assembles the
//! request URL, attaches the current bearer token, maps failures onto the
//! [`ApiError`] taxonomy, and owns the expired-token recovery dance:
//!
//! - a 401 triggers at most one refresh-and-replay per request;
//! - concurrent 401s collapse onto a single refresh call behind an async
//!   mutex, with latecomers reusing the token the winner installed;
//! - a failed refresh tears the whole session down.
//!
//! Every successful response counts as user activity and slides the
//! session's inactivity window.

use crate::cache::QueryCache;
use crate::session::{SessionStore, TokenPair};
use anyhow::{Context, Result};
use common::config::ClientConfig;
use common::error::{ApiError, ApiResult};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

/// Endpoints that must never trigger the 401 recovery path
///
/// A 401 from these is an answer about the submitted credentials, not a
/// sign that the session token went stale.
const NO_RECOVERY_PATHS: &[&str] = &["auth/login", "auth/refresh", "auth/logout"];

/// Request to mint a fresh token pair
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token payload returned by the refresh endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Authenticated HTTP dispatcher
#[derive(Clone)]
pub struct Dispatcher {
    http: reqwest::Client,
    api_root: Url,
    session: SessionStore,
    cache: Arc<QueryCache>,
    /// Gate collapsing concurrent refresh attempts into one call
    refresh_gate: Arc<Mutex<()>>,
}

impl Dispatcher {
    /// Build a dispatcher from the client configuration
    pub fn new(
        config: &ClientConfig,
        session: SessionStore,
        cache: Arc<QueryCache>,
    ) -> Result<Self> {
        let api_root = Url::parse(&format!(
            "{}/api/{}/",
            config.base_url.trim_end_matches('/'),
            config.api_version
        ))
        .context("Invalid base URL")?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            api_root,
            session,
            cache,
            refresh_gate: Arc::new(Mutex::new(())),
        })
    }

    /// GET a resource and decode its JSON body
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.execute(Method::GET, path, None).await?;
        decode(response).await
    }

    /// GET through the response cache
    ///
    /// A fresh cached value short-circuits the network entirely; a miss
    /// fetches, caches the raw JSON, and decodes.
    pub async fn get_cached<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        if let Some(hit) = self.cache.get(path) {
            debug!("Cache hit for {}", path);
            return serde_json::from_value(hit)
                .map_err(|e| ApiError::Network(format!("Invalid cached payload: {e}")));
        }

        let value: Value = self.get(path).await?;
        self.cache.set(path, value.clone());
        serde_json::from_value(value)
            .map_err(|e| ApiError::Network(format!("Invalid response body: {e}")))
    }

    /// POST a JSON body and decode the JSON response
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::Network(format!("Request encoding failed: {e}")))?;
        let response = self.execute(Method::POST, path, Some(body)).await?;
        decode(response).await
    }

    /// Run one request descriptor through the full dispatch flow
    async fn execute(&self, method: Method, path: &str, body: Option<Value>) -> ApiResult<Response> {
        let url = self.endpoint(path)?;
        let token = self.session.access_token().await;
        let response = self
            .send_once(method.clone(), url.clone(), &body, token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED || NO_RECOVERY_PATHS.contains(&path) {
            return self.conclude(response).await;
        }

        // Expired-token recovery: refresh (or piggyback on a refresh that
        // beat us to the gate), then replay exactly once.
        self.recover_unauthorized(token).await?;
        let replay_token = self.session.access_token().await;
        let response = self
            .send_once(method, url, &body, replay_token.as_deref())
            .await?;
        self.conclude(response).await
    }

    /// Issue a single HTTP round trip; only transport errors surface here
    async fn send_once(
        &self,
        method: Method,
        url: Url,
        body: &Option<Value>,
        token: Option<&str>,
    ) -> ApiResult<Response> {
        let mut request = self.http.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(map_transport_error)
    }

    /// Map a finished response to success-plus-activity or a taxonomy error
    async fn conclude(&self, response: Response) -> ApiResult<Response> {
        if response.status().is_success() {
            self.session.touch_activity().await;
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    /// Bring the session back to a usable token after a 401, at most once
    ///
    /// Returns `Ok` when the caller should replay its request with the
    /// now-current token. All waiters park on the gate; whoever enters first
    /// performs the refresh and everyone else piggybacks on its outcome.
    async fn recover_unauthorized(&self, stale_token: Option<String>) -> ApiResult<()> {
        let _guard = self.refresh_gate.lock().await;

        // The token moved while we waited for the gate (another request
        // refreshed, or the session was torn down). Either way, replaying
        // with the current state is the right move and refreshing again
        // is not.
        let current = self.session.access_token().await;
        if current != stale_token {
            return Ok(());
        }

        let Some(refresh_token) = self.session.refresh_token().await else {
            self.teardown().await;
            return Err(ApiError::Unauthorized);
        };

        match self.request_refresh(&refresh_token).await {
            Ok(tokens) => {
                self.session.apply_refresh(tokens).await;
                debug!("Access token refreshed");
                Ok(())
            }
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                self.teardown().await;
                Err(ApiError::Unauthorized)
            }
        }
    }

    /// Call the refresh endpoint directly, outside the dispatch flow
    async fn request_refresh(&self, refresh_token: &str) -> ApiResult<TokenPair> {
        let url = self.endpoint("auth/refresh")?;
        let request = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };

        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: RefreshResponse = decode(response).await?;
        Ok(TokenPair {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
        })
    }

    async fn teardown(&self) {
        self.session.clear().await;
        self.cache.clear();
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.api_root
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Network(format!("Invalid request path {path:?}: {e}")))
    }
}

/// Error body shape used by the backend for non-2xx responses
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: HashMap<String, Vec<String>>,
}

async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Network(format!("Invalid response body: {e}")))
}

fn map_transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Network(format!("Request timed out: {e}"))
    } else {
        ApiError::Network(e.to_string())
    }
}

/// Map a non-2xx response onto the error taxonomy
async fn error_from_response(response: Response) -> ApiError {
    let status = response.status();
    let body = response.json::<ErrorBody>().await.unwrap_or_default();
    let message = if body.message.is_empty() {
        status.to_string()
    } else {
        body.message
    };

    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::FORBIDDEN => ApiError::Forbidden,
        StatusCode::NOT_FOUND => ApiError::NotFound,
        s if s.is_server_error() => ApiError::Server {
            status: s.as_u16(),
            message,
        },
        _ => ApiError::Validation {
            message,
            field_errors: body.errors,
        },
    }
}
