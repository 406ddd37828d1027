//! Kurso client runtime
//!
//! Everything a frontend needs to talk to the Kurso backend: a session
//! store that owns credentials and their lifecycle, an authenticated HTTP
//! dispatcher with transparent token refresh, a background monitor that
//! expires idle sessions, and a real-time bridge that feeds pushed events
//! into observable stores.
//!
//! [`Client`] wires these together. Construct one, call [`Client::start`],
//! and drive it through the typed methods on the handle.

pub mod api;
pub mod auth;
pub mod cache;
pub mod http;
pub mod models;
pub mod monitor;
pub mod persist;
pub mod realtime;
pub mod session;
pub mod stores;
pub mod throttle;
pub mod validation;

pub use common::config::ClientConfig;
pub use common::error::{ApiError, ApiResult};
pub use realtime::ConnectionState;
pub use session::{SessionPhase, SessionStore, TokenPair};
pub use stores::Stores;

use crate::cache::QueryCache;
use crate::http::Dispatcher;
use crate::monitor::SessionMonitor;
use crate::realtime::RealtimeBridge;
use crate::throttle::ThrottleConfig;
use anyhow::{Context, Result};
use chrono::Utc;
use common::storage::FileStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// How long cached GET responses stay fresh
const QUERY_CACHE_TTL: Duration = Duration::from_secs(60);

/// Operations whose failures are routine and must not alarm the user
const NOTIFY_EXCLUDED_OPERATIONS: &[&str] = &["auth/me"];

/// Top-level handle owning the client's moving parts
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct Client {
    config: ClientConfig,
    pub(crate) session: SessionStore,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) stores: Stores,
    pub(crate) cache: Arc<QueryCache>,
    realtime_url: Url,
    monitor: Mutex<Option<SessionMonitor>>,
    realtime: Mutex<Option<Arc<RealtimeBridge>>>,
}

impl Client {
    /// Assemble a client from its configuration
    ///
    /// Nothing runs yet; call [`Client::start`] to restore persisted state
    /// and bring up the background tasks.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let realtime_url =
            Url::parse(&config.realtime_url).context("Invalid real-time URL")?;

        let file = FileStore::new(&config.storage_dir);
        let session = SessionStore::new(
            config.session_timeout(),
            ThrottleConfig::default(),
            Some(file),
        );
        let cache = Arc::new(QueryCache::new(QUERY_CACHE_TTL));
        let dispatcher = Dispatcher::new(&config, session.clone(), cache.clone())?;
        let stores = Stores::default();

        Ok(Self {
            config,
            session,
            dispatcher,
            stores,
            cache,
            realtime_url,
            monitor: Mutex::new(None),
            realtime: Mutex::new(None),
        })
    }

    /// Restore persisted state and bring up the background tasks
    ///
    /// A snapshot that sat on disk past its inactivity deadline is dropped
    /// on arrival. When a session does survive restoration, its credentials
    /// are validated against the backend by refetching the profile.
    pub async fn start(&self) {
        info!("Starting client");
        self.session.rehydrate().await;
        self.session.expire_if_due(Utc::now()).await;

        *self.monitor.lock() = Some(SessionMonitor::spawn(
            self.session.clone(),
            self.cache.clone(),
            self.config.monitor_interval(),
        ));
        *self.realtime.lock() = Some(Arc::new(RealtimeBridge::spawn(
            self.realtime_url.clone(),
            self.config.request_timeout(),
            self.stores.clone(),
            self.session.subscribe(),
        )));

        if self.session.is_authenticated().await {
            match self.me().await {
                Ok(user) => debug!("Restored session confirmed for: {}", user.email),
                Err(e) => debug!("Restored session rejected by the backend: {}", e),
            }
        }
    }

    /// Stop the background tasks
    ///
    /// Session state stays put, persisted and in memory; a later
    /// [`Client::start`] picks it back up.
    pub fn shutdown(&self) {
        if let Some(monitor) = self.monitor.lock().take() {
            monitor.shutdown();
        }
        if let Some(bridge) = self.realtime.lock().take() {
            bridge.shutdown();
        }
        info!("Client stopped");
    }

    /// Session state handle
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Observable stores fed by API reads and real-time events
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Configuration this client was built from
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current state of the real-time channel
    ///
    /// [`ConnectionState::Disconnected`] before [`Client::start`].
    pub fn realtime_state(&self) -> ConnectionState {
        self.realtime
            .lock()
            .as_ref()
            .map(|bridge| bridge.connection_state())
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Close the real-time channel and wait for the socket to come down
    pub(crate) async fn close_realtime_channel(&self) {
        let bridge = self.realtime.lock().clone();
        if let Some(bridge) = bridge {
            bridge.close_channel().await;
        }
    }

    /// Route an operation failure into the user-facing notification feed
    pub(crate) fn observe_failure(&self, operation: &str, error: &ApiError) {
        if NOTIFY_EXCLUDED_OPERATIONS.contains(&operation) {
            return;
        }
        warn!("Operation failed ({}): {}", operation, error);
        self.stores
            .notifications
            .push_local("Request failed", &error.to_string());
    }
}
