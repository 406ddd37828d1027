//! Session expiry monitor
//!
//! A background sweep that checks the session's inactivity deadline on a
//! fixed interval and tears the session down once it passes. The sweep is a
//! safety net: requests and refreshes keep sliding the deadline forward, so
//! it only ever fires for a genuinely idle client.

use crate::cache::QueryCache;
use crate::session::SessionStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

/// Handle to the background expiry sweep
pub struct SessionMonitor {
    handle: JoinHandle<()>,
}

impl SessionMonitor {
    /// Spawn the sweep with the given period
    pub fn spawn(session: SessionStore, cache: Arc<QueryCache>, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if session.expire_if_due(Utc::now()).await {
                    cache.clear();
                } else {
                    debug!("Session monitor sweep: nothing to do");
                }
            }
        });

        Self { handle }
    }

    /// Stop the sweep
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
