//! Notification model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A notification shown to the user
///
/// Backend-issued notifications arrive over the real-time channel or the
/// notification listing; the client also creates local ones for failures it
/// wants to surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Build a local, unread notification with a fresh id
    pub fn local(title: &str, body: &str) -> Self {
        Notification {
            id: Uuid::new_v4(),
            title: title.to_string(),
            body: body.to_string(),
            read: false,
            created_at: Utc::now(),
        }
    }
}
