//! Typed API surface
//!
//! Thin wrappers over the dispatcher for the resources the client reads and
//! writes. Read results land in the matching store where one exists, so the
//! UI observes a single source of truth.

use crate::Client;
use crate::models::{ChatMessage, Course, CourseDetail, Notification, UiPreferences};
use common::error::ApiResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to post a chat message
#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
}

impl Client {
    /// List the signed-in user's courses, served from cache when fresh
    pub async fn list_courses(&self) -> ApiResult<Vec<Course>> {
        self.dispatcher
            .get_cached("courses")
            .await
            .inspect_err(|e| self.observe_failure("courses", e))
    }

    /// Fetch one course with its lessons, served from cache when fresh
    pub async fn course(&self, course_id: Uuid) -> ApiResult<CourseDetail> {
        let path = format!("courses/{course_id}");
        self.dispatcher
            .get_cached(&path)
            .await
            .inspect_err(|e| self.observe_failure(&path, e))
    }

    /// Fetch notifications, replacing the local store with the result
    pub async fn list_notifications(&self) -> ApiResult<Vec<Notification>> {
        let items: Vec<Notification> = self
            .dispatcher
            .get("notifications")
            .await
            .inspect_err(|e| self.observe_failure("notifications", e))?;
        self.stores.notifications.replace_all(items.clone());
        Ok(items)
    }

    /// Mark a notification as read, server-side and in the local store
    pub async fn mark_notification_read(&self, notification_id: Uuid) -> ApiResult<Notification> {
        let path = format!("notifications/{notification_id}/read");
        let updated: Notification = self
            .dispatcher
            .post(&path, &serde_json::json!({}))
            .await
            .inspect_err(|e| self.observe_failure(&path, e))?;
        self.stores.notifications.mark_read(notification_id);
        Ok(updated)
    }

    /// Post a chat message
    ///
    /// The accepted message is returned but not appended locally; it comes
    /// back through the real-time channel like everyone else's.
    pub async fn send_chat_message(&self, body: &str) -> ApiResult<ChatMessage> {
        let request = SendMessageRequest {
            body: body.to_string(),
        };
        self.dispatcher
            .post("chat/messages", &request)
            .await
            .inspect_err(|e| self.observe_failure("chat/messages", e))
    }

    /// Update and persist the UI preferences
    ///
    /// Preferences are client-owned; no request is made.
    pub async fn update_preferences(&self, preferences: UiPreferences) {
        self.session.set_preferences(preferences).await;
    }
}
