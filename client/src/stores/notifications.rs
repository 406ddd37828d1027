//! Notification store

use crate::models::Notification;
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// Notifications, newest first
#[derive(Clone, Default)]
pub struct NotificationStore {
    inner: Arc<RwLock<Vec<Notification>>>,
}

impl NotificationStore {
    /// Prepend a freshly arrived notification
    pub fn push(&self, notification: Notification) {
        self.inner.write().insert(0, notification);
    }

    /// Prepend a client-generated notification
    pub fn push_local(&self, title: &str, body: &str) {
        self.push(Notification::local(title, body));
    }

    /// Replace the full list, e.g. after fetching from the backend
    pub fn replace_all(&self, notifications: Vec<Notification>) {
        *self.inner.write() = notifications;
    }

    /// Mark one notification as read; returns whether it was found
    pub fn mark_read(&self, id: Uuid) -> bool {
        let mut notifications = self.inner.write();
        match notifications.iter_mut().find(|n| n.id == id) {
            Some(notification) => {
                notification.read = true;
                true
            }
            None => false,
        }
    }

    /// All notifications, newest first
    pub fn items(&self) -> Vec<Notification> {
        self.inner.read().clone()
    }

    /// How many notifications are unread
    pub fn unread_count(&self) -> usize {
        self.inner.read().iter().filter(|n| !n.read).count()
    }

    /// Drop everything
    pub fn clear(&self) {
        self.inner.write().clear();
    }
}
