//! In-memory domain stores
//!
//! These hold the data the UI renders: chat, notifications, and learning
//! progress. They are rebuilt from the backend on every sign-in and are
//! never persisted. Mutation happens through typed methods only, from the
//! real-time demux table and the API layer.

pub mod chat;
pub mod notifications;
pub mod progress;

pub use chat::ChatStore;
pub use notifications::NotificationStore;
pub use progress::ProgressStore;

/// Bundle of every domain store, cheap to clone and share
#[derive(Clone, Default)]
pub struct Stores {
    pub chat: ChatStore,
    pub notifications: NotificationStore,
    pub progress: ProgressStore,
}

impl Stores {
    /// Empty every store, e.g. before a different account signs in
    pub fn reset(&self) {
        self.chat.clear();
        self.notifications.clear();
        self.progress.clear();
    }
}
