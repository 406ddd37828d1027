//! Chat store

use crate::models::ChatMessage;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Default)]
struct ChatState {
    messages: Vec<ChatMessage>,
    typing: HashSet<Uuid>,
}

/// Messages and typing indicators for the active conversation
#[derive(Clone, Default)]
pub struct ChatStore {
    inner: Arc<RwLock<ChatState>>,
}

impl ChatStore {
    /// Append a delivered message
    pub fn append(&self, message: ChatMessage) {
        let mut state = self.inner.write();
        // A delivered message supersedes the sender's typing indicator
        state.typing.remove(&message.sender_id);
        state.messages.push(message);
    }

    /// Set or clear a user's typing indicator
    pub fn set_typing(&self, user_id: Uuid, typing: bool) {
        let mut state = self.inner.write();
        if typing {
            state.typing.insert(user_id);
        } else {
            state.typing.remove(&user_id);
        }
    }

    /// All messages in arrival order
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.inner.read().messages.clone()
    }

    /// Users currently typing
    pub fn typing_users(&self) -> Vec<Uuid> {
        self.inner.read().typing.iter().copied().collect()
    }

    /// Drop all chat state
    pub fn clear(&self) {
        *self.inner.write() = ChatState::default();
    }
}
