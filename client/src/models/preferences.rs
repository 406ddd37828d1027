//! UI preference model

use serde::{Deserialize, Serialize};

/// Presentation preferences that survive restarts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiPreferences {
    /// Color scheme: "light", "dark", or "system"
    pub theme: String,
    /// BCP 47 language tag
    pub locale: String,
}

impl Default for UiPreferences {
    fn default() -> Self {
        UiPreferences {
            theme: "system".to_string(),
            locale: "en".to_string(),
        }
    }
}
