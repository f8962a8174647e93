use serde::{Deserialize, Serialize};

/// Message exchanged over the real-time gateway, in both directions.
///
/// Serialized as JSON with explicit field names, e.g.
/// `{"sender_id":"...","display_name":"...","body":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFrame {
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub display_name: String,
    pub body: String,
}

impl ChatFrame {
    /// Fill blank identity fields. The body is left untouched.
    pub fn with_defaults(mut self, sender_id: &str, anonymous_name: &str) -> Self {
        if self.sender_id.trim().is_empty() {
            self.sender_id = sender_id.to_string();
        }
        if self.display_name.trim().is_empty() {
            self.display_name = anonymous_name.to_string();
        }
        self
    }
}
