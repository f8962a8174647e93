use serde::{Deserialize, Serialize};

use crate::models::ChatEntry;

// -- Chat form --

/// Form fields accepted by `POST /chat`.
///
/// `chat` non-empty posts a message; otherwise a non-empty `count` is read as
/// the id of the entry to vote on.
#[derive(Debug, Default, Deserialize)]
pub struct ChatForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub chat: Option<String>,
    #[serde(default)]
    pub count: Option<String>,
}

// -- Chat view --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatOutcome {
    Posted,
    Voted,
    NotFound,
    None,
}

/// Response body for the chat endpoints. `entries` is ranked by votes.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatView {
    pub outcome: ChatOutcome,
    pub entry: Option<ChatEntry>,
    pub entries: Vec<ChatEntry>,
}
