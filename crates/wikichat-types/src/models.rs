use serde::{Deserialize, Serialize};

/// One posted chat message plus its vote count.
///
/// `id` is assigned by the chat log and is the only handle clients use to
/// address an entry (votes reference it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: u64,
    pub author: String,
    pub body: String,
    pub nice_count: u64,
}

impl ChatEntry {
    pub fn new(id: u64, author: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            author: author.into(),
            body: body.into(),
            nice_count: 0,
        }
    }
}
