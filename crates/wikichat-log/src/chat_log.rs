use tokio::sync::RwLock;
use tracing::{info, warn};
use wikichat_types::models::ChatEntry;

use crate::error::{LogError, Result};
use crate::ranking;
use crate::record;
use crate::store::ChatLogStore;

/// In-memory view of the chat log, backed by an append-only store.
///
/// Every mutation appends to the store and updates memory under one write
/// lock, so the file order always matches id order and no vote is lost.
///
/// A failed append may still have reached the disk. Ids are therefore spent
/// as soon as an append is attempted, and a vote whose write failed is still
/// counted in memory, so memory never shows less than a replay would.
pub struct ChatLog {
    store: ChatLogStore,
    state: RwLock<LogState>,
}

struct LogState {
    entries: Vec<ChatEntry>,
    next_id: u64,
}

impl ChatLog {
    /// Replay the store and start assigning ids after the highest one seen.
    pub async fn open(store: ChatLogStore) -> Result<Self> {
        let entries = store.load_all().await?;
        let next_id = entries.iter().map(|e| e.id).max().map_or(1, |max| max + 1);

        info!(
            "Chat log ready: {} entries, next id {}",
            entries.len(),
            next_id
        );

        Ok(Self {
            store,
            state: RwLock::new(LogState { entries, next_id }),
        })
    }

    pub async fn post(&self, author: &str, body: &str) -> Result<ChatEntry> {
        record::validate_field("name", author)?;
        record::validate_field("comment", body)?;

        let mut state = self.state.write().await;
        let entry = ChatEntry::new(state.next_id, author, body);
        state.next_id += 1;

        self.store.append(&entry).await?;

        state.entries.push(entry.clone());
        Ok(entry)
    }

    /// Add one vote to an entry. The new count is written to the store
    /// before it becomes visible in memory.
    pub async fn vote(&self, id: u64) -> Result<ChatEntry> {
        let mut state = self.state.write().await;

        let mut updated = state
            .entries
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or(LogError::NotFound(id))?;
        updated.nice_count = updated
            .nice_count
            .checked_add(1)
            .ok_or(LogError::CountOverflow(id))?;

        match self.store.append(&updated).await {
            Ok(()) => {}
            Err(e @ (LogError::Io(_) | LogError::Timeout(_))) => {
                warn!("Vote for chat entry {} may not be durable: {}", id, e);
                ranking::apply_vote(&mut state.entries, id)?;
                return Err(e);
            }
            Err(e) => return Err(e),
        }

        ranking::apply_vote(&mut state.entries, id)?;
        Ok(updated)
    }

    /// Entries in creation order.
    pub async fn entries(&self) -> Vec<ChatEntry> {
        self.state.read().await.entries.clone()
    }

    /// Entries ordered by popularity.
    pub async fn ranked(&self) -> Vec<ChatEntry> {
        let snapshot = self.entries().await;
        ranking::rank(&snapshot)
    }

    pub fn store(&self) -> &ChatLogStore {
        &self.store
    }
}
