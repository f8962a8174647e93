use wikichat_types::models::ChatEntry;

use crate::error::{LogError, Result};

/// Order entries by vote count, most popular first.
///
/// The sort is stable: entries with equal votes keep their input order, which
/// for a chat log snapshot is creation order.
pub fn rank(entries: &[ChatEntry]) -> Vec<ChatEntry> {
    let mut ranked = entries.to_vec();
    ranked.sort_by(|a, b| b.nice_count.cmp(&a.nice_count));
    ranked
}

/// Add one vote to the entry with `id` and return its new count.
///
/// Does not re-sort. Callers serialize concurrent votes by holding the log's
/// write lock.
pub fn apply_vote(entries: &mut [ChatEntry], id: u64) -> Result<u64> {
    let entry = entries
        .iter_mut()
        .find(|e| e.id == id)
        .ok_or(LogError::NotFound(id))?;
    entry.nice_count = entry
        .nice_count
        .checked_add(1)
        .ok_or(LogError::CountOverflow(id))?;
    Ok(entry.nice_count)
}
