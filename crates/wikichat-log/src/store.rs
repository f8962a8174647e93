use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use wikichat_types::models::ChatEntry;

use crate::error::{LogError, Result};
use crate::record;

/// Append-only flat-file persistence for chat entries.
///
/// Writes go through a single `O_APPEND` handle guarded by a mutex, so two
/// appenders in this process never interleave partial lines. Reads take the
/// same mutex and never observe a half-written record.
///
/// A vote is persisted as a fresh record with the same id. On replay the latest
/// record for an id wins, while the entry keeps the position of its first
/// record.
pub struct ChatLogStore {
    path: PathBuf,
    io_timeout: Duration,
    writer: Mutex<Writer>,
}

/// Written ahead of the next record after a failed append. A torn line ends up
/// with an extra field and is skipped on replay, even when only its newline
/// was missing.
const TORN_FENCE: &[u8] = b"\x1e\n";

struct Writer {
    file: fs::File,
    /// Set after a failed append; the next append is preceded by `TORN_FENCE`.
    dirty: bool,
}

impl ChatLogStore {
    pub async fn open(path: impl Into<PathBuf>, io_timeout: Duration) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        info!("Chat log opened at {}", path.display());
        Ok(Self {
            path,
            io_timeout,
            writer: Mutex::new(Writer { file, dirty: false }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn set_io_timeout(&mut self, io_timeout: Duration) {
        self.io_timeout = io_timeout;
    }

    /// Append one record and flush it to disk.
    pub async fn append(&self, entry: &ChatEntry) -> Result<()> {
        let line = record::encode(entry)?;

        let mut writer = self.writer.lock().await;

        let mut buf = Vec::with_capacity(line.len() + TORN_FENCE.len());
        if writer.dirty {
            buf.extend_from_slice(TORN_FENCE);
        }
        buf.extend_from_slice(line.as_bytes());

        let file = &mut writer.file;
        let result = tokio::time::timeout(self.io_timeout, async {
            file.write_all(&buf).await?;
            file.flush().await?;
            file.sync_data().await
        })
        .await;

        match result {
            Ok(Ok(())) => {
                writer.dirty = false;
                debug!("Appended chat record {} ({} bytes)", entry.id, buf.len());
                Ok(())
            }
            Ok(Err(e)) => {
                writer.dirty = true;
                Err(LogError::Io(e))
            }
            Err(_) => {
                writer.dirty = true;
                Err(LogError::Timeout(self.io_timeout))
            }
        }
    }

    /// Read every complete record, in the order it was first appended.
    pub async fn load_all(&self) -> Result<Vec<ChatEntry>> {
        let _writer = self.writer.lock().await;

        let raw = tokio::time::timeout(self.io_timeout, fs::read(&self.path))
            .await
            .map_err(|_| LogError::Timeout(self.io_timeout))??;

        let entries = replay(&raw, &self.path);
        debug!(
            "Loaded {} chat entries from {}",
            entries.len(),
            self.path.display()
        );
        Ok(entries)
    }
}

fn replay(raw: &[u8], source: &Path) -> Vec<ChatEntry> {
    let complete = match raw.iter().rposition(|&b| b == b'\n') {
        Some(end) => &raw[..=end],
        None => &raw[..0],
    };

    let tail = raw.len() - complete.len();
    if tail > 0 {
        warn!(
            "{}: ignoring incomplete trailing record ({} bytes)",
            source.display(),
            tail
        );
    }

    let mut entries: Vec<ChatEntry> = Vec::new();
    let mut positions: HashMap<u64, usize> = HashMap::new();

    for (index, line) in complete.split(|&b| b == b'\n').enumerate() {
        if line.is_empty() {
            continue;
        }
        let line_no = index + 1;

        let text = match std::str::from_utf8(line) {
            Ok(text) => text.strip_suffix('\r').unwrap_or(text),
            Err(e) => {
                warn!("{}:{}: skipping non-UTF-8 chat record: {}", source.display(), line_no, e);
                continue;
            }
        };

        match record::decode(text) {
            Ok(entry) => match positions.get(&entry.id) {
                Some(&pos) => entries[pos] = entry,
                None => {
                    positions.insert(entry.id, entries.len());
                    entries.push(entry);
                }
            },
            Err(e) => {
                warn!("{}:{}: skipping malformed chat record: {}", source.display(), line_no, e);
            }
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn entry(id: u64, author: &str, body: &str, nice_count: u64) -> ChatEntry {
        ChatEntry {
            id,
            author: author.into(),
            body: body.into(),
            nice_count,
        }
    }

    #[tokio::test]
    async fn test_empty_store_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatLogStore::open(dir.path().join("chatLog"), TIMEOUT)
            .await
            .unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_creates_missing_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("nested").join("chatLog");
        let store = ChatLogStore::open(&path, TIMEOUT).await.unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }

    #[tokio::test]
    async fn test_round_trip_preserves_append_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatLogStore::open(dir.path().join("chatLog"), TIMEOUT)
            .await
            .unwrap();

        let written = vec![
            entry(1, "alice", "first", 0),
            entry(2, "名無しさん", "二番目", 4),
            entry(3, "carol", "third, with commas; and tabs\t", 1),
        ];
        for e in &written {
            store.append(e).await.unwrap();
        }

        assert_eq!(store.load_all().await.unwrap(), written);
    }

    #[tokio::test]
    async fn test_reopen_sees_previous_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatLog");
        {
            let store = ChatLogStore::open(&path, TIMEOUT).await.unwrap();
            store.append(&entry(1, "a", "x", 0)).await.unwrap();
        }
        let store = ChatLogStore::open(&path, TIMEOUT).await.unwrap();
        store.append(&entry(2, "b", "y", 0)).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_rejects_forbidden_text_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatLog");
        let store = ChatLogStore::open(&path, TIMEOUT).await.unwrap();

        let err = store.append(&entry(1, "a", "two\nlines", 0)).await.unwrap_err();
        assert!(matches!(err, LogError::InvalidRecord(_)));
        assert_eq!(std::fs::read(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_replay_skips_malformed_lines() {
        let raw = "1\u{1e}a\u{1e}ok\u{1e}0\n\
                   garbage line\n\
                   x\u{1e}a\u{1e}bad id\u{1e}0\n\
                   \n\
                   2\u{1e}b\u{1e}also ok\u{1e}2\n";
        let entries = replay(raw.as_bytes(), Path::new("test"));
        assert_eq!(entries, vec![entry(1, "a", "ok", 0), entry(2, "b", "also ok", 2)]);
    }

    #[test]
    fn test_replay_ignores_torn_tail() {
        let raw = "1\u{1e}a\u{1e}ok\u{1e}0\n2\u{1e}b\u{1e}half";
        let entries = replay(raw.as_bytes(), Path::new("test"));
        assert_eq!(entries, vec![entry(1, "a", "ok", 0)]);
    }

    #[test]
    fn test_replay_later_record_supersedes_in_place() {
        let raw = "1\u{1e}a\u{1e}first\u{1e}0\n\
                   2\u{1e}b\u{1e}second\u{1e}0\n\
                   1\u{1e}a\u{1e}first\u{1e}1\n\
                   1\u{1e}a\u{1e}first\u{1e}2\n";
        let entries = replay(raw.as_bytes(), Path::new("test"));
        assert_eq!(
            entries,
            vec![entry(1, "a", "first", 2), entry(2, "b", "second", 0)]
        );
    }

    #[test]
    fn test_replay_drops_fenced_torn_lines() {
        let mut raw = b"1\x1ea\x1eok\x1e0\n".to_vec();
        // Torn write missing only its newline.
        raw.extend_from_slice(b"2\x1eb\x1elost\x1e0");
        raw.extend_from_slice(TORN_FENCE);
        raw.extend_from_slice(b"3\x1ec\x1ekept\x1e1\n");
        // Write that landed in full before its append reported failure.
        raw.extend_from_slice(TORN_FENCE);
        raw.extend_from_slice(b"4\x1ed\x1elast\x1e0\n");

        let entries = replay(&raw, Path::new("test"));
        assert_eq!(
            entries,
            vec![
                entry(1, "a", "ok", 0),
                entry(3, "c", "kept", 1),
                entry(4, "d", "last", 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_timed_out_append_does_not_corrupt_later_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatLog");
        let mut store = ChatLogStore::open(&path, TIMEOUT).await.unwrap();

        store.set_io_timeout(Duration::ZERO);
        let _ = store.append(&entry(1, "a", "maybe", 0)).await;
        store.set_io_timeout(TIMEOUT);
        store.append(&entry(2, "b", "sure", 0)).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.last(), Some(&entry(2, "b", "sure", 0)));
        assert!(loaded.iter().all(|e| e.id == 2 || e == &entry(1, "a", "maybe", 0)));
    }

    #[test]
    fn test_replay_accepts_crlf() {
        let raw = "1\u{1e}a\u{1e}ok\u{1e}5\r\n";
        let entries = replay(raw.as_bytes(), Path::new("test"));
        assert_eq!(entries, vec![entry(1, "a", "ok", 5)]);
    }
}
