//! File-backed chat store
//!
//! Layout under the data directory:
//! - `messages.jsonl`: one `ChatMessage` per line, appended
//! - `history.json`: the history mirror, rewritten on every save
//! - `usage.json`: the usage record, rewritten on every save

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use danya_agent::store::HistoryRecord;
use danya_agent::{ChatMessage, ChatStore, ConversationTurn, Error, Result, UsageStats};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const MESSAGES_FILE: &str = "messages.jsonl";
const HISTORY_FILE: &str = "history.json";
const USAGE_FILE: &str = "usage.json";

pub struct FileStore {
    dir: PathBuf,
}

fn store_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Store(format!("{}: {}", context, e))
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| store_err("create data dir", e))
    }

    async fn read_optional(&self, name: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path(name)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(store_err(name, e)),
        }
    }

    /// Write to a temp file, then rename over the target
    async fn write_atomic(&self, name: &str, content: &str) -> Result<()> {
        self.ensure_dir().await?;
        let tmp = self.path(&format!("{}.tmp", name));
        fs::write(&tmp, content)
            .await
            .map_err(|e| store_err(name, e))?;
        fs::rename(&tmp, self.path(name))
            .await
            .map_err(|e| store_err(name, e))
    }

    async fn load_records(&self) -> Result<Vec<HistoryRecord>> {
        let Some(content) = self.read_optional(HISTORY_FILE).await? else {
            return Ok(Vec::new());
        };
        let mut records: Vec<HistoryRecord> =
            serde_json::from_str(&content).map_err(|e| store_err(HISTORY_FILE, e))?;
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn remove_if_exists(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(store_err(name, e)),
        }
    }
}

#[async_trait]
impl ChatStore for FileStore {
    async fn append_message(&self, message: &ChatMessage) -> Result<()> {
        self.ensure_dir().await?;
        let mut line =
            serde_json::to_string(message).map_err(|e| store_err(MESSAGES_FILE, e))?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(MESSAGES_FILE))
            .await
            .map_err(|e| store_err(MESSAGES_FILE, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| store_err(MESSAGES_FILE, e))?;
        file.flush().await.map_err(|e| store_err(MESSAGES_FILE, e))
    }

    async fn load_messages(&self) -> Result<Vec<ChatMessage>> {
        let Some(content) = self.read_optional(MESSAGES_FILE).await? else {
            return Ok(Vec::new());
        };

        let mut messages = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ChatMessage>(line) {
                Ok(msg) => messages.push(msg),
                // A torn last line from an interrupted write
                Err(e) => tracing::warn!(line = lineno + 1, "Skipping unreadable message: {}", e),
            }
        }
        Ok(messages)
    }

    async fn save_history(&self, turns: &[ConversationTurn]) -> Result<()> {
        // An unreadable mirror only costs the old timestamps
        let previous = self.load_records().await.unwrap_or_default();
        let records = HistoryRecord::merge(&previous, turns);
        let json =
            serde_json::to_string_pretty(&records).map_err(|e| store_err(HISTORY_FILE, e))?;
        self.write_atomic(HISTORY_FILE, &json).await
    }

    async fn load_history(&self) -> Result<Vec<ConversationTurn>> {
        let records = self.load_records().await?;
        Ok(records.into_iter().map(|r| r.turn).collect())
    }

    async fn save_usage(&self, stats: &UsageStats) -> Result<()> {
        let json = serde_json::to_string_pretty(stats).map_err(|e| store_err(USAGE_FILE, e))?;
        self.write_atomic(USAGE_FILE, &json).await
    }

    async fn load_usage(&self) -> Result<Option<UsageStats>> {
        let Some(content) = self.read_optional(USAGE_FILE).await? else {
            return Ok(None);
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| store_err(USAGE_FILE, e))
    }

    async fn clear_all(&self) -> Result<()> {
        self.remove_if_exists(MESSAGES_FILE).await?;
        self.remove_if_exists(HISTORY_FILE).await?;
        self.remove_if_exists(USAGE_FILE).await
    }
}
