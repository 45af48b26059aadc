//! Persistence of whole conversations.
//!
//! The chat UI itself stores nothing; the screen saves sessions through a
//! [`ChatHistory`] so a conversation can be resumed later.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::config::data::path_display;
use crate::core::constants::CHAT_TITLE_MAX_CHARS;
use crate::core::message::{Message, MessageStore};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        ChatId(id.into())
    }

    pub fn generate() -> Self {
        ChatId(format!("chat-{}", Utc::now().timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Ids end up as file names, so only a conservative alphabet is allowed.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: ChatId,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(messages: Vec<Message>) -> Self {
        let now = Utc::now();
        let mut session = Self {
            id: ChatId::generate(),
            title: String::new(),
            messages,
            created_at: now,
            updated_at: now,
        };
        session.refresh_title();
        session
    }

    /// Titles come from the first user message.
    pub fn refresh_title(&mut self) {
        self.title = self
            .messages
            .iter()
            .find(|m| m.role.is_user() && !m.content.trim().is_empty())
            .map(|m| derive_title(&m.content))
            .unwrap_or_else(|| "New chat".to_string());
    }

    pub fn push(&mut self, message: Message) {
        let mut store = MessageStore::from_messages(std::mem::take(&mut self.messages));
        store.push(message);
        self.messages = store.into_vec();
        if self.title == "New chat" {
            self.refresh_title();
        }
        self.updated_at = Utc::now();
    }
}

fn derive_title(content: &str) -> String {
    let trimmed = content.trim();
    let mut title: String = trimmed.chars().take(CHAT_TITLE_MAX_CHARS).collect();
    if trimmed.chars().count() > CHAT_TITLE_MAX_CHARS {
        title.push('…');
    }
    title
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatSummary {
    pub id: ChatId,
    pub title: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&ChatSession> for ChatSummary {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            message_count: session.messages.len(),
            updated_at: session.updated_at,
        }
    }
}

#[derive(Debug)]
pub enum HistoryError {
    NotFound(ChatId),
    InvalidId(ChatId),
    Io { path: PathBuf, source: io::Error },
    Json { path: PathBuf, source: serde_json::Error },
    NoDataDir,
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::NotFound(id) => write!(f, "Chat '{id}' not found"),
            HistoryError::InvalidId(id) => write!(f, "Invalid chat id '{id}'"),
            HistoryError::Io { path, source } => {
                write!(f, "Chat history I/O error at {}: {}", path_display(path), source)
            }
            HistoryError::Json { path, source } => {
                write!(f, "Corrupt chat file {}: {}", path_display(path), source)
            }
            HistoryError::NoDataDir => write!(f, "Could not determine a data directory"),
        }
    }
}

impl std::error::Error for HistoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HistoryError::Io { source, .. } => Some(source),
            HistoryError::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[async_trait]
pub trait ChatHistory: Send + Sync {
    async fn save_chat(&self, session: &ChatSession) -> Result<ChatId, HistoryError>;

    async fn get_chat(&self, id: &ChatId) -> Result<ChatSession, HistoryError>;

    /// Most recently updated first.
    async fn list_chats(&self) -> Result<Vec<ChatSummary>, HistoryError>;

    async fn update_chat(&self, session: &ChatSession) -> Result<(), HistoryError>;

    async fn delete_chat(&self, id: &ChatId) -> Result<(), HistoryError>;

    async fn add_message(&self, id: &ChatId, message: Message) -> Result<ChatSession, HistoryError> {
        let mut session = self.get_chat(id).await?;
        session.push(message);
        self.update_chat(&session).await?;
        Ok(session)
    }
}

fn sort_summaries(summaries: &mut [ChatSummary]) {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| b.id.cmp(&a.id)));
}

/// Process-local history, used for throwaway sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryChatHistory {
    chats: Mutex<HashMap<ChatId, ChatSession>>,
}

impl MemoryChatHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatHistory for MemoryChatHistory {
    async fn save_chat(&self, session: &ChatSession) -> Result<ChatId, HistoryError> {
        let mut chats = self.chats.lock().await;
        let mut session = session.clone();
        let base = session.id.clone();
        let mut suffix = 1;
        while chats.contains_key(&session.id) {
            session.id = ChatId::new(format!("{base}-{suffix}"));
            suffix += 1;
        }
        let id = session.id.clone();
        chats.insert(id.clone(), session);
        Ok(id)
    }

    async fn get_chat(&self, id: &ChatId) -> Result<ChatSession, HistoryError> {
        let chats = self.chats.lock().await;
        chats
            .get(id)
            .cloned()
            .ok_or_else(|| HistoryError::NotFound(id.clone()))
    }

    async fn list_chats(&self) -> Result<Vec<ChatSummary>, HistoryError> {
        let chats = self.chats.lock().await;
        let mut summaries: Vec<ChatSummary> = chats.values().map(ChatSummary::from).collect();
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    async fn update_chat(&self, session: &ChatSession) -> Result<(), HistoryError> {
        let mut chats = self.chats.lock().await;
        match chats.get_mut(&session.id) {
            Some(existing) => {
                *existing = session.clone();
                Ok(())
            }
            None => Err(HistoryError::NotFound(session.id.clone())),
        }
    }

    async fn delete_chat(&self, id: &ChatId) -> Result<(), HistoryError> {
        let mut chats = self.chats.lock().await;
        chats
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| HistoryError::NotFound(id.clone()))
    }
}

/// One pretty-printed JSON file per chat inside a directory.
#[derive(Debug, Clone)]
pub struct JsonChatHistory {
    dir: PathBuf,
}

impl JsonChatHistory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// History stored under the platform data directory.
    pub fn from_default_location() -> Result<Self, HistoryError> {
        let dirs = crate::core::config::io::project_dirs().ok_or(HistoryError::NoDataDir)?;
        Ok(Self::new(dirs.data_dir().join("chats")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &ChatId) -> Result<PathBuf, HistoryError> {
        if !id.is_valid() {
            return Err(HistoryError::InvalidId(id.clone()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    fn read(&self, id: &ChatId) -> Result<ChatSession, HistoryError> {
        let path = self.path_for(id)?;
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(HistoryError::NotFound(id.clone()))
            }
            Err(source) => return Err(HistoryError::Io { path, source }),
        };
        serde_json::from_str(&contents).map_err(|source| HistoryError::Json { path, source })
    }

    fn write(&self, session: &ChatSession) -> Result<(), HistoryError> {
        let path = self.path_for(&session.id)?;
        let io_err = |source| HistoryError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;

        let contents = serde_json::to_string_pretty(session).map_err(|source| HistoryError::Json {
            path: path.clone(),
            source,
        })?;
        let mut temp_file = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        temp_file.write_all(contents.as_bytes()).map_err(io_err)?;
        temp_file.as_file_mut().sync_all().map_err(io_err)?;
        temp_file.persist(&path).map_err(|err| io_err(err.error))?;
        debug!(id = %session.id, path = %path_display(&path), "chat saved");
        Ok(())
    }
}

impl JsonChatHistory {
    /// Runs synchronous file work on tokio's blocking pool.
    async fn run_blocking<T, F>(&self, op: F) -> Result<T, HistoryError>
    where
        T: Send + 'static,
        F: FnOnce(&JsonChatHistory) -> Result<T, HistoryError> + Send + 'static,
    {
        let history = self.clone();
        tokio::task::spawn_blocking(move || op(&history))
            .await
            .map_err(|err| HistoryError::Io {
                path: self.dir.clone(),
                source: io::Error::other(err),
            })?
    }

    fn save_new(&self, mut session: ChatSession) -> Result<ChatId, HistoryError> {
        // A second chat created in the same millisecond must not overwrite
        // the first one.
        let base = session.id.clone();
        let mut suffix = 1;
        while self.path_for(&session.id)?.exists() {
            session.id = ChatId::new(format!("{base}-{suffix}"));
            suffix += 1;
        }
        self.write(&session)?;
        Ok(session.id)
    }

    fn summaries(&self) -> Result<Vec<ChatSummary>, HistoryError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(HistoryError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut summaries = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match self.read(&ChatId::new(stem)) {
                Ok(session) => summaries.push(ChatSummary::from(&session)),
                Err(err) => tracing::warn!("skipping unreadable chat: {err}"),
            }
        }
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    fn overwrite(&self, session: &ChatSession) -> Result<(), HistoryError> {
        if !self.path_for(&session.id)?.exists() {
            return Err(HistoryError::NotFound(session.id.clone()));
        }
        self.write(session)
    }

    fn remove(&self, id: &ChatId) -> Result<(), HistoryError> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(HistoryError::NotFound(id.clone())),
            Err(source) => Err(HistoryError::Io { path, source }),
        }
    }
}

#[async_trait]
impl ChatHistory for JsonChatHistory {
    async fn save_chat(&self, session: &ChatSession) -> Result<ChatId, HistoryError> {
        let session = session.clone();
        self.run_blocking(move |history| history.save_new(session)).await
    }

    async fn get_chat(&self, id: &ChatId) -> Result<ChatSession, HistoryError> {
        let id = id.clone();
        self.run_blocking(move |history| history.read(&id)).await
    }

    async fn list_chats(&self) -> Result<Vec<ChatSummary>, HistoryError> {
        self.run_blocking(|history| history.summaries()).await
    }

    async fn update_chat(&self, session: &ChatSession) -> Result<(), HistoryError> {
        let session = session.clone();
        self.run_blocking(move |history| history.overwrite(&session)).await
    }

    async fn delete_chat(&self, id: &ChatId) -> Result<(), HistoryError> {
        let id = id.clone();
        self.run_blocking(move |history| history.remove(&id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{MessageKey, Role};
    use tempfile::TempDir;

    fn sample_session() -> ChatSession {
        ChatSession::new(vec![
            Message::new(Role::User, "What is ibuprofen?", MessageKey(1000)),
            Message::new(Role::Assistant, "It is a pain reliever.", MessageKey(2000)),
        ])
    }

    #[test]
    fn title_comes_from_first_user_message() {
        let session = sample_session();
        assert_eq!(session.title, "What is ibuprofen?");

        let long = "a".repeat(80);
        let session = ChatSession::new(vec![Message::new(Role::User, long, MessageKey(1))]);
        assert_eq!(session.title.chars().count(), CHAT_TITLE_MAX_CHARS + 1);
        assert!(session.title.ends_with('…'));

        let mut empty = ChatSession::new(Vec::new());
        assert_eq!(empty.title, "New chat");
        empty.push(Message::new(Role::User, "Is aspirin safe?", MessageKey(5)));
        assert_eq!(empty.title, "Is aspirin safe?");
    }

    #[test]
    fn rejects_ids_that_escape_the_directory() {
        assert!(ChatId::new("chat-1700000000000").is_valid());
        assert!(!ChatId::new("../etc/passwd").is_valid());
        assert!(!ChatId::new("").is_valid());
    }

    #[tokio::test]
    async fn memory_history_crud() {
        let history = MemoryChatHistory::new();
        let session = sample_session();
        let id = history.save_chat(&session).await.expect("save");

        let updated = history
            .add_message(&id, Message::new(Role::User, "Any side effects?", MessageKey(2000)))
            .await
            .expect("add");
        assert_eq!(updated.messages.len(), 3);
        assert_eq!(updated.messages[2].timestamp, MessageKey(2001));

        let listed = history.list_chats().await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].message_count, 3);

        history.delete_chat(&id).await.expect("delete");
        assert!(matches!(history.get_chat(&id).await, Err(HistoryError::NotFound(_))));
        assert!(matches!(history.delete_chat(&id).await, Err(HistoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn json_history_persists_across_instances() {
        let temp_dir = TempDir::new().expect("temp dir");
        let history = JsonChatHistory::new(temp_dir.path().join("chats"));
        let session = sample_session();
        let id = history.save_chat(&session).await.expect("save");

        let reopened = JsonChatHistory::new(temp_dir.path().join("chats"));
        let loaded = reopened.get_chat(&id).await.expect("get");
        assert_eq!(loaded.messages, session.messages);
        assert_eq!(loaded.title, session.title);

        reopened
            .add_message(&id, Message::new(Role::User, "Thanks", MessageKey(3000)))
            .await
            .expect("add");
        let summaries = history.list_chats().await.expect("list");
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].message_count, 3);

        let raw = std::fs::read_to_string(temp_dir.path().join("chats").join(format!("{id}.json")))
            .expect("raw file");
        assert!(raw.contains("\"createdAt\""));
        assert!(raw.contains("\"timestamp\": 1000"));
    }

    #[tokio::test]
    async fn json_history_reports_missing_chats() {
        let temp_dir = TempDir::new().expect("temp dir");
        let history = JsonChatHistory::new(temp_dir.path());
        let missing = ChatId::new("chat-1");

        assert!(matches!(history.get_chat(&missing).await, Err(HistoryError::NotFound(_))));
        assert!(matches!(history.delete_chat(&missing).await, Err(HistoryError::NotFound(_))));
        let session = ChatSession {
            id: missing.clone(),
            ..sample_session()
        };
        assert!(matches!(history.update_chat(&session).await, Err(HistoryError::NotFound(_))));
        assert!(history.list_chats().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn json_history_skips_foreign_and_corrupt_files() {
        let temp_dir = TempDir::new().expect("temp dir");
        let history = JsonChatHistory::new(temp_dir.path());
        history.save_chat(&sample_session()).await.expect("save");
        std::fs::write(temp_dir.path().join("notes.txt"), "hi").expect("write");
        std::fs::write(temp_dir.path().join("broken.json"), "{").expect("write");

        let summaries = history.list_chats().await.expect("list");
        assert_eq!(summaries.len(), 1);
        assert!(matches!(
            history.get_chat(&ChatId::new("broken")).await,
            Err(HistoryError::Json { .. })
        ));
    }

    #[tokio::test]
    async fn json_history_yields_to_the_runtime_while_writing() {
        let temp_dir = TempDir::new().expect("temp dir");
        let history = JsonChatHistory::new(temp_dir.path());
        let session = sample_session();

        let save = history.save_chat(&session);
        tokio::pin!(save);
        let finished_in_first_poll = tokio::select! {
            biased;
            _ = &mut save => true,
            _ = tokio::task::yield_now() => false,
        };
        assert!(!finished_in_first_poll);

        let id = save.await.expect("save");
        assert_eq!(history.get_chat(&id).await.expect("get").messages, session.messages);
    }
}
