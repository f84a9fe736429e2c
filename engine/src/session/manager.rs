//! File-backed session persistence
//!
//! Owns one session directory and appends every conversation message to it:
//!
//! ```text
//! session_<id>/session.json
//! session_<id>/agents/agent_<agent>/agent.json
//! session_<id>/agents/agent_<agent>/messages/message_<n>.json
//! ```
//!
//! Message files are numbered densely from zero so the history can be
//! reloaded in order on resume.

use chrono::Utc;
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use super::store::{generate_session_id, session_dir, validate_session_id, SESSION_MARKER};
use crate::llm::Message;

/// Agent id used when the CLI runs its single agent
pub const DEFAULT_AGENT_ID: &str = "default";

#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    session_id: String,
    session_type: String,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AgentRecord {
    agent_id: String,
    created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct MessageRecord {
    message: Message,
    message_id: usize,
    created_at: String,
}

/// Persists the messages of one session under a base directory
#[derive(Debug)]
pub struct FileSessionManager {
    session_id: String,
    dir: PathBuf,
    /// Serializes message numbering between concurrent appends
    write_lock: Mutex<()>,
}

impl FileSessionManager {
    /// Open the session, creating its directory and marker when absent.
    ///
    /// Without an id a fresh one is generated.
    pub fn new(session_id: Option<&str>, base_path: &Path) -> Result<Self, EngineError> {
        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => generate_session_id(),
        };
        validate_session_id(&session_id)?;

        let dir = session_dir(base_path, &session_id);
        fs::create_dir_all(&dir)?;

        let marker = dir.join(SESSION_MARKER);
        if !marker.is_file() {
            let now = Utc::now().to_rfc3339();
            let record = SessionRecord {
                session_id: session_id.clone(),
                session_type: "AGENT".to_string(),
                created_at: now.clone(),
                updated_at: now,
            };
            write_json(&marker, &record)?;
            info!("Created session {} at {}", session_id, dir.display());
        } else {
            debug!("Opened existing session {}", session_id);
        }

        Ok(Self {
            session_id,
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn agent_dir(&self, agent_id: &str) -> PathBuf {
        self.dir.join("agents").join(format!("agent_{}", agent_id))
    }

    fn messages_dir(&self, agent_id: &str) -> PathBuf {
        self.agent_dir(agent_id).join("messages")
    }

    /// Append one message to the agent's history
    pub fn append_message(&self, agent_id: &str, message: &Message) -> Result<(), EngineError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| EngineError::Session("session write lock poisoned".to_string()))?;

        let agent_dir = self.agent_dir(agent_id);
        let messages_dir = self.messages_dir(agent_id);
        fs::create_dir_all(&messages_dir)?;

        let agent_file = agent_dir.join("agent.json");
        if !agent_file.is_file() {
            write_json(
                &agent_file,
                &AgentRecord {
                    agent_id: agent_id.to_string(),
                    created_at: Utc::now().to_rfc3339(),
                },
            )?;
        }

        let message_id = next_message_index(&messages_dir)?;
        let record = MessageRecord {
            message: message.clone(),
            message_id,
            created_at: Utc::now().to_rfc3339(),
        };
        write_json(
            &messages_dir.join(format!("message_{}.json", message_id)),
            &record,
        )
    }

    /// Load the agent's persisted history in append order
    pub fn load_messages(&self, agent_id: &str) -> Result<Vec<Message>, EngineError> {
        let messages_dir = self.messages_dir(agent_id);
        if !messages_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut indexed = Vec::new();
        for entry in fs::read_dir(&messages_dir)? {
            let path = entry?.path();
            let Some(index) = message_index(&path) else {
                continue;
            };
            let raw = fs::read_to_string(&path)?;
            let record: MessageRecord = serde_json::from_str(&raw).map_err(|e| {
                EngineError::Session(format!("corrupt message file {}: {}", path.display(), e))
            })?;
            indexed.push((index, record.message));
        }

        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, message)| message).collect())
    }
}

fn message_index(path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix("message_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

fn next_message_index(dir: &Path) -> Result<usize, EngineError> {
    let mut next = 0;
    for entry in fs::read_dir(dir)? {
        if let Some(index) = message_index(&entry?.path()) {
            next = next.max(index + 1);
        }
    }
    Ok(next)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), EngineError> {
    let body = serde_json::to_string_pretty(value)
        .map_err(|e| EngineError::Session(format!("failed to encode {}: {}", path.display(), e)))?;
    fs::write(path, body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::{get_session_info, session_exists};
    use tempfile::TempDir;

    #[test]
    fn test_new_creates_marker() {
        let tmp = TempDir::new().unwrap();
        let manager = FileSessionManager::new(Some("fresh"), tmp.path()).unwrap();
        assert_eq!(manager.session_id(), "fresh");
        assert!(session_exists("fresh", tmp.path()));
    }

    #[test]
    fn test_new_generates_id() {
        let tmp = TempDir::new().unwrap();
        let manager = FileSessionManager::new(None, tmp.path()).unwrap();
        assert!(manager.session_id().starts_with("strands-"));
        assert!(session_exists(manager.session_id(), tmp.path()));
    }

    #[test]
    fn test_new_rejects_unsafe_id() {
        let tmp = TempDir::new().unwrap();
        let result = FileSessionManager::new(Some("../escape"), tmp.path());
        assert!(matches!(result, Err(EngineError::Session(_))));
    }

    #[test]
    fn test_append_and_reload() {
        let tmp = TempDir::new().unwrap();
        let manager = FileSessionManager::new(Some("chat"), tmp.path()).unwrap();

        manager
            .append_message(DEFAULT_AGENT_ID, &Message::user("hello"))
            .unwrap();
        manager
            .append_message(DEFAULT_AGENT_ID, &Message::assistant("hi there"))
            .unwrap();

        let reopened = FileSessionManager::new(Some("chat"), tmp.path()).unwrap();
        let messages = reopened.load_messages(DEFAULT_AGENT_ID).unwrap();
        assert_eq!(messages, vec![Message::user("hello"), Message::assistant("hi there")]);

        let info = get_session_info("chat", tmp.path()).unwrap();
        assert_eq!(info.total_messages, 2);
    }

    #[test]
    fn test_reload_orders_numerically() {
        let tmp = TempDir::new().unwrap();
        let manager = FileSessionManager::new(Some("many"), tmp.path()).unwrap();
        for i in 0..12 {
            manager
                .append_message(DEFAULT_AGENT_ID, &Message::user(format!("m{}", i)))
                .unwrap();
        }

        let messages = manager.load_messages(DEFAULT_AGENT_ID).unwrap();
        assert_eq!(messages.len(), 12);
        assert_eq!(messages[2].content, "m2");
        assert_eq!(messages[11].content, "m11");
    }

    #[test]
    fn test_load_without_history() {
        let tmp = TempDir::new().unwrap();
        let manager = FileSessionManager::new(Some("empty"), tmp.path()).unwrap();
        assert!(manager.load_messages(DEFAULT_AGENT_ID).unwrap().is_empty());
    }
}
