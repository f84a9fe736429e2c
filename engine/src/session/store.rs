//! Session Directory Store
//!
//! Maps a `(session_id, base_path)` pair onto the on-disk layout:
//!
//! ```text
//! <base_path>/
//!   session_<id>/
//!     session.json              existence marker
//!     agents/<agent>/messages/  one .json file per message
//! ```
//!
//! Every read path degrades to "nothing found". Session ids are validated
//! before any path is built from them, so a hostile id never reaches the
//! filesystem.

use chrono::{DateTime, Local};
use sdk::errors::EngineError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use uuid::Uuid;

/// Directory name prefix for a session
pub const SESSION_PREFIX: &str = "session_";

/// Marker file that makes a session directory count as existing
pub const SESSION_MARKER: &str = "session.json";

const MAX_SESSION_ID_LEN: usize = 255;
const MAX_PATH_LEN: usize = 4096;

/// Summary of one persisted session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub created_at: DateTime<Local>,
    pub total_messages: usize,
    pub path: PathBuf,
}

impl SessionInfo {
    /// Creation time formatted for console output
    pub fn created_display(&self) -> String {
        self.created_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Check that a session id is safe to use as a directory name.
///
/// Rejects empty ids, path separators, `..`, NUL bytes, a leading dot and
/// ids longer than 255 bytes.
pub fn validate_session_id(session_id: &str) -> Result<(), EngineError> {
    if session_id.is_empty() {
        return Err(EngineError::Session("session id is empty".to_string()));
    }

    if session_id.contains(['/', '\\', '\0']) || session_id.contains("..") {
        return Err(EngineError::Session(
            "session id contains path characters".to_string(),
        ));
    }

    if session_id.starts_with('.') {
        return Err(EngineError::Session(
            "session id must not start with '.'".to_string(),
        ));
    }

    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(EngineError::Session(format!(
            "session id longer than {} characters",
            MAX_SESSION_ID_LEN
        )));
    }

    Ok(())
}

/// Check that a base path is usable: non-empty and of sane length
pub fn validate_session_path(path: &Path) -> Result<(), EngineError> {
    let rendered = path.to_string_lossy();
    if rendered.is_empty() {
        return Err(EngineError::Session("session path is empty".to_string()));
    }
    if rendered.len() >= MAX_PATH_LEN {
        return Err(EngineError::Session(format!(
            "session path longer than {} characters",
            MAX_PATH_LEN
        )));
    }
    Ok(())
}

/// Generate a session id of the form `strands-<unix seconds>-<8 hex>`
pub fn generate_session_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let uuid = Uuid::new_v4().simple().to_string();
    format!("strands-{}-{}", timestamp, &uuid[..8])
}

/// Resolve the sessions directory.
///
/// Returns `None` without a base path. With `create`, missing directories
/// are created; a failure to create is logged and the path is still
/// returned.
pub fn sessions_directory(base_path: Option<&Path>, create: bool) -> Option<PathBuf> {
    let base = base_path?;
    let dir = base.to_path_buf();

    if create {
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("Failed to create sessions directory {}: {}", dir.display(), e);
        }
    }

    Some(dir)
}

/// Path of one session's directory. The id must already be validated.
pub(crate) fn session_dir(base_path: &Path, session_id: &str) -> PathBuf {
    base_path.join(format!("{}{}", SESSION_PREFIX, session_id))
}

/// List session ids under the base path, sorted lexicographically.
///
/// Directories without the `session_` prefix, and ids that fail validation,
/// are skipped. Unreadable directories yield an empty list.
pub fn list_available_sessions(base_path: Option<&Path>) -> Vec<String> {
    let Some(base) = base_path else {
        return Vec::new();
    };
    if validate_session_path(base).is_err() {
        return Vec::new();
    }
    let Some(dir) = sessions_directory(Some(base), false) else {
        return Vec::new();
    };
    if !dir.exists() {
        return Vec::new();
    }

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to list sessions in {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut ids: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.strip_prefix(SESSION_PREFIX).map(String::from)
        })
        .filter(|id| validate_session_id(id).is_ok())
        .collect();

    ids.sort();
    ids
}

/// True iff `session_<id>/` exists and holds a `session.json` marker
pub fn session_exists(session_id: &str, base_path: &Path) -> bool {
    if validate_session_id(session_id).is_err() || validate_session_path(base_path).is_err() {
        return false;
    }

    let dir = session_dir(base_path, session_id);
    dir.is_dir() && dir.join(SESSION_MARKER).is_file()
}

/// Gather summary information for an existing session
pub fn get_session_info(session_id: &str, base_path: &Path) -> Option<SessionInfo> {
    if !session_exists(session_id, base_path) {
        return None;
    }

    let dir = session_dir(base_path, session_id);
    match read_session_info(session_id, &dir) {
        Ok(info) => Some(info),
        Err(e) => {
            warn!("Failed to get session info for {}: {}", session_id, e);
            None
        }
    }
}

fn read_session_info(session_id: &str, dir: &Path) -> std::io::Result<SessionInfo> {
    let metadata = fs::metadata(dir)?;
    let created = metadata.created().or_else(|_| metadata.modified())?;

    let mut total_messages = 0;
    let agents_dir = dir.join("agents");
    if agents_dir.is_dir() {
        for agent in fs::read_dir(&agents_dir)? {
            let agent = agent?;
            let messages_dir = agent.path().join("messages");
            if !agent.path().is_dir() || !messages_dir.is_dir() {
                continue;
            }
            total_messages += count_json_files(&messages_dir)?;
        }
    }

    debug!("Session {} has {} messages", session_id, total_messages);

    Ok(SessionInfo {
        session_id: session_id.to_string(),
        created_at: DateTime::<Local>::from(created),
        total_messages,
        path: dir.to_path_buf(),
    })
}

fn count_json_files(dir: &Path) -> std::io::Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            count += 1;
        }
    }
    Ok(count)
}
