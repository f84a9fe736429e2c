//! Session Lifecycle Controller
//!
//! Decides whether an invocation resumes an existing session or starts a new
//! one, and opens the persistence handle. Problems are reported through
//! [`SessionSetup::Unavailable`] so the CLI keeps running without sessions
//! while still being able to say why.

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::manager::FileSessionManager;
use super::store::{session_exists, sessions_directory, validate_session_id, validate_session_path};
use sdk::errors::EngineError;

/// Outcome of session setup
#[derive(Debug, Clone)]
pub enum SessionSetup {
    /// No base path configured
    Disabled,

    /// A base path was configured but the session could not be opened
    Unavailable { reason: String },

    Active {
        manager: Arc<FileSessionManager>,
        session_id: String,
        is_resuming: bool,
    },
}

impl SessionSetup {
    pub fn manager(&self) -> Option<Arc<FileSessionManager>> {
        match self {
            Self::Active { manager, .. } => Some(Arc::clone(manager)),
            _ => None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Active { session_id, .. } => Some(session_id),
            _ => None,
        }
    }

    pub fn is_resuming(&self) -> bool {
        matches!(self, Self::Active { is_resuming: true, .. })
    }

    /// Flatten into `(handle, resolved id, is_resuming)`
    pub fn into_parts(self) -> (Option<Arc<FileSessionManager>>, Option<String>, bool) {
        match self {
            Self::Active {
                manager,
                session_id,
                is_resuming,
            } => (Some(manager), Some(session_id), is_resuming),
            _ => (None, None, false),
        }
    }
}

/// Open a session manager after validating the base path and id.
///
/// Creates the sessions directory as a side effect.
pub fn create_session_manager(
    session_id: Option<&str>,
    base_path: &Path,
) -> Result<FileSessionManager, EngineError> {
    validate_session_path(base_path)?;
    if let Some(id) = session_id {
        if let Err(e) = validate_session_id(id) {
            warn!("Invalid session ID provided: {}", id);
            return Err(e);
        }
    }

    let dir = sessions_directory(Some(base_path), true)
        .ok_or_else(|| EngineError::Session("no sessions directory".to_string()))?;
    FileSessionManager::new(session_id, &dir)
}

/// Resolve the session for this invocation
pub fn setup_session_management(
    requested_session_id: Option<&str>,
    base_path: Option<&Path>,
) -> SessionSetup {
    let Some(base_path) = base_path else {
        return SessionSetup::Disabled;
    };

    let is_resuming = requested_session_id
        .map(|id| session_exists(id, base_path))
        .unwrap_or(false);

    match create_session_manager(requested_session_id, base_path) {
        Ok(manager) => {
            // The backend may normalize the id; trust what it reports.
            let session_id = manager.session_id().to_string();
            info!(
                "Session {} ({})",
                session_id,
                if is_resuming { "resuming" } else { "new" }
            );
            SessionSetup::Active {
                manager: Arc::new(manager),
                session_id,
                is_resuming,
            }
        }
        Err(e) => {
            warn!("Session management unavailable: {}", e);
            SessionSetup::Unavailable {
                reason: e.to_string(),
            }
        }
    }
}
