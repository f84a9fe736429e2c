//! Session management
//!
//! Sessions are optional: they are active only when a base path is given
//! through `--session-path` or `STRANDS_SESSION_PATH`.

pub mod commands;
pub mod lifecycle;
pub mod manager;
pub mod store;

pub use commands::{display_agent_history, handle_session_command, list_sessions_command};
pub use lifecycle::{create_session_manager, setup_session_management, SessionSetup};
pub use manager::{FileSessionManager, DEFAULT_AGENT_ID};
pub use store::{
    generate_session_id, get_session_info, list_available_sessions, session_exists,
    sessions_directory, validate_session_id, validate_session_path, SessionInfo,
};
