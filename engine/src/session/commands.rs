//! Session console commands
//!
//! Output for `--list-sessions` and the in-loop `!session ...` commands, plus
//! the history replay shown when a session is resumed. Everything writes to
//! a caller-supplied sink so the interactive loop can be driven in tests.

use std::io::{self, Write};
use std::path::Path;

use super::store::{get_session_info, list_available_sessions};
use crate::llm::{Message, MessageRole};
use crate::repl::render;

/// Messages replayed when resuming a session
pub const DEFAULT_DISPLAY_LIMIT: usize = 10;

const NOT_ENABLED: &str = "Error: Session management not enabled.";

/// Handle `--list-sessions`
pub fn list_sessions_command(base_path: Option<&Path>, out: &mut dyn Write) -> io::Result<()> {
    let Some(base_path) = base_path else {
        writeln!(
            out,
            "{} Use --session-path or set STRANDS_SESSION_PATH environment variable.",
            NOT_ENABLED
        )?;
        return Ok(());
    };

    write_session_list(base_path, None, out)
}

/// Handle an in-loop session command (`session info`, `session list`, ...).
///
/// Returns `false` when the command is not a session command at all.
pub fn handle_session_command(
    command: &str,
    session_id: Option<&str>,
    base_path: Option<&Path>,
    out: &mut dyn Write,
) -> io::Result<bool> {
    match (command, session_id, base_path) {
        ("session info", Some(id), Some(base)) => {
            if let Some(info) = get_session_info(id, base) {
                writeln!(out, "Session ID: {}", info.session_id)?;
                writeln!(out, "Created: {}", info.created_display())?;
                writeln!(out, "Total messages: {}", info.total_messages)?;
            }
            Ok(true)
        }
        ("session list", _, Some(base)) => {
            write_session_list(base, session_id, out)?;
            Ok(true)
        }
        _ if command.starts_with("session ") => {
            if base_path.is_some() {
                writeln!(out, "Available session commands:")?;
                writeln!(out, "  !session info  - Show current session details")?;
                writeln!(out, "  !session list  - List all available sessions")?;
            } else {
                writeln!(out, "{}", NOT_ENABLED)?;
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn write_session_list(
    base_path: &Path,
    current: Option<&str>,
    out: &mut dyn Write,
) -> io::Result<()> {
    let sessions = list_available_sessions(Some(base_path));
    if sessions.is_empty() {
        writeln!(out, "No sessions found.")?;
        return Ok(());
    }

    writeln!(out, "Available sessions:")?;
    for id in sessions {
        let Some(info) = get_session_info(&id, base_path) else {
            continue;
        };
        let marker = if current == Some(id.as_str()) {
            " (current)"
        } else {
            ""
        };
        writeln!(
            out,
            "  {} (created: {}, messages: {}){}",
            id,
            info.created_display(),
            info.total_messages,
            marker
        )?;
    }
    Ok(())
}

/// Bookkeeping the agent records around tool calls: the `{"function": ...}`
/// announcement and the `agent.tool.X direct tool call.` user line
fn is_tool_call_record(message: &Message) -> bool {
    let content = message.content.trim();
    match message.role {
        MessageRole::Assistant => serde_json::from_str::<serde_json::Value>(content)
            .map(|v| v.get("function").is_some())
            .unwrap_or(false),
        MessageRole::User => {
            content.starts_with("agent.tool.") && content.contains(" direct tool call.")
        }
        MessageRole::System | MessageRole::Tool => true,
    }
}

/// Replay the tail of a resumed conversation
pub fn display_agent_history(
    messages: &[Message],
    session_id: &str,
    out: &mut dyn Write,
) -> io::Result<()> {
    if messages.is_empty() {
        return Ok(());
    }

    let subtitle = if messages.len() > DEFAULT_DISPLAY_LIMIT {
        format!(
            "{} previous messages not shown",
            messages.len() - DEFAULT_DISPLAY_LIMIT
        )
    } else {
        format!("Showing all {} messages", messages.len())
    };

    writeln!(out)?;
    render::panel(
        out,
        &format!("Resuming session: {}", session_id),
        Some(&subtitle),
    )?;
    writeln!(out)?;

    let start = messages.len().saturating_sub(DEFAULT_DISPLAY_LIMIT);
    for message in messages[start..].iter().filter(|m| !is_tool_call_record(m)) {
        match message.role {
            MessageRole::User => {
                writeln!(out, "~ {}", message.content)?;
                writeln!(out)?;
            }
            MessageRole::Assistant => {
                writeln!(out, "{}", message.content)?;
                writeln!(out)?;
            }
            MessageRole::System | MessageRole::Tool => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::manager::{FileSessionManager, DEFAULT_AGENT_ID};
    use tempfile::TempDir;

    fn run<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_list_without_base_path() {
        let out = run(|o| list_sessions_command(None, o));
        assert!(out.contains("Session management not enabled"));
        assert!(out.contains("STRANDS_SESSION_PATH"));
    }

    #[test]
    fn test_list_empty() {
        let tmp = TempDir::new().unwrap();
        let out = run(|o| list_sessions_command(Some(tmp.path()), o));
        assert_eq!(out.trim(), "No sessions found.");
    }

    #[test]
    fn test_list_shows_counts() {
        let tmp = TempDir::new().unwrap();
        let manager = FileSessionManager::new(Some("one"), tmp.path()).unwrap();
        manager
            .append_message(DEFAULT_AGENT_ID, &Message::user("hi"))
            .unwrap();
        FileSessionManager::new(Some("two"), tmp.path()).unwrap();

        let out = run(|o| list_sessions_command(Some(tmp.path()), o));
        assert!(out.starts_with("Available sessions:"));
        assert!(out.contains("  one (created: "));
        assert!(out.contains("messages: 1)"));
        assert!(out.find("one").unwrap() < out.find("two").unwrap());
    }

    #[test]
    fn test_history_skips_tool_call_records() {
        let messages = vec![
            Message::user("what is here?"),
            Message::user("agent.tool.retrieve direct tool call.\nInput parameters: {}"),
            Message::assistant(r#"{"function":"retrieve","arguments":{"text":"x"}}"#),
            Message::tool_result("no results", "direct_1"),
            Message::assistant("Nothing stored yet."),
            Message::user("!ls"),
            Message::assistant(r#"{"function":"shell","arguments":{"command":"ls"}}"#),
        ];

        let out = run(|o| display_agent_history(&messages, "s1", o));
        assert!(out.contains("Showing all 7 messages"));
        assert!(out.contains("~ what is here?"));
        assert!(out.contains("Nothing stored yet."));
        assert!(out.contains("~ !ls"));
        assert!(!out.contains("direct tool call"));
        assert!(!out.contains("\"function\""));
        assert!(!out.contains("no results"));
    }

    #[test]
    fn test_history_shows_only_the_tail() {
        let messages: Vec<Message> = (0..12).map(|i| Message::user(format!("m{}", i))).collect();
        let out = run(|o| display_agent_history(&messages, "s1", o));
        assert!(out.contains("2 previous messages not shown"));
        assert!(!out.contains("~ m1\n"));
        assert!(out.contains("~ m2\n"));
        assert!(out.contains("~ m11\n"));
    }

    #[test]
    fn test_session_info_command() {
        let tmp = TempDir::new().unwrap();
        FileSessionManager::new(Some("cur"), tmp.path()).unwrap();

        let mut buf = Vec::new();
        let handled =
            handle_session_command("session info", Some("cur"), Some(tmp.path()), &mut buf)
                .unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(handled);
        assert!(out.contains("Session ID: cur"));
        assert!(out.contains("Total messages: 0"));
    }

    #[test]
    fn test_session_list_marks_current() {
        let tmp = TempDir::new().unwrap();
        FileSessionManager::new(Some("a"), tmp.path()).unwrap();
        FileSessionManager::new(Some("b"), tmp.path()).unwrap();

        let mut buf = Vec::new();
        handle_session_command("session list", Some("b"), Some(tmp.path()), &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        let b_line = out.lines().find(|l| l.trim_start().starts_with("b ")).unwrap();
        assert!(b_line.ends_with("(current)"));
        let a_line = out.lines().find(|l| l.trim_start().starts_with("a ")).unwrap();
        assert!(!a_line.contains("(current)"));
    }

    #[test]
    fn test_unknown_session_command_shows_help() {
        let tmp = TempDir::new().unwrap();
        let mut buf = Vec::new();
        let handled =
            handle_session_command("session purge", None, Some(tmp.path()), &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(handled);
        assert!(out.contains("!session info"));
        assert!(out.contains("!session list"));
    }

    #[test]
    fn test_session_command_without_base_path() {
        let mut buf = Vec::new();
        let handled = handle_session_command("session list", None, None, &mut buf).unwrap();
        assert!(handled);
        assert!(String::from_utf8(buf)
            .unwrap()
            .contains("Session management not enabled."));
    }

    #[test]
    fn test_non_session_command_not_handled() {
        let mut buf = Vec::new();
        let handled = handle_session_command("ls -la", None, None, &mut buf).unwrap();
        assert!(!handled);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_history_shows_last_ten() {
        let messages: Vec<Message> = (0..14)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("question {}", i))
                } else {
                    Message::assistant(format!("answer {}", i))
                }
            })
            .collect();

        let out = run(|o| display_agent_history(&messages, "sid", o));
        assert!(out.contains("Resuming session: sid"));
        assert!(out.contains("4 previous messages not shown"));
        assert!(!out.contains("question 2\n"));
        assert!(out.contains("~ question 4"));
        assert!(out.contains("answer 13"));
    }

    #[test]
    fn test_history_short_conversation() {
        let messages = vec![Message::user("hello"), Message::assistant("hi")];
        let out = run(|o| display_agent_history(&messages, "sid", o));
        assert!(out.contains("Showing all 2 messages"));
        assert!(out.contains("~ hello"));
    }
}
