//! Interactive command loop
//!
//! Reads one line at a time and turns it into an exit, a session command,
//! a shell command (`!` prefix) or a query for the agent. A failing line is
//! reported and the loop moves on; only `exit`, `quit`, Ctrl-C or end of
//! input end it.

pub mod render;

use serde_json::json;
use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

use crate::agent::{Agent, AgentResponse, DirectToolCall};
use crate::config::SystemPromptSource;
use crate::knowledge::{store_conversation, PersistenceHandle};
use crate::session::handle_session_command;
use sdk::errors::{EngineError, StrandsErrorExt};

pub const PROMPT: &str = "\n~ ";

/// Result of reading one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    Interrupted,
    Eof,
}

/// Where input lines come from
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome;

    fn add_history(&mut self, _line: &str) {}
}

/// Terminal input with line editing and history
pub struct RustylineSource {
    editor: rustyline::DefaultEditor,
}

impl RustylineSource {
    pub fn new() -> Result<Self, EngineError> {
        let editor = rustyline::DefaultEditor::new()
            .map_err(|e| EngineError::Config(format!("Failed to create line editor: {}", e)))?;
        Ok(Self { editor })
    }
}

impl LineSource for RustylineSource {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome {
        match self.editor.readline(prompt) {
            Ok(line) => ReadOutcome::Line(line),
            Err(rustyline::error::ReadlineError::Interrupted) => ReadOutcome::Interrupted,
            Err(rustyline::error::ReadlineError::Eof) => ReadOutcome::Eof,
            Err(e) => {
                warn!("Failed to read input: {}", e);
                ReadOutcome::Eof
            }
        }
    }

    fn add_history(&mut self, line: &str) {
        let _ = self.editor.add_history_entry(line);
    }
}

/// Fixed list of lines, then end of input
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl LineSource for ScriptedInput {
    fn read_line(&mut self, _prompt: &str) -> ReadOutcome {
        match self.lines.pop_front() {
            Some(line) => ReadOutcome::Line(line),
            None => ReadOutcome::Eof,
        }
    }
}

/// What a line asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCommand<'a> {
    Exit,
    Session(&'a str),
    Shell(&'a str),
    Empty,
    Query(&'a str),
}

pub fn classify(line: &str) -> LineCommand<'_> {
    let trimmed = line.trim();
    if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        return LineCommand::Exit;
    }
    if let Some(rest) = line.strip_prefix('!') {
        let rest = rest.trim();
        if rest == "session info" || rest == "session list" || rest.starts_with("session ") {
            return LineCommand::Session(rest);
        }
        return LineCommand::Shell(rest);
    }
    if trimmed.is_empty() {
        return LineCommand::Empty;
    }
    LineCommand::Query(line)
}

/// Everything a turn needs besides the line itself
pub struct ReplContext<'a> {
    pub agent: &'a mut dyn Agent,
    pub knowledge_base_id: Option<&'a str>,
    pub persistence: Option<&'a PersistenceHandle>,
    pub session_id: Option<&'a str>,
    pub session_path: Option<&'a Path>,
    pub system_prompt: &'a SystemPromptSource,
}

impl ReplContext<'_> {
    async fn welcome_text(&mut self) -> Option<String> {
        let call = DirectToolCall::new("welcome", json!({"action": "view"})).unrecorded();
        match self.agent.call_tool(call).await {
            Ok(result) if result.is_success() => result.first_text().map(String::from),
            Ok(_) => None,
            Err(e) => {
                debug!("Welcome text unavailable: {}", e);
                None
            }
        }
    }

    async fn retrieve(&mut self, query: &str) -> Result<(), EngineError> {
        if let Some(kb) = self.knowledge_base_id {
            let call = DirectToolCall::new(
                "retrieve",
                json!({"text": query, "knowledgeBaseId": kb}),
            );
            self.agent.call_tool(call).await?;
        }
        Ok(())
    }

    fn store(&self, query: &str, response: &AgentResponse, out: &mut dyn Write) {
        if let (Some(kb), Some(handle)) = (self.knowledge_base_id, self.persistence) {
            store_conversation(handle, kb, query, Some(response), out);
        }
    }

    async fn query_turn(&mut self, line: &str, out: &mut dyn Write) -> anyhow::Result<()> {
        self.retrieve(line).await?;

        let base = self.system_prompt.load();
        let prompt = match self.welcome_text().await {
            Some(welcome) => format!("{}\n\nWelcome Text Reference:\n{}", base, welcome),
            None => base,
        };
        self.agent.set_system_prompt(prompt);

        let response = self.agent.invoke(line).await?;
        writeln!(out, "{}", response.text.trim_end())?;

        self.store(line, &response, out);
        Ok(())
    }

    async fn shell_turn(&mut self, line: &str, command: &str, out: &mut dyn Write) {
        let _ = writeln!(out, "$ {}", command);

        let call = DirectToolCall::new(
            "shell",
            json!({"command": command, "non_interactive_mode": true}),
        )
        .with_user_message(line);

        match self.agent.call_tool(call).await {
            Ok(result) => {
                let text = result.text();
                if !text.trim().is_empty() {
                    let _ = writeln!(out, "{}", text.trim_end());
                }
                let _ = writeln!(out);
            }
            Err(e) => {
                let _ = writeln!(out, "Shell command execution error: {}", e);
            }
        }
    }

    fn report_background_failures(&self, out: &mut dyn Write) {
        let Some(handle) = self.persistence else {
            return;
        };
        let failed = handle.take_new_failures();
        if failed > 0 {
            let _ = writeln!(
                out,
                "⚠️  {} knowledge base write{} failed in the background. Run with --log-level to see why.",
                failed,
                if failed == 1 { "" } else { "s" }
            );
        }
    }
}

/// Run the interactive loop until exit
pub async fn run_interactive(
    mut ctx: ReplContext<'_>,
    input: &mut dyn LineSource,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    if let Some(welcome) = ctx.welcome_text().await {
        render::render_welcome_message(out, &welcome)?;
    }

    loop {
        out.flush()?;
        let line = match input.read_line(PROMPT) {
            ReadOutcome::Line(line) => line,
            ReadOutcome::Interrupted | ReadOutcome::Eof => {
                render::render_goodbye_message(out)?;
                break;
            }
        };

        let command = classify(&line);
        if !matches!(command, LineCommand::Empty) {
            input.add_history(line.trim());
        }

        match command {
            LineCommand::Exit => {
                render::render_goodbye_message(out)?;
                break;
            }
            LineCommand::Session(cmd) => {
                if let Err(e) =
                    handle_session_command(cmd, ctx.session_id, ctx.session_path, out)
                {
                    let _ = writeln!(out, "\nError: {}", e);
                }
            }
            LineCommand::Shell(cmd) => ctx.shell_turn(&line, cmd, out).await,
            LineCommand::Empty => {}
            LineCommand::Query(query) => {
                if let Err(e) = ctx.query_turn(query, out).await {
                    match e.downcast_ref::<EngineError>() {
                        Some(cause) if cause.is_recoverable() => {
                            warn!("Turn failed: {} ({})", e, cause.user_hint())
                        }
                        _ => warn!("Turn failed: {}", e),
                    }
                    let _ = writeln!(out, "\nError: {}", e);
                }
            }
        }

        ctx.report_background_failures(out);
    }

    out.flush()?;
    Ok(())
}

/// Answer a single query and return
pub async fn run_query(
    mut ctx: ReplContext<'_>,
    query: &str,
    out: &mut dyn Write,
) -> anyhow::Result<AgentResponse> {
    ctx.retrieve(query).await?;
    let response = ctx.agent.invoke(query).await?;
    writeln!(out, "{}", response.text.trim_end())?;
    ctx.store(query, &response, out);
    out.flush()?;
    Ok(response)
}
