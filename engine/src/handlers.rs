//! Command handlers for CLI operations
//!
//! - `--list-sessions`: print the stored sessions and exit
//! - run: wire up model, tools, session and MCP connections, then answer a
//!   single query or drive the interactive loop

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::agent::{Agent, AgentCore};
use crate::config::Settings;
use crate::knowledge::{
    BedrockKnowledgeClient, KnowledgeStore, PersistenceHandle, PersistenceWorker,
};
use crate::llm::loader;
use crate::mcp::{self, McpManager};
use crate::repl::{self, ReplContext, RustylineSource};
use crate::session::{
    display_agent_history, list_sessions_command, setup_session_management, SessionSetup,
};
use crate::tools::{
    McpClientTool, RetrieveTool, ShellTool, StoreInKbTool, ToolRegistry, WelcomeTool,
};

/// Time given to queued knowledge base writes before exit
pub const PERSISTENCE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Print the available sessions
pub fn handle_list_sessions(session_path: Option<&Path>) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    list_sessions_command(session_path, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Assemble the tools the agent is allowed to call
pub fn build_tool_registry(
    work_dir: &Path,
    store: Arc<dyn KnowledgeStore>,
    persistence: PersistenceHandle,
    mcp_manager: Arc<McpManager>,
) -> ToolRegistry {
    let default_kb = persistence.default_knowledge_base_id().map(String::from);
    ToolRegistry {
        shell: Some(ShellTool::new(work_dir.to_path_buf())),
        retrieve: Some(RetrieveTool::new(store, default_kb)),
        store: Some(StoreInKbTool::new(persistence)),
        welcome: Some(WelcomeTool::new(work_dir)),
        mcp: Some(McpClientTool::new(mcp_manager)),
    }
}

/// Run one query or the interactive loop
pub async fn handle_run(settings: Settings) -> Result<()> {
    let source = loader::load_path(&settings.model_provider, &settings.work_dir)
        .context("Failed to resolve model provider")?;
    let model_config =
        loader::load_config(&settings.model_config).context("Failed to load model config")?;
    let provider = loader::load_model(&source, model_config, &settings.aws)
        .context("Failed to load model")?;

    let mut mcp_configs = mcp::load_config(
        settings.mcp_config.as_deref(),
        settings.mcp_config_path.as_deref(),
    )?;

    let setup = setup_session_management(
        settings.session_id.as_deref(),
        settings.session_path.as_deref(),
    );
    if let SessionSetup::Unavailable { reason } = &setup {
        eprintln!("Warning: Session management unavailable: {}", reason);
    }
    let (session, session_id, is_resuming) = setup.into_parts();

    let store: Arc<dyn KnowledgeStore> = Arc::new(BedrockKnowledgeClient::new(&settings.aws));
    let worker =
        PersistenceWorker::with_defaults(Arc::clone(&store), settings.knowledge_base_id.clone());
    let persistence = worker.handle();

    let tools = build_tool_registry(
        &settings.work_dir,
        store,
        persistence.clone(),
        Arc::new(McpManager::default()),
    );
    info!("Tools available: {}", tools.available_tool_names().join(", "));

    let mut agent = AgentCore::new(provider, Arc::new(tools), settings.system_prompt.load());
    if let Some(session) = session {
        agent = agent.with_session(session);
    }

    let mut out = io::stdout();

    if is_resuming {
        if let Some(id) = session_id.as_deref() {
            display_agent_history(agent.messages(), id, &mut out)?;
        }
    }

    if !mcp_configs.is_empty() {
        let results =
            mcp::initialize_mcp_connections(&mut mcp_configs, &mut agent, &mut out).await;
        if !results.values().any(|ok| *ok) {
            writeln!(out, "Failed to initialize any MCP connections")?;
        }
    }

    let interactive = settings.is_interactive();
    let ctx = ReplContext {
        agent: &mut agent,
        knowledge_base_id: settings.knowledge_base_id.as_deref(),
        persistence: Some(&persistence),
        session_id: session_id.as_deref(),
        session_path: settings.session_path.as_deref(),
        system_prompt: &settings.system_prompt,
    };

    let outcome = match settings.query.as_deref() {
        Some(query) => repl::run_query(ctx, query, &mut out).await.map(|_| ()),
        None => match RustylineSource::new() {
            Ok(mut input) => repl::run_interactive(ctx, &mut input, &mut out).await,
            Err(e) => Err(e.into()),
        },
    };

    if interactive {
        mcp::disconnect_all(&mut agent, &mut out).await;
    }
    out.flush()?;

    let stats = worker.shutdown(PERSISTENCE_DRAIN_TIMEOUT).await;
    if stats.failed > 0 {
        warn!("{} knowledge base writes failed", stats.failed);
    }
    info!(
        "Knowledge base writes: {} submitted, {} stored, {} failed",
        stats.submitted, stats.succeeded, stats.failed
    );

    outcome
}
