//! Integration tests for the interactive loop, session resume and MCP startup
//!
//! The agent is the real `AgentCore` over a scripted model, with real shell,
//! welcome and MCP tools wired into the registry. Knowledge base turns run
//! against an in-memory store behind the real persistence worker.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

use sdk::errors::EngineError;
use sdk::types::ToolResult;
use strands_engine::agent::{Agent, AgentCore};
use strands_engine::config::SystemPromptSource;
use strands_engine::knowledge::{
    DataSourceSummary, DataSourceType, InlineDocument, KnowledgeError, KnowledgeStore,
    PersistenceHandle, PersistenceWorker, RetrievalResult,
};
use strands_engine::llm::{FinalAnswer, LLMError, LLMProvider, LLMResponse, Message, MessageRole};
use strands_engine::mcp::{
    disconnect_all, initialize_mcp_connections, list_active_connections, McpConnector,
    McpManager, McpServerConfig, McpSession, McpToolInfo,
};
use strands_engine::repl::render::GOODBYE_TEXT;
use strands_engine::repl::{
    run_interactive, run_query, LineSource, ReadOutcome, ReplContext, ScriptedInput,
};
use strands_engine::session::{display_agent_history, setup_session_management};
use strands_engine::tools::{
    McpClientTool, RetrieveTool, ShellTool, StoreInKbTool, ToolRegistry, WelcomeTool,
};

/// Replays canned answers and keeps every request it was sent
struct ScriptedModel {
    answers: Mutex<VecDeque<LLMResponse>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl ScriptedModel {
    fn answering(answers: &[&str]) -> (Box<dyn LLMProvider>, Arc<Mutex<Vec<Vec<Message>>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let model = Self {
            answers: Mutex::new(
                answers
                    .iter()
                    .map(|a| LLMResponse::FinalAnswer(FinalAnswer::new(*a)))
                    .collect(),
            ),
            requests: Arc::clone(&requests),
        };
        (Box::new(model), requests)
    }
}

#[async_trait]
impl LLMProvider for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-1"
    }

    fn is_local(&self) -> bool {
        true
    }

    async fn generate(&self, messages: &[Message]) -> Result<LLMResponse, LLMError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LLMError::ProviderUnavailable("script exhausted".to_string()))
    }
}

struct EchoSession;

#[async_trait]
impl McpSession for EchoSession {
    async fn list_tools(&self) -> Result<Vec<McpToolInfo>, EngineError> {
        Ok(vec![McpToolInfo {
            name: "echo".to_string(),
            description: Some("Echo text back".to_string()),
            input_schema: json!({"type": "object"}),
        }])
    }

    async fn call_tool(&self, _name: &str, arguments: Value) -> Result<ToolResult, EngineError> {
        Ok(ToolResult::success(
            arguments["text"].as_str().unwrap_or_default(),
        ))
    }

    async fn close(&self) {}
}

/// Connects only to servers whose command is `good`
struct PickyConnector;

#[async_trait]
impl McpConnector for PickyConnector {
    async fn connect(&self, config: &McpServerConfig) -> Result<Box<dyn McpSession>, EngineError> {
        match config.command.as_deref() {
            Some("good") => Ok(Box::new(EchoSession)),
            _ => Err(EngineError::Mcp("server exited during startup".to_string())),
        }
    }
}

fn registry(work_dir: &TempDir) -> ToolRegistry {
    ToolRegistry {
        shell: Some(ShellTool::new(work_dir.path().to_path_buf())),
        welcome: Some(WelcomeTool::new(work_dir.path())),
        mcp: Some(McpClientTool::new(Arc::new(McpManager::new(Arc::new(
            PickyConnector,
        ))))),
        ..Default::default()
    }
}

fn prompt_source(work_dir: &TempDir) -> SystemPromptSource {
    SystemPromptSource::new(
        Some("You are a test agent.".to_string()),
        work_dir.path().join(".prompt"),
    )
}

fn context<'a>(agent: &'a mut AgentCore, prompt: &'a SystemPromptSource) -> ReplContext<'a> {
    ReplContext {
        agent,
        knowledge_base_id: None,
        persistence: None,
        session_id: None,
        session_path: None,
        system_prompt: prompt,
    }
}

#[tokio::test]
async fn test_query_then_exit() {
    let dir = TempDir::new().unwrap();
    let (model, requests) = ScriptedModel::answering(&["Hello back"]);
    let mut agent = AgentCore::new(model, Arc::new(registry(&dir)), "");
    let prompt = prompt_source(&dir);

    let mut input = ScriptedInput::new(["hello", "exit"]);
    let mut out = Vec::new();
    run_interactive(context(&mut agent, &prompt), &mut input, &mut out)
        .await
        .unwrap();

    let output = String::from_utf8(out).unwrap();
    assert!(output.contains("Strands Agents"));
    assert!(output.contains("Hello back"));
    assert!(output.trim_end().ends_with('╯'));
    assert!(output.contains(GOODBYE_TEXT));
    assert!(output.find("Hello back").unwrap() < output.find(GOODBYE_TEXT).unwrap());

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let system = &requests[0][0];
    assert_eq!(system.role, MessageRole::System);
    assert!(system.content.starts_with("You are a test agent."));
    assert!(system.content.contains("Welcome Text Reference:"));

    assert!(agent.system_prompt().contains("Welcome Text Reference:"));
    let roles: Vec<_> = agent.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![MessageRole::User, MessageRole::Assistant]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_shell_line_skips_model() {
    let dir = TempDir::new().unwrap();
    let (model, requests) = ScriptedModel::answering(&[]);
    let mut agent = AgentCore::new(model, Arc::new(registry(&dir)), "");
    let prompt = prompt_source(&dir);

    let mut input = ScriptedInput::new(["!echo hi", "exit"]);
    let mut out = Vec::new();
    run_interactive(context(&mut agent, &prompt), &mut input, &mut out)
        .await
        .unwrap();

    let output = String::from_utf8(out).unwrap();
    assert!(output.contains("$ echo hi"));
    let hi = output.find("\nhi\n").expect("command output");
    assert!(hi < output.find(GOODBYE_TEXT).unwrap());
    assert!(requests.lock().unwrap().is_empty());

    // The exchange is kept so later queries can refer to it
    let messages = agent.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].content, "!echo hi");
    assert_eq!(messages[2].role, MessageRole::Tool);
}

#[tokio::test]
async fn test_failed_turn_keeps_loop_running() {
    let dir = TempDir::new().unwrap();
    let (model, requests) = ScriptedModel::answering(&[]);
    let mut agent = AgentCore::new(model, Arc::new(registry(&dir)), "");
    let prompt = prompt_source(&dir);

    let mut input = ScriptedInput::new(["first", "second"]);
    let mut out = Vec::new();
    run_interactive(context(&mut agent, &prompt), &mut input, &mut out)
        .await
        .unwrap();

    let output = String::from_utf8(out).unwrap();
    assert_eq!(output.matches("\nError: ").count(), 2);
    assert!(output.contains(GOODBYE_TEXT));
    assert_eq!(requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_single_query_mode() {
    let dir = TempDir::new().unwrap();
    let (model, _requests) = ScriptedModel::answering(&["42"]);
    let mut agent = AgentCore::new(model, Arc::new(registry(&dir)), "base prompt");
    let prompt = prompt_source(&dir);

    let mut out = Vec::new();
    let response = run_query(context(&mut agent, &prompt), "meaning of life?", &mut out)
        .await
        .unwrap();

    assert_eq!(response.text, "42");
    let output = String::from_utf8(out).unwrap();
    assert_eq!(output, "42\n");
    // No welcome lookup in single-query mode
    assert_eq!(agent.system_prompt(), "base prompt");
}

#[tokio::test]
async fn test_resumed_session_replays_history() {
    let dir = TempDir::new().unwrap();
    let sessions = dir.path().join("sessions");

    {
        let setup = setup_session_management(Some("demo"), Some(&sessions));
        assert!(!setup.is_resuming());
        let (model, _) = ScriptedModel::answering(&["first answer"]);
        let mut agent = AgentCore::new(model, Arc::new(registry(&dir)), "")
            .with_session(setup.manager().unwrap());
        agent.invoke("first question").await.unwrap();
    }

    let setup = setup_session_management(Some("demo"), Some(&sessions));
    assert!(setup.is_resuming());
    let (model, requests) = ScriptedModel::answering(&["second answer"]);
    let mut agent = AgentCore::new(model, Arc::new(registry(&dir)), "")
        .with_session(setup.manager().unwrap());
    assert_eq!(agent.messages().len(), 2);

    let mut out = Vec::new();
    display_agent_history(agent.messages(), "demo", &mut out).unwrap();
    let replay = String::from_utf8(out).unwrap();
    assert!(replay.contains("Resuming session: demo"));
    assert!(replay.contains("~ first question"));
    assert!(replay.contains("first answer"));

    agent.invoke("second question").await.unwrap();
    let sent = &requests.lock().unwrap()[0];
    assert!(sent.iter().any(|m| m.content == "first question"));
}

#[tokio::test]
async fn test_mcp_startup_with_one_failing_server() {
    let dir = TempDir::new().unwrap();
    let (model, _) = ScriptedModel::answering(&[]);
    let mut agent = AgentCore::new(model, Arc::new(registry(&dir)), "");

    let mut configs = vec![
        McpServerConfig::stdio("good", Vec::new()).with_connection_id("tools"),
        McpServerConfig::stdio("bad", Vec::new()),
    ];

    let mut out = Vec::new();
    let results = initialize_mcp_connections(&mut configs, &mut agent, &mut out).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results.get("tools"), Some(&true));
    assert_eq!(results.get("mcp_bad_1"), Some(&false));
    assert_eq!(configs[1].connection_id.as_deref(), Some("mcp_bad_1"));

    let output = String::from_utf8(out).unwrap();
    assert!(output.contains("📝 Auto-generated connection_id: mcp_bad_1"));
    assert!(output.contains("✓ Connected to MCP server: tools"));
    assert!(output.contains("  ✓ Loaded tools from tools"));
    assert!(output.contains("✗ Failed to connect to MCP server: mcp_bad_1"));

    // Startup calls stay out of the conversation
    assert!(agent.messages().is_empty());

    // Loaded tools are callable by name
    let echoed = agent
        .call_tool(strands_engine::agent::DirectToolCall::new(
            "echo",
            json!({"text": "ping"}),
        ))
        .await
        .unwrap();
    assert_eq!(echoed.text(), "ping");

    assert_eq!(list_active_connections(&mut agent).await, vec!["tools"]);
    let mut out = Vec::new();
    disconnect_all(&mut agent, &mut out).await;
    assert!(String::from_utf8(out)
        .unwrap()
        .contains("✓ Disconnected from MCP server: tools"));
    assert!(list_active_connections(&mut agent).await.is_empty());
}

/// Knowledge base with one data source that logs every call
struct MemoryStore {
    kind: DataSourceType,
    calls: Mutex<Vec<String>>,
    ingested: Mutex<Vec<InlineDocument>>,
}

impl MemoryStore {
    fn new(kind: DataSourceType) -> Arc<Self> {
        Arc::new(Self {
            kind,
            calls: Mutex::new(Vec::new()),
            ingested: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn list_data_sources(&self, kb: &str) -> Result<Vec<DataSourceSummary>, KnowledgeError> {
        self.calls.lock().unwrap().push(format!("list:{}", kb));
        Ok(vec![DataSourceSummary {
            data_source_id: "DS1".to_string(),
            name: "memories".to_string(),
            status: Some("AVAILABLE".to_string()),
        }])
    }

    async fn data_source_type(
        &self,
        _kb: &str,
        _data_source_id: &str,
    ) -> Result<DataSourceType, KnowledgeError> {
        Ok(self.kind.clone())
    }

    async fn ingest_documents(
        &self,
        kb: &str,
        data_source_id: &str,
        documents: &[InlineDocument],
    ) -> Result<(), KnowledgeError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("ingest:{}/{}", kb, data_source_id));
        self.ingested.lock().unwrap().extend_from_slice(documents);
        Ok(())
    }

    async fn retrieve(
        &self,
        kb: &str,
        query: &str,
        _max_results: usize,
    ) -> Result<Vec<RetrievalResult>, KnowledgeError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("retrieve:{}:{}", kb, query));
        Ok(vec![RetrievalResult {
            text: "deploy with make release".to_string(),
            score: Some(0.9),
            location: Some("memory_1".to_string()),
        }])
    }
}

/// Scripted lines, holding back everything after the first until the
/// worker has finished `writes` jobs
struct AfterWrites {
    lines: ScriptedInput,
    handle: PersistenceHandle,
    writes: u64,
    served: usize,
}

impl LineSource for AfterWrites {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome {
        if self.served > 0 {
            let deadline = Instant::now() + Duration::from_secs(5);
            while Instant::now() < deadline {
                let stats = self.handle.stats();
                if stats.succeeded + stats.failed >= self.writes {
                    break;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        }
        self.served += 1;
        self.lines.read_line(prompt)
    }
}

fn knowledge_registry(
    work_dir: &TempDir,
    store: Arc<MemoryStore>,
    persistence: &PersistenceHandle,
) -> ToolRegistry {
    ToolRegistry {
        retrieve: Some(RetrieveTool::new(store, Some("KB1".to_string()))),
        store: Some(StoreInKbTool::new(persistence.clone())),
        ..registry(work_dir)
    }
}

fn knowledge_context<'a>(
    agent: &'a mut AgentCore,
    prompt: &'a SystemPromptSource,
    persistence: &'a PersistenceHandle,
) -> ReplContext<'a> {
    ReplContext {
        knowledge_base_id: Some("KB1"),
        persistence: Some(persistence),
        ..context(agent, prompt)
    }
}

const BACKGROUND_FAILURE: &str = "knowledge base write failed in the background";

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_knowledge_turn_retrieves_then_stores() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new(DataSourceType::Custom);
    let worker = PersistenceWorker::with_defaults(store.clone(), Some("KB1".to_string()));
    let handle = worker.handle();

    let (model, requests) = ScriptedModel::answering(&["Use make release."]);
    let tools = knowledge_registry(&dir, store.clone(), &handle);
    let mut agent = AgentCore::new(model, Arc::new(tools), "");
    let prompt = prompt_source(&dir);

    let mut input = AfterWrites {
        lines: ScriptedInput::new(["hello", "", "exit"]),
        handle: handle.clone(),
        writes: 1,
        served: 0,
    };
    let mut out = Vec::new();
    run_interactive(knowledge_context(&mut agent, &prompt, &handle), &mut input, &mut out)
        .await
        .unwrap();

    // Retrieval results are already in the conversation when the model is asked
    let sent = requests.lock().unwrap()[0].clone();
    let hit = sent
        .iter()
        .position(|m| m.role == MessageRole::Tool && m.content.contains("deploy with make release"))
        .expect("retrieval result in request");
    let question = sent
        .iter()
        .position(|m| m.role == MessageRole::User && m.content == "hello")
        .unwrap();
    assert!(hit < question);

    let stats = worker.shutdown(Duration::from_secs(5)).await;
    assert_eq!(stats.submitted, 1);
    assert_eq!(stats.succeeded, 1);

    let calls = store.calls();
    assert_eq!(calls[0], "retrieve:KB1:hello");
    assert!(calls.contains(&"ingest:KB1/DS1".to_string()));

    let ingested = store.ingested.lock().unwrap();
    assert_eq!(ingested.len(), 1);
    let envelope: Value = serde_json::from_str(&ingested[0].text).unwrap();
    assert_eq!(envelope["content"], "User: hello\n\nAssistant: Use make release.");

    let output = String::from_utf8(out).unwrap();
    assert!(!output.contains(BACKGROUND_FAILURE));
    assert!(!output.contains("Error storing conversation"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_background_write_is_reported_once() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new(DataSourceType::S3);
    let worker = PersistenceWorker::with_defaults(store.clone(), Some("KB1".to_string()));
    let handle = worker.handle();

    let (model, requests) = ScriptedModel::answering(&["Hi there"]);
    let tools = knowledge_registry(&dir, store.clone(), &handle);
    let mut agent = AgentCore::new(model, Arc::new(tools), "");
    let prompt = prompt_source(&dir);

    let mut input = AfterWrites {
        lines: ScriptedInput::new(["hello", "", "exit"]),
        handle: handle.clone(),
        writes: 1,
        served: 0,
    };
    let mut out = Vec::new();
    run_interactive(knowledge_context(&mut agent, &prompt, &handle), &mut input, &mut out)
        .await
        .unwrap();

    let output = String::from_utf8(out).unwrap();
    assert_eq!(output.matches(BACKGROUND_FAILURE).count(), 1);
    assert!(output.contains("⚠️  1 knowledge base write failed in the background."));
    assert!(output.find("Hi there").unwrap() < output.find(BACKGROUND_FAILURE).unwrap());
    assert!(output.find(BACKGROUND_FAILURE).unwrap() < output.find(GOODBYE_TEXT).unwrap());
    assert_eq!(requests.lock().unwrap().len(), 1);

    let stats = worker.shutdown(Duration::from_secs(5)).await;
    assert_eq!(stats.submitted, 1);
    assert_eq!(stats.failed, 1);
    assert!(!store.calls().iter().any(|c| c.starts_with("ingest:")));
}

#[tokio::test]
async fn test_rejected_store_is_printed_and_loop_continues() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new(DataSourceType::Custom);
    let worker = PersistenceWorker::with_defaults(store.clone(), Some("KB1".to_string()));
    let handle = worker.handle();
    worker.shutdown(Duration::from_secs(1)).await;

    let (model, _requests) = ScriptedModel::answering(&["answer one", "answer two"]);
    let tools = knowledge_registry(&dir, store.clone(), &handle);
    let mut agent = AgentCore::new(model, Arc::new(tools), "");
    let prompt = prompt_source(&dir);

    let mut input = ScriptedInput::new(["first", "second", "exit"]);
    let mut out = Vec::new();
    run_interactive(knowledge_context(&mut agent, &prompt, &handle), &mut input, &mut out)
        .await
        .unwrap();

    let output = String::from_utf8(out).unwrap();
    assert_eq!(
        output
            .matches("Error storing conversation in knowledge base: Persistence worker has shut down")
            .count(),
        2
    );
    assert!(output.find("answer two").unwrap() < output.find(GOODBYE_TEXT).unwrap());
    assert_eq!(handle.stats().submitted, 0);
    assert!(!output.contains(BACKGROUND_FAILURE));
}
