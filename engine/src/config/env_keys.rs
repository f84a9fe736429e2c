//! Environment variable names consulted by the CLI

/// Knowledge base used for retrieval and conversation storage
pub const STRANDS_KNOWLEDGE_BASE_ID: &str = "STRANDS_KNOWLEDGE_BASE_ID";

/// Root directory for persisted sessions
pub const STRANDS_SESSION_PATH: &str = "STRANDS_SESSION_PATH";

/// Fallback MCP config file when `--mcp-config` is absent or empty
pub const STRANDS_MCP_CONFIG_PATH: &str = "STRANDS_MCP_CONFIG_PATH";

/// Overrides the `.prompt` file and the built-in system prompt
pub const STRANDS_SYSTEM_PROMPT: &str = "STRANDS_SYSTEM_PROMPT";

/// Forced to `enabled` at startup; inherited by child processes
pub const STRANDS_TOOL_CONSOLE_MODE: &str = "STRANDS_TOOL_CONSOLE_MODE";

/// AWS access for Bedrock model and knowledge base calls
pub mod aws {
    pub const AWS_REGION: &str = "AWS_REGION";
    pub const AWS_BEARER_TOKEN_BEDROCK: &str = "AWS_BEARER_TOKEN_BEDROCK";

    /// Endpoint overrides, mainly for local testing
    pub const BEDROCK_AGENT_ENDPOINT: &str = "BEDROCK_AGENT_ENDPOINT";
    pub const BEDROCK_AGENT_RUNTIME_ENDPOINT: &str = "BEDROCK_AGENT_RUNTIME_ENDPOINT";
    pub const BEDROCK_RUNTIME_ENDPOINT: &str = "BEDROCK_RUNTIME_ENDPOINT";
}

/// Every key captured into `Environment::capture`
pub const ALL: &[&str] = &[
    STRANDS_KNOWLEDGE_BASE_ID,
    STRANDS_SESSION_PATH,
    STRANDS_MCP_CONFIG_PATH,
    STRANDS_SYSTEM_PROMPT,
    STRANDS_TOOL_CONSOLE_MODE,
    aws::AWS_REGION,
    aws::AWS_BEARER_TOKEN_BEDROCK,
    aws::BEDROCK_AGENT_ENDPOINT,
    aws::BEDROCK_AGENT_RUNTIME_ENDPOINT,
    aws::BEDROCK_RUNTIME_ENDPOINT,
];
