//! Configuration management
//!
//! This module turns command-line flags and environment variables into a
//! resolved [`Settings`] value that is handed to every component explicitly.
//! Nothing below the entry point reads the process environment on its own.
//!
//! # Precedence
//!
//! Every overridable value follows the same order: explicit CLI flag, then
//! environment variable, then built-in default.
//!
//! # Path Expansion
//!
//! Paths given on the command line or through the environment have a leading
//! `~` expanded to the user's home directory.
//!
//! # Examples
//!
//! ```no_run
//! use clap::Parser;
//! use strands_engine::cli::Cli;
//! use strands_engine::config::{Environment, Settings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cli = Cli::parse();
//! let settings = Settings::resolve(&cli, &Environment::capture(), std::env::current_dir()?)?;
//! println!("Region: {}", settings.aws.region);
//! # Ok(())
//! # }
//! ```

pub mod env_keys;

use sdk::errors::EngineError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Cli;

/// Region used when neither the model config nor `AWS_REGION` names one
pub const DEFAULT_AWS_REGION: &str = "us-west-2";

/// System prompt used when no override and no `.prompt` file exist
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Name of the per-directory system prompt file
pub const PROMPT_FILE_NAME: &str = ".prompt";

/// Snapshot of the environment variables the CLI consults
///
/// Captured once at startup. Tests build one from literal pairs instead of
/// mutating the process environment.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the known keys from the process environment
    pub fn capture() -> Self {
        let vars = env_keys::ALL
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
            .collect();
        Self { vars }
    }

    /// Build an environment from explicit key/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a variable; empty values count as unset
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// AWS access settings shared by the Bedrock model and knowledge base clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsSettings {
    pub region: String,
    pub bearer_token: Option<String>,
    pub agent_endpoint: Option<String>,
    pub agent_runtime_endpoint: Option<String>,
    pub runtime_endpoint: Option<String>,
}

impl AwsSettings {
    fn from_env(env: &Environment) -> Self {
        Self {
            region: env
                .get(env_keys::aws::AWS_REGION)
                .unwrap_or(DEFAULT_AWS_REGION)
                .to_string(),
            bearer_token: env
                .get(env_keys::aws::AWS_BEARER_TOKEN_BEDROCK)
                .map(String::from),
            agent_endpoint: env
                .get(env_keys::aws::BEDROCK_AGENT_ENDPOINT)
                .map(String::from),
            agent_runtime_endpoint: env
                .get(env_keys::aws::BEDROCK_AGENT_RUNTIME_ENDPOINT)
                .map(String::from),
            runtime_endpoint: env
                .get(env_keys::aws::BEDROCK_RUNTIME_ENDPOINT)
                .map(String::from),
        }
    }
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self::from_env(&Environment::default())
    }
}

/// Where the base system prompt comes from
///
/// Resolved again on every interactive turn so edits to `.prompt` take effect
/// without restarting.
#[derive(Debug, Clone)]
pub struct SystemPromptSource {
    env_value: Option<String>,
    prompt_file: PathBuf,
}

impl SystemPromptSource {
    pub fn new(env_value: Option<String>, prompt_file: PathBuf) -> Self {
        Self {
            env_value,
            prompt_file,
        }
    }

    /// Resolve the prompt: env override, then `.prompt`, then the default
    pub fn load(&self) -> String {
        if let Some(value) = &self.env_value {
            return value.clone();
        }

        if self.prompt_file.is_file() {
            match fs::read_to_string(&self.prompt_file) {
                Ok(content) => return content.trim().to_string(),
                Err(e) => {
                    tracing::debug!(
                        "Could not read {}: {}",
                        self.prompt_file.display(),
                        e
                    );
                }
            }
        }

        DEFAULT_SYSTEM_PROMPT.to_string()
    }
}

/// Fully resolved runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// One-shot query; `None` selects interactive mode
    pub query: Option<String>,

    pub knowledge_base_id: Option<String>,

    pub session_id: Option<String>,
    pub session_path: Option<PathBuf>,
    pub list_sessions: bool,

    /// Raw `--mcp-config` value (JSON or path)
    pub mcp_config: Option<String>,
    /// Fallback config file from `STRANDS_MCP_CONFIG_PATH`
    pub mcp_config_path: Option<PathBuf>,

    pub model_provider: String,
    pub model_config: String,

    pub aws: AwsSettings,
    pub system_prompt: SystemPromptSource,

    /// Directory holding `.prompt`, `.welcome` and `.models/`
    pub work_dir: PathBuf,
}

impl Settings {
    /// Resolve flags and environment into settings
    pub fn resolve(cli: &Cli, env: &Environment, work_dir: PathBuf) -> Result<Self, EngineError> {
        let knowledge_base_id = cli
            .knowledge_base_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| env.get(env_keys::STRANDS_KNOWLEDGE_BASE_ID).map(String::from));

        let session_path = match &cli.session_path {
            Some(path) => Some(expand_path(path)?),
            None => env
                .get(env_keys::STRANDS_SESSION_PATH)
                .map(|p| expand_path(Path::new(p)))
                .transpose()?,
        };

        let mcp_config_path = env
            .get(env_keys::STRANDS_MCP_CONFIG_PATH)
            .map(|p| expand_path(Path::new(p)))
            .transpose()?;

        let system_prompt = SystemPromptSource::new(
            env.get(env_keys::STRANDS_SYSTEM_PROMPT).map(String::from),
            work_dir.join(PROMPT_FILE_NAME),
        );

        Ok(Self {
            query: cli.joined_query(),
            knowledge_base_id,
            session_id: cli.session_id.clone().filter(|id| !id.is_empty()),
            session_path,
            list_sessions: cli.list_sessions,
            mcp_config: cli.mcp_config.clone(),
            mcp_config_path,
            model_provider: cli.model_provider.clone(),
            model_config: cli.model_config.clone(),
            aws: AwsSettings::from_env(env),
            system_prompt,
            work_dir,
        })
    }

    pub fn is_interactive(&self) -> bool {
        self.query.is_none()
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;
        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
