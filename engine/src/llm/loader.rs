//! Model provider loading
//!
//! `--model-provider` names either a packaged provider (`bedrock`,
//! `ollama`) or a provider file. A file named `<name>.json` under
//! `<cwd>/.models/` overrides the packaged provider of the same name.
//!
//! Provider file format:
//!
//! ```json
//! {"provider": "ollama", "config": {"host": "http://gpu-box:11434", "model_id": "qwen3:8b"}}
//! ```
//!
//! `--model-config` is merged over the file's `config` key by key.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::bedrock::{BedrockConfig, BedrockProvider};
use super::ollama::{OllamaConfig, OllamaProvider};
use super::LLMProvider;
use crate::config::AwsSettings;
use sdk::errors::EngineError;

/// Directory, relative to the working directory, holding provider overrides
pub const CUSTOM_MODELS_DIR: &str = ".models";

/// Model config as a JSON object
pub type ModelConfig = Map<String, Value>;

/// Packaged provider implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Bedrock,
    Ollama,
}

impl FromStr for ProviderKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bedrock" => Ok(Self::Bedrock),
            "ollama" => Ok(Self::Ollama),
            other => Err(EngineError::Config(format!(
                "model provider not found: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bedrock => write!(f, "bedrock"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

/// Where a provider definition was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSource {
    Packaged(ProviderKind),
    File(PathBuf),
}

#[derive(Debug, Deserialize)]
struct ProviderFile {
    provider: String,
    #[serde(default)]
    config: ModelConfig,
}

/// Resolve `--model-provider` to a provider source
pub fn load_path(name_or_path: &str, work_dir: &Path) -> Result<ProviderSource, EngineError> {
    let as_path = Path::new(name_or_path);
    if name_or_path.ends_with(".json") && as_path.is_file() {
        return Ok(ProviderSource::File(as_path.to_path_buf()));
    }

    let custom = work_dir
        .join(CUSTOM_MODELS_DIR)
        .join(format!("{}.json", name_or_path));
    if custom.is_file() {
        return Ok(ProviderSource::File(custom));
    }

    name_or_path.parse().map(ProviderSource::Packaged)
}

/// Parse `--model-config`: inline JSON, or a path ending in `.json`
pub fn load_config(raw: &str) -> Result<ModelConfig, EngineError> {
    let text = if raw.ends_with(".json") {
        fs::read_to_string(raw).map_err(|e| {
            EngineError::Config(format!("failed to read model config {}: {}", raw, e))
        })?
    } else {
        raw.to_string()
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(EngineError::Config(
            "model config must be a JSON object".to_string(),
        )),
        Err(e) => Err(EngineError::Config(format!("invalid model config: {}", e))),
    }
}

/// Construct the provider, merging `config` over any file defaults
pub fn load_model(
    source: &ProviderSource,
    config: ModelConfig,
    aws: &AwsSettings,
) -> Result<Box<dyn LLMProvider>, EngineError> {
    let (kind, mut merged) = match source {
        ProviderSource::Packaged(kind) => (*kind, ModelConfig::new()),
        ProviderSource::File(path) => {
            let raw = fs::read_to_string(path).map_err(|e| {
                EngineError::Config(format!(
                    "failed to read provider file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let file: ProviderFile = serde_json::from_str(&raw).map_err(|e| {
                EngineError::Config(format!("invalid provider file {}: {}", path.display(), e))
            })?;
            (file.provider.parse()?, file.config)
        }
    };
    merged.extend(config);

    tracing::info!("Loading model provider {}", kind);
    let value = Value::Object(merged);
    match kind {
        ProviderKind::Bedrock => {
            let config: BedrockConfig = serde_json::from_value(value)
                .map_err(|e| EngineError::Config(format!("invalid bedrock config: {}", e)))?;
            Ok(Box::new(BedrockProvider::new(config, aws)))
        }
        ProviderKind::Ollama => {
            let config: OllamaConfig = serde_json::from_value(value)
                .map_err(|e| EngineError::Config(format!("invalid ollama config: {}", e)))?;
            Ok(Box::new(OllamaProvider::new(config)))
        }
    }
}
