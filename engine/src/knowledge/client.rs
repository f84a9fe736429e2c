//! Knowledge base client
//!
//! [`KnowledgeStore`] is the seam between the persistence worker / retrieval
//! tool and the managed knowledge base. [`BedrockKnowledgeClient`] implements
//! it against the Bedrock Agent and Bedrock Agent Runtime REST APIs.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::config::AwsSettings;
use sdk::errors::EngineError;

/// Errors from knowledge base operations
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("Content cannot be empty")]
    EmptyContent,

    #[error("No knowledge base ID provided or found in environment variables STRANDS_KNOWLEDGE_BASE_ID")]
    MissingKnowledgeBaseId,

    #[error("No data sources found for knowledge base {0}")]
    NoDataSources(String),

    #[error("S3 data source type is not supported for direct ingestion with this tool.")]
    S3NotSupported,

    #[error("Unsupported data source type: {0}")]
    UnsupportedDataSource(String),

    #[error("Knowledge base request failed ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Persistence queue is full, try again later")]
    QueueFull,

    #[error("Persistence worker has shut down")]
    WorkerClosed,
}

impl From<KnowledgeError> for EngineError {
    fn from(e: KnowledgeError) -> Self {
        EngineError::KnowledgeBase(e.to_string())
    }
}

/// A data source attached to a knowledge base
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceSummary {
    pub data_source_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Data source configuration type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceType {
    /// Accepts inline documents
    Custom,
    S3,
    Other(String),
}

impl DataSourceType {
    pub fn from_api(value: &str) -> Self {
        match value {
            "CUSTOM" => Self::Custom,
            "S3" => Self::S3,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for DataSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom => write!(f, "CUSTOM"),
            Self::S3 => write!(f, "S3"),
            Self::Other(other) => write!(f, "{}", other),
        }
    }
}

/// Inline text document for a CUSTOM data source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineDocument {
    pub id: String,
    pub text: String,
}

impl InlineDocument {
    /// Request body entry for `IngestKnowledgeBaseDocuments`
    pub fn to_api(&self) -> Value {
        json!({
            "content": {
                "dataSourceType": "CUSTOM",
                "custom": {
                    "customDocumentIdentifier": { "id": self.id },
                    "inlineContent": {
                        "textContent": { "data": self.text },
                        "type": "TEXT"
                    },
                    "sourceType": "IN_LINE"
                }
            }
        })
    }
}

/// One retrieval hit
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub text: String,
    pub score: Option<f64>,
    pub location: Option<String>,
}

/// Operations the CLI needs from a knowledge base
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn list_data_sources(
        &self,
        knowledge_base_id: &str,
    ) -> Result<Vec<DataSourceSummary>, KnowledgeError>;

    async fn data_source_type(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> Result<DataSourceType, KnowledgeError>;

    async fn ingest_documents(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        documents: &[InlineDocument],
    ) -> Result<(), KnowledgeError>;

    async fn retrieve(
        &self,
        knowledge_base_id: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RetrievalResult>, KnowledgeError>;
}

/// Bedrock knowledge base client over HTTPS
#[derive(Debug, Clone)]
pub struct BedrockKnowledgeClient {
    agent_endpoint: String,
    runtime_endpoint: String,
    bearer_token: Option<String>,
    client: Client,
}

impl BedrockKnowledgeClient {
    pub fn new(aws: &AwsSettings) -> Self {
        let agent_endpoint = aws
            .agent_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-agent.{}.amazonaws.com", aws.region));
        let runtime_endpoint = aws.agent_runtime_endpoint.clone().unwrap_or_else(|| {
            format!("https://bedrock-agent-runtime.{}.amazonaws.com", aws.region)
        });

        Self {
            agent_endpoint: agent_endpoint.trim_end_matches('/').to_string(),
            runtime_endpoint: runtime_endpoint.trim_end_matches('/').to_string(),
            bearer_token: aws.bearer_token.clone(),
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn agent_endpoint(&self) -> &str {
        &self.agent_endpoint
    }

    pub fn runtime_endpoint(&self) -> &str {
        &self.runtime_endpoint
    }

    fn request(
        &self,
        method: Method,
        base: &str,
        segments: &[&str],
    ) -> Result<RequestBuilder, KnowledgeError> {
        let mut url = Url::parse(base)
            .map_err(|e| KnowledgeError::Network(format!("invalid endpoint {}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| KnowledgeError::Network(format!("invalid endpoint {}", base)))?
            .pop_if_empty()
            .extend(segments);

        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value, KnowledgeError> {
        let response = builder
            .send()
            .await
            .map_err(|e| KnowledgeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KnowledgeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| KnowledgeError::Network(e.to_string()))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| KnowledgeError::Parse(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDataSourcesResponse {
    #[serde(default)]
    data_source_summaries: Vec<DataSourceSummary>,
    #[serde(default)]
    next_token: Option<String>,
}

#[async_trait]
impl KnowledgeStore for BedrockKnowledgeClient {
    async fn list_data_sources(
        &self,
        knowledge_base_id: &str,
    ) -> Result<Vec<DataSourceSummary>, KnowledgeError> {
        let mut sources = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut body = json!({ "maxResults": 100 });
            if let Some(token) = &next_token {
                body["nextToken"] = Value::from(token.as_str());
            }
            let builder = self
                .request(
                    Method::POST,
                    &self.agent_endpoint,
                    &["knowledgebases", knowledge_base_id, "datasources", ""],
                )?
                .json(&body);

            let page: ListDataSourcesResponse = serde_json::from_value(self.send(builder).await?)
                .map_err(|e| KnowledgeError::Parse(e.to_string()))?;
            sources.extend(page.data_source_summaries);

            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        debug!(
            "Knowledge base {} has {} data sources",
            knowledge_base_id,
            sources.len()
        );
        Ok(sources)
    }

    async fn data_source_type(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> Result<DataSourceType, KnowledgeError> {
        let builder = self.request(
            Method::GET,
            &self.agent_endpoint,
            &["knowledgebases", knowledge_base_id, "datasources", data_source_id],
        )?;
        let body = self.send(builder).await?;

        body.pointer("/dataSource/dataSourceConfiguration/type")
            .and_then(Value::as_str)
            .map(DataSourceType::from_api)
            .ok_or_else(|| {
                KnowledgeError::Parse(format!(
                    "data source {} has no configuration type",
                    data_source_id
                ))
            })
    }

    async fn ingest_documents(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        documents: &[InlineDocument],
    ) -> Result<(), KnowledgeError> {
        let body = json!({
            "documents": documents.iter().map(InlineDocument::to_api).collect::<Vec<_>>(),
        });
        let builder = self
            .request(
                Method::PUT,
                &self.agent_endpoint,
                &[
                    "knowledgebases",
                    knowledge_base_id,
                    "datasources",
                    data_source_id,
                    "documents",
                ],
            )?
            .json(&body);
        self.send(builder).await?;
        Ok(())
    }

    async fn retrieve(
        &self,
        knowledge_base_id: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RetrievalResult>, KnowledgeError> {
        let body = json!({
            "retrievalQuery": { "text": query },
            "retrievalConfiguration": {
                "vectorSearchConfiguration": { "numberOfResults": max_results }
            }
        });
        let builder = self
            .request(
                Method::POST,
                &self.runtime_endpoint,
                &["knowledgebases", knowledge_base_id, "retrieve"],
            )?
            .json(&body);
        let response = self.send(builder).await?;

        let results = response
            .get("retrievalResults")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(parse_retrieval_result).collect())
            .unwrap_or_default();
        Ok(results)
    }
}

fn parse_retrieval_result(item: &Value) -> RetrievalResult {
    let text = item
        .pointer("/content/text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let score = item.get("score").and_then(Value::as_f64);
    let location = item.get("location").and_then(|loc| {
        [
            "/s3Location/uri",
            "/webLocation/url",
            "/confluenceLocation/url",
            "/sharePointLocation/url",
            "/customDocumentLocation/id",
        ]
        .iter()
        .find_map(|p| loc.pointer(p).and_then(Value::as_str))
        .or_else(|| loc.get("type").and_then(Value::as_str))
        .map(String::from)
    });

    RetrievalResult {
        text,
        score,
        location,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints_follow_region() {
        let aws = AwsSettings {
            region: "ap-south-1".to_string(),
            ..Default::default()
        };
        let client = BedrockKnowledgeClient::new(&aws);
        assert_eq!(
            client.agent_endpoint(),
            "https://bedrock-agent.ap-south-1.amazonaws.com"
        );
        assert_eq!(
            client.runtime_endpoint(),
            "https://bedrock-agent-runtime.ap-south-1.amazonaws.com"
        );
    }

    #[test]
    fn test_inline_document_shape() {
        let doc = InlineDocument {
            id: "memory_1".to_string(),
            text: "hello".to_string(),
        };
        let api = doc.to_api();
        assert_eq!(api["content"]["dataSourceType"], "CUSTOM");
        assert_eq!(api["content"]["custom"]["customDocumentIdentifier"]["id"], "memory_1");
        assert_eq!(
            api["content"]["custom"]["inlineContent"]["textContent"]["data"],
            "hello"
        );
        assert_eq!(api["content"]["custom"]["sourceType"], "IN_LINE");
    }

    #[test]
    fn test_parse_retrieval_result_locations() {
        let s3 = parse_retrieval_result(&json!({
            "content": {"text": "doc"},
            "score": 0.8,
            "location": {"type": "S3", "s3Location": {"uri": "s3://bucket/key"}}
        }));
        assert_eq!(s3.text, "doc");
        assert_eq!(s3.score, Some(0.8));
        assert_eq!(s3.location.as_deref(), Some("s3://bucket/key"));

        let custom = parse_retrieval_result(&json!({
            "content": {"text": "mem"},
            "location": {"type": "CUSTOM", "customDocumentLocation": {"id": "memory_x"}}
        }));
        assert_eq!(custom.location.as_deref(), Some("memory_x"));
        assert_eq!(custom.score, None);
    }

    #[test]
    fn test_data_source_type_from_api() {
        assert_eq!(DataSourceType::from_api("CUSTOM"), DataSourceType::Custom);
        assert_eq!(DataSourceType::from_api("S3"), DataSourceType::S3);
        assert_eq!(
            DataSourceType::from_api("WEB"),
            DataSourceType::Other("WEB".to_string())
        );
    }
}
