//! Background Persistence Worker
//!
//! Stores conversation content in the knowledge base without holding up the
//! prompt. Requests are validated on the caller's side, queued on a bounded
//! channel and drained by a small pool of tokio tasks. Storage failures are
//! logged and counted; the interactive loop polls the counter to tell the
//! user about them.
//!
//! Delivery is at most once. A failed write is not retried.

use chrono::Local;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::client::{DataSourceType, InlineDocument, KnowledgeError, KnowledgeStore};
use sdk::types::ToolResult;

/// Pending writes the queue will hold before refusing new ones
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Worker tasks draining the queue
pub const DEFAULT_WORKERS: usize = 2;

/// What the caller wants stored
#[derive(Debug, Clone, Default)]
pub struct StoreRequest {
    pub content: String,
    pub title: Option<String>,
    /// Overrides the worker's default knowledge base
    pub knowledge_base_id: Option<String>,
}

impl StoreRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_knowledge_base(mut self, knowledge_base_id: impl Into<String>) -> Self {
        self.knowledge_base_id = Some(knowledge_base_id.into());
        self
    }
}

/// A validated request waiting in the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreJob {
    pub knowledge_base_id: String,
    pub title: String,
    pub content: String,
    pub doc_id: String,
}

impl StoreJob {
    /// JSON envelope written as the document body
    pub fn envelope(&self) -> String {
        json!({
            "title": self.title,
            "action": "store",
            "content": self.content,
        })
        .to_string()
    }
}

/// Returned to the caller once a job is queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreReceipt {
    pub title: String,
    pub knowledge_base_id: String,
    pub doc_id: String,
}

impl StoreReceipt {
    pub fn to_tool_result(&self) -> ToolResult {
        ToolResult::success_lines([
            "✅ Started background task to store content in knowledge base:".to_string(),
            format!("📝 Title: {}", self.title),
            format!("🗄️ Knowledge Base ID: {}", self.knowledge_base_id),
            "⏱️ Processing in background...".to_string(),
        ])
    }
}

/// Counter snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistenceStats {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    reported: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PersistenceStats {
        PersistenceStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Cloneable submission side of the worker
#[derive(Debug, Clone)]
pub struct PersistenceHandle {
    tx: mpsc::Sender<StoreJob>,
    default_knowledge_base_id: Option<String>,
    counters: Arc<Counters>,
}

impl PersistenceHandle {
    pub fn default_knowledge_base_id(&self) -> Option<&str> {
        self.default_knowledge_base_id.as_deref()
    }

    /// Validate and enqueue a write.
    ///
    /// The result reflects validation and queueing only. Nothing reaches the
    /// queue when validation fails.
    pub fn submit(&self, request: StoreRequest) -> Result<StoreReceipt, KnowledgeError> {
        if request.content.trim().is_empty() {
            return Err(KnowledgeError::EmptyContent);
        }

        let knowledge_base_id = request
            .knowledge_base_id
            .filter(|id| !id.trim().is_empty())
            .or_else(|| self.default_knowledge_base_id.clone())
            .ok_or(KnowledgeError::MissingKnowledgeBaseId)?;

        let now = Local::now();
        let title = request
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("Strands Memory {}", now.format("%Y%m%d_%H%M%S")));
        let doc_id = generate_document_id();

        let job = StoreJob {
            knowledge_base_id: knowledge_base_id.clone(),
            title: title.clone(),
            content: request.content,
            doc_id: doc_id.clone(),
        };

        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => KnowledgeError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => KnowledgeError::WorkerClosed,
        })?;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        debug!("Queued document {} for knowledge base {}", doc_id, knowledge_base_id);

        Ok(StoreReceipt {
            title,
            knowledge_base_id,
            doc_id,
        })
    }

    /// Failures since the previous call
    pub fn take_new_failures(&self) -> u64 {
        let failed = self.counters.failed.load(Ordering::Relaxed);
        let reported = self.counters.reported.swap(failed, Ordering::Relaxed);
        failed.saturating_sub(reported)
    }

    pub fn stats(&self) -> PersistenceStats {
        self.counters.snapshot()
    }
}

/// Owner of the worker pool
pub struct PersistenceWorker {
    handle: PersistenceHandle,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl PersistenceWorker {
    /// Start `workers` tasks draining a queue of `capacity` jobs.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        store: Arc<dyn KnowledgeStore>,
        default_knowledge_base_id: Option<String>,
        workers: usize,
        capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let rx = Arc::new(Mutex::new(rx));
        let counters = Arc::new(Counters::default());

        let workers = (0..workers.max(1))
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    Arc::clone(&store),
                    Arc::clone(&rx),
                    shutdown_rx.clone(),
                    Arc::clone(&counters),
                ))
            })
            .collect();

        Self {
            handle: PersistenceHandle {
                tx,
                default_knowledge_base_id: default_knowledge_base_id
                    .filter(|id| !id.trim().is_empty()),
                counters,
            },
            shutdown_tx,
            workers,
        }
    }

    pub fn with_defaults(
        store: Arc<dyn KnowledgeStore>,
        default_knowledge_base_id: Option<String>,
    ) -> Self {
        Self::spawn(
            store,
            default_knowledge_base_id,
            DEFAULT_WORKERS,
            DEFAULT_QUEUE_CAPACITY,
        )
    }

    pub fn handle(&self) -> PersistenceHandle {
        self.handle.clone()
    }

    /// Stop intake, drain what is queued, abort whatever is left after `timeout`
    pub async fn shutdown(self, timeout: Duration) -> PersistenceStats {
        let _ = self.shutdown_tx.send(true);

        let aborts: Vec<_> = self.workers.iter().map(|w| w.abort_handle()).collect();
        let drained = tokio::time::timeout(timeout, futures::future::join_all(self.workers)).await;

        let stats = self.handle.counters.snapshot();
        match drained {
            Ok(_) => info!(
                "Persistence worker stopped ({} stored, {} failed)",
                stats.succeeded, stats.failed
            ),
            Err(_) => {
                warn!(
                    "Persistence worker did not drain within {}s, abandoning pending writes",
                    timeout.as_secs()
                );
                for abort in aborts {
                    abort.abort();
                }
            }
        }
        stats
    }
}

async fn worker_loop(
    id: usize,
    store: Arc<dyn KnowledgeStore>,
    rx: Arc<Mutex<mpsc::Receiver<StoreJob>>>,
    mut shutdown: watch::Receiver<bool>,
    counters: Arc<Counters>,
) {
    debug!("Persistence worker {} started", id);

    loop {
        let job = {
            let mut rx = rx.lock().await;
            if *shutdown.borrow() {
                rx.close();
            }
            tokio::select! {
                job = rx.recv() => job,
                _ = shutdown.changed() => {
                    rx.close();
                    rx.recv().await
                }
            }
        };

        let Some(job) = job else {
            break;
        };

        match ingest_memory(store.as_ref(), &job).await {
            Ok(data_source_id) => {
                counters.succeeded.fetch_add(1, Ordering::Relaxed);
                info!(
                    "Stored document {} in knowledge base {} (data source {})",
                    job.doc_id, job.knowledge_base_id, data_source_id
                );
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    "Failed to store document {} in knowledge base {}: {}",
                    job.doc_id, job.knowledge_base_id, e
                );
            }
        }
    }

    debug!("Persistence worker {} stopped", id);
}

/// Write one job to the first CUSTOM data source of its knowledge base.
///
/// Returns the data source id used.
pub async fn ingest_memory(
    store: &dyn KnowledgeStore,
    job: &StoreJob,
) -> Result<String, KnowledgeError> {
    let kb = job.knowledge_base_id.as_str();
    let sources = store.list_data_sources(kb).await?;
    if sources.is_empty() {
        return Err(KnowledgeError::NoDataSources(kb.to_string()));
    }

    let mut first_type = None;
    let mut chosen = None;
    for source in &sources {
        let kind = store.data_source_type(kb, &source.data_source_id).await?;
        if kind == DataSourceType::Custom {
            chosen = Some(source.data_source_id.clone());
            break;
        }
        if first_type.is_none() {
            first_type = Some(kind);
        }
    }

    let data_source_id = match (chosen, first_type) {
        (Some(id), _) => id,
        (None, Some(DataSourceType::S3)) => return Err(KnowledgeError::S3NotSupported),
        (None, Some(other)) => return Err(KnowledgeError::UnsupportedDataSource(other.to_string())),
        (None, None) => return Err(KnowledgeError::NoDataSources(kb.to_string())),
    };

    let document = InlineDocument {
        id: job.doc_id.clone(),
        text: job.envelope(),
    };
    store
        .ingest_documents(kb, &data_source_id, std::slice::from_ref(&document))
        .await?;
    Ok(data_source_id)
}

/// `memory_<YYYYmmdd_HHMMSS>_<8 hex>`
pub fn generate_document_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "memory_{}_{}",
        Local::now().format("%Y%m%d_%H%M%S"),
        &suffix[..8]
    )
}
