//! Knowledge Base Integration
//!
//! Client for the managed knowledge base plus the background worker that
//! writes conversation turns into it.

pub mod client;
pub mod conversation;
pub mod worker;

pub use client::{
    BedrockKnowledgeClient, DataSourceSummary, DataSourceType, InlineDocument, KnowledgeError,
    KnowledgeStore, RetrievalResult,
};
pub use conversation::{format_conversation, store_conversation};
pub use worker::{
    PersistenceHandle, PersistenceStats, PersistenceWorker, StoreReceipt, StoreRequest,
};

/// Results returned by a retrieval call
pub const DEFAULT_RETRIEVE_RESULTS: usize = 10;

/// Results scoring below this are left out of the context
pub const DEFAULT_MIN_SCORE: f64 = 0.4;
