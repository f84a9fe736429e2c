//! Turning a finished turn into a knowledge base document

use std::io::Write;

use super::worker::{PersistenceHandle, StoreReceipt, StoreRequest};
use crate::agent::AgentResponse;

/// Render a question and its answer as plain text.
///
/// Reasoning, when the model produced any, is kept apart from the answer.
pub fn format_conversation(query: &str, response: Option<&AgentResponse>) -> String {
    let Some(response) = response else {
        return format!("User: {}", query);
    };

    match response.reasoning.as_deref().filter(|r| !r.trim().is_empty()) {
        Some(reasoning) => format!(
            "User: {}\n\nAssistant Reasoning: {}\n\nAssistant Response: {}",
            query, reasoning, response.text
        ),
        None => format!("User: {}\n\nAssistant: {}", query, response.text),
    }
}

pub fn conversation_title(query: &str) -> String {
    format!("Conversation: {}", query)
}

/// Queue a finished turn for storage.
///
/// Problems are printed to `out` and otherwise ignored; the turn itself has
/// already succeeded.
pub fn store_conversation(
    handle: &PersistenceHandle,
    knowledge_base_id: &str,
    query: &str,
    response: Option<&AgentResponse>,
    out: &mut dyn Write,
) -> Option<StoreReceipt> {
    let request = StoreRequest::new(format_conversation(query, response))
        .with_title(conversation_title(query))
        .with_knowledge_base(knowledge_base_id);

    match handle.submit(request) {
        Ok(receipt) => Some(receipt),
        Err(e) => {
            let _ = writeln!(out, "Error storing conversation in knowledge base: {}", e);
            None
        }
    }
}
