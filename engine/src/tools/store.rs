//! Store-in-knowledge-base tool
//!
//! Thin front for [`PersistenceHandle::submit`]: the model gets an answer as
//! soon as the write is queued.

use crate::knowledge::{PersistenceHandle, StoreRequest};
use sdk::types::{ToolInput, ToolResult};

pub struct StoreInKbTool {
    handle: PersistenceHandle,
}

impl StoreInKbTool {
    pub fn new(handle: PersistenceHandle) -> Self {
        Self { handle }
    }

    /// Accepts `content`, `title` and `knowledge_base_id`
    pub fn call(&self, input: &ToolInput) -> ToolResult {
        let mut request = StoreRequest::new(input.param_str_opt("content").unwrap_or_default());
        request.title = input.param_str_opt("title");
        request.knowledge_base_id = input.param_str_opt("knowledge_base_id");

        match self.handle.submit(request) {
            Ok(receipt) => receipt.to_tool_result(),
            Err(e) => ToolResult::error(format!("❌ {}", e)),
        }
    }
}
