//! Working Memory
//!
//! Conversation history sent to the model on every call. The system prompt
//! is not stored here; the agent prepends a fresh one per request. When the
//! estimated size passes the context budget the oldest messages are dropped,
//! never leaving a tool result at the front without the call it answers.

use crate::llm::{Message, MessageRole};

/// Default context budget in tokens
pub const DEFAULT_CONTEXT_LIMIT: usize = 100_000;

/// Rough estimate: 1 token ≈ 4 characters
const CHARS_PER_TOKEN: usize = 4;

/// Per-message overhead for role and framing
const MESSAGE_OVERHEAD_TOKENS: usize = 10;

/// Messages always kept, however large
const MIN_RETAINED: usize = 2;

#[derive(Debug, Clone)]
pub struct WorkingMemory {
    messages: Vec<Message>,
    context_limit: usize,
    token_count: usize,
    /// Messages dropped by trimming so far
    trimmed: usize,
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_CONTEXT_LIMIT)
    }

    pub fn with_limit(context_limit: usize) -> Self {
        Self {
            messages: Vec::new(),
            context_limit,
            token_count: 0,
            trimmed: 0,
        }
    }

    /// Append a message, trimming old ones if the budget is exceeded
    pub fn add_message(&mut self, message: Message) {
        self.token_count += Self::estimate_tokens(&message);
        self.messages.push(message);

        if self.token_count > self.context_limit {
            self.trim_messages();
        }
    }

    /// Replace the contents with previously persisted history
    pub fn restore(&mut self, messages: Vec<Message>) {
        self.clear();
        for message in messages {
            self.add_message(message);
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    pub fn context_limit(&self) -> usize {
        self.context_limit
    }

    pub fn trimmed(&self) -> usize {
        self.trimmed
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.token_count = 0;
        self.trimmed = 0;
    }

    fn trim_messages(&mut self) {
        let mut remove = 0;
        let mut tokens = self.token_count;

        while tokens > self.context_limit && self.messages.len() - remove > MIN_RETAINED {
            tokens -= Self::estimate_tokens(&self.messages[remove]);
            remove += 1;
        }
        // A tool result must follow the call that produced it.
        while remove < self.messages.len().saturating_sub(MIN_RETAINED)
            && self.messages[remove].role == MessageRole::Tool
        {
            tokens -= Self::estimate_tokens(&self.messages[remove]);
            remove += 1;
        }

        if remove > 0 {
            self.messages.drain(..remove);
            self.token_count = tokens;
            self.trimmed += remove;
        }
    }

    fn estimate_tokens(message: &Message) -> usize {
        let chars = message.content.len() + message.tool_call_id.as_ref().map_or(0, |id| id.len());
        chars.div_ceil(CHARS_PER_TOKEN) + MESSAGE_OVERHEAD_TOKENS
    }
}

impl Default for WorkingMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_working_memory() {
        let memory = WorkingMemory::new();
        assert!(memory.is_empty());
        assert_eq!(memory.token_count(), 0);
        assert_eq!(memory.context_limit(), DEFAULT_CONTEXT_LIMIT);
    }

    #[test]
    fn test_add_and_clear() {
        let mut memory = WorkingMemory::new();
        memory.add_message(Message::user("Hello"));
        memory.add_message(Message::assistant("Hi"));
        assert_eq!(memory.len(), 2);
        assert!(memory.token_count() > 0);

        memory.clear();
        assert!(memory.is_empty());
        assert_eq!(memory.token_count(), 0);
    }

    #[test]
    fn test_estimate_tokens() {
        let short = WorkingMemory::estimate_tokens(&Message::user("Hi"));
        let long = WorkingMemory::estimate_tokens(&Message::user(
            "This is a much longer message with many more words and characters",
        ));
        assert!(short > 0 && short < 20);
        assert!(long > short);

        let with_id = WorkingMemory::estimate_tokens(&Message::tool_result("test", "call_123456789"));
        assert!(with_id > WorkingMemory::estimate_tokens(&Message::user("test")));
    }

    #[test]
    fn test_trimming_keeps_recent_messages() {
        let mut memory = WorkingMemory::with_limit(100);
        for i in 0..10 {
            memory.add_message(Message::user(format!("User {}", i)));
            memory.add_message(Message::assistant(format!("Assistant {}", i)));
        }

        assert!(memory.token_count() <= memory.context_limit());
        assert!(memory.trimmed() > 0);
        assert_eq!(memory.trimmed() + memory.len(), 20);
        assert_eq!(memory.messages().last().unwrap().content, "Assistant 9");
    }

    #[test]
    fn test_trimming_never_starts_with_tool_result() {
        let mut memory = WorkingMemory::with_limit(60);
        for i in 0..6 {
            memory.add_message(Message::user(format!("question {}", i)));
            memory.add_message(Message::assistant(r#"{"function": "shell"}"#));
            memory.add_message(Message::tool_result(format!("output {}", i), "call"));
            memory.add_message(Message::assistant(format!("answer {}", i)));
        }
        assert_ne!(memory.messages()[0].role, MessageRole::Tool);
    }

    #[test]
    fn test_oversized_pair_is_kept() {
        let mut memory = WorkingMemory::with_limit(10);
        memory.add_message(Message::user("x".repeat(400)));
        memory.add_message(Message::assistant("y".repeat(400)));
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn test_restore_replaces_history() {
        let mut memory = WorkingMemory::new();
        memory.add_message(Message::user("old"));
        memory.restore(vec![Message::user("a"), Message::assistant("b")]);
        let contents: Vec<_> = memory.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);
    }
}
