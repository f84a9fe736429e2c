//! Retrieve Tool
//!
//! Semantic search over a knowledge base. Hits below the score threshold are
//! dropped and the rest are numbered for the model.

use std::sync::Arc;
use tracing::debug;

use crate::knowledge::{KnowledgeStore, RetrievalResult, DEFAULT_MIN_SCORE, DEFAULT_RETRIEVE_RESULTS};
use sdk::types::{ToolInput, ToolResult};

pub struct RetrieveTool {
    store: Arc<dyn KnowledgeStore>,
    default_knowledge_base_id: Option<String>,
}

impl RetrieveTool {
    pub fn new(store: Arc<dyn KnowledgeStore>, default_knowledge_base_id: Option<String>) -> Self {
        Self {
            store,
            default_knowledge_base_id,
        }
    }

    /// Accepts `text`, `knowledgeBaseId`, `numberOfResults` and `score`
    pub async fn call(&self, input: &ToolInput) -> ToolResult {
        let Some(text) = input.param_str_opt("text").filter(|t| !t.trim().is_empty()) else {
            return ToolResult::error("Missing parameter: text");
        };
        let Some(kb) = input
            .param_str_opt("knowledgeBaseId")
            .or_else(|| self.default_knowledge_base_id.clone())
        else {
            return ToolResult::error(
                "No knowledge base ID provided or found in environment variables STRANDS_KNOWLEDGE_BASE_ID",
            );
        };
        let max_results = input
            .param_i64_opt("numberOfResults")
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_RETRIEVE_RESULTS);
        let min_score = input.param_f64_opt("score").unwrap_or(DEFAULT_MIN_SCORE);

        match self.store.retrieve(&kb, &text, max_results).await {
            Ok(results) => {
                let kept = filter_results(results, min_score);
                debug!("Retrieved {} results from {}", kept.len(), kb);
                ToolResult::success(format_results(&kept))
            }
            Err(e) => ToolResult::error(format!("Error during retrieval: {}", e)),
        }
    }
}

/// Keep results at or above `min_score`. Unscored results are kept.
pub fn filter_results(results: Vec<RetrievalResult>, min_score: f64) -> Vec<RetrievalResult> {
    results
        .into_iter()
        .filter(|r| r.score.map_or(true, |s| s >= min_score))
        .collect()
}

pub fn format_results(results: &[RetrievalResult]) -> String {
    if results.is_empty() {
        return "No results found above score threshold.".to_string();
    }

    let mut out = format!("Retrieved {} results:\n", results.len());
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!("\nResult {}:", i + 1));
        if let Some(score) = result.score {
            out.push_str(&format!("\nScore: {:.4}", score));
        }
        if let Some(location) = &result.location {
            out.push_str(&format!("\nSource: {}", location));
        }
        out.push_str(&format!("\nContent: {}\n", result.text));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(text: &str, score: Option<f64>) -> RetrievalResult {
        RetrievalResult {
            text: text.to_string(),
            score,
            location: Some("memory_1".to_string()),
        }
    }

    #[test]
    fn test_filter_drops_low_scores() {
        let kept = filter_results(
            vec![hit("a", Some(0.9)), hit("b", Some(0.2)), hit("c", None)],
            DEFAULT_MIN_SCORE,
        );
        let texts: Vec<_> = kept.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "c"]);
    }

    #[test]
    fn test_format_results() {
        let text = format_results(&[hit("first", Some(0.75))]);
        assert!(text.starts_with("Retrieved 1 results:"));
        assert!(text.contains("Result 1:"));
        assert!(text.contains("Score: 0.7500"));
        assert!(text.contains("Source: memory_1"));
        assert!(text.contains("Content: first"));

        assert_eq!(format_results(&[]), "No results found above score threshold.");
    }
}
