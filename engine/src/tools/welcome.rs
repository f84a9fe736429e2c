//! Welcome Tool
//!
//! Views or edits the welcome text kept in `.welcome` under the working
//! directory. The text is shown at startup and handed to the model as
//! reference on every turn.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use sdk::types::{ToolInput, ToolResult};

pub const WELCOME_FILE_NAME: &str = ".welcome";

pub const DEFAULT_WELCOME_TEXT: &str = "# welcome to strands

Ask a question or describe what you want built, and the agent will work on it with its tools.

- `!<command>` runs a shell command directly
- `!session info` / `!session list` show session details when sessions are enabled
- `exit` or `quit` leaves

This text lives in `.welcome` in the current directory. Ask the agent to change it, or edit the file yourself.";

#[derive(Debug, Clone)]
pub struct WelcomeTool {
    path: PathBuf,
}

impl WelcomeTool {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            path: work_dir.join(WELCOME_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current welcome text, falling back to the built-in one
    pub async fn view(&self) -> std::io::Result<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(DEFAULT_WELCOME_TEXT.to_string()),
            Err(e) => Err(e),
        }
    }

    pub async fn edit(&self, content: &str) -> std::io::Result<()> {
        debug!("Updating welcome text at {}", self.path.display());
        tokio::fs::write(&self.path, content).await
    }

    pub async fn call(&self, input: &ToolInput) -> ToolResult {
        let action = input
            .param_str_opt("action")
            .unwrap_or_else(|| "view".to_string());

        match action.as_str() {
            "view" => match self.view().await {
                Ok(text) => ToolResult::success(text),
                Err(e) => ToolResult::error(format!("Error reading welcome text: {}", e)),
            },
            "edit" => {
                let Some(content) = input.param_str_opt("content") else {
                    return ToolResult::error("content is required for edit action");
                };
                match self.edit(&content).await {
                    Ok(()) => ToolResult::success("Welcome text updated successfully"),
                    Err(e) => ToolResult::error(format!("Error updating welcome text: {}", e)),
                }
            }
            other => ToolResult::error(format!(
                "Unknown action: {}. Use 'view' or 'edit'",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn input(args: serde_json::Value) -> ToolInput {
        ToolInput::from_json("welcome", args).unwrap()
    }

    #[tokio::test]
    async fn test_view_default() {
        let dir = TempDir::new().unwrap();
        let result = WelcomeTool::new(dir.path())
            .call(&input(json!({"action": "view"})))
            .await;
        assert!(result.is_success());
        assert!(result.text().contains("welcome to strands"));
    }

    #[tokio::test]
    async fn test_edit_then_view() {
        let dir = TempDir::new().unwrap();
        let tool = WelcomeTool::new(dir.path());

        let result = tool
            .call(&input(json!({"action": "edit", "content": "Custom welcome text"})))
            .await;
        assert!(result.is_success());
        assert!(result.text().contains("updated successfully"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".welcome")).unwrap(),
            "Custom welcome text"
        );

        let result = tool.call(&input(json!({"action": "view"}))).await;
        assert_eq!(result.text(), "Custom welcome text");
    }

    #[tokio::test]
    async fn test_edit_requires_content() {
        let dir = TempDir::new().unwrap();
        let result = WelcomeTool::new(dir.path())
            .call(&input(json!({"action": "edit"})))
            .await;
        assert!(!result.is_success());
        assert!(result.text().contains("content is required"));
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let dir = TempDir::new().unwrap();
        let result = WelcomeTool::new(dir.path())
            .call(&input(json!({"action": "delete"})))
            .await;
        assert!(!result.is_success());
        assert!(result.text().contains("Unknown action"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_file_is_error() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be fails to read as text.
        std::fs::create_dir(dir.path().join(".welcome")).unwrap();
        let result = WelcomeTool::new(dir.path())
            .call(&input(json!({"action": "view"})))
            .await;
        assert!(!result.is_success());
        assert!(result.text().contains("Error"));
    }
}
