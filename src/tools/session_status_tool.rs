use once_cell::sync::Lazy;
use serde_json::json;

use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};
use crate::session::{Session, SessionState};

pub static SESSION_STATUS_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| ToolDefinition {
    name: "session-status".to_string(),
    description: "Show the loaded document, the current summary and which API keys are set."
        .to_string(),
    input_schema: json!({
        "type": "object",
        "properties": {}
    }),
    annotations: Some(ToolAnnotations {
        title: Some("Session Status".to_string()),
        read_only_hint: Some(true),
        open_world_hint: Some(false),
    }),
});

pub struct SessionStatusTool;

impl SessionStatusTool {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(&self, session: &Session) -> CallToolResult {
        let status = session.status();

        let mut out = match status.state {
            SessionState::Empty => "Upload a PDF to get started!".to_string(),
            SessionState::DocumentLoaded => format!(
                "Document: {} ({} characters)\nNo summary yet.",
                status.filename.as_deref().unwrap_or("unknown"),
                status.text_characters
            ),
            SessionState::Summarized => format!(
                "Document: {} ({} characters)\n\nSummarized Content:\n{}",
                status.filename.as_deref().unwrap_or("unknown"),
                status.text_characters,
                status.summary.as_deref().unwrap_or_default()
            ),
        };

        // Structured copy for clients that render state themselves.
        match serde_json::to_string(&status) {
            Ok(json) => {
                out.push_str("\n---\n");
                out.push_str(&json);
            }
            Err(e) => tracing::warn!("Failed to encode session status: {}", e),
        }

        CallToolResult::success(out)
    }
}
