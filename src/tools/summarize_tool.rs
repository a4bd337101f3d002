use once_cell::sync::Lazy;
use serde_json::json;
use tracing::error;

use super::action_error_result;
use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};
use crate::session::Session;

pub static SUMMARIZE_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| ToolDefinition {
    name: "summarize".to_string(),
    description: "Summarize the loaded PDF again with Gemini, e.g. after entering the API key or after a failed attempt.".to_string(),
    input_schema: json!({
        "type": "object",
        "properties": {}
    }),
    annotations: Some(ToolAnnotations {
        title: Some("Summarize PDF".to_string()),
        read_only_hint: Some(false),
        open_world_hint: Some(true),
    }),
});

pub struct SummarizeTool;

impl SummarizeTool {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, session: &mut Session) -> CallToolResult {
        match session.summarize().await {
            Ok(summary) => CallToolResult::success(format!("Summarized Content:\n{}", summary)),
            Err(e) => {
                error!("Summarization failed: {}", e);
                action_error_result("Gemini API", &e)
            }
        }
    }
}
