use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use super::{action_error_result, parse_arguments};
use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};
use crate::session::Session;

pub static ASK_QUESTION_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| ToolDefinition {
    name: "ask-question".to_string(),
    description: "Ask a question about the loaded PDF. The full document text is sent to Gemini together with the question; if the document does not contain the answer, the reply says so.".to_string(),
    input_schema: json!({
        "type": "object",
        "properties": {
            "question": {
                "type": "string",
                "description": "The question to answer from the document"
            }
        },
        "required": ["question"]
    }),
    annotations: Some(ToolAnnotations {
        title: Some("Get Answer".to_string()),
        read_only_hint: Some(true),
        open_world_hint: Some(true),
    }),
});

#[derive(Debug, Deserialize)]
struct AskQuestionParams {
    question: String,
}

pub struct AskQuestionTool;

impl AskQuestionTool {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(
        &self,
        session: &Session,
        arguments: Option<serde_json::Value>,
    ) -> CallToolResult {
        let params = match parse_arguments::<AskQuestionParams>(arguments) {
            Ok(params) => params,
            Err(result) => return result,
        };

        info!("Answering question ({} characters)", params.question.len());

        match session.ask(&params.question).await {
            Ok(answer) => CallToolResult::success(format!("Answer:\n{}", answer)),
            Err(e) => {
                error!("Question answering failed: {}", e);
                action_error_result("Gemini API", &e)
            }
        }
    }
}
