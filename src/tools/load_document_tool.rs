use base64::Engine;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::{error, info};

use super::{action_error_result, invalid_params, parse_arguments};
use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};
use crate::session::{ActionError, Session, SummaryOutcome, UploadedDocument};

const DEFAULT_FILENAME: &str = "document.pdf";

pub static LOAD_DOCUMENT_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| ToolDefinition {
    name: "load-document".to_string(),
    description: "Upload a single PDF. Its text is extracted and, when a Gemini API key is set, summarized right away. Replaces any previously loaded document and summary.".to_string(),
    input_schema: json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": "Local path of the PDF file"
            },
            "data": {
                "type": "string",
                "description": "Base64-encoded PDF bytes (alternative to path)"
            },
            "filename": {
                "type": "string",
                "description": "Display name of the document (defaults to the file name of path)"
            }
        }
    }),
    annotations: Some(ToolAnnotations {
        title: Some("Upload PDF".to_string()),
        read_only_hint: Some(false),
        open_world_hint: Some(true),
    }),
});

#[derive(Debug, Deserialize)]
struct LoadDocumentParams {
    path: Option<String>,
    data: Option<String>,
    filename: Option<String>,
}

pub struct LoadDocumentTool;

impl LoadDocumentTool {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(
        &self,
        session: &mut Session,
        arguments: Option<serde_json::Value>,
    ) -> CallToolResult {
        let params = match parse_arguments::<LoadDocumentParams>(arguments) {
            Ok(params) => params,
            Err(result) => return result,
        };

        let upload = match read_upload(params).await {
            Ok(upload) => upload,
            Err(result) => return result,
        };

        let filename = upload.filename.clone();
        let outcome = match session.upload(upload).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to load '{}': {}", filename, e);
                return action_error_result("PDF", &e);
            }
        };

        let header = format!(
            "PDF '{}' uploaded successfully! ({} characters extracted)\n\nExtracted text preview:\n{}",
            outcome.filename, outcome.characters, outcome.preview
        );

        match outcome.summary {
            SummaryOutcome::Ready(summary) => {
                info!("Document '{}' summarized", outcome.filename);
                CallToolResult::success(format!("{}\n\nSummarized Content:\n{}", header, summary))
            }
            SummaryOutcome::Skipped => CallToolResult::success(format!(
                "{}\n\nPlease provide your Gemini API key with set-credentials, then call summarize.",
                header
            )),
            SummaryOutcome::Failed(e) => {
                let failure = action_error_result("Gemini API", &ActionError::Api(e));
                failure
                    .content
                    .into_iter()
                    .fold(CallToolResult::error(header), CallToolResult::with_content)
            }
        }
    }
}

async fn read_upload(params: LoadDocumentParams) -> Result<UploadedDocument, CallToolResult> {
    match (params.path, params.data) {
        (Some(path), None) => {
            let bytes = tokio::fs::read(&path).await.map_err(|e| {
                error!("Failed to read '{}': {}", path, e);
                invalid_params(
                    &format!("Could not read file: {}", e),
                    json!({ "path": path }),
                )
            })?;
            let filename = params.filename.unwrap_or_else(|| {
                Path::new(&path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
            });
            Ok(UploadedDocument { filename, bytes })
        }
        (None, Some(data)) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(data.trim())
                .map_err(|e| invalid_params(&format!("Invalid base64 data: {}", e), json!({})))?;
            Ok(UploadedDocument {
                filename: params
                    .filename
                    .unwrap_or_else(|| DEFAULT_FILENAME.to_string()),
                bytes,
            })
        }
        _ => Err(invalid_params(
            "Provide exactly one of path or data",
            json!({}),
        )),
    }
}
