use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::parse_arguments;
use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};
use crate::session::Session;

pub static SET_CREDENTIALS_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| ToolDefinition {
    name: "set-credentials".to_string(),
    description: "Store the Gemini and/or ElevenLabs API keys for this session. Keys are kept in memory only and never logged. Pass an empty string to clear a key.".to_string(),
    input_schema: json!({
        "type": "object",
        "properties": {
            "geminiApiKey": {
                "type": "string",
                "description": "Gemini API key from Google AI Studio"
            },
            "elevenLabsApiKey": {
                "type": "string",
                "description": "ElevenLabs API key from the ElevenLabs dashboard"
            }
        }
    }),
    annotations: Some(ToolAnnotations {
        title: Some("API Keys".to_string()),
        read_only_hint: Some(false),
        open_world_hint: Some(false),
    }),
});

#[derive(Deserialize)]
struct SetCredentialsParams {
    #[serde(rename = "geminiApiKey")]
    gemini_api_key: Option<String>,
    #[serde(rename = "elevenLabsApiKey")]
    eleven_labs_api_key: Option<String>,
}

pub struct SetCredentialsTool;

impl SetCredentialsTool {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(
        &self,
        session: &mut Session,
        arguments: Option<serde_json::Value>,
    ) -> CallToolResult {
        let params = match parse_arguments::<SetCredentialsParams>(arguments) {
            Ok(params) => params,
            Err(result) => return result,
        };

        if params.gemini_api_key.is_none() && params.eleven_labs_api_key.is_none() {
            return super::invalid_params(
                "Provide geminiApiKey and/or elevenLabsApiKey",
                json!({}),
            );
        }

        session.set_credentials(
            params.gemini_api_key.as_deref(),
            params.eleven_labs_api_key.as_deref(),
        );

        let status = session.status();
        info!("Credentials updated");
        CallToolResult::success(format!(
            "API keys updated.\n- Gemini: {}\n- ElevenLabs: {}",
            if status.gemini_key_set { "set" } else { "not set" },
            if status.eleven_labs_key_set { "set" } else { "not set" },
        ))
    }
}
