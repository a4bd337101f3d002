use once_cell::sync::Lazy;
use serde_json::json;
use tracing::{error, info};

use super::action_error_result;
use crate::mcp::types::{CallToolResult, ContentItem, ToolAnnotations, ToolDefinition};
use crate::session::Session;

pub static GENERATE_AUDIO_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| ToolDefinition {
    name: "generate-audio".to_string(),
    description: "Convert the current summary to speech with ElevenLabs and return it as playable audio/mpeg content.".to_string(),
    input_schema: json!({
        "type": "object",
        "properties": {}
    }),
    annotations: Some(ToolAnnotations {
        title: Some("Generate Podcast Audio".to_string()),
        read_only_hint: Some(true),
        open_world_hint: Some(true),
    }),
});

pub struct GenerateAudioTool;

impl GenerateAudioTool {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, session: &Session) -> CallToolResult {
        match session.generate_audio().await {
            Ok(clip) => {
                info!("Generated {} bytes of audio", clip.bytes.len());
                CallToolResult::success(
                    "Audio generated successfully! You can now listen to your podcast.",
                )
                .with_content(ContentItem::audio(&clip.bytes, clip.mime_type))
            }
            Err(e) => {
                error!("Audio generation failed: {}", e);
                action_error_result("ElevenLabs API", &e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_support::{pdf_upload, session_with};
    use crate::utils::http::mock::{gemini_envelope, MockTransport};
    use base64::Engine;
    use std::sync::Arc;

    #[tokio::test]
    async fn returns_inline_audio_with_identical_bytes() {
        let audio = b"\xff\xfb\x90\x64\x00".to_vec();
        let gemini = Arc::new(MockTransport::new().reply_json(200, gemini_envelope("Summary")));
        let speech = Arc::new(MockTransport::new().reply(200, audio.clone()));
        let mut session = session_with(&gemini, &speech);
        session.set_credentials(Some("gem"), Some("xi"));
        session.upload(pdf_upload("a.pdf", &["Text"])).await.unwrap();

        let result = GenerateAudioTool::new().execute(&session).await;

        assert!(!result.is_error());
        let item = result
            .content
            .iter()
            .find(|c| c.content_type == "audio")
            .expect("audio content");
        assert_eq!(item.mime_type.as_deref(), Some("audio/mpeg"));
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(item.data.as_deref().unwrap())
            .unwrap();
        assert_eq!(decoded, audio);
    }

    #[tokio::test]
    async fn missing_speech_key_is_reported_without_request() {
        let gemini = Arc::new(MockTransport::new().reply_json(200, gemini_envelope("Summary")));
        let speech = Arc::new(MockTransport::new());
        let mut session = session_with(&gemini, &speech);
        session.set_credentials(Some("gem"), None);
        session.upload(pdf_upload("a.pdf", &["Text"])).await.unwrap();

        let result = GenerateAudioTool::new().execute(&session).await;

        assert!(result.is_error());
        assert!(result.text().contains("ERR_MISSING_CREDENTIAL"));
        assert_eq!(speech.call_count(), 0);
    }

    #[tokio::test]
    async fn requires_a_summary() {
        let mock = Arc::new(MockTransport::new());
        let session = session_with(&mock, &mock);

        let result = GenerateAudioTool::new().execute(&session).await;

        assert!(result.text().contains("ERR_NO_SUMMARY"));
    }
}
