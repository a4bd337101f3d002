use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use super::credential::Credential;
use super::error::ApiError;
use super::http::{HttpRequest, HttpTransport};

pub const DEFAULT_ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";
/// ElevenLabs "Rachel".
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4obsnInGRB_v";
pub const SPEECH_MODEL_ID: &str = "eleven_multilingual_v2";
pub const AUDIO_MIME_TYPE: &str = "audio/mpeg";

const VOICE_STABILITY: f32 = 0.5;
const VOICE_SIMILARITY_BOOST: f32 = 0.75;
const SERVICE_NAME: &str = "ElevenLabs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

pub struct SpeechService {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    voice_id: String,
}

impl SpeechService {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_ELEVENLABS_BASE_URL.to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    /// Converts text to `audio/mpeg` bytes. Success is decided by HTTP status
    /// alone; the body is returned untouched.
    pub async fn synthesize(
        &self,
        text: &str,
        key: Option<&Credential>,
    ) -> Result<AudioClip, ApiError> {
        let key = key.ok_or(ApiError::MissingCredential {
            service: SERVICE_NAME,
        })?;

        let body = json!({
            "text": text,
            "model_id": SPEECH_MODEL_ID,
            "voice_settings": {
                "stability": VOICE_STABILITY,
                "similarity_boost": VOICE_SIMILARITY_BOOST,
            },
        });

        info!(
            "Synthesizing {} characters with voice {}",
            text.chars().count(),
            self.voice_id
        );

        let request = HttpRequest::new(format!("{}/{}", self.base_url, self.voice_id), body)
            .header("xi-api-key", key.expose())
            .header("accept", AUDIO_MIME_TYPE);

        let response = self
            .transport
            .post_json(request)
            .await?
            .error_for_status()
            .map_err(|e| {
                error!("ElevenLabs API error: {}", e);
                e
            })?;

        Ok(AudioClip {
            bytes: response.body,
            mime_type: AUDIO_MIME_TYPE,
        })
    }
}
