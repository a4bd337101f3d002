use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::utils::content_guard::safe_truncate_utf8;
use crate::utils::credential::Credential;
use crate::utils::elevenlabs::{AudioClip, SpeechService};
use crate::utils::error::ApiError;
use crate::utils::gemini::GeminiService;
use crate::utils::pdf::{self, ExtractionError};

const PREVIEW_BYTES: usize = 300;

/// A file handed over by the client. The bytes live only for one upload.
pub struct UploadedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub filename: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Empty,
    DocumentLoaded,
    Summarized,
}

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Could not extract text from the PDF: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Could not extract any text from the PDF. Please try a different file.")]
    EmptyDocument,

    #[error("No document is loaded. Upload a PDF first.")]
    NoDocument,

    #[error("No summary is available. Load a PDF and summarize it first.")]
    NoSummary,

    #[error("The question is empty")]
    EmptyQuestion,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ActionError {
    pub fn code(&self) -> &'static str {
        match self {
            ActionError::Extraction(_) | ActionError::EmptyDocument => "ERR_EXTRACTION",
            ActionError::NoDocument => "ERR_NO_DOCUMENT",
            ActionError::NoSummary => "ERR_NO_SUMMARY",
            ActionError::EmptyQuestion => "ERR_EMPTY_QUESTION",
            ActionError::Api(e) => e.code(),
        }
    }
}

/// What happened to the automatic summarization that follows an upload.
#[derive(Debug)]
pub enum SummaryOutcome {
    Ready(String),
    Skipped,
    Failed(ApiError),
}

#[derive(Debug)]
pub struct UploadOutcome {
    pub filename: String,
    pub characters: usize,
    /// Start of the extracted text, for a quick sanity check by the user.
    pub preview: String,
    pub summary: SummaryOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: SessionState,
    pub filename: Option<String>,
    pub text_characters: usize,
    pub summary: Option<String>,
    pub gemini_key_set: bool,
    pub eleven_labs_key_set: bool,
    pub gemini_model: String,
    pub voice_id: String,
}

/// Per-client context: the loaded document, its summary and the pasted keys.
///
/// Every action performs at most one client call and replaces whole fields,
/// so the state is always one of `SessionState`'s variants.
pub struct Session {
    gemini: GeminiService,
    speech: SpeechService,
    document: Option<LoadedDocument>,
    summary: Option<String>,
    gemini_key: Option<Credential>,
    speech_key: Option<Credential>,
}

impl Session {
    pub fn new(gemini: GeminiService, speech: SpeechService) -> Self {
        Self {
            gemini,
            speech,
            document: None,
            summary: None,
            gemini_key: None,
            speech_key: None,
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.document, &self.summary) {
            (None, _) => SessionState::Empty,
            (Some(_), None) => SessionState::DocumentLoaded,
            (Some(_), Some(_)) => SessionState::Summarized,
        }
    }

    #[cfg(test)]
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    #[cfg(test)]
    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    /// `None` leaves a key untouched; an empty string clears it.
    pub fn set_credentials(&mut self, gemini_key: Option<&str>, speech_key: Option<&str>) {
        if let Some(raw) = gemini_key {
            self.gemini_key = Credential::new(raw);
            info!(
                "Gemini API key {}",
                if self.gemini_key.is_some() { "set" } else { "cleared" }
            );
        }
        if let Some(raw) = speech_key {
            self.speech_key = Credential::new(raw);
            info!(
                "ElevenLabs API key {}",
                if self.speech_key.is_some() { "set" } else { "cleared" }
            );
        }
    }

    /// Replaces the current document, then summarizes it when a Gemini key is set.
    ///
    /// Prior document and summary are discarded before extraction starts, so a
    /// failed upload always ends in `Empty`.
    pub async fn upload(&mut self, upload: UploadedDocument) -> Result<UploadOutcome, ActionError> {
        self.document = None;
        self.summary = None;

        let UploadedDocument { filename, bytes } = upload;
        info!("Loading document '{}' ({} bytes)", filename, bytes.len());

        if !pdf::is_pdf(&bytes) {
            warn!("Rejected '{}': not a PDF", filename);
            return Err(ExtractionError::NotPdf.into());
        }

        let text = pdf::extract(&bytes).map_err(|e| {
            warn!("Extraction failed for '{}': {}", filename, e);
            e
        })?;
        drop(bytes);

        if text.trim().is_empty() {
            warn!("No extractable text in '{}'", filename);
            return Err(ActionError::EmptyDocument);
        }

        let characters = text.chars().count();
        let preview = safe_truncate_utf8(text.trim(), PREVIEW_BYTES, "...");
        let summary = match self.gemini_key.as_ref() {
            None => {
                info!("Gemini API key not set - summarization skipped");
                SummaryOutcome::Skipped
            }
            Some(key) => match self.gemini.summarize(&text, Some(key)).await {
                Ok(summary) => {
                    self.summary = Some(summary.clone());
                    SummaryOutcome::Ready(summary)
                }
                Err(e) => {
                    warn!("Summarization of '{}' failed: {}", filename, e);
                    SummaryOutcome::Failed(e)
                }
            },
        };

        self.document = Some(LoadedDocument {
            filename: filename.clone(),
            text,
        });

        Ok(UploadOutcome {
            filename,
            characters,
            preview,
            summary,
        })
    }

    /// Summarizes the loaded document. A failure keeps whatever summary was stored.
    pub async fn summarize(&mut self) -> Result<String, ActionError> {
        let document = self.document.as_ref().ok_or(ActionError::NoDocument)?;
        let summary = self
            .gemini
            .summarize(&document.text, self.gemini_key.as_ref())
            .await?;
        self.summary = Some(summary.clone());
        Ok(summary)
    }

    /// Answers a question from the loaded document. Answers are not kept.
    pub async fn ask(&self, question: &str) -> Result<String, ActionError> {
        let document = self.document.as_ref().ok_or(ActionError::NoDocument)?;
        let question = question.trim();
        if question.is_empty() {
            return Err(ActionError::EmptyQuestion);
        }
        Ok(self
            .gemini
            .answer(question, &document.text, self.gemini_key.as_ref())
            .await?)
    }

    /// Reads the current summary aloud. The clip is not kept.
    pub async fn generate_audio(&self) -> Result<AudioClip, ActionError> {
        let summary = self.summary.as_deref().ok_or(ActionError::NoSummary)?;
        Ok(self
            .speech
            .synthesize(summary, self.speech_key.as_ref())
            .await?)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state(),
            filename: self.document.as_ref().map(|d| d.filename.clone()),
            text_characters: self
                .document
                .as_ref()
                .map(|d| d.text.chars().count())
                .unwrap_or(0),
            summary: self.summary.clone(),
            gemini_key_set: self.gemini_key.is_some(),
            eleven_labs_key_set: self.speech_key.is_some(),
            gemini_model: self.gemini.model().to_string(),
            voice_id: self.speech.voice_id().to_string(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{pdf_upload, session_with};
    use super::*;
    use crate::utils::http::mock::{gemini_envelope, MockTransport};
    use std::sync::Arc;

    #[tokio::test]
    async fn upload_with_key_summarizes_and_reaches_summarized() {
        let gemini = Arc::new(MockTransport::new().reply_json(200, gemini_envelope("Hello world")));
        let speech = Arc::new(MockTransport::new());
        let mut session = session_with(&gemini, &speech);
        session.set_credentials(Some("gem"), None);

        let outcome = session
            .upload(pdf_upload("report.pdf", &["Quarterly report"]))
            .await
            .unwrap();

        assert!(matches!(outcome.summary, SummaryOutcome::Ready(ref s) if s == "Hello world"));
        assert_eq!(outcome.filename, "report.pdf");
        assert_eq!(session.state(), SessionState::Summarized);
        assert_eq!(session.summary(), Some("Hello world"));
        assert!(session.document().unwrap().text.contains("Quarterly"));
    }

    #[tokio::test]
    async fn upload_without_key_loads_document_and_skips_summary() {
        let gemini = Arc::new(MockTransport::new());
        let speech = Arc::new(MockTransport::new());
        let mut session = session_with(&gemini, &speech);

        let outcome = session.upload(pdf_upload("a.pdf", &["Text"])).await.unwrap();

        assert!(matches!(outcome.summary, SummaryOutcome::Skipped));
        assert_eq!(session.state(), SessionState::DocumentLoaded);
        assert_eq!(gemini.call_count(), 0);
    }

    #[tokio::test]
    async fn corrupt_upload_populates_nothing() {
        let gemini = Arc::new(MockTransport::new());
        let speech = Arc::new(MockTransport::new());
        let mut session = session_with(&gemini, &speech);
        session.set_credentials(Some("gem"), Some("xi"));

        let result = session
            .upload(UploadedDocument {
                filename: "broken.pdf".to_string(),
                bytes: b"%PDF-1.7 garbage".to_vec(),
            })
            .await;

        assert!(matches!(result, Err(ActionError::Extraction(_))));
        assert_eq!(session.state(), SessionState::Empty);
        assert!(session.summary().is_none());
        assert!(matches!(session.ask("anything").await, Err(ActionError::NoDocument)));
        assert!(matches!(session.generate_audio().await, Err(ActionError::NoSummary)));
        assert_eq!(gemini.call_count(), 0);
        assert_eq!(speech.call_count(), 0);
    }

    #[tokio::test]
    async fn non_pdf_upload_is_rejected_before_parsing() {
        let gemini = Arc::new(MockTransport::new());
        let speech = Arc::new(MockTransport::new());
        let mut session = session_with(&gemini, &speech);

        let result = session
            .upload(UploadedDocument {
                filename: "notes.txt".to_string(),
                bytes: b"just some notes".to_vec(),
            })
            .await;

        assert!(matches!(
            result,
            Err(ActionError::Extraction(ExtractionError::NotPdf))
        ));
        assert_eq!(result.unwrap_err().code(), "ERR_EXTRACTION");
    }

    #[tokio::test]
    async fn failed_second_upload_clears_prior_summary() {
        let gemini = Arc::new(MockTransport::new().reply_json(200, gemini_envelope("First summary")));
        let speech = Arc::new(MockTransport::new());
        let mut session = session_with(&gemini, &speech);
        session.set_credentials(Some("gem"), None);
        session.upload(pdf_upload("one.pdf", &["First"])).await.unwrap();
        assert_eq!(session.summary(), Some("First summary"));

        let result = session
            .upload(UploadedDocument {
                filename: "two.pdf".to_string(),
                bytes: b"%PDF-1.4 broken".to_vec(),
            })
            .await;

        assert!(result.is_err());
        assert!(session.summary().is_none());
        assert_eq!(session.state(), SessionState::Empty);
    }

    #[tokio::test]
    async fn second_upload_discards_summary_before_new_summarization() {
        let gemini = Arc::new(
            MockTransport::new()
                .reply_json(200, gemini_envelope("First summary"))
                .reply(500, "internal"),
        );
        let speech = Arc::new(MockTransport::new());
        let mut session = session_with(&gemini, &speech);
        session.set_credentials(Some("gem"), None);
        session.upload(pdf_upload("one.pdf", &["First"])).await.unwrap();

        let outcome = session.upload(pdf_upload("two.pdf", &["Second"])).await.unwrap();

        assert!(matches!(
            outcome.summary,
            SummaryOutcome::Failed(ApiError::Http { status: 500, .. })
        ));
        assert!(session.summary().is_none());
        assert_eq!(session.state(), SessionState::DocumentLoaded);
        assert_eq!(session.document().unwrap().filename, "two.pdf");
    }

    #[tokio::test]
    async fn ask_without_document_makes_no_request() {
        let gemini = Arc::new(MockTransport::new().reply_json(200, gemini_envelope("unused")));
        let speech = Arc::new(MockTransport::new());
        let mut session = session_with(&gemini, &speech);
        session.set_credentials(Some("gem"), None);

        let result = session.ask("What is this?").await;

        assert!(matches!(result, Err(ActionError::NoDocument)));
        assert_eq!(gemini.call_count(), 0);
    }

    #[tokio::test]
    async fn ask_without_model_key_is_missing_credential() {
        let gemini = Arc::new(MockTransport::new());
        let speech = Arc::new(MockTransport::new());
        let mut session = session_with(&gemini, &speech);
        session.upload(pdf_upload("a.pdf", &["Facts"])).await.unwrap();

        let result = session.ask("Which facts?").await;

        assert!(matches!(
            result,
            Err(ActionError::Api(ApiError::MissingCredential { .. }))
        ));
        assert_eq!(gemini.call_count(), 0);
    }

    #[tokio::test]
    async fn ask_sends_question_and_does_not_store_answer() {
        let gemini = Arc::new(
            MockTransport::new()
                .reply_json(200, gemini_envelope("Summary"))
                .reply_json(200, gemini_envelope("The answer")),
        );
        let speech = Arc::new(MockTransport::new());
        let mut session = session_with(&gemini, &speech);
        session.set_credentials(Some("gem"), None);
        session.upload(pdf_upload("a.pdf", &["Facts"])).await.unwrap();

        assert!(matches!(session.ask("   ").await, Err(ActionError::EmptyQuestion)));
        let answer = session.ask("  Which facts?  ").await.unwrap();

        assert_eq!(answer, "The answer");
        assert_eq!(session.summary(), Some("Summary"));
        let prompt = gemini.requests()[1].body["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(prompt.contains("Question: Which facts?\n"));
        assert_eq!(gemini.call_count(), 2);
    }

    #[tokio::test]
    async fn audio_without_speech_key_makes_no_request() {
        let gemini = Arc::new(MockTransport::new().reply_json(200, gemini_envelope("Summary")));
        let speech = Arc::new(MockTransport::new().reply(200, b"\xff\xfb".to_vec()));
        let mut session = session_with(&gemini, &speech);
        session.set_credentials(Some("gem"), None);
        session.upload(pdf_upload("a.pdf", &["Facts"])).await.unwrap();

        let result = session.generate_audio().await;

        assert!(matches!(
            result,
            Err(ActionError::Api(ApiError::MissingCredential { service: "ElevenLabs" }))
        ));
        assert_eq!(speech.call_count(), 0);
    }

    #[tokio::test]
    async fn failed_audio_keeps_summary() {
        let gemini = Arc::new(MockTransport::new().reply_json(200, gemini_envelope("Summary")));
        let speech = Arc::new(
            MockTransport::new()
                .reply(500, "tts down")
                .reply(200, b"\xff\xfb\x90".to_vec()),
        );
        let mut session = session_with(&gemini, &speech);
        session.set_credentials(Some("gem"), Some("xi"));
        session.upload(pdf_upload("a.pdf", &["Facts"])).await.unwrap();

        assert!(session.generate_audio().await.is_err());
        assert_eq!(session.state(), SessionState::Summarized);

        let clip = session.generate_audio().await.unwrap();
        assert_eq!(clip.bytes, b"\xff\xfb\x90".to_vec());
        assert_eq!(speech.requests()[1].body["text"], "Summary");
    }

    #[tokio::test]
    async fn explicit_summarize_after_key_is_pasted() {
        let gemini = Arc::new(MockTransport::new().reply_json(200, gemini_envelope("Late summary")));
        let speech = Arc::new(MockTransport::new());
        let mut session = session_with(&gemini, &speech);

        assert!(matches!(session.summarize().await, Err(ActionError::NoDocument)));
        session.upload(pdf_upload("a.pdf", &["Facts"])).await.unwrap();
        assert!(matches!(
            session.summarize().await,
            Err(ActionError::Api(ApiError::MissingCredential { .. }))
        ));

        session.set_credentials(Some("gem"), None);
        assert_eq!(session.summarize().await.unwrap(), "Late summary");
        assert_eq!(session.state(), SessionState::Summarized);
    }

    #[test]
    fn credentials_can_be_set_and_cleared_independently() {
        let gemini = Arc::new(MockTransport::new());
        let speech = Arc::new(MockTransport::new());
        let mut session = session_with(&gemini, &speech);

        session.set_credentials(Some("gem"), Some("xi"));
        session.set_credentials(Some(""), None);

        let status = session.status();
        assert!(!status.gemini_key_set);
        assert!(status.eleven_labs_key_set);
        assert_eq!(status.state, SessionState::Empty);
        assert_eq!(status.voice_id, "21m00Tcm4obsnInGRB_v");
    }
}
