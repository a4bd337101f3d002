use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::transport::LineTransport;
use super::types::*;
use crate::session::Session;
use crate::tools::{
    ask_question_tool::{AskQuestionTool, ASK_QUESTION_TOOL_DEFINITION},
    generate_audio_tool::{GenerateAudioTool, GENERATE_AUDIO_TOOL_DEFINITION},
    load_document_tool::{LoadDocumentTool, LOAD_DOCUMENT_TOOL_DEFINITION},
    session_status_tool::{SessionStatusTool, SESSION_STATUS_TOOL_DEFINITION},
    set_credentials_tool::{SetCredentialsTool, SET_CREDENTIALS_TOOL_DEFINITION},
    summarize_tool::{SummarizeTool, SUMMARIZE_TOOL_DEFINITION},
};
use crate::utils::elevenlabs::SpeechService;
use crate::utils::gemini::GeminiService;
use crate::utils::http::{HttpTransport, ReqwestTransport};

const PROTOCOL_VERSION: &str = "2025-03-26";

/// Non-secret settings fixed at start-up. API keys are collected per session.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub elevenlabs_base_url: String,
    pub voice_id: String,
    pub timeout: Duration,
}

impl ServiceConfig {
    pub fn build_session(&self) -> Result<Session> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(self.timeout)?);
        Ok(self.build_session_with(transport))
    }

    pub fn build_session_with(&self, transport: Arc<dyn HttpTransport>) -> Session {
        let gemini = GeminiService::new(transport.clone())
            .with_base_url(&self.gemini_base_url)
            .with_model(&self.gemini_model);
        let speech = SpeechService::new(transport)
            .with_base_url(&self.elevenlabs_base_url)
            .with_voice(&self.voice_id);
        Session::new(gemini, speech)
    }
}

/// One server per stdio connection, hence one `Session` per client.
pub struct McpServer<R, W> {
    transport: LineTransport<R, W>,
    session: Session,
    initialized: bool,
}

impl<R, W> McpServer<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(transport: LineTransport<R, W>, session: Session) -> Self {
        Self {
            transport,
            session,
            initialized: false,
        }
    }

    /// Serves requests one at a time until the client disconnects.
    pub async fn start(&mut self) -> Result<()> {
        info!("MCP server started and listening on stdio");

        loop {
            match self.transport.read_message().await? {
                Some(message) => match message {
                    McpMessage::Request(request) => {
                        let response = self.handle_request(request).await;
                        self.transport.write_response(response).await?;
                    }
                    McpMessage::Notification(notification) => {
                        self.handle_notification(notification).await;
                    }
                    McpMessage::Invalid(reason) => {
                        let response =
                            McpResponse::failure(serde_json::Value::Null, PARSE_ERROR, reason);
                        self.transport.write_response(response).await?;
                    }
                },
                None => {
                    info!("Client disconnected, session ended");
                    break;
                }
            }
        }

        Ok(())
    }

    #[cfg(test)]
    pub fn into_transport(self) -> LineTransport<R, W> {
        self.transport
    }

    async fn handle_request(&mut self, request: McpRequest) -> McpResponse {
        let id = Self::ensure_valid_id(request.id.clone());

        match request.method.as_str() {
            "initialize" => self.handle_initialize(request).await,
            "tools/list" => self.handle_list_tools(request).await,
            "tools/call" => self.handle_call_tool(request).await,
            "ping" => McpResponse::success(id, serde_json::json!({})),
            _ => McpResponse::failure(id, METHOD_NOT_FOUND, "Method not found"),
        }
    }

    async fn handle_notification(&mut self, notification: McpNotification) {
        debug!("Received notification: {}", notification.method);

        match notification.method.as_str() {
            "notifications/initialized" => {
                info!("Client initialization completed");
                self.initialized = true;
            }
            "notifications/cancelled" => {
                debug!("Cancellation is not supported; request runs to completion");
            }
            _ => {
                warn!("Unknown notification method: {}", notification.method);
            }
        }
    }

    fn ensure_valid_id(id: Option<serde_json::Value>) -> serde_json::Value {
        match id {
            Some(value) => match value {
                serde_json::Value::Null => serde_json::Value::String("0".to_string()),
                _ => value,
            },
            None => serde_json::Value::String("0".to_string()),
        }
    }

    async fn handle_initialize(&mut self, request: McpRequest) -> McpResponse {
        let id = Self::ensure_valid_id(request.id.clone());

        let Some(params) = request.params else {
            return McpResponse::failure(id, INVALID_PARAMS, "Missing params");
        };

        match serde_json::from_value::<InitializeParams>(params) {
            Ok(init_params) => {
                info!(
                    "Initializing for client {} {}",
                    init_params.client_info.name, init_params.client_info.version
                );
                let result = InitializeResult {
                    protocol_version: PROTOCOL_VERSION.to_string(),
                    server_info: ServerInfo {
                        name: "PDF to Podcast MCP".to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                        description: Some(
                            "Summarize a PDF with Gemini, ask questions about it, and listen to the summary via ElevenLabs"
                                .to_string(),
                        ),
                    },
                    capabilities: ServerCapabilities {
                        tools: Some(ToolsCapability {
                            list_changed: Some(false),
                        }),
                        logging: Some(serde_json::json!({})),
                    },
                };
                McpResponse::success(id, result)
            }
            Err(e) => McpResponse::failure(id, INVALID_PARAMS, format!("Invalid params: {}", e)),
        }
    }

    async fn handle_list_tools(&self, request: McpRequest) -> McpResponse {
        let tools = vec![
            SET_CREDENTIALS_TOOL_DEFINITION.clone(),
            LOAD_DOCUMENT_TOOL_DEFINITION.clone(),
            SUMMARIZE_TOOL_DEFINITION.clone(),
            ASK_QUESTION_TOOL_DEFINITION.clone(),
            GENERATE_AUDIO_TOOL_DEFINITION.clone(),
            SESSION_STATUS_TOOL_DEFINITION.clone(),
        ];

        McpResponse::success(Self::ensure_valid_id(request.id), ListToolsResult { tools })
    }

    async fn handle_call_tool(&mut self, request: McpRequest) -> McpResponse {
        let id = Self::ensure_valid_id(request.id.clone());

        let Some(params) = request.params else {
            return McpResponse::failure(id, INVALID_PARAMS, "Missing params");
        };

        if !self.initialized {
            debug!("tools/call received before notifications/initialized");
        }

        match serde_json::from_value::<CallToolParams>(params) {
            Ok(call_params) => {
                let result = self.execute_tool(call_params).await;
                McpResponse::success(id, result)
            }
            Err(e) => McpResponse::failure(id, INVALID_PARAMS, format!("Invalid params: {}", e)),
        }
    }

    async fn execute_tool(&mut self, params: CallToolParams) -> CallToolResult {
        info!("Executing tool: {}", params.name);
        let session = &mut self.session;

        match params.name.as_str() {
            "set-credentials" => SetCredentialsTool::new().execute(session, params.arguments),
            "load-document" => {
                LoadDocumentTool::new()
                    .execute(session, params.arguments)
                    .await
            }
            "summarize" => SummarizeTool::new().execute(session).await,
            "ask-question" => AskQuestionTool::new().execute(session, params.arguments).await,
            "generate-audio" => GenerateAudioTool::new().execute(session).await,
            "session-status" => SessionStatusTool::new().execute(session),
            _ => CallToolResult::error(format!("Tool not found: {}", params.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::http::mock::{gemini_envelope, MockTransport};
    use crate::utils::pdf::fixtures::pdf_with_pages;
    use base64::Engine;
    use serde_json::{json, Value};

    fn config() -> ServiceConfig {
        ServiceConfig {
            gemini_base_url: "https://llm.test/models".to_string(),
            gemini_model: "gemini-test".to_string(),
            elevenlabs_base_url: "https://tts.test/v1/text-to-speech".to_string(),
            voice_id: "voice-1".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Feeds `lines` to a fresh server and returns the parsed responses.
    async fn run_script(mock: Arc<MockTransport>, lines: &[Value]) -> Vec<Value> {
        let mut input = String::new();
        for line in lines {
            input.push_str(&line.to_string());
            input.push('\n');
        }
        let reader: &[u8] = input.as_bytes();
        let transport = LineTransport::new(reader, Vec::<u8>::new());
        let session = config().build_session_with(mock);

        let mut server = McpServer::new(transport, session);
        server.start().await.unwrap();

        let output = server.into_transport().into_writer();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn call(id: u64, name: &str, arguments: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        })
    }

    #[tokio::test]
    async fn full_session_from_upload_to_audio() {
        let mock = Arc::new(
            MockTransport::new()
                .reply_json(200, gemini_envelope("Hello world"))
                .reply_json(200, gemini_envelope("Not found in the document."))
                .reply(200, b"\xff\xfb\x90".to_vec()),
        );
        let pdf = base64::engine::general_purpose::STANDARD.encode(pdf_with_pages(&["Intro", "Body"]));

        let responses = run_script(
            mock.clone(),
            &[
                json!({
                    "jsonrpc": "2.0", "id": 1, "method": "initialize",
                    "params": {
                        "protocolVersion": "2025-03-26",
                        "clientInfo": { "name": "test", "version": "1" }
                    }
                }),
                json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
                json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }),
                call(3, "set-credentials", json!({ "geminiApiKey": "g", "elevenLabsApiKey": "x" })),
                call(4, "load-document", json!({ "data": pdf, "filename": "talk.pdf" })),
                call(5, "ask-question", json!({ "question": "Who is the author?" })),
                call(6, "generate-audio", json!({})),
            ],
        )
        .await;

        assert_eq!(responses.len(), 6);
        assert_eq!(responses[0]["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(responses[1]["result"]["tools"].as_array().unwrap().len(), 6);

        let upload = &responses[3]["result"];
        assert!(upload.get("isError").is_none());
        assert!(upload["content"][0]["text"]
            .as_str()
            .unwrap()
            .ends_with("Hello world"));

        assert_eq!(
            responses[4]["result"]["content"][0]["text"],
            "Answer:\nNot found in the document."
        );

        let audio = &responses[5]["result"]["content"][1];
        assert_eq!(audio["type"], "audio");
        assert_eq!(audio["mimeType"], "audio/mpeg");
        assert_eq!(audio["data"], "//uQ");

        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(
            requests[0].url,
            "https://llm.test/models/gemini-test:generateContent?key=g"
        );
        assert_eq!(requests[2].url, "https://tts.test/v1/text-to-speech/voice-1");
        assert_eq!(requests[2].body["text"], "Hello world");
    }

    #[tokio::test]
    async fn errors_are_answered_and_the_session_continues() {
        let mock = Arc::new(MockTransport::new());

        let responses = run_script(
            mock.clone(),
            &[
                json!({ "jsonrpc": "2.0", "id": 1, "method": "resources/list" }),
                json!("not an object"),
                call(2, "ask-question", json!({ "question": "Anything?" })),
                call(3, "no-such-tool", json!({})),
                json!({ "jsonrpc": "2.0", "id": 4, "method": "ping" }),
            ],
        )
        .await;

        assert_eq!(responses.len(), 5);
        assert_eq!(responses[0]["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(responses[1]["error"]["code"], PARSE_ERROR);
        assert_eq!(responses[1]["id"], Value::Null);
        assert_eq!(responses[2]["result"]["isError"], true);
        assert!(responses[2]["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("ERR_NO_DOCUMENT"));
        assert_eq!(responses[3]["result"]["isError"], true);
        assert_eq!(responses[4]["id"], 4);
        assert_eq!(mock.call_count(), 0);
    }
}
