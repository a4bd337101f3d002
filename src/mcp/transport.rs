use anyhow::Result;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, error};

use super::types::{McpMessage, McpNotification, McpRequest, McpResponse};

/// Newline-delimited JSON-RPC over a reader/writer pair (stdin/stdout in production).
pub struct LineTransport<R, W> {
    reader: FramedRead<BufReader<R>, LinesCodec>,
    writer: FramedWrite<W, LinesCodec>,
}

pub type StdioTransport = LineTransport<tokio::io::Stdin, tokio::io::Stdout>;

impl StdioTransport {
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: FramedRead::new(BufReader::new(reader), LinesCodec::new()),
            writer: FramedWrite::new(writer, LinesCodec::new()),
        }
    }

    /// Returns `Ok(None)` on EOF. Malformed lines come back as `McpMessage::Invalid`
    /// so one bad line does not end the session.
    pub async fn read_message(&mut self) -> Result<Option<McpMessage>> {
        loop {
            match self.reader.next().await {
                Some(Ok(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    debug!("Received {} bytes", line.len());
                    return Ok(Some(parse_message(&line)));
                }
                Some(Err(e)) => {
                    error!("Error reading from stdin: {}", e);
                    return Err(anyhow::anyhow!("Transport error: {}", e));
                }
                None => {
                    debug!("EOF reached");
                    return Ok(None);
                }
            }
        }
    }

    pub async fn write_response(&mut self, response: McpResponse) -> Result<()> {
        let json = serde_json::to_string(&response)?;
        // Tool results may contain the summary or base64 audio; log size only.
        debug!("Sending {} bytes", json.len());

        self.writer.send(json).await?;

        Ok(())
    }

    #[cfg(test)]
    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }
}

/// Requests carry an `id`; anything without one is a notification.
pub fn parse_message(line: &str) -> McpMessage {
    let value = match serde_json::from_str::<serde_json::Value>(line) {
        Ok(value) => value,
        Err(e) => {
            error!("Failed to parse JSON: {}", e);
            return McpMessage::Invalid(format!("Invalid JSON: {}", e));
        }
    };

    let Some(obj) = value.as_object() else {
        error!("Invalid JSON-RPC message structure");
        return McpMessage::Invalid("Invalid JSON-RPC message structure".to_string());
    };

    if obj.contains_key("id") {
        match serde_json::from_value::<McpRequest>(value) {
            Ok(request) => McpMessage::Request(request),
            Err(e) => {
                error!("Failed to parse request: {}", e);
                McpMessage::Invalid(format!("Invalid JSON-RPC request: {}", e))
            }
        }
    } else {
        match serde_json::from_value::<McpNotification>(value) {
            Ok(notification) => McpMessage::Notification(notification),
            Err(e) => {
                error!("Failed to parse notification: {}", e);
                McpMessage::Invalid(format!("Invalid JSON-RPC notification: {}", e))
            }
        }
    }
}
