// =============================================================================
// Gemini chat relay client — streamed generateContent over SSE
// =============================================================================
//
// POST {base_url}/v1beta/models/{model}:streamGenerateContent?alt=sse
//
// The API key travels in the `x-goog-api-key` header and is never logged.
// Upstream SSE frames are decoded incrementally; every text fragment is
// forwarded to the caller's channel as a `RelayEvent::Chunk`.
// =============================================================================

use std::time::Duration;

use anyhow::Context;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::service_config::ChatConfig;

/// One message of the conversation as sent by the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Body of the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

/// What the relay pushes to the SSE response.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Chunk(String),
    Error(String),
}

impl RelayEvent {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Chunk(text) => serde_json::json!({ "chunk": text }),
            Self::Error(message) => serde_json::json!({ "error": message }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("conversation has no messages")]
    EmptyConversation,

    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat API returned {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },

    #[error("failed to decode chat stream: {0}")]
    Decode(#[from] serde_json::Error),
}

// -----------------------------------------------------------------------------
// Wire format
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub role: &'static str,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Map front-end messages onto the API's conversation format.
///
/// `user` stays `user`; every other role is the model's turn.  The last entry
/// is the new prompt, the ones before it are history.
pub fn to_contents(messages: &[ChatMessage]) -> Result<Vec<Content>, ChatError> {
    if messages.is_empty() {
        return Err(ChatError::EmptyConversation);
    }
    Ok(messages
        .iter()
        .map(|m| Content {
            role: if m.role == "user" { "user" } else { "model" },
            parts: vec![Part {
                text: m.content.clone(),
            }],
        })
        .collect())
}

/// Concatenated text of the first candidate in one streamed frame.
fn chunk_text(data: &str) -> Result<Option<String>, serde_json::Error> {
    let chunk: StreamChunk = serde_json::from_str(data)?;
    let text: String = chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    Ok(if text.is_empty() { None } else { Some(text) })
}

// -----------------------------------------------------------------------------
// SSE decoding
// -----------------------------------------------------------------------------

/// Incremental decoder yielding the payload of each complete `data:` line.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    /// Feed raw bytes; returns the payloads completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(data) = data_payload(&line) {
                out.push(data);
            }
        }
        out
    }

    /// Flush a final line that had no trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buf);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.is_empty() {
        None
    } else {
        Some(data.to_string())
    }
}

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

/// Explicitly constructed chat client; lives in application state.
#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl ChatClient {
    /// Build a client from configuration.
    ///
    /// Returns `Ok(None)` when no API key is configured; the relay then
    /// answers every request with a "not configured" error event.  An error
    /// means the HTTP client itself could not be built.
    pub fn from_config(config: &ChatConfig) -> anyhow::Result<Option<Self>> {
        let Some(api_key) = config.api_key.as_deref() else {
            return Ok(None);
        };

        let mut key = HeaderValue::from_str(api_key).context("GEMINI_API_KEY is not a valid header value")?;
        key.set_sensitive(true);
        let mut default_headers = HeaderMap::new();
        default_headers.insert("x-goog-api-key", key);

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build reqwest client for ChatClient")?;

        info!(model = %config.model, "ChatClient initialised");

        Ok(Some(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        }))
    }

    /// Send the conversation and forward streamed text to `tx`.
    ///
    /// Returns early without error if the receiver has gone away.
    #[instrument(skip(self, messages, tx), fields(messages = messages.len()), name = "gemini::stream_chat")]
    pub async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        tx: &mpsc::Sender<RelayEvent>,
    ) -> Result<(), ChatError> {
        let contents = to_contents(messages)?;
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent",
            self.base_url, self.model
        );

        let resp = self
            .client
            .post(&url)
            .query(&[("alt", "sse")])
            .json(&GenerateRequest { contents })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChatError::Status { status, body });
        }

        let mut decoder = SseDecoder::default();
        let mut stream = resp.bytes_stream();
        let mut forwarded = 0usize;

        while let Some(bytes) = stream.next().await {
            for data in decoder.push(&bytes?) {
                if let Some(text) = chunk_text(&data)? {
                    if tx.send(RelayEvent::Chunk(text)).await.is_err() {
                        debug!("chat client disconnected");
                        return Ok(());
                    }
                    forwarded += 1;
                }
            }
        }
        if let Some(data) = decoder.finish() {
            if let Some(text) = chunk_text(&data)? {
                let _ = tx.send(RelayEvent::Chunk(text)).await;
                forwarded += 1;
            }
        }

        debug!(chunks = forwarded, "chat stream finished");
        Ok(())
    }
}
