//! OpenAI-compatible chat completions client.
//!
//! Talks to `{base_url}/chat/completions`, either in one shot
//! ([`LlmClient::complete`]) or as a server-sent event stream
//! ([`LlmClient::stream`]) whose `choices[0].delta.content` tokens are
//! forwarded over a `tokio::sync::mpsc` channel until `data: [DONE]`.
//!
//! `timeout_secs` bounds a one-shot request end to end. For streams it bounds
//! the wait for response headers and each gap between body chunks, so a long
//! answer that keeps producing tokens is never cut off.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::LlmConfig;
use crate::models::Role;

/// Tokens buffered between the HTTP reader task and the consumer.
const STREAM_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed LLM response: {0}")]
    Malformed(String),
    #[error("LLM endpoint went quiet for {0}s")]
    Timeout(u64),
}

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl LlmClient {
    pub fn from_config(config: &LlmConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder().connect_timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, messages: &[ChatMessage], stream: bool) -> reqwest::RequestBuilder {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": stream,
        });
        let builder = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, messages: &[ChatMessage], stream: bool) -> Result<reqwest::Response, LlmError> {
        let mut builder = self.request(messages, stream);
        if !stream {
            builder = builder.timeout(self.timeout);
        }
        let res = tokio::time::timeout(self.timeout, builder.send())
            .await
            .map_err(|_| LlmError::Timeout(self.timeout.as_secs()))??;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(res)
    }

    /// Non-streaming completion; returns `choices[0].message.content`.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let res = self.send(messages, false).await?;
        let json: Value = res.json().await?;
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::Malformed("missing choices[0].message.content".to_string()))
    }

    /// Streaming completion. Tokens arrive on the returned receiver; the
    /// channel closes after `[DONE]`, at end of body, or after an error item.
    pub async fn stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<mpsc::Receiver<Result<String, LlmError>>, LlmError> {
        let res = self.send(messages, true).await?;
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let mut body = res.bytes_stream();
        let idle = self.timeout;

        tokio::spawn(async move {
            // Network chunks may split lines; carry the tail over.
            let mut pending: Vec<u8> = Vec::new();
            loop {
                let item = match tokio::time::timeout(idle, body.next()).await {
                    Ok(Some(item)) => item,
                    Ok(None) => break,
                    Err(_) => {
                        tracing::warn!(idle_secs = idle.as_secs(), "LLM stream stalled");
                        let _ = tx.send(Err(LlmError::Timeout(idle.as_secs()))).await;
                        return;
                    }
                };
                let bytes = match item {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(Err(LlmError::Http(e))).await;
                        return;
                    }
                };
                pending.extend_from_slice(&bytes);

                while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line);
                    match parse_sse_line(&line) {
                        SseLine::Done => return,
                        SseLine::Delta(token) => {
                            if tx.send(Ok(token)).await.is_err() {
                                return;
                            }
                        }
                        SseLine::Skip => {}
                    }
                }
            }
            if let SseLine::Delta(token) = parse_sse_line(&String::from_utf8_lossy(&pending)) {
                let _ = tx.send(Ok(token)).await;
            }
        });

        Ok(rx)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Done,
    Delta(String),
    Skip,
}

/// Classify one line of an OpenAI-style event stream.
fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    let data = match line.strip_prefix("data:") {
        Some(data) => data.trim_start(),
        None => return SseLine::Skip,
    };
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<Value>(data) {
        Ok(json) => match json["choices"][0]["delta"]["content"].as_str() {
            Some(content) if !content.is_empty() => SseLine::Delta(content.to_string()),
            _ => SseLine::Skip,
        },
        Err(e) => {
            tracing::debug!("skipping unparseable stream line: {}", e);
            SseLine::Skip
        }
    }
}
