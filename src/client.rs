use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::settings::Endpoint;

pub const FALLBACK_REPLY: &str = "An error occurred while communicating with the model.";
pub const NO_RESPONSE: &str = "No response received.";

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// One stateless exchange: the system framing plus a single user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub system: String,
    pub user: String,
}

impl ConversationTurn {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode response body: {0}")]
    Decode(String),
}

pub trait ChatModel {
    fn send(&self, turn: &ConversationTurn) -> Result<String, ChatError>;

    /// Collapses any failure into [`FALLBACK_REPLY`] after logging it.
    fn send_or_fallback(&self, turn: &ConversationTurn) -> String {
        match self.send(turn) {
            Ok(reply) => reply,
            Err(error) => {
                warn!(error = %error, "chat completion failed, using fallback reply");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    url: String,
    model: String,
    temperature: f64,
}

impl ChatClient {
    pub fn new(endpoint: &Endpoint) -> Result<Self> {
        let timeout = endpoint.timeout_secs.map(Duration::from_secs);
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            url: completions_url(&endpoint.base_url),
            model: endpoint.request_model.clone(),
            temperature: endpoint.temperature,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ChatModel for ChatClient {
    fn send(&self, turn: &ConversationTurn) -> Result<String, ChatError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &turn.system,
                },
                ChatMessage {
                    role: "user",
                    content: &turn.user,
                },
            ],
            temperature: self.temperature,
        };

        debug!(url = %self.url, model = %self.model, "sending chat completion");

        let response = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .map_err(|source| ChatError::Transport {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let body = response.text().map_err(|source| ChatError::Transport {
            url: self.url.clone(),
            source,
        })?;
        let value: Value =
            serde_json::from_str(&body).map_err(|error| ChatError::Decode(error.to_string()))?;

        Ok(reply_content(&value))
    }
}

/// Joins the base URL and the completions path, tolerating either form of the base.
pub fn completions_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with(COMPLETIONS_PATH) {
        return trimmed.to_string();
    }
    format!("{trimmed}{COMPLETIONS_PATH}")
}

fn reply_content(value: &Value) -> String {
    value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or(NO_RESPONSE)
        .trim()
        .to_string()
}
