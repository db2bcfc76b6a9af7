use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
    pub chat_history: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptReply {
    #[serde(rename = "Message", alias = "message")]
    pub message: String,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{}", format_status(.code, .reason))]
    Status { code: u16, reason: String },
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Decode(String),
}

fn format_status(code: &u16, reason: &str) -> String {
    if reason.is_empty() {
        code.to_string()
    } else {
        format!("{}: {}", code, reason)
    }
}

#[async_trait]
pub trait Relay: Send + Sync {
    async fn send(&self, request: &PromptRequest) -> Result<String, RelayError>;
}

#[derive(Clone)]
pub struct HttpRelay {
    url: String,
    client: reqwest::Client,
}

impl HttpRelay {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl Relay for HttpRelay {
    async fn send(&self, request: &PromptRequest) -> Result<String, RelayError> {
        debug!(
            "Relaying prompt ({} chars, {} history entries)",
            request.prompt.chars().count(),
            request.chat_history.len()
        );

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Endpoint answered HTTP {}", status);
            return Err(RelayError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let reply: PromptReply =
            serde_json::from_str(&body).map_err(|e| RelayError::Decode(e.to_string()))?;

        Ok(reply.message)
    }
}
