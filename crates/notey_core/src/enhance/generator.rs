//! Text generation seam used by the enhancement task.

use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Response of one generation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedText {
    /// Generated replacement text; `None` when the service returned no text.
    pub text: Option<String>,
}

impl GeneratedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    /// Text worth writing back, or `None` for empty/blank responses.
    pub fn usable_text(self) -> Option<String> {
        self.text.filter(|text| !text.trim().is_empty())
    }
}

/// Failure of one generation attempt. Never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    MissingApiKey,
    Transport(String),
    Status { code: u16, body: String },
    Malformed(String),
    Timeout(Duration),
}

impl GenerationError {
    /// Stable code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "missing_api_key",
            Self::Transport(_) => "transport",
            Self::Status { .. } => "http_status",
            Self::Malformed(_) => "malformed_response",
            Self::Timeout(_) => "timeout",
        }
    }
}

impl Display for GenerationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "text generation API key is not configured"),
            Self::Transport(message) => write!(f, "request failed: {message}"),
            Self::Status { code, body } => write!(f, "HTTP {code}: {body}"),
            Self::Malformed(message) => write!(f, "malformed response: {message}"),
            Self::Timeout(limit) => write!(f, "no response within {}s", limit.as_secs()),
        }
    }
}

impl Error for GenerationError {}

/// Single request/response text generation call.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GeneratedText, GenerationError>;
}
