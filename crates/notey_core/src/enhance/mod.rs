//! Asynchronous content enhancement.
//!
//! # Responsibility
//! - Rewrite a draft description through an external text generator.
//! - Expose progress and a single terminal outcome per run.
//!
//! # Invariants
//! - States move `Idle -> Running -> {Succeeded, Failed, Cancelled} -> Idle`.
//! - User-visible failure text is bounded in length.
//! - Draft and prompt text are never written to logs.

pub mod gemini;
pub mod generator;
pub mod progress;
pub mod session;

use crate::logging::sanitize_message;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub use gemini::GeminiGenerator;
pub use generator::{GeneratedText, GenerationError, TextGenerator};
pub use progress::ProgressPlan;
pub use session::{EnhancementRun, EnhancementSession, EnhancementSink};

/// Identifier of one note-editing session.
pub type SessionId = Uuid;

pub const SUCCESS_MESSAGE: &str = "Content polished by AI successfully!";
const FAILURE_PREFIX: &str = "AI Polishing failed. Please try again later. Error: ";
const FAILURE_DETAIL_CHARS: usize = 50;
const EDITOR_INSTRUCTION: &str = "You are a professional editor. Review this note content for grammar, spelling, and clarity. Only return the corrected, improved version of the text without any introductory or concluding remarks.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnhancementState {
    Idle,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl EnhancementState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Observable session state.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancementStatus {
    pub state: EnhancementState,
    /// In `[0.0, 1.0]`.
    pub progress: f32,
    /// User-facing message for terminal states.
    pub message: Option<String>,
}

impl EnhancementStatus {
    pub fn idle() -> Self {
        Self {
            state: EnhancementState::Idle,
            progress: 0.0,
            message: None,
        }
    }

    fn running() -> Self {
        Self {
            state: EnhancementState::Running,
            progress: 0.0,
            message: None,
        }
    }
}

/// Terminal result of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnhancementOutcome {
    Succeeded { text: String },
    Failed { message: String },
    Cancelled,
}

impl EnhancementOutcome {
    /// Message to show the user; cancellation is silent.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::Succeeded { .. } => Some(SUCCESS_MESSAGE),
            Self::Failed { message } => Some(message.as_str()),
            Self::Cancelled => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnhanceError {
    /// A run is already active (or showing its result) for this session.
    Busy(SessionId),
    SessionClosed(SessionId),
    /// `start` was called outside a Tokio runtime.
    NoRuntime,
}

impl Display for EnhanceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Busy(id) => write!(f, "enhancement already running for session {id}"),
            Self::SessionClosed(id) => write!(f, "editing session {id} is closed"),
            Self::NoRuntime => write!(f, "enhancement requires a running Tokio runtime"),
        }
    }
}

impl Error for EnhanceError {}

/// Builds the editor instruction for `text`.
pub fn build_prompt(text: &str) -> String {
    format!("{EDITOR_INSTRUCTION} Text: \"\"\"{text}\"\"\"")
}

/// User-facing failure text with the diagnostic detail capped.
pub fn failure_message(detail: &str) -> String {
    format!(
        "{FAILURE_PREFIX}{}",
        sanitize_message(detail, FAILURE_DETAIL_CHARS)
    )
}

#[cfg(test)]
mod tests {
    use super::{build_prompt, failure_message, EnhancementOutcome, SUCCESS_MESSAGE};

    #[test]
    fn prompt_wraps_text_in_triple_quotes() {
        let prompt = build_prompt("teh note");
        assert!(prompt.starts_with("You are a professional editor."));
        assert!(prompt.ends_with("Text: \"\"\"teh note\"\"\""));
    }

    #[test]
    fn failure_message_caps_detail_at_fifty_chars() {
        let detail = "x".repeat(500);
        let message = failure_message(&detail);
        let shown = message
            .strip_prefix("AI Polishing failed. Please try again later. Error: ")
            .expect("prefix");
        assert_eq!(shown, format!("{}...", "x".repeat(50)));
    }

    #[test]
    fn cancelled_outcome_has_no_message() {
        assert_eq!(EnhancementOutcome::Cancelled.user_message(), None);
        assert_eq!(
            EnhancementOutcome::Succeeded {
                text: String::new()
            }
            .user_message(),
            Some(SUCCESS_MESSAGE)
        );
    }
}
