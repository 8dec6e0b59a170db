//! Core domain logic for Notey.
//! This crate is the single source of truth for note storage, live snapshot
//! propagation, search projection and content enhancement.

pub mod config;
pub mod db;
pub mod enhance;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod store;

pub use config::{CoreConfig, EnhancementConfig};
pub use enhance::{
    EnhanceError, EnhancementOutcome, EnhancementRun, EnhancementSession, EnhancementSink,
    EnhancementState, EnhancementStatus, GeminiGenerator, GeneratedText, GenerationError,
    ProgressPlan, SessionId, TextGenerator,
};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::note::{Note, NoteColor, NoteId, NoteValidationError};
pub use repo::note_repo::{NoteRepository, RepoError, RepoResult, SqliteNoteRepository};
pub use search::projection::{filter_notes, QueryHandle, SearchProjection, SearchStream};
pub use service::note_service::{NoteService, NoteServiceError};
pub use store::{
    ChangeBroadcaster, NoteSnapshot, NoteStore, StoreCell, StoreError, StoreResult, Subscription,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
