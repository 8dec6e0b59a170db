//! Note command façade.
//!
//! # Responsibility
//! - Single entry point for create/update/delete/search/enhance commands.
//! - Own the registry of editing sessions and their enhancement tasks.
//!
//! # Invariants
//! - Every mutation goes through the `NoteStore` writer.
//! - Store and enhancement failures surface as `NoteServiceError` values.
//! - Closing a session cancels its in-flight enhancement.

use crate::config::{CoreConfig, EnhancementConfig};
use crate::enhance::{
    EnhanceError, EnhancementRun, EnhancementSession, EnhancementSink, GeminiGenerator, SessionId,
    TextGenerator,
};
use crate::model::note::{Note, NoteColor, NoteId, NoteValidationError};
use crate::repo::note_repo::RepoError;
use crate::search::projection::SearchStream;
use crate::store::{NoteStore, StoreCell, StoreError, Subscription};
use async_trait::async_trait;
use log::info;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};

/// Service error for note use-cases.
#[derive(Debug)]
pub enum NoteServiceError {
    Validation(NoteValidationError),
    NoteNotFound(NoteId),
    UnknownSession(SessionId),
    Enhance(EnhanceError),
    Store(StoreError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for NoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::UnknownSession(id) => write!(f, "unknown editing session: {id}"),
            Self::Enhance(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent note state: {details}"),
        }
    }
}

impl Error for NoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Enhance(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for NoteServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Repo(RepoError::NotFound(id)) => Self::NoteNotFound(id),
            StoreError::Repo(RepoError::Validation(err)) => Self::Validation(err),
            other => Self::Store(other),
        }
    }
}

impl From<EnhanceError> for NoteServiceError {
    fn from(value: EnhanceError) -> Self {
        Self::Enhance(value)
    }
}

/// Writes enhanced text into a persisted note's description.
struct NoteDescriptionSink {
    store: NoteStore,
    note_id: NoteId,
}

#[async_trait]
impl EnhancementSink for NoteDescriptionSink {
    async fn apply(&self, text: &str) -> Result<(), String> {
        self.store
            .update_description(self.note_id, text)
            .await
            .map_err(|err| match err {
                StoreError::Repo(RepoError::NotFound(id)) => {
                    format!("note {id} no longer exists")
                }
                other => other.to_string(),
            })
    }
}

/// Command façade over the note store and enhancement sessions.
pub struct NoteService {
    store: NoteStore,
    generator: Arc<dyn TextGenerator>,
    enhancement: EnhancementConfig,
    sessions: Mutex<HashMap<SessionId, Arc<EnhancementSession>>>,
}

impl NoteService {
    pub fn new(
        store: NoteStore,
        generator: Arc<dyn TextGenerator>,
        enhancement: EnhancementConfig,
    ) -> Self {
        Self {
            store,
            generator,
            enhancement,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Opens the process store through `cell` and wires the Gemini generator.
    pub fn from_config(cell: &StoreCell, config: &CoreConfig) -> Result<Self, NoteServiceError> {
        let store = cell.get_or_open(&config.db_path)?;
        let generator = GeminiGenerator::new(
            config.enhancement.endpoint.as_str(),
            config.enhancement.model.as_str(),
            config.enhancement.api_key.clone(),
        );
        Ok(Self::new(
            store,
            Arc::new(generator),
            config.enhancement.clone(),
        ))
    }

    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    /// Creates a note; blank titles are rejected without persisting.
    pub async fn create_note(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
        color: NoteColor,
    ) -> Result<Note, NoteServiceError> {
        let id = self
            .store
            .insert(Note::draft(title, description, color))
            .await?;
        self.store
            .by_id(id)
            .await?
            .ok_or(NoteServiceError::InconsistentState(
                "created note not found in read-back",
            ))
    }

    /// Replaces title, description and color of an existing note.
    pub async fn update_note(
        &self,
        id: NoteId,
        title: impl Into<String>,
        description: impl Into<String>,
        color: NoteColor,
    ) -> Result<Note, NoteServiceError> {
        let mut note = Note::draft(title, description, color);
        note.id = id;
        self.store.update(note).await?;
        self.store
            .by_id(id)
            .await?
            .ok_or(NoteServiceError::InconsistentState(
                "updated note not found in read-back",
            ))
    }

    /// Deletes a note; unknown ids succeed without effect.
    pub async fn delete_note(&self, id: NoteId) -> Result<(), NoteServiceError> {
        self.store.delete(id).await?;
        Ok(())
    }

    pub async fn get_note(&self, id: NoteId) -> Result<Option<Note>, NoteServiceError> {
        Ok(self.store.by_id(id).await?)
    }

    pub async fn list_notes(&self) -> Result<Vec<Note>, NoteServiceError> {
        Ok(self.store.all().await?)
    }

    /// Live full-collection snapshots.
    pub fn notes(&self) -> Subscription {
        self.store.subscribe()
    }

    /// Live filtered view; change the query through `query_handle()`.
    pub fn search(&self, query: impl Into<String>) -> SearchStream {
        SearchStream::new(self.store.subscribe(), query)
    }

    /// Starts an editing session over `draft`.
    ///
    /// Sessions bound to a persisted note write successful enhancements back
    /// to that note's description.
    pub fn open_session(&self, note_id: Option<NoteId>, draft: impl Into<String>) -> SessionId {
        let mut session =
            EnhancementSession::new(Arc::clone(&self.generator), self.enhancement.clone(), draft);
        if let Some(note_id) = note_id {
            session = session.with_sink(Arc::new(NoteDescriptionSink {
                store: self.store.clone(),
                note_id,
            }));
        }

        let id = session.id();
        self.lock_sessions().insert(id, Arc::new(session));
        info!(
            "event=session_open module=service status=ok session_id={id} bound={}",
            note_id.is_some()
        );
        id
    }

    pub fn draft(&self, session_id: SessionId) -> Result<String, NoteServiceError> {
        Ok(self.session(session_id)?.draft())
    }

    pub fn set_draft(
        &self,
        session_id: SessionId,
        text: impl Into<String>,
    ) -> Result<(), NoteServiceError> {
        self.session(session_id)?.set_draft(text);
        Ok(())
    }

    /// Starts enhancing `text` for the session on the caller's Tokio runtime.
    ///
    /// # Errors
    /// - `Enhance(Busy)` while a previous run for the session is active.
    /// - `Enhance(NoRuntime)` when called from a thread without a runtime.
    pub fn enhance_draft(
        &self,
        session_id: SessionId,
        text: impl Into<String>,
    ) -> Result<EnhancementRun, NoteServiceError> {
        Ok(self.session(session_id)?.start(text)?)
    }

    /// Cancels the session's in-flight enhancement, keeping the session open.
    pub fn cancel_enhancement(&self, session_id: SessionId) -> Result<(), NoteServiceError> {
        self.session(session_id)?.cancel();
        Ok(())
    }

    /// Ends a session. Unknown or already closed ids are ignored.
    pub fn close_session(&self, session_id: SessionId) {
        if let Some(session) = self.lock_sessions().remove(&session_id) {
            session.close();
            info!("event=session_close module=service status=ok session_id={session_id}");
        }
    }

    fn session(&self, session_id: SessionId) -> Result<Arc<EnhancementSession>, NoteServiceError> {
        self.lock_sessions()
            .get(&session_id)
            .cloned()
            .ok_or(NoteServiceError::UnknownSession(session_id))
    }

    fn lock_sessions(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<SessionId, Arc<EnhancementSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
