//! Record store with reactive snapshot propagation.
//!
//! # Responsibility
//! - Serialize every note operation through one writer thread.
//! - Expose async CRUD plus live snapshot subscriptions.
//! - Guarantee at most one store (and connection) per [`StoreCell`].
//!
//! # Invariants
//! - Only the writer thread touches the database.
//! - Each mutation that changed a row publishes exactly one snapshot, in
//!   apply order.

mod broadcast;
mod writer;

pub use broadcast::{ChangeBroadcaster, NoteSnapshot, Subscription};

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::note::{Note, NoteId};
use crate::repo::note_repo::{NoteRepository, RepoError, RepoResult, SqliteNoteRepository};
use log::info;
use once_cell::sync::OnceCell;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::oneshot;
use writer::{spawn_writer, CommandSender, StoreCommand};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Repo(RepoError),
    /// The writer thread is gone; no further commands can run.
    WriterStopped,
    WriterSpawn(std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Repo(RepoError::NotFound(_)))
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::WriterStopped => write!(f, "note store writer has stopped"),
            Self::WriterSpawn(err) => write!(f, "failed to start note store writer: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::WriterStopped => None,
            Self::WriterSpawn(err) => Some(err),
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

/// Cloneable handle to the single note store.
#[derive(Clone)]
pub struct NoteStore {
    commands: CommandSender,
    broadcaster: Arc<ChangeBroadcaster>,
}

impl NoteStore {
    /// Opens (and migrates) a database file, then starts the writer.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::from_connection(open_db(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(open_db_in_memory()?)
    }

    /// Takes ownership of a migrated connection and starts the writer.
    pub fn from_connection(conn: Connection) -> StoreResult<Self> {
        let initial = SqliteNoteRepository::try_new(&conn)?.list_notes()?;
        info!(
            "event=store_open module=store status=ok note_count={}",
            initial.len()
        );
        let broadcaster = Arc::new(ChangeBroadcaster::new(initial));
        let commands = spawn_writer(conn, Arc::clone(&broadcaster)).map_err(StoreError::WriterSpawn)?;
        Ok(Self {
            commands,
            broadcaster,
        })
    }

    /// Persists a new note; rejects blank titles without writing.
    pub async fn insert(&self, note: Note) -> StoreResult<NoteId> {
        self.request(|reply| StoreCommand::Insert { note, reply })
            .await
    }

    /// Replaces the mutable fields of `note.id`; `NotFound` when absent.
    pub async fn update(&self, note: Note) -> StoreResult<()> {
        self.request(|reply| StoreCommand::Update { note, reply })
            .await
    }

    /// Replaces only the description of `id`; other fields keep whatever the
    /// writer last committed. `NotFound` when absent.
    pub async fn update_description(
        &self,
        id: NoteId,
        description: impl Into<String>,
    ) -> StoreResult<()> {
        let description = description.into();
        self.request(|reply| StoreCommand::UpdateDescription {
            id,
            description,
            reply,
        })
        .await
    }

    /// Removes a note. Deleting a missing id succeeds without effect.
    pub async fn delete(&self, id: NoteId) -> StoreResult<()> {
        self.request(|reply| StoreCommand::Delete { id, reply })
            .await
            .map(|_| ())
    }

    /// Every note, in insertion order.
    pub async fn all(&self) -> StoreResult<Vec<Note>> {
        self.request(|reply| StoreCommand::All { reply }).await
    }

    pub async fn by_id(&self, id: NoteId) -> StoreResult<Option<Note>> {
        self.request(|reply| StoreCommand::ById { id, reply })
            .await
    }

    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    pub fn latest(&self) -> NoteSnapshot {
        self.broadcaster.latest()
    }

    /// Whether both handles point at the same underlying store.
    pub fn same_store(&self, other: &NoteStore) -> bool {
        Arc::ptr_eq(&self.broadcaster, &other.broadcaster)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<RepoResult<T>>) -> StoreCommand,
    ) -> StoreResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| StoreError::WriterStopped)?;
        let result = response.await.map_err(|_| StoreError::WriterStopped)?;
        Ok(result?)
    }
}

/// One-time holder for the process-wide store.
///
/// Concurrent first callers block until the single opener finishes; a failed
/// open leaves the cell empty so a later call can retry.
pub struct StoreCell {
    cell: OnceCell<NoteStore>,
}

impl StoreCell {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub fn get_or_open(&self, path: impl AsRef<Path>) -> StoreResult<NoteStore> {
        self.cell
            .get_or_try_init(|| NoteStore::open(path))
            .cloned()
    }

    pub fn get(&self) -> Option<NoteStore> {
        self.cell.get().cloned()
    }
}

impl Default for StoreCell {
    fn default() -> Self {
        Self::new()
    }
}
