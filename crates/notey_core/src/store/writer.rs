//! Dedicated writer thread owning the store connection.
//!
//! # Responsibility
//! - Execute every store command in FIFO order on one OS thread.
//! - Publish a fresh snapshot after each mutation that changed a row.
//!
//! # Invariants
//! - The `Connection` never leaves this thread.
//! - A snapshot is published before the mutating caller is answered, so
//!   `latest()` observed after an awaited mutation already reflects it.
//! - If that re-read fails, the next command republishes before it runs.

use super::broadcast::ChangeBroadcaster;
use crate::model::note::{Note, NoteId};
use crate::repo::note_repo::{NoteRepository, RepoResult, SqliteNoteRepository};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::sync::Arc;
use std::thread;
use tokio::sync::{mpsc, oneshot};

const WRITER_THREAD_NAME: &str = "notey-store-writer";

pub(crate) type CommandSender = mpsc::UnboundedSender<StoreCommand>;

pub(crate) enum StoreCommand {
    Insert {
        note: Note,
        reply: oneshot::Sender<RepoResult<NoteId>>,
    },
    Update {
        note: Note,
        reply: oneshot::Sender<RepoResult<()>>,
    },
    UpdateDescription {
        id: NoteId,
        description: String,
        reply: oneshot::Sender<RepoResult<()>>,
    },
    Delete {
        id: NoteId,
        reply: oneshot::Sender<RepoResult<bool>>,
    },
    All {
        reply: oneshot::Sender<RepoResult<Vec<Note>>>,
    },
    ById {
        id: NoteId,
        reply: oneshot::Sender<RepoResult<Option<Note>>>,
    },
}

pub(crate) fn spawn_writer(
    conn: Connection,
    broadcaster: Arc<ChangeBroadcaster>,
) -> std::io::Result<CommandSender> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::Builder::new()
        .name(WRITER_THREAD_NAME.to_string())
        .spawn(move || run_writer(conn, rx, broadcaster))?;
    Ok(tx)
}

fn run_writer(
    conn: Connection,
    mut rx: mpsc::UnboundedReceiver<StoreCommand>,
    broadcaster: Arc<ChangeBroadcaster>,
) {
    let repo = match SqliteNoteRepository::try_new(&conn) {
        Ok(repo) => repo,
        Err(err) => {
            error!("event=store_writer module=store status=error error={err}");
            return;
        }
    };
    info!("event=store_writer module=store status=start");

    let mut writer = Writer {
        repo,
        broadcaster,
        stale: false,
    };
    while let Some(command) = rx.blocking_recv() {
        writer.handle(command);
    }

    info!("event=store_writer module=store status=stopped");
}

struct Writer<'conn> {
    repo: SqliteNoteRepository<'conn>,
    broadcaster: Arc<ChangeBroadcaster>,
    /// Set when a committed mutation could not be re-read for publishing.
    stale: bool,
}

impl Writer<'_> {
    fn handle(&mut self, command: StoreCommand) {
        if self.stale {
            if let Some(version) = self.publish_current() {
                info!(
                    "event=snapshot_publish module=store status=recovered snapshot_version={version}"
                );
            }
        }

        // Send errors mean the caller stopped waiting; the write itself stands.
        match command {
            StoreCommand::Insert { note, reply } => {
                let result = self.repo.insert_note(&note);
                match &result {
                    Ok(id) => {
                        let version = self.publish_current();
                        info!(
                            "event=note_insert module=store status=ok note_id={id} snapshot_version={}",
                            version.unwrap_or_default()
                        );
                    }
                    Err(err) => warn!("event=note_insert module=store status=rejected error={err}"),
                }
                let _ = reply.send(result);
            }
            StoreCommand::Update { note, reply } => {
                let result = self.repo.update_note(&note);
                self.after_update("note_update", note.id, &result);
                let _ = reply.send(result);
            }
            StoreCommand::UpdateDescription {
                id,
                description,
                reply,
            } => {
                let result = self.repo.update_description(id, description.as_str());
                self.after_update("note_update_description", id, &result);
                let _ = reply.send(result);
            }
            StoreCommand::Delete { id, reply } => {
                let result = self.repo.delete_note(id);
                match &result {
                    Ok(true) => {
                        let version = self.publish_current();
                        info!(
                            "event=note_delete module=store status=ok note_id={id} snapshot_version={}",
                            version.unwrap_or_default()
                        );
                    }
                    Ok(false) => debug!("event=note_delete module=store status=noop note_id={id}"),
                    Err(err) => warn!(
                        "event=note_delete module=store status=error note_id={id} error={err}"
                    ),
                }
                let _ = reply.send(result);
            }
            StoreCommand::All { reply } => {
                let _ = reply.send(self.repo.list_notes());
            }
            StoreCommand::ById { id, reply } => {
                let _ = reply.send(self.repo.get_note(id));
            }
        }
    }

    fn after_update(&mut self, event: &str, id: NoteId, result: &RepoResult<()>) {
        match result {
            Ok(()) => {
                let version = self.publish_current();
                info!(
                    "event={event} module=store status=ok note_id={id} snapshot_version={}",
                    version.unwrap_or_default()
                );
            }
            Err(err) => {
                warn!("event={event} module=store status=rejected note_id={id} error={err}")
            }
        }
    }

    /// Re-reads the full collection and publishes it.
    ///
    /// On failure nothing is published and the writer stays stale, so the
    /// next command retries before doing anything else.
    fn publish_current(&mut self) -> Option<u64> {
        match self.repo.list_notes() {
            Ok(notes) => {
                self.stale = false;
                Some(self.broadcaster.publish(notes))
            }
            Err(err) => {
                self.stale = true;
                error!("event=snapshot_publish module=store status=error error={err}");
                None
            }
        }
    }
}
