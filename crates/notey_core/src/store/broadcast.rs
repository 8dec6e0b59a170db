//! Change broadcaster turning store mutations into ordered snapshots.
//!
//! # Responsibility
//! - Hold the latest full-collection snapshot and fan it out to subscribers.
//! - Replay the latest snapshot to every new subscriber.
//!
//! # Invariants
//! - Snapshot versions strictly increase with every publish.
//! - A subscriber never observes a version older than one it has seen;
//!   superseded snapshots may be skipped, the newest one never is.
//! - Snapshots are immutable; subscribers never see store internals.

use crate::model::note::{Note, NoteId};
use std::sync::Arc;
use tokio::sync::watch;

/// Immutable point-in-time copy of the full note collection.
#[derive(Debug, Clone)]
pub struct NoteSnapshot {
    version: u64,
    notes: Arc<[Note]>,
}

impl NoteSnapshot {
    fn new(version: u64, notes: Vec<Note>) -> Self {
        Self {
            version,
            notes: notes.into(),
        }
    }

    /// Publish counter; `0` is the collection loaded at startup.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }
}

/// Replay-last publisher for note snapshots.
pub struct ChangeBroadcaster {
    tx: watch::Sender<NoteSnapshot>,
}

impl ChangeBroadcaster {
    pub fn new(initial: Vec<Note>) -> Self {
        let (tx, _) = watch::channel(NoteSnapshot::new(0, initial));
        Self { tx }
    }

    /// Replaces the current snapshot and returns its version.
    ///
    /// Publishing succeeds even when nobody is subscribed.
    pub fn publish(&self, notes: Vec<Note>) -> u64 {
        let mut published = 0;
        self.tx.send_modify(|snapshot| {
            *snapshot = NoteSnapshot::new(snapshot.version + 1, notes);
            published = snapshot.version;
        });
        published
    }

    pub fn latest(&self) -> NoteSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: Some(self.tx.subscribe()),
            replayed: false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One observer's view of the snapshot sequence.
#[derive(Debug)]
pub struct Subscription {
    rx: Option<watch::Receiver<NoteSnapshot>>,
    replayed: bool,
}

impl Subscription {
    /// Waits for the next snapshot.
    ///
    /// The first call returns the latest snapshot immediately. Returns `None`
    /// after [`Subscription::unsubscribe`] or once the store is gone.
    pub async fn next(&mut self) -> Option<NoteSnapshot> {
        let rx = self.rx.as_mut()?;
        if !self.replayed {
            self.replayed = true;
            return Some(rx.borrow_and_update().clone());
        }
        rx.changed().await.ok()?;
        Some(rx.borrow_and_update().clone())
    }

    /// Latest published snapshot without waiting or marking it seen.
    pub fn latest(&self) -> Option<NoteSnapshot> {
        self.rx.as_ref().map(|rx| rx.borrow().clone())
    }

    /// Stops delivery. Calling it again is a no-op.
    pub fn unsubscribe(&mut self) {
        self.rx = None;
    }

    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }
}
