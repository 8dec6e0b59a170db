//! Substring search projection over note snapshots.
//!
//! # Responsibility
//! - Filter a snapshot by case-insensitive substring on title or description.
//! - Cache the last result and recompute only when snapshot or query changes.
//! - Provide a live stream that re-projects on every new snapshot or query.
//!
//! # Invariants
//! - Blank queries return the snapshot unchanged.
//! - Result order equals snapshot order.
//! - No I/O and no blocking; cost is linear in the snapshot text size.

use crate::model::note::Note;
use crate::store::{NoteSnapshot, Subscription};
use std::sync::Arc;
use tokio::sync::watch;

/// Filters `notes` by `query`, preserving order.
///
/// Whitespace only decides blankness; a non-blank query is matched verbatim,
/// so `"milk "` does not match `"buy milk"`.
pub fn filter_notes(notes: &[Note], query: &str) -> Vec<Note> {
    if query.trim().is_empty() {
        return notes.to_vec();
    }
    let needle = query.to_lowercase();

    notes
        .iter()
        .filter(|note| matches_needle(note, needle.as_str()))
        .cloned()
        .collect()
}

fn matches_needle(note: &Note, needle: &str) -> bool {
    note.title.to_lowercase().contains(needle) || note.description.to_lowercase().contains(needle)
}

/// Memoized projection keyed by snapshot version and query text.
#[derive(Debug, Default)]
pub struct SearchProjection {
    cached: Option<CachedProjection>,
}

#[derive(Debug)]
struct CachedProjection {
    version: u64,
    query: String,
    result: Arc<[Note]>,
}

impl SearchProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the filtered view, reusing the cached one when neither the
    /// snapshot version nor the query changed.
    pub fn project(&mut self, snapshot: &NoteSnapshot, query: &str) -> Arc<[Note]> {
        if let Some(cached) = &self.cached {
            if cached.version == snapshot.version() && cached.query == query {
                return Arc::clone(&cached.result);
            }
        }

        let result: Arc<[Note]> = filter_notes(snapshot.notes(), query).into();
        self.cached = Some(CachedProjection {
            version: snapshot.version(),
            query: query.to_string(),
            result: Arc::clone(&result),
        });
        result
    }
}

/// Cloneable handle used to change the query of a running [`SearchStream`].
#[derive(Debug, Clone)]
pub struct QueryHandle {
    tx: Arc<watch::Sender<String>>,
}

impl QueryHandle {
    pub fn set(&self, query: impl Into<String>) {
        let query = query.into();
        self.tx.send_if_modified(|current| {
            if *current == query {
                return false;
            }
            *current = query;
            true
        });
    }

    pub fn current(&self) -> String {
        self.tx.borrow().clone()
    }
}

/// Live search results: yields a new filtered view whenever the store
/// publishes a snapshot or the query text changes.
#[derive(Debug)]
pub struct SearchStream {
    subscription: Subscription,
    query_tx: Arc<watch::Sender<String>>,
    query_rx: watch::Receiver<String>,
    projection: SearchProjection,
    snapshot: Option<NoteSnapshot>,
}

impl SearchStream {
    pub fn new(subscription: Subscription, query: impl Into<String>) -> Self {
        let (query_tx, query_rx) = watch::channel(query.into());
        Self {
            subscription,
            query_tx: Arc::new(query_tx),
            query_rx,
            projection: SearchProjection::new(),
            snapshot: None,
        }
    }

    pub fn query_handle(&self) -> QueryHandle {
        QueryHandle {
            tx: Arc::clone(&self.query_tx),
        }
    }

    /// Waits for the next result set; the first call answers immediately.
    ///
    /// Returns `None` once the underlying subscription ends.
    pub async fn next(&mut self) -> Option<Arc<[Note]>> {
        if self.snapshot.is_none() {
            self.snapshot = Some(self.subscription.next().await?);
        } else {
            tokio::select! {
                snapshot = self.subscription.next() => {
                    self.snapshot = Some(snapshot?);
                }
                // The stream owns the query sender, so this never reports closed.
                _ = self.query_rx.changed() => {}
            }
        }

        let query = self.query_rx.borrow_and_update().clone();
        let snapshot = self.snapshot.as_ref()?;
        Some(self.projection.project(snapshot, query.as_str()))
    }

    /// Stops following the store.
    pub fn close(&mut self) {
        self.subscription.unsubscribe();
    }
}
