//! Domain model for persisted notes.
//!
//! # Responsibility
//! - Define the canonical note record shared by store, broadcaster and UI.
//! - Keep color/palette and display helpers next to the record they describe.
//!
//! # Invariants
//! - Every persisted note is identified by a store-assigned `NoteId`.
//! - Snapshots hand out clones; nothing outside the store mutates a note row.

pub mod note;
