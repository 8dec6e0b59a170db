//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the note CRUD contract used by the store writer.
//! - Isolate SQLite query details from store/service orchestration.
//!
//! # Invariants
//! - Write paths enforce `Note::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod note_repo;
