//! Core use-case services.
//!
//! # Responsibility
//! - Compose store, projection and enhancement into one command surface.
//! - Keep presentation layers decoupled from storage and task details.

pub mod note_service;
