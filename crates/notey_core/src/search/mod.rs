//! Search entry points.
//!
//! # Responsibility
//! - Derive filtered views of the latest note snapshot.
//! - Keep projection pure and cheap enough for type-as-you-search.

pub mod projection;
