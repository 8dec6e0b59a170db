//! Note domain model.
//!
//! # Responsibility
//! - Define the only persisted entity (`Note`) and its packed ARGB color.
//! - Provide validation used by every store write path.
//!
//! # Invariants
//! - `id` is `NoteId::UNASSIGNED` only before the store assigns a key.
//! - A note is never persisted with a title that is blank after trimming.
//! - `last_modified` is epoch milliseconds and never decreases for one `id`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static PARAGRAPH_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("valid paragraph regex"));

/// Store-assigned surrogate key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub i64);

impl NoteId {
    /// Sentinel used by the create path before the store assigns a key.
    pub const UNASSIGNED: NoteId = NoteId(0);

    pub fn is_assigned(self) -> bool {
        self.0 > 0
    }
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Packed 32-bit `0xAARRGGBB` color, opaque to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteColor(pub u32);

impl NoteColor {
    /// Color preselected for brand new notes.
    pub const DEFAULT: NoteColor = NoteColor(0xFFFB_CDCF);

    /// Swatches offered by the color picker, in display order.
    pub const PALETTE: [NoteColor; 7] = [
        NoteColor(0xFFF5_9597),
        NoteColor(0xFFFF_D52E),
        NoteColor(0xFFC5_E1A5),
        NoteColor(0xFF90_CAF9),
        NoteColor(0xFFE1_BEE7),
        NoteColor(0xFFFF_CC80),
        NoteColor(0xFFE0_E0E0),
    ];

    pub const fn from_argb(alpha: u8, red: u8, green: u8, blue: u8) -> Self {
        Self(
            (alpha as u32) << 24 | (red as u32) << 16 | (green as u32) << 8 | blue as u32,
        )
    }

    pub fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn blue(self) -> u8 {
        self.0 as u8
    }

    /// Whether this color is one of the fixed picker swatches.
    pub fn is_palette(self) -> bool {
        Self::PALETTE.contains(&self)
    }

    /// Signed representation used by the `color` column.
    pub fn to_db(self) -> i32 {
        self.0 as i32
    }

    pub fn from_db(value: i32) -> Self {
        Self(value as u32)
    }
}

impl Default for NoteColor {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Validation failures for note write paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    /// Title is empty after trimming.
    BlankTitle,
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "note title must not be blank"),
        }
    }
}

impl Error for NoteValidationError {}

/// Canonical persisted note record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    /// Paragraph-structured body; the store treats it as an opaque string.
    pub description: String,
    pub color: NoteColor,
    /// Unix epoch milliseconds of the last create/update.
    pub last_modified: i64,
}

impl Note {
    /// Builds an unsaved note for the create path.
    pub fn draft(
        title: impl Into<String>,
        description: impl Into<String>,
        color: NoteColor,
    ) -> Self {
        Self {
            id: NoteId::UNASSIGNED,
            title: title.into(),
            description: description.into(),
            color,
            last_modified: 0,
        }
    }

    /// Checks invariants shared by insert and update.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.title.trim().is_empty() {
            return Err(NoteValidationError::BlankTitle);
        }
        Ok(())
    }

    /// Splits the description on blank lines, dropping blank paragraphs.
    pub fn paragraphs(&self) -> Vec<&str> {
        PARAGRAPH_BREAK_RE
            .split(self.description.as_str())
            .filter(|paragraph| !paragraph.trim().is_empty())
            .collect()
    }

    /// Whether an edit is savable: non-blank title and something changed.
    pub fn has_changes(&self, title: &str, description: &str) -> bool {
        !title.trim().is_empty() && (title != self.title || description != self.description)
    }
}
