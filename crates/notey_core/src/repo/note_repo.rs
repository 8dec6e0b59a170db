//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide insert/update/delete/list/get over `notes_table`.
//! - Own surrogate key assignment and `lastModified` stamping.
//!
//! # Invariants
//! - Keys come from `AUTOINCREMENT`, so a deleted id is never handed out again.
//! - `lastModified` never moves backwards for one row, even if the wall clock does.
//! - Listing order is ascending id (insertion order).

use crate::db::migrations::{table_has_column, NOTES_TABLE};
use crate::db::DbError;
use crate::model::note::{Note, NoteColor, NoteId, NoteValidationError};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    color,
    lastModified
FROM notes_table";

const REQUIRED_COLUMNS: [&str; 5] = ["id", "title", "description", "color", "lastModified"];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for note persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(NoteValidationError),
    Db(DbError),
    NotFound(NoteId),
    InvalidData(String),
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NoteValidationError> for RepoError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for note CRUD operations.
pub trait NoteRepository {
    /// Persists a new note and returns its freshly assigned id.
    fn insert_note(&self, note: &Note) -> RepoResult<NoteId>;
    /// Replaces title, description and color of an existing note.
    fn update_note(&self, note: &Note) -> RepoResult<()>;
    /// Replaces only the description of an existing note.
    fn update_description(&self, id: NoteId, description: &str) -> RepoResult<()>;
    /// Removes a note; returns `false` when no such row existed.
    fn delete_note(&self, id: NoteId) -> RepoResult<bool>;
    /// Lists every note in insertion order.
    fn list_notes(&self) -> RepoResult<Vec<Note>>;
    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
    clock: fn() -> i64,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    ///
    /// # Errors
    /// - Returns `MissingRequiredTable`/`MissingRequiredColumn` when the
    ///   connection was not migrated to the latest schema.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_note_connection_ready(conn)?;
        Ok(Self {
            conn,
            clock: now_epoch_ms,
        })
    }

    /// Same as [`SqliteNoteRepository::try_new`] with a caller-supplied clock.
    pub fn with_clock(conn: &'conn Connection, clock: fn() -> i64) -> RepoResult<Self> {
        let mut repo = Self::try_new(conn)?;
        repo.clock = clock;
        Ok(repo)
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn insert_note(&self, note: &Note) -> RepoResult<NoteId> {
        note.validate()?;

        self.conn.execute(
            "INSERT INTO notes_table (title, description, color, lastModified)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                note.title.as_str(),
                note.description.as_str(),
                note.color.to_db(),
                (self.clock)(),
            ],
        )?;

        Ok(NoteId(self.conn.last_insert_rowid()))
    }

    fn update_note(&self, note: &Note) -> RepoResult<()> {
        note.validate()?;

        let changed = self.conn.execute(
            "UPDATE notes_table
             SET
                title = ?1,
                description = ?2,
                color = ?3,
                lastModified = MAX(?4, lastModified)
             WHERE id = ?5;",
            params![
                note.title.as_str(),
                note.description.as_str(),
                note.color.to_db(),
                (self.clock)(),
                note.id.0,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(note.id));
        }

        Ok(())
    }

    fn update_description(&self, id: NoteId, description: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes_table
             SET
                description = ?1,
                lastModified = MAX(?2, lastModified)
             WHERE id = ?3;",
            params![description, (self.clock)(), id.0],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn delete_note(&self, id: NoteId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM notes_table WHERE id = ?1;", [id.0])?;
        Ok(changed > 0)
    }

    fn list_notes(&self) -> RepoResult<Vec<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.0])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_note_row(row)?));
        }
        Ok(None)
    }
}

/// Current wall clock in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let id: i64 = row.get("id")?;
    if id <= 0 {
        return Err(RepoError::InvalidData(format!(
            "invalid id value `{id}` in notes_table.id"
        )));
    }

    Ok(Note {
        id: NoteId(id),
        title: row.get("title")?,
        description: row.get("description")?,
        color: NoteColor::from_db(row.get("color")?),
        last_modified: row.get("lastModified")?,
    })
}

fn ensure_note_connection_ready(conn: &Connection) -> RepoResult<()> {
    if !table_exists(conn, NOTES_TABLE)? {
        return Err(RepoError::MissingRequiredTable(NOTES_TABLE));
    }

    for column in REQUIRED_COLUMNS {
        if !table_has_column(conn, NOTES_TABLE, column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: NOTES_TABLE,
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
