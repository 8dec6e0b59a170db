//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register additive schema steps in strictly increasing version order.
//! - Apply pending steps one transaction at a time.
//!
//! # Invariants
//! - Steps only create tables or add columns; nothing is dropped or renamed.
//! - Each step commits together with its `PRAGMA user_version` bump, so an
//!   interrupted run resumes at the first uncommitted step.
//! - A gap in the registry aborts before any step of the range is applied.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, TransactionBehavior};

/// Table holding every persisted note.
pub const NOTES_TABLE: &str = "notes_table";

#[derive(Debug, Clone, Copy)]
pub(crate) enum MigrationStep {
    /// Idempotent DDL batch (`CREATE ... IF NOT EXISTS`).
    Sql(&'static str),
    /// `ALTER TABLE ... ADD COLUMN`, skipped when the column already exists.
    AddColumn {
        table: &'static str,
        column: &'static str,
        definition: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Migration {
    pub(crate) version: u32,
    pub(crate) step: MigrationStep,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        step: MigrationStep::Sql(include_str!("0001_init.sql")),
    },
    Migration {
        version: 2,
        step: MigrationStep::AddColumn {
            table: NOTES_TABLE,
            column: "lastModified",
            definition: "INTEGER NOT NULL DEFAULT 0",
        },
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Reads the schema version stored in the database header.
pub fn current_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Brings the connection from its stored version up to [`latest_version`].
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the stored version is newer than this binary.
/// - `MissingMigration` when an intermediate step is not registered.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current = current_version(conn)?;
    let latest = latest_version();

    if current > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }

    migrate(conn, current, latest)
}

/// Applies the registered steps for versions `from + 1 ..= to`.
///
/// Used by startup and by tooling that needs a database pinned at an older
/// schema version.
pub fn migrate(conn: &mut Connection, from: u32, to: u32) -> DbResult<()> {
    run_steps(conn, MIGRATIONS, from, to)
}

pub(crate) fn run_steps(
    conn: &mut Connection,
    registry: &[Migration],
    from: u32,
    to: u32,
) -> DbResult<()> {
    if from > to {
        return Err(DbError::InvalidMigrationRange { from, to });
    }
    if from == to {
        return Ok(());
    }

    let mut plan = Vec::with_capacity((to - from) as usize);
    for version in (from + 1)..=to {
        let step = registry
            .iter()
            .find(|migration| migration.version == version)
            .ok_or(DbError::MissingMigration { version })?;
        plan.push(*step);
    }

    for migration in plan {
        if let Err(err) = apply_step(conn, migration) {
            error!(
                "event=db_migrate module=db status=error version={} error={}",
                migration.version, err
            );
            return Err(err);
        }
        info!(
            "event=db_migrate module=db status=ok version={}",
            migration.version
        );
    }

    Ok(())
}

fn apply_step(conn: &mut Connection, migration: Migration) -> DbResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    // Another opener may have committed this step while we waited for the lock.
    if current_version(&tx)? >= migration.version {
        return Ok(());
    }

    match migration.step {
        MigrationStep::Sql(sql) => tx.execute_batch(sql)?,
        MigrationStep::AddColumn {
            table,
            column,
            definition,
        } => {
            if !table_has_column(&tx, table, column)? {
                tx.execute_batch(&format!(
                    "ALTER TABLE {table} ADD COLUMN {column} {definition};"
                ))?;
            }
        }
    }

    tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    tx.commit()?;
    Ok(())
}

pub(crate) fn table_has_column(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
