//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `notey_core` wiring end to end.
//! - Keep output deterministic for quick local sanity checks.

use notey_core::db::migrations::latest_version;
use notey_core::{init_logging_from_config, CoreConfig, NoteService, StoreCell};
use std::process::ExitCode;

static STORE: StoreCell = StoreCell::new();

#[tokio::main]
async fn main() -> ExitCode {
    let config = CoreConfig::from_env();
    if let Err(err) = init_logging_from_config(&config) {
        eprintln!("notey logging init failed: {err}");
    }

    println!("notey_core ping={}", notey_core::ping());
    println!("notey_core version={}", notey_core::core_version());
    println!("notey_core schema_version={}", latest_version());

    let service = match NoteService::from_config(&STORE, &config) {
        Ok(service) => service,
        Err(err) => {
            log::error!("event=cli_start module=cli status=error error={err}");
            eprintln!("notey store open failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    match service.list_notes().await {
        Ok(notes) => {
            println!("notey_core db_path={}", config.db_path.display());
            println!("notey_core note_count={}", notes.len());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("notey list failed: {err}");
            ExitCode::FAILURE
        }
    }
}
