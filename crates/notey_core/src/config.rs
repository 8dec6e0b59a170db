//! Runtime configuration resolved from the environment.
//!
//! # Responsibility
//! - Resolve database, logging and enhancement settings in one place.
//!
//! # Invariants
//! - Blank variables behave as unset.
//! - Resolution never fails; bad values fall back to defaults with a warning.

use crate::enhance::ProgressPlan;
use crate::logging::default_log_level;
use log::warn;
use std::path::PathBuf;
use std::time::Duration;

pub const DB_PATH_VAR: &str = "NOTEY_DB_PATH";
pub const LOG_LEVEL_VAR: &str = "NOTEY_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "NOTEY_LOG_DIR";
pub const API_KEY_VAR: &str = "NOTEY_GEMINI_API_KEY";
pub const MODEL_VAR: &str = "NOTEY_GEMINI_MODEL";
pub const ENDPOINT_VAR: &str = "NOTEY_GEMINI_ENDPOINT";
pub const TIMEOUT_VAR: &str = "NOTEY_ENHANCE_TIMEOUT_SECS";

const DB_FILE_NAME: &str = "notey.sqlite3";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_RESULT_HOLD: Duration = Duration::from_millis(500);

/// Settings for the enhancement workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancementConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    /// Upper bound for one external call; expiry counts as a failure.
    pub call_timeout: Duration,
    pub progress: ProgressPlan,
    /// How long a terminal state stays visible before returning to `Idle`.
    pub result_hold: Duration,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            progress: ProgressPlan::default(),
            result_hold: DEFAULT_RESULT_HOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// Logging stays disabled when unset.
    pub log_dir: Option<PathBuf>,
    pub enhancement: EnhancementConfig,
}

impl CoreConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let call_timeout = match get(TIMEOUT_VAR) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!(
                        "event=config_resolve module=config status=fallback key={TIMEOUT_VAR}"
                    );
                    DEFAULT_CALL_TIMEOUT
                }
            },
            None => DEFAULT_CALL_TIMEOUT,
        };

        Self {
            db_path: get(DB_PATH_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DB_FILE_NAME)),
            log_level: get(LOG_LEVEL_VAR).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: get(LOG_DIR_VAR).map(PathBuf::from),
            enhancement: EnhancementConfig {
                api_key: get(API_KEY_VAR),
                model: get(MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                endpoint: get(ENDPOINT_VAR).unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
                call_timeout,
                ..EnhancementConfig::default()
            },
        }
    }
}
