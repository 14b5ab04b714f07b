//! Process configuration resolved from environment variables.
//!
//! # Invariants
//! - Blank variables count as unset.
//! - Logging stays disabled unless a log directory is configured.

use crate::db::open_db;
use crate::logging::{default_log_level, init_logging};
use crate::repo::ledger_repo::{RepoResult, SqliteLedgerStore};
use once_cell::sync::OnceCell;
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "BANKJDBC_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "BANKJDBC_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "BANKJDBC_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "bankjdbc.sqlite3";

static PROCESS_CONFIG: OnceCell<LedgerConfig> = OnceCell::new();

/// Runtime settings for one ledger process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    pub log_level: String,
    /// Directory for rolling log files; `None` disables file logging.
    pub log_dir: Option<PathBuf>,
}

impl LedgerConfig {
    /// Reads settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            db_path: non_blank(DB_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)),
            log_level: non_blank(LOG_LEVEL_ENV)
                .unwrap_or_else(|| default_log_level().to_string()),
            log_dir: non_blank(LOG_DIR_ENV).map(PathBuf::from),
        }
    }

    /// Starts file logging when a log directory is configured.
    ///
    /// Returns `Ok(false)` when logging is disabled by configuration.
    pub fn init_logging(&self) -> Result<bool, String> {
        let Some(log_dir) = self.log_dir.as_ref() else {
            return Ok(false);
        };
        let log_dir = log_dir
            .to_str()
            .ok_or_else(|| format!("log_dir is not valid UTF-8: {}", log_dir.display()))?;
        init_logging(&self.log_level, log_dir)?;
        Ok(true)
    }

    /// Opens and migrates the configured database as a ledger store.
    pub fn open_store(&self) -> RepoResult<SqliteLedgerStore> {
        let conn = open_db(&self.db_path)?;
        SqliteLedgerStore::try_new(conn)
    }
}

/// Process-wide configuration, read from the environment on first use.
pub fn process_config() -> &'static LedgerConfig {
    PROCESS_CONFIG.get_or_init(LedgerConfig::from_env)
}
