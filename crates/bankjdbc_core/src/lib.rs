//! Core ledger logic for account balances and instrument rentals.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod rules;
pub mod service;

pub use config::{process_config, LedgerConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::account::{
    is_valid_account_no, Account, AccountNumberSource, Holder, HolderId, RandomAccountNumbers,
};
pub use model::instrument::{
    Instrument, InstrumentId, NewInstrument, RentalId, RentalRecord, StudentId,
};
pub use repo::ledger_repo::{
    LedgerRepository, LedgerSession, LedgerStore, RepoError, RepoResult, SqliteLedgerSession,
    SqliteLedgerStore,
};
pub use rules::{RuleViolation, MAX_ACTIVE_RENTALS};
pub use service::ledger_service::{LedgerError, LedgerResult, LedgerService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
