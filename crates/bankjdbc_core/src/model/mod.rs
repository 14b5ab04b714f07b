//! Plain data records shared by the rule engine, repository and services.
//!
//! # Invariants
//! - Records are transient snapshots of store rows; nothing here is cached
//!   across operations.
//! - `Account::balance` and `Instrument::available_count` are never negative
//!   once persisted.

pub mod account;
pub mod instrument;
