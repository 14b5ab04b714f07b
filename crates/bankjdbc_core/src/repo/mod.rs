//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the ledger store contract consumed by services.
//! - Isolate SQLite query details from business orchestration.
//!
//! # Invariants
//! - Repository code performs no business validation; rules live in
//!   `crate::rules`.
//! - Every write sequence runs inside one `LedgerSession`.

pub mod ledger_repo;
