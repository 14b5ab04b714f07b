//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate rule checks and repository calls into use-case level APIs.
//! - Keep CLI layers decoupled from storage details.

pub mod ledger_service;
