//! Shell line grammar.
//!
//! Every line is parsed as one clap subcommand; usage and help text come from
//! the derive attributes below.

use bankjdbc_core::StudentId;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bankjdbc", no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Command,
}

/// One shell command. Multi-word names are collected word by word.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Open a zero-balance account
    #[command(name = "new")]
    OpenAccount {
        #[arg(required = true)]
        holder_name: Vec<String>,
    },
    /// List all accounts, or the accounts of one holder
    List { holder_name: Vec<String> },
    /// Show one account
    #[command(name = "acct")]
    ShowAccount { account_no: String },
    /// Deposit into an account
    Deposit {
        account_no: String,
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },
    /// Withdraw from an account
    Withdraw {
        account_no: String,
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },
    /// Delete an account
    Delete { account_no: String },
    /// List instruments of a type that can be rented now
    Rentals {
        #[arg(required = true)]
        instrument_type: Vec<String>,
    },
    /// Rent an instrument to a student
    Rent {
        student_id: StudentId,
        #[arg(required = true)]
        instrument_name: Vec<String>,
    },
    /// Return a rented instrument
    Return {
        student_id: StudentId,
        #[arg(required = true)]
        instrument_name: Vec<String>,
    },
    /// Register an instrument pool entry
    Stock {
        name: String,
        instrument_type: String,
        rental_cost: i64,
        available_count: i64,
    },
    /// List a student's rentals, newest first
    History { student_id: StudentId },
    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

/// Parses one input line. Blank lines yield `Ok(None)`; usage errors and
/// `help` output come back as rendered text.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return Ok(None);
    }
    ShellLine::try_parse_from(words)
        .map(|parsed| Some(parsed.command))
        .map_err(|err| err.render().to_string())
}
