//! Account and holder records plus account number generation.
//!
//! # Invariants
//! - Account numbers are decimal digit strings.
//! - A freshly opened account starts with a zero balance.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store-assigned holder key.
pub type HolderId = i64;

/// Number of digits in generated account numbers.
pub const ACCOUNT_NO_DIGITS: usize = 10;

static ACCOUNT_NO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{1,20}$").expect("valid account number regex"));

/// Account snapshot joined with its holder name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_no: String,
    pub holder_name: String,
    /// Balance in whole currency units.
    pub balance: i64,
}

impl Account {
    /// Creates an account snapshot with a zero balance.
    pub fn new(account_no: impl Into<String>, holder_name: impl Into<String>) -> Self {
        Self {
            account_no: account_no.into(),
            holder_name: holder_name.into(),
            balance: 0,
        }
    }
}

/// Account holder row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub holder_id: HolderId,
    pub name: String,
}

/// Returns whether `value` has the shape of an account number.
pub fn is_valid_account_no(value: &str) -> bool {
    ACCOUNT_NO_RE.is_match(value)
}

/// Source of candidate account numbers.
///
/// Candidates are not assumed unique; the caller checks each one against the
/// store before use.
pub trait AccountNumberSource {
    fn next_candidate(&mut self) -> String;
}

/// Random candidates derived from v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomAccountNumbers;

impl AccountNumberSource for RandomAccountNumbers {
    fn next_candidate(&mut self) -> String {
        let modulus = 10u128.pow(ACCOUNT_NO_DIGITS as u32);
        let value = Uuid::new_v4().as_u128() % modulus;
        format!("{value:0width$}", width = ACCOUNT_NO_DIGITS)
    }
}

#[cfg(test)]
mod tests {
    use super::{is_valid_account_no, AccountNumberSource, RandomAccountNumbers, ACCOUNT_NO_DIGITS};

    #[test]
    fn random_candidates_are_fixed_width_digits() {
        let mut source = RandomAccountNumbers;
        for _ in 0..32 {
            let candidate = source.next_candidate();
            assert_eq!(candidate.len(), ACCOUNT_NO_DIGITS);
            assert!(is_valid_account_no(&candidate), "{candidate}");
        }
    }

    #[test]
    fn account_no_shape_rejects_non_digits() {
        assert!(is_valid_account_no("0012345"));
        assert!(!is_valid_account_no(""));
        assert!(!is_valid_account_no("12a4"));
        assert!(!is_valid_account_no(" 123"));
    }
}
