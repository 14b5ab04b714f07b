//! Pure business rules for balances and instrument rentals.
//!
//! # Responsibility
//! - Decide whether a requested mutation is permitted.
//! - Compute the resulting state from a snapshot, without touching storage.
//!
//! # Invariants
//! - Balances never go below zero.
//! - A student never holds more than `MAX_ACTIVE_RENTALS` active rentals.
//! - `available_count` never goes below zero.
//! - Rent checks eligibility and availability before computing any new state.

use crate::model::instrument::{Instrument, InstrumentId, RentalId, StudentId};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum number of simultaneously active rentals per student.
pub const MAX_ACTIVE_RENTALS: i64 = 2;

/// Rejection produced by a rule check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleViolation {
    /// Deposit/withdraw amount is zero or negative.
    NonPositiveAmount(i64),
    /// Deposit would overflow the balance column.
    BalanceOverflow { balance: i64, amount: i64 },
    InsufficientFunds { balance: i64, amount: i64 },
    TooManyRentals { active: i64 },
    NoneAvailable { available: i64 },
    NoMatchingActiveRental {
        student_id: StudentId,
        instrument_id: InstrumentId,
    },
}

impl Display for RuleViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveAmount(amount) => {
                write!(f, "amount must be positive, got {amount}")
            }
            Self::BalanceOverflow { balance, amount } => {
                write!(f, "deposit of {amount} overflows balance {balance}")
            }
            Self::InsufficientFunds { balance, amount } => {
                write!(f, "cannot withdraw {amount}, balance is {balance}")
            }
            Self::TooManyRentals { active } => write!(
                f,
                "student already has {active} active rentals (limit {MAX_ACTIVE_RENTALS})"
            ),
            Self::NoneAvailable { available } => {
                write!(f, "no units available (available count {available})")
            }
            Self::NoMatchingActiveRental {
                student_id,
                instrument_id,
            } => write!(
                f,
                "student {student_id} has no active rental of instrument {instrument_id}"
            ),
        }
    }
}

impl Error for RuleViolation {}

/// Outcome of a permitted rent request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RentPlan {
    pub student_id: StudentId,
    pub instrument_id: InstrumentId,
    pub instrument_name: String,
    pub new_available_count: i64,
    pub new_active_count: i64,
}

/// Outcome of a permitted return request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnPlan {
    pub rental_id: RentalId,
    pub student_id: StudentId,
    pub instrument_name: String,
    pub new_available_count: i64,
}

/// Returns the balance after depositing `amount`.
pub fn validate_deposit(balance: i64, amount: i64) -> Result<i64, RuleViolation> {
    ensure_positive(amount)?;
    balance
        .checked_add(amount)
        .ok_or(RuleViolation::BalanceOverflow { balance, amount })
}

/// Returns the balance after withdrawing `amount`.
pub fn validate_withdraw(balance: i64, amount: i64) -> Result<i64, RuleViolation> {
    ensure_positive(amount)?;
    if amount > balance {
        return Err(RuleViolation::InsufficientFunds { balance, amount });
    }
    Ok(balance - amount)
}

pub fn validate_rental_eligibility(active_count: i64) -> Result<(), RuleViolation> {
    if active_count >= MAX_ACTIVE_RENTALS {
        return Err(RuleViolation::TooManyRentals {
            active: active_count,
        });
    }
    Ok(())
}

pub fn validate_instrument_availability(available_count: i64) -> Result<(), RuleViolation> {
    if available_count <= 0 {
        return Err(RuleViolation::NoneAvailable {
            available: available_count,
        });
    }
    Ok(())
}

/// Plans one rental of `instrument` by `student_id`.
///
/// Both checks run before any new state is computed, so a rejected plan
/// never carries a partial update.
pub fn plan_rent(
    student_id: StudentId,
    active_count: i64,
    instrument: &Instrument,
) -> Result<RentPlan, RuleViolation> {
    validate_rental_eligibility(active_count)?;
    validate_instrument_availability(instrument.available_count)?;

    Ok(RentPlan {
        student_id,
        instrument_id: instrument.instrument_id,
        instrument_name: instrument.instrument_name.clone(),
        new_available_count: instrument.available_count - 1,
        new_active_count: active_count + 1,
    })
}

/// Plans closing the active rental `active_rental_id` of `instrument`.
pub fn plan_return(
    student_id: StudentId,
    instrument: &Instrument,
    active_rental_id: Option<RentalId>,
) -> Result<ReturnPlan, RuleViolation> {
    let rental_id = active_rental_id.ok_or(RuleViolation::NoMatchingActiveRental {
        student_id,
        instrument_id: instrument.instrument_id,
    })?;

    Ok(ReturnPlan {
        rental_id,
        student_id,
        instrument_name: instrument.instrument_name.clone(),
        new_available_count: instrument.available_count + 1,
    })
}

fn ensure_positive(amount: i64) -> Result<(), RuleViolation> {
    if amount <= 0 {
        return Err(RuleViolation::NonPositiveAmount(amount));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violin(available_count: i64) -> Instrument {
        Instrument {
            instrument_id: 7,
            instrument_name: "Violin".to_string(),
            instrument_type: "string".to_string(),
            rental_cost: 120,
            available_count,
        }
    }

    #[test]
    fn deposit_adds_positive_amounts() {
        assert_eq!(validate_deposit(0, 500), Ok(500));
        assert_eq!(validate_deposit(250, 1), Ok(251));
    }

    #[test]
    fn deposit_rejects_zero_negative_and_overflow() {
        assert_eq!(
            validate_deposit(10, 0),
            Err(RuleViolation::NonPositiveAmount(0))
        );
        assert_eq!(
            validate_deposit(10, -5),
            Err(RuleViolation::NonPositiveAmount(-5))
        );
        assert!(matches!(
            validate_deposit(i64::MAX, 1),
            Err(RuleViolation::BalanceOverflow { .. })
        ));
    }

    #[test]
    fn withdraw_allows_emptying_the_account() {
        assert_eq!(validate_withdraw(500, 500), Ok(0));
        assert_eq!(validate_withdraw(500, 120), Ok(380));
    }

    #[test]
    fn withdraw_rejects_more_than_balance() {
        assert_eq!(
            validate_withdraw(500, 600),
            Err(RuleViolation::InsufficientFunds {
                balance: 500,
                amount: 600
            })
        );
        assert_eq!(
            validate_withdraw(500, -1),
            Err(RuleViolation::NonPositiveAmount(-1))
        );
    }

    #[test]
    fn eligibility_caps_at_two_active_rentals() {
        assert!(validate_rental_eligibility(0).is_ok());
        assert!(validate_rental_eligibility(1).is_ok());
        assert_eq!(
            validate_rental_eligibility(2),
            Err(RuleViolation::TooManyRentals { active: 2 })
        );
    }

    #[test]
    fn availability_requires_a_unit_on_the_shelf() {
        assert!(validate_instrument_availability(1).is_ok());
        assert!(validate_instrument_availability(0).is_err());
        assert!(validate_instrument_availability(-3).is_err());
    }

    #[test]
    fn rent_plan_decrements_availability_and_counts_rental() {
        let plan = plan_rent(42, 1, &violin(3)).unwrap();
        assert_eq!(plan.instrument_id, 7);
        assert_eq!(plan.new_available_count, 2);
        assert_eq!(plan.new_active_count, 2);
    }

    #[test]
    fn rent_plan_checks_eligibility_before_availability() {
        let err = plan_rent(42, 2, &violin(0)).unwrap_err();
        assert_eq!(err, RuleViolation::TooManyRentals { active: 2 });

        let err = plan_rent(42, 0, &violin(0)).unwrap_err();
        assert_eq!(err, RuleViolation::NoneAvailable { available: 0 });
    }

    #[test]
    fn return_plan_requires_active_rental() {
        let err = plan_return(42, &violin(0), None).unwrap_err();
        assert_eq!(
            err,
            RuleViolation::NoMatchingActiveRental {
                student_id: 42,
                instrument_id: 7
            }
        );

        let plan = plan_return(42, &violin(0), Some(11)).unwrap();
        assert_eq!(plan.rental_id, 11);
        assert_eq!(plan.new_available_count, 1);
    }
}
