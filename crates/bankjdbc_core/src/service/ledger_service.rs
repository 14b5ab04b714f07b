//! Ledger use-case service.
//!
//! # Responsibility
//! - Run each account and rental use-case as one all-or-nothing session.
//! - Fetch current state, apply `crate::rules`, persist the outcome.
//! - Translate rule rejections and storage failures into `LedgerError`.
//!
//! # Invariants
//! - Rule rejections are decided before the first write of a sequence.
//! - Any failure rolls the whole session back before it is surfaced.
//! - A rollback failure never replaces the original error.
//! - Read-only queries return empty results for blank input, never errors.

use crate::model::account::{
    is_valid_account_no, Account, AccountNumberSource, Holder, RandomAccountNumbers,
};
use crate::model::instrument::{Instrument, NewInstrument, RentalRecord, StudentId};
use crate::repo::ledger_repo::{LedgerRepository, LedgerSession, LedgerStore, RepoError};
use crate::rules::{self, RuleViolation};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const MAX_ACCOUNT_NO_ATTEMPTS: usize = 8;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Error taxonomy surfaced to ledger callers.
#[derive(Debug)]
pub enum LedgerError {
    /// Required input is blank or malformed.
    InvalidInput(String),
    /// Referenced account or instrument does not exist.
    NotFound(String),
    InsufficientFunds {
        account_no: String,
        balance: i64,
        amount: i64,
    },
    TooManyRentals {
        student_id: StudentId,
        active: i64,
    },
    NoneAvailable {
        instrument_name: String,
    },
    NoMatchingActiveRental {
        student_id: StudentId,
        instrument_name: String,
    },
    /// Store operation failed; the session was rolled back.
    StorageFailure {
        operation: &'static str,
        source: RepoError,
        /// Set when the rollback itself failed as well.
        rollback: Option<RepoError>,
    },
}

impl LedgerError {
    /// Stable machine-readable code used in logs and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::TooManyRentals { .. } => "too_many_rentals",
            Self::NoneAvailable { .. } => "none_available",
            Self::NoMatchingActiveRental { .. } => "no_matching_active_rental",
            Self::StorageFailure { .. } => "storage_failure",
        }
    }

    /// Returns whether the request was refused by validation rather than
    /// failing in storage.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::StorageFailure { .. })
    }

    /// Records a failed rollback on a storage failure.
    ///
    /// Other variants are returned unchanged; their rollback failures are only
    /// logged because no write preceded them.
    pub fn with_rollback_failure(self, rollback_error: RepoError) -> Self {
        match self {
            Self::StorageFailure {
                operation,
                source,
                rollback: None,
            } => Self::StorageFailure {
                operation,
                source,
                rollback: Some(rollback_error),
            },
            other => other,
        }
    }
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::NotFound(what) => write!(f, "{what} not found"),
            Self::InsufficientFunds {
                account_no,
                balance,
                amount,
            } => write!(
                f,
                "insufficient funds on account {account_no}: balance {balance}, requested {amount}"
            ),
            Self::TooManyRentals { student_id, active } => write!(
                f,
                "student {student_id} already has {active} active rentals (limit {})",
                rules::MAX_ACTIVE_RENTALS
            ),
            Self::NoneAvailable { instrument_name } => {
                write!(f, "no `{instrument_name}` available to rent")
            }
            Self::NoMatchingActiveRental {
                student_id,
                instrument_name,
            } => write!(
                f,
                "student {student_id} has no active rental of `{instrument_name}`"
            ),
            Self::StorageFailure {
                operation,
                source,
                rollback,
            } => {
                write!(f, "storage failure during {operation}: {source}")?;
                if let Some(rollback_error) = rollback {
                    write!(f, "; rollback also failed: {rollback_error}")?;
                }
                Ok(())
            }
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Account and instrument-rental facade over a ledger store.
pub struct LedgerService<S, N = RandomAccountNumbers> {
    store: S,
    account_numbers: N,
}

impl<S: LedgerStore> LedgerService<S> {
    /// Creates a service generating random account numbers.
    pub fn new(store: S) -> Self {
        Self::with_account_numbers(store, RandomAccountNumbers)
    }
}

impl<S: LedgerStore, N: AccountNumberSource> LedgerService<S, N> {
    pub fn with_account_numbers(store: S, account_numbers: N) -> Self {
        Self {
            store,
            account_numbers,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Opens a zero-balance account for `holder_name`.
    ///
    /// # Contract
    /// - Blank names are rejected with `InvalidInput`.
    /// - The holder row is reused when the name already exists.
    /// - The account number is checked against the store before use.
    pub fn open_account(&mut self, holder_name: &str) -> LedgerResult<Account> {
        const OPERATION: &str = "account_open";
        let holder_name = holder_name.trim();
        if holder_name.is_empty() {
            return Err(reject_input(OPERATION, "holder name must not be blank"));
        }

        let started_at = Instant::now();
        let session = begin_session(&mut self.store, OPERATION)?;
        let result = create_account_in(&session, &mut self.account_numbers, holder_name);
        finish_session(OPERATION, started_at, session, result)
    }

    pub fn deposit(&mut self, account_no: &str, amount: i64) -> LedgerResult<Account> {
        self.adjust_balance("account_deposit", account_no, amount, rules::validate_deposit)
    }

    /// Withdraws `amount`; rejected with `InsufficientFunds` before any write
    /// when the balance does not cover it.
    pub fn withdraw(&mut self, account_no: &str, amount: i64) -> LedgerResult<Account> {
        self.adjust_balance("account_withdraw", account_no, amount, rules::validate_withdraw)
    }

    /// Deletes one account. Missing accounts are reported as `NotFound`.
    pub fn delete_account(&mut self, account_no: &str) -> LedgerResult<()> {
        const OPERATION: &str = "account_delete";
        let account_no = require_account_no(OPERATION, account_no)?;

        let started_at = Instant::now();
        let session = begin_session(&mut self.store, OPERATION)?;
        let result = match session.delete_account(account_no) {
            Ok(0) => Err(LedgerError::NotFound(format!("account {account_no}"))),
            Ok(1) => Ok(()),
            Ok(actual) => Err(storage_failure(OPERATION)(RepoError::RowCountMismatch {
                operation: "delete_account",
                expected: 1,
                actual,
            })),
            Err(err) => Err(storage_failure(OPERATION)(err)),
        };
        finish_session(OPERATION, started_at, session, result)
    }

    pub fn list_accounts(&mut self) -> LedgerResult<Vec<Account>> {
        const OPERATION: &str = "account_list";
        let started_at = Instant::now();
        let session = begin_session(&mut self.store, OPERATION)?;
        let result = session
            .list_all_accounts()
            .map_err(storage_failure(OPERATION));
        finish_session(OPERATION, started_at, session, result)
    }

    /// Lists accounts owned by `holder_name`; empty for blank or unknown names.
    pub fn find_accounts_by_holder(&mut self, holder_name: &str) -> LedgerResult<Vec<Account>> {
        const OPERATION: &str = "account_find_by_holder";
        let holder_name = holder_name.trim();
        if holder_name.is_empty() {
            return Ok(Vec::new());
        }

        let started_at = Instant::now();
        let session = begin_session(&mut self.store, OPERATION)?;
        let result = session
            .find_accounts_by_holder(holder_name)
            .map_err(storage_failure(OPERATION));
        finish_session(OPERATION, started_at, session, result)
    }

    /// Looks up one account; `None` for blank, malformed or unknown numbers.
    pub fn find_account(&mut self, account_no: &str) -> LedgerResult<Option<Account>> {
        const OPERATION: &str = "account_find";
        let account_no = account_no.trim();
        if !is_valid_account_no(account_no) {
            return Ok(None);
        }

        let started_at = Instant::now();
        let session = begin_session(&mut self.store, OPERATION)?;
        let result = session
            .find_account_by_number(account_no)
            .map_err(storage_failure(OPERATION));
        finish_session(OPERATION, started_at, session, result)
    }

    /// Lists instruments of `instrument_type` with units on the shelf.
    pub fn list_available_rentals(
        &mut self,
        instrument_type: &str,
    ) -> LedgerResult<Vec<Instrument>> {
        const OPERATION: &str = "rental_list_available";
        let instrument_type = instrument_type.trim();
        if instrument_type.is_empty() {
            return Ok(Vec::new());
        }

        let started_at = Instant::now();
        let session = begin_session(&mut self.store, OPERATION)?;
        let result = session
            .find_available_rentals_by_type(instrument_type)
            .map_err(storage_failure(OPERATION));
        finish_session(OPERATION, started_at, session, result)
    }

    /// Registers a new instrument pool entry.
    pub fn stock_instrument(&mut self, instrument: NewInstrument) -> LedgerResult<Instrument> {
        const OPERATION: &str = "instrument_stock";
        let instrument = NewInstrument {
            instrument_name: instrument.instrument_name.trim().to_string(),
            instrument_type: instrument.instrument_type.trim().to_string(),
            ..instrument
        };
        if instrument.instrument_name.is_empty() {
            return Err(reject_input(OPERATION, "instrument name must not be blank"));
        }
        if instrument.instrument_type.is_empty() {
            return Err(reject_input(OPERATION, "instrument type must not be blank"));
        }
        if instrument.rental_cost < 0 || instrument.available_count < 0 {
            return Err(reject_input(
                OPERATION,
                "rental cost and available count must not be negative",
            ));
        }

        let started_at = Instant::now();
        let session = begin_session(&mut self.store, OPERATION)?;
        let result = stock_instrument_in(&session, &instrument);
        finish_session(OPERATION, started_at, session, result)
    }

    /// Rents one unit of `instrument_name` to `student_id`.
    ///
    /// # Contract
    /// - Eligibility (`TooManyRentals`) and availability (`NoneAvailable`) are
    ///   both checked before the record insert and the availability update.
    /// - The insert and the update commit together or not at all.
    pub fn rent_instrument(
        &mut self,
        student_id: StudentId,
        instrument_name: &str,
    ) -> LedgerResult<RentalRecord> {
        const OPERATION: &str = "instrument_rent";
        let instrument_name = require_rental_input(OPERATION, student_id, instrument_name)?;

        let started_at = Instant::now();
        debug!("event={OPERATION} module=ledger status=start student_id={student_id}");
        let session = begin_session(&mut self.store, OPERATION)?;
        let result = rent_in(&session, student_id, instrument_name);
        finish_session(OPERATION, started_at, session, result)
    }

    /// Closes the student's active rental of `instrument_name` and puts the
    /// unit back on the shelf.
    pub fn return_instrument(
        &mut self,
        student_id: StudentId,
        instrument_name: &str,
    ) -> LedgerResult<()> {
        const OPERATION: &str = "instrument_return";
        let instrument_name = require_rental_input(OPERATION, student_id, instrument_name)?;

        let started_at = Instant::now();
        debug!("event={OPERATION} module=ledger status=start student_id={student_id}");
        let session = begin_session(&mut self.store, OPERATION)?;
        let result = return_in(&session, student_id, instrument_name);
        finish_session(OPERATION, started_at, session, result)
    }

    /// Lists every rental record of `student_id`, newest first.
    pub fn rental_history(&mut self, student_id: StudentId) -> LedgerResult<Vec<RentalRecord>> {
        const OPERATION: &str = "rental_history";
        let started_at = Instant::now();
        let session = begin_session(&mut self.store, OPERATION)?;
        let result = session
            .list_rentals_for_student(student_id)
            .map_err(storage_failure(OPERATION));
        finish_session(OPERATION, started_at, session, result)
    }

    fn adjust_balance(
        &mut self,
        operation: &'static str,
        account_no: &str,
        amount: i64,
        rule: fn(i64, i64) -> Result<i64, RuleViolation>,
    ) -> LedgerResult<Account> {
        let account_no = require_account_no(operation, account_no)?;

        let started_at = Instant::now();
        debug!(
            "event={operation} module=ledger status=start account_no={account_no} amount={amount}"
        );
        let session = begin_session(&mut self.store, operation)?;
        let result = apply_balance_rule(&session, operation, account_no, amount, rule);
        finish_session(operation, started_at, session, result)
    }
}

fn create_account_in<R, N>(
    repo: &R,
    account_numbers: &mut N,
    holder_name: &str,
) -> LedgerResult<Account>
where
    R: LedgerRepository + ?Sized,
    N: AccountNumberSource + ?Sized,
{
    let holder = resolve_holder(repo, holder_name)?;
    let account_no = allocate_account_no(repo, account_numbers)?;
    repo.create_account(&account_no, 0, holder.holder_id)
        .map_err(storage_failure("account_open"))?;
    Ok(Account::new(account_no, holder.name))
}

/// Finds the holder named `holder_name`, creating it on first use.
fn resolve_holder<R: LedgerRepository + ?Sized>(
    repo: &R,
    holder_name: &str,
) -> LedgerResult<Holder> {
    let storage = storage_failure("account_open");
    let holder_id = match repo.find_holder_id_by_name(holder_name).map_err(storage)? {
        Some(holder_id) => holder_id,
        None => {
            debug!("event=holder_create module=ledger status=start");
            repo.create_holder(holder_name).map_err(storage)?
        }
    };
    Ok(Holder {
        holder_id,
        name: holder_name.to_string(),
    })
}

fn allocate_account_no<R, N>(repo: &R, account_numbers: &mut N) -> LedgerResult<String>
where
    R: LedgerRepository + ?Sized,
    N: AccountNumberSource + ?Sized,
{
    let storage = storage_failure("account_open");
    for attempt in 1..=MAX_ACCOUNT_NO_ATTEMPTS {
        let candidate = account_numbers.next_candidate();
        if !is_valid_account_no(&candidate) {
            warn!(
                "event=account_no_allocate module=ledger status=retry attempt={attempt} reason=malformed"
            );
            continue;
        }
        if repo
            .find_account_by_number(&candidate)
            .map_err(storage)?
            .is_none()
        {
            return Ok(candidate);
        }
        warn!(
            "event=account_no_allocate module=ledger status=retry attempt={attempt} reason=collision"
        );
    }

    Err(storage(RepoError::Conflict(format!(
        "no free account number after {MAX_ACCOUNT_NO_ATTEMPTS} attempts"
    ))))
}

fn apply_balance_rule<R: LedgerRepository + ?Sized>(
    repo: &R,
    operation: &'static str,
    account_no: &str,
    amount: i64,
    rule: fn(i64, i64) -> Result<i64, RuleViolation>,
) -> LedgerResult<Account> {
    let storage = storage_failure(operation);
    let mut account = repo
        .find_account_by_number(account_no)
        .map_err(storage)?
        .ok_or_else(|| LedgerError::NotFound(format!("account {account_no}")))?;

    let new_balance = rule(account.balance, amount)
        .map_err(|violation| balance_rejection(account_no, violation))?;
    repo.update_balance(account_no, new_balance).map_err(storage)?;

    account.balance = new_balance;
    Ok(account)
}

fn stock_instrument_in<R: LedgerRepository + ?Sized>(
    repo: &R,
    instrument: &NewInstrument,
) -> LedgerResult<Instrument> {
    let storage = storage_failure("instrument_stock");
    if repo
        .find_instrument_by_name(&instrument.instrument_name)
        .map_err(storage)?
        .is_some()
    {
        return Err(LedgerError::InvalidInput(format!(
            "instrument `{}` is already stocked",
            instrument.instrument_name
        )));
    }
    repo.create_instrument(instrument).map_err(storage)
}

fn rent_in<R: LedgerRepository + ?Sized>(
    repo: &R,
    student_id: StudentId,
    instrument_name: &str,
) -> LedgerResult<RentalRecord> {
    let storage = storage_failure("instrument_rent");
    let active_count = repo.count_active_rentals(student_id).map_err(storage)?;
    let instrument = repo
        .find_instrument_by_name(instrument_name)
        .map_err(storage)?
        .ok_or_else(|| LedgerError::NotFound(format!("instrument `{instrument_name}`")))?;

    let plan = rules::plan_rent(student_id, active_count, &instrument)
        .map_err(|violation| rental_rejection(student_id, instrument_name, violation))?;

    let record = repo
        .insert_rental_record(plan.instrument_id, plan.student_id)
        .map_err(storage)?;
    repo.update_availability(&plan.instrument_name, plan.new_available_count)
        .map_err(storage)?;

    debug!(
        "event=instrument_rent module=ledger status=planned rental_id={} available_count={} active_rentals={}",
        record.rental_id, plan.new_available_count, plan.new_active_count
    );
    Ok(record)
}

fn return_in<R: LedgerRepository + ?Sized>(
    repo: &R,
    student_id: StudentId,
    instrument_name: &str,
) -> LedgerResult<()> {
    let storage = storage_failure("instrument_return");
    let instrument = repo
        .find_instrument_by_name(instrument_name)
        .map_err(storage)?
        .ok_or_else(|| LedgerError::NotFound(format!("instrument `{instrument_name}`")))?;
    let active_rental_id = repo
        .find_active_rental_id(student_id, instrument.instrument_id)
        .map_err(storage)?;

    let plan = rules::plan_return(student_id, &instrument, active_rental_id)
        .map_err(|violation| rental_rejection(student_id, instrument_name, violation))?;

    repo.close_rental_record(plan.rental_id, plan.student_id).map_err(storage)?;
    repo.update_availability(&plan.instrument_name, plan.new_available_count)
        .map_err(storage)?;

    debug!(
        "event=instrument_return module=ledger status=planned rental_id={} available_count={}",
        plan.rental_id, plan.new_available_count
    );
    Ok(())
}

fn begin_session<'a, S: LedgerStore>(
    store: &'a mut S,
    operation: &'static str,
) -> LedgerResult<S::Session<'a>> {
    store.begin().map_err(|source| {
        error!(
            "event={operation} module=ledger status=error error_code=session_begin_failed error={source}"
        );
        storage_failure(operation)(source)
    })
}

/// Commits on success, rolls back on failure, and logs the outcome.
fn finish_session<Sess: LedgerSession, T>(
    operation: &'static str,
    started_at: Instant,
    session: Sess,
    result: LedgerResult<T>,
) -> LedgerResult<T> {
    let result = match result {
        Ok(value) => session
            .commit()
            .map(|()| value)
            .map_err(storage_failure(operation)),
        Err(err) => match session.rollback() {
            Ok(()) => Err(err),
            Err(rollback_error) => {
                error!(
                    "event={operation} module=ledger status=error error_code=rollback_failed error={rollback_error}"
                );
                Err(err.with_rollback_failure(rollback_error))
            }
        },
    };

    let duration_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(_) => info!("event={operation} module=ledger status=ok duration_ms={duration_ms}"),
        Err(err) if err.is_rejection() => warn!(
            "event={operation} module=ledger status=rejected duration_ms={duration_ms} error_code={} error={err}",
            err.code()
        ),
        Err(err) => error!(
            "event={operation} module=ledger status=error duration_ms={duration_ms} error_code={} error={err}",
            err.code()
        ),
    }
    result
}

fn storage_failure(operation: &'static str) -> impl Fn(RepoError) -> LedgerError + Copy {
    move |source| LedgerError::StorageFailure {
        operation,
        source,
        rollback: None,
    }
}

fn reject_input(operation: &'static str, message: impl Into<String>) -> LedgerError {
    let err = LedgerError::InvalidInput(message.into());
    warn!(
        "event={operation} module=ledger status=rejected error_code={} error={err}",
        err.code()
    );
    err
}

fn require_account_no<'a>(operation: &'static str, account_no: &'a str) -> LedgerResult<&'a str> {
    let account_no = account_no.trim();
    if account_no.is_empty() {
        return Err(reject_input(operation, "account number must not be blank"));
    }
    if !is_valid_account_no(account_no) {
        let err = LedgerError::NotFound(format!("account {account_no}"));
        warn!(
            "event={operation} module=ledger status=rejected error_code={} reason=malformed_account_no",
            err.code()
        );
        return Err(err);
    }
    Ok(account_no)
}

fn require_rental_input<'a>(
    operation: &'static str,
    student_id: StudentId,
    instrument_name: &'a str,
) -> LedgerResult<&'a str> {
    if student_id <= 0 {
        return Err(reject_input(
            operation,
            format!("student id must be positive, got {student_id}"),
        ));
    }
    let instrument_name = instrument_name.trim();
    if instrument_name.is_empty() {
        return Err(reject_input(operation, "instrument name must not be blank"));
    }
    Ok(instrument_name)
}

fn balance_rejection(account_no: &str, violation: RuleViolation) -> LedgerError {
    match violation {
        RuleViolation::InsufficientFunds { balance, amount } => LedgerError::InsufficientFunds {
            account_no: account_no.to_string(),
            balance,
            amount,
        },
        other => LedgerError::InvalidInput(other.to_string()),
    }
}

fn rental_rejection(
    student_id: StudentId,
    instrument_name: &str,
    violation: RuleViolation,
) -> LedgerError {
    match violation {
        RuleViolation::TooManyRentals { active } => {
            LedgerError::TooManyRentals { student_id, active }
        }
        RuleViolation::NoneAvailable { .. } => LedgerError::NoneAvailable {
            instrument_name: instrument_name.to_string(),
        },
        RuleViolation::NoMatchingActiveRental { .. } => LedgerError::NoMatchingActiveRental {
            student_id,
            instrument_name: instrument_name.to_string(),
        },
        other => LedgerError::InvalidInput(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{balance_rejection, rental_rejection, LedgerError, LedgerService};
    use crate::model::account::{Account, HolderId};
    use crate::model::instrument::{
        Instrument, InstrumentId, NewInstrument, RentalId, RentalRecord, StudentId,
    };
    use crate::repo::ledger_repo::{
        LedgerRepository, LedgerSession, LedgerStore, RepoError, RepoResult,
    };
    use crate::rules::RuleViolation;

    fn row_count_error(operation: &'static str) -> RepoError {
        RepoError::RowCountMismatch {
            operation,
            expected: 1,
            actual: 0,
        }
    }

    #[test]
    fn rollback_failure_is_appended_not_substituted() {
        let err = LedgerError::StorageFailure {
            operation: "instrument_rent",
            source: row_count_error("update_availability"),
            rollback: None,
        }
        .with_rollback_failure(RepoError::InvalidData("connection lost".to_string()));

        let message = err.to_string();
        assert!(message.starts_with("storage failure during instrument_rent"));
        assert!(message.contains("update_availability affected 0 rows"));
        assert!(message.contains("rollback also failed"));
        assert!(message.contains("connection lost"));
        assert_eq!(err.code(), "storage_failure");
        assert!(!err.is_rejection());
    }

    #[test]
    fn rollback_failure_keeps_rejection_variant() {
        let err = LedgerError::NotFound("account 1".to_string())
            .with_rollback_failure(row_count_error("rollback"));
        assert!(matches!(err, LedgerError::NotFound(_)));
        assert!(err.is_rejection());
    }

    #[test]
    fn storage_failure_exposes_source() {
        use std::error::Error;

        let err = LedgerError::StorageFailure {
            operation: "account_delete",
            source: row_count_error("delete_account"),
            rollback: None,
        };
        let source = err.source().expect("storage failure should carry a source");
        assert!(source.to_string().contains("delete_account"));
    }

    #[test]
    fn rule_violations_map_to_ledger_taxonomy() {
        let err = balance_rejection(
            "0000000001",
            RuleViolation::InsufficientFunds {
                balance: 5,
                amount: 9,
            },
        );
        assert_eq!(err.code(), "insufficient_funds");

        let err = balance_rejection("0000000001", RuleViolation::NonPositiveAmount(0));
        assert_eq!(err.code(), "invalid_input");

        let err = rental_rejection(3, "Violin", RuleViolation::NoneAvailable { available: 0 });
        assert_eq!(err.to_string(), "no `Violin` available to rent");

        let err = rental_rejection(3, "Violin", RuleViolation::TooManyRentals { active: 2 });
        assert!(matches!(
            err,
            LedgerError::TooManyRentals {
                student_id: 3,
                active: 2
            }
        ));
    }

    /// Store whose sessions read as empty, refuse every write, and fail to
    /// roll back.
    struct BrokenStore;

    struct BrokenSession;

    fn refused<T>(operation: &'static str) -> RepoResult<T> {
        Err(RepoError::InvalidData(format!("{operation} refused")))
    }

    impl LedgerStore for BrokenStore {
        type Session<'a> = BrokenSession;

        fn begin(&mut self) -> RepoResult<BrokenSession> {
            Ok(BrokenSession)
        }
    }

    impl LedgerSession for BrokenSession {
        fn commit(self) -> RepoResult<()> {
            refused("commit")
        }

        fn rollback(self) -> RepoResult<()> {
            refused("rollback")
        }
    }

    impl LedgerRepository for BrokenSession {
        fn find_holder_id_by_name(&self, _name: &str) -> RepoResult<Option<HolderId>> {
            Ok(None)
        }

        fn create_holder(&self, _name: &str) -> RepoResult<HolderId> {
            refused("create_holder")
        }

        fn create_account(&self, _: &str, _: i64, _: HolderId) -> RepoResult<()> {
            refused("create_account")
        }

        fn find_account_by_number(&self, _account_no: &str) -> RepoResult<Option<Account>> {
            Ok(None)
        }

        fn find_accounts_by_holder(&self, _holder_name: &str) -> RepoResult<Vec<Account>> {
            Ok(Vec::new())
        }

        fn list_all_accounts(&self) -> RepoResult<Vec<Account>> {
            Ok(Vec::new())
        }

        fn update_balance(&self, _: &str, _: i64) -> RepoResult<()> {
            refused("update_balance")
        }

        fn delete_account(&self, _account_no: &str) -> RepoResult<usize> {
            refused("delete_account")
        }

        fn create_instrument(&self, _instrument: &NewInstrument) -> RepoResult<Instrument> {
            refused("create_instrument")
        }

        fn find_available_rentals_by_type(&self, _: &str) -> RepoResult<Vec<Instrument>> {
            Ok(Vec::new())
        }

        fn find_instrument_by_name(&self, _: &str) -> RepoResult<Option<Instrument>> {
            Ok(None)
        }

        fn update_availability(&self, _: &str, _: i64) -> RepoResult<()> {
            refused("update_availability")
        }

        fn count_active_rentals(&self, _student_id: StudentId) -> RepoResult<i64> {
            Ok(0)
        }

        fn insert_rental_record(&self, _: InstrumentId, _: StudentId) -> RepoResult<RentalRecord> {
            refused("insert_rental_record")
        }

        fn find_active_rental_id(
            &self,
            _: StudentId,
            _: InstrumentId,
        ) -> RepoResult<Option<RentalId>> {
            Ok(None)
        }

        fn close_rental_record(&self, _: RentalId, _: StudentId) -> RepoResult<()> {
            refused("close_rental_record")
        }

        fn list_rentals_for_student(&self, _: StudentId) -> RepoResult<Vec<RentalRecord>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn failed_write_and_failed_rollback_are_both_reported() {
        let mut service = LedgerService::new(BrokenStore);

        let err = service.open_account("Ada").unwrap_err();
        match &err {
            LedgerError::StorageFailure {
                operation,
                source: RepoError::InvalidData(source),
                rollback: Some(RepoError::InvalidData(rollback)),
            } => {
                assert_eq!(*operation, "account_open");
                assert_eq!(source, "create_holder refused");
                assert_eq!(rollback, "rollback refused");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("rollback also failed"));
    }

    #[test]
    fn rejection_survives_failed_rollback() {
        let mut service = LedgerService::new(BrokenStore);

        let err = service.deposit("0000000001", 5).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
        assert!(err.is_rejection());
    }

    #[test]
    fn failed_commit_is_a_storage_failure() {
        let mut service = LedgerService::new(BrokenStore);

        let err = service.list_accounts().unwrap_err();
        assert!(matches!(
            err,
            LedgerError::StorageFailure {
                operation: "account_list",
                rollback: None,
                ..
            }
        ));
    }
}
