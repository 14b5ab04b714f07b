//! Ledger store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the account, holder, instrument and rental queries used by the
//!   ledger service.
//! - Scope every operation sequence to one store session (transaction).
//!
//! # Invariants
//! - Single-row writes verify their affected-row count; any mismatch is an
//!   error, never a silent no-op.
//! - Sessions roll back when dropped without `commit`.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::account::{Account, HolderId};
use crate::model::instrument::{
    Instrument, InstrumentId, NewInstrument, RentalId, RentalRecord, StudentId,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ACCOUNT_SELECT_SQL: &str = "SELECT
    a.account_no,
    a.balance,
    h.name
FROM account a
INNER JOIN holder h ON h.holder_id = a.holder_id";

const INSTRUMENT_SELECT_SQL: &str = "SELECT
    renting_id,
    instrument_name,
    instrument_type,
    rental_cost,
    available_instrument_amount
FROM renting_instrument";

const RENTAL_SELECT_SQL: &str = "SELECT
    rented_id,
    instrument_id,
    student_id,
    date_opened,
    currently_renting
FROM rented_instrument";

const REQUIRED_TABLES: [&str; 4] = ["holder", "account", "renting_instrument", "rented_instrument"];

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence error for ledger store operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// A write expected to touch exactly `expected` rows touched `actual`.
    RowCountMismatch {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },
    InvalidData(String),
    /// A generated key kept colliding with existing rows.
    Conflict(String),
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::RowCountMismatch {
                operation,
                expected,
                actual,
            } => write!(f, "{operation} affected {actual} rows, expected {expected}"),
            Self::InvalidData(message) => write!(f, "invalid persisted ledger data: {message}"),
            Self::Conflict(message) => write!(f, "key conflict: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::RowCountMismatch { .. } => None,
            Self::InvalidData(_) => None,
            Self::Conflict(_) => None,
            Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Data access used by ledger use-cases.
///
/// All methods run inside the session that implements them.
pub trait LedgerRepository {
    fn find_holder_id_by_name(&self, name: &str) -> RepoResult<Option<HolderId>>;
    fn create_holder(&self, name: &str) -> RepoResult<HolderId>;

    fn create_account(&self, account_no: &str, balance: i64, holder_id: HolderId)
        -> RepoResult<()>;
    fn find_account_by_number(&self, account_no: &str) -> RepoResult<Option<Account>>;
    fn find_accounts_by_holder(&self, holder_name: &str) -> RepoResult<Vec<Account>>;
    fn list_all_accounts(&self) -> RepoResult<Vec<Account>>;
    fn update_balance(&self, account_no: &str, new_balance: i64) -> RepoResult<()>;
    /// Deletes one account and returns the number of rows removed.
    fn delete_account(&self, account_no: &str) -> RepoResult<usize>;

    fn create_instrument(&self, instrument: &NewInstrument) -> RepoResult<Instrument>;
    /// Lists pool entries of `instrument_type` with at least one unit available.
    fn find_available_rentals_by_type(&self, instrument_type: &str)
        -> RepoResult<Vec<Instrument>>;
    fn find_instrument_by_name(&self, instrument_name: &str) -> RepoResult<Option<Instrument>>;
    fn update_availability(&self, instrument_name: &str, new_count: i64) -> RepoResult<()>;

    fn count_active_rentals(&self, student_id: StudentId) -> RepoResult<i64>;
    /// Inserts an active rental opened today and returns the stored record.
    fn insert_rental_record(
        &self,
        instrument_id: InstrumentId,
        student_id: StudentId,
    ) -> RepoResult<RentalRecord>;
    fn find_active_rental_id(
        &self,
        student_id: StudentId,
        instrument_id: InstrumentId,
    ) -> RepoResult<Option<RentalId>>;
    fn close_rental_record(&self, rental_id: RentalId, student_id: StudentId) -> RepoResult<()>;
    /// Lists every rental record of a student, newest first.
    fn list_rentals_for_student(&self, student_id: StudentId) -> RepoResult<Vec<RentalRecord>>;
}

/// One all-or-nothing unit of work against the store.
pub trait LedgerSession: LedgerRepository {
    fn commit(self) -> RepoResult<()>;
    fn rollback(self) -> RepoResult<()>;
}

/// Store handle that hands out one session per operation sequence.
pub trait LedgerStore {
    type Session<'a>: LedgerSession
    where
        Self: 'a;

    fn begin(&mut self) -> RepoResult<Self::Session<'_>>;
}

/// SQLite-backed ledger store owning its connection.
pub struct SqliteLedgerStore {
    conn: Connection,
}

impl SqliteLedgerStore {
    /// Wraps a migrated connection, rejecting schemas without ledger tables.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        for table in REQUIRED_TABLES {
            if !table_exists(&conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }

    /// Read access to the underlying connection outside any session.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl LedgerStore for SqliteLedgerStore {
    type Session<'a> = SqliteLedgerSession<'a>;

    /// Opens an `IMMEDIATE` transaction so concurrent writers serialize on
    /// the database lock instead of racing between read and write.
    fn begin(&mut self) -> RepoResult<SqliteLedgerSession<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(SqliteLedgerSession { tx })
    }
}

/// SQLite transaction scoped to one ledger operation.
pub struct SqliteLedgerSession<'conn> {
    tx: Transaction<'conn>,
}

impl LedgerSession for SqliteLedgerSession<'_> {
    fn commit(self) -> RepoResult<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> RepoResult<()> {
        self.tx.rollback()?;
        Ok(())
    }
}

impl LedgerRepository for SqliteLedgerSession<'_> {
    fn find_holder_id_by_name(&self, name: &str) -> RepoResult<Option<HolderId>> {
        let holder_id = self
            .tx
            .query_row(
                "SELECT holder_id FROM holder WHERE name = ?1;",
                [name],
                |row| row.get::<_, HolderId>(0),
            )
            .optional()?;
        Ok(holder_id)
    }

    fn create_holder(&self, name: &str) -> RepoResult<HolderId> {
        let changed = self
            .tx
            .execute("INSERT INTO holder (name) VALUES (?1);", [name])?;
        ensure_single_row("create_holder", changed)?;
        Ok(self.tx.last_insert_rowid())
    }

    fn create_account(
        &self,
        account_no: &str,
        balance: i64,
        holder_id: HolderId,
    ) -> RepoResult<()> {
        let changed = self.tx.execute(
            "INSERT INTO account (account_no, balance, holder_id) VALUES (?1, ?2, ?3);",
            params![account_no, balance, holder_id],
        )?;
        ensure_single_row("create_account", changed)
    }

    fn find_account_by_number(&self, account_no: &str) -> RepoResult<Option<Account>> {
        let mut stmt = self
            .tx
            .prepare(&format!("{ACCOUNT_SELECT_SQL} WHERE a.account_no = ?1;"))?;
        let mut rows = stmt.query([account_no])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_account_row(row)?));
        }
        Ok(None)
    }

    fn find_accounts_by_holder(&self, holder_name: &str) -> RepoResult<Vec<Account>> {
        let mut stmt = self.tx.prepare(&format!(
            "{ACCOUNT_SELECT_SQL} WHERE h.name = ?1 ORDER BY a.account_id ASC;"
        ))?;
        let mut rows = stmt.query([holder_name])?;
        let mut accounts = Vec::new();
        while let Some(row) = rows.next()? {
            accounts.push(parse_account_row(row)?);
        }
        Ok(accounts)
    }

    fn list_all_accounts(&self) -> RepoResult<Vec<Account>> {
        let mut stmt = self
            .tx
            .prepare(&format!("{ACCOUNT_SELECT_SQL} ORDER BY a.account_id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut accounts = Vec::new();
        while let Some(row) = rows.next()? {
            accounts.push(parse_account_row(row)?);
        }
        Ok(accounts)
    }

    fn update_balance(&self, account_no: &str, new_balance: i64) -> RepoResult<()> {
        let changed = self.tx.execute(
            "UPDATE account SET balance = ?1 WHERE account_no = ?2;",
            params![new_balance, account_no],
        )?;
        ensure_single_row("update_balance", changed)
    }

    fn delete_account(&self, account_no: &str) -> RepoResult<usize> {
        let changed = self
            .tx
            .execute("DELETE FROM account WHERE account_no = ?1;", [account_no])?;
        Ok(changed)
    }

    fn create_instrument(&self, instrument: &NewInstrument) -> RepoResult<Instrument> {
        let changed = self.tx.execute(
            "INSERT INTO renting_instrument (
                instrument_name,
                instrument_type,
                rental_cost,
                available_instrument_amount
            ) VALUES (?1, ?2, ?3, ?4);",
            params![
                instrument.instrument_name.as_str(),
                instrument.instrument_type.as_str(),
                instrument.rental_cost,
                instrument.available_count,
            ],
        )?;
        ensure_single_row("create_instrument", changed)?;

        let instrument_id = self.tx.last_insert_rowid();
        let mut stmt = self
            .tx
            .prepare(&format!("{INSTRUMENT_SELECT_SQL} WHERE renting_id = ?1;"))?;
        let mut rows = stmt.query([instrument_id])?;
        match rows.next()? {
            Some(row) => parse_instrument_row(row),
            None => Err(RepoError::InvalidData(format!(
                "instrument {instrument_id} missing after insert"
            ))),
        }
    }

    fn find_available_rentals_by_type(
        &self,
        instrument_type: &str,
    ) -> RepoResult<Vec<Instrument>> {
        let mut stmt = self.tx.prepare(&format!(
            "{INSTRUMENT_SELECT_SQL}
             WHERE available_instrument_amount > 0
               AND instrument_type = ?1
             ORDER BY instrument_name ASC;"
        ))?;
        let mut rows = stmt.query([instrument_type])?;
        let mut instruments = Vec::new();
        while let Some(row) = rows.next()? {
            instruments.push(parse_instrument_row(row)?);
        }
        Ok(instruments)
    }

    fn find_instrument_by_name(&self, instrument_name: &str) -> RepoResult<Option<Instrument>> {
        let mut stmt = self
            .tx
            .prepare(&format!("{INSTRUMENT_SELECT_SQL} WHERE instrument_name = ?1;"))?;
        let mut rows = stmt.query([instrument_name])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_instrument_row(row)?));
        }
        Ok(None)
    }

    fn update_availability(&self, instrument_name: &str, new_count: i64) -> RepoResult<()> {
        let changed = self.tx.execute(
            "UPDATE renting_instrument
             SET available_instrument_amount = ?1
             WHERE instrument_name = ?2;",
            params![new_count, instrument_name],
        )?;
        ensure_single_row("update_availability", changed)
    }

    fn count_active_rentals(&self, student_id: StudentId) -> RepoResult<i64> {
        let count = self.tx.query_row(
            "SELECT COUNT(*)
             FROM rented_instrument
             WHERE student_id = ?1
               AND currently_renting = 1;",
            [student_id],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(count)
    }

    fn insert_rental_record(
        &self,
        instrument_id: InstrumentId,
        student_id: StudentId,
    ) -> RepoResult<RentalRecord> {
        let changed = self.tx.execute(
            "INSERT INTO rented_instrument (
                instrument_id,
                student_id,
                date_opened,
                currently_renting
            ) VALUES (?1, ?2, date('now'), 1);",
            params![instrument_id, student_id],
        )?;
        ensure_single_row("insert_rental_record", changed)?;

        let rental_id = self.tx.last_insert_rowid();
        let mut stmt = self
            .tx
            .prepare(&format!("{RENTAL_SELECT_SQL} WHERE rented_id = ?1;"))?;
        let mut rows = stmt.query([rental_id])?;
        match rows.next()? {
            Some(row) => parse_rental_row(row),
            None => Err(RepoError::InvalidData(format!(
                "rental {rental_id} missing after insert"
            ))),
        }
    }

    fn find_active_rental_id(
        &self,
        student_id: StudentId,
        instrument_id: InstrumentId,
    ) -> RepoResult<Option<RentalId>> {
        let rental_id = self
            .tx
            .query_row(
                "SELECT rented_id
                 FROM rented_instrument
                 WHERE student_id = ?1
                   AND instrument_id = ?2
                   AND currently_renting = 1
                 ORDER BY rented_id ASC
                 LIMIT 1;",
                params![student_id, instrument_id],
                |row| row.get::<_, RentalId>(0),
            )
            .optional()?;
        Ok(rental_id)
    }

    fn close_rental_record(&self, rental_id: RentalId, student_id: StudentId) -> RepoResult<()> {
        let changed = self.tx.execute(
            "UPDATE rented_instrument
             SET currently_renting = 0
             WHERE rented_id = ?1
               AND student_id = ?2
               AND currently_renting = 1;",
            params![rental_id, student_id],
        )?;
        ensure_single_row("close_rental_record", changed)
    }

    fn list_rentals_for_student(&self, student_id: StudentId) -> RepoResult<Vec<RentalRecord>> {
        let mut stmt = self.tx.prepare(&format!(
            "{RENTAL_SELECT_SQL} WHERE student_id = ?1 ORDER BY rented_id DESC;"
        ))?;
        let mut rows = stmt.query([student_id])?;
        let mut rentals = Vec::new();
        while let Some(row) = rows.next()? {
            rentals.push(parse_rental_row(row)?);
        }
        Ok(rentals)
    }
}

fn ensure_single_row(operation: &'static str, changed: usize) -> RepoResult<()> {
    if changed != 1 {
        return Err(RepoError::RowCountMismatch {
            operation,
            expected: 1,
            actual: changed,
        });
    }
    Ok(())
}

fn parse_account_row(row: &Row<'_>) -> RepoResult<Account> {
    let account_no: String = row.get("account_no")?;
    let balance: i64 = row.get("balance")?;
    if balance < 0 {
        return Err(RepoError::InvalidData(format!(
            "negative balance {balance} on account `{account_no}`"
        )));
    }

    Ok(Account {
        account_no,
        holder_name: row.get("name")?,
        balance,
    })
}

fn parse_instrument_row(row: &Row<'_>) -> RepoResult<Instrument> {
    let instrument_name: String = row.get("instrument_name")?;
    let available_count: i64 = row.get("available_instrument_amount")?;
    if available_count < 0 {
        return Err(RepoError::InvalidData(format!(
            "negative availability {available_count} for instrument `{instrument_name}`"
        )));
    }

    Ok(Instrument {
        instrument_id: row.get("renting_id")?,
        instrument_name,
        instrument_type: row.get("instrument_type")?,
        rental_cost: row.get("rental_cost")?,
        available_count,
    })
}

fn parse_rental_row(row: &Row<'_>) -> RepoResult<RentalRecord> {
    let rental_id: RentalId = row.get("rented_id")?;
    let is_active = match row.get::<_, i64>("currently_renting")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid currently_renting value `{other}` on rental {rental_id}"
            )));
        }
    };

    Ok(RentalRecord {
        rental_id,
        instrument_id: row.get("instrument_id")?,
        student_id: row.get("student_id")?,
        date_opened: row.get("date_opened")?,
        is_active,
    })
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
