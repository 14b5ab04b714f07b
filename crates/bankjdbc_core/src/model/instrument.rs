//! Rentable instrument pool entries and rental records.

use serde::{Deserialize, Serialize};

/// Store-assigned instrument pool key.
pub type InstrumentId = i64;
/// Store-assigned rental record key.
pub type RentalId = i64;
/// External student identifier; students are not stored in this ledger.
pub type StudentId = i64;

/// One instrument pool entry (a brand/model with a number of units).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub instrument_id: InstrumentId,
    pub instrument_name: String,
    pub instrument_type: String,
    /// Cost per rental in whole currency units.
    pub rental_cost: i64,
    /// Units currently on the shelf.
    pub available_count: i64,
}

/// Input for registering a new instrument pool entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInstrument {
    pub instrument_name: String,
    pub instrument_type: String,
    pub rental_cost: i64,
    pub available_count: i64,
}

/// Rental of one instrument unit by one student.
///
/// Records are never deleted; returning an instrument only clears
/// `is_active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalRecord {
    pub rental_id: RentalId,
    pub instrument_id: InstrumentId,
    pub student_id: StudentId,
    /// `YYYY-MM-DD`, assigned by the store.
    pub date_opened: String,
    pub is_active: bool,
}
