use bankjdbc_core::db::open_db_in_memory;
use bankjdbc_core::{
    Instrument, LedgerError, LedgerService, NewInstrument, RepoError, SqliteLedgerStore,
    MAX_ACTIVE_RENTALS,
};

fn service() -> LedgerService<SqliteLedgerStore> {
    let store = SqliteLedgerStore::try_new(open_db_in_memory().unwrap()).unwrap();
    LedgerService::new(store)
}

fn stock(
    service: &mut LedgerService<SqliteLedgerStore>,
    name: &str,
    kind: &str,
    available_count: i64,
) -> Instrument {
    service
        .stock_instrument(NewInstrument {
            instrument_name: name.to_string(),
            instrument_type: kind.to_string(),
            rental_cost: 100,
            available_count,
        })
        .unwrap()
}

fn available_count(service: &LedgerService<SqliteLedgerStore>, name: &str) -> i64 {
    service
        .store()
        .connection()
        .query_row(
            "SELECT available_instrument_amount FROM renting_instrument WHERE instrument_name = ?1;",
            [name],
            |row| row.get(0),
        )
        .unwrap()
}

fn rental_rows(service: &LedgerService<SqliteLedgerStore>) -> i64 {
    service
        .store()
        .connection()
        .query_row("SELECT COUNT(*) FROM rented_instrument;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn violin_rent_and_return_cycle() {
    let mut service = service();
    let violin = stock(&mut service, "Violin", "string", 1);

    let record = service.rent_instrument(7, "Violin").unwrap();
    assert_eq!(record.instrument_id, violin.instrument_id);
    assert_eq!(record.student_id, 7);
    assert!(record.is_active);
    assert_eq!(record.date_opened.len(), 10);
    assert_eq!(available_count(&service, "Violin"), 0);

    let err = service.rent_instrument(8, "Violin").unwrap_err();
    assert!(matches!(err, LedgerError::NoneAvailable { .. }));
    assert_eq!(available_count(&service, "Violin"), 0);
    assert_eq!(rental_rows(&service), 1);

    service.return_instrument(7, "Violin").unwrap();
    assert_eq!(available_count(&service, "Violin"), 1);
    let history = service.rental_history(7).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].rental_id, record.rental_id);
    assert!(!history[0].is_active);

    service.rent_instrument(8, "Violin").unwrap();
    assert_eq!(available_count(&service, "Violin"), 0);
}

#[test]
fn third_rental_is_rejected_without_state_change() {
    let mut service = service();
    stock(&mut service, "Violin", "string", 3);
    stock(&mut service, "Cello", "string", 3);
    stock(&mut service, "Viola", "string", 3);

    service.rent_instrument(7, "Violin").unwrap();
    service.rent_instrument(7, "Cello").unwrap();

    let err = service.rent_instrument(7, "Viola").unwrap_err();
    match err {
        LedgerError::TooManyRentals { student_id, active } => {
            assert_eq!(student_id, 7);
            assert_eq!(active, MAX_ACTIVE_RENTALS);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(available_count(&service, "Viola"), 3);
    assert_eq!(rental_rows(&service), 2);
}

#[test]
fn eligibility_is_checked_before_availability() {
    let mut service = service();
    stock(&mut service, "Violin", "string", 2);
    stock(&mut service, "Harp", "string", 0);
    service.rent_instrument(7, "Violin").unwrap();
    service.rent_instrument(7, "Violin").unwrap();

    let err = service.rent_instrument(7, "Harp").unwrap_err();
    assert_eq!(err.code(), "too_many_rentals");
}

#[test]
fn returned_rentals_free_a_slot() {
    let mut service = service();
    stock(&mut service, "Violin", "string", 3);
    service.rent_instrument(7, "Violin").unwrap();
    service.rent_instrument(7, "Violin").unwrap();
    service.return_instrument(7, "Violin").unwrap();

    service.rent_instrument(7, "Violin").unwrap();
    assert_eq!(available_count(&service, "Violin"), 1);

    let history = service.rental_history(7).unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history.iter().filter(|record| record.is_active).count(), 2);
    assert!(history[0].rental_id > history[1].rental_id, "newest first");
}

#[test]
fn return_without_active_rental_is_rejected() {
    let mut service = service();
    stock(&mut service, "Violin", "string", 1);
    service.rent_instrument(7, "Violin").unwrap();

    let err = service.return_instrument(8, "Violin").unwrap_err();
    assert!(matches!(
        err,
        LedgerError::NoMatchingActiveRental { student_id: 8, .. }
    ));
    assert_eq!(available_count(&service, "Violin"), 0);

    service.return_instrument(7, "Violin").unwrap();
    let err = service.return_instrument(7, "Violin").unwrap_err();
    assert_eq!(err.code(), "no_matching_active_rental");
    assert_eq!(available_count(&service, "Violin"), 1);
}

#[test]
fn unknown_instrument_and_bad_input() {
    let mut service = service();

    let err = service.rent_instrument(7, "Theremin").unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
    let err = service.return_instrument(7, "Theremin").unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    assert_eq!(
        service.rent_instrument(0, "Violin").unwrap_err().code(),
        "invalid_input"
    );
    assert_eq!(
        service.rent_instrument(7, "  ").unwrap_err().code(),
        "invalid_input"
    );
    assert!(service.rental_history(7).unwrap().is_empty());
}

#[test]
fn available_rentals_are_filtered_by_type_and_stock() {
    let mut service = service();
    stock(&mut service, "Violin", "string", 1);
    stock(&mut service, "Cello", "string", 0);
    stock(&mut service, "Trumpet", "brass", 2);

    let strings = service.list_available_rentals(" string ").unwrap();
    let names: Vec<&str> = strings
        .iter()
        .map(|instrument| instrument.instrument_name.as_str())
        .collect();
    assert_eq!(names, vec!["Violin"]);
    assert_eq!(strings[0].rental_cost, 100);

    service.rent_instrument(7, "Violin").unwrap();
    assert!(service.list_available_rentals("string").unwrap().is_empty());
    assert!(service.list_available_rentals("").unwrap().is_empty());
    assert!(service.list_available_rentals("keys").unwrap().is_empty());
}

#[test]
fn stocking_validates_input_and_rejects_duplicates() {
    let mut service = service();
    stock(&mut service, "Violin", "string", 1);

    let duplicate = service
        .stock_instrument(NewInstrument {
            instrument_name: " Violin ".to_string(),
            instrument_type: "string".to_string(),
            rental_cost: 50,
            available_count: 4,
        })
        .unwrap_err();
    assert_eq!(duplicate.code(), "invalid_input");

    let negative = service
        .stock_instrument(NewInstrument {
            instrument_name: "Flute".to_string(),
            instrument_type: "woodwind".to_string(),
            rental_cost: 50,
            available_count: -1,
        })
        .unwrap_err();
    assert_eq!(negative.code(), "invalid_input");
    assert_eq!(available_count(&service, "Violin"), 1);
}

#[test]
fn failed_availability_update_rolls_back_rental_record() {
    let mut service = service();
    stock(&mut service, "Violin", "string", 1);
    service
        .store()
        .connection()
        .execute_batch(
            "CREATE TRIGGER fail_availability_update
             BEFORE UPDATE ON renting_instrument
             BEGIN
                 SELECT RAISE(ABORT, 'injected failure');
             END;",
        )
        .unwrap();

    let err = service.rent_instrument(7, "Violin").unwrap_err();
    match &err {
        LedgerError::StorageFailure {
            operation,
            source: RepoError::Db(_),
            rollback: None,
        } => assert_eq!(*operation, "instrument_rent"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!err.is_rejection());
    assert_eq!(rental_rows(&service), 0);
    assert_eq!(available_count(&service, "Violin"), 1);
}
