//! Interactive ledger shell.
//!
//! # Responsibility
//! - Read commands from stdin and dispatch them to `LedgerService`.
//! - Render results and ledger errors as text; no error ends the session.

mod command;

use bankjdbc_core::{
    process_config, Account, Instrument, LedgerService, LedgerStore, NewInstrument, RentalRecord,
};
use command::{parse_command, Command};
use log::info;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = process_config();
    if let Err(err) = config.init_logging() {
        eprintln!("logging disabled: {err}");
    }

    let store = match config.open_store() {
        Ok(store) => store,
        Err(err) => {
            eprintln!("cannot open ledger at {}: {err}", config.db_path.display());
            return ExitCode::FAILURE;
        }
    };
    info!("event=cli_start module=cli status=ok version={}", bankjdbc_core::core_version());

    let mut service = LedgerService::new(store);
    match run_shell(&mut service, io::stdin().lock(), io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("terminal i/o failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_shell<S: LedgerStore>(
    service: &mut LedgerService<S>,
    input: impl BufRead,
    mut output: impl Write,
) -> io::Result<()> {
    writeln!(output, "bankjdbc ledger {}; type `help`", bankjdbc_core::core_version())?;
    write!(output, "> ")?;
    output.flush()?;

    for line in input.lines() {
        match parse_command(&line?) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => {
                for row in execute(service, command) {
                    writeln!(output, "{row}")?;
                }
            }
            Ok(None) => {}
            Err(message) => writeln!(output, "{message}")?,
        }
        write!(output, "> ")?;
        output.flush()?;
    }
    Ok(())
}

/// Runs one command and renders its outcome as output lines.
fn execute<S: LedgerStore>(service: &mut LedgerService<S>, command: Command) -> Vec<String> {
    let outcome = match command {
        Command::Quit => Ok(Vec::new()),
        Command::OpenAccount { holder_name } => service
            .open_account(&holder_name.join(" "))
            .map(|account| vec![format!("opened {}", render_account(&account))]),
        Command::List { holder_name } if holder_name.is_empty() => service
            .list_accounts()
            .map(|accounts| render_all(&accounts, render_account, "no accounts")),
        Command::List { holder_name } => service
            .find_accounts_by_holder(&holder_name.join(" "))
            .map(|accounts| render_all(&accounts, render_account, "no accounts")),
        Command::ShowAccount { account_no } => service.find_account(&account_no).map(|found| {
            vec![found.map_or_else(
                || format!("no account {account_no}"),
                |account| render_account(&account),
            )]
        }),
        Command::Deposit { account_no, amount } => service
            .deposit(&account_no, amount)
            .map(|account| vec![render_account(&account)]),
        Command::Withdraw { account_no, amount } => service
            .withdraw(&account_no, amount)
            .map(|account| vec![render_account(&account)]),
        Command::Delete { account_no } => service
            .delete_account(&account_no)
            .map(|()| vec![format!("deleted account {account_no}")]),
        Command::Rentals { instrument_type } => service
            .list_available_rentals(&instrument_type.join(" "))
            .map(|instruments| render_all(&instruments, render_instrument, "nothing available")),
        Command::Rent {
            student_id,
            instrument_name,
        } => {
            let instrument_name = instrument_name.join(" ");
            service
                .rent_instrument(student_id, &instrument_name)
                .map(|record| {
                    vec![format!("rented `{instrument_name}`: {}", render_rental(&record))]
                })
        }
        Command::Return {
            student_id,
            instrument_name,
        } => {
            let instrument_name = instrument_name.join(" ");
            service
                .return_instrument(student_id, &instrument_name)
                .map(|()| vec![format!("student {student_id} returned `{instrument_name}`")])
        }
        Command::Stock {
            name,
            instrument_type,
            rental_cost,
            available_count,
        } => service
            .stock_instrument(NewInstrument {
                instrument_name: name,
                instrument_type,
                rental_cost,
                available_count,
            })
            .map(|instrument| vec![format!("stocked {}", render_instrument(&instrument))]),
        Command::History { student_id } => service
            .rental_history(student_id)
            .map(|records| render_all(&records, render_rental, "no rentals")),
    };

    outcome.unwrap_or_else(|err| vec![format!("error[{}]: {err}", err.code())])
}

fn render_all<T>(items: &[T], render: fn(&T) -> String, empty: &str) -> Vec<String> {
    if items.is_empty() {
        return vec![empty.to_string()];
    }
    items.iter().map(render).collect()
}

fn render_account(account: &Account) -> String {
    format!(
        "account {} holder={} balance={}",
        account.account_no, account.holder_name, account.balance
    )
}

fn render_instrument(instrument: &Instrument) -> String {
    format!(
        "{} type={} cost={} available={}",
        instrument.instrument_name,
        instrument.instrument_type,
        instrument.rental_cost,
        instrument.available_count
    )
}

fn render_rental(record: &RentalRecord) -> String {
    format!(
        "rental {} instrument={} student={} opened={} active={}",
        record.rental_id,
        record.instrument_id,
        record.student_id,
        record.date_opened,
        record.is_active
    )
}
