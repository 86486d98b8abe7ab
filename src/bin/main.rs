// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use building_ledger::{
    AccountDetails, AccountId, BuildingId, Engine, EngineConfig, ExpensePosting, LedgerError,
    RetryPolicy, retry_on_busy,
};
use clap::{Parser, ValueEnum};
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

/// Building Ledger - Replay ledger operation CSV files
///
/// Reads ledger operations from a CSV file and outputs account balances or
/// building summaries to stdout.
#[derive(Parser, Debug)]
#[command(name = "building-ledger")]
#[command(about = "Replays building ledger operations and reports balances", long_about = None)]
struct Args {
    /// Path to CSV file with ledger operations
    ///
    /// Expected format: op,building,account,to,amount,name,reference
    /// Example: cargo run -- operations.csv > balances.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// What to print once all operations are replayed
    #[arg(long, value_enum, default_value_t = Report::Balances)]
    report: Report,

    /// Let expense rows take an account below zero
    #[arg(long)]
    allow_negative_expenses: bool,

    /// Milliseconds to wait for an account lock
    #[arg(long, default_value_t = 250)]
    lock_timeout_ms: u64,

    /// Also write the resulting ledger state as JSON to this file
    #[arg(long, value_name = "FILE")]
    snapshot: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Report {
    /// One row per account
    Balances,
    /// One row per building
    Summary,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            error!("error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let config =
        EngineConfig::default().with_lock_timeout(Duration::from_millis(args.lock_timeout_ms));
    let options = ReplayOptions {
        allow_negative_expenses: args.allow_negative_expenses,
    };

    let engine = match replay_operations(BufReader::new(file), config, options) {
        Ok(engine) => engine,
        Err(e) => {
            error!("error processing operations: {}", e);
            process::exit(1);
        }
    };

    let written = match args.report {
        Report::Balances => write_balances(&engine, std::io::stdout()),
        Report::Summary => write_summaries(&engine, std::io::stdout()),
    };
    if let Err(e) = written {
        error!("error writing output: {}", e);
        process::exit(1);
    }

    if let Some(path) = &args.snapshot {
        let written = File::create(path)
            .map_err(|e| e.to_string())
            .and_then(|f| {
                let snapshot = engine.snapshot().map_err(|e| e.to_string())?;
                snapshot
                    .to_writer(BufWriter::new(f))
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = written {
            error!("error writing snapshot '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

/// Replay settings taken from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOptions {
    pub allow_negative_expenses: bool,
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, building, account, to, amount, name, reference`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    building: Option<u64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    account: Option<u64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    to: Option<u64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    reference: Option<String>,
}

/// A parsed ledger operation.
#[derive(Debug, Clone)]
enum Operation {
    Provision(BuildingId),
    Custom {
        building: BuildingId,
        name: String,
        initial_amount: Option<Decimal>,
    },
    Deposit(AccountId, Decimal),
    Transfer(AccountId, AccountId, Decimal),
    Expense {
        account: AccountId,
        amount: Decimal,
        reference: Option<String>,
    },
    Delete(AccountId),
}

impl CsvRecord {
    /// Converts the CSV record to an operation.
    ///
    /// Returns `None` for unknown operations or missing required fields.
    fn into_operation(self) -> Option<Operation> {
        let building = self.building.map(BuildingId);
        let account = self.account.map(AccountId);
        let name = self.name.filter(|name| !name.is_empty());
        let reference = self.reference.filter(|reference| !reference.is_empty());

        match self.op.to_lowercase().as_str() {
            "provision" => Some(Operation::Provision(building?)),
            "custom" => Some(Operation::Custom {
                building: building?,
                name: name?,
                initial_amount: self.amount,
            }),
            "deposit" => Some(Operation::Deposit(account?, self.amount?)),
            "transfer" => Some(Operation::Transfer(
                account?,
                AccountId(self.to?),
                self.amount?,
            )),
            "expense" => Some(Operation::Expense {
                account: account?,
                amount: self.amount?,
                reference,
            }),
            "delete" => Some(Operation::Delete(account?)),
            _ => None,
        }
    }
}

fn apply(engine: &Engine, operation: Operation, options: ReplayOptions) -> Result<(), LedgerError> {
    match operation {
        Operation::Provision(building) => {
            engine.ensure_main_account(building);
        }
        Operation::Custom {
            building,
            name,
            initial_amount,
        } => {
            engine.create_custom_account(building, AccountDetails::new(name), initial_amount, None)?;
        }
        Operation::Deposit(to, amount) => {
            engine.deposit(to, amount, None, None)?;
        }
        Operation::Transfer(from, to, amount) => {
            engine.transfer(from, to, amount, None, None)?;
        }
        Operation::Expense {
            account,
            amount,
            reference,
        } => {
            let mut posting = ExpensePosting::new(account, amount)
                .allow_negative_balance(options.allow_negative_expenses);
            if let Some(reference) = reference {
                posting = posting.reference_id(reference);
            }
            engine.post_expense(posting, None)?;
        }
        Operation::Delete(account) => {
            engine.delete_account(account)?;
        }
    }
    Ok(())
}

/// Replay ledger operations from a CSV reader.
///
/// Rows are processed in file order, streaming. Malformed rows and rejected
/// operations are logged and skipped.
///
/// # CSV Format
///
/// Expected columns: `op, building, account, to, amount, name, reference`
/// - `op`: provision, custom, deposit, transfer, expense, delete
/// - `building`: Building ID (provision, custom)
/// - `account`: Account ID (deposit target, transfer source, expense, delete)
/// - `to`: Transfer destination account ID
/// - `amount`: Decimal amount (optional initial amount for custom)
/// - `name`: Custom account name
/// - `reference`: Expense reference id
///
/// # Example
///
/// ```csv
/// op,building,account,to,amount,name,reference
/// provision,1,,,,,
/// deposit,,1,,500.00,,
/// custom,1,,,,repairs,
/// transfer,,1,2,200.00,,
/// expense,,2,,50.00,,invoice-17
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn replay_operations<R: Read>(
    reader: R,
    config: EngineConfig,
    options: ReplayOptions,
) -> Result<Engine, csv::Error> {
    let engine = Engine::with_config(config);

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for (line, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        let row = line + 2;
        match result {
            Ok(record) => {
                let Some(operation) = record.into_operation() else {
                    warn!(row, "skipping invalid operation record");
                    continue;
                };
                debug!(row, ?operation, "replaying operation");
                let applied = retry_on_busy(RetryPolicy::default(), || {
                    apply(&engine, operation.clone(), options)
                });
                if let Err(e) = applied {
                    warn!(row, error = %e, "operation rejected");
                }
            }
            Err(e) => {
                warn!(row, error = %e, "skipping malformed row");
            }
        }
    }

    Ok(engine)
}

/// Write account balances to a CSV writer.
///
/// # CSV Format
///
/// Columns: `account, building, name, main, balance, active, visible`
pub fn write_balances<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for account in engine.accounts() {
        wtr.serialize(&*account)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write one summary row per building to a CSV writer.
///
/// # CSV Format
///
/// Columns: `building_id, total_balance, main_balance, custom_balance, active_accounts`
pub fn write_summaries<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    let mut buildings: Vec<BuildingId> = engine
        .accounts()
        .iter()
        .filter(|account| account.is_main())
        .map(|account| account.building_id())
        .collect();
    buildings.sort();

    let reports = engine.reports();
    for building in buildings {
        // Buildings listed here always have a main account.
        if let Ok(summary) = reports.building_summary(building) {
            wtr.serialize(summary)?;
        }
    }
    wtr.flush()?;
    Ok(())
}
