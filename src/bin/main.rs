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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use mess_ledger_rs::{AccountId, Engine, EntryKind, Role};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Mess Ledger - Replay wallet transaction CSV files
///
/// Reads credits and debits from a CSV file and outputs per-account wallet
/// summaries to stdout. Accounts seen for the first time are registered as
/// students with a synthesized name.
#[derive(Parser, Debug)]
#[command(name = "mess-ledger-rs")]
#[command(about = "A wallet engine that replays transaction CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with transactions
    ///
    /// Expected format: kind,account,amount,memo
    /// Example: cargo run -- transactions.csv > wallets.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let engine = match replay_transactions(BufReader::new(file)) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error processing transactions: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_wallets(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `kind, account, amount, memo`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    kind: String,
    account: u32,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    memo: Option<String>,
}

impl CsvRecord {
    fn entry_kind(&self) -> Option<EntryKind> {
        match self.kind.to_lowercase().as_str() {
            "credit" => Some(EntryKind::Credit),
            "debit" => Some(EntryKind::Debit),
            _ => None,
        }
    }
}

/// Replays wallet transactions from a CSV reader.
///
/// Streaming parse: arbitrarily large files are handled without loading
/// them into memory. Malformed rows and rejected transactions (insufficient
/// funds, bad amounts) are skipped, not fatal.
///
/// # CSV Format
///
/// Expected columns: `kind, account, amount, memo`
/// - `kind`: credit or debit
/// - `account`: account id (u32)
/// - `amount`: positive decimal
/// - `memo`: optional free text
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn replay_transactions<R: Read>(reader: R) -> Result<Engine, csv::Error> {
    let engine = Engine::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true) // Allow a missing memo field
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                let Some(kind) = record.entry_kind() else {
                    tracing::debug!(kind = %record.kind, "skipping unknown transaction kind");
                    continue;
                };
                let Some(amount) = record.amount else {
                    tracing::debug!(account = record.account, "skipping row without amount");
                    continue;
                };

                let account_id = AccountId(record.account);
                if engine.account(account_id).is_none() {
                    // Replay input carries no directory data; register a
                    // bare student account on first sight.
                    let name = format!("account-{}", record.account);
                    let _ = engine.register_account(account_id, name, Role::Student, None);
                }

                if let Err(e) =
                    engine.create_transaction(account_id, kind, amount, record.memo.clone())
                {
                    tracing::debug!(account = record.account, error = %e, "skipping transaction");
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed row");
                continue;
            }
        }
    }

    Ok(engine)
}

/// Writes wallet summaries to a CSV writer.
///
/// # CSV Format
///
/// Columns: `account_id, balance, total_credited, total_debited, entry_count`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_wallets<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for account in engine.accounts() {
        wtr.serialize(account.wallet_summary())?;
    }

    wtr.flush()?;
    Ok(())
}
