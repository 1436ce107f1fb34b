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
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use wallet_ledger::{Account, AccountId, Engine, LedgerConfig, LedgerError, TransactionRecord};

/// Wallet Ledger - Replay wallet operations from a CSV file
///
/// Applies account openings, deposits, withdrawals and transfers in file
/// order, then prints the resulting balances (or one account's history) to
/// stdout as CSV.
#[derive(Parser, Debug)]
#[command(name = "wallet-ledger")]
#[command(about = "Replays wallet operations and reports balances", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: type,account,counterparty,amount,remark
    /// Example: cargo run -- operations.csv > balances.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Print the transaction history of this account instead of balances
    #[arg(long, value_name = "ACCOUNT")]
    history: Option<AccountId>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn main() {
    let args = Args::parse();

    let config = LedgerConfig::from_env();
    init_tracing(&config, args.json_logs);
    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        process::exit(1);
    }

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            error!(path = %args.input.display(), error = %e, "cannot open input");
            process::exit(1);
        }
    };

    let engine = Engine::with_config(config);
    if let Err(e) = process_operations(&engine, BufReader::new(file)) {
        error!(error = %e, "error processing operations");
        process::exit(1);
    }

    let written = match args.history {
        Some(account) => match engine.list_transactions(account) {
            Ok(records) => write_records(&records, std::io::stdout()),
            Err(e) => {
                error!(account = %account, error = %e, "cannot list transactions");
                process::exit(1);
            }
        },
        None => write_accounts(&engine.storage().accounts(), std::io::stdout()),
    };

    if let Err(e) = written {
        error!(error = %e, "error writing output");
        process::exit(1);
    }
}

/// Logs go to stderr so stdout stays clean CSV.
fn init_tracing(config: &LedgerConfig, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `type, account, counterparty, amount, remark`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "type")]
    op_type: String,
    account: String,
    #[serde(default)]
    counterparty: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(default)]
    remark: Option<String>,
}

/// One parsed wallet operation.
#[derive(Debug, Clone, PartialEq)]
enum Operation {
    Open {
        account: AccountId,
        balance: Decimal,
    },
    Deposit {
        account: AccountId,
        amount: Decimal,
        remark: String,
    },
    Withdraw {
        account: AccountId,
        amount: Decimal,
        remark: String,
    },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        remark: String,
    },
}

impl CsvRecord {
    fn into_operation(self) -> Result<Operation, LedgerError> {
        let account: AccountId = self.account.parse()?;
        let remark = self.remark.unwrap_or_default();
        let amount = || {
            self.amount
                .ok_or_else(|| LedgerError::InvalidArgument("missing amount".to_string()))
        };

        match self.op_type.to_lowercase().as_str() {
            "open" => Ok(Operation::Open {
                account,
                balance: self.amount.unwrap_or(Decimal::ZERO),
            }),
            "deposit" => Ok(Operation::Deposit {
                account,
                amount: amount()?,
                remark,
            }),
            "withdraw" | "withdrawal" => Ok(Operation::Withdraw {
                account,
                amount: amount()?,
                remark,
            }),
            "transfer" => {
                let to = self
                    .counterparty
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| LedgerError::InvalidArgument("missing counterparty".to_string()))?
                    .parse()?;
                Ok(Operation::Transfer {
                    from: account,
                    to,
                    amount: amount()?,
                    remark,
                })
            }
            other => Err(LedgerError::InvalidArgument(format!(
                "unknown operation type '{other}'"
            ))),
        }
    }
}

fn apply(engine: &Engine, operation: Operation) -> Result<(), LedgerError> {
    match operation {
        Operation::Open { account, balance } => {
            engine
                .storage()
                .insert_account(Account::new(account, balance))?;
        }
        Operation::Deposit {
            account,
            amount,
            remark,
        } => {
            engine.deposit(account, amount, &remark)?;
        }
        Operation::Withdraw {
            account,
            amount,
            remark,
        } => {
            engine.withdraw(account, amount, &remark)?;
        }
        Operation::Transfer {
            from,
            to,
            amount,
            remark,
        } => {
            engine.transfer(from, to, amount, &remark)?;
        }
    }
    Ok(())
}

/// Replays operations from a CSV reader into `engine`.
///
/// Rows are streamed, so the file can be arbitrarily large. Malformed rows
/// and rejected operations are logged and skipped.
///
/// # CSV Format
///
/// Expected columns: `type, account, counterparty, amount, remark`
/// - `type`: open, deposit, withdraw, transfer
/// - `account`: account UUID (the sender for transfers)
/// - `counterparty`: receiver UUID, transfers only
/// - `amount`: decimal amount (opening balance for `open`, may be empty)
/// - `remark`: free text, optional
///
/// # Errors
///
/// Returns a CSV error only if the reader itself fails.
fn process_operations<R: Read>(engine: &Engine, reader: R) -> Result<usize, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let mut applied = 0;
    for (row, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e),
            Err(e) => {
                warn!(row = row + 1, error = %e, "skipping malformed row");
                continue;
            }
        };

        match record.into_operation().and_then(|op| apply(engine, op)) {
            Ok(()) => applied += 1,
            Err(e) => warn!(row = row + 1, error = %e, "skipping operation"),
        }
    }

    info!(applied, "operations replayed");
    Ok(applied)
}

/// Writes account balances as `account,balance` CSV.
fn write_accounts<W: Write>(accounts: &[Account], writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for account in accounts {
        wtr.serialize(account)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes transaction records as CSV, most recent first.
fn write_records<W: Write>(records: &[TransactionRecord], writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}
