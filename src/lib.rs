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

//! # Wallet Ledger
//!
//! This library provides the balance-mutation and transaction-recording engine
//! for a single-currency custodial wallet: deposits, withdrawals and
//! transfers between two accounts, each recorded as immutable transaction
//! records alongside the account's current balance.
//!
//! ## Core Components
//!
//! - [`Engine`]: Applies mutations and owns the ledger invariants
//! - [`Storage`]: Unit-of-work contract over account rows and the transaction log
//! - [`MemoryStorage`]: In-process storage with per-account row locks
//! - [`TransactionRecord`]: Immutable `CREDIT`/`DEBIT` entry
//! - [`LedgerError`]: Error types for ledger operations
//!
//! ## Example
//!
//! ```
//! use wallet_ledger::{Direction, Engine};
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new();
//! let alice = engine.storage().open_account(dec!(100)).unwrap();
//! let bob = engine.storage().open_account(dec!(50)).unwrap();
//!
//! let (debit, credit) = engine.transfer(alice.id, bob.id, dec!(30), "dinner").unwrap();
//! assert_eq!(debit.direction, Direction::Debit);
//! assert_eq!(debit.balance_after, dec!(70));
//! assert_eq!(credit.balance_after, dec!(80));
//! ```
//!
//! ## Invariants
//!
//! - Balances never go negative in any committed state.
//! - A transfer debits and credits the same amount, so the sum of balances
//!   is unchanged.
//! - Both legs of a transfer become visible together or not at all.
//!
//! ## Thread Safety
//!
//! The engine is `Send + Sync` and meant to be shared behind an `Arc`.
//! Operations on different accounts proceed in parallel; operations on the
//! same account serialize on that account's row lock.

pub mod account;
mod base;
pub mod config;
mod engine;
pub mod error;
mod journal;
pub mod memory;
pub mod storage;
mod transaction;

pub use account::Account;
pub use base::{AccountId, TransactionId};
pub use config::{LedgerConfig, RetryConfig, StorageConfig};
pub use engine::Engine;
pub use error::{ErrorKind, LedgerError, StorageError};
pub use memory::{MemoryStorage, MemoryUnit};
pub use storage::{AccountStore, Storage, TransactionLog, UnitOfWork};
pub use transaction::{Direction, TransactionRecord};
