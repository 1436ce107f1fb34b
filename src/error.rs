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

//! Error types for ledger operations and the storage layer beneath them.

use crate::base::{AccountId, TransactionId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Failures reported by a [`Storage`](crate::storage::Storage) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Row lock could not be acquired within the configured timeout
    #[error("timed out waiting for lock on account {0}")]
    LockTimeout(AccountId),

    /// Concurrent writer invalidated the unit of work
    #[error("write conflict: {0}")]
    Conflict(String),

    /// Account row was not named when the unit of work was opened
    #[error("account {0} is outside the unit of work")]
    OutOfScope(AccountId),

    /// Write rejected by a storage-level constraint
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Account identifier already registered
    #[error("account {0} already exists")]
    DuplicateAccount(AccountId),

    /// Transaction record identifier already appended
    #[error("duplicate transaction record {0}")]
    DuplicateRecord(TransactionId),

    /// Backend unreachable or failed to commit
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Returns `true` for contention failures that may succeed if the whole
    /// unit of work is replayed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LockTimeout(_) | Self::Conflict(_))
    }
}

/// Coarse classification of a [`LedgerError`], for mapping onto transport
/// status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    InsufficientFunds,
    Storage,
}

/// Ledger operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Account identifier is unknown
    #[error("account {0} not found")]
    NotFound(AccountId),

    /// Amount is not positive, has too many decimal places, or an
    /// identifier is malformed
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Debit would drive the balance negative
    #[error("insufficient funds in account {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        available: Decimal,
        requested: Decimal,
    },

    /// Underlying store failed; the unit of work was rolled back
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Only transient storage failures are retried. Validation outcomes are
    /// terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            _ => false,
        }
    }
}
