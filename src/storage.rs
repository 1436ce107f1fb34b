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

//! Storage contracts consumed by the [`Engine`](crate::Engine).
//!
//! The engine never talks to accounts or the log directly. It opens a
//! [`UnitOfWork`] naming every account row it will touch, reads and writes
//! through it, and commits. Nothing written through a unit is visible to
//! other callers until [`UnitOfWork::commit`] returns `Ok`; dropping the
//! unit without committing discards every staged write.

use crate::account::Account;
use crate::base::AccountId;
use crate::error::StorageError;
use crate::transaction::TransactionRecord;

/// Point lookup and balance write for account rows.
pub trait AccountStore {
    fn find_by_id(&mut self, id: &AccountId) -> Result<Option<Account>, StorageError>;

    fn save(&mut self, account: &Account) -> Result<(), StorageError>;
}

/// Append side of the transaction log.
pub trait TransactionLog {
    fn append(&mut self, record: TransactionRecord) -> Result<(), StorageError>;
}

/// Atomic scope spanning account writes and log appends.
///
/// Implementations hold exclusion over every row named in
/// [`Storage::begin`] until the unit is committed, rolled back, or dropped.
pub trait UnitOfWork: AccountStore + TransactionLog {
    /// Publishes every staged write at once.
    fn commit(self) -> Result<(), StorageError>;

    /// Discards every staged write. Equivalent to dropping the unit.
    fn rollback(self);
}

pub trait Storage: Send + Sync {
    type Unit: UnitOfWork;

    /// Opens a unit of work holding exclusion over `accounts`.
    ///
    /// Implementations must acquire rows in ascending [`AccountId`] order
    /// regardless of the order given, and ignore duplicates. Unknown
    /// accounts are not an error here; they surface as `None` from
    /// [`AccountStore::find_by_id`].
    fn begin(&self, accounts: &[AccountId]) -> Result<Self::Unit, StorageError>;

    /// Isolated read of the committed row.
    fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, StorageError>;

    /// Committed records for `id`, most recent first, or `None` if the
    /// account does not exist.
    ///
    /// The existence check and the listing must observe the same committed
    /// state, so a record is never listed for an account reported missing.
    fn list_by_account(
        &self,
        id: &AccountId,
    ) -> Result<Option<Vec<TransactionRecord>>, StorageError>;
}
