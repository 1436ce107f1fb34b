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

//! In-process [`Storage`] implementation.
//!
//! Each account row sits behind its own [`parking_lot::Mutex`]. A
//! [`MemoryUnit`] holds the row guards for every account it was opened on,
//! so two units touching the same account serialize while units on
//! disjoint accounts run in parallel.
//!
//! Writes are staged inside the unit and published on commit while every
//! guard is still held:
//!
//! ```text
//!  begin([b, a]) ──► lock a ──► lock b ──► find/save/append (staged)
//!                                               │
//!            ┌────────── commit ◄───────────────┘
//!            ▼
//!   journal.push_all ──► write rows ──► release a, b
//! ```

use crate::account::Account;
use crate::base::AccountId;
use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::journal::Journal;
use crate::storage::{AccountStore, Storage, TransactionLog, UnitOfWork};
use crate::transaction::TransactionRecord;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

type Row = Arc<Mutex<Account>>;
type RowGuard = ArcMutexGuard<RawMutex, Account>;

#[derive(Debug)]
struct Inner {
    rows: DashMap<AccountId, Row>,
    journal: Journal,
    lock_timeout: Duration,
}

/// Shared handle to an in-memory account table and transaction journal.
///
/// Cloning is cheap; clones observe the same data.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    inner: Arc<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_config(&StorageConfig::default())
    }

    pub fn with_config(config: &StorageConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                rows: DashMap::new(),
                journal: Journal::new(),
                lock_timeout: config.lock_timeout,
            }),
        }
    }

    /// Registers a new account with a fresh identifier.
    pub fn open_account(&self, balance: Decimal) -> Result<Account, StorageError> {
        let account = Account::new(AccountId::new(), balance);
        self.insert_account(account.clone())?;
        Ok(account)
    }

    /// Registers an existing account row.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Constraint`] if the balance is negative.
    /// - [`StorageError::DuplicateAccount`] if the identifier is taken.
    pub fn insert_account(&self, account: Account) -> Result<(), StorageError> {
        if account.balance < Decimal::ZERO {
            return Err(StorageError::Constraint(format!(
                "account {} balance must not be negative",
                account.id
            )));
        }
        match self.inner.rows.entry(account.id) {
            Entry::Occupied(_) => Err(StorageError::DuplicateAccount(account.id)),
            Entry::Vacant(entry) => {
                debug!(account = %account.id, balance = %account.balance, "account registered");
                entry.insert(Arc::new(Mutex::new(account)));
                Ok(())
            }
        }
    }

    /// Committed snapshot of one account, or `None` if unknown.
    pub fn account(&self, id: &AccountId) -> Option<Account> {
        self.row(id).map(|row| Account::clone(&row.lock()))
    }

    /// Committed snapshots of every account, ordered by identifier.
    pub fn accounts(&self) -> Vec<Account> {
        let mut ids: Vec<AccountId> = self.inner.rows.iter().map(|r| *r.key()).collect();
        ids.sort();
        ids.iter().filter_map(|id| self.account(id)).collect()
    }

    /// Sum of every committed balance, read under all row locks at once.
    pub fn total_balance(&self) -> Result<Decimal, StorageError> {
        let ids: Vec<AccountId> = self.inner.rows.iter().map(|r| *r.key()).collect();
        let unit = self.begin(&ids)?;
        Ok(unit.rows.iter().map(|(_, guard)| guard.balance).sum())
    }

    /// Number of committed transaction records across all accounts.
    pub fn record_count(&self) -> usize {
        self.inner.journal.len()
    }

    fn row(&self, id: &AccountId) -> Option<Row> {
        self.inner.rows.get(id).map(|row| Arc::clone(row.value()))
    }

    fn lock_row(&self, id: AccountId, row: &Row) -> Result<RowGuard, StorageError> {
        row.try_lock_arc_for(self.inner.lock_timeout)
            .ok_or(StorageError::LockTimeout(id))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    type Unit = MemoryUnit;

    fn begin(&self, accounts: &[AccountId]) -> Result<MemoryUnit, StorageError> {
        let mut scope = accounts.to_vec();
        scope.sort();
        scope.dedup();

        // Ascending order on every path is what rules out circular waits.
        let mut rows = Vec::with_capacity(scope.len());
        for id in &scope {
            if let Some(row) = self.row(id) {
                rows.push((*id, self.lock_row(*id, &row)?));
            }
        }
        trace!(rows = rows.len(), "unit of work opened");

        Ok(MemoryUnit {
            storage: self.clone(),
            scope,
            rows,
            staged: Vec::new(),
            records: Vec::new(),
        })
    }

    fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, StorageError> {
        match self.row(id) {
            Some(row) => {
                let guard = self.lock_row(*id, &row)?;
                Ok(Some(Account::clone(&guard)))
            }
            None => Ok(None),
        }
    }

    fn list_by_account(
        &self,
        id: &AccountId,
    ) -> Result<Option<Vec<TransactionRecord>>, StorageError> {
        let Some(row) = self.row(id) else {
            return Ok(None);
        };
        // Records are only appended under the row lock, so holding it here
        // keeps the listing consistent with the committed balance.
        let _guard = self.lock_row(*id, &row)?;
        Ok(Some(self.inner.journal.list(id)))
    }
}

/// Unit of work over [`MemoryStorage`].
///
/// Holds row guards in ascending account order. Dropping the unit without
/// calling [`UnitOfWork::commit`] releases the rows and discards every
/// staged write.
pub struct MemoryUnit {
    storage: MemoryStorage,
    scope: Vec<AccountId>,
    rows: Vec<(AccountId, RowGuard)>,
    staged: Vec<Account>,
    records: Vec<TransactionRecord>,
}

impl MemoryUnit {
    fn position(&self, id: &AccountId) -> Option<usize> {
        self.rows.binary_search_by(|(row_id, _)| row_id.cmp(id)).ok()
    }

    fn check_scope(&self, id: &AccountId) -> Result<(), StorageError> {
        if self.scope.binary_search(id).is_ok() {
            Ok(())
        } else {
            Err(StorageError::OutOfScope(*id))
        }
    }
}

impl AccountStore for MemoryUnit {
    fn find_by_id(&mut self, id: &AccountId) -> Result<Option<Account>, StorageError> {
        self.check_scope(id)?;
        if let Some(account) = self.staged.iter().find(|a| a.id == *id) {
            return Ok(Some(account.clone()));
        }
        Ok(self.position(id).map(|i| (*self.rows[i].1).clone()))
    }

    fn save(&mut self, account: &Account) -> Result<(), StorageError> {
        self.check_scope(&account.id)?;
        if self.position(&account.id).is_none() {
            return Err(StorageError::Constraint(format!(
                "account {} does not exist",
                account.id
            )));
        }
        if account.balance < Decimal::ZERO {
            return Err(StorageError::Constraint(format!(
                "account {} balance must not be negative",
                account.id
            )));
        }

        match self.staged.iter_mut().find(|a| a.id == account.id) {
            Some(staged) => *staged = account.clone(),
            None => self.staged.push(account.clone()),
        }
        Ok(())
    }
}

impl TransactionLog for MemoryUnit {
    fn append(&mut self, record: TransactionRecord) -> Result<(), StorageError> {
        self.check_scope(&record.account_id)?;
        if self.position(&record.account_id).is_none() {
            return Err(StorageError::Constraint(format!(
                "account {} does not exist",
                record.account_id
            )));
        }
        if self.storage.inner.journal.contains(&record.id)
            || self.records.iter().any(|r| r.id == record.id)
        {
            return Err(StorageError::DuplicateRecord(record.id));
        }
        self.records.push(record);
        Ok(())
    }
}

impl UnitOfWork for MemoryUnit {
    fn commit(self) -> Result<(), StorageError> {
        let MemoryUnit {
            storage,
            mut rows,
            staged,
            records,
            ..
        } = self;

        let appended = records.len();
        // Journal first: it is the only step that can fail.
        storage.inner.journal.push_all(records)?;

        for account in staged {
            if let Ok(i) = rows.binary_search_by(|(id, _)| id.cmp(&account.id)) {
                *rows[i].1 = account;
            }
        }
        trace!(rows = rows.len(), records = appended, "unit of work committed");
        Ok(())
    }

    fn rollback(self) {
        trace!(
            rows = self.rows.len(),
            discarded = self.records.len(),
            "unit of work rolled back"
        );
    }
}
