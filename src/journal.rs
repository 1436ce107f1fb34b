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

//! Append-only transaction journal backing [`MemoryStorage`](crate::MemoryStorage).

use crate::base::{AccountId, TransactionId};
use crate::error::StorageError;
use crate::transaction::TransactionRecord;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct Journal {
    /// Map of record IDs to records for O(1) duplicate detection.
    records: DashMap<TransactionId, Arc<TransactionRecord>>,

    /// Per-account records in append order.
    by_account: DashMap<AccountId, Vec<Arc<TransactionRecord>>>,
}

impl Journal {
    pub(crate) fn new() -> Self {
        Self {
            records: DashMap::new(),
            by_account: DashMap::new(),
        }
    }

    pub(crate) fn contains(&self, id: &TransactionId) -> bool {
        self.records.contains_key(id)
    }

    /// Appends a batch of records, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DuplicateRecord`] if any record ID is already
    /// present, in which case none of the batch is kept.
    pub(crate) fn push_all(&self, batch: Vec<TransactionRecord>) -> Result<(), StorageError> {
        let mut inserted: Vec<Arc<TransactionRecord>> = Vec::with_capacity(batch.len());

        for record in batch {
            let record = Arc::new(record);
            // Atomic check-and-insert. The shard guard must be released before undoing.
            let vacant = match self.records.entry(record.id) {
                Entry::Occupied(_) => false,
                Entry::Vacant(entry) => {
                    entry.insert(Arc::clone(&record));
                    true
                }
            };
            if !vacant {
                for undo in &inserted {
                    self.records.remove(&undo.id);
                }
                return Err(StorageError::DuplicateRecord(record.id));
            }
            inserted.push(record);
        }

        for record in inserted {
            self.by_account
                .entry(record.account_id)
                .or_default()
                .push(record);
        }
        Ok(())
    }

    /// Records for `account`, most recent first.
    pub(crate) fn list(&self, account: &AccountId) -> Vec<TransactionRecord> {
        self.by_account
            .get(account)
            .map(|records| records.iter().rev().map(|r| (**r).clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}
