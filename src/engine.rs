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

use crate::base::AccountId;
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::memory::MemoryStorage;
use crate::storage::{AccountStore, Storage, TransactionLog, UnitOfWork};
use crate::transaction::{Direction, TransactionRecord};
use rust_decimal::Decimal;
use std::thread;
use tracing::{debug, info, instrument, warn};

/// Ledger engine: the only writer of account balances.
///
/// Every mutation runs inside one storage unit of work, so the balance write
/// and its transaction record commit together or not at all.
pub struct Engine<S: Storage = MemoryStorage> {
    /// Account rows and the transaction log.
    storage: S,
    config: LedgerConfig,
}

impl Engine<MemoryStorage> {
    /// Creates an engine over an empty in-memory store with default settings.
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        let storage = MemoryStorage::with_config(&config.storage);
        Self::with_storage(storage, config)
    }
}

impl Default for Engine<MemoryStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Storage> Engine<S> {
    pub fn with_storage(storage: S, config: LedgerConfig) -> Self {
        Engine { storage, config }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Credits `amount` to an account and records a `CREDIT` entry.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidArgument`] - Amount is not positive or too precise.
    /// - [`LedgerError::NotFound`] - Account does not exist.
    /// - [`LedgerError::Storage`] - Store failed; nothing was written.
    #[instrument(skip_all, fields(account = %account_id, amount = %amount))]
    pub fn deposit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        remark: &str,
    ) -> Result<TransactionRecord, LedgerError> {
        let record = self.post(account_id, Direction::Credit, amount, remark)?;
        info!(record = %record.id, balance = %record.balance_after, "deposit committed");
        Ok(record)
    }

    /// Debits `amount` from an account and records a `DEBIT` entry.
    ///
    /// # Errors
    ///
    /// As [`Engine::deposit`], plus [`LedgerError::InsufficientFunds`] when the
    /// balance is below `amount`.
    #[instrument(skip_all, fields(account = %account_id, amount = %amount))]
    pub fn withdraw(
        &self,
        account_id: AccountId,
        amount: Decimal,
        remark: &str,
    ) -> Result<TransactionRecord, LedgerError> {
        let record = self.post(account_id, Direction::Debit, amount, remark)?;
        info!(record = %record.id, balance = %record.balance_after, "withdrawal committed");
        Ok(record)
    }

    /// Moves `amount` from `from` to `to` as one atomic unit.
    ///
    /// Both rows are locked in ascending [`AccountId`] order, whichever side
    /// is debited, so opposite transfers between the same pair cannot
    /// deadlock. Returns the `(debit, credit)` records.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidArgument`] - Bad amount, or `from == to`.
    /// - [`LedgerError::NotFound`] - Either account does not exist.
    /// - [`LedgerError::InsufficientFunds`] - Sender balance below `amount`.
    /// - [`LedgerError::Storage`] - Store failed; neither leg was written.
    #[instrument(skip_all, fields(from = %from, to = %to, amount = %amount))]
    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        remark: &str,
    ) -> Result<(TransactionRecord, TransactionRecord), LedgerError> {
        self.validate_amount(amount)?;
        if from == to {
            return Err(LedgerError::InvalidArgument(format!(
                "cannot transfer from account {from} to itself"
            )));
        }

        let (debit, credit) = self.atomically(&[from, to], |unit| {
            let mut sender = unit.find_by_id(&from)?.ok_or(LedgerError::NotFound(from))?;
            let mut receiver = unit.find_by_id(&to)?.ok_or(LedgerError::NotFound(to))?;

            let sender_before = sender.balance;
            let receiver_before = receiver.balance;
            sender.debit(amount)?;
            receiver.credit(amount)?;

            let debit = TransactionRecord::new(from, Direction::Debit, amount, remark, sender_before);
            let credit =
                TransactionRecord::new(to, Direction::Credit, amount, remark, receiver_before);

            unit.save(&sender)?;
            unit.save(&receiver)?;
            unit.append(debit.clone())?;
            unit.append(credit.clone())?;
            Ok((debit, credit))
        })?;

        info!(
            debit = %debit.id,
            credit = %credit.id,
            sender_balance = %debit.balance_after,
            receiver_balance = %credit.balance_after,
            "transfer committed"
        );
        Ok((debit, credit))
    }

    /// Returns every record for the account, most recent first.
    ///
    /// An account with no history yields an empty vector.
    #[instrument(skip_all, fields(account = %account_id))]
    pub fn list_transactions(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let records = self
            .storage
            .list_by_account(&account_id)?
            .ok_or(LedgerError::NotFound(account_id))?;
        debug!(count = records.len(), "listed transactions");
        Ok(records)
    }

    /// Committed balance of an account.
    pub fn balance(&self, account_id: AccountId) -> Result<Decimal, LedgerError> {
        self.storage
            .find_by_id(&account_id)?
            .map(|account| account.balance)
            .ok_or(LedgerError::NotFound(account_id))
    }

    fn validate_amount(&self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidArgument(format!(
                "amount must be positive, got {amount}"
            )));
        }
        if amount.normalize().scale() > self.config.max_decimal_places {
            return Err(LedgerError::InvalidArgument(format!(
                "amount {amount} exceeds {} decimal places",
                self.config.max_decimal_places
            )));
        }
        Ok(())
    }

    /// Single-account read-validate-write-record sequence.
    fn post(
        &self,
        account_id: AccountId,
        direction: Direction,
        amount: Decimal,
        remark: &str,
    ) -> Result<TransactionRecord, LedgerError> {
        self.validate_amount(amount)?;

        self.atomically(&[account_id], |unit| {
            let mut account = unit
                .find_by_id(&account_id)?
                .ok_or(LedgerError::NotFound(account_id))?;

            let balance_before = account.balance;
            match direction {
                Direction::Credit => account.credit(amount)?,
                Direction::Debit => account.debit(amount)?,
            }
            let record = TransactionRecord::new(account_id, direction, amount, remark, balance_before);

            unit.save(&account)?;
            unit.append(record.clone())?;
            Ok(record)
        })
    }

    /// Runs `apply` inside a unit of work scoped to `accounts` and commits it.
    ///
    /// On a transient storage failure the whole unit is replayed from
    /// `begin`, never just the write half. Any error from `apply` rolls the
    /// unit back before it is returned or retried.
    fn atomically<T, F>(&self, accounts: &[AccountId], mut apply: F) -> Result<T, LedgerError>
    where
        F: FnMut(&mut S::Unit) -> Result<T, LedgerError>,
    {
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = self
                .storage
                .begin(accounts)
                .map_err(LedgerError::from)
                .and_then(|mut unit| match apply(&mut unit) {
                    Ok(value) => {
                        unit.commit()?;
                        Ok(value)
                    }
                    Err(err) => {
                        unit.rollback();
                        debug!(error = %err, "unit of work rolled back");
                        Err(err)
                    }
                });

            match result {
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!(attempt, max_attempts, error = %err, "transient storage failure, replaying");
                    thread::sleep(self.config.retry.backoff * attempt);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
