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

//! Account rows.
//!
//! An [`Account`] is a plain value: the storage layer owns the row and hands
//! out copies inside a unit of work. Balance arithmetic lives here so every
//! mutation path shares the same checks.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use wallet_ledger::{Account, AccountId};
//!
//! let mut account = Account::new(AccountId::new(), dec!(100));
//! account.debit(dec!(30)).unwrap();
//! assert_eq!(account.balance, dec!(70));
//! ```

use crate::base::AccountId;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Wallet account row: identity plus the denormalized current balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub const DECIMAL_PRECISION: u32 = 4;

    pub fn new(id: AccountId, balance: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id,
            balance,
            created_at: now,
            updated_at: now,
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance went negative: {}",
            self.balance
        );
    }

    /// Increases the balance.
    pub fn credit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidArgument(
                "amount must be positive".to_string(),
            ));
        }
        // Decimal rounds silently once the result needs more than 28 digits;
        // the difference must give back the exact amount.
        let balance = self
            .balance
            .checked_add(amount)
            .filter(|balance| *balance - self.balance == amount)
            .ok_or_else(|| {
                LedgerError::InvalidArgument(format!(
                    "credit of {amount} exceeds the precision of balance {}",
                    self.balance
                ))
            })?;
        self.balance = balance;
        self.updated_at = Utc::now();
        self.assert_invariants();
        Ok(())
    }

    /// Decreases the balance, refusing to go below zero.
    pub fn debit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidArgument(
                "amount must be positive".to_string(),
            ));
        }
        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                account: self.id,
                available: self.balance,
                requested: amount,
            });
        }
        let balance = self
            .balance
            .checked_sub(amount)
            .filter(|balance| self.balance - *balance == amount)
            .ok_or_else(|| {
                LedgerError::InvalidArgument(format!(
                    "debit of {amount} exceeds the precision of balance {}",
                    self.balance
                ))
            })?;
        self.balance = balance;
        self.updated_at = Utc::now();
        self.assert_invariants();
        Ok(())
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Account", 2)?;
        state.serialize_field("account", &self.id)?;
        state.serialize_field("balance", &self.balance.round_dp(Self::DECIMAL_PRECISION))?;
        state.end()
    }
}
