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

//! Transaction records.
//!
//! Every committed balance mutation produces exactly one immutable
//! [`TransactionRecord`]. A transfer produces two: a [`Direction::Debit`] on
//! the sender and a [`Direction::Credit`] on the receiver.

use crate::base::{AccountId, TransactionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Increases the owning account's balance.
    Credit,
    /// Decreases the owning account's balance.
    Debit,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credit => f.write_str("CREDIT"),
            Self::Debit => f.write_str("DEBIT"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub direction: Direction,
    pub amount: Decimal,
    pub remark: String,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Builds a record for a mutation of `amount` applied on top of
    /// `balance_before`. The resulting balance is derived, never supplied.
    pub fn new(
        account_id: AccountId,
        direction: Direction,
        amount: Decimal,
        remark: impl Into<String>,
        balance_before: Decimal,
    ) -> Self {
        let balance_after = match direction {
            Direction::Credit => balance_before + amount,
            Direction::Debit => balance_before - amount,
        };
        Self {
            id: TransactionId::new(),
            account_id,
            direction,
            amount,
            remark: remark.into(),
            balance_before,
            balance_after,
            created_at: Utc::now(),
        }
    }

    /// Checks `balance_after = balance_before ± amount` and `amount > 0`.
    ///
    /// The comparison is on the difference, so a balance that absorbed the
    /// amount through rounding is reported as inconsistent.
    pub fn is_consistent(&self) -> bool {
        self.amount > Decimal::ZERO
            && self.balance_after >= Decimal::ZERO
            && self
                .balance_after
                .checked_sub(self.balance_before)
                .is_some_and(|moved| moved == self.delta())
    }

    /// Signed effect on the owning account's balance.
    pub fn delta(&self) -> Decimal {
        match self.direction {
            Direction::Credit => self.amount,
            Direction::Debit => -self.amount,
        }
    }
}
