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

//! Property-based tests for the ledger engine.
//!
//! These tests verify invariants that should hold for any sequence of
//! deposits, withdrawals and transfers, checked against a plain model of
//! the balances.

use proptest::prelude::*;
use rust_decimal::Decimal;
use wallet_ledger::{AccountId, Direction, Engine, ErrorKind, TransactionRecord};

const NUM_ACCOUNTS: usize = 4;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Generate a positive amount (0.0001 to 1000 with 4 decimal places).
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000_000i64).prop_map(|units| Decimal::new(units, 4))
}

/// Generate a starting balance (0 to 500 with 2 decimal places).
fn arb_balance() -> impl Strategy<Value = Decimal> {
    (0i64..=50_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Generate a balance with up to 28 digits and up to 4 decimal places.
fn arb_large_balance() -> impl Strategy<Value = Decimal> {
    (0i128..=10i128.pow(28), 0u32..=4)
        .prop_map(|(mantissa, scale)| Decimal::from_i128_with_scale(mantissa, scale))
}

/// Mixes everyday amounts with ones large enough to need most of
/// `Decimal`'s 28 digits.
fn arb_wide_amount() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        arb_amount(),
        (1i128..=10i128.pow(28)).prop_map(|units| Decimal::from_i128_with_scale(units, 4)),
    ]
}

#[derive(Debug, Clone)]
enum Op {
    Deposit(usize, Decimal),
    Withdraw(usize, Decimal),
    Transfer(usize, usize, Decimal),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..NUM_ACCOUNTS, arb_amount()).prop_map(|(a, amount)| Op::Deposit(a, amount)),
        (0..NUM_ACCOUNTS, arb_amount()).prop_map(|(a, amount)| Op::Withdraw(a, amount)),
        (0..NUM_ACCOUNTS, 0..NUM_ACCOUNTS, arb_amount())
            .prop_map(|(from, to, amount)| Op::Transfer(from, to, amount)),
    ]
}

fn arb_wide_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..2usize, arb_wide_amount()).prop_map(|(a, amount)| Op::Deposit(a, amount)),
        (0..2usize, arb_wide_amount()).prop_map(|(a, amount)| Op::Withdraw(a, amount)),
        (0..2usize, arb_wide_amount())
            .prop_map(|(from, amount)| Op::Transfer(from, 1 - from, amount)),
    ]
}

fn arb_transfer() -> impl Strategy<Value = Op> {
    (0..NUM_ACCOUNTS, 0..NUM_ACCOUNTS, arb_amount())
        .prop_map(|(from, to, amount)| Op::Transfer(from, to, amount))
}

// =============================================================================
// Model
// =============================================================================

/// The record moved exactly `amount`, with no rounding absorbed.
fn assert_exact(record: &TransactionRecord) {
    assert_eq!(
        record.balance_after - record.balance_before,
        record.delta(),
        "record {} did not move exactly {}",
        record.id,
        record.amount
    );
}

struct Harness {
    engine: Engine,
    ids: Vec<AccountId>,
    model: Vec<Decimal>,
    committed: Vec<TransactionRecord>,
}

impl Harness {
    fn new(balances: &[Decimal]) -> Self {
        let engine = Engine::new();
        let ids = balances
            .iter()
            .map(|b| engine.storage().open_account(*b).unwrap().id)
            .collect();
        Self {
            engine,
            ids,
            model: balances.to_vec(),
            committed: Vec::new(),
        }
    }

    /// Applies one operation to both the engine and the model.
    fn apply(&mut self, op: &Op) {
        match *op {
            Op::Deposit(a, amount) => {
                let record = self.engine.deposit(self.ids[a], amount, "").unwrap();
                assert_exact(&record);
                self.model[a] += amount;
                self.committed.push(record);
            }
            Op::Withdraw(a, amount) => match self.engine.withdraw(self.ids[a], amount, "") {
                Ok(record) => {
                    assert_exact(&record);
                    assert!(self.model[a] >= amount);
                    self.model[a] -= amount;
                    self.committed.push(record);
                }
                Err(err) => {
                    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
                    assert!(self.model[a] < amount);
                }
            },
            Op::Transfer(from, to, amount) => {
                match self.engine.transfer(self.ids[from], self.ids[to], amount, "") {
                    Ok((debit, credit)) => {
                        assert_ne!(from, to);
                        assert_exact(&debit);
                        assert_exact(&credit);
                        assert!(self.model[from] >= amount);
                        self.model[from] -= amount;
                        self.model[to] += amount;
                        self.committed.push(debit);
                        self.committed.push(credit);
                    }
                    Err(err) if from == to => {
                        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
                    }
                    Err(err) => {
                        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
                        assert!(self.model[from] < amount);
                    }
                }
            }
        }
    }

    fn total(&self) -> Decimal {
        self.ids.iter().map(|id| self.engine.balance(*id).unwrap()).sum()
    }
}

// =============================================================================
// Balance Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Engine balances track the model exactly and never go negative.
    #[test]
    fn balances_match_model(
        balances in prop::collection::vec(arb_balance(), NUM_ACCOUNTS),
        ops in prop::collection::vec(arb_op(), 0..40),
    ) {
        let mut harness = Harness::new(&balances);
        for op in &ops {
            harness.apply(op);
        }

        for (id, expected) in harness.ids.iter().zip(&harness.model) {
            let balance = harness.engine.balance(*id).unwrap();
            prop_assert_eq!(balance, *expected);
            prop_assert!(balance >= Decimal::ZERO);
        }
    }

    /// Transfers alone never change the sum of balances.
    #[test]
    fn transfers_conserve_total(
        balances in prop::collection::vec(arb_balance(), NUM_ACCOUNTS),
        ops in prop::collection::vec(arb_transfer(), 0..40),
    ) {
        let mut harness = Harness::new(&balances);
        let before = harness.total();
        for op in &ops {
            harness.apply(op);
        }
        prop_assert_eq!(harness.total(), before);
        prop_assert_eq!(harness.engine.storage().total_balance().unwrap(), before);
    }

    /// Deposits minus withdrawals account for every change in the total.
    #[test]
    fn total_moves_by_net_flow(
        balances in prop::collection::vec(arb_balance(), NUM_ACCOUNTS),
        ops in prop::collection::vec(arb_op(), 0..40),
    ) {
        let mut harness = Harness::new(&balances);
        let before = harness.total();
        for op in &ops {
            harness.apply(op);
        }
        let net: Decimal = harness.committed.iter().map(|r| r.delta()).sum();
        prop_assert_eq!(harness.total(), before + net);
    }
}

// =============================================================================
// Record Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Every record is internally consistent and chains onto the previous one.
    #[test]
    fn history_chains_per_account(
        balances in prop::collection::vec(arb_balance(), NUM_ACCOUNTS),
        ops in prop::collection::vec(arb_op(), 0..40),
    ) {
        let mut harness = Harness::new(&balances);
        for op in &ops {
            harness.apply(op);
        }

        for (i, id) in harness.ids.iter().enumerate() {
            let mut history = harness.engine.list_transactions(*id).unwrap();
            history.reverse();

            let mut balance = balances[i];
            for record in &history {
                prop_assert!(record.is_consistent());
                prop_assert!(record.amount > Decimal::ZERO);
                prop_assert_eq!(record.balance_after - record.balance_before, record.delta());
                prop_assert_eq!(record.account_id, *id);
                prop_assert_eq!(record.balance_before, balance);
                balance = record.balance_after;
            }
            prop_assert_eq!(balance, harness.model[i]);
        }
    }

    /// Listing is the exact set of committed records, and repeatable.
    #[test]
    fn listing_is_complete_and_idempotent(
        balances in prop::collection::vec(arb_balance(), NUM_ACCOUNTS),
        ops in prop::collection::vec(arb_op(), 0..30),
    ) {
        let mut harness = Harness::new(&balances);
        for op in &ops {
            harness.apply(op);
        }

        let mut listed = 0;
        for id in &harness.ids {
            let first = harness.engine.list_transactions(*id).unwrap();
            let second = harness.engine.list_transactions(*id).unwrap();
            prop_assert_eq!(&first, &second);

            let expected: Vec<_> = harness
                .committed
                .iter()
                .rev()
                .filter(|r| r.account_id == *id)
                .cloned()
                .collect();
            prop_assert_eq!(&first, &expected);
            listed += first.len();
        }
        prop_assert_eq!(listed, harness.committed.len());
        prop_assert_eq!(harness.engine.storage().record_count(), listed);
    }

    /// A transfer's two legs carry the same amount in opposite directions.
    #[test]
    fn transfer_legs_mirror(
        from_balance in arb_balance(),
        to_balance in arb_balance(),
        amount in arb_amount(),
    ) {
        let mut harness = Harness::new(&[from_balance, to_balance]);
        let (a, b) = (harness.ids[0], harness.ids[1]);

        match harness.engine.transfer(a, b, amount, "") {
            Ok((debit, credit)) => {
                prop_assert!(amount <= from_balance);
                prop_assert_eq!(debit.direction, Direction::Debit);
                prop_assert_eq!(credit.direction, Direction::Credit);
                prop_assert_eq!(debit.amount, credit.amount);
                prop_assert_eq!(debit.delta() + credit.delta(), Decimal::ZERO);
                harness.committed.push(debit);
                harness.committed.push(credit);
            }
            Err(err) => {
                prop_assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
                prop_assert!(amount > from_balance);
                prop_assert_eq!(harness.engine.storage().record_count(), 0);
            }
        }
    }
}

// =============================================================================
// Precision Limit Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Near `Decimal`'s digit limit an operation either moves the exact
    /// amount or is rejected with both balances untouched.
    #[test]
    fn large_magnitudes_never_lose_value(
        balances in prop::collection::vec(arb_large_balance(), 2),
        ops in prop::collection::vec(arb_wide_op(), 1..20),
    ) {
        let harness = Harness::new(&balances);
        let engine = &harness.engine;
        let ids = &harness.ids;

        for op in &ops {
            let before: Vec<Decimal> = ids.iter().map(|id| engine.balance(*id).unwrap()).collect();
            let result = match *op {
                Op::Deposit(a, amount) => engine.deposit(ids[a], amount, "").map(|r| vec![r]),
                Op::Withdraw(a, amount) => engine.withdraw(ids[a], amount, "").map(|r| vec![r]),
                Op::Transfer(from, to, amount) => engine
                    .transfer(ids[from], ids[to], amount, "")
                    .map(|(debit, credit)| vec![debit, credit]),
            };

            match result {
                Ok(records) => {
                    for record in &records {
                        prop_assert_eq!(
                            record.balance_after - record.balance_before,
                            record.delta()
                        );
                        prop_assert!(record.is_consistent());
                        prop_assert_eq!(engine.balance(record.account_id).unwrap(), record.balance_after);
                    }
                    if let Op::Transfer(from, to, _) = *op {
                        let after_from = engine.balance(ids[from]).unwrap();
                        let after_to = engine.balance(ids[to]).unwrap();
                        prop_assert_eq!(before[from] - after_from, after_to - before[to]);
                    }
                }
                Err(err) => {
                    prop_assert!(matches!(
                        err.kind(),
                        ErrorKind::InvalidArgument | ErrorKind::InsufficientFunds
                    ));
                    let after: Vec<Decimal> =
                        ids.iter().map(|id| engine.balance(*id).unwrap()).collect();
                    prop_assert_eq!(after, before);
                }
            }
        }
    }
}

// =============================================================================
// Validation Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Amounts finer than four decimal places are rejected untouched.
    #[test]
    fn excess_precision_rejected(
        units in 1i64..=1_000_000i64,
        scale in 5u32..=10,
        balance in arb_balance(),
    ) {
        // A trailing non-zero digit keeps the normalized scale at `scale`.
        let amount = Decimal::new(units * 10 + 1, scale);
        let harness = Harness::new(&[balance]);
        let id = harness.ids[0];

        let result = harness.engine.deposit(id, amount, "");
        prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidArgument);
        prop_assert_eq!(harness.engine.balance(id).unwrap(), balance);
        prop_assert!(harness.engine.list_transactions(id).unwrap().is_empty());
    }

    /// Non-positive amounts are rejected for every operation.
    #[test]
    fn non_positive_amount_rejected(units in -1_000_000i64..=0) {
        let amount = Decimal::new(units, 2);
        let harness = Harness::new(&[Decimal::ONE_HUNDRED, Decimal::ONE_HUNDRED]);
        let (a, b) = (harness.ids[0], harness.ids[1]);

        prop_assert_eq!(
            harness.engine.deposit(a, amount, "").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        prop_assert_eq!(
            harness.engine.withdraw(a, amount, "").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        prop_assert_eq!(
            harness.engine.transfer(a, b, amount, "").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        prop_assert_eq!(harness.engine.storage().record_count(), 0);
    }
}
