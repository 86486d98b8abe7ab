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

//! Engine public API integration tests.

use building_ledger::{
    AccountDetails, AccountId, BuildingId, Engine, EntryKind, ExpensePosting, LedgerCommand,
    LedgerError, PaymentMethodId, UserId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// === Helper Functions ===

/// Building 1 with a funded main account and an empty custom account.
fn setup(main_balance: Decimal) -> (Engine, AccountId, AccountId) {
    let engine = Engine::new();
    let main = engine.ensure_main_account(BuildingId(1)).id();
    if main_balance > Decimal::ZERO {
        engine.deposit(main, main_balance, None, None).unwrap();
    }
    let custom = engine
        .create_custom_account(BuildingId(1), AccountDetails::new("repairs"), None, None)
        .unwrap()
        .id();
    (engine, main, custom)
}

fn balance(engine: &Engine, id: AccountId) -> Decimal {
    engine.get_account(id).unwrap().balance()
}

fn deposit(to: AccountId, amount: Decimal) -> LedgerCommand {
    LedgerCommand::Deposit {
        to,
        amount,
        description: None,
    }
}

fn transfer(from: AccountId, to: AccountId, amount: Decimal) -> LedgerCommand {
    LedgerCommand::Transfer {
        from,
        to,
        amount,
        description: None,
    }
}

// === Deposits ===

#[test]
fn deposit_credits_account() {
    let (engine, main, _) = setup(Decimal::ZERO);
    let entry = engine
        .deposit(main, dec!(50.00), Some("opening".into()), Some(UserId(7)))
        .unwrap();

    assert_eq!(balance(&engine, main), dec!(50.00));
    assert_eq!(entry.kind, EntryKind::Deposit);
    assert_eq!(entry.source, None);
    assert_eq!(entry.destination, Some(main));
    assert_eq!(entry.description.as_deref(), Some("opening"));
    assert_eq!(entry.created_by, Some(UserId(7)));
}

#[test]
fn deposit_to_missing_account_fails() {
    let engine = Engine::new();
    let result = engine.deposit(AccountId(99), dec!(1), None, None);
    assert_eq!(result.unwrap_err(), LedgerError::AccountNotFound(AccountId(99)));
    assert!(engine.entries().is_empty());
}

#[test]
fn deposit_zero_fails() {
    let (engine, main, _) = setup(Decimal::ZERO);
    assert_eq!(
        engine.deposit(main, Decimal::ZERO, None, None).unwrap_err(),
        LedgerError::InvalidAmount
    );
    assert_eq!(
        engine.deposit(main, dec!(-1), None, None).unwrap_err(),
        LedgerError::InvalidAmount
    );
}

// === Transfers ===

#[test]
fn transfer_scenario() {
    let (engine, a, b) = setup(dec!(500.00));

    let entry = engine.transfer(a, b, dec!(200.00), None, None).unwrap();

    assert_eq!(balance(&engine, a), dec!(300.00));
    assert_eq!(balance(&engine, b), dec!(200.00));
    assert_eq!(entry.kind, EntryKind::Transfer);
    assert_eq!(entry.source, Some(a));
    assert_eq!(entry.destination, Some(b));
    assert_eq!(entry.amount, dec!(200.00));
    let transfers = engine
        .entries()
        .iter()
        .filter(|entry| entry.kind == EntryKind::Transfer)
        .count();
    assert_eq!(transfers, 1);

    let strict = engine.post_expense(ExpensePosting::new(b, dec!(250.00)), None);
    assert_eq!(strict.unwrap_err(), LedgerError::InsufficientFunds);
    assert_eq!(balance(&engine, b), dec!(200.00));

    engine
        .post_expense(
            ExpensePosting::new(b, dec!(250.00)).allow_negative_balance(true),
            None,
        )
        .unwrap();
    assert_eq!(balance(&engine, b), dec!(-50.00));
}

#[test]
fn transfer_zero_fails() {
    let (engine, a, b) = setup(dec!(10));
    assert_eq!(
        engine.transfer(a, b, Decimal::ZERO, None, None).unwrap_err(),
        LedgerError::InvalidAmount
    );
}

#[test]
fn transfer_to_same_account_fails() {
    let (engine, a, _) = setup(dec!(10));
    assert_eq!(
        engine.transfer(a, a, dec!(1), None, None).unwrap_err(),
        LedgerError::SameAccount
    );
    // Checked before the account is looked up
    assert_eq!(
        engine
            .transfer(AccountId(77), AccountId(77), dec!(1), None, None)
            .unwrap_err(),
        LedgerError::SameAccount
    );
}

#[test]
fn transfer_with_missing_account_fails() {
    let (engine, a, _) = setup(dec!(10));
    assert_eq!(
        engine.transfer(a, AccountId(404), dec!(1), None, None).unwrap_err(),
        LedgerError::AccountNotFound(AccountId(404))
    );
    assert_eq!(balance(&engine, a), dec!(10));
}

#[test]
fn transfer_across_buildings_fails() {
    let (engine, a, _) = setup(dec!(10));
    let other = engine.ensure_main_account(BuildingId(2)).id();

    assert_eq!(
        engine.transfer(a, other, dec!(5), None, None).unwrap_err(),
        LedgerError::CrossBuildingTransfer
    );
    assert_eq!(balance(&engine, a), dec!(10));
    assert_eq!(balance(&engine, other), dec!(0));
}

#[test]
fn transfer_exceeding_balance_leaves_both_untouched() {
    let (engine, a, b) = setup(dec!(100.00));
    let entries_before = engine.entries().len();

    assert_eq!(
        engine.transfer(a, b, dec!(100.01), None, None).unwrap_err(),
        LedgerError::InsufficientFunds
    );
    assert_eq!(balance(&engine, a), dec!(100.00));
    assert_eq!(balance(&engine, b), Decimal::ZERO);
    assert_eq!(engine.entries().len(), entries_before);
}

#[test]
fn transfer_of_entire_balance_succeeds() {
    let (engine, a, b) = setup(dec!(100.00));
    engine.transfer(a, b, dec!(100.00), None, None).unwrap();
    assert_eq!(balance(&engine, a), Decimal::ZERO);
    assert_eq!(balance(&engine, b), dec!(100.00));
}

#[test]
fn transfers_conserve_building_total() {
    let (engine, a, b) = setup(dec!(1000));
    let c = engine
        .create_custom_account(BuildingId(1), AccountDetails::new("garden"), None, None)
        .unwrap()
        .id();

    engine.transfer(a, b, dec!(300), None, None).unwrap();
    engine.transfer(b, c, dec!(120.50), None, None).unwrap();
    engine.transfer(c, a, dec!(20.25), None, None).unwrap();
    let _ = engine.transfer(b, a, dec!(5000), None, None);

    let total: Decimal = [a, b, c].iter().map(|id| balance(&engine, *id)).sum();
    assert_eq!(total, dec!(1000));
}

// === Expenses ===

#[test]
fn expense_records_reference_and_payment_method() {
    let (engine, main, _) = setup(dec!(80));
    let entry = engine
        .post_expense(
            ExpensePosting::new(main, dec!(30))
                .payment_method(PaymentMethodId(3))
                .description("elevator service")
                .reference_id("expense-42"),
            Some(UserId(1)),
        )
        .unwrap();

    assert_eq!(balance(&engine, main), dec!(50));
    assert_eq!(entry.kind, EntryKind::Expense);
    assert_eq!(entry.source, Some(main));
    assert_eq!(entry.destination, None);
    assert_eq!(entry.payment_method, Some(PaymentMethodId(3)));
    assert_eq!(entry.reference_id.as_deref(), Some("expense-42"));
}

#[test]
fn expense_rejects_overdraft_by_default() {
    let (engine, main, _) = setup(dec!(10));
    assert_eq!(
        engine
            .post_expense(ExpensePosting::new(main, dec!(10.01)), None)
            .unwrap_err(),
        LedgerError::InsufficientFunds
    );
    assert_eq!(balance(&engine, main), dec!(10));
}

// === Units of Work ===

#[test]
fn failed_unit_rolls_back_earlier_commands() {
    let (engine, a, b) = setup(dec!(500));
    let entries_before = engine.entries().len();

    let result = engine.atomically(&[a, b], None, |unit| {
        unit.apply(transfer(a, b, dec!(200)))?;
        assert_eq!(unit.balance(a)?, dec!(300));
        // Forced failure after the debit was staged
        unit.apply(transfer(a, b, dec!(10_000)))
    });

    assert_eq!(result.unwrap_err(), LedgerError::InsufficientFunds);
    assert_eq!(balance(&engine, a), dec!(500));
    assert_eq!(balance(&engine, b), Decimal::ZERO);
    assert_eq!(engine.entries().len(), entries_before);
}

#[test]
fn closure_error_discards_staged_commands() {
    let (engine, a, b) = setup(dec!(500));

    let result = engine.atomically(&[a, b], None, |unit| {
        unit.apply(transfer(a, b, dec!(200)))?;
        Err(LedgerError::Busy(a))
    });

    assert!(result.is_err());
    assert_eq!(balance(&engine, a), dec!(500));
    assert_eq!(balance(&engine, b), Decimal::ZERO);
}

#[test]
fn later_commands_see_staged_balances() {
    let (engine, a, b) = setup(Decimal::ZERO);

    let entries = engine
        .atomically(&[a, b], Some(UserId(2)), |unit| {
            unit.apply(deposit(a, dec!(100)))?;
            unit.apply(transfer(a, b, dec!(60)))?;
            unit.apply(transfer(b, a, dec!(10)))
        })
        .unwrap();

    assert_eq!(entries.len(), 3);
    assert!(entries.windows(2).all(|pair| pair[0].id < pair[1].id));
    assert!(entries.iter().all(|entry| entry.created_by == Some(UserId(2))));
    assert_eq!(balance(&engine, a), dec!(50));
    assert_eq!(balance(&engine, b), dec!(50));
}

#[test]
fn unit_reads_staged_balances_under_its_own_locks() {
    let (engine, a, b) = setup(dec!(30));

    engine
        .atomically(&[a, b], None, |unit| {
            assert_eq!(unit.balance(a)?, dec!(30));
            assert_eq!(unit.balance(b)?, Decimal::ZERO);
            unit.apply(transfer(a, b, dec!(12)))?;
            assert_eq!(unit.balance(a)?, dec!(18));
            assert_eq!(unit.balance(b)?, dec!(12));
            assert_eq!(unit.balance(AccountId(99)), Err(LedgerError::AccountNotLocked(AccountId(99))));
            assert_eq!(unit.staged(), 1);
            Ok(())
        })
        .unwrap();

    assert_eq!(balance(&engine, a), dec!(18));
    assert_eq!(balance(&engine, b), dec!(12));
}

#[test]
fn unit_rejects_accounts_it_did_not_lock() {
    let (engine, a, b) = setup(dec!(10));

    let result = engine.atomically(&[a], None, |unit| unit.apply(transfer(a, b, dec!(1))));
    assert_eq!(result.unwrap_err(), LedgerError::AccountNotLocked(b));
    assert_eq!(balance(&engine, a), dec!(10));
}

#[test]
fn empty_unit_fails() {
    let (engine, a, _) = setup(dec!(10));
    let result = engine.atomically(&[a], None, |_| Ok(()));
    assert_eq!(result.unwrap_err(), LedgerError::EmptyUnit);
}

#[test]
fn entries_are_immutable_history() {
    let (engine, a, b) = setup(dec!(100));
    let first = engine.entries();
    engine.transfer(a, b, dec!(1), None, None).unwrap();
    let _ = engine.transfer(a, b, dec!(1000), None, None);
    let second = engine.entries();

    assert_eq!(second.len(), first.len() + 1);
    assert_eq!(&second[..first.len()], &first[..]);
    assert_eq!(*engine.get_entry(first[0].id).unwrap(), *first[0]);
}
