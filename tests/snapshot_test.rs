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

//! Snapshot export and restore tests.

use building_ledger::{
    AccountDetails, BuildingId, Engine, EngineConfig, EntryKind, LedgerCommand, LedgerError,
    Snapshot,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn populated() -> Engine {
    let engine = Engine::new();
    let main = engine.ensure_main_account(BuildingId(1)).id();
    engine.deposit(main, dec!(500), None, None).unwrap();
    let custom = engine
        .create_custom_account(BuildingId(1), AccountDetails::new("repairs"), None, None)
        .unwrap()
        .id();
    engine.transfer(main, custom, dec!(120), None, None).unwrap();
    engine.ensure_main_account(BuildingId(2));
    engine
}

#[test]
fn restore_reproduces_balances_and_log() {
    let engine = populated();
    let snapshot = engine.snapshot().unwrap();

    let mut json = Vec::new();
    snapshot.to_writer(&mut json).unwrap();
    let parsed = Snapshot::from_reader(json.as_slice()).unwrap();
    assert_eq!(parsed, snapshot);

    let restored = Engine::restore(parsed, EngineConfig::default()).unwrap();
    assert_eq!(restored.snapshot().unwrap(), snapshot);
    assert_eq!(
        restored.reports().building_summary(BuildingId(1)).unwrap(),
        engine.reports().building_summary(BuildingId(1)).unwrap()
    );
}

#[test]
fn restored_engine_continues_sequences() {
    let engine = populated();
    let restored = Engine::restore(engine.snapshot().unwrap(), EngineConfig::default()).unwrap();

    let next = restored.ensure_main_account(BuildingId(3));
    assert_eq!(next.id().0, 4);
    let entry = restored.deposit(next.id(), dec!(1), None, None).unwrap();
    assert_eq!(entry.id.0, 3);
}

#[test]
fn snapshot_skips_deleted_accounts() {
    let engine = populated();
    let custom = engine.accounts_for_building(BuildingId(1), false)[1].id();
    engine.delete_account(custom).unwrap();

    let snapshot = engine.snapshot().unwrap();
    assert!(snapshot.accounts.iter().all(|record| record.id != custom));
    // Entries that touched it remain
    assert!(snapshot.entries.iter().any(|entry| entry.destination == Some(custom)));
    assert!(Engine::restore(snapshot, EngineConfig::default()).is_ok());
}

#[test]
fn restore_rejects_custom_account_without_main() {
    let mut snapshot = populated().snapshot().unwrap();
    snapshot.accounts.retain(|record| !(record.is_main && record.building_id == BuildingId(1)));

    assert!(matches!(
        Engine::restore(snapshot, EngineConfig::default()),
        Err(LedgerError::InvalidSnapshot(_))
    ));
}

#[test]
fn inactive_accounts_are_read_only_after_restore() {
    let mut snapshot = populated().snapshot().unwrap();
    let custom = snapshot
        .accounts
        .iter_mut()
        .find(|record| !record.is_main)
        .unwrap();
    custom.is_active = false;
    let custom_id = custom.id;

    let engine = Engine::restore(snapshot, EngineConfig::default()).unwrap();
    assert_eq!(
        engine.deposit(custom_id, dec!(1), None, None).unwrap_err(),
        LedgerError::AccountInactive(custom_id)
    );
    let summary = engine.reports().building_summary(BuildingId(1)).unwrap();
    assert_eq!(summary.active_accounts, 1);
    assert!(engine.accounts_for_building(BuildingId(1), false).len() == 1);
}

#[test]
fn snapshot_waits_on_row_locks_with_timeout() {
    let engine = Arc::new(Engine::with_config(
        EngineConfig::default().with_lock_timeout(Duration::from_millis(20)),
    ));
    let main = engine.ensure_main_account(BuildingId(1)).id();

    let started = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let holder = {
        let engine = Arc::clone(&engine);
        let started = Arc::clone(&started);
        let release = Arc::clone(&release);
        thread::spawn(move || {
            engine.atomically(&[main], None, |unit| {
                started.wait();
                release.wait();
                unit.apply(LedgerCommand::Deposit {
                    to: main,
                    amount: dec!(5),
                    description: None,
                })
            })
        })
    };

    started.wait();
    let result = engine.snapshot();
    release.wait();

    assert_eq!(result.unwrap_err(), LedgerError::Busy(main));
    holder.join().unwrap().unwrap();
    assert_eq!(engine.snapshot().unwrap().entries.len(), 1);
}

#[test]
fn snapshot_taken_during_account_creation_balances() {
    let engine = Arc::new(Engine::new());
    let main = engine.ensure_main_account(BuildingId(1)).id();
    engine.deposit(main, dec!(1000), None, None).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let creator = {
        let engine = Arc::clone(&engine);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for i in 0..50 {
                let custom = engine
                    .create_custom_account(BuildingId(1), AccountDetails::new(format!("c{i}")), None, None)
                    .unwrap()
                    .id();
                engine.transfer(main, custom, dec!(5), None, None).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    while !done.load(Ordering::SeqCst) {
        let snapshot = engine.snapshot().unwrap();
        let deposited: Decimal = snapshot
            .entries
            .iter()
            .filter(|entry| entry.kind == EntryKind::Deposit)
            .map(|entry| entry.amount)
            .sum();
        let held: Decimal = snapshot.accounts.iter().map(|record| record.balance).sum();
        assert_eq!(held, deposited);
        assert!(Engine::restore(snapshot, EngineConfig::default()).is_ok());
    }
    creator.join().unwrap();
}
