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

//! Ledger engine.
//!
//! The [`Engine`] owns the account store and the ledger log and is the only
//! writer of account balances. Every balance-mutating operation runs as one
//! unit of work:
//!
//! - **Deposits**: credit an account.
//! - **Transfers**: move funds between two accounts of the same building.
//! - **Expenses**: debit an account, optionally past zero.
//!
//! # Locking
//!
//! A unit locks each account it touches in ascending id order, waiting at
//! most [`EngineConfig::lock_timeout`] per lock. Validation and the balance
//! writes happen under those locks, so two debits of the same account are
//! serialized and the second one sees the first one's effect. Lock ordering
//! rules out deadlocks between units; the timeout surfaces contention as
//! [`LedgerError::Busy`] instead of blocking indefinitely.
//!
//! Read-only queries (see [`Reports`](crate::Reports)) take account locks
//! briefly and must not be issued from inside a unit of work.

use crate::account::{Account, AccountStatus};
use crate::base::{AccountId, EntryId, UserId};
use crate::config::EngineConfig;
use crate::entry::{ExpensePosting, LedgerCommand, LedgerEntry};
use crate::error::LedgerError;
use crate::ledger_log::LedgerLog;
use crate::store::AccountStore;
use crate::unit_of_work::UnitOfWork;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Ledger engine managing building accounts and their transaction log.
///
/// # Invariants
///
/// - Each building has exactly one main account, and it exists before any
///   custom account of that building.
/// - A transfer debits and credits by the same amount and appends exactly one
///   entry, or changes nothing.
/// - Ledger entries are never updated or removed.
#[derive(Debug)]
pub struct Engine {
    /// Account rows and the main-account index.
    pub(crate) accounts: AccountStore,
    /// Append-only transaction log.
    pub(crate) log: LedgerLog,
    pub(crate) config: EngineConfig,
}

impl Engine {
    /// Creates an engine with no accounts or entries.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            accounts: AccountStore::new(),
            log: LedgerLog::new(),
            config,
        }
    }

    pub(crate) fn from_parts(accounts: AccountStore, log: LedgerLog, config: EngineConfig) -> Self {
        Self {
            accounts,
            log,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Retrieves an account by id.
    pub fn get_account(&self, id: AccountId) -> Option<Arc<Account>> {
        self.accounts.get(id)
    }

    /// Returns all accounts ordered by id.
    pub fn accounts(&self) -> Vec<Arc<Account>> {
        self.accounts.all()
    }

    /// Retrieves a ledger entry by id.
    pub fn get_entry(&self, id: EntryId) -> Result<Arc<LedgerEntry>, LedgerError> {
        self.log.get(id)
    }

    /// Returns the whole ledger log, oldest first.
    pub fn entries(&self) -> Vec<Arc<LedgerEntry>> {
        self.log.entries()
    }

    /// Runs `work` as one atomic unit over the given accounts.
    ///
    /// The accounts are locked before `work` runs and stay locked until the
    /// unit commits or is dropped. If `work` returns an error, nothing it
    /// staged is persisted.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountNotFound`] - An account does not exist.
    /// - [`LedgerError::Busy`] - A row lock was not acquired in time.
    /// - [`LedgerError::EmptyUnit`] - `work` staged no commands.
    /// - Whatever `work` returns.
    ///
    /// # Example
    ///
    /// ```
    /// use building_ledger::{BuildingId, Engine, LedgerCommand};
    /// use rust_decimal_macros::dec;
    ///
    /// let engine = Engine::new();
    /// let main = engine.ensure_main_account(BuildingId(1)).id();
    ///
    /// let entries = engine
    ///     .atomically(&[main], None, |unit| {
    ///         unit.apply(LedgerCommand::Deposit { to: main, amount: dec!(40), description: None })?;
    ///         unit.apply(LedgerCommand::Deposit { to: main, amount: dec!(2), description: None })
    ///     })
    ///     .unwrap();
    ///
    /// assert_eq!(entries.len(), 2);
    /// assert_eq!(engine.get_account(main).unwrap().balance(), dec!(42));
    /// ```
    pub fn atomically<F>(
        &self,
        account_ids: &[AccountId],
        created_by: Option<UserId>,
        work: F,
    ) -> Result<Vec<Arc<LedgerEntry>>, LedgerError>
    where
        F: FnOnce(&mut UnitOfWork<'_>) -> Result<(), LedgerError>,
    {
        let mut ids = account_ids.to_vec();
        ids.sort();
        ids.dedup();

        let accounts = ids
            .iter()
            .map(|id| self.accounts.require(*id))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::with_capacity(accounts.len());
        for account in &accounts {
            let row = account
                .try_lock_for(self.config.lock_timeout)
                .ok_or_else(|| {
                    warn!(account = %account.id(), "account lock timed out");
                    LedgerError::Busy(account.id())
                })?;
            // Deleted between lookup and lock.
            if row.status() == AccountStatus::Deleted {
                return Err(LedgerError::AccountNotFound(account.id()));
            }
            rows.push((account.as_ref(), row));
        }

        let mut unit = UnitOfWork::new(rows);
        work(&mut unit)?;
        let entries = unit.commit(&self.log, created_by)?;

        info!(
            entries = ?entries.iter().map(|entry| entry.id.0).collect::<Vec<_>>(),
            accounts = ?ids.iter().map(|id| id.0).collect::<Vec<_>>(),
            "committed unit of work"
        );
        Ok(entries)
    }

    /// Processes one ledger command as its own unit of work.
    ///
    /// Amount and same-account checks run before any account is looked up.
    ///
    /// # Errors
    ///
    /// See [`UnitOfWork::apply`] and [`Engine::atomically`].
    pub fn process(
        &self,
        command: LedgerCommand,
        created_by: Option<UserId>,
    ) -> Result<Arc<LedgerEntry>, LedgerError> {
        command.validate()?;
        let ids = command.accounts();
        let mut entries = self.atomically(&ids, created_by, |unit| unit.apply(command))?;
        entries.pop().ok_or(LedgerError::EmptyUnit)
    }

    /// Credits `to` with `amount`.
    pub fn deposit(
        &self,
        to: AccountId,
        amount: Decimal,
        description: Option<String>,
        created_by: Option<UserId>,
    ) -> Result<Arc<LedgerEntry>, LedgerError> {
        self.process(
            LedgerCommand::Deposit {
                to,
                amount,
                description,
            },
            created_by,
        )
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - Amount is zero or negative.
    /// - [`LedgerError::SameAccount`] - `from == to`.
    /// - [`LedgerError::AccountNotFound`] - Either account is missing.
    /// - [`LedgerError::CrossBuildingTransfer`] - Accounts of different buildings.
    /// - [`LedgerError::InsufficientFunds`] - `from` holds less than `amount`.
    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        description: Option<String>,
        created_by: Option<UserId>,
    ) -> Result<Arc<LedgerEntry>, LedgerError> {
        self.process(
            LedgerCommand::Transfer {
                from,
                to,
                amount,
                description,
            },
            created_by,
        )
    }

    /// Debits an account for an expense.
    ///
    /// The posting decides whether the balance may go negative.
    pub fn post_expense(
        &self,
        posting: ExpensePosting,
        created_by: Option<UserId>,
    ) -> Result<Arc<LedgerEntry>, LedgerError> {
        self.process(posting.into(), created_by)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
