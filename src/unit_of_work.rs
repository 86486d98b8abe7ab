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

//! Units of work: the ledger's atomicity boundary.
//!
//! A [`UnitOfWork`] is created by [`Engine::atomically`](crate::Engine::atomically)
//! after it has locked every account the caller named. Commands applied to
//! the unit are validated against the unit's staged balances, so later
//! commands see earlier ones. Nothing reaches the account rows or the ledger
//! log until the unit commits; a unit that is dropped leaves no trace.

use crate::account::{Account, AccountData};
use crate::base::{AccountId, UserId};
use crate::entry::{LedgerCommand, LedgerEntry};
use crate::error::LedgerError;
use crate::ledger_log::LedgerLog;
use chrono::Utc;
use parking_lot::MutexGuard;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

/// An account held under its row lock for the lifetime of the unit.
struct Locked<'a> {
    account: &'a Account,
    row: MutexGuard<'a, AccountData>,
    /// Balance including every command staged so far.
    staged: Decimal,
}

/// A set of locked accounts and the commands staged against them.
pub struct UnitOfWork<'a> {
    /// Sorted by account id.
    locked: Vec<Locked<'a>>,
    commands: Vec<LedgerCommand>,
}

impl<'a> UnitOfWork<'a> {
    pub(crate) fn new(rows: Vec<(&'a Account, MutexGuard<'a, AccountData>)>) -> Self {
        let locked = rows
            .into_iter()
            .map(|(account, row)| Locked {
                account,
                staged: row.balance(),
                row,
            })
            .collect();
        Self {
            locked,
            commands: Vec::new(),
        }
    }

    fn slot(&self, id: AccountId) -> Result<usize, LedgerError> {
        self.locked
            .binary_search_by_key(&id, |locked| locked.account.id())
            .map_err(|_| LedgerError::AccountNotLocked(id))
    }

    /// Slot of an account that must accept balance changes.
    fn mutable_slot(&self, id: AccountId) -> Result<usize, LedgerError> {
        let slot = self.slot(id)?;
        self.locked[slot].row.ensure_mutable(id)?;
        Ok(slot)
    }

    /// Balance of a locked account, including staged commands.
    pub fn balance(&self, id: AccountId) -> Result<Decimal, LedgerError> {
        Ok(self.locked[self.slot(id)?].staged)
    }

    /// Number of commands staged so far.
    pub fn staged(&self) -> usize {
        self.commands.len()
    }

    /// Validates `command` and stages its balance changes and ledger entry.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - Amount is zero or negative.
    /// - [`LedgerError::SameAccount`] - Transfer to the source account.
    /// - [`LedgerError::AccountNotLocked`] - Account was not locked by this unit.
    /// - [`LedgerError::AccountInactive`] - Account is inactive.
    /// - [`LedgerError::CrossBuildingTransfer`] - Transfer across buildings.
    /// - [`LedgerError::InsufficientFunds`] - Debit exceeds the staged balance.
    ///
    /// A failed command stages nothing.
    pub fn apply(&mut self, command: LedgerCommand) -> Result<(), LedgerError> {
        command.validate()?;
        let amount = command.amount();

        match &command {
            LedgerCommand::Deposit { to, .. } => {
                let to = self.mutable_slot(*to)?;
                self.locked[to].staged += amount;
            }
            LedgerCommand::Transfer { from, to, .. } => {
                let from = self.mutable_slot(*from)?;
                let to = self.mutable_slot(*to)?;
                if self.locked[from].account.building_id() != self.locked[to].account.building_id()
                {
                    return Err(LedgerError::CrossBuildingTransfer);
                }
                if self.locked[from].staged < amount {
                    return Err(LedgerError::InsufficientFunds);
                }
                self.locked[from].staged -= amount;
                self.locked[to].staged += amount;
            }
            LedgerCommand::Expense {
                account,
                allow_negative_balance,
                ..
            } => {
                let slot = self.mutable_slot(*account)?;
                if !allow_negative_balance && self.locked[slot].staged < amount {
                    return Err(LedgerError::InsufficientFunds);
                }
                self.locked[slot].staged -= amount;
            }
        }

        debug!(kind = ?command.kind(), %amount, "staged ledger command");
        self.commands.push(command);
        Ok(())
    }

    /// Appends the staged entries and writes the staged balances while every
    /// row lock is still held.
    pub(crate) fn commit(
        self,
        log: &LedgerLog,
        created_by: Option<UserId>,
    ) -> Result<Vec<Arc<LedgerEntry>>, LedgerError> {
        if self.commands.is_empty() {
            return Err(LedgerError::EmptyUnit);
        }
        let entries = log.append(self.commands, created_by);
        let committed_at = entries
            .last()
            .map_or_else(Utc::now, |entry| entry.created_at);
        for mut locked in self.locked {
            if locked.staged != locked.row.balance() {
                locked.row.commit_balance(locked.staged, committed_at);
            }
        }
        Ok(entries)
    }
}
