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

//! Persisted state layout.
//!
//! A [`Snapshot`] holds the two tables the ledger persists: one row per
//! account and one immutable row per ledger entry.

use crate::account::{AccountRecord, AccountStatus};
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::entry::LedgerEntry;
use crate::error::LedgerError;
use crate::ledger_log::LedgerLog;
use crate::store::AccountStore;
use crossbeam::utils::Backoff;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::{debug, info};

/// Fresh cuts taken before giving up on a snapshot.
const CUT_ATTEMPTS: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Ordered by account id.
    pub accounts: Vec<AccountRecord>,
    /// In commit order.
    pub entries: Vec<LedgerEntry>,
}

impl Snapshot {
    pub fn to_writer<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, self)
    }

    pub fn from_reader<R: Read>(reader: R) -> serde_json::Result<Self> {
        serde_json::from_reader(reader)
    }
}

impl Engine {
    /// Exports accounts and entries as one consistent cut.
    ///
    /// Every listed account row is locked, in id order, while the log is
    /// read, so no unit touching those accounts can commit halfway through the
    /// export. A live account published after the listing that already has
    /// entries forces a fresh cut. Entries of deleted accounts are kept.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Busy`] if a row lock is not acquired within the lock
    /// timeout, or if accounts keep appearing across every attempt.
    pub fn snapshot(&self) -> Result<Snapshot, LedgerError> {
        let backoff = Backoff::new();
        let mut attempt = 1;
        loop {
            let accounts = self.accounts.all();
            let mut rows = Vec::with_capacity(accounts.len());
            for account in &accounts {
                let row = account
                    .try_lock_for(self.config.lock_timeout)
                    .ok_or(LedgerError::Busy(account.id()))?;
                rows.push(row);
            }
            let entries = self.log.entries();

            let missed = entries
                .iter()
                .flat_map(|entry| [entry.source, entry.destination])
                .flatten()
                .find(|id| {
                    accounts.binary_search_by_key(id, |account| account.id()).is_err()
                        && self.accounts.get(*id).is_some()
                });
            if let Some(id) = missed {
                drop(rows);
                if attempt >= CUT_ATTEMPTS {
                    return Err(LedgerError::Busy(id));
                }
                debug!(attempt, account = %id, "account appeared during snapshot, retrying");
                attempt += 1;
                backoff.snooze();
                continue;
            }

            let records = accounts
                .iter()
                .zip(&rows)
                .filter(|(_, row)| row.status() != AccountStatus::Deleted)
                .map(|(account, row)| account.record_from(row))
                .collect();
            drop(rows);

            return Ok(Snapshot {
                accounts: records,
                entries: entries.iter().map(|entry| LedgerEntry::clone(entry)).collect(),
            });
        }
    }

    /// Rebuilds an engine from persisted state.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidSnapshot`] if a building has custom accounts but
    /// no main account, has two main accounts, if account ids repeat, or if
    /// entries are malformed or out of commit order.
    pub fn restore(snapshot: Snapshot, config: EngineConfig) -> Result<Self, LedgerError> {
        let account_count = snapshot.accounts.len();
        let entry_count = snapshot.entries.len();
        let accounts = AccountStore::from_records(snapshot.accounts)?;
        let log = LedgerLog::from_entries(snapshot.entries)?;
        info!(accounts = account_count, entries = entry_count, "restored ledger");
        Ok(Engine::from_parts(accounts, log, config))
    }
}
