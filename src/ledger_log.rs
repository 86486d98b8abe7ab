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

//! Append-only ledger log.
//!
//! Entries are kept in commit order. Ids are assigned under the log's write
//! lock, so id order and commit order always agree. The log exposes no way to
//! update or remove an entry.

use crate::base::{AccountId, EntryId, UserId};
use crate::entry::{LedgerCommand, LedgerEntry};
use crate::error::LedgerError;
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug)]
pub struct LedgerLog {
    entries: RwLock<Vec<Arc<LedgerEntry>>>,
}

impl LedgerLog {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Appends one entry per command, in order, as a single batch.
    ///
    /// The batch is stamped under the write lock and never earlier than the
    /// previous entry, so timestamps follow id order.
    pub(crate) fn append(
        &self,
        commands: Vec<LedgerCommand>,
        created_by: Option<UserId>,
    ) -> Vec<Arc<LedgerEntry>> {
        let mut entries = self.entries.write();
        let mut next_id = entries.last().map_or(1, |entry| entry.id.0 + 1);
        let now = Utc::now();
        let created_at = entries.last().map_or(now, |entry| entry.created_at.max(now));
        let mut appended = Vec::with_capacity(commands.len());
        for command in commands {
            let entry = Arc::new(command.into_entry(EntryId(next_id), created_at, created_by));
            next_id += 1;
            entries.push(Arc::clone(&entry));
            appended.push(entry);
        }
        appended
    }

    pub fn get(&self, id: EntryId) -> Result<Arc<LedgerEntry>, LedgerError> {
        let entries = self.entries.read();
        entries
            .binary_search_by_key(&id, |entry| entry.id)
            .map(|index| Arc::clone(&entries[index]))
            .map_err(|_| LedgerError::EntryNotFound(id))
    }

    /// Point-in-time copy of the whole log, oldest first.
    pub fn entries(&self) -> Vec<Arc<LedgerEntry>> {
        self.entries.read().clone()
    }

    /// Entries debiting or crediting `account`, oldest first.
    pub fn entries_for(&self, account: AccountId) -> Vec<Arc<LedgerEntry>> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.touches(account))
            .cloned()
            .collect()
    }

    /// Rebuilds the log from persisted rows.
    ///
    /// Rows must arrive in commit order with strictly increasing ids.
    pub(crate) fn from_entries(entries: Vec<LedgerEntry>) -> Result<Self, LedgerError> {
        let mut previous: Option<EntryId> = None;
        for entry in &entries {
            entry.validate_shape()?;
            if previous.is_some_and(|id| id >= entry.id) {
                return Err(LedgerError::InvalidSnapshot(format!(
                    "entry {} is out of commit order",
                    entry.id
                )));
            }
            previous = Some(entry.id);
        }
        Ok(Self {
            entries: RwLock::new(entries.into_iter().map(Arc::new).collect()),
        })
    }
}

impl Default for LedgerLog {
    fn default() -> Self {
        Self::new()
    }
}
