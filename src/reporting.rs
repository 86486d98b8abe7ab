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

//! Read-only reporting over accounts and the ledger log.
//!
//! [`Reports`] only borrows the stores immutably and never opens a unit of
//! work, so nothing here can change a balance or an entry.

use crate::account::Account;
use crate::base::{AccountId, BuildingId};
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::entry::{EntryKind, LedgerEntry};
use crate::error::LedgerError;
use crate::ledger_log::LedgerLog;
use crate::store::AccountStore;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// Balance totals for one building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildingSummary {
    pub building_id: BuildingId,
    pub total_balance: Decimal,
    pub main_balance: Decimal,
    pub custom_balance: Decimal,
    pub active_accounts: usize,
}

/// Order of history results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Filters and paging for [`Reports::account_history`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub kind: Option<EntryKind>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
    pub order: SortOrder,
    /// 1-based; zero is treated as the first page.
    pub page: usize,
    /// Falls back to the configured default page size.
    pub per_page: Option<usize>,
}

impl HistoryQuery {
    fn matches(&self, entry: &LedgerEntry) -> bool {
        self.kind.is_none_or(|kind| entry.kind == kind)
            && self.from.is_none_or(|from| entry.created_at >= from)
            && self.to.is_none_or(|to| entry.created_at < to)
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    /// Matching items across all pages.
    pub total: usize,
}

impl<T> Page<T> {
    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.per_page)
    }
}

/// Entry counts and money flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionStatistics {
    pub entry_count: usize,
    /// Total credited to the account.
    pub incoming: Decimal,
    /// Total debited from the account.
    pub outgoing: Decimal,
    pub last_entry_at: Option<DateTime<Utc>>,
}

/// Read-only view over an engine's stores.
pub struct Reports<'a> {
    accounts: &'a AccountStore,
    log: &'a LedgerLog,
    config: &'a EngineConfig,
}

impl Engine {
    pub fn reports(&self) -> Reports<'_> {
        Reports {
            accounts: &self.accounts,
            log: &self.log,
            config: &self.config,
        }
    }
}

impl Reports<'_> {
    /// Totals across a building's active accounts.
    ///
    /// # Errors
    ///
    /// [`LedgerError::BuildingNotFound`] if the building has no accounts.
    pub fn building_summary(&self, building: BuildingId) -> Result<BuildingSummary, LedgerError> {
        let accounts: Vec<Arc<Account>> = self.accounts.accounts_for_building(building);
        if accounts.is_empty() {
            return Err(LedgerError::BuildingNotFound(building));
        }

        let mut summary = BuildingSummary {
            building_id: building,
            total_balance: Decimal::ZERO,
            main_balance: Decimal::ZERO,
            custom_balance: Decimal::ZERO,
            active_accounts: 0,
        };
        for account in accounts.iter().filter(|account| account.is_active()) {
            let balance = account.balance();
            if account.is_main() {
                summary.main_balance += balance;
            } else {
                summary.custom_balance += balance;
            }
            summary.total_balance += balance;
            summary.active_accounts += 1;
        }
        Ok(summary)
    }

    /// Entries where `account` is source or destination.
    ///
    /// History of a deleted account stays readable as long as it has entries.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AccountNotFound`] if the account is unknown and has no entries.
    pub fn account_history(
        &self,
        account: AccountId,
        query: &HistoryQuery,
    ) -> Result<Page<Arc<LedgerEntry>>, LedgerError> {
        let mut matching: Vec<Arc<LedgerEntry>> = self
            .log
            .entries_for(account)
            .into_iter()
            .filter(|entry| query.matches(entry))
            .collect();
        if matching.is_empty() && self.accounts.get(account).is_none() {
            return Err(LedgerError::AccountNotFound(account));
        }

        // Log order is commit order, oldest first.
        if query.order == SortOrder::NewestFirst {
            matching.reverse();
        }

        let per_page = query
            .per_page
            .unwrap_or(self.config.default_page_size)
            .clamp(1, EngineConfig::MAX_PAGE_SIZE);
        let page = query.page.max(1);
        let total = matching.len();
        let items = matching
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();

        Ok(Page {
            items,
            page,
            per_page,
            total,
        })
    }

    /// Statistics for one account, or for the whole log.
    ///
    /// Without an account, `incoming` and `outgoing` are zero.
    pub fn transaction_statistics(&self, account: Option<AccountId>) -> TransactionStatistics {
        let entries = match account {
            Some(id) => self.log.entries_for(id),
            None => self.log.entries(),
        };

        let mut stats = TransactionStatistics {
            entry_count: entries.len(),
            incoming: Decimal::ZERO,
            outgoing: Decimal::ZERO,
            last_entry_at: entries.last().map(|entry| entry.created_at),
        };
        if let Some(id) = account {
            for entry in &entries {
                if entry.destination == Some(id) {
                    stats.incoming += entry.amount;
                }
                if entry.source == Some(id) {
                    stats.outgoing += entry.amount;
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_rounds_up() {
        let page: Page<u8> = Page {
            items: vec![],
            page: 1,
            per_page: 20,
            total: 41,
        };
        assert_eq!(page.page_count(), 3);
    }

    #[test]
    fn default_query_is_newest_first() {
        assert_eq!(HistoryQuery::default().order, SortOrder::NewestFirst);
    }
}
