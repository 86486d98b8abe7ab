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

//! Account store.
//!
//! Holds every account row and the per-building main-account index. The store
//! hands out shared [`Account`] handles; balances can only change through a
//! unit of work holding the account's row lock.

use crate::account::{Account, AccountDetails, AccountRecord};
use crate::base::{AccountId, BuildingId};
use crate::error::LedgerError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct AccountStore {
    /// Account rows indexed by id.
    accounts: DashMap<AccountId, Arc<Account>>,
    /// Main account of each provisioned building.
    main_by_building: DashMap<BuildingId, Arc<Account>>,
    next_id: AtomicU64,
}

impl AccountStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            main_by_building: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn allocate_id(&self) -> AccountId {
        AccountId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn get(&self, id: AccountId) -> Option<Arc<Account>> {
        self.accounts.get(&id).map(|account| Arc::clone(account.value()))
    }

    pub(crate) fn require(&self, id: AccountId) -> Result<Arc<Account>, LedgerError> {
        self.get(id).ok_or(LedgerError::AccountNotFound(id))
    }

    pub fn main_account(&self, building: BuildingId) -> Option<Arc<Account>> {
        self.main_by_building
            .get(&building)
            .map(|account| Arc::clone(account.value()))
    }

    /// Returns the building's main account, creating it on first call.
    ///
    /// Returns `true` alongside the account when it was created.
    pub(crate) fn get_or_create_main(&self, building: BuildingId) -> (Arc<Account>, bool) {
        // Entry API keeps check-and-insert atomic across concurrent provisioning
        match self.main_by_building.entry(building) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let id = self.allocate_id();
                let account = Arc::new(Account::new_main(id, building));
                self.accounts.insert(id, Arc::clone(&account));
                entry.insert(Arc::clone(&account));
                (account, true)
            }
        }
    }

    /// Builds a custom account row for an already provisioned building.
    ///
    /// The row is not visible to lookups until it is [published](Self::publish).
    pub(crate) fn new_custom(
        &self,
        building: BuildingId,
        details: AccountDetails,
    ) -> Result<Arc<Account>, LedgerError> {
        // Main accounts are never removed, so the check holds once passed.
        if !self.main_by_building.contains_key(&building) {
            return Err(LedgerError::PreconditionFailed(building));
        }
        let id = self.allocate_id();
        Ok(Arc::new(Account::new_custom(id, building, details)))
    }

    /// Makes a row built by [`new_custom`](Self::new_custom) visible.
    pub(crate) fn publish(&self, account: Arc<Account>) {
        self.accounts.insert(account.id(), account);
    }

    /// Removes the row. Callers mark it deleted under its lock first.
    pub(crate) fn remove(&self, id: AccountId) -> Option<Arc<Account>> {
        self.accounts.remove(&id).map(|(_, account)| account)
    }

    /// Accounts of one building: main first, then custom by id.
    pub fn accounts_for_building(&self, building: BuildingId) -> Vec<Arc<Account>> {
        let mut accounts: Vec<Arc<Account>> = self
            .accounts
            .iter()
            .filter(|account| account.building_id() == building)
            .map(|account| Arc::clone(account.value()))
            .collect();
        accounts.sort_by_key(|account| (!account.is_main(), account.id()));
        accounts
    }

    /// All accounts ordered by id.
    pub fn all(&self) -> Vec<Arc<Account>> {
        let mut accounts: Vec<Arc<Account>> = self
            .accounts
            .iter()
            .map(|account| Arc::clone(account.value()))
            .collect();
        accounts.sort_by_key(|account| account.id());
        accounts
    }

    /// Rebuilds a store from persisted rows.
    pub(crate) fn from_records(records: Vec<AccountRecord>) -> Result<Self, LedgerError> {
        let store = Self::new();
        let mut max_id = 0;
        for record in records {
            let id = record.id;
            let building = record.building_id;
            let account = Arc::new(Account::from_record(record));
            if account.is_main() {
                if let Some(existing) = store.main_by_building.insert(building, Arc::clone(&account)) {
                    return Err(LedgerError::InvalidSnapshot(format!(
                        "building {building} has two main accounts ({} and {id})",
                        existing.id()
                    )));
                }
            }
            if store.accounts.insert(id, account).is_some() {
                return Err(LedgerError::InvalidSnapshot(format!(
                    "duplicate account id {id}"
                )));
            }
            max_id = max_id.max(id.0);
        }

        for account in store.accounts.iter() {
            if !store.main_by_building.contains_key(&account.building_id()) {
                return Err(LedgerError::InvalidSnapshot(format!(
                    "building {} has accounts but no main account",
                    account.building_id()
                )));
            }
        }

        store.next_id.store(max_id + 1, Ordering::SeqCst);
        Ok(store)
    }
}

impl Default for AccountStore {
    fn default() -> Self {
        Self::new()
    }
}
