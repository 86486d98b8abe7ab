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

//! Account lifecycle: main-account provisioning, custom accounts, detail
//! edits, and deletion.

use crate::account::{Account, AccountDetails, AccountRecord, AccountStatus};
use crate::base::{AccountId, BuildingId, UserId};
use crate::engine::Engine;
use crate::entry::LedgerCommand;
use crate::error::LedgerError;
use crate::unit_of_work::UnitOfWork;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Partial edit of an account's non-monetary fields.
///
/// Fields left as `None` are unchanged. There is deliberately no balance field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountDetailsUpdate {
    pub name: Option<String>,
    pub title: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub visible: Option<bool>,
}

impl AccountDetailsUpdate {
    fn renames(&self) -> bool {
        self.name.is_some() || self.title.is_some()
    }

    fn apply_to(self, details: &mut AccountDetails) {
        if let Some(name) = self.name {
            details.name = name;
        }
        if let Some(title) = self.title {
            details.title = title;
        }
        if let Some(description) = self.description {
            details.description = description;
        }
        if let Some(visible) = self.visible {
            details.visible = visible;
        }
    }
}

impl Engine {
    /// Returns the building's main account, provisioning it on first call.
    ///
    /// Called by building provisioning when a building is created. Repeated
    /// calls return the same account.
    pub fn ensure_main_account(&self, building: BuildingId) -> Arc<Account> {
        let (account, created) = self.accounts.get_or_create_main(building);
        if created {
            info!(%building, account = %account.id(), "provisioned main account");
        }
        account
    }

    /// Creates a custom account, optionally funded with `initial_amount`.
    ///
    /// The initial deposit is staged under the new row's lock before the row
    /// becomes visible, and the row is published while that lock is still
    /// held. Other units therefore wait until the deposit has committed, and
    /// a failed deposit leaves neither an account nor an entry behind.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - `initial_amount` is negative.
    /// - [`LedgerError::PreconditionFailed`] - The building has no main account.
    pub fn create_custom_account(
        &self,
        building: BuildingId,
        details: AccountDetails,
        initial_amount: Option<Decimal>,
        created_by: Option<UserId>,
    ) -> Result<Arc<Account>, LedgerError> {
        let initial_amount = initial_amount.unwrap_or(Decimal::ZERO);
        if initial_amount < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let account = self.accounts.new_custom(building, details)?;
        // Unpublished, so the lock is uncontended.
        let row = account.lock();

        if initial_amount > Decimal::ZERO {
            let description = Some(format!("Initial balance of {}", row.details.title));
            let mut unit = UnitOfWork::new(vec![(account.as_ref(), row)]);
            unit.apply(LedgerCommand::Deposit {
                to: account.id(),
                amount: initial_amount,
                description,
            })?;
            self.accounts.publish(Arc::clone(&account));
            let entries = unit.commit(&self.log, created_by)?;
            info!(
                %building,
                account = %account.id(),
                entries = ?entries.iter().map(|entry| entry.id.0).collect::<Vec<_>>(),
                "created funded custom account"
            );
        } else {
            self.accounts.publish(Arc::clone(&account));
            drop(row);
            info!(%building, account = %account.id(), "created custom account");
        }

        Ok(account)
    }

    /// Edits name, title, description, or visibility.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountNotFound`] - Account is missing or deleted.
    /// - [`LedgerError::MainAccountProtected`] - Renaming a main account.
    /// - [`LedgerError::AccountInactive`] - Account is inactive.
    /// - [`LedgerError::Busy`] - Row lock was not acquired in time.
    pub fn update_account_details(
        &self,
        id: AccountId,
        update: AccountDetailsUpdate,
    ) -> Result<AccountDetails, LedgerError> {
        let account = self.accounts.require(id)?;
        if account.is_main() && update.renames() {
            return Err(LedgerError::MainAccountProtected(id));
        }

        let mut row = account
            .try_lock_for(self.config.lock_timeout)
            .ok_or(LedgerError::Busy(id))?;
        row.ensure_mutable(id)?;
        update.apply_to(&mut row.details);
        row.touch();
        Ok(row.details.clone())
    }

    /// Deletes a custom account and returns its final row.
    ///
    /// Deletion does not move the remaining balance; callers transfer it out
    /// beforehand if needed. Units of work already waiting on the account
    /// fail with [`LedgerError::AccountNotFound`].
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountNotFound`] - Account is missing or deleted.
    /// - [`LedgerError::MainAccountProtected`] - Account is a main account.
    /// - [`LedgerError::Busy`] - Row lock was not acquired in time.
    pub fn delete_account(&self, id: AccountId) -> Result<AccountRecord, LedgerError> {
        let account = self.accounts.require(id)?;
        if account.is_main() {
            return Err(LedgerError::MainAccountProtected(id));
        }

        {
            let mut row = account
                .try_lock_for(self.config.lock_timeout)
                .ok_or(LedgerError::Busy(id))?;
            if row.status() == AccountStatus::Deleted {
                return Err(LedgerError::AccountNotFound(id));
            }
            row.mark_deleted();
        }
        self.accounts.remove(id);

        let record = account.record();
        info!(account = %id, balance = %record.balance, "deleted custom account");
        Ok(record)
    }

    /// Active accounts of a building, main first.
    ///
    /// With `visible_only`, accounts hidden from the client UI are skipped.
    pub fn accounts_for_building(&self, building: BuildingId, visible_only: bool) -> Vec<Arc<Account>> {
        self.accounts
            .accounts_for_building(building)
            .into_iter()
            .filter(|account| account.is_active())
            .filter(|account| !visible_only || account.details().visible)
            .collect()
    }

    /// The building's main account, if provisioned.
    pub fn main_account(&self, building: BuildingId) -> Option<Arc<Account>> {
        self.accounts.main_account(building)
    }
}
