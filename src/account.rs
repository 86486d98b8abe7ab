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

//! Cash accounts ("inventories").
//!
//! Every account belongs to one building. Each building has exactly one main
//! account, provisioned with the building, and any number of custom accounts
//! created afterwards.
//!
//! Account state machine:
//!
//! ```text
//!   Active ──delete (custom only)──► Deleted
//!   Inactive (restored from persisted state, read-only)
//! ```
//!
//! The balance sits behind the account's row lock and is only written by a
//! committing unit of work.
//!
//! # Example
//!
//! ```
//! use building_ledger::{Engine, BuildingId};
//! use rust_decimal::Decimal;
//!
//! let engine = Engine::new();
//! let main = engine.ensure_main_account(BuildingId(1));
//! assert!(main.is_main());
//! assert_eq!(main.balance(), Decimal::ZERO);
//! ```

use crate::base::{AccountId, BuildingId};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;
use std::time::Duration;

/// Lifecycle state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
    Deleted,
}

/// Editable, non-monetary account fields.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct AccountDetails {
    pub name: String,
    pub title: String,
    pub description: Option<String>,
    /// Whether the client UI shows this account.
    pub visible: bool,
}

impl AccountDetails {
    pub const MAIN_NAME: &'static str = "main";
    pub const MAIN_TITLE: &'static str = "Main account";
    pub const MAIN_DESCRIPTION: &'static str = "Building cash account";

    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            description: None,
            visible: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    fn main() -> Self {
        Self {
            name: Self::MAIN_NAME.to_string(),
            title: Self::MAIN_TITLE.to_string(),
            description: Some(Self::MAIN_DESCRIPTION.to_string()),
            visible: true,
        }
    }
}

/// Mutable row contents, guarded by the account lock.
#[derive(Debug)]
pub(crate) struct AccountData {
    pub(crate) details: AccountDetails,
    balance: Decimal,
    status: AccountStatus,
    updated_at: DateTime<Utc>,
}

impl AccountData {
    fn new(details: AccountDetails) -> Self {
        Self {
            details,
            balance: Decimal::ZERO,
            status: AccountStatus::Active,
            updated_at: Utc::now(),
        }
    }

    pub(crate) fn balance(&self) -> Decimal {
        self.balance
    }

    pub(crate) fn status(&self) -> AccountStatus {
        self.status
    }

    /// Fails unless the row accepts balance changes.
    pub(crate) fn ensure_mutable(&self, id: AccountId) -> Result<(), LedgerError> {
        match self.status {
            AccountStatus::Active => Ok(()),
            AccountStatus::Inactive => Err(LedgerError::AccountInactive(id)),
            AccountStatus::Deleted => Err(LedgerError::AccountNotFound(id)),
        }
    }

    /// Writes a committed balance. Only the unit of work calls this.
    pub(crate) fn commit_balance(&mut self, balance: Decimal, at: DateTime<Utc>) {
        self.balance = balance;
        self.updated_at = at;
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.status = AccountStatus::Deleted;
        self.updated_at = Utc::now();
    }
}

/// A building-scoped cash account.
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    building_id: BuildingId,
    is_main: bool,
    created_at: DateTime<Utc>,
    inner: Mutex<AccountData>,
}

impl Account {
    const DECIMAL_PRECISION: u32 = 4;

    pub(crate) fn new_main(id: AccountId, building_id: BuildingId) -> Self {
        Self::with_data(id, building_id, true, AccountData::new(AccountDetails::main()))
    }

    pub(crate) fn new_custom(id: AccountId, building_id: BuildingId, details: AccountDetails) -> Self {
        Self::with_data(id, building_id, false, AccountData::new(details))
    }

    fn with_data(id: AccountId, building_id: BuildingId, is_main: bool, data: AccountData) -> Self {
        Self {
            id,
            building_id,
            is_main,
            created_at: data.updated_at,
            inner: Mutex::new(data),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn building_id(&self) -> BuildingId {
        self.building_id
    }

    /// Fixed at creation.
    pub fn is_main(&self) -> bool {
        self.is_main
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Committed balance.
    ///
    /// Takes the row lock, so it must not be called for an account held by
    /// the current unit of work; use [`UnitOfWork::balance`](crate::UnitOfWork::balance) there.
    pub fn balance(&self) -> Decimal {
        self.inner.lock().balance
    }

    pub fn status(&self) -> AccountStatus {
        self.inner.lock().status
    }

    pub fn is_active(&self) -> bool {
        self.status() == AccountStatus::Active
    }

    pub fn details(&self) -> AccountDetails {
        self.inner.lock().details.clone()
    }

    /// Returns the persisted-row form of this account.
    pub fn record(&self) -> AccountRecord {
        self.record_from(&self.inner.lock())
    }

    /// Builds the record from a row the caller already holds locked.
    pub(crate) fn record_from(&self, data: &AccountData) -> AccountRecord {
        AccountRecord {
            id: self.id,
            building_id: self.building_id,
            name: data.details.name.clone(),
            title: data.details.title.clone(),
            description: data.details.description.clone(),
            balance: data.balance,
            is_main: self.is_main,
            is_active: data.status == AccountStatus::Active,
            visible: data.details.visible,
            created_at: self.created_at,
            updated_at: data.updated_at,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, AccountData> {
        self.inner.lock()
    }

    /// Acquires the row lock, giving up after `timeout`.
    pub(crate) fn try_lock_for(&self, timeout: Duration) -> Option<MutexGuard<'_, AccountData>> {
        self.inner.try_lock_for(timeout)
    }

    pub(crate) fn from_record(record: AccountRecord) -> Self {
        let status = if record.is_active {
            AccountStatus::Active
        } else {
            AccountStatus::Inactive
        };
        Self {
            id: record.id,
            building_id: record.building_id,
            is_main: record.is_main,
            created_at: record.created_at,
            inner: Mutex::new(AccountData {
                details: AccountDetails {
                    name: record.name,
                    title: record.title,
                    description: record.description,
                    visible: record.visible,
                },
                balance: record.balance,
                status,
                updated_at: record.updated_at,
            }),
        }
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = self.inner.lock();
        let mut state = serializer.serialize_struct("Account", 7)?;
        state.serialize_field("account", &self.id)?;
        state.serialize_field("building", &self.building_id)?;
        state.serialize_field("name", &data.details.name)?;
        state.serialize_field("main", &self.is_main)?;
        state.serialize_field(
            "balance",
            &data.balance.round_dp(Account::DECIMAL_PRECISION),
        )?;
        state.serialize_field("active", &(data.status == AccountStatus::Active))?;
        state.serialize_field("visible", &data.details.visible)?;
        state.end()
    }
}

/// One row of the accounts table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    pub building_id: BuildingId,
    pub name: String,
    pub title: String,
    pub description: Option<String>,
    pub balance: Decimal,
    pub is_main: bool,
    pub is_active: bool,
    pub visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn main_account_uses_default_details() {
        let account = Account::new_main(AccountId(1), BuildingId(10));
        assert!(account.is_main());
        assert!(account.is_active());
        assert_eq!(account.balance(), Decimal::ZERO);
        let details = account.details();
        assert_eq!(details.name, AccountDetails::MAIN_NAME);
        assert_eq!(details.title, AccountDetails::MAIN_TITLE);
        assert!(details.visible);
    }

    #[test]
    fn custom_details_builder() {
        let details = AccountDetails::new("repairs")
            .with_description("roof fund")
            .with_visible(false);
        assert_eq!(details.title, "repairs");
        assert_eq!(details.description.as_deref(), Some("roof fund"));
        assert!(!details.visible);
    }

    #[test]
    fn deleted_account_reports_not_found() {
        let account = Account::new_custom(AccountId(2), BuildingId(1), AccountDetails::new("x"));
        account.lock().mark_deleted();
        assert_eq!(
            account.lock().ensure_mutable(AccountId(2)),
            Err(LedgerError::AccountNotFound(AccountId(2)))
        );
    }

    #[test]
    fn inactive_record_restores_read_only() {
        let mut record = Account::new_main(AccountId(1), BuildingId(1)).record();
        record.is_active = false;
        record.balance = dec!(12.50);
        let account = Account::from_record(record);
        assert_eq!(account.status(), AccountStatus::Inactive);
        assert_eq!(account.balance(), dec!(12.50));
        assert_eq!(
            account.lock().ensure_mutable(AccountId(1)),
            Err(LedgerError::AccountInactive(AccountId(1)))
        );
    }

    #[test]
    fn record_round_trips_through_from_record() {
        let account = Account::new_custom(
            AccountId(4),
            BuildingId(2),
            AccountDetails::new("garden").with_description("plants"),
        );
        account.lock().commit_balance(dec!(99.99), Utc::now());
        let record = account.record();
        let restored = Account::from_record(record.clone());
        assert_eq!(restored.record(), record);
    }

    #[test]
    fn try_lock_for_times_out_while_held() {
        let account = Account::new_main(AccountId(1), BuildingId(1));
        let _guard = account.lock();
        assert!(account.try_lock_for(Duration::from_millis(5)).is_none());
    }

    // === Serialization Tests ===

    #[test]
    fn serializer_rounds_to_four_decimal_places() {
        let account = Account::new_main(AccountId(1), BuildingId(1));
        account.lock().commit_balance(dec!(123.456789), Utc::now());

        let json = serde_json::to_string(&account).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["balance"].as_str().unwrap(), "123.4568");
        assert_eq!(parsed["account"], 1);
        assert_eq!(parsed["building"], 1);
        assert_eq!(parsed["main"], true);
        assert_eq!(parsed["active"], true);
    }

    #[test]
    fn serializer_keeps_negative_balances() {
        let account = Account::new_custom(AccountId(2), BuildingId(1), AccountDetails::new("b"));
        account.lock().commit_balance(dec!(-50.00), Utc::now());

        let parsed: serde_json::Value = serde_json::to_value(&account).unwrap();
        assert_eq!(parsed["balance"].as_str().unwrap(), "-50.00");
    }

    #[test]
    fn serializer_uses_bankers_rounding() {
        let account = Account::new_main(AccountId(1), BuildingId(1));
        account.lock().commit_balance(dec!(0.00015), Utc::now());

        let parsed: serde_json::Value = serde_json::to_value(&account).unwrap();
        assert_eq!(parsed["balance"].as_str().unwrap(), "0.0002");
    }
}
