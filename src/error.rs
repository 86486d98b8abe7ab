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

//! Error types for ledger operations.

use crate::base::{AccountId, BuildingId, EntryId};
use thiserror::Error;

/// Ledger operation errors.
///
/// Every variant is scoped to the single requested operation. Validation
/// failures are raised before any balance is touched, so an error always
/// means nothing was persisted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Referenced account does not exist (or was deleted)
    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    /// Referenced ledger entry does not exist
    #[error("ledger entry {0} not found")]
    EntryNotFound(EntryId),

    /// Building has no accounts at all
    #[error("building {0} has no accounts")]
    BuildingNotFound(BuildingId),

    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Transfer source and destination are the same account
    #[error("cannot transfer to the same account")]
    SameAccount,

    /// Transfer between accounts of different buildings
    #[error("accounts belong to different buildings")]
    CrossBuildingTransfer,

    /// Debit would take the balance below zero
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Custom account requested before the building's main account exists
    #[error("building {0} has no main account")]
    PreconditionFailed(BuildingId),

    /// Account row lock could not be acquired within the configured timeout
    #[error("account {0} is busy")]
    Busy(AccountId),

    /// Operation not allowed on a main account
    #[error("main account {0} cannot be deleted or renamed")]
    MainAccountProtected(AccountId),

    /// Account is inactive and accepts no mutations
    #[error("account {0} is inactive")]
    AccountInactive(AccountId),

    /// Command touched an account the unit of work did not lock
    #[error("account {0} is not part of this unit of work")]
    AccountNotLocked(AccountId),

    /// Unit of work committed without recording anything
    #[error("unit of work recorded no ledger entries")]
    EmptyUnit,

    /// Persisted state failed validation on restore
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

impl LedgerError {
    /// Returns `true` for transient lock contention.
    ///
    /// Business-rule failures are final; only [`LedgerError::Busy`] is worth
    /// retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}
