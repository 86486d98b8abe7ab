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

//! # Building Ledger
//!
//! This library tracks the cash accounts ("inventories") of a property
//! management back office. Every building has one main account and any number
//! of custom accounts; money moves between them through deposits, transfers,
//! and expense postings, each recorded as one immutable ledger entry.
//!
//! ## Core Components
//!
//! - [`Engine`]: Owns accounts and the ledger log; the only writer of balances
//! - [`UnitOfWork`]: Explicit atomicity boundary for one or more commands
//! - [`Account`]: Building-scoped cash account behind a row lock
//! - [`LedgerEntry`]: Immutable record of one balance-affecting event
//! - [`Reports`]: Read-only building totals, account history, and statistics
//! - [`LedgerError`]: Error types for ledger operations
//!
//! ## Example
//!
//! ```
//! use building_ledger::{AccountDetails, BuildingId, Engine, ExpensePosting, LedgerError};
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new();
//!
//! // Building provisioning creates the main account
//! let main = engine.ensure_main_account(BuildingId(1));
//! engine.deposit(main.id(), dec!(500.00), None, None).unwrap();
//!
//! // Custom accounts are sub-ledgers of a provisioned building
//! let repairs = engine
//!     .create_custom_account(BuildingId(1), AccountDetails::new("repairs"), None, None)
//!     .unwrap();
//!
//! engine.transfer(main.id(), repairs.id(), dec!(200.00), None, None).unwrap();
//! assert_eq!(main.balance(), dec!(300.00));
//! assert_eq!(repairs.balance(), dec!(200.00));
//!
//! let result = engine.post_expense(ExpensePosting::new(repairs.id(), dec!(250.00)), None);
//! assert_eq!(result.unwrap_err(), LedgerError::InsufficientFunds);
//! ```
//!
//! ## Thread Safety
//!
//! Accounts are locked per row, in id order, for the duration of a unit of
//! work. Operations on different accounts run in parallel; operations on the
//! same account serialize.

pub mod account;
mod base;
mod config;
mod engine;
pub mod entry;
pub mod error;
mod ledger_log;
mod lifecycle;
mod reporting;
mod snapshot;
mod store;
mod unit_of_work;

pub use account::{Account, AccountDetails, AccountRecord, AccountStatus};
pub use base::{AccountId, BuildingId, EntryId, PaymentMethodId, UserId};
pub use config::{EngineConfig, RetryPolicy, retry_on_busy};
pub use engine::Engine;
pub use entry::{EntryKind, ExpensePosting, LedgerCommand, LedgerEntry};
pub use error::LedgerError;
pub use lifecycle::AccountDetailsUpdate;
pub use reporting::{
    BuildingSummary, HistoryQuery, Page, Reports, SortOrder, TransactionStatistics,
};
pub use snapshot::Snapshot;
pub use unit_of_work::UnitOfWork;
