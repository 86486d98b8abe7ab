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

//! Ledger entries and the commands that produce them.
//!
//! Every committed [`LedgerCommand`] yields exactly one [`LedgerEntry`]:
//!
//! | Command  | Source   | Destination |
//! |----------|----------|-------------|
//! | Deposit  | -        | account     |
//! | Transfer | from     | to          |
//! | Expense  | account  | -           |
//!
//! Entries are immutable once appended to the ledger log.

use crate::base::{AccountId, EntryId, PaymentMethodId, UserId};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What kind of movement an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Deposit,
    Transfer,
    Expense,
}

/// One immutable row of the ledger log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub kind: EntryKind,
    pub source: Option<AccountId>,
    pub destination: Option<AccountId>,
    pub payment_method: Option<PaymentMethodId>,
    pub amount: Decimal,
    pub description: Option<String>,
    /// Identity of the expense or payment record that caused this entry.
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
}

impl LedgerEntry {
    /// Returns `true` if the entry debits or credits `account`.
    pub fn touches(&self, account: AccountId) -> bool {
        self.source == Some(account) || self.destination == Some(account)
    }

    /// Checks the source/destination shape required by the entry kind.
    pub fn validate_shape(&self) -> Result<(), LedgerError> {
        if self.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let valid = match self.kind {
            EntryKind::Deposit => self.source.is_none() && self.destination.is_some(),
            EntryKind::Expense => self.source.is_some() && self.destination.is_none(),
            EntryKind::Transfer => match (self.source, self.destination) {
                (Some(from), Some(to)) => from != to,
                _ => false,
            },
        };
        if valid {
            Ok(())
        } else {
            Err(LedgerError::InvalidSnapshot(format!(
                "entry {} has an invalid {:?} shape",
                self.id, self.kind
            )))
        }
    }
}

/// A balance-mutating request against the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LedgerCommand {
    Deposit {
        to: AccountId,
        amount: Decimal,
        description: Option<String>,
    },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        description: Option<String>,
    },
    Expense {
        account: AccountId,
        amount: Decimal,
        payment_method: Option<PaymentMethodId>,
        description: Option<String>,
        reference_id: Option<String>,
        /// Lets the debit take the balance below zero.
        allow_negative_balance: bool,
    },
}

impl LedgerCommand {
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Deposit { .. } => EntryKind::Deposit,
            Self::Transfer { .. } => EntryKind::Transfer,
            Self::Expense { .. } => EntryKind::Expense,
        }
    }

    pub fn amount(&self) -> Decimal {
        match self {
            Self::Deposit { amount, .. } => *amount,
            Self::Transfer { amount, .. } => *amount,
            Self::Expense { amount, .. } => *amount,
        }
    }

    /// Checks that need no account state: a positive amount and, for
    /// transfers, two distinct accounts.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.amount() <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if let Self::Transfer { from, to, .. } = self {
            if from == to {
                return Err(LedgerError::SameAccount);
            }
        }
        Ok(())
    }

    /// Accounts the command reads and writes, in lock order.
    pub fn accounts(&self) -> Vec<AccountId> {
        let mut ids = match self {
            Self::Deposit { to, .. } => vec![*to],
            Self::Transfer { from, to, .. } => vec![*from, *to],
            Self::Expense { account, .. } => vec![*account],
        };
        ids.sort();
        ids.dedup();
        ids
    }

    pub(crate) fn source(&self) -> Option<AccountId> {
        match self {
            Self::Deposit { .. } => None,
            Self::Transfer { from, .. } => Some(*from),
            Self::Expense { account, .. } => Some(*account),
        }
    }

    pub(crate) fn destination(&self) -> Option<AccountId> {
        match self {
            Self::Deposit { to, .. } => Some(*to),
            Self::Transfer { to, .. } => Some(*to),
            Self::Expense { .. } => None,
        }
    }

    /// Builds the entry this command commits as.
    pub(crate) fn into_entry(
        self,
        id: EntryId,
        created_at: DateTime<Utc>,
        created_by: Option<UserId>,
    ) -> LedgerEntry {
        let kind = self.kind();
        let source = self.source();
        let destination = self.destination();
        let amount = self.amount();
        let (payment_method, description, reference_id) = match self {
            Self::Deposit { description, .. } | Self::Transfer { description, .. } => {
                (None, description, None)
            }
            Self::Expense {
                payment_method,
                description,
                reference_id,
                ..
            } => (payment_method, description, reference_id),
        };
        LedgerEntry {
            id,
            kind,
            source,
            destination,
            payment_method,
            amount,
            description,
            reference_id,
            created_at,
            created_by,
        }
    }
}

/// An expense debit, as posted by the one-time and recurring expense modules.
///
/// Insufficient funds are rejected unless
/// [`allow_negative_balance`](Self::allow_negative_balance) is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpensePosting {
    account: AccountId,
    amount: Decimal,
    payment_method: Option<PaymentMethodId>,
    description: Option<String>,
    reference_id: Option<String>,
    allow_negative_balance: bool,
}

impl ExpensePosting {
    pub fn new(account: AccountId, amount: Decimal) -> Self {
        Self {
            account,
            amount,
            payment_method: None,
            description: None,
            reference_id: None,
            allow_negative_balance: false,
        }
    }

    pub fn payment_method(mut self, payment_method: PaymentMethodId) -> Self {
        self.payment_method = Some(payment_method);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn allow_negative_balance(mut self, allow: bool) -> Self {
        self.allow_negative_balance = allow;
        self
    }
}

impl From<ExpensePosting> for LedgerCommand {
    fn from(posting: ExpensePosting) -> Self {
        LedgerCommand::Expense {
            account: posting.account,
            amount: posting.amount,
            payment_method: posting.payment_method,
            description: posting.description,
            reference_id: posting.reference_id,
            allow_negative_balance: posting.allow_negative_balance,
        }
    }
}
