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

//! Core identifier types for buildings, accounts, and ledger entries.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

identifier!(
    /// Identifier of a building, owned by the building-provisioning side.
    BuildingId
);

identifier!(
    /// Identifier of a cash account ("inventory").
    ///
    /// Allocated by the account store from a sequence starting at 1. The
    /// ordering is used to lock accounts in a fixed order inside a unit of work.
    AccountId
);

identifier!(
    /// Identifier of a ledger entry. Follows commit order.
    EntryId
);

identifier!(
    /// Identifier of an external payment method (cash, bank transfer, ...).
    PaymentMethodId
);

identifier!(
    /// Identity of the user that caused a ledger entry.
    UserId
);
