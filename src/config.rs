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

//! Engine configuration and the caller-side retry helper.

use crate::error::LedgerError;
use crossbeam::utils::Backoff;
use std::time::Duration;
use tracing::debug;

/// Tunables for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long a unit of work waits for each account row lock before
    /// failing with [`LedgerError::Busy`].
    pub lock_timeout: Duration,
    /// Page size used by history queries that do not set one.
    pub default_page_size: usize,
}

impl EngineConfig {
    pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(250);
    pub const DEFAULT_PAGE_SIZE: usize = 20;
    pub const MAX_PAGE_SIZE: usize = 100;

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn with_default_page_size(mut self, page_size: usize) -> Self {
        self.default_page_size = page_size.clamp(1, Self::MAX_PAGE_SIZE);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Self::DEFAULT_LOCK_TIMEOUT,
            default_page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

/// Bounded retry for lock contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves like one.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Runs `op`, retrying with backoff while it fails with [`LedgerError::Busy`].
///
/// Any other error, or the last `Busy`, is returned as is.
///
/// # Example
///
/// ```
/// use building_ledger::{retry_on_busy, BuildingId, Engine, RetryPolicy};
/// use rust_decimal_macros::dec;
///
/// let engine = Engine::new();
/// let main = engine.ensure_main_account(BuildingId(1));
/// let entry = retry_on_busy(RetryPolicy::default(), || {
///     engine.deposit(main.id(), dec!(10.00), None, None)
/// })
/// .unwrap();
/// assert_eq!(entry.amount, dec!(10.00));
/// ```
pub fn retry_on_busy<T, F>(policy: RetryPolicy, mut op: F) -> Result<T, LedgerError>
where
    F: FnMut() -> Result<T, LedgerError>,
{
    let backoff = Backoff::new();
    let mut attempt = 1;
    loop {
        match op() {
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                debug!(attempt, error = %err, "retrying after lock contention");
                attempt += 1;
                backoff.snooze();
            }
            result => return result,
        }
    }
}
