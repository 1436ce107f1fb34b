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

//! Ledger configuration.

use std::time::Duration;

/// Replay policy for transient storage failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per operation, including the first.
    pub max_attempts: u32,
    /// Base delay; attempt `n` sleeps `backoff * n` before replaying.
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// How long a unit of work waits for a row lock before giving up.
    pub lock_timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(2),
        }
    }
}

/// Main ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub retry: RetryConfig,
    pub storage: StorageConfig,
    /// Amounts with more fractional digits than this are rejected.
    pub max_decimal_places: u32,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            storage: StorageConfig::default(),
            max_decimal_places: 4,
            log_level: "info".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(attempts) = lookup("LEDGER_MAX_ATTEMPTS") {
            if let Ok(attempts) = attempts.parse() {
                config.retry.max_attempts = attempts;
            }
        }

        if let Some(ms) = lookup("LEDGER_RETRY_BACKOFF_MS") {
            if let Ok(ms) = ms.parse() {
                config.retry.backoff = Duration::from_millis(ms);
            }
        }

        if let Some(ms) = lookup("LEDGER_LOCK_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.storage.lock_timeout = Duration::from_millis(ms);
            }
        }

        if let Some(places) = lookup("LEDGER_MAX_DECIMAL_PLACES") {
            if let Ok(places) = places.parse() {
                config.max_decimal_places = places;
            }
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.retry.max_attempts == 0 {
            return Err("Retry attempts must be at least 1".to_string());
        }

        if self.storage.lock_timeout.is_zero() {
            return Err("Lock timeout cannot be 0".to_string());
        }

        // rust_decimal supports at most 28 fractional digits
        if self.max_decimal_places > 28 {
            return Err("Decimal places cannot exceed 28".to_string());
        }

        Ok(())
    }
}
