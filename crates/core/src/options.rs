// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock options
//!
//! Options can be built in code or loaded from TOML with human-readable
//! durations:
//!
//! ```toml
//! lock_timeout = "300ms"
//! acquire_timeout = "100ms"
//! refresh_interval = "80ms"
//! retry_interval = "10ms"
//! ```

use crate::error::{LockError, LostLockError, ValidationError};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked once when a held lock is lost
pub type LostLockHandler = Arc<dyn Fn(LostLockError) + Send + Sync>;

/// Options shared by every lock kind
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockOptions {
    /// Holder identifier; a random one is minted when absent
    pub identifier: Option<String>,
    /// TTL of the authority-side record
    #[serde(with = "humantime_serde")]
    pub lock_timeout: Duration,
    /// Give up acquiring after this long
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
    /// Give up acquiring after this many attempts (unbounded when `None`)
    pub acquire_attempts_limit: Option<u32>,
    /// Pause between acquire attempts
    #[serde(with = "humantime_serde")]
    pub retry_interval: Duration,
    /// Auto-refresh period; half the lock timeout when `None`, disabled when zero
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Option<Duration>,
    /// The record was created by another handle sharing `identifier`
    pub acquired_externally: bool,
    #[serde(skip)]
    pub on_lock_lost: Option<LostLockHandler>,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            identifier: None,
            lock_timeout: Duration::from_secs(10),
            acquire_timeout: Duration::from_secs(10),
            acquire_attempts_limit: None,
            retry_interval: Duration::from_millis(10),
            refresh_interval: None,
            acquired_externally: false,
            on_lock_lost: None,
        }
    }
}

impl std::fmt::Debug for LockOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockOptions")
            .field("identifier", &self.identifier)
            .field("lock_timeout", &self.lock_timeout)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("acquire_attempts_limit", &self.acquire_attempts_limit)
            .field("retry_interval", &self.retry_interval)
            .field("refresh_interval", &self.refresh_interval)
            .field("acquired_externally", &self.acquired_externally)
            .field("on_lock_lost", &self.on_lock_lost.is_some())
            .finish()
    }
}

impl LockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a TOML document
    pub fn from_toml(source: &str) -> Result<Self, LockError> {
        Ok(toml::from_str(source)?)
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_acquire_attempts_limit(mut self, limit: u32) -> Self {
        self.acquire_attempts_limit = Some(limit);
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Zero disables auto-refresh
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    pub fn with_acquired_externally(mut self, external: bool) -> Self {
        self.acquired_externally = external;
        self
    }

    pub fn on_lock_lost(mut self, handler: impl Fn(LostLockError) + Send + Sync + 'static) -> Self {
        self.on_lock_lost = Some(Arc::new(handler));
        self
    }

    /// Effective auto-refresh period, `None` when disabled
    pub fn refresh_period(&self) -> Option<Duration> {
        match self.refresh_interval {
            None => Some(self.lock_timeout / 2),
            Some(interval) if interval.is_zero() => None,
            Some(interval) => Some(interval),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.lock_timeout.as_millis() == 0 {
            return Err(ValidationError::ZeroLockTimeout);
        }
        match self.identifier.as_deref() {
            Some("") => Err(ValidationError::EmptyIdentifier),
            None if self.acquired_externally => Err(ValidationError::MissingExternalIdentifier),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
