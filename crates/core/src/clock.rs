// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for caller-supplied timestamps
//!
//! Authorities never read their own clock for lock scoring: every timestamp
//! handed to an atomic operation comes from a `Clock`, so tests can pin or
//! skew time per handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A clock that provides the current wall time in milliseconds since the epoch
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> u64;
}

/// Real system clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Fake clock for testing with controllable time
#[derive(Clone, Debug)]
pub struct FakeClock {
    current: Arc<AtomicU64>,
}

impl FakeClock {
    /// Fixed, arbitrary starting point
    pub const EPOCH_MS: u64 = 1_700_000_000_000;

    pub fn new() -> Self {
        Self::at(Self::EPOCH_MS)
    }

    /// Start at a specific timestamp
    pub fn at(now_ms: u64) -> Self {
        Self {
            current: Arc::new(AtomicU64::new(now_ms)),
        }
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        self.current
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    /// Set the clock to a specific timestamp
    pub fn set(&self, now_ms: u64) {
        self.current.store(now_ms, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
