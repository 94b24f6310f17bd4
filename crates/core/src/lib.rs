// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dlock-core: distributed mutexes and semaphores
//!
//! This crate provides:
//! - Single-authority engines for mutexes and counting semaphores
//! - A quorum coordinator for the multi-authority (Redlock) variants
//! - Lock handles with auto-refresh and lost-lock detection
//! - Options loadable from TOML

pub mod clock;
pub mod error;
pub mod options;

// Engines (order matters for dependencies)
pub mod engine;
pub mod mutex;
pub mod semaphore;
pub mod quorum;
pub mod lifecycle;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use engine::{acquire_with_retry, Engine, LockKind};
pub use error::{LockError, LostLockError, ValidationError};
pub use lifecycle::{Lock, LockState};
pub use mutex::{Mutex, MutexEngine};
pub use options::{LockOptions, LostLockHandler};
pub use quorum::{majority, Quorum, QuorumResult, RedlockMutex, RedlockSemaphore};
pub use semaphore::{Semaphore, SemaphoreEngine, SEMAPHORE_PREFIX};

pub use dlock_adapters::{Authority, AuthorityError};
