// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock handles
//!
//! A [`Lock`] owns one holder identifier and drives an [`Engine`] through
//! acquire, auto-refresh and release:
//!
//! ```text
//! Idle --acquire--> Acquired --release--> Released
//!                       |
//!                       +--refresh failed--> Lost
//! ```
//!
//! `Released` and `Lost` are terminal. Every transition happens under the
//! slot mutex, which is never held across an await. Each transition into
//! `Acquired` or out of it bumps a generation counter; the refresh task only
//! applies its outcome while its generation is current, so a release racing
//! an in-flight refresh always wins.

use crate::clock::{Clock, SystemClock};
use crate::engine::{acquire_with_retry, Engine, LockKind};
use crate::error::{LockError, LostLockError};
use crate::options::LockOptions;
use std::fmt;
use std::sync::{Arc, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Lifecycle state of a lock handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockState {
    Idle,
    Acquired,
    Released,
    Lost,
}

impl LockState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LockState::Released | LockState::Lost)
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LockState::Idle => "idle",
            LockState::Acquired => "acquired",
            LockState::Released => "released",
            LockState::Lost => "lost",
        };
        f.write_str(s)
    }
}

struct Slot {
    state: LockState,
    generation: u64,
    refresh_task: Option<JoinHandle<()>>,
    lost: Option<LostLockError>,
}

struct Shared<E, C> {
    engine: E,
    clock: C,
    identifier: String,
    options: LockOptions,
    slot: std::sync::Mutex<Slot>,
}

impl<E: Engine, C: Clock> Shared<E, C> {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Idle -> Acquired, arming the refresh task
    fn mark_acquired(self: &Arc<Self>) {
        let mut slot = self.slot();
        if slot.state != LockState::Idle {
            return;
        }
        slot.state = LockState::Acquired;
        slot.generation += 1;

        if let Some(period) = self.options.refresh_period() {
            let task = tokio::spawn(refresh_loop(Arc::clone(self), slot.generation, period));
            slot.refresh_task = Some(task);
        }
    }

    /// Acquired -> Lost, unless a release already superseded `generation`
    fn mark_lost(&self, generation: u64, cause: Option<String>) -> Option<LostLockError> {
        let error = {
            let mut slot = self.slot();
            if slot.generation != generation || slot.state != LockState::Acquired {
                return None;
            }
            slot.state = LockState::Lost;
            slot.generation += 1;
            // Detach rather than abort: this may be the refresh task itself
            slot.refresh_task = None;

            let error = LostLockError {
                kind: self.engine.kind(),
                key: self.engine.key().to_string(),
                cause,
            };
            slot.lost = Some(error.clone());
            error
        };

        match &self.options.on_lock_lost {
            Some(handler) => {
                tracing::warn!(
                    kind = %error.kind,
                    key = %error.key,
                    identifier = %self.identifier,
                    cause = ?error.cause,
                    "lock lost"
                );
                handler(error.clone());
            }
            None => tracing::error!(
                kind = %error.kind,
                key = %error.key,
                identifier = %self.identifier,
                cause = ?error.cause,
                "lock lost with no on_lock_lost handler"
            ),
        }
        Some(error)
    }

    fn is_current(&self, generation: u64) -> bool {
        let slot = self.slot();
        slot.generation == generation && slot.state == LockState::Acquired
    }
}

async fn refresh_loop<E: Engine, C: Clock>(
    shared: Arc<Shared<E, C>>,
    generation: u64,
    period: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !shared.is_current(generation) {
            return;
        }

        let outcome = shared
            .engine
            .refresh(&shared.identifier, shared.options.lock_timeout, &shared.clock)
            .await;
        match outcome {
            Ok(true) => tracing::debug!(
                kind = %shared.engine.kind(),
                key = shared.engine.key(),
                identifier = %shared.identifier,
                "refreshed"
            ),
            Ok(false) => {
                shared.mark_lost(generation, None);
                return;
            }
            Err(e) => {
                shared.mark_lost(generation, Some(e.to_string()));
                return;
            }
        }
    }
}

/// A distributed lock handle
///
/// Use the kind-specific constructors: [`crate::Mutex::new`],
/// [`crate::Semaphore::new`], [`crate::RedlockMutex::new`] and
/// [`crate::RedlockSemaphore::new`]. Dropping a handle stops its refresh
/// task but leaves any authority-side record to expire on its own.
pub struct Lock<E: Engine, C: Clock = SystemClock> {
    shared: Arc<Shared<E, C>>,
}

impl<E: Engine, C: Clock> Lock<E, C> {
    /// Wrap a validated engine in a fresh `Idle` handle
    pub fn from_engine(engine: E, options: LockOptions, clock: C) -> Result<Self, LockError> {
        options.validate()?;
        let identifier = options
            .identifier
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(Self {
            shared: Arc::new(Shared {
                engine,
                clock,
                identifier,
                options,
                slot: std::sync::Mutex::new(Slot {
                    state: LockState::Idle,
                    generation: 0,
                    refresh_task: None,
                    lost: None,
                }),
            }),
        })
    }

    pub fn key(&self) -> &str {
        self.shared.engine.key()
    }

    pub fn identifier(&self) -> &str {
        &self.shared.identifier
    }

    pub fn kind(&self) -> LockKind {
        self.shared.engine.kind()
    }

    pub fn engine(&self) -> &E {
        &self.shared.engine
    }

    pub fn state(&self) -> LockState {
        self.shared.slot().state
    }

    pub fn is_acquired(&self) -> bool {
        self.state() == LockState::Acquired
    }

    /// The loss that ended this handle, if any
    pub fn lost_error(&self) -> Option<LostLockError> {
        self.shared.slot().lost.clone()
    }

    /// Acquire, retrying until the acquire timeout or attempt limit
    ///
    /// Succeeds immediately when already acquired. With
    /// `acquired_externally` the handle attaches to the existing record,
    /// refreshing it instead of acquiring.
    pub async fn acquire(&self) -> Result<(), LockError> {
        if self.check_acquirable()? {
            return Ok(());
        }

        let options = &self.shared.options;
        if options.acquired_externally {
            if self.attach().await {
                return Ok(());
            }
            return Err(LockError::AcquireTimeout {
                kind: self.kind(),
                key: self.key().to_string(),
            });
        }

        let acquired = acquire_with_retry(
            &self.shared.engine,
            &self.shared.identifier,
            options,
            &self.shared.clock,
        )
        .await;
        if !acquired {
            return Err(LockError::AcquireTimeout {
                kind: self.kind(),
                key: self.key().to_string(),
            });
        }

        tracing::info!(
            kind = %self.kind(),
            key = self.key(),
            identifier = self.identifier(),
            "acquired"
        );
        self.shared.mark_acquired();
        Ok(())
    }

    /// Single acquire attempt; transport errors read as `false`
    pub async fn try_acquire(&self) -> Result<bool, LockError> {
        if self.check_acquirable()? {
            return Ok(true);
        }

        let options = &self.shared.options;
        if options.acquired_externally {
            return Ok(self.attach().await);
        }

        let deadline = Instant::now() + options.acquire_timeout;
        let outcome = self
            .shared
            .engine
            .try_acquire(
                &self.shared.identifier,
                options.lock_timeout,
                Some(deadline),
                &self.shared.clock,
            )
            .await;
        match outcome {
            Ok(true) => {
                tracing::info!(
                    kind = %self.kind(),
                    key = self.key(),
                    identifier = self.identifier(),
                    "acquired"
                );
                self.shared.mark_acquired();
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                tracing::warn!(
                    kind = %self.kind(),
                    key = self.key(),
                    error = %e,
                    "acquire attempt failed"
                );
                Ok(false)
            }
        }
    }

    /// Refresh once, outside the auto-refresh schedule
    ///
    /// A failed refresh loses the lock exactly as a failed auto-refresh does.
    pub async fn refresh(&self) -> Result<(), LockError> {
        let generation = {
            let slot = self.shared.slot();
            match (slot.state, &slot.lost) {
                (LockState::Acquired, _) => slot.generation,
                (LockState::Lost, Some(lost)) => return Err(LockError::Lost(lost.clone())),
                _ => return Err(self.not_acquired()),
            }
        };

        let outcome = self
            .shared
            .engine
            .refresh(
                &self.shared.identifier,
                self.shared.options.lock_timeout,
                &self.shared.clock,
            )
            .await;
        let cause = match outcome {
            Ok(true) => return Ok(()),
            Ok(false) => None,
            Err(e) => Some(e.to_string()),
        };

        match self.shared.mark_lost(generation, cause) {
            Some(lost) => Err(LockError::Lost(lost)),
            None => Err(self.not_acquired()),
        }
    }

    /// Release the lock
    ///
    /// Does nothing unless acquired. Authority errors are logged, never
    /// returned: the handle is `Released` regardless.
    pub async fn release(&self) {
        {
            let mut slot = self.shared.slot();
            if slot.state != LockState::Acquired {
                return;
            }
            slot.state = LockState::Released;
            slot.generation += 1;
            if let Some(task) = slot.refresh_task.take() {
                task.abort();
            }
        }

        match self.shared.engine.release(&self.shared.identifier).await {
            Ok(removed) => tracing::info!(
                kind = %self.kind(),
                key = self.key(),
                identifier = self.identifier(),
                removed,
                "released"
            ),
            Err(e) => tracing::warn!(
                kind = %self.kind(),
                key = self.key(),
                identifier = self.identifier(),
                error = %e,
                "release failed"
            ),
        }
    }

    /// Take over a record acquired elsewhere by refreshing it once
    async fn attach(&self) -> bool {
        let shared = &self.shared;
        shared.engine.attach();
        let outcome = shared
            .engine
            .refresh(&shared.identifier, shared.options.lock_timeout, &shared.clock)
            .await;
        match outcome {
            Ok(true) => {
                tracing::info!(
                    kind = %self.kind(),
                    key = self.key(),
                    identifier = self.identifier(),
                    "attached to externally acquired lock"
                );
                shared.mark_acquired();
                true
            }
            Ok(false) => {
                tracing::warn!(
                    kind = %self.kind(),
                    key = self.key(),
                    identifier = self.identifier(),
                    "externally acquired lock is not held"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    kind = %self.kind(),
                    key = self.key(),
                    identifier = self.identifier(),
                    error = %e,
                    "attach failed"
                );
                false
            }
        }
    }

    /// `Ok(true)` when already acquired, `Ok(false)` when idle
    fn check_acquirable(&self) -> Result<bool, LockError> {
        match self.state() {
            LockState::Idle => Ok(false),
            LockState::Acquired => Ok(true),
            state => Err(LockError::Terminal {
                kind: self.kind(),
                key: self.key().to_string(),
                state,
            }),
        }
    }

    fn not_acquired(&self) -> LockError {
        LockError::NotAcquired {
            kind: self.kind(),
            key: self.key().to_string(),
        }
    }
}

impl<E: Engine, C: Clock> fmt::Debug for Lock<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("kind", &self.kind())
            .field("key", &self.key())
            .field("identifier", &self.identifier())
            .field("state", &self.state())
            .finish()
    }
}

impl<E: Engine, C: Clock> Drop for Lock<E, C> {
    fn drop(&mut self) {
        let mut slot = self.shared.slot();
        if let Some(task) = slot.refresh_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
