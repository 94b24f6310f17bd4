// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake authority for testing
//!
//! Holds records in process memory behind one mutex, so every operation is
//! atomic exactly like a server-side script. TTLs run on the tokio clock,
//! which lets paused-time tests observe expiry deterministically.
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Authority, AuthorityError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Recorded authority call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityCall {
    AcquireMutex {
        key: String,
        identifier: String,
        lock_timeout_ms: u64,
        now_ms: u64,
    },
    RefreshMutex {
        key: String,
        identifier: String,
        lock_timeout_ms: u64,
    },
    ReleaseMutex {
        key: String,
        identifier: String,
    },
    AcquireSemaphore {
        key: String,
        limit: u32,
        identifier: String,
        lock_timeout_ms: u64,
        now_ms: u64,
    },
    RefreshSemaphore {
        key: String,
        limit: u32,
        identifier: String,
        lock_timeout_ms: u64,
        now_ms: u64,
    },
    ReleaseSemaphore {
        key: String,
        identifier: String,
    },
}

impl AuthorityCall {
    pub fn is_release(&self) -> bool {
        matches!(
            self,
            AuthorityCall::ReleaseMutex { .. } | AuthorityCall::ReleaseSemaphore { .. }
        )
    }
}

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    /// member -> score
    Sorted(BTreeMap<String, u64>),
}

#[derive(Debug, Clone)]
struct Record {
    value: Value,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct Store {
    records: HashMap<String, Record>,
}

impl Store {
    fn purge_expired(&mut self, key: &str) {
        let now = Instant::now();
        let expired = self
            .records
            .get(key)
            .is_some_and(|r| r.expires_at.is_some_and(|at| at <= now));
        if expired {
            self.records.remove(key);
        }
    }

    fn live(&mut self, key: &str) -> Option<&mut Record> {
        self.purge_expired(key);
        self.records.get_mut(key)
    }

    fn text(&mut self, key: &str) -> Option<&mut Record> {
        self.live(key)
            .filter(|record| matches!(record.value, Value::Text(_)))
    }

    /// Sorted entries for `key`, creating an empty collection when absent
    fn sorted(
        &mut self,
        authority: &str,
        key: &str,
    ) -> Result<(&mut BTreeMap<String, u64>, &mut Option<Instant>), AuthorityError> {
        self.purge_expired(key);
        let record = self.records.entry(key.to_string()).or_insert_with(|| Record {
            value: Value::Sorted(BTreeMap::new()),
            expires_at: None,
        });
        match &mut record.value {
            Value::Sorted(entries) => Ok((entries, &mut record.expires_at)),
            Value::Text(_) => Err(AuthorityError::WrongType {
                authority: authority.to_string(),
                key: key.to_string(),
            }),
        }
    }

    /// Empty collections disappear, like they do on a real server
    fn drop_if_empty(&mut self, key: &str) {
        let empty = self
            .records
            .get(key)
            .is_some_and(|r| matches!(&r.value, Value::Sorted(entries) if entries.is_empty()));
        if empty {
            self.records.remove(key);
        }
    }

    fn acquire_mutex(&mut self, key: &str, identifier: &str, ttl: Duration) -> bool {
        if self.live(key).is_some() {
            return false;
        }
        self.records.insert(
            key.to_string(),
            Record {
                value: Value::Text(identifier.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        true
    }

    fn refresh_mutex(&mut self, key: &str, identifier: &str, ttl: Duration) -> bool {
        match self.text(key) {
            Some(record) if matches!(&record.value, Value::Text(v) if v == identifier) => {
                record.expires_at = Some(Instant::now() + ttl);
                true
            }
            _ => false,
        }
    }

    fn release_mutex(&mut self, key: &str, identifier: &str) -> bool {
        let owned = self
            .text(key)
            .is_some_and(|record| matches!(&record.value, Value::Text(v) if v == identifier));
        if owned {
            self.records.remove(key);
        }
        owned
    }

    fn acquire_semaphore(
        &mut self,
        authority: &str,
        key: &str,
        limit: u32,
        identifier: &str,
        lock_timeout_ms: u64,
        now_ms: u64,
    ) -> Result<bool, AuthorityError> {
        let (entries, expires_at) = self.sorted(authority, key)?;
        let cutoff = now_ms.saturating_sub(lock_timeout_ms);
        entries.retain(|_, score| *score >= cutoff);

        let acquired = entries.len() < limit as usize;
        if acquired {
            entries.insert(identifier.to_string(), now_ms);
            *expires_at = Some(Instant::now() + Duration::from_millis(lock_timeout_ms));
        }
        self.drop_if_empty(key);
        Ok(acquired)
    }

    fn refresh_semaphore(
        &mut self,
        authority: &str,
        key: &str,
        identifier: &str,
        lock_timeout_ms: u64,
        now_ms: u64,
    ) -> Result<bool, AuthorityError> {
        let (entries, expires_at) = self.sorted(authority, key)?;
        let cutoff = now_ms.saturating_sub(lock_timeout_ms);
        entries.retain(|_, score| *score >= cutoff);

        let renewed = match entries.get_mut(identifier) {
            Some(score) => {
                *score = now_ms;
                *expires_at = Some(Instant::now() + Duration::from_millis(lock_timeout_ms));
                true
            }
            None => false,
        };
        self.drop_if_empty(key);
        Ok(renewed)
    }

    fn release_semaphore(
        &mut self,
        authority: &str,
        key: &str,
        identifier: &str,
    ) -> Result<bool, AuthorityError> {
        let (entries, _) = self.sorted(authority, key)?;
        let removed = entries.remove(identifier).is_some();
        self.drop_if_empty(key);
        Ok(removed)
    }
}

/// Fake authority for testing
#[derive(Clone)]
pub struct FakeAuthority {
    name: String,
    store: Arc<Mutex<Store>>,
    calls: Arc<Mutex<Vec<AuthorityCall>>>,
    unreachable: Arc<AtomicBool>,
    latency: Arc<Mutex<Duration>>,
}

impl Default for FakeAuthority {
    fn default() -> Self {
        Self::new("fake")
    }
}

impl FakeAuthority {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store: Arc::new(Mutex::new(Store::default())),
            calls: Arc::new(Mutex::new(Vec::new())),
            unreachable: Arc::new(AtomicBool::new(false)),
            latency: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Make every subsequent lock operation fail with `Unreachable`
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Delay every subsequent lock operation by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<AuthorityCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// String value bound to `key`
    pub fn get(&self, key: &str) -> Option<String> {
        match self.store().live(key) {
            Some(Record {
                value: Value::Text(v),
                ..
            }) => Some(v.clone()),
            _ => None,
        }
    }

    /// Remaining TTL of `key`; `None` when absent or persistent
    pub fn pttl(&self, key: &str) -> Option<Duration> {
        let mut store = self.store();
        let at = store.live(key)?.expires_at?;
        Some(at.saturating_duration_since(Instant::now()))
    }

    /// Overwrite `key` with a string value, as a third party would
    pub fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        self.store().records.insert(
            key.to_string(),
            Record {
                value: Value::Text(value.to_string()),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
    }

    pub fn delete(&self, key: &str) -> bool {
        let mut store = self.store();
        store.purge_expired(key);
        store.records.remove(key).is_some()
    }

    /// Add a scored member to the collection at `key`
    pub fn add_member(&self, key: &str, member: &str, score: u64) {
        let mut store = self.store();
        if let Ok((entries, _)) = store.sorted(&self.name, key) {
            entries.insert(member.to_string(), score);
        }
    }

    /// Members at `key`, least recently renewed first
    pub fn members(&self, key: &str) -> Vec<String> {
        let mut store = self.store();
        let Some(Record {
            value: Value::Sorted(entries),
            ..
        }) = store.live(key)
        else {
            return Vec::new();
        };
        let mut ordered: Vec<(u64, String)> =
            entries.iter().map(|(m, s)| (*s, m.clone())).collect();
        ordered.sort();
        ordered.into_iter().map(|(_, m)| m).collect()
    }

    pub fn cardinality(&self, key: &str) -> usize {
        match self.store().live(key) {
            Some(Record {
                value: Value::Sorted(entries),
                ..
            }) => entries.len(),
            _ => 0,
        }
    }

    pub fn score(&self, key: &str, member: &str) -> Option<u64> {
        match self.store().live(key) {
            Some(Record {
                value: Value::Sorted(entries),
                ..
            }) => entries.get(member).copied(),
            _ => None,
        }
    }

    fn store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn enter(&self, call: AuthorityCall) -> Result<(), AuthorityError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);

        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(AuthorityError::Unreachable(self.name.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl Authority for FakeAuthority {
    fn name(&self) -> &str {
        &self.name
    }

    async fn acquire_mutex(
        &self,
        key: &str,
        identifier: &str,
        lock_timeout_ms: u64,
        now_ms: u64,
    ) -> Result<bool, AuthorityError> {
        self.enter(AuthorityCall::AcquireMutex {
            key: key.to_string(),
            identifier: identifier.to_string(),
            lock_timeout_ms,
            now_ms,
        })
        .await?;

        let ttl = Duration::from_millis(lock_timeout_ms);
        Ok(self.store().acquire_mutex(key, identifier, ttl))
    }

    async fn refresh_mutex(
        &self,
        key: &str,
        identifier: &str,
        lock_timeout_ms: u64,
    ) -> Result<bool, AuthorityError> {
        self.enter(AuthorityCall::RefreshMutex {
            key: key.to_string(),
            identifier: identifier.to_string(),
            lock_timeout_ms,
        })
        .await?;

        let ttl = Duration::from_millis(lock_timeout_ms);
        Ok(self.store().refresh_mutex(key, identifier, ttl))
    }

    async fn release_mutex(&self, key: &str, identifier: &str) -> Result<bool, AuthorityError> {
        self.enter(AuthorityCall::ReleaseMutex {
            key: key.to_string(),
            identifier: identifier.to_string(),
        })
        .await?;

        Ok(self.store().release_mutex(key, identifier))
    }

    async fn acquire_semaphore(
        &self,
        key: &str,
        limit: u32,
        identifier: &str,
        lock_timeout_ms: u64,
        now_ms: u64,
    ) -> Result<bool, AuthorityError> {
        self.enter(AuthorityCall::AcquireSemaphore {
            key: key.to_string(),
            limit,
            identifier: identifier.to_string(),
            lock_timeout_ms,
            now_ms,
        })
        .await?;

        self.store()
            .acquire_semaphore(&self.name, key, limit, identifier, lock_timeout_ms, now_ms)
    }

    async fn refresh_semaphore(
        &self,
        key: &str,
        limit: u32,
        identifier: &str,
        lock_timeout_ms: u64,
        now_ms: u64,
    ) -> Result<bool, AuthorityError> {
        self.enter(AuthorityCall::RefreshSemaphore {
            key: key.to_string(),
            limit,
            identifier: identifier.to_string(),
            lock_timeout_ms,
            now_ms,
        })
        .await?;

        self.store()
            .refresh_semaphore(&self.name, key, identifier, lock_timeout_ms, now_ms)
    }

    async fn release_semaphore(
        &self,
        key: &str,
        identifier: &str,
    ) -> Result<bool, AuthorityError> {
        self.enter(AuthorityCall::ReleaseSemaphore {
            key: key.to_string(),
            identifier: identifier.to_string(),
        })
        .await?;

        self.store().release_semaphore(&self.name, key, identifier)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
