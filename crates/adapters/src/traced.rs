// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced authority wrapper for consistent observability

use crate::authority::{Authority, AuthorityError};
use async_trait::async_trait;
use tracing::Instrument;

/// Wrapper that adds tracing to any Authority
#[derive(Clone)]
pub struct TracedAuthority<A> {
    inner: A,
}

impl<A> TracedAuthority<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

fn log_outcome(result: &Result<bool, AuthorityError>, elapsed: std::time::Duration) {
    let elapsed_ms = elapsed.as_millis() as u64;
    match result {
        Ok(true) => tracing::debug!(elapsed_ms, "granted"),
        Ok(false) => tracing::debug!(elapsed_ms, "refused"),
        Err(e) => tracing::warn!(elapsed_ms, error = %e, "failed"),
    }
}

#[async_trait]
impl<A: Authority> Authority for TracedAuthority<A> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn acquire_mutex(
        &self,
        key: &str,
        identifier: &str,
        lock_timeout_ms: u64,
        now_ms: u64,
    ) -> Result<bool, AuthorityError> {
        let span = tracing::debug_span!(
            "authority.acquire_mutex",
            authority = self.inner.name(),
            key,
            identifier,
            lock_timeout_ms,
            now_ms
        );
        async {
            let start = std::time::Instant::now();
            let result = self
                .inner
                .acquire_mutex(key, identifier, lock_timeout_ms, now_ms)
                .await;
            log_outcome(&result, start.elapsed());
            result
        }
        .instrument(span)
        .await
    }

    async fn refresh_mutex(
        &self,
        key: &str,
        identifier: &str,
        lock_timeout_ms: u64,
    ) -> Result<bool, AuthorityError> {
        let span = tracing::debug_span!(
            "authority.refresh_mutex",
            authority = self.inner.name(),
            key,
            identifier,
            lock_timeout_ms
        );
        async {
            let start = std::time::Instant::now();
            let result = self
                .inner
                .refresh_mutex(key, identifier, lock_timeout_ms)
                .await;
            log_outcome(&result, start.elapsed());
            result
        }
        .instrument(span)
        .await
    }

    async fn release_mutex(&self, key: &str, identifier: &str) -> Result<bool, AuthorityError> {
        let span = tracing::debug_span!(
            "authority.release_mutex",
            authority = self.inner.name(),
            key,
            identifier
        );
        async {
            let result = self.inner.release_mutex(key, identifier).await;
            // Releasing an already expired record is routine
            match &result {
                Ok(released) => tracing::debug!(released, "release finished"),
                Err(e) => tracing::warn!(error = %e, "release failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn acquire_semaphore(
        &self,
        key: &str,
        limit: u32,
        identifier: &str,
        lock_timeout_ms: u64,
        now_ms: u64,
    ) -> Result<bool, AuthorityError> {
        let span = tracing::debug_span!(
            "authority.acquire_semaphore",
            authority = self.inner.name(),
            key,
            limit,
            identifier,
            lock_timeout_ms,
            now_ms
        );
        async {
            let start = std::time::Instant::now();
            let result = self
                .inner
                .acquire_semaphore(key, limit, identifier, lock_timeout_ms, now_ms)
                .await;
            log_outcome(&result, start.elapsed());
            result
        }
        .instrument(span)
        .await
    }

    async fn refresh_semaphore(
        &self,
        key: &str,
        limit: u32,
        identifier: &str,
        lock_timeout_ms: u64,
        now_ms: u64,
    ) -> Result<bool, AuthorityError> {
        let span = tracing::debug_span!(
            "authority.refresh_semaphore",
            authority = self.inner.name(),
            key,
            limit,
            identifier,
            now_ms
        );
        async {
            let start = std::time::Instant::now();
            let result = self
                .inner
                .refresh_semaphore(key, limit, identifier, lock_timeout_ms, now_ms)
                .await;
            log_outcome(&result, start.elapsed());
            result
        }
        .instrument(span)
        .await
    }

    async fn release_semaphore(
        &self,
        key: &str,
        identifier: &str,
    ) -> Result<bool, AuthorityError> {
        let span = tracing::debug_span!(
            "authority.release_semaphore",
            authority = self.inner.name(),
            key,
            identifier
        );
        async {
            let result = self.inner.release_semaphore(key, identifier).await;
            match &result {
                Ok(released) => tracing::debug!(released, "release finished"),
                Err(e) => tracing::warn!(error = %e, "release failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
