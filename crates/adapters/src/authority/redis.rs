// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis authority
//!
//! Runs each lock operation as a Lua script (`EVALSHA`, falling back to
//! `EVAL` when the script cache is cold) over any async connection. Every
//! script touches a single key, so a Redis Cluster connection works as well
//! as a standalone one. Connection setup and reconnection policy belong to
//! the caller.

use super::scripts;
use super::{Authority, AuthorityError};
use ::redis::aio::{ConnectionLike, ConnectionManager};
use ::redis::{IntoConnectionInfo, Script};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

struct Scripts {
    mutex_acquire: Script,
    mutex_refresh: Script,
    mutex_release: Script,
    semaphore_acquire: Script,
    semaphore_refresh: Script,
    semaphore_release: Script,
}

impl Scripts {
    fn load() -> Self {
        Self {
            mutex_acquire: Script::new(scripts::MUTEX_ACQUIRE),
            mutex_refresh: Script::new(scripts::MUTEX_REFRESH),
            mutex_release: Script::new(scripts::MUTEX_RELEASE),
            semaphore_acquire: Script::new(scripts::SEMAPHORE_ACQUIRE),
            semaphore_refresh: Script::new(scripts::SEMAPHORE_REFRESH),
            semaphore_release: Script::new(scripts::SEMAPHORE_RELEASE),
        }
    }
}

/// Authority backed by one Redis deployment
///
/// `C` is the connection type: a [`ConnectionManager`] for a standalone
/// server, or a cluster connection with the `redis-cluster` feature.
#[derive(Clone)]
pub struct RedisAuthority<C = ConnectionManager> {
    name: String,
    conn: C,
    scripts: Arc<Scripts>,
}

/// `host:port` of a connection URL, leaving out any credentials
fn display_addr(url: &str) -> Result<String, AuthorityError> {
    Ok(url.into_connection_info()?.addr.to_string())
}

impl RedisAuthority<ConnectionManager> {
    /// Open a managed connection to `url`
    pub async fn connect(url: &str) -> Result<Self, AuthorityError> {
        let name = display_addr(url)?;
        let client = ::redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(name, conn))
    }
}

#[cfg(feature = "redis-cluster")]
impl RedisAuthority<::redis::cluster_async::ClusterConnection> {
    /// Open a cluster connection seeded from `nodes`
    pub async fn connect_cluster(nodes: &[&str]) -> Result<Self, AuthorityError> {
        let name = nodes
            .iter()
            .map(|url| display_addr(url))
            .collect::<Result<Vec<_>, _>>()?
            .join(",");
        let client = ::redis::cluster::ClusterClient::new(nodes.to_vec())?;
        let conn = client.get_async_connection().await?;
        Ok(Self::new(name, conn))
    }
}

impl<C> RedisAuthority<C>
where
    C: ConnectionLike + Clone + Send + Sync + 'static,
{
    /// Wrap an existing connection
    pub fn new(name: impl Into<String>, conn: C) -> Self {
        Self {
            name: name.into(),
            conn,
            scripts: Arc::new(Scripts::load()),
        }
    }

    async fn run(
        &self,
        script: &Script,
        key: &str,
        args: &[String],
    ) -> Result<bool, AuthorityError> {
        let mut invocation = script.prepare_invoke();
        invocation.key(key);
        for arg in args {
            invocation.arg(arg);
        }

        let mut conn = self.conn.clone();
        let reply: i64 = invocation.invoke_async(&mut conn).await?;
        match reply {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(AuthorityError::UnexpectedReply {
                authority: self.name.clone(),
                reply: other.to_string(),
            }),
        }
    }

    /// String value bound to `key`
    pub async fn get(&self, key: &str) -> Result<Option<String>, AuthorityError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = ::redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    /// Remaining TTL of `key`; `None` when absent or persistent
    pub async fn pttl(&self, key: &str) -> Result<Option<Duration>, AuthorityError> {
        let mut conn = self.conn.clone();
        let ttl: i64 = ::redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;
        Ok(u64::try_from(ttl).ok().map(Duration::from_millis))
    }

    /// Overwrite `key` with a string value
    pub async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), AuthorityError> {
        let mut conn = self.conn.clone();
        let mut cmd = ::redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis() as u64);
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<bool, AuthorityError> {
        let mut conn = self.conn.clone();
        let removed: i64 = ::redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    /// Add a scored member to the collection at `key`
    pub async fn add_member(&self, key: &str, member: &str, score: u64) -> Result<(), AuthorityError> {
        let mut conn = self.conn.clone();
        let _: i64 = ::redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Members at `key`, least recently renewed first
    pub async fn members(&self, key: &str) -> Result<Vec<String>, AuthorityError> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = ::redis::cmd("ZRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;
        Ok(members)
    }

    pub async fn cardinality(&self, key: &str) -> Result<usize, AuthorityError> {
        let mut conn = self.conn.clone();
        let count: usize = ::redis::cmd("ZCARD").arg(key).query_async(&mut conn).await?;
        Ok(count)
    }

    pub async fn score(&self, key: &str, member: &str) -> Result<Option<u64>, AuthorityError> {
        let mut conn = self.conn.clone();
        let score: Option<f64> = ::redis::cmd("ZSCORE")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(score.map(|s| s as u64))
    }
}

#[async_trait]
impl<C> Authority for RedisAuthority<C>
where
    C: ConnectionLike + Clone + Send + Sync + 'static,
{
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
        let args = [
            identifier.to_string(),
            lock_timeout_ms.to_string(),
            now_ms.to_string(),
        ];
        self.run(&self.scripts.mutex_acquire, key, &args).await
    }

    async fn refresh_mutex(
        &self,
        key: &str,
        identifier: &str,
        lock_timeout_ms: u64,
    ) -> Result<bool, AuthorityError> {
        let args = [identifier.to_string(), lock_timeout_ms.to_string()];
        self.run(&self.scripts.mutex_refresh, key, &args).await
    }

    async fn release_mutex(&self, key: &str, identifier: &str) -> Result<bool, AuthorityError> {
        let args = [identifier.to_string()];
        self.run(&self.scripts.mutex_release, key, &args).await
    }

    async fn acquire_semaphore(
        &self,
        key: &str,
        limit: u32,
        identifier: &str,
        lock_timeout_ms: u64,
        now_ms: u64,
    ) -> Result<bool, AuthorityError> {
        let args = [
            limit.to_string(),
            identifier.to_string(),
            lock_timeout_ms.to_string(),
            now_ms.to_string(),
        ];
        self.run(&self.scripts.semaphore_acquire, key, &args).await
    }

    async fn refresh_semaphore(
        &self,
        key: &str,
        limit: u32,
        identifier: &str,
        lock_timeout_ms: u64,
        now_ms: u64,
    ) -> Result<bool, AuthorityError> {
        let args = [
            limit.to_string(),
            identifier.to_string(),
            lock_timeout_ms.to_string(),
            now_ms.to_string(),
        ];
        self.run(&self.scripts.semaphore_refresh, key, &args).await
    }

    async fn release_semaphore(
        &self,
        key: &str,
        identifier: &str,
    ) -> Result<bool, AuthorityError> {
        let args = [identifier.to_string()];
        self.run(&self.scripts.semaphore_release, key, &args).await
    }
}

#[cfg(test)]
#[path = "redis_tests.rs"]
mod tests;
