// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server-side scripts for the atomic lock operations
//!
//! Every script returns 1 on success and 0 otherwise. Expired semaphore
//! entries are those scored strictly below `now - lockTimeout`.

/// KEYS[1] = key; ARGV = identifier, lockTimeout, now
pub const MUTEX_ACQUIRE: &str = r#"
local key = KEYS[1]
local identifier = ARGV[1]
local lockTimeout = ARGV[2]
if redis.call('set', key, identifier, 'NX', 'PX', lockTimeout) then
  return 1
end
return 0
"#;

/// KEYS[1] = key; ARGV = identifier, lockTimeout
pub const MUTEX_REFRESH: &str = r#"
local key = KEYS[1]
local identifier = ARGV[1]
local lockTimeout = ARGV[2]
if redis.call('get', key) == identifier then
  redis.call('pexpire', key, lockTimeout)
  return 1
end
return 0
"#;

/// KEYS[1] = key; ARGV = identifier
pub const MUTEX_RELEASE: &str = r#"
local key = KEYS[1]
local identifier = ARGV[1]
if redis.call('get', key) == identifier then
  return redis.call('del', key)
end
return 0
"#;

/// KEYS[1] = key; ARGV = limit, identifier, lockTimeout, now
pub const SEMAPHORE_ACQUIRE: &str = r#"
local key = KEYS[1]
local limit = tonumber(ARGV[1])
local identifier = ARGV[2]
local lockTimeout = tonumber(ARGV[3])
local now = tonumber(ARGV[4])
redis.call('zremrangebyscore', key, '-inf', '(' .. (now - lockTimeout))
if redis.call('zcard', key) < limit then
  redis.call('zadd', key, now, identifier)
  redis.call('pexpire', key, lockTimeout)
  return 1
end
return 0
"#;

/// KEYS[1] = key; ARGV = limit, identifier, lockTimeout, now
pub const SEMAPHORE_REFRESH: &str = r#"
local key = KEYS[1]
local identifier = ARGV[2]
local lockTimeout = tonumber(ARGV[3])
local now = tonumber(ARGV[4])
redis.call('zremrangebyscore', key, '-inf', '(' .. (now - lockTimeout))
if redis.call('zscore', key, identifier) then
  redis.call('zadd', key, now, identifier)
  redis.call('pexpire', key, lockTimeout)
  return 1
end
return 0
"#;

/// KEYS[1] = key; ARGV = identifier
pub const SEMAPHORE_RELEASE: &str = r#"
return redis.call('zrem', KEYS[1], ARGV[1])
"#;
