// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Authority adapters: the atomic key operations every lock engine is built on

pub mod authority;
pub mod traced;

pub use authority::{Authority, AuthorityError};
pub use traced::TracedAuthority;

#[cfg(feature = "redis")]
pub use authority::RedisAuthority;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use authority::{AuthorityCall, FakeAuthority};
