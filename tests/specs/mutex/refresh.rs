//! Mutex refresh specs
//!
//! Verify auto-refresh keeps a record alive and that only the holder's
//! identifier can extend it.

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test(start_paused = true)]
async fn auto_refresh_outlives_lock_timeout() {
    let authority = node();
    let options = LockOptions::new()
        .with_lock_timeout(ms(300))
        .with_acquire_timeout(ms(100))
        .with_refresh_interval(ms(80));
    let mutex = Mutex::new(authority.clone(), "refreshed", options).unwrap();

    mutex.acquire().await.unwrap();
    sleep_ms(400).await;

    assert_eq!(authority.get("refreshed").as_deref(), Some(mutex.identifier()));
    assert!(mutex.is_acquired());

    mutex.release().await;
    assert_eq!(authority.get("refreshed"), None);
}

#[tokio::test(start_paused = true)]
async fn refresh_with_foreign_identifier_is_refused() {
    let authority = node();
    let owner = Mutex::new(
        authority.clone(),
        "shared",
        LockOptions::new()
            .with_identifier("111")
            .with_lock_timeout(ms(10_000))
            .with_refresh_interval(Duration::ZERO),
    )
    .unwrap();
    owner.acquire().await.unwrap();
    sleep_ms(1_000).await;
    let ttl_before = authority.pttl("shared");

    // A second handle claiming to already hold the key under another identifier
    let intruder = Mutex::new(
        authority.clone(),
        "shared",
        LockOptions::new()
            .with_identifier("222")
            .with_acquired_externally(true)
            .with_refresh_interval(Duration::ZERO),
    )
    .unwrap();
    let err = intruder.acquire().await.unwrap_err();
    assert!(matches!(err, LockError::AcquireTimeout { .. }), "got {err:?}");
    assert_eq!(authority.get("shared").as_deref(), Some("111"));
    assert_eq!(authority.pttl("shared"), ttl_before);

    let err = intruder.refresh().await.unwrap_err();
    assert!(matches!(err, LockError::NotAcquired { .. }), "got {err:?}");

    // The intruder's release is a no-op for the real holder
    intruder.release().await;
    assert_eq!(authority.get("shared").as_deref(), Some("111"));
    owner.release().await;
    assert_eq!(authority.get("shared"), None);
}

#[tokio::test(start_paused = true)]
async fn refresh_calls_carry_the_lock_timeout() {
    let authority = node();
    let options = LockOptions::new()
        .with_identifier("111")
        .with_lock_timeout(ms(300))
        .with_refresh_interval(ms(100));
    let mutex = Mutex::new(authority.clone(), "timed", options).unwrap();

    mutex.acquire().await.unwrap();
    sleep_ms(250).await;
    mutex.release().await;

    let refreshes: Vec<_> = authority
        .calls()
        .into_iter()
        .filter(|c| matches!(c, AuthorityCall::RefreshMutex { .. }))
        .collect();
    assert_eq!(
        refreshes,
        vec![
            AuthorityCall::RefreshMutex {
                key: "timed".to_string(),
                identifier: "111".to_string(),
                lock_timeout_ms: 300,
            };
            2
        ]
    );
}
