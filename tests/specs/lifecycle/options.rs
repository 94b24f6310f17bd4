//! Options specs
//!
//! Verify options loaded from TOML drive handle behavior, and invalid
//! construction fails before any authority call.

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test(start_paused = true)]
async fn toml_options_drive_refresh_schedule() {
    let authority = node();
    let options = LockOptions::from_toml(
        r#"
        identifier = "from-config"
        lock_timeout = "300ms"
        acquire_timeout = "100ms"
        refresh_interval = "80ms"
        "#,
    )
    .unwrap();
    let mutex = Mutex::new(authority.clone(), "configured", options).unwrap();

    mutex.acquire().await.unwrap();
    sleep_ms(400).await;

    assert_eq!(mutex.identifier(), "from-config");
    assert_eq!(authority.get("configured").as_deref(), Some("from-config"));
    mutex.release().await;
}

#[tokio::test(start_paused = true)]
async fn attempts_limit_bounds_the_retry_loop() {
    let authority = node();
    authority.set("busy", "someone-else", None);
    let options = LockOptions::new().with_acquire_attempts_limit(3);
    let mutex = Mutex::new(authority.clone(), "busy", options).unwrap();

    let err = mutex.acquire().await.unwrap_err();

    assert_eq!(err.to_string(), "Acquire mutex busy timeout");
    assert_eq!(authority.calls().len(), 3);
}

#[test]
fn invalid_construction_makes_no_calls() {
    let authority = node();

    let err = Semaphore::new(authority.clone(), "pool", 0, LockOptions::default()).unwrap_err();
    assert_eq!(err.to_string(), "invalid lock: \"limit\" must be at least 1");

    let err = Mutex::new(authority.clone(), "", LockOptions::default()).unwrap_err();
    assert_eq!(err.to_string(), "invalid lock: \"key\" is required");

    let err = RedlockMutex::new(Vec::<FakeAuthority>::new(), "key", LockOptions::default())
        .unwrap_err();
    assert_eq!(err.to_string(), "invalid lock: at least one authority is required");

    assert!(authority.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn externally_acquired_handle_takes_over_refresh() {
    let authority = node();
    let original = Mutex::new(
        authority.clone(),
        "handover",
        LockOptions::new()
            .with_identifier("worker-7")
            .with_lock_timeout(ms(300)),
    )
    .unwrap();
    original.acquire().await.unwrap();
    drop(original);

    let successor = Mutex::new(
        authority.clone(),
        "handover",
        LockOptions::new()
            .with_identifier("worker-7")
            .with_lock_timeout(ms(300))
            .with_acquired_externally(true),
    )
    .unwrap();
    successor.acquire().await.unwrap();
    sleep_ms(1_000).await;

    assert_eq!(authority.get("handover").as_deref(), Some("worker-7"));
    successor.release().await;
    assert_eq!(authority.get("handover"), None);
}

#[tokio::test(start_paused = true)]
async fn traced_authority_is_a_drop_in() {
    let authority = node();
    let traced = TracedAuthority::new(authority.clone());
    let mutex = Mutex::new(traced, "traced", LockOptions::default()).unwrap();

    mutex.acquire().await.unwrap();
    assert_eq!(authority.get("traced").as_deref(), Some(mutex.identifier()));
    mutex.release().await;

    assert_eq!(authority.get("traced"), None);
    assert_eq!(authority.calls().len(), 2);
}
