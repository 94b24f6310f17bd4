//! Mutex exclusion specs
//!
//! Verify that one authority admits exactly one holder per key at a time.

use crate::prelude::*;
use similar_asserts::assert_eq;
use futures::future::join_all;

fn single_attempt() -> LockOptions {
    LockOptions::new()
        .with_lock_timeout(ms(1_000))
        .with_acquire_attempts_limit(1)
}

#[tokio::test(start_paused = true)]
async fn concurrent_acquirers_admit_exactly_one() {
    let authority = node();
    let handles: Vec<_> = (0..8)
        .map(|_| Mutex::new(authority.clone(), "exclusive", single_attempt()).unwrap())
        .collect();

    let outcomes = join_all(handles.iter().map(|h| h.try_acquire())).await;
    let winners: Vec<_> = handles
        .iter()
        .zip(&outcomes)
        .filter(|(_, ok)| matches!(ok, Ok(true)))
        .map(|(h, _)| h)
        .collect();

    assert_eq!(winners.len(), 1);
    assert_eq!(
        authority.get("exclusive").as_deref(),
        Some(winners[0].identifier())
    );
}

#[tokio::test(start_paused = true)]
async fn after_release_exactly_one_more_succeeds() {
    let authority = node();
    let first = Mutex::new(authority.clone(), "exclusive", single_attempt()).unwrap();
    first.acquire().await.unwrap();

    let waiting: Vec<_> = (0..4)
        .map(|_| Mutex::new(authority.clone(), "exclusive", single_attempt()).unwrap())
        .collect();
    first.release().await;

    let outcomes = join_all(waiting.iter().map(|h| h.try_acquire())).await;
    let granted = outcomes.into_iter().filter(|ok| matches!(ok, Ok(true))).count();
    assert_eq!(granted, 1);
}

#[tokio::test(start_paused = true)]
async fn after_expiry_exactly_one_more_succeeds() {
    let authority = node();
    authority.set("exclusive", "crashed-holder", Some(ms(200)));

    let waiting: Vec<_> = (0..4)
        .map(|_| Mutex::new(authority.clone(), "exclusive", single_attempt()).unwrap())
        .collect();
    let outcomes = join_all(waiting.iter().map(|h| h.try_acquire())).await;
    assert!(outcomes.iter().all(|ok| matches!(ok, Ok(false))));

    sleep_ms(200).await;
    let outcomes = join_all(waiting.iter().map(|h| h.try_acquire())).await;
    let granted = outcomes.into_iter().filter(|ok| matches!(ok, Ok(true))).count();
    assert_eq!(granted, 1);
}

#[tokio::test(start_paused = true)]
async fn acquire_then_release_leaves_no_record() {
    let authority = node();
    let mutex = Mutex::new(authority.clone(), "lifecycle", LockOptions::default()).unwrap();

    mutex.acquire().await.unwrap();
    mutex.release().await;

    assert_eq!(authority.get("lifecycle"), None);
    assert_eq!(authority.pttl("lifecycle"), None);
}

#[tokio::test(start_paused = true)]
async fn remaining_ttl_is_within_lock_timeout() {
    let authority = node();
    let options = LockOptions::new().with_lock_timeout(ms(750));
    let mutex = Mutex::new(authority.clone(), "ttl", options).unwrap();

    mutex.acquire().await.unwrap();
    sleep_ms(10).await;

    let ttl = authority.pttl("ttl").unwrap();
    assert!(ttl > Duration::ZERO, "ttl {ttl:?}");
    assert!(ttl <= ms(750), "ttl {ttl:?}");
    mutex.release().await;
}

#[tokio::test(start_paused = true)]
async fn waiting_acquirer_gets_lock_after_release() {
    let authority = node();
    let holder = Mutex::new(authority.clone(), "handoff", LockOptions::default()).unwrap();
    holder.acquire().await.unwrap();

    let waiter = Mutex::new(authority.clone(), "handoff", LockOptions::default()).unwrap();
    let release = async {
        sleep_ms(55).await;
        holder.release().await;
    };
    let (acquired, ()) = tokio::join!(waiter.acquire(), release);

    acquired.unwrap();
    assert_eq!(authority.get("handoff").as_deref(), Some(waiter.identifier()));
    waiter.release().await;
}
