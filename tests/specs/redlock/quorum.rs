//! Redlock quorum specs
//!
//! Verify majority acquisition across independent authorities, rollback
//! when the majority is missed, and loss when the majority erodes.

use crate::prelude::*;
use similar_asserts::assert_eq;

fn quick() -> LockOptions {
    LockOptions::new()
        .with_lock_timeout(ms(1_000))
        .with_acquire_timeout(ms(100))
        .with_refresh_interval(ms(200))
}

#[tokio::test(start_paused = true)]
async fn acquires_on_all_healthy_authorities() {
    let authorities = nodes(5);
    let mutex = RedlockMutex::new(authorities.clone(), "redlock", quick()).unwrap();

    mutex.acquire().await.unwrap();
    for authority in &authorities {
        assert_eq!(authority.get("redlock").as_deref(), Some(mutex.identifier()));
    }

    mutex.release().await;
    for authority in &authorities {
        assert_eq!(authority.get("redlock"), None);
    }
}

#[tokio::test(start_paused = true)]
async fn tolerates_a_failing_minority() {
    let authorities = nodes(5);
    authorities[3].set_unreachable(true);
    authorities[4].set_unreachable(true);
    let mutex = RedlockMutex::new(authorities.clone(), "redlock", quick()).unwrap();

    mutex.acquire().await.unwrap();
    sleep_ms(500).await;

    assert!(mutex.is_acquired());
    for authority in &authorities[..3] {
        assert_eq!(authority.get("redlock").as_deref(), Some(mutex.identifier()));
    }
    mutex.release().await;
}

#[tokio::test(start_paused = true)]
async fn failing_majority_leaves_no_record() {
    for (total, failing) in [(3, 2), (5, 3), (5, 5), (4, 2)] {
        let authorities = nodes(total);
        for authority in &authorities[..failing] {
            authority.set_unreachable(true);
        }
        let mutex = RedlockMutex::new(authorities.clone(), "redlock", quick()).unwrap();

        let err = mutex.acquire().await.unwrap_err();
        assert_eq!(err.to_string(), "Acquire redlock-mutex redlock timeout");

        for authority in &authorities {
            authority.set_unreachable(false);
            assert_eq!(authority.get("redlock"), None, "{total}/{failing}");
        }
    }
}

#[tokio::test(start_paused = true)]
async fn competing_redlocks_exclude_each_other() {
    let authorities = nodes(3);
    let first = RedlockMutex::new(authorities.clone(), "contested", quick()).unwrap();
    let second = RedlockMutex::new(authorities.clone(), "contested", quick()).unwrap();

    first.acquire().await.unwrap();
    assert!(second.acquire().await.is_err());

    first.release().await;
    second.acquire().await.unwrap();
    second.release().await;
}

#[tokio::test(start_paused = true)]
async fn stale_minority_record_does_not_block() {
    let authorities = nodes(3);
    // A stale record on one authority cannot block a majority
    authorities[0].set("split", "stale", Some(ms(50)));
    let mutex = RedlockMutex::new(authorities.clone(), "split", quick()).unwrap();

    mutex.acquire().await.unwrap();
    assert_eq!(authorities[0].get("split").as_deref(), Some("stale"));
    assert_eq!(authorities[1].get("split").as_deref(), Some(mutex.identifier()));
    mutex.release().await;
}

#[tokio::test(start_paused = true)]
async fn eroded_majority_is_a_lost_lock() {
    let authorities = nodes(3);
    let losses = Losses::new();
    let mutex = RedlockMutex::new(authorities.clone(), "eroded", losses.attach(quick())).unwrap();

    mutex.acquire().await.unwrap();
    authorities[0].delete("eroded");
    sleep_ms(250).await;
    assert!(mutex.is_acquired());

    authorities[1].set_unreachable(true);
    sleep_ms(200).await;

    assert!(!mutex.is_acquired());
    let lost = losses.all();
    assert_eq!(lost.len(), 1);
    assert_eq!(lost[0].to_string(), "Lost redlock-mutex for key eroded");
    assert!(lost[0].cause.is_none());
}

#[tokio::test(start_paused = true)]
async fn redlock_semaphore_respects_limit_on_majority() {
    let authorities = nodes(3);
    let make = || RedlockSemaphore::new(authorities.clone(), "pool", 2, quick()).unwrap();
    let (a, b, c) = (make(), make(), make());

    a.acquire().await.unwrap();
    b.acquire().await.unwrap();
    let err = c.acquire().await.unwrap_err();
    assert_eq!(err.to_string(), "Acquire redlock-semaphore semaphore:pool timeout");

    for authority in &authorities {
        assert_eq!(authority.cardinality("semaphore:pool"), 2);
    }

    a.release().await;
    c.acquire().await.unwrap();
    for handle in [&b, &c] {
        handle.release().await;
    }
}

#[tokio::test(start_paused = true)]
async fn externally_acquired_redlock_stays_held() {
    let authorities = nodes(3);
    let shared = || quick().with_identifier("shared-id");
    let owner = RedlockMutex::new(authorities.clone(), "handover", shared()).unwrap();
    owner.acquire().await.unwrap();
    drop(owner);

    let successor = RedlockMutex::new(
        authorities.clone(),
        "handover",
        shared().with_acquired_externally(true),
    )
    .unwrap();
    successor.acquire().await.unwrap();
    sleep_ms(2_500).await;

    assert!(successor.is_acquired());
    for authority in &authorities {
        assert_eq!(authority.get("handover").as_deref(), Some("shared-id"));
    }
    successor.release().await;
    for authority in &authorities {
        assert_eq!(authority.get("handover"), None);
    }
}
