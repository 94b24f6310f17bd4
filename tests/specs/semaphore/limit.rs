//! Semaphore limit specs
//!
//! Verify a semaphore admits at most `limit` holders and reports the
//! prefixed key when an acquirer gives up.

use crate::prelude::*;
use similar_asserts::assert_eq;
use futures::future::join_all;

#[tokio::test(start_paused = true)]
async fn third_acquirer_of_two_slots_times_out() {
    let authority = node();
    let handles: Vec<_> = (0..3)
        .map(|_| Semaphore::new(authority.clone(), "multipleTest", 2, LockOptions::default()).unwrap())
        .collect();

    let outcomes = join_all(handles.iter().map(|h| h.acquire())).await;

    let failures: Vec<String> = outcomes
        .iter()
        .filter_map(|r| r.as_ref().err().map(ToString::to_string))
        .collect();
    assert_eq!(
        failures,
        vec!["Acquire semaphore semaphore:multipleTest timeout".to_string()]
    );
    assert_eq!(authority.cardinality("semaphore:multipleTest"), 2);

    for handle in &handles {
        handle.release().await;
    }
    assert_eq!(authority.cardinality("semaphore:multipleTest"), 0);
}

#[tokio::test(start_paused = true)]
async fn waiter_takes_a_freed_slot() {
    let authority = node();
    let options = || LockOptions::new().with_acquire_timeout(ms(1_000));
    let a = Semaphore::new(authority.clone(), "pool", 2, options()).unwrap();
    let b = Semaphore::new(authority.clone(), "pool", 2, options()).unwrap();
    let c = Semaphore::new(authority.clone(), "pool", 2, options()).unwrap();
    a.acquire().await.unwrap();
    b.acquire().await.unwrap();

    let release = async {
        sleep_ms(100).await;
        a.release().await;
    };
    let (acquired, ()) = tokio::join!(c.acquire(), release);

    acquired.unwrap();
    let mut holders = authority.members("semaphore:pool");
    holders.sort();
    let mut expected = vec![b.identifier().to_string(), c.identifier().to_string()];
    expected.sort();
    assert_eq!(holders, expected);
}

#[tokio::test(start_paused = true)]
async fn limit_one_behaves_like_a_mutex() {
    let authority = node();
    let options = || LockOptions::new().with_acquire_attempts_limit(1);
    let first = Semaphore::new(authority.clone(), "single", 1, options()).unwrap();
    let second = Semaphore::new(authority.clone(), "single", 1, options()).unwrap();

    first.acquire().await.unwrap();
    let err = second.acquire().await.unwrap_err();
    assert!(matches!(err, LockError::AcquireTimeout { kind: LockKind::Semaphore, .. }));
}

#[tokio::test(start_paused = true)]
async fn crashed_holder_slot_is_reclaimed_after_lock_timeout() {
    let authority = node();
    let clock = FakeClock::new();
    let options = || {
        LockOptions::new()
            .with_lock_timeout(ms(500))
            .with_acquire_attempts_limit(1)
            .with_refresh_interval(Duration::ZERO)
    };
    let crashed = Semaphore::with_clock(authority.clone(), "reclaim", 1, options(), clock.clone())
        .unwrap();
    crashed.acquire().await.unwrap();
    drop(crashed);

    let next = Semaphore::with_clock(authority.clone(), "reclaim", 1, options(), clock.clone())
        .unwrap();
    assert!(!next.try_acquire().await.unwrap());

    clock.advance(ms(501));
    assert!(next.try_acquire().await.unwrap());
    assert_eq!(authority.members("semaphore:reclaim"), vec![next.identifier().to_string()]);
}
