use std::sync::Arc;
use std::time::Duration;

use pasteguard::{ManualClock, RateLimitConfig, RateLimiter};

use crate::common::{race, THREADS};

#[test]
fn concurrent_consumers_never_overdraw() {
    let limiter = Arc::new(RateLimiter::new(
        RateLimitConfig::new(10, 10, Duration::from_secs(60)),
        Arc::new(ManualClock::default()),
    ));

    let l = limiter.clone();
    let decisions = race(THREADS, move |_| l.consume("10.1.1.1"));

    assert_eq!(decisions.iter().filter(|d| d.allowed).count(), 10);
    let mut remaining: Vec<u64> = decisions
        .iter()
        .filter(|d| d.allowed)
        .map(|d| d.remaining)
        .collect();
    remaining.sort_unstable();
    assert_eq!(remaining, (0..10).collect::<Vec<_>>());
    assert_eq!(limiter.check("10.1.1.1").remaining, 0);
}

#[test]
fn keys_do_not_share_tokens_under_contention() {
    let limiter = Arc::new(RateLimiter::new(
        RateLimitConfig::new(5, 5, Duration::from_secs(60)),
        Arc::new(ManualClock::default()),
    ));

    let l = limiter.clone();
    let decisions = race(THREADS, move |i| (i % 5, l.consume(&format!("client-{}", i % 5))));

    for key in 0..5 {
        let allowed = decisions
            .iter()
            .filter(|(k, d)| *k == key && d.allowed)
            .count();
        assert_eq!(allowed, 5, "client-{key}");
    }
    assert_eq!(limiter.len(), 5);
}
