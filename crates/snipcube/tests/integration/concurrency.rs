use std::sync::Arc;
use std::time::{Duration, Instant};

use snipcube::admission::Admission;
use snipcube::runner::Engine;
use snipcube::types::{ExecutionOutcome, Limits, RejectReason};

use super::{engine_with, test_config};

/// Wait until every slot of `admission` is taken
async fn wait_until_full(admission: &Admission) {
    let started = Instant::now();
    while admission.available() > 0 {
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "first request never took its slot"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_second_request_is_busy_while_first_runs() {
    let limits = Limits::new()
        .with_wall_time_limit(2.0)
        .with_cpu_time_limit(10);
    let engine = Arc::new(engine_with(limits));

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.execute(engine.request("loop {}", None)).await })
    };
    wait_until_full(engine.admission()).await;

    let started = Instant::now();
    let second = engine.execute(engine.request("1+1", None)).await;

    assert_eq!(
        second,
        ExecutionOutcome::Rejected {
            reason: RejectReason::Busy
        }
    );
    assert!(started.elapsed() < Duration::from_millis(500));

    let first = first.await.unwrap();
    assert!(matches!(first, ExecutionOutcome::TimedOut { .. }));
    assert_eq!(engine.admission().available(), 1);

    // Slot is free again
    let third = engine.execute(engine.request("1+1", None)).await;
    assert!(third.is_success());
}

#[tokio::test]
async fn test_engines_can_share_a_budget() {
    let shared = Arc::new(Admission::new(1));
    let limits = Limits::new()
        .with_wall_time_limit(2.0)
        .with_cpu_time_limit(10);

    let busy = Arc::new(
        Engine::new(test_config().with_limits(limits.clone())).with_admission(shared.clone()),
    );
    let other = Engine::new(test_config().with_limits(limits)).with_admission(shared.clone());

    let first = {
        let busy = busy.clone();
        tokio::spawn(async move { busy.execute(busy.request("loop {}", None)).await })
    };
    wait_until_full(&shared).await;

    let outcome = other.execute(other.request("1+1", None)).await;
    assert_eq!(
        outcome,
        ExecutionOutcome::Rejected {
            reason: RejectReason::Busy
        }
    );

    first.await.unwrap();
    assert_eq!(shared.available(), 1);
}

#[tokio::test]
async fn test_separate_engines_do_not_block_each_other() {
    let limits = Limits::new()
        .with_wall_time_limit(2.0)
        .with_cpu_time_limit(10);
    let busy = Arc::new(engine_with(limits.clone()));
    let other = engine_with(limits);

    let first = {
        let busy = busy.clone();
        tokio::spawn(async move { busy.execute(busy.request("loop {}", None)).await })
    };
    wait_until_full(busy.admission()).await;

    let outcome = other.execute(other.request("1+1", None)).await;
    assert!(outcome.is_success(), "got {outcome:?}");

    first.await.unwrap();
}
