use super::*;
use promise_btn::{classify, Classification};

async fn settle(value: BoundValue) -> Settlement {
    match classify(value).expect("classify") {
        Classification::Awaitable(handle) => handle.await,
        other => panic!("expected an awaitable, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn future_source_reports_the_simulated_failure() {
    let failing = operation(Source::Future, Duration::from_millis(50), true);
    assert_eq!(settle(failing).await, Settlement::Rejected);

    let passing = operation(Source::Future, Duration::from_millis(50), false);
    assert_eq!(settle(passing).await, Settlement::Fulfilled);
}

#[tokio::test(start_paused = true)]
async fn thenable_source_settles_after_its_delay() {
    let started = tokio::time::Instant::now();
    let value = operation(Source::Thenable, Duration::from_millis(80), false);

    assert_eq!(settle(value).await, Settlement::Fulfilled);
    assert!(started.elapsed() >= Duration::from_millis(80));
}

#[tokio::test(start_paused = true)]
async fn subscription_source_closes_after_all_progress_steps() {
    let started = tokio::time::Instant::now();
    let value = operation(Source::Subscription, Duration::from_millis(100), false);

    assert_eq!(settle(value).await, Settlement::Fulfilled);
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn stream_source_is_not_bindable() {
    let value = operation(Source::Stream, Duration::from_millis(10), false);
    assert!(classify(value).is_err());
}
