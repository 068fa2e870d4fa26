//! Simulated operations the demo binds to its buttons.

use std::time::Duration;

use clap::ValueEnum;
use futures::StreamExt;
use promise_btn::{BoundValue, SettleCallback, Settlement, Subscription, Thenable};
use tokio_stream::wrappers::IntervalStream;

const PROGRESS_STEPS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Source {
    /// A future that sleeps, then succeeds or fails.
    Future,
    /// A callback-style handle resolved from a background task.
    Thenable,
    /// A running subscription to a progress stream.
    Subscription,
    /// The progress stream itself, never subscribed (rejected on bind).
    Stream,
}

#[derive(Debug, Clone, Copy)]
pub struct DelayedThenable {
    delay: Duration,
    outcome: Settlement,
}

impl Thenable for DelayedThenable {
    fn then(&self, on_settle: SettleCallback) {
        let delay = self.delay;
        let outcome = self.outcome;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_settle(outcome);
        });
    }
}

fn progress_ticks(settle_after: Duration) -> impl futures::Stream<Item = ()> + Send + 'static {
    let period = (settle_after / PROGRESS_STEPS as u32).max(Duration::from_millis(1));
    IntervalStream::new(tokio::time::interval(period))
        .skip(1)
        .take(PROGRESS_STEPS)
        .map(|_| ())
}

/// Builds the value to bind. Must be called from within the runtime.
pub fn operation(source: Source, settle_after: Duration, fail: bool) -> BoundValue {
    let outcome = if fail {
        Settlement::Rejected
    } else {
        Settlement::Fulfilled
    };

    match source {
        Source::Future => BoundValue::try_future(async move {
            tokio::time::sleep(settle_after).await;
            if fail {
                Err("simulated failure")
            } else {
                Ok(())
            }
        }),
        Source::Thenable => BoundValue::thenable(DelayedThenable {
            delay: settle_after,
            outcome,
        }),
        Source::Subscription => Subscription::spawn(progress_ticks(settle_after)).into(),
        Source::Stream => BoundValue::stream(progress_ticks(settle_after)),
    }
}

#[cfg(test)]
#[path = "tests/operations_tests.rs"]
mod tests;
