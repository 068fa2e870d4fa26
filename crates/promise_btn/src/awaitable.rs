//! Normalizes whatever the host binds into one settlement signal.
//!
//! A bound value is classified exactly once per assignment. Futures,
//! callback-style thenables and live stream subscriptions all become an
//! [`AwaitableHandle`]; plain data is not awaitable; a bare stream is
//! rejected because binding it would have to start it behind the caller's back.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use futures::{
    future::{self, BoxFuture, Shared},
    stream::BoxStream,
    FutureExt, Stream, StreamExt,
};
use serde_json::Value;
use shared::{domain::Settlement, error::BindError};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{trace, warn};

use crate::lock;

/// Invoked at most once when a [`Thenable`] settles.
pub type SettleCallback = Box<dyn FnOnce(Settlement) + Send + 'static>;

/// A value that reports completion through a registered callback rather than
/// by being polled, e.g. a handle from a callback-based async library.
pub trait Thenable: Send + Sync {
    fn then(&self, on_settle: SettleCallback);
}

/// The value currently assigned to a binding.
#[derive(Clone)]
pub enum BoundValue {
    /// Plain data: null, booleans, numbers, strings, arrays and objects.
    Plain(Value),
    Future(Shared<BoxFuture<'static, Settlement>>),
    Thenable(Arc<dyn Thenable>),
    Subscription(Subscription),
    Stream(StreamSource),
}

impl BoundValue {
    /// Wraps a future whose output is irrelevant; it always settles fulfilled.
    ///
    /// Inside a tokio runtime the future is spawned at once and runs to
    /// completion whether or not any binding ends up watching it.
    pub fn future<F>(fut: F) -> Self
    where
        F: Future + Send + 'static,
    {
        Self::started(fut.map(|_| Settlement::Fulfilled).boxed())
    }

    /// Wraps a fallible future; `Err` settles as rejected. Started like
    /// [`BoundValue::future`].
    pub fn try_future<F, T, E>(fut: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::started(
            fut.map(|result| match result {
                Ok(_) => Settlement::Fulfilled,
                Err(_) => Settlement::Rejected,
            })
            .boxed(),
        )
    }

    /// Bindings only observe the spawned task; dropping or aborting an
    /// observer never cancels the operation. Without a runtime the future
    /// stays lazy and binding it fails with `NoRuntime`.
    fn started(settled: BoxFuture<'static, Settlement>) -> Self {
        let settled = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let task = runtime.spawn(settled);
                async move {
                    task.await.unwrap_or_else(|err| {
                        warn!(error = %err, "bound operation did not complete");
                        Settlement::Rejected
                    })
                }
                .boxed()
            }
            Err(_) => settled,
        };
        Self::Future(settled.shared())
    }

    pub fn thenable<T>(thenable: T) -> Self
    where
        T: Thenable + 'static,
    {
        Self::Thenable(Arc::new(thenable))
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream + Send + 'static,
    {
        Self::Stream(StreamSource::new(stream))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Plain(_) => "plain",
            Self::Future(_) => "future",
            Self::Thenable(_) => "thenable",
            Self::Subscription(_) => "subscription",
            Self::Stream(_) => "stream",
        }
    }
}

impl Default for BoundValue {
    fn default() -> Self {
        Self::Plain(Value::Null)
    }
}

impl From<Value> for BoundValue {
    fn from(value: Value) -> Self {
        Self::Plain(value)
    }
}

impl From<Subscription> for BoundValue {
    fn from(subscription: Subscription) -> Self {
        Self::Subscription(subscription)
    }
}

impl From<StreamSource> for BoundValue {
    fn from(source: StreamSource) -> Self {
        Self::Stream(source)
    }
}

impl fmt::Debug for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) => f.debug_tuple("Plain").field(value).finish(),
            Self::Subscription(subscription) => {
                f.debug_tuple("Subscription").field(subscription).finish()
            }
            Self::Stream(source) => f.debug_tuple("Stream").field(source).finish(),
            other => f.write_str(match other {
                Self::Future(_) => "Future(..)",
                _ => "Thenable(..)",
            }),
        }
    }
}

/// A stream that nobody is consuming yet.
#[derive(Clone)]
pub struct StreamSource {
    type_name: String,
    stream: Arc<Mutex<Option<BoxStream<'static, ()>>>>,
}

impl StreamSource {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream + Send + 'static,
    {
        Self {
            type_name: short_type_name(std::any::type_name::<S>()),
            stream: Arc::new(Mutex::new(Some(stream.map(|_| ()).boxed()))),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Starts consuming the stream. Returns `None` if a clone of this source
    /// was already subscribed, since the underlying stream can only run once.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self) -> Option<Subscription> {
        let stream = lock(&self.stream).take()?;
        Some(Subscription::spawn(stream))
    }
}

impl fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSource")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// A running consumption of a stream. It closes when the stream ends, when a
/// fallible stream yields its first error, or on [`Subscription::unsubscribe`].
#[derive(Clone)]
pub struct Subscription {
    closed: watch::Receiver<Option<Settlement>>,
    closer: Arc<watch::Sender<Option<Settlement>>>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Subscription {
    /// Drives `stream` to completion on the current tokio runtime. The stream
    /// is polled once right away, so one that is already exhausted yields a
    /// closed subscription.
    ///
    /// # Panics
    ///
    /// Panics if the stream is still open after that first poll and there is
    /// no tokio runtime, like [`tokio::spawn`].
    pub fn spawn<S>(stream: S) -> Self
    where
        S: Stream + Send + 'static,
    {
        let mut stream = stream.map(|_| ()).boxed();
        Self::drive(async move {
            while stream.next().await.is_some() {}
            Settlement::Fulfilled
        })
    }

    /// Like [`Subscription::spawn`], but the first `Err` item ends the
    /// subscription as rejected.
    pub fn spawn_try<S, T, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
    {
        let mut stream = stream.map(|item| item.is_ok()).boxed();
        Self::drive(async move {
            while let Some(ok) = stream.next().await {
                if !ok {
                    return Settlement::Rejected;
                }
            }
            Settlement::Fulfilled
        })
    }

    fn drive<F>(consume: F) -> Self
    where
        F: Future<Output = Settlement> + Send + 'static,
    {
        let mut consume = consume.boxed();
        // A stream that is over on its first poll never reaches the runtime.
        if let Some(settlement) = (&mut consume).now_or_never() {
            trace!(?settlement, "stream ended before the subscription was returned");
            let (closer, closed) = watch::channel(Some(settlement));
            return Self {
                closed,
                closer: Arc::new(closer),
                task: Arc::new(Mutex::new(None)),
            };
        }

        let (closer, closed) = watch::channel(None);
        let closer = Arc::new(closer);
        let task_closer = Arc::clone(&closer);
        let task = tokio::spawn(async move {
            let settlement = consume.await;
            task_closer.send_if_modified(|state| close(state, settlement));
        });

        Self {
            closed,
            closer,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.borrow().is_some()
    }

    /// Stops consuming the stream and closes the subscription.
    pub fn unsubscribe(&self) {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        self.closer
            .send_if_modified(|state| close(state, Settlement::Fulfilled));
    }

    /// Resolves once the subscription is closed.
    pub async fn closed(&self) -> Settlement {
        let mut closed = self.closed.clone();
        // The sender lives as long as `self`, so waiting cannot fail.
        let settlement = match closed.wait_for(Option::is_some).await {
            Ok(state) => (*state).unwrap_or(Settlement::Fulfilled),
            Err(_) => Settlement::Fulfilled,
        };
        settlement
    }
}

fn close(state: &mut Option<Settlement>, settlement: Settlement) -> bool {
    if state.is_some() {
        return false;
    }
    *state = Some(settlement);
    true
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwaitableKind {
    Future,
    Thenable,
    Subscription,
}

impl fmt::Display for AwaitableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Future => "future",
            Self::Thenable => "thenable",
            Self::Subscription => "subscription",
        })
    }
}

/// The single settlement notification of a classified awaitable.
pub struct AwaitableHandle {
    kind: AwaitableKind,
    settled: BoxFuture<'static, Settlement>,
}

impl AwaitableHandle {
    pub fn kind(&self) -> AwaitableKind {
        self.kind
    }
}

impl Future for AwaitableHandle {
    type Output = Settlement;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Settlement> {
        self.settled.poll_unpin(cx)
    }
}

impl fmt::Debug for AwaitableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwaitableHandle")
            .field("kind", &self.kind)
            .finish()
    }
}

#[derive(Debug)]
pub enum Classification {
    NotAwaitable,
    Awaitable(AwaitableHandle),
    /// A subscription that had already closed; handled like `NotAwaitable`.
    AlreadySettled,
}

/// Classifies a bound value. A bare stream is a caller error.
pub fn classify(value: BoundValue) -> Result<Classification, BindError> {
    match value {
        BoundValue::Plain(value) => {
            trace!(shape = describe_plain(&value), "bound value is not awaitable");
            Ok(Classification::NotAwaitable)
        }
        BoundValue::Future(fut) => Ok(Classification::Awaitable(AwaitableHandle {
            kind: AwaitableKind::Future,
            settled: fut.boxed(),
        })),
        BoundValue::Thenable(thenable) => {
            let (tx, rx) = tokio::sync::oneshot::channel();
            thenable.then(Box::new(move |settlement| {
                let _ = tx.send(settlement);
            }));
            let settled = async move {
                match rx.await {
                    Ok(settlement) => settlement,
                    // The thenable dropped its callback: it will never settle.
                    Err(_) => future::pending().await,
                }
            };
            Ok(Classification::Awaitable(AwaitableHandle {
                kind: AwaitableKind::Thenable,
                settled: settled.boxed(),
            }))
        }
        BoundValue::Subscription(subscription) => {
            if subscription.is_closed() {
                return Ok(Classification::AlreadySettled);
            }
            Ok(Classification::Awaitable(AwaitableHandle {
                kind: AwaitableKind::Subscription,
                settled: async move { subscription.closed().await }.boxed(),
            }))
        }
        BoundValue::Stream(source) => {
            warn!(
                stream_type = source.type_name(),
                "refusing to bind an unsubscribed stream"
            );
            Err(BindError::stream_not_subscribed(source.type_name()))
        }
    }
}

fn describe_plain(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(map) if map.contains_key("then") => "object with non-callable then",
        Value::Object(_) => "object",
    }
}

fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

#[cfg(test)]
#[path = "tests/awaitable_tests.rs"]
mod tests;
