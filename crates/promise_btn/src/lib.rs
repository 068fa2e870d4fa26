//! Binds a button-like control to an in-flight asynchronous operation.
//!
//! While the bound operation is pending the control carries a loading class,
//! a spinner adornment and a disabled attribute; once it settles the control
//! reverts, but never before the configured minimum duration has elapsed.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod awaitable;
pub mod binding;
pub mod config;
pub mod control;
pub mod ownership;
pub mod state_machine;

pub use awaitable::{
    classify, AwaitableHandle, AwaitableKind, BoundValue, Classification, SettleCallback,
    StreamSource, Subscription, Thenable,
};
pub use binding::{BindOutcome, BindingController};
pub use config::{
    resolve, BindingOverrides, EffectiveConfig, GlobalConfig, LoadingClass, PartialConfig,
    SharedConfig, DEFAULT_LOADING_CLASS, DEFAULT_SPINNER_TEMPLATE,
};
pub use control::{Control, ControlSnapshot, MemoryControl};
pub use ownership::{OwnershipCoordinator, OwnershipToken, TriggerEvent};
pub use shared::domain::{BindingState, ControlId, Settlement, TriggerId};
pub use shared::error::{BindError, ConfigError};
pub use state_machine::{LoadingStateMachine, SettleOutcome};

/// Every lock in this crate guards plain bookkeeping, so a panic elsewhere
/// never leaves it half-written; recover the guard instead of propagating.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
