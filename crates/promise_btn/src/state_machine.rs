//! Idle / Loading / Draining for a single control.
//!
//! `enter` applies the loading visuals, `settle` either reverts them at once
//! or parks the machine in `Draining` until the minimum duration is reached,
//! and `reset` drops everything immediately. Each loading cycle gets a new
//! epoch; settlement and drain-timer callbacks carry the epoch they were
//! created for and are ignored once it is stale.

use std::{
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use shared::domain::{BindingState, ControlId};
use tokio::{task::JoinHandle, time::Instant};
use tracing::{debug, warn};

use crate::{config::SharedConfig, control::Control, lock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Idle, already draining, or settled for a superseded cycle.
    Ignored,
    Exited,
    Draining { remaining: Duration },
}

/// What `enter` changed on the control, so exit undoes exactly that.
#[derive(Debug, Default)]
struct Applied {
    class: Option<String>,
    adornment: bool,
    disabled: bool,
}

#[derive(Debug)]
struct Machine {
    state: BindingState,
    epoch: u64,
    entered_at: Option<Instant>,
    applied: Applied,
    drain_timer: Option<JoinHandle<()>>,
    enter_count: u64,
}

#[derive(Clone)]
pub struct LoadingStateMachine {
    control_id: ControlId,
    control: Weak<dyn Control>,
    config: SharedConfig,
    inner: Arc<Mutex<Machine>>,
}

impl LoadingStateMachine {
    pub fn new(control: &Arc<dyn Control>, config: SharedConfig) -> Self {
        Self {
            control_id: control.id(),
            control: Arc::downgrade(control),
            config,
            inner: Arc::new(Mutex::new(Machine {
                state: BindingState::Idle,
                epoch: 0,
                entered_at: None,
                applied: Applied::default(),
                drain_timer: None,
                enter_count: 0,
            })),
        }
    }

    pub fn control_id(&self) -> ControlId {
        self.control_id
    }

    pub fn state(&self) -> BindingState {
        lock(&self.inner).state
    }

    /// Epoch of the current (or last) loading cycle.
    pub fn epoch(&self) -> u64 {
        lock(&self.inner).epoch
    }

    /// Number of Idle -> Loading transitions so far.
    pub fn enter_count(&self) -> u64 {
        lock(&self.inner).enter_count
    }

    /// Returns `true` if this call moved the machine from Idle to Loading.
    pub fn enter(&self) -> bool {
        let mut machine = lock(&self.inner);
        if machine.state.is_busy() {
            debug!(control = %self.control_id, state = ?machine.state, "already busy; enter ignored");
            return false;
        }
        let Some(control) = self.control.upgrade() else {
            debug!(control = %self.control_id, "control is gone; enter ignored");
            return false;
        };

        let config = self.config.snapshot();
        let mut applied = Applied::default();
        if let Some(class) = config.loading_class() {
            control.add_class(class);
            applied.class = Some(class.to_string());
        }
        if let Some(markup) = config.spinner_markup() {
            control.insert_adornment(markup);
            applied.adornment = true;
        }
        // A control its host already disabled stays the host's business.
        if config.disable_btn && !control.is_disabled() {
            control.set_disabled(true);
            applied.disabled = true;
        }

        machine.state = BindingState::Loading;
        machine.epoch += 1;
        machine.entered_at = Some(Instant::now());
        machine.applied = applied;
        machine.enter_count += 1;
        debug!(control = %self.control_id, epoch = machine.epoch, "entered loading state");
        true
    }

    /// Settles the current cycle.
    pub fn settle(&self) -> SettleOutcome {
        let epoch = self.epoch();
        self.settle_cycle(epoch)
    }

    pub(crate) fn settle_cycle(&self, epoch: u64) -> SettleOutcome {
        let mut machine = lock(&self.inner);
        if machine.epoch != epoch || machine.state != BindingState::Loading {
            debug!(
                control = %self.control_id,
                state = ?machine.state,
                epoch,
                current_epoch = machine.epoch,
                "settlement ignored"
            );
            return SettleOutcome::Ignored;
        }

        let elapsed = machine
            .entered_at
            .map(|at| at.elapsed())
            .unwrap_or_default();
        let min_duration = self.config.min_duration();
        if elapsed >= min_duration {
            self.exit(&mut machine);
            debug!(
                control = %self.control_id,
                elapsed_ms = elapsed.as_millis() as u64,
                "settled; back to idle"
            );
            return SettleOutcome::Exited;
        }

        let remaining = min_duration - elapsed;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                control = %self.control_id,
                "no runtime to schedule the drain timer; leaving loading state early"
            );
            self.exit(&mut machine);
            return SettleOutcome::Exited;
        };

        if let Some(previous) = machine.drain_timer.take() {
            previous.abort();
        }
        let timer_machine = self.clone();
        machine.drain_timer = Some(runtime.spawn(async move {
            tokio::time::sleep(remaining).await;
            timer_machine.finish_drain(epoch);
        }));
        machine.state = BindingState::Draining;
        debug!(
            control = %self.control_id,
            elapsed_ms = elapsed.as_millis() as u64,
            remaining_ms = remaining.as_millis() as u64,
            "settled early; draining"
        );
        SettleOutcome::Draining { remaining }
    }

    fn finish_drain(&self, epoch: u64) {
        let mut machine = lock(&self.inner);
        if machine.epoch != epoch || machine.state != BindingState::Draining {
            return;
        }
        // This runs on the timer task itself; just forget its handle.
        machine.drain_timer = None;
        self.exit(&mut machine);
        debug!(control = %self.control_id, epoch, "drain finished; back to idle");
    }

    /// Cancels any drain timer and forces Idle. Pending settlements of the
    /// abandoned cycle become no-ops.
    pub fn reset(&self) {
        let mut machine = lock(&self.inner);
        machine.epoch += 1;
        if let Some(timer) = machine.drain_timer.take() {
            timer.abort();
        }
        if machine.state.is_busy() {
            self.exit(&mut machine);
            debug!(control = %self.control_id, "loading state reset");
        }
    }

    fn exit(&self, machine: &mut Machine) {
        let applied = std::mem::take(&mut machine.applied);
        machine.state = BindingState::Idle;
        machine.entered_at = None;

        let Some(control) = self.control.upgrade() else {
            return;
        };
        if let Some(class) = &applied.class {
            control.remove_class(class);
        }
        if applied.adornment {
            control.remove_adornment();
        }
        if applied.disabled {
            control.set_disabled(false);
        }
    }
}

impl std::fmt::Debug for LoadingStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadingStateMachine")
            .field("control", &self.control_id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/state_machine_tests.rs"]
mod tests;
