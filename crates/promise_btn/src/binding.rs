//! One control, one bound value at a time.

use std::sync::Arc;

use shared::{
    domain::{BindingState, ControlId},
    error::BindError,
};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    awaitable::{classify, BoundValue, Classification},
    config::{resolve, BindingOverrides, EffectiveConfig, GlobalConfig, SharedConfig},
    control::Control,
    ownership::{OwnershipCoordinator, TriggerEvent},
    state_machine::LoadingStateMachine,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// The value is awaitable and the control entered the loading state.
    Entered,
    /// The value is not awaitable.
    Idle,
    /// A subscription that had already closed.
    AlreadySettled,
    /// Another control owns the triggering event.
    Declined,
    /// The control was torn down before the value arrived.
    Detached,
}

pub struct BindingController {
    control_id: ControlId,
    global: Arc<GlobalConfig>,
    overrides: BindingOverrides,
    config: SharedConfig,
    machine: LoadingStateMachine,
    coordinator: OwnershipCoordinator,
    watcher: Option<JoinHandle<()>>,
}

impl BindingController {
    pub fn new(control: &Arc<dyn Control>, global: Arc<GlobalConfig>) -> Self {
        Self::with_overrides(control, global, BindingOverrides::default())
    }

    pub fn with_overrides(
        control: &Arc<dyn Control>,
        global: Arc<GlobalConfig>,
        overrides: BindingOverrides,
    ) -> Self {
        let config = SharedConfig::new(resolve(&global, &overrides));
        let control_id = control.id();
        Self {
            control_id,
            machine: LoadingStateMachine::new(control, config.clone()),
            coordinator: OwnershipCoordinator::new(control_id),
            global,
            overrides,
            config,
            watcher: None,
        }
    }

    pub fn control_id(&self) -> ControlId {
        self.control_id
    }

    pub fn state(&self) -> BindingState {
        self.machine.state()
    }

    pub fn machine(&self) -> &LoadingStateMachine {
        &self.machine
    }

    pub fn config(&self) -> EffectiveConfig {
        self.config.snapshot()
    }

    pub fn overrides(&self) -> &BindingOverrides {
        &self.overrides
    }

    /// Mutates the per-binding overrides and re-resolves the effective
    /// config. Later transitions see the change; applied visuals do not.
    pub fn configure(&mut self, update: impl FnOnce(&mut BindingOverrides)) {
        update(&mut self.overrides);
        self.config.replace(resolve(&self.global, &self.overrides));
        debug!(control = %self.control_id, config = ?self.config.snapshot(), "binding reconfigured");
    }

    /// Assigns a new value, superseding the previous one.
    ///
    /// `trigger` is the interaction that produced the value, if any. Binding
    /// an awaitable requires a tokio runtime to watch for its settlement.
    pub fn bind(
        &mut self,
        value: BoundValue,
        trigger: Option<&TriggerEvent>,
    ) -> Result<BindOutcome, BindError> {
        self.release();

        let kind = value.kind();
        let handle = match classify(value).map_err(|err| err.for_control(self.control_id))? {
            Classification::NotAwaitable => return Ok(BindOutcome::Idle),
            Classification::AlreadySettled => {
                debug!(control = %self.control_id, "bound subscription already closed");
                return Ok(BindOutcome::AlreadySettled);
            }
            Classification::Awaitable(handle) => handle,
        };

        // Checked before ownership so a failed bind leaves the trigger's token unspent.
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| BindError::NoRuntime {
                control: self.control_id,
            })?;

        let config = self.config.snapshot();
        if !self.coordinator.should_enter(&config, trigger) {
            return Ok(BindOutcome::Declined);
        }

        if !self.machine.enter() {
            return Ok(BindOutcome::Detached);
        }

        let epoch = self.machine.epoch();
        let machine = self.machine.clone();
        let control = self.control_id;
        self.watcher = Some(runtime.spawn(async move {
            let settlement = handle.await;
            debug!(%control, ?settlement, "bound value settled");
            machine.settle_cycle(epoch);
        }));
        info!(control = %self.control_id, kind, "control bound to pending value");
        Ok(BindOutcome::Entered)
    }

    /// Drops the current value: stops watching it and forces Idle.
    fn release(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        self.machine.reset();
    }
}

impl Drop for BindingController {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for BindingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingController")
            .field("control", &self.control_id)
            .field("state", &self.machine.state())
            .field("overrides", &self.overrides)
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/binding_tests.rs"]
mod tests;
