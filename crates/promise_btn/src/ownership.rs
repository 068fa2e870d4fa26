//! Decides which of several co-bound controls reacts to one interaction.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use shared::domain::{ControlId, TriggerId};
use tracing::debug;

use crate::config::EffectiveConfig;

/// Single-use ownership marker minted with each dispatched interaction.
#[derive(Debug, Clone, Default)]
pub struct OwnershipToken(Arc<AtomicBool>);

impl OwnershipToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only for the first caller.
    pub fn try_consume(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub fn is_consumed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The interaction that caused a value to be bound, e.g. a click.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    id: TriggerId,
    origin: ControlId,
    token: OwnershipToken,
}

impl TriggerEvent {
    /// Mints an event originating at `origin` with a fresh token.
    pub fn dispatch(origin: ControlId) -> Self {
        Self {
            id: TriggerId::new(),
            origin,
            token: OwnershipToken::new(),
        }
    }

    pub fn id(&self) -> TriggerId {
        self.id
    }

    pub fn origin(&self) -> ControlId {
        self.origin
    }

    pub fn token(&self) -> &OwnershipToken {
        &self.token
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OwnershipCoordinator {
    control: ControlId,
}

impl OwnershipCoordinator {
    pub fn new(control: ControlId) -> Self {
        Self { control }
    }

    pub fn should_enter(&self, config: &EffectiveConfig, trigger: Option<&TriggerEvent>) -> bool {
        if !config.handle_current_btn_only {
            return true;
        }
        // Bound programmatically: there is no event to arbitrate.
        let Some(trigger) = trigger else {
            debug!(control = %self.control, "no trigger event; ownership check bypassed");
            return true;
        };

        let owns = trigger.origin == self.control && trigger.token.try_consume();
        debug!(
            control = %self.control,
            trigger = %trigger.id,
            origin = %trigger.origin,
            owns,
            "ownership checked"
        );
        owns
    }
}

#[cfg(test)]
#[path = "tests/ownership_tests.rs"]
mod tests;
