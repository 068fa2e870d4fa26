//! The control element a binding drives.
//!
//! Hosts implement [`Control`] on top of whatever renders the button (a DOM
//! node, an immediate-mode widget, a terminal cell). [`MemoryControl`] keeps
//! the visible state in memory and is what the demo app and tests use.

use std::sync::Mutex;

use shared::domain::ControlId;

use crate::lock;

pub trait Control: Send + Sync {
    fn id(&self) -> ControlId;
    fn add_class(&self, class: &str);
    fn remove_class(&self, class: &str);
    fn is_disabled(&self) -> bool;
    fn set_disabled(&self, disabled: bool);
    /// Appends the adornment markup to the control's content.
    fn insert_adornment(&self, markup: &str);
    /// Removes the adornment previously inserted by the binding.
    fn remove_adornment(&self);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlSnapshot {
    pub classes: Vec<String>,
    pub disabled: bool,
    pub adornments: Vec<String>,
}

impl ControlSnapshot {
    /// Space-joined class list, the way a `className` attribute reads.
    pub fn class_name(&self) -> String {
        self.classes.join(" ")
    }
}

#[derive(Debug)]
pub struct MemoryControl {
    id: ControlId,
    state: Mutex<ControlSnapshot>,
}

impl MemoryControl {
    pub fn new(id: ControlId) -> Self {
        Self {
            id,
            state: Mutex::new(ControlSnapshot::default()),
        }
    }

    /// A control its host already disabled before any binding touched it.
    pub fn disabled(id: ControlId) -> Self {
        let control = Self::new(id);
        control.set_disabled(true);
        control
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        lock(&self.state).clone()
    }

    pub fn class_name(&self) -> String {
        lock(&self.state).class_name()
    }

    pub fn adornment_count(&self) -> usize {
        lock(&self.state).adornments.len()
    }
}

impl Control for MemoryControl {
    fn id(&self) -> ControlId {
        self.id
    }

    fn add_class(&self, class: &str) {
        let mut state = lock(&self.state);
        if !state.classes.iter().any(|existing| existing == class) {
            state.classes.push(class.to_string());
        }
    }

    fn remove_class(&self, class: &str) {
        lock(&self.state).classes.retain(|existing| existing != class);
    }

    fn is_disabled(&self) -> bool {
        lock(&self.state).disabled
    }

    fn set_disabled(&self, disabled: bool) {
        lock(&self.state).disabled = disabled;
    }

    fn insert_adornment(&self, markup: &str) {
        lock(&self.state).adornments.push(markup.to_string());
    }

    fn remove_adornment(&self) {
        lock(&self.state).adornments.pop();
    }
}
