//! A terminal stand-in for a rendered button.

use promise_btn::{Control, ControlId, MemoryControl};
use tracing::debug;

pub struct ConsoleControl {
    label: String,
    inner: MemoryControl,
}

impl ConsoleControl {
    pub fn new(id: ControlId, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            inner: MemoryControl::new(id),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// One fixed-width cell: label, class list, disabled flag, spinner.
    pub fn render(&self) -> String {
        let snapshot = self.inner.snapshot();
        let class_name = snapshot.class_name();
        format!(
            "{:<10} [{:<12}]{}{}",
            self.label,
            if class_name.is_empty() { "-" } else { class_name.as_str() },
            if snapshot.disabled { " disabled" } else { "         " },
            if snapshot.adornments.is_empty() { "" } else { " (spinner)" },
        )
    }
}

impl Control for ConsoleControl {
    fn id(&self) -> ControlId {
        self.inner.id()
    }

    fn add_class(&self, class: &str) {
        debug!(control = %self.label, class, "class added");
        self.inner.add_class(class);
    }

    fn remove_class(&self, class: &str) {
        debug!(control = %self.label, class, "class removed");
        self.inner.remove_class(class);
    }

    fn is_disabled(&self) -> bool {
        self.inner.is_disabled()
    }

    fn set_disabled(&self, disabled: bool) {
        debug!(control = %self.label, disabled, "disabled attribute changed");
        self.inner.set_disabled(disabled);
    }

    fn insert_adornment(&self, markup: &str) {
        debug!(control = %self.label, markup, "spinner injected");
        self.inner.insert_adornment(markup);
    }

    fn remove_adornment(&self) {
        debug!(control = %self.label, "spinner removed");
        self.inner.remove_adornment();
    }
}
