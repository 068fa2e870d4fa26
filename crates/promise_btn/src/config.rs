use std::{
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use shared::error::ConfigError;

pub const DEFAULT_LOADING_CLASS: &str = "is-loading";
pub const DEFAULT_SPINNER_TEMPLATE: &str = r#"<span class="btn-spinner"></span>"#;

/// Either a class name or a switch; `false` turns the loading class off and
/// `true` selects [`DEFAULT_LOADING_CLASS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoadingClass {
    Toggle(bool),
    Named(String),
}

impl LoadingClass {
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::Toggle(true) => Some(DEFAULT_LOADING_CLASS),
            Self::Toggle(false) => None,
            Self::Named(name) if name.trim().is_empty() => None,
            Self::Named(name) => Some(name),
        }
    }
}

impl Default for LoadingClass {
    fn default() -> Self {
        Self::Named(DEFAULT_LOADING_CLASS.to_string())
    }
}

impl From<&str> for LoadingClass {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<bool> for LoadingClass {
    fn from(enabled: bool) -> Self {
        Self::Toggle(enabled)
    }
}

/// One configuration layer where every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialConfig {
    pub min_duration_ms: Option<u64>,
    pub disable_btn: Option<bool>,
    pub btn_loading_class: Option<LoadingClass>,
    pub spinner_template: Option<String>,
    pub handle_current_btn_only: Option<bool>,
}

/// Process-wide defaults registered once at bootstrap.
pub type GlobalConfig = PartialConfig;
/// Per-binding values; they always win over [`GlobalConfig`].
pub type BindingOverrides = PartialConfig;

impl PartialConfig {
    /// Parses a TOML document. Unknown keys are ignored.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn with_min_duration(mut self, min_duration: Duration) -> Self {
        self.min_duration_ms = Some(duration_to_ms(min_duration));
        self
    }

    pub fn with_disable_btn(mut self, disable_btn: bool) -> Self {
        self.disable_btn = Some(disable_btn);
        self
    }

    pub fn with_btn_loading_class(mut self, class: impl Into<LoadingClass>) -> Self {
        self.btn_loading_class = Some(class.into());
        self
    }

    pub fn with_spinner_template(mut self, template: impl Into<String>) -> Self {
        self.spinner_template = Some(template.into());
        self
    }

    pub fn with_handle_current_btn_only(mut self, enabled: bool) -> Self {
        self.handle_current_btn_only = Some(enabled);
        self
    }

    pub fn set_min_duration(&mut self, min_duration: Duration) {
        self.min_duration_ms = Some(duration_to_ms(min_duration));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub min_duration: Duration,
    pub disable_btn: bool,
    pub btn_loading_class: LoadingClass,
    /// `None` means no adornment is injected.
    pub spinner_template: Option<String>,
    pub handle_current_btn_only: bool,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            min_duration: Duration::ZERO,
            disable_btn: true,
            btn_loading_class: LoadingClass::default(),
            spinner_template: Some(DEFAULT_SPINNER_TEMPLATE.to_string()),
            handle_current_btn_only: false,
        }
    }
}

impl EffectiveConfig {
    pub fn loading_class(&self) -> Option<&str> {
        self.btn_loading_class.class_name()
    }

    pub fn spinner_markup(&self) -> Option<&str> {
        self.spinner_template.as_deref()
    }
}

/// Merges the two layers field by field: override, then global, then the
/// hardcoded default.
pub fn resolve(global: &GlobalConfig, overrides: &BindingOverrides) -> EffectiveConfig {
    let defaults = EffectiveConfig::default();

    let spinner_template = match overrides
        .spinner_template
        .as_ref()
        .or(global.spinner_template.as_ref())
    {
        Some(template) if template.trim().is_empty() => None,
        Some(template) => Some(template.clone()),
        None => defaults.spinner_template,
    };

    EffectiveConfig {
        min_duration: overrides
            .min_duration_ms
            .or(global.min_duration_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.min_duration),
        disable_btn: overrides
            .disable_btn
            .or(global.disable_btn)
            .unwrap_or(defaults.disable_btn),
        btn_loading_class: overrides
            .btn_loading_class
            .clone()
            .or_else(|| global.btn_loading_class.clone())
            .unwrap_or(defaults.btn_loading_class),
        spinner_template,
        handle_current_btn_only: overrides
            .handle_current_btn_only
            .or(global.handle_current_btn_only)
            .unwrap_or(defaults.handle_current_btn_only),
    }
}

/// The effective config of one binding, shared with its state machine so
/// that every transition reads the latest values.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig(Arc<RwLock<EffectiveConfig>>);

impl SharedConfig {
    pub fn new(config: EffectiveConfig) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    pub fn snapshot(&self) -> EffectiveConfig {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn min_duration(&self) -> Duration {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .min_duration
    }

    pub fn replace(&self, config: EffectiveConfig) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = config;
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
