use std::{fs, io::ErrorKind, path::Path};

use anyhow::Context;
use promise_btn::{GlobalConfig, LoadingClass};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "promise_btn.toml";

/// Builds the process-wide config: defaults, then the TOML file if present,
/// then `PROMISE_BTN__*` environment variables.
pub fn load_global_config(path: &Path) -> anyhow::Result<GlobalConfig> {
    let mut config = match fs::read_to_string(path) {
        Ok(raw) => GlobalConfig::from_toml_str(&raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound => GlobalConfig::default(),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env_overrides(config: &mut GlobalConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("PROMISE_BTN__MIN_DURATION_MS") {
        match v.trim().parse::<u64>() {
            Ok(parsed) => config.min_duration_ms = Some(parsed),
            Err(_) => warn!(value = %v, "ignoring invalid PROMISE_BTN__MIN_DURATION_MS"),
        }
    }

    if let Some(v) = lookup("PROMISE_BTN__DISABLE_BTN") {
        match parse_flag(&v) {
            Some(parsed) => config.disable_btn = Some(parsed),
            None => warn!(value = %v, "ignoring invalid PROMISE_BTN__DISABLE_BTN"),
        }
    }

    if let Some(v) = lookup("PROMISE_BTN__BTN_LOADING_CLASS") {
        config.btn_loading_class = Some(match parse_flag(&v) {
            Some(enabled) => LoadingClass::Toggle(enabled),
            None => LoadingClass::Named(v.trim().to_string()),
        });
    }

    if let Some(v) = lookup("PROMISE_BTN__SPINNER_TEMPLATE") {
        config.spinner_template = Some(v);
    }

    if let Some(v) = lookup("PROMISE_BTN__HANDLE_CURRENT_BTN_ONLY") {
        match parse_flag(&v) {
            Some(parsed) => config.handle_current_btn_only = Some(parsed),
            None => warn!(value = %v, "ignoring invalid PROMISE_BTN__HANDLE_CURRENT_BTN_ONLY"),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
