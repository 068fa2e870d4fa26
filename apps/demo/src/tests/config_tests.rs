use super::*;

use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("promise_btn_missing_{suffix}.toml"));

    let config = load_global_config(&path).expect("load");
    assert_eq!(config.spinner_template, None);
}

#[test]
fn reads_toml_file() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("promise_btn_config_{suffix}.toml"));
    fs::write(&path, "spinner_template = \"<b>...</b>\"\nbtn_loading_class = \"busy\"\n")
        .expect("write config");

    let config = load_global_config(&path).expect("load");
    assert_eq!(config.spinner_template.as_deref(), Some("<b>...</b>"));
    assert_eq!(
        config.btn_loading_class,
        Some(LoadingClass::Named("busy".to_string()))
    );

    fs::remove_file(path).expect("cleanup");
}

#[test]
fn malformed_file_is_reported_with_its_path() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("promise_btn_broken_{suffix}.toml"));
    fs::write(&path, "min_duration_ms = [").expect("write config");

    let err = load_global_config(&path).expect_err("must fail");
    assert!(err.to_string().contains("failed to parse config file"));

    fs::remove_file(path).expect("cleanup");
}

#[test]
fn env_overrides_win_over_file_values() {
    let mut config = GlobalConfig::default().with_min_duration(std::time::Duration::from_millis(10));
    apply_env_overrides(
        &mut config,
        lookup_from(&[
            ("PROMISE_BTN__MIN_DURATION_MS", "300"),
            ("PROMISE_BTN__DISABLE_BTN", "off"),
            ("PROMISE_BTN__BTN_LOADING_CLASS", "false"),
            ("PROMISE_BTN__HANDLE_CURRENT_BTN_ONLY", "yes"),
        ]),
    );

    assert_eq!(config.min_duration_ms, Some(300));
    assert_eq!(config.disable_btn, Some(false));
    assert_eq!(config.btn_loading_class, Some(LoadingClass::Toggle(false)));
    assert_eq!(config.handle_current_btn_only, Some(true));
}

#[test]
fn invalid_env_values_are_ignored() {
    let mut config = GlobalConfig::default();
    apply_env_overrides(
        &mut config,
        lookup_from(&[
            ("PROMISE_BTN__MIN_DURATION_MS", "soon"),
            ("PROMISE_BTN__DISABLE_BTN", "maybe"),
        ]),
    );

    assert_eq!(config.min_duration_ms, None);
    assert_eq!(config.disable_btn, None);
}

#[test]
fn named_class_from_env_is_trimmed() {
    let mut config = GlobalConfig::default();
    apply_env_overrides(
        &mut config,
        lookup_from(&[("PROMISE_BTN__BTN_LOADING_CLASS", " busy ")]),
    );
    assert_eq!(
        config.btn_loading_class,
        Some(LoadingClass::Named("busy".to_string()))
    );
}
