use super::*;
use crate::{awaitable::Subscription, config::LoadingClass, control::MemoryControl};
use futures::StreamExt;
use serde_json::json;
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tokio::{sync::oneshot, time::sleep};

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn make_button(id: i64) -> (Arc<MemoryControl>, Arc<dyn Control>) {
    let control = Arc::new(MemoryControl::new(ControlId(id)));
    let as_dyn: Arc<dyn Control> = control.clone();
    (control, as_dyn)
}

fn controller(control: &Arc<dyn Control>, overrides: BindingOverrides) -> BindingController {
    BindingController::with_overrides(control, Arc::new(GlobalConfig::default()), overrides)
}

fn pending() -> BoundValue {
    BoundValue::future(futures::future::pending::<()>())
}

#[tokio::test(start_paused = true)]
async fn never_settling_future_shows_loading_immediately() {
    let (button, control) = make_button(1);
    let mut binding = BindingController::new(&control, Arc::new(GlobalConfig::default()));

    assert_eq!(binding.bind(pending(), None).expect("bind"), BindOutcome::Entered);

    assert_eq!(binding.state(), BindingState::Loading);
    assert_eq!(button.class_name(), "is-loading");
    assert!(button.snapshot().disabled);
}

#[tokio::test(start_paused = true)]
async fn quick_future_stays_loading_for_min_duration() {
    let (button, control) = make_button(1);
    let mut binding = controller(
        &control,
        BindingOverrides::default().with_min_duration(ms(300)),
    );

    binding
        .bind(BoundValue::future(sleep(ms(10))), None)
        .expect("bind");

    sleep(ms(50)).await;
    assert_eq!(binding.state(), BindingState::Draining);
    assert_eq!(button.class_name(), "is-loading");
    assert!(button.snapshot().disabled);

    sleep(ms(260)).await;
    assert_eq!(binding.state(), BindingState::Idle);
    assert_eq!(button.class_name(), "");
    assert!(!button.snapshot().disabled);
}

#[tokio::test(start_paused = true)]
async fn rejected_future_reverts_like_a_fulfilled_one() {
    let (button, control) = make_button(1);
    let mut binding = controller(&control, BindingOverrides::default());

    let value = BoundValue::try_future(async {
        sleep(ms(5)).await;
        Err::<(), _>("server said no")
    });
    binding.bind(value, None).expect("bind");
    assert_eq!(binding.state(), BindingState::Loading);

    sleep(ms(10)).await;
    assert_eq!(binding.state(), BindingState::Idle);
    assert_eq!(button.class_name(), "");
}

#[tokio::test]
async fn non_awaitable_values_leave_the_control_alone() {
    let (button, control) = make_button(1);
    let mut binding = controller(&control, BindingOverrides::default());

    for value in [json!(false), json!(null), json!({}), json!({ "then": true })] {
        let outcome = binding.bind(value.into(), None).expect("bind");
        assert_eq!(outcome, BindOutcome::Idle);
    }

    assert_eq!(binding.machine().enter_count(), 0);
    assert_eq!(button.class_name(), "");
    assert!(!button.snapshot().disabled);
}

#[tokio::test]
async fn closed_subscription_changes_nothing() {
    let (button, control) = make_button(1);
    let mut binding = controller(&control, BindingOverrides::default());

    let subscription = Subscription::spawn(futures::stream::pending::<()>());
    subscription.unsubscribe();

    let outcome = binding.bind(subscription.into(), None).expect("bind");
    assert_eq!(outcome, BindOutcome::AlreadySettled);
    assert_eq!(binding.machine().enter_count(), 0);
    assert_eq!(button.class_name(), "");
}

#[tokio::test(start_paused = true)]
async fn open_subscription_loads_until_the_stream_ends() {
    let (button, control) = make_button(1);
    let mut binding = controller(&control, BindingOverrides::default());

    let ticks = futures::stream::iter(0..3).then(|tick| async move {
        sleep(ms(20)).await;
        tick
    });
    let subscription = Subscription::spawn(ticks);
    assert_eq!(
        binding.bind(subscription.into(), None).expect("bind"),
        BindOutcome::Entered
    );

    sleep(ms(30)).await;
    assert_eq!(button.class_name(), "is-loading");

    sleep(ms(40)).await;
    assert_eq!(binding.state(), BindingState::Idle);
    assert_eq!(button.class_name(), "");
}

#[tokio::test(start_paused = true)]
async fn rebinding_while_draining_forces_idle_for_good() {
    let (button, control) = make_button(1);
    let mut binding = controller(
        &control,
        BindingOverrides::default().with_min_duration(ms(300)),
    );

    binding
        .bind(BoundValue::future(sleep(ms(10))), None)
        .expect("bind");
    sleep(ms(20)).await;
    assert_eq!(binding.state(), BindingState::Draining);

    assert_eq!(
        binding.bind(json!(null).into(), None).expect("rebind"),
        BindOutcome::Idle
    );
    assert_eq!(binding.state(), BindingState::Idle);
    assert_eq!(button.class_name(), "");

    sleep(ms(500)).await;
    assert_eq!(binding.state(), BindingState::Idle);
    assert_eq!(button.class_name(), "");
    assert_eq!(binding.machine().enter_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn settlement_of_a_superseded_value_is_ignored() {
    let (button, control) = make_button(1);
    let mut binding = controller(&control, BindingOverrides::default());

    let (first_tx, first_rx) = oneshot::channel::<()>();
    binding.bind(BoundValue::future(first_rx), None).expect("bind first");
    binding.bind(pending(), None).expect("bind second");

    let _ = first_tx.send(());
    sleep(ms(5)).await;

    assert_eq!(binding.state(), BindingState::Loading);
    assert_eq!(button.class_name(), "is-loading");
    assert_eq!(binding.machine().enter_count(), 2);
}

#[tokio::test]
async fn bare_stream_fails_fast_without_touching_the_control() {
    let (button, control) = make_button(7);
    let mut binding = controller(&control, BindingOverrides::default());

    let err = binding
        .bind(BoundValue::stream(futures::stream::iter(vec![1, 2])), None)
        .expect_err("bare stream must be rejected");

    let message = err.to_string();
    assert!(message.contains("control 7"), "{message}");
    let source = std::error::Error::source(&err).expect("source").to_string();
    assert!(source.contains("subscription expected, stream given"), "{source}");
    assert_eq!(binding.state(), BindingState::Idle);
    assert_eq!(button.class_name(), "");

    assert_eq!(binding.bind(pending(), None).expect("bind"), BindOutcome::Entered);
}

#[tokio::test(start_paused = true)]
async fn min_duration_changed_after_bind_applies_to_the_settlement() {
    let (button, control) = make_button(1);
    let mut binding = controller(&control, BindingOverrides::default());

    let (tx, rx) = oneshot::channel::<()>();
    binding.bind(BoundValue::future(rx), None).expect("bind");
    binding.configure(|overrides| overrides.set_min_duration(ms(300)));

    sleep(ms(10)).await;
    tx.send(()).expect("settle");

    sleep(ms(40)).await;
    assert_eq!(binding.state(), BindingState::Draining);
    assert_eq!(button.class_name(), "is-loading");

    sleep(ms(300)).await;
    assert_eq!(binding.state(), BindingState::Idle);
}

#[tokio::test]
async fn reconfigured_class_and_disable_flag_apply_to_the_next_bind() {
    let (button, control) = make_button(1);
    let mut binding = controller(&control, BindingOverrides::default());

    binding.configure(|overrides| {
        overrides.disable_btn = Some(false);
        overrides.btn_loading_class = Some(LoadingClass::Named("TEST".to_string()));
    });
    binding.bind(pending(), None).expect("bind");

    assert_eq!(button.class_name(), "TEST");
    assert!(!button.snapshot().disabled);
    assert!(!binding.config().disable_btn);
    assert_eq!(binding.overrides().disable_btn, Some(false));
}

#[tokio::test]
async fn only_the_clicked_control_loads_when_current_btn_only() {
    let (first_button, first_control) = make_button(1);
    let (second_button, second_control) = make_button(2);
    let overrides = BindingOverrides::default().with_handle_current_btn_only(true);
    let mut first = controller(&first_control, overrides.clone());
    let mut second = controller(&second_control, overrides);

    let value = pending();
    let click = TriggerEvent::dispatch(ControlId(2));

    assert_eq!(
        first.bind(value.clone(), Some(&click)).expect("bind"),
        BindOutcome::Declined
    );
    assert_eq!(
        second.bind(value, Some(&click)).expect("bind"),
        BindOutcome::Entered
    );

    assert_eq!(first.machine().enter_count(), 0);
    assert_eq!(first_button.class_name(), "");
    assert_eq!(second_button.class_name(), "is-loading");
}

// When the value arrives without an interaction there is nothing to
// arbitrate, so every co-bound control loads even with current_btn_only.
#[tokio::test]
async fn programmatic_bind_bypasses_current_btn_only() {
    let (first_button, first_control) = make_button(1);
    let (second_button, second_control) = make_button(2);
    let global = Arc::new(GlobalConfig::default().with_handle_current_btn_only(true));
    let mut first = BindingController::new(&first_control, Arc::clone(&global));
    let mut second = BindingController::new(&second_control, global);

    let value = pending();
    assert_eq!(first.bind(value.clone(), None).expect("bind"), BindOutcome::Entered);
    assert_eq!(second.bind(value, None).expect("bind"), BindOutcome::Entered);

    assert_eq!(first_button.class_name(), "is-loading");
    assert_eq!(second_button.class_name(), "is-loading");
}

#[tokio::test(start_paused = true)]
async fn co_bound_controls_track_a_shared_value_independently() {
    let (first_button, first_control) = make_button(1);
    let (second_button, second_control) = make_button(2);
    let mut first = controller(&first_control, BindingOverrides::default());
    let mut second = controller(
        &second_control,
        BindingOverrides::default().with_min_duration(ms(100)),
    );

    let (tx, rx) = oneshot::channel::<()>();
    let value = BoundValue::future(rx);
    let click = TriggerEvent::dispatch(ControlId(1));
    first.bind(value.clone(), Some(&click)).expect("bind");
    second.bind(value, Some(&click)).expect("bind");

    tx.send(()).expect("settle");
    sleep(ms(10)).await;

    assert_eq!(first_button.class_name(), "");
    assert_eq!(second_button.class_name(), "is-loading");

    sleep(ms(100)).await;
    assert_eq!(second_button.class_name(), "");
}

#[tokio::test]
async fn dropping_the_binding_clears_the_loading_state() {
    let (button, control) = make_button(1);
    let mut binding = controller(&control, BindingOverrides::default());
    binding.bind(pending(), None).expect("bind");
    assert_eq!(button.class_name(), "is-loading");

    drop(binding);

    assert_eq!(button.class_name(), "");
    assert!(!button.snapshot().disabled);
    assert_eq!(button.adornment_count(), 0);
}

#[tokio::test]
async fn torn_down_control_reports_detached() {
    let (button, control) = make_button(1);
    let mut binding = controller(&control, BindingOverrides::default());
    drop(control);
    drop(button);

    assert_eq!(binding.bind(pending(), None).expect("bind"), BindOutcome::Detached);
    assert_eq!(binding.state(), BindingState::Idle);
}

#[test]
fn awaitable_needs_a_runtime() {
    let (button, control) = make_button(3);
    let mut binding = controller(&control, BindingOverrides::default());

    let err = binding.bind(pending(), None).expect_err("no runtime");
    assert!(matches!(err, BindError::NoRuntime { control } if control == ControlId(3)));
    assert_eq!(button.class_name(), "");

    assert_eq!(
        binding.bind(json!(1).into(), None).expect("plain values need no runtime"),
        BindOutcome::Idle
    );
}

fn tracked_operation(delay: Duration) -> (BoundValue, Arc<AtomicBool>) {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);
    let value = BoundValue::future(async move {
        sleep(delay).await;
        flag.store(true, Ordering::SeqCst);
    });
    (value, finished)
}

#[tokio::test(start_paused = true)]
async fn operation_runs_even_when_every_binding_declines() {
    let (_first_button, first_control) = make_button(1);
    let (_second_button, second_control) = make_button(2);
    let overrides = BindingOverrides::default().with_handle_current_btn_only(true);
    let mut first = controller(&first_control, overrides.clone());
    let mut second = controller(&second_control, overrides);

    let (value, finished) = tracked_operation(ms(10));
    let click = TriggerEvent::dispatch(ControlId(3));
    assert_eq!(
        first.bind(value.clone(), Some(&click)).expect("bind"),
        BindOutcome::Declined
    );
    assert_eq!(
        second.bind(value, Some(&click)).expect("bind"),
        BindOutcome::Declined
    );

    sleep(ms(20)).await;
    assert!(finished.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn rebinding_stops_watching_but_not_the_operation() {
    let (button, control) = make_button(1);
    let mut binding = controller(&control, BindingOverrides::default());

    let (value, finished) = tracked_operation(ms(10));
    assert_eq!(binding.bind(value, None).expect("bind"), BindOutcome::Entered);
    sleep(ms(2)).await;

    binding.bind(json!(null).into(), None).expect("rebind");
    assert_eq!(button.class_name(), "");

    sleep(ms(20)).await;
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(binding.state(), BindingState::Idle);
    assert_eq!(binding.machine().enter_count(), 1);
}

#[tokio::test]
async fn subscription_to_an_exhausted_stream_never_loads() {
    let (button, control) = make_button(1);
    let mut binding = controller(&control, BindingOverrides::default());

    let subscription = Subscription::spawn(futures::stream::empty::<()>());
    assert_eq!(
        binding.bind(subscription.into(), None).expect("bind"),
        BindOutcome::AlreadySettled
    );
    assert_eq!(binding.machine().enter_count(), 0);
    assert_eq!(button.class_name(), "");
}

#[test]
fn bind_without_a_runtime_leaves_the_trigger_unspent() {
    let (_button, control) = make_button(4);
    let mut binding = controller(
        &control,
        BindingOverrides::default().with_handle_current_btn_only(true),
    );
    let click = TriggerEvent::dispatch(ControlId(4));

    let err = binding.bind(pending(), Some(&click)).expect_err("no runtime");
    assert!(matches!(err, BindError::NoRuntime { .. }));
    assert!(!click.token().is_consumed());
}
