use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use promise_btn::{BindingController, Control, ControlId, TriggerEvent};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod console_control;
mod operations;

use config::{load_global_config, DEFAULT_CONFIG_PATH};
use console_control::ConsoleControl;
use operations::{operation, Source};

const MAX_RUN: Duration = Duration::from_secs(30);

/// Binds simulated operations to terminal buttons and prints how each
/// button looks while the operation runs.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Number of buttons bound to the same operation.
    #[arg(long, default_value_t = 2)]
    buttons: u8,
    /// Button id the triggering click originates from; omit to bind
    /// programmatically.
    #[arg(long)]
    click: Option<i64>,
    #[arg(long, value_enum, default_value_t = Source::Future)]
    source: Source,
    #[arg(long, default_value_t = 120)]
    settle_after_ms: u64,
    /// Overrides the configured minimum loading duration.
    #[arg(long)]
    min_duration_ms: Option<u64>,
    #[arg(long)]
    current_btn_only: bool,
    /// Makes the simulated operation fail.
    #[arg(long)]
    fail: bool,
    #[arg(long, default_value_t = 20)]
    tick_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut global = load_global_config(&args.config)?;
    if let Some(min_duration_ms) = args.min_duration_ms {
        global.min_duration_ms = Some(min_duration_ms);
    }
    if args.current_btn_only {
        global.handle_current_btn_only = Some(true);
    }
    let global = Arc::new(global);
    info!(config = ?global, "registered global button config");

    let controls: Vec<Arc<ConsoleControl>> = (1..=args.buttons)
        .map(|n| {
            Arc::new(ConsoleControl::new(
                ControlId(i64::from(n)),
                format!("button-{n}"),
            ))
        })
        .collect();
    let mut bindings: Vec<BindingController> = controls
        .iter()
        .map(|control| {
            let control: Arc<dyn Control> = control.clone();
            BindingController::new(&control, Arc::clone(&global))
        })
        .collect();

    let value = operation(
        args.source,
        Duration::from_millis(args.settle_after_ms),
        args.fail,
    );
    let trigger = args.click.map(|origin| TriggerEvent::dispatch(ControlId(origin)));

    for (binding, control) in bindings.iter_mut().zip(&controls) {
        let outcome = binding
            .bind(value.clone(), trigger.as_ref())
            .with_context(|| format!("failed to bind {}", control.label()))?;
        println!("{} -> {outcome:?}", control.label());
    }

    let started = Instant::now();
    let tick = Duration::from_millis(args.tick_ms.max(1));
    let mut last_frame = String::new();
    loop {
        let frame = controls
            .iter()
            .map(|control| control.render())
            .collect::<Vec<_>>()
            .join(" | ");
        if frame != last_frame {
            println!("{:>6}ms  {frame}", started.elapsed().as_millis());
            last_frame = frame;
        }

        if bindings.iter().all(|binding| !binding.state().is_busy()) {
            break;
        }
        if started.elapsed() >= MAX_RUN {
            warn!("operation still pending after {MAX_RUN:?}; giving up");
            break;
        }
        sleep(tick).await;
    }

    Ok(())
}
