//! `deliberate run` — run the control loop on a free-form task.

use std::sync::Arc;

use deliberate_agent::{ControlLoop, RunState};
use deliberate_core::event::EventBus;
use tokio_util::sync::CancellationToken;

use super::{cancel_on_ctrl_c, load_service, spawn_progress};

pub async fn run(task: String, max_steps: Option<u32>) -> Result<(), Box<dyn std::error::Error>> {
    let (config, service) = load_service()?;
    let registry = Arc::new(deliberate_tools::default_registry());

    let bus = Arc::new(EventBus::default());
    let progress = spawn_progress(bus.subscribe());
    let token = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());

    let mut control = ControlLoop::from_config(service, registry, &config)
        .with_events(bus)
        .with_cancellation(token);
    if let Some(max) = max_steps {
        control = control.with_max_steps(max);
    }

    let result = control.run(&task).await;
    // Dropping the loop closes the bus so the progress printer drains and exits.
    drop(control);
    let _ = progress.await;

    let outcome = result?;
    println!();
    println!("{}", outcome.answer);
    if outcome.state != RunState::Stopped {
        eprintln!();
        eprintln!("  (run ended: {})", outcome.state);
    }
    Ok(())
}
