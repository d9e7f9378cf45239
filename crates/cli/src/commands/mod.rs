//! Subcommand implementations.

pub mod config_cmd;
pub mod prospect;
pub mod run;

use std::sync::Arc;

use deliberate_config::AppConfig;
use deliberate_core::event::LoopEvent;
use deliberate_core::provider::CompletionService;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Load configuration and build the configured completion service.
pub fn load_service() -> Result<(AppConfig, Arc<dyn CompletionService>), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let service = deliberate_providers::build_from_config(&config)?;
    Ok((config, service))
}

/// Cancel `token` on Ctrl-C. The loop notices between steps.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n  Cancelling after the current step...");
            token.cancel();
        }
    });
}

/// Print one line per loop milestone to stderr until the bus closes.
pub fn spawn_progress(mut rx: broadcast::Receiver<Arc<LoopEvent>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(line) = progress_line(&event) {
                        eprintln!("{line}");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn progress_line(event: &LoopEvent) -> Option<String> {
    match event {
        LoopEvent::StepStarted { step, .. } => Some(format!("  ▸ step {step}")),
        LoopEvent::Decided {
            next_action,
            capability_id,
            confidence,
            ..
        } => {
            let target = if capability_id.is_empty() {
                String::new()
            } else {
                format!(" [{capability_id}]")
            };
            Some(format!("    decided: {next_action}{target} (confidence {confidence:.2})"))
        }
        LoopEvent::CapabilityInvoked {
            capability_id,
            success,
            duration_ms,
            ..
        } => {
            let mark = if *success { "ok" } else { "failed" };
            Some(format!("    {capability_id}: {mark} in {duration_ms}ms"))
        }
        LoopEvent::StopRejected { reason, .. } => Some(format!("    stop rejected: {reason}")),
        LoopEvent::Finished { state, steps, .. } => Some(format!("  ■ {state} after {steps} step(s)")),
        LoopEvent::Reasoned { .. } | LoopEvent::Reflected { .. } => None,
    }
}
