//! `deliberate prospect` — research a prospect and print the brief as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use deliberate_agent::{ProspectBriefer, ProspectRequest};
use deliberate_core::event::EventBus;
use tokio_util::sync::CancellationToken;

use super::{cancel_on_ctrl_c, load_service, spawn_progress};

pub async fn run(
    company: String,
    industry: String,
    profile: Option<String>,
    profile_file: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let profile = match (profile, profile_file) {
        (Some(text), _) => text,
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| format!("Failed to read profile file {}: {e}", path.display()))?,
        (None, None) => String::new(),
    };

    let (config, service) = load_service()?;
    let bus = Arc::new(EventBus::default());
    let progress = spawn_progress(bus.subscribe());
    let token = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());

    let briefer = ProspectBriefer::new(service, config)
        .with_events(bus)
        .with_cancellation(token);
    let request = ProspectRequest::new(company, industry, profile);

    let result = briefer.brief(&request).await;
    drop(briefer);
    let _ = progress.await;

    let brief = result?;
    println!("{}", serde_json::to_string_pretty(&brief)?);
    Ok(())
}
