//! `deliberate config` — Configuration management commands.

use deliberate_config::AppConfig;

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let reachability = provider_status(&config).await;

    if config.provider.api_key.is_some() {
        config.provider.api_key = Some("***".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("# {}", AppConfig::config_path().display());
    println!("{toml_str}");
    println!("# provider {}: {reachability}", config.provider.kind);
    Ok(())
}

/// One-line reachability summary for the configured provider.
async fn provider_status(config: &AppConfig) -> String {
    let service = match deliberate_providers::build_from_config(config) {
        Ok(service) => service,
        Err(e) => return format!("not usable ({e})"),
    };
    match service.health_check().await {
        Ok(true) => "reachable".into(),
        Ok(false) => "responded with an error status".into(),
        Err(e) => format!("unreachable ({e})"),
    }
}

pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let path = AppConfig::config_path();
    if path.exists() {
        println!("   Config already exists at {}", path.display());
        return Ok(());
    }

    tokio::fs::create_dir_all(AppConfig::config_dir()).await?;
    tokio::fs::write(&path, AppConfig::default_toml()).await?;
    println!("   ✅ Wrote default config to {}", path.display());
    Ok(())
}
