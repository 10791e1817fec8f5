//! Service status probe.

use console::style;

use airi_types::config::AppConfig;

/// Probe the service's health endpoint and report what is running.
pub async fn status(config: &AppConfig) -> anyhow::Result<()> {
    let service_url = config.client.service_url.trim_end_matches('/');
    let url = format!("{service_url}/health");

    let response = reqwest::Client::new()
        .get(&url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| anyhow::anyhow!("service at {service_url} is not reachable: {e}"))?;

    let health: serde_json::Value = response.json().await?;

    println!();
    println!(
        "  {} Service at {} is {}",
        style("●").green(),
        style(service_url).cyan(),
        health["status"].as_str().unwrap_or("unknown")
    );
    if let Some(character) = health["character"].as_str() {
        println!(
            "  {} Character: {} ({})",
            style("·").dim(),
            style(character).cyan(),
            health["role"].as_str().unwrap_or("-")
        );
    }
    println!();

    Ok(())
}
