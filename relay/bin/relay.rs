#![deny(clippy::pedantic, clippy::all, clippy::nursery)]

use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = find_config_file()?;
    let config_content = std::fs::read_to_string(&config_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to read config from {}: {e}",
            config_path.display()
        )
    })?;
    let relay: relay::controller::Relay = ron::from_str(&config_content)?;

    relay.run().await
}

/// Locate the configuration file, in order of precedence:
/// 1. `RELAY_CONFIG` environment variable
/// 2. ./relay.config.ron
/// 3. /etc/relay/relay.config.ron
fn find_config_file() -> anyhow::Result<PathBuf> {
    if let Ok(env_path) = std::env::var("RELAY_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!("RELAY_CONFIG points to non-existent file: {}", path.display());
    }

    let default_paths = [
        PathBuf::from("./relay.config.ron"),
        PathBuf::from("/etc/relay/relay.config.ron"),
    ];

    if let Some(path) = default_paths.iter().find(|p| p.exists()) {
        return Ok(path.clone());
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - RELAY_CONFIG environment variable\n{paths_tried}"
    )
}
