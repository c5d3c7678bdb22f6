//! Config file discovery and reading.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the devauth config directory.
/// Priority: `DEVAUTH_CONFIG_DIR` env > platform config dir (`~/.config/devauth`) > `./`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("DEVAUTH_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::config_dir() {
        Some(base) => base.join("devauth"),
        None => PathBuf::from("."),
    }
}

/// Resolve the full path to the main config file.
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Read the config file as an untyped value tree, ready for env substitution.
///
/// Returns an empty object if the file doesn't exist or is empty.
pub async fn load_raw(path: &Path) -> Result<Value> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(Value::Object(Default::default()));
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    let value: Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(match value {
        Value::Null => Value::Object(Default::default()),
        other => other,
    })
}
