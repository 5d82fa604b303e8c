use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::AppConfig;
use crate::error::Result;

const CONFIG_DIR: &str = "hfoundry";
const CONFIG_FILE: &str = "config.toml";
const HUB_ENDPOINT_ENV: &str = "HF_ENDPOINT";

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load the config from an explicit path, or the default location when `None`.
///
/// An explicit path must exist. The default location is optional and falls
/// back to built-in defaults.
pub fn load(explicit: Option<&Path>) -> Result<AppConfig> {
    let mut config = match explicit {
        Some(path) => load_from(path)?,
        None => match config_path() {
            Some(path) if path.exists() => load_from(&path)?,
            Some(path) => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                AppConfig::default()
            }
            None => {
                debug!("No config directory found, using defaults");
                AppConfig::default()
            }
        },
    };

    if let Ok(endpoint) = std::env::var(HUB_ENDPOINT_ENV)
        && !endpoint.is_empty()
    {
        debug!(%endpoint, "Using hub endpoint from {HUB_ENDPOINT_ENV}");
        config.hub.endpoint = endpoint;
    }

    Ok(config)
}

pub fn load_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    debug!(path = %path.display(), "Loaded config");
    Ok(config)
}
