//! Loading `ProxyConfig` from disk

use std::fs;
use std::path::Path;

use aspect_engine::ProxyConfig;

use crate::error::RuntimeError;

/// Conventional file name for engine settings
pub const CONFIG_FILE_NAME: &str = "aspect.toml";

/// Parse configuration text
pub fn parse_config(content: &str) -> Result<ProxyConfig, RuntimeError> {
    Ok(ProxyConfig::from_toml_str(content)?)
}

/// Load configuration from `path`
pub fn load_config(path: impl AsRef<Path>) -> Result<ProxyConfig, RuntimeError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    tracing::debug!(path = %path.display(), namespace = %config.namespace, "loaded proxy config");
    Ok(config)
}

/// Load `aspect.toml` from `dir`, falling back to defaults when it is absent
pub fn load_config_in(dir: impl AsRef<Path>) -> Result<ProxyConfig, RuntimeError> {
    let path = dir.as_ref().join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(ProxyConfig::default());
    }
    load_config(path)
}
