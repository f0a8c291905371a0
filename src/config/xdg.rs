//! XDG base directories for global config, resources, and per-workspace data.

use crate::error::ApiError;
use std::path::{Component, Path, PathBuf};

/// `$XDG_DATA_HOME`, falling back to `$HOME/.local/share`
pub fn data_home() -> Option<PathBuf> {
    if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        if !xdg_data_home.is_empty() {
            return Some(PathBuf::from(xdg_data_home));
        }
    }

    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local").join("share"))
}

/// `$XDG_CONFIG_HOME`, falling back to `$HOME/.config`
pub fn config_home() -> Result<PathBuf, ApiError> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Ok(PathBuf::from(xdg_config_home));
        }
    }

    let home = std::env::var("HOME").map_err(|_| {
        ApiError::ConfigError(
            "Could not determine XDG config home directory (HOME not set)".to_string(),
        )
    })?;
    Ok(PathBuf::from(home).join(".config"))
}

/// `$XDG_CONFIG_HOME/weft/config.toml`
pub fn global_config_path() -> Result<PathBuf, ApiError> {
    Ok(config_home()?.join("weft").join("config.toml"))
}

/// `$XDG_CONFIG_HOME/weft/resources`, the user-wide resource root
pub fn global_resources_dir() -> Result<PathBuf, ApiError> {
    Ok(config_home()?.join("weft").join("resources"))
}

/// `base` extended with the canonical workspace path as nested directories.
///
/// `/home/user/project` under `base` becomes `base/home/user/project`.
pub fn scoped_dir(base: &Path, workspace_root: &Path) -> Result<PathBuf, ApiError> {
    let canonical = dunce::canonicalize(workspace_root).map_err(|e| {
        ApiError::ConfigError(format!("Failed to canonicalize workspace path: {}", e))
    })?;

    let mut dir = base.to_path_buf();
    for component in canonical.components() {
        if let Component::Normal(name) = component {
            dir.push(name);
        }
    }
    Ok(dir)
}

/// `$XDG_DATA_HOME/weft/<workspace path>/`
pub fn workspace_data_dir(workspace_root: &Path) -> Result<PathBuf, ApiError> {
    let data_home = data_home().ok_or_else(|| {
        ApiError::ConfigError(
            "Could not determine XDG data home directory (HOME not set)".to_string(),
        )
    })?;
    scoped_dir(&data_home.join("weft"), workspace_root)
}
