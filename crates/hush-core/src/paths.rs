//! Centralized path utilities
//!
//! All application paths in one place for consistency

use std::path::PathBuf;

/// Get the hush config directory (~/.hush)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hush")
}

/// Get the secrets file (~/.hush/secrets.json)
pub fn secrets_path() -> PathBuf {
    config_dir().join("secrets.json")
}
