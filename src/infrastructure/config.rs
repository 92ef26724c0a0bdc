//! Configuration file management.
//!
//! Handles loading TOML configuration files.

use std::fs;
use std::path::Path;

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
pub const DEFAULT_CONFIG: &str = r#"# signal-chat-export configuration
# Every setting is optional; command-line flags take precedence.

[source]
# Signal Desktop data directory (defaults to <config dir>/Signal)
# signal_dir = "/home/me/.config/Signal"

# sqlcipher executable used to decrypt the database
sqlcipher_bin = "sqlcipher"

[export]
# Messages per HTML page (0 = everything on one page)
paginate = 100

# Write index.html next to every index.md
html = true

# Render quoted replies
quotes = true

# Worker threads (0 = available parallelism)
workers = 0

# Timezone for message headers: "local" or "utc"
timezone = "local"
"#;

/// Load the configuration from `path`, or from the default location.
/// A missing default file yields the built-in defaults; a missing explicit
/// file is an error.
///
/// # Errors
/// Returns error if file exists but cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        return load_config_from_file(path);
    }

    let config_path = AppConfig::config_file_path();
    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    let config = toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })?;

    tracing::debug!(path = %path.display(), "Loaded configuration");
    Ok(config)
}
