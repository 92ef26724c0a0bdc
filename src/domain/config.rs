//! Configuration models.
//!
//! Loaded from `config.toml`; every field has a default so a missing or
//! partial file is fine.

use std::path::PathBuf;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Where the Signal data lives and how to decrypt it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Signal Desktop data directory (defaults to the OS location).
    #[serde(default)]
    pub signal_dir: Option<PathBuf>,

    /// `sqlcipher` executable used to decrypt the database.
    #[serde(default = "default_sqlcipher_bin")]
    pub sqlcipher_bin: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            signal_dir: None,
            sqlcipher_bin: default_sqlcipher_bin(),
        }
    }
}

fn default_sqlcipher_bin() -> String {
    "sqlcipher".to_string()
}

/// Timezone used for the `[YYYY-MM-DD, HH:MM]` headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeZoneChoice {
    #[default]
    Local,
    Utc,
}

impl TimeZoneChoice {
    /// Format a millisecond timestamp with `fmt` in this zone.
    #[must_use]
    pub fn format_millis(self, millis: i64, fmt: &str) -> Option<String> {
        let utc = DateTime::<Utc>::from_timestamp_millis(millis)?;
        Some(match self {
            Self::Local => Local.from_utc_datetime(&utc.naive_utc()).format(fmt).to_string(),
            Self::Utc => utc.format(fmt).to_string(),
        })
    }
}

/// Export behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Messages per HTML page; 0 puts everything on one page.
    #[serde(default = "default_paginate")]
    pub paginate: usize,

    /// Whether to write `index.html` next to each transcript.
    #[serde(default = "default_true")]
    pub html: bool,

    /// Whether quoted replies are rendered.
    #[serde(default = "default_true")]
    pub quotes: bool,

    /// Worker threads; 0 uses the available parallelism.
    #[serde(default)]
    pub workers: usize,

    #[serde(default)]
    pub timezone: TimeZoneChoice,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            paginate: default_paginate(),
            html: true,
            quotes: true,
            workers: 0,
            timezone: TimeZoneChoice::default(),
        }
    }
}

const fn default_paginate() -> usize {
    100
}

const fn default_true() -> bool {
    true
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

impl AppConfig {
    /// Signal directory, configured or the OS default.
    #[must_use]
    pub fn signal_dir(&self) -> PathBuf {
        self.source
            .signal_dir
            .clone()
            .unwrap_or_else(Self::default_signal_dir)
    }

    /// Default Signal Desktop location for this OS.
    #[must_use]
    pub fn default_signal_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Signal")
    }

    /// Directory holding this tool's own configuration.
    #[must_use]
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("signal-chat-export")
    }

    /// Get the config file path.
    #[must_use]
    pub fn config_file_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Worker count with 0 resolved to the machine's parallelism.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        if self.export.workers > 0 {
            self.export.workers
        } else {
            std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.export.paginate, 100);
        assert!(config.export.html);
        assert!(config.export.quotes);
        assert_eq!(config.source.sqlcipher_bin, "sqlcipher");
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_signal_dir_override() {
        let config = AppConfig {
            source: SourceConfig {
                signal_dir: Some(PathBuf::from("/data/Signal")),
                ..SourceConfig::default()
            },
            ..AppConfig::default()
        };
        assert_eq!(config.signal_dir(), PathBuf::from("/data/Signal"));
    }

    #[test]
    fn test_format_millis_utc() {
        let s = TimeZoneChoice::Utc.format_millis(1_700_000_000_000, "%Y-%m-%d, %H:%M");
        assert_eq!(s.as_deref(), Some("2023-11-14, 22:13"));
    }
}
