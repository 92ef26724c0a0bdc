//! Signal Desktop path discovery.
//!
//! Locates the encrypted database, the key file and the attachment store
//! inside a Signal data directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::{AppError, Result};

const DB_PATH: &str = "sql/db.sqlite";
const KEY_FILE: &str = "config.json";
const ATTACHMENTS_DIR: &str = "attachments.noindex";

/// Resolved locations inside a Signal data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalPaths {
    pub dir: PathBuf,
    pub db: PathBuf,
    pub key_file: PathBuf,
    pub attachments: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyFile {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    encrypted_key: Option<String>,
}

impl SignalPaths {
    /// Paths under `dir`, without touching the filesystem.
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            db: dir.join(DB_PATH),
            key_file: dir.join(KEY_FILE),
            attachments: dir.join(ATTACHMENTS_DIR),
        }
    }

    /// Paths under `dir`, checking that the database exists.
    ///
    /// # Errors
    /// Returns [`AppError::SourceNotFound`] if the directory or database is missing.
    pub fn discover(dir: &Path) -> Result<Self> {
        let paths = Self::new(dir);
        if !paths.dir.is_dir() {
            return Err(AppError::SourceNotFound { path: paths.dir });
        }
        if !paths.db.is_file() {
            return Err(AppError::SourceNotFound { path: paths.db });
        }
        tracing::debug!("Found Signal database at: {}", paths.db.display());
        Ok(paths)
    }

    /// Read the hex database key from `config.json`.
    ///
    /// # Errors
    /// Returns [`AppError::KeyUnavailable`] if the file is missing, malformed,
    /// or only holds an OS-keychain encrypted key.
    pub fn read_key(&self) -> Result<String> {
        let content = fs::read_to_string(&self.key_file).map_err(|e| AppError::KeyUnavailable {
            message: format!("cannot read {}: {e}", self.key_file.display()),
        })?;
        let parsed: KeyFile = serde_json::from_str(&content).map_err(|e| AppError::KeyUnavailable {
            message: format!("malformed {}: {e}", self.key_file.display()),
        })?;

        match (parsed.key, parsed.encrypted_key) {
            (Some(key), _) if is_hex_key(&key) => Ok(key),
            (Some(_), _) => Err(AppError::KeyUnavailable {
                message: "key in config.json is not hexadecimal".to_string(),
            }),
            (None, Some(_)) => Err(AppError::KeyUnavailable {
                message: "config.json only holds an encryptedKey; keychain-protected keys are not supported"
                    .to_string(),
            }),
            (None, None) => Err(AppError::KeyUnavailable {
                message: "config.json has no key".to_string(),
            }),
        }
    }
}

fn is_hex_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout() {
        let paths = SignalPaths::new(Path::new("/home/u/.config/Signal"));
        assert_eq!(paths.db, PathBuf::from("/home/u/.config/Signal/sql/db.sqlite"));
        assert_eq!(
            paths.attachments,
            PathBuf::from("/home/u/.config/Signal/attachments.noindex")
        );
    }

    #[test]
    fn test_discover_requires_database() {
        let dir = tempdir().unwrap();
        let err = SignalPaths::discover(dir.path()).unwrap_err();
        assert!(matches!(err, AppError::SourceNotFound { ref path } if path.ends_with("sql/db.sqlite")));

        fs::create_dir_all(dir.path().join("sql")).unwrap();
        fs::write(dir.path().join("sql/db.sqlite"), b"").unwrap();
        assert!(SignalPaths::discover(dir.path()).is_ok());
    }

    #[test]
    fn test_read_key() {
        let dir = tempdir().unwrap();
        let paths = SignalPaths::new(dir.path());

        assert!(matches!(paths.read_key(), Err(AppError::KeyUnavailable { .. })));

        fs::write(&paths.key_file, r#"{"key": "00ff11aa"}"#).unwrap();
        assert_eq!(paths.read_key().unwrap(), "00ff11aa");

        fs::write(&paths.key_file, r#"{"encryptedKey": "763130..."}"#).unwrap();
        let err = paths.read_key().unwrap_err();
        assert!(err.to_string().contains("encryptedKey"));

        fs::write(&paths.key_file, r#"{"key": "x'; DROP"}"#).unwrap();
        assert!(paths.read_key().is_err());
    }
}
