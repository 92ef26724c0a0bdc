//! Decryption providers.
//!
//! The export engine only reads plaintext `SQLite`. A [`Decryptor`] turns the
//! user's source into such a file: either by running the `sqlcipher` shell
//! against the encrypted store, or by accepting a file that is already
//! decrypted.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempDir;

use crate::domain::{AppError, Result};

use super::signal_paths::SignalPaths;

const PLAINTEXT_NAME: &str = "plaintext.sqlite";

/// A plaintext database, kept alive for as long as the value lives.
#[derive(Debug)]
pub struct DecryptedDb {
    path: PathBuf,
    /// Scratch directory removed on drop.
    _scratch: Option<TempDir>,
}

impl DecryptedDb {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Produces a plaintext copy of the message store.
pub trait Decryptor {
    /// # Errors
    /// Returns error if no plaintext database can be produced.
    fn decrypt(&self) -> Result<DecryptedDb>;
}

/// A database that is already plaintext (`--decrypted`).
#[derive(Debug, Clone)]
pub struct PreDecrypted {
    pub path: PathBuf,
}

impl Decryptor for PreDecrypted {
    fn decrypt(&self) -> Result<DecryptedDb> {
        if !self.path.is_file() {
            return Err(AppError::SourceNotFound {
                path: self.path.clone(),
            });
        }
        Ok(DecryptedDb {
            path: self.path.clone(),
            _scratch: None,
        })
    }
}

/// Runs the `sqlcipher` command-line shell to export a plaintext copy.
#[derive(Debug, Clone)]
pub struct SqlcipherCli {
    pub binary: String,
    pub paths: SignalPaths,
}

impl SqlcipherCli {
    #[must_use]
    pub const fn new(binary: String, paths: SignalPaths) -> Self {
        Self { binary, paths }
    }
}

/// Script fed to the `sqlcipher` shell on stdin.
fn export_script(key: &str, plaintext: &Path) -> String {
    let target = plaintext.display().to_string().replace('\'', "''");
    format!(
        "PRAGMA key = \"x'{key}'\";\n\
         ATTACH DATABASE '{target}' AS plaintext KEY '';\n\
         SELECT sqlcipher_export('plaintext');\n\
         DETACH DATABASE plaintext;\n"
    )
}

impl Decryptor for SqlcipherCli {
    fn decrypt(&self) -> Result<DecryptedDb> {
        if !self.paths.db.is_file() {
            return Err(AppError::SourceNotFound {
                path: self.paths.db.clone(),
            });
        }
        let key = self.paths.read_key()?;

        let scratch = tempfile::Builder::new()
            .prefix("signal-chat-export")
            .tempdir()
            .map_err(|e| AppError::io("Failed to create scratch directory", e))?;
        let plaintext = scratch.path().join(PLAINTEXT_NAME);

        tracing::info!(binary = %self.binary, "Decrypting database");

        let mut child = Command::new(&self.binary)
            .arg(&self.paths.db)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::Decryption {
                message: format!("cannot run '{}' (is sqlcipher installed?)", self.binary),
                source: Some(e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(export_script(&key, &plaintext).as_bytes())
                .map_err(|e| AppError::Decryption {
                    message: "failed to send script to sqlcipher".to_string(),
                    source: Some(e),
                })?;
        }

        let output = child.wait_with_output().map_err(|e| AppError::Decryption {
            message: "sqlcipher did not finish".to_string(),
            source: Some(e),
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let exported = plaintext.metadata().is_ok_and(|m| m.len() > 0);
        if !output.status.success() || !exported {
            return Err(AppError::Decryption {
                message: format!("sqlcipher export failed: {}", stderr.trim()),
                source: None,
            });
        }

        tracing::debug!(path = %plaintext.display(), "Decrypted copy written");

        Ok(DecryptedDb {
            path: plaintext,
            _scratch: Some(scratch),
        })
    }
}
