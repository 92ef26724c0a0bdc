//! Writes the export directory.
//!
//! The destination is prepared once per run; each conversation then gets its
//! own directory with `index.md`, optionally `index.html`, and `media/`.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::domain::transcript::MEDIA_DIR;
use crate::domain::{AppError, Result};

use super::prior_export::TRANSCRIPT_FILE;

const HTML_FILE: &str = "index.html";

/// Hex SHA-256 of a file's contents.
///
/// # Errors
/// Returns error if the file cannot be read.
pub fn fingerprint_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Copy `source` to `target` through a temporary file in the target's
/// directory, so `target` is either absent or complete.
///
/// # Errors
/// Returns error if the copy or the final rename fails.
pub fn copy_atomic(source: &Path, target: &Path) -> io::Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    io::copy(&mut fs::File::open(source)?, tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(target)?;
    Ok(())
}

/// Make sure `dest` can receive a fresh export.
///
/// # Errors
/// Returns [`AppError::MergeIntoSelf`] if `dest` is the previous export,
/// [`AppError::NestedExport`] if one contains the other,
/// [`AppError::DestinationNotEmpty`] if it holds files and `overwrite` is
/// off, or an IO error if it cannot be created.
pub fn prepare_destination(dest: &Path, old: Option<&Path>, overwrite: bool) -> Result<()> {
    if let Some(old) = old {
        let (dest_abs, old_abs) = (resolved(dest), resolved(old));
        if dest_abs == old_abs {
            return Err(AppError::MergeIntoSelf {
                path: dest.to_path_buf(),
            });
        }
        if dest_abs.starts_with(&old_abs) || old_abs.starts_with(&dest_abs) {
            return Err(AppError::NestedExport {
                dest: dest.to_path_buf(),
                old: old.to_path_buf(),
            });
        }
    }

    if dest.exists() {
        let mut entries = fs::read_dir(dest)
            .map_err(|e| AppError::io(format!("Failed to read {}", dest.display()), e))?;
        if entries.next().is_some() && !overwrite {
            return Err(AppError::DestinationNotEmpty {
                path: dest.to_path_buf(),
            });
        }
    }

    fs::create_dir_all(dest)
        .map_err(|e| AppError::io(format!("Failed to create {}", dest.display()), e))?;

    tracing::debug!(path = %dest.display(), "Destination ready");
    Ok(())
}

/// Canonical form of `path`; the missing tail of a path that does not exist
/// yet is appended to its closest existing ancestor.
fn resolved(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut missing: Vec<OsString> = Vec::new();
    loop {
        let base = if existing.as_os_str().is_empty() {
            Path::new(".")
        } else {
            existing
        };
        if let Ok(mut canonical) = base.canonicalize() {
            canonical.extend(missing.iter().rev());
            return canonical;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// Files of one conversation directory.
#[derive(Debug, Clone)]
pub struct ConversationFiles {
    dir: PathBuf,
}

impl ConversationFiles {
    #[must_use]
    pub fn new(dest: &Path, dir_name: &str) -> Self {
        Self {
            dir: dest.join(dir_name),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn media_dir(&self) -> PathBuf {
        self.dir.join(MEDIA_DIR)
    }

    /// Write the transcript and, when given, its HTML view.
    ///
    /// # Errors
    /// Returns error if the directory or a file cannot be written.
    pub fn write(&self, markdown: &str, html: Option<&str>) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(TRANSCRIPT_FILE), markdown)?;
        if let Some(html) = html {
            fs::write(self.dir.join(HTML_FILE), html)?;
        }
        Ok(())
    }

    /// Copy media files from a previous export. A file already present with
    /// the same contents is kept; one that differs (left by an interrupted
    /// run) is replaced. Returns the number of files copied.
    ///
    /// # Errors
    /// Returns error if a file cannot be read or copied.
    pub fn carry_media(&self, old_media: &Path) -> io::Result<usize> {
        if !old_media.is_dir() {
            return Ok(0);
        }
        let target_dir = self.media_dir();
        let mut copied = 0;
        for entry in fs::read_dir(old_media)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let source = entry.path();
            let target = target_dir.join(entry.file_name());
            if target.is_file() && fingerprint_file(&target)? == fingerprint_file(&source)? {
                continue;
            }
            copy_atomic(&source, &target)?;
            copied += 1;
        }
        Ok(copied)
    }
}
