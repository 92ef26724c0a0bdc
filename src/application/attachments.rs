//! Attachment resolver.
//!
//! Every attachment is identified by the SHA-256 of its blob. Stored files are
//! named `<first 16 hex>.<ext>` after the first occurrence of the content, so
//! byte-identical attachments resolve to one file name no matter how the
//! sender named them. The registry is shared by all workers of a run; file IO
//! happens outside its lock.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::transcript::MEDIA_DIR;
use crate::domain::{AttachmentIssue, AttachmentState, AttachmentStats, ExportUnit, TranscriptEntry};
use crate::infrastructure::output_writer::{copy_atomic, fingerprint_file};

/// Hex characters of the fingerprint used in stored file names.
const FINGERPRINT_NAME_LEN: usize = 16;

/// How a resolved attachment ended up on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Copied from the source blob.
    Copied,
    /// Hard-linked (or copied) from a copy stored for another conversation.
    Linked,
    /// An identical file was already at the target.
    Reused,
}

/// File name for a stored attachment.
#[must_use]
pub fn stored_file_name(fingerprint: &str, extension: &str) -> String {
    let prefix = fingerprint.get(..FINGERPRINT_NAME_LEN).unwrap_or(fingerprint);
    format!("{prefix}.{extension}")
}

#[derive(Debug, Default)]
struct RegistryState {
    /// Fingerprint -> stored file name, fixed by the first occurrence.
    names: HashMap<String, String>,
    /// Fingerprint -> first complete copy on disk.
    stored: HashMap<String, PathBuf>,
    /// Source blob -> fingerprint, so each blob is hashed once.
    hashed: HashMap<PathBuf, String>,
}

/// Run-wide deduplication map, safe to share between worker threads.
#[derive(Debug, Default)]
pub struct AttachmentRegistry {
    state: Mutex<RegistryState>,
}

impl AttachmentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fingerprint a blob, reusing an earlier result for the same path.
    ///
    /// # Errors
    /// Returns error if the blob cannot be read.
    pub fn fingerprint(&self, source: &Path) -> io::Result<String> {
        if let Some(fp) = self.lock().hashed.get(source) {
            return Ok(fp.clone());
        }
        let fp = fingerprint_file(source)?;
        self.lock()
            .hashed
            .entry(source.to_path_buf())
            .or_insert_with(|| fp.clone());
        Ok(fp)
    }

    /// Stored file name for `fingerprint`. The first caller fixes the
    /// extension; later callers get the same name.
    pub fn claim_name(&self, fingerprint: &str, extension: &str) -> String {
        self.lock()
            .names
            .entry(fingerprint.to_string())
            .or_insert_with(|| stored_file_name(fingerprint, extension))
            .clone()
    }

    fn stored_copy(&self, fingerprint: &str) -> Option<PathBuf> {
        self.lock().stored.get(fingerprint).cloned()
    }

    fn publish(&self, fingerprint: &str, target: &Path) {
        self.lock()
            .stored
            .entry(fingerprint.to_string())
            .or_insert_with(|| target.to_path_buf());
    }

    /// Put the blob with `fingerprint` at `target`. A file already there is
    /// kept only if its contents match; a damaged one is replaced.
    ///
    /// # Errors
    /// Returns error if the target cannot be written.
    pub fn place(&self, source: &Path, fingerprint: &str, target: &Path) -> io::Result<Placement> {
        if target.is_file() {
            if fingerprint_file(target).is_ok_and(|existing| existing == fingerprint) {
                self.publish(fingerprint, target);
                return Ok(Placement::Reused);
            }
            tracing::warn!(path = %target.display(), "Replacing damaged attachment copy");
            fs::remove_file(target)?;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let placement = match self.stored_copy(fingerprint) {
            Some(stored) if stored != target => {
                if fs::hard_link(&stored, target).is_err() {
                    copy_atomic(&stored, target)?;
                }
                Placement::Linked
            }
            _ => {
                copy_atomic(source, target)?;
                Placement::Copied
            }
        };
        self.publish(fingerprint, target);
        Ok(placement)
    }

    /// Number of distinct fingerprints stored so far.
    #[must_use]
    pub fn stored_count(&self) -> usize {
        self.lock().stored.len()
    }
}

/// Resolves attachment references of a chat against the source blobs.
pub struct AttachmentResolver<'a> {
    source_root: &'a Path,
    registry: &'a AttachmentRegistry,
}

impl<'a> AttachmentResolver<'a> {
    #[must_use]
    pub const fn new(source_root: &'a Path, registry: &'a AttachmentRegistry) -> Self {
        Self {
            source_root,
            registry,
        }
    }

    /// Resolve the attachments of every fresh message in `unit` into
    /// `conversation_dir/media`. Blocks from a previous export already point
    /// at their files. Missing blobs become placeholders and are reported,
    /// never fatal.
    pub fn resolve_unit(
        &self,
        unit: &mut ExportUnit,
        conversation_dir: &Path,
    ) -> (AttachmentStats, Vec<AttachmentIssue>) {
        let media_dir = conversation_dir.join(MEDIA_DIR);
        let conversation = unit.conversation.display_name.clone();
        let mut stats = AttachmentStats::default();
        let mut issues = Vec::new();

        let fresh = unit.entries.iter_mut().filter_map(|e| match e {
            TranscriptEntry::Fresh(msg) if !msg.deleted => Some(msg),
            _ => None,
        });
        for msg in fresh {
            for att in &mut msg.attachments {
                let outcome = self.locate(att.storage_key.as_deref()).and_then(|blob| {
                    let fp = self
                        .registry
                        .fingerprint(&blob)
                        .map_err(|e| format!("unreadable blob: {e}"))?;
                    let file_name = self.registry.claim_name(&fp, &att.extension());
                    let placement = self
                        .registry
                        .place(&blob, &fp, &media_dir.join(&file_name))
                        .map_err(|e| format!("copy failed: {e}"))?;
                    Ok((file_name, placement))
                });

                match outcome {
                    Ok((file_name, placement)) => {
                        match placement {
                            Placement::Copied => stats.copied += 1,
                            Placement::Linked => stats.linked += 1,
                            Placement::Reused => stats.reused += 1,
                        }
                        att.state = AttachmentState::Stored { file_name };
                    }
                    Err(reason) => {
                        tracing::warn!(
                            conversation = %conversation,
                            attachment = %att.display_name(),
                            "Attachment not exported: {reason}"
                        );
                        issues.push(AttachmentIssue {
                            conversation: conversation.clone(),
                            name: att.display_name(),
                            reason: reason.clone(),
                        });
                        att.state = AttachmentState::Missing { reason };
                    }
                }
            }
        }

        (stats, issues)
    }

    /// Map a storage key to a blob path inside the source root.
    fn locate(&self, storage_key: Option<&str>) -> Result<PathBuf, String> {
        let key = storage_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| "no storage key".to_string())?;
        let normalized = key.replace('\\', "/");
        let relative = Path::new(&normalized);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(format!("unsafe storage key {key}"));
        }
        let path = self.source_root.join(relative);
        if path.is_file() {
            Ok(path)
        } else {
            Err("blob not found".to_string())
        }
    }
}
