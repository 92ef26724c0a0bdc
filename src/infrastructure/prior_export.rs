//! Read access to a previous export directory.
//!
//! Layout: `<root>/<dir_name>/index.md` plus `<root>/<dir_name>/media/`.
//! Nothing here ever writes below the root.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::transcript::{parse_transcript, MEDIA_DIR};
use crate::domain::{AppError, Result, TranscriptBlock};

/// Transcript file name inside a conversation directory.
pub const TRANSCRIPT_FILE: &str = "index.md";

/// What a previous export holds for one conversation.
#[derive(Debug)]
pub enum PriorTranscript {
    /// No directory or no transcript for this conversation.
    Absent,
    /// Parsed blocks, in file order.
    Parsed(Vec<TranscriptBlock>),
    /// The file exists but could not be read or parsed.
    Unreadable(String),
}

/// A previous export, opened read-only.
#[derive(Debug, Clone)]
pub struct PriorExport {
    root: PathBuf,
}

impl PriorExport {
    /// # Errors
    /// Returns [`AppError::SourceNotFound`] if `root` is not a directory.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(AppError::SourceNotFound {
                path: root.to_path_buf(),
            });
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Directory names of conversations that have a transcript, sorted.
    ///
    /// # Errors
    /// Returns error if the root cannot be listed.
    pub fn conversation_dirs(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| AppError::io(format!("Failed to list {}", self.root.display()), e))?;

        let mut names: Vec<String> = entries
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.path().join(TRANSCRIPT_FILE).is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Path of a conversation's transcript.
    #[must_use]
    pub fn transcript_path(&self, dir_name: &str) -> PathBuf {
        self.root.join(dir_name).join(TRANSCRIPT_FILE)
    }

    /// Media directory of a conversation.
    #[must_use]
    pub fn media_dir(&self, dir_name: &str) -> PathBuf {
        self.root.join(dir_name).join(MEDIA_DIR)
    }

    /// Raw transcript text.
    ///
    /// # Errors
    /// Returns error if the file cannot be read.
    pub fn raw_transcript(&self, dir_name: &str) -> std::io::Result<String> {
        fs::read_to_string(self.transcript_path(dir_name))
    }

    /// Parse the transcript of one conversation.
    #[must_use]
    pub fn transcript(&self, dir_name: &str) -> PriorTranscript {
        let path = self.transcript_path(dir_name);
        if !path.is_file() {
            return PriorTranscript::Absent;
        }
        match fs::read_to_string(&path) {
            Ok(text) => match parse_transcript(&text) {
                Ok(blocks) => {
                    tracing::debug!(
                        conversation = dir_name,
                        blocks = blocks.len(),
                        "Parsed previous transcript"
                    );
                    PriorTranscript::Parsed(blocks)
                }
                Err(e) => PriorTranscript::Unreadable(e.to_string()),
            },
            Err(e) => PriorTranscript::Unreadable(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_requires_directory() {
        let dir = tempdir().unwrap();
        assert!(PriorExport::open(&dir.path().join("missing")).is_err());
        assert!(PriorExport::open(dir.path()).is_ok());
    }

    #[test]
    fn test_transcript_states() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Aya")).unwrap();
        fs::write(
            dir.path().join("Aya/index.md"),
            "[2024-01-02, 10:00] Aya: hi\n\n",
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("Notes")).unwrap();
        fs::write(dir.path().join("Notes/index.md"), "# my own notes\n").unwrap();
        fs::create_dir_all(dir.path().join("Empty")).unwrap();

        let prior = PriorExport::open(dir.path()).unwrap();
        assert_eq!(prior.conversation_dirs().unwrap(), vec!["Aya", "Notes"]);
        assert!(matches!(prior.transcript("Aya"), PriorTranscript::Parsed(ref b) if b.len() == 1));
        assert!(matches!(prior.transcript("Notes"), PriorTranscript::Unreadable(_)));
        assert!(matches!(prior.transcript("Empty"), PriorTranscript::Absent));
        assert!(matches!(prior.transcript("Nobody"), PriorTranscript::Absent));
    }
}
