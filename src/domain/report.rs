//! Non-fatal defects and the post-run summary.
//!
//! Row, attachment and merge defects never abort a run. They are collected
//! here so partial success stays visible.

use std::fmt;
use std::path::PathBuf;

/// Why a row was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The message references a conversation id that does not exist.
    OrphanConversation(String),
    /// The message has no conversation id at all.
    MissingConversation,
    /// The message JSON could not be decoded.
    MalformedJson(String),
    /// No usable timestamp.
    MissingTimestamp,
    /// The row could not be read from the database.
    Unreadable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrphanConversation(id) => write!(f, "unknown conversation {id}"),
            Self::MissingConversation => write!(f, "no conversation id"),
            Self::MalformedJson(e) => write!(f, "malformed json: {e}"),
            Self::MissingTimestamp => write!(f, "no timestamp"),
            Self::Unreadable(e) => write!(f, "unreadable row: {e}"),
        }
    }
}

/// A skipped source row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDefect {
    pub table: &'static str,
    /// `rowid` when known.
    pub sequence: Option<i64>,
    pub reason: SkipReason,
}

/// An attachment whose blob could not be exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentIssue {
    pub conversation: String,
    pub name: String,
    pub reason: String,
}

/// A conversation whose previous export could not be merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeWarning {
    pub conversation: String,
    pub path: PathBuf,
    pub reason: String,
}

/// Counters for attachment placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttachmentStats {
    /// Blobs copied from the source.
    pub copied: usize,
    /// Hard links (or copies) made from an already exported blob.
    pub linked: usize,
    /// References that pointed at a file already in place.
    pub reused: usize,
    /// Files brought over from the previous export.
    pub carried: usize,
}

impl AttachmentStats {
    pub fn absorb(&mut self, other: Self) {
        self.copied += other.copied;
        self.linked += other.linked;
        self.reused += other.reused;
        self.carried += other.carried;
    }
}

/// What happened to one conversation.
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    pub messages_written: usize,
    pub merged: bool,
    pub carried_over: bool,
    pub attachments: AttachmentStats,
    pub attachment_issues: Vec<AttachmentIssue>,
    pub merge_warnings: Vec<MergeWarning>,
}

/// Summary of a whole run.
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub conversations_written: usize,
    pub conversations_merged: usize,
    pub conversations_carried_over: usize,
    pub messages_written: usize,
    pub rows_filtered: usize,
    pub row_defects: Vec<RowDefect>,
    pub attachments: AttachmentStats,
    pub attachment_issues: Vec<AttachmentIssue>,
    pub merge_warnings: Vec<MergeWarning>,
    /// Per-conversation write failures; the rest of the run continued.
    pub failed_conversations: Vec<(String, String)>,
}

impl ExportReport {
    /// Fold one conversation's outcome into the totals.
    pub fn absorb(&mut self, outcome: ChatOutcome) {
        self.conversations_written += 1;
        self.messages_written += outcome.messages_written;
        if outcome.merged {
            self.conversations_merged += 1;
        }
        if outcome.carried_over {
            self.conversations_carried_over += 1;
        }
        self.attachments.absorb(outcome.attachments);
        self.attachment_issues.extend(outcome.attachment_issues);
        self.merge_warnings.extend(outcome.merge_warnings);
    }

    /// Whether anything non-fatal went wrong.
    #[must_use]
    pub fn has_issues(&self) -> bool {
        !self.row_defects.is_empty()
            || !self.attachment_issues.is_empty()
            || !self.merge_warnings.is_empty()
            || !self.failed_conversations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_outcomes() {
        let mut report = ExportReport::default();
        report.absorb(ChatOutcome {
            messages_written: 3,
            merged: true,
            attachments: AttachmentStats {
                copied: 2,
                ..AttachmentStats::default()
            },
            ..ChatOutcome::default()
        });
        report.absorb(ChatOutcome {
            messages_written: 1,
            carried_over: true,
            attachment_issues: vec![AttachmentIssue {
                conversation: "Aya".into(),
                name: "a.png".into(),
                reason: "missing".into(),
            }],
            ..ChatOutcome::default()
        });

        assert_eq!(report.conversations_written, 2);
        assert_eq!(report.conversations_merged, 1);
        assert_eq!(report.conversations_carried_over, 1);
        assert_eq!(report.messages_written, 4);
        assert_eq!(report.attachments.copied, 2);
        assert!(report.has_issues());
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(
            SkipReason::OrphanConversation("x".into()).to_string(),
            "unknown conversation x"
        );
    }
}
