//! Domain models for exported Signal chats.
//!
//! These models represent the canonical transcript built from the raw rows,
//! independent of how the database or the output directory look.

use super::rows::ConversationKind;
use super::transcript::TranscriptBlock;

/// Extensions rendered inline as images when the MIME type is absent.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "tif", "tiff", "webp", "heic"];

/// A chat thread (direct or group) with its resolved names.
#[derive(Debug, Clone)]
pub struct Conversation {
    /// Stable internal id from the source database.
    pub id: String,
    pub kind: ConversationKind,
    /// Human readable name, resolved by precedence.
    pub display_name: String,
    /// Filesystem-safe, run-unique directory name.
    pub dir_name: String,
    /// Member service ids (groups only).
    pub members: Vec<String>,
}

/// Lifecycle of an attachment reference through the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentState {
    /// Not yet looked up on disk.
    Pending,
    /// Copied (or reused) under `media/<file_name>`.
    Stored { file_name: String },
    /// Blob missing or unreadable; rendered as a placeholder.
    Missing { reason: String },
}

/// A file attached to a message.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Original filename, when the sender supplied one.
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    /// Relative path of the blob inside the attachments directory.
    pub storage_key: Option<String>,
    pub state: AttachmentState,
}

impl Attachment {
    /// File extension for the stored copy: from the filename, else the MIME
    /// subtype, else `bin`.
    #[must_use]
    pub fn extension(&self) -> String {
        let from_name = self
            .file_name
            .as_deref()
            .and_then(|n| n.rsplit_once('.'))
            .map(|(_, ext)| ext);
        let from_mime = self
            .content_type
            .as_deref()
            .map(|ct| ct.split_once('/').map_or(ct, |(_, sub)| sub))
            .map(|sub| sub.split(|c| c == ';' || c == '+').next().unwrap_or(sub));

        [from_name, from_mime]
            .into_iter()
            .flatten()
            .map(sanitize_extension)
            .find(|ext| !ext.is_empty())
            .unwrap_or_else(|| "bin".to_string())
    }

    /// Name shown as link text.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.file_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("attachment.{}", self.extension()),
        }
    }

    /// Whether the attachment renders as an inline image.
    #[must_use]
    pub fn is_image(&self) -> bool {
        match self.content_type.as_deref() {
            Some(ct) if ct.contains('/') => ct.starts_with("image/"),
            _ => IMAGE_EXTENSIONS.contains(&self.extension().as_str()),
        }
    }
}

fn sanitize_extension(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .take(8)
        .collect::<String>()
        .to_ascii_lowercase()
}

/// A reaction left on a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub emoji: String,
    /// Resolved name of whoever reacted.
    pub reactor: String,
}

/// Reference to a quoted message. The source has no durable foreign key, so
/// the quote is identified by timestamp and author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRef {
    pub timestamp: Option<i64>,
    pub author: String,
    pub text: String,
}

/// A single normalized message.
#[derive(Debug, Clone)]
pub struct Message {
    pub conversation_id: String,
    /// Source row order, the tie-breaker for equal timestamps.
    pub sequence: i64,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    pub sender: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
    pub quote: Option<QuoteRef>,
    pub reactions: Vec<Reaction>,
    /// Deleted for everyone or erased (view-once, expired).
    pub deleted: bool,
}

impl Message {
    /// Total order inside a conversation.
    #[must_use]
    pub const fn sort_key(&self) -> (i64, i64) {
        (self.timestamp, self.sequence)
    }
}

/// A conversation together with its ordered messages.
#[derive(Debug, Clone)]
pub struct Chat {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// One entry of a transcript that is about to be written.
#[derive(Debug, Clone)]
pub enum TranscriptEntry {
    /// Produced by this run; rendered from the message.
    Fresh(Message),
    /// Carried over verbatim from a previous export.
    Prior(TranscriptBlock),
}

/// The per-conversation artifact: ordered entries plus the media directory
/// they point into (`<dir_name>/media`).
#[derive(Debug, Clone)]
pub struct ExportUnit {
    pub conversation: Conversation,
    pub entries: Vec<TranscriptEntry>,
}

impl ExportUnit {
    /// A unit holding only this run's messages.
    #[must_use]
    pub fn fresh(chat: Chat) -> Self {
        Self {
            conversation: chat.conversation,
            entries: chat.messages.into_iter().map(TranscriptEntry::Fresh).collect(),
        }
    }
}

/// Row for the `list` command.
#[derive(Debug, Clone)]
pub struct ChatSummary {
    pub display_name: String,
    pub kind: ConversationKind,
    /// Group member count; 0 for direct chats.
    pub members: usize,
    pub message_count: usize,
    pub last_timestamp: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(name: Option<&str>, ct: Option<&str>) -> Attachment {
        Attachment {
            file_name: name.map(String::from),
            content_type: ct.map(String::from),
            storage_key: None,
            state: AttachmentState::Pending,
        }
    }

    #[test]
    fn test_extension_prefers_filename() {
        assert_eq!(attachment(Some("Report.PDF"), Some("application/pdf")).extension(), "pdf");
    }

    #[test]
    fn test_extension_falls_back_to_mime() {
        assert_eq!(attachment(None, Some("image/jpeg")).extension(), "jpeg");
        assert_eq!(attachment(Some("noext"), Some("audio/aac")).extension(), "aac");
        assert_eq!(attachment(None, Some("image/svg+xml")).extension(), "svg");
        assert_eq!(attachment(None, None).extension(), "bin");
    }

    #[test]
    fn test_display_name_for_generic_attachment() {
        assert_eq!(attachment(None, Some("image/png")).display_name(), "attachment.png");
        assert_eq!(attachment(Some("cat.gif"), None).display_name(), "cat.gif");
    }

    #[test]
    fn test_is_image() {
        assert!(attachment(None, Some("image/png")).is_image());
        assert!(!attachment(Some("a.png"), Some("application/octet-stream")).is_image());
        assert!(attachment(Some("a.jpg"), None).is_image());
        assert!(!attachment(Some("a.pdf"), None).is_image());
    }
}
