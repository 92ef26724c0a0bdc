//! Domain layer - core business logic and types.
//!
//! This layer contains pure domain models and error types
//! without any external dependencies (DB, IO, etc.).

pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod report;
pub mod rows;
pub mod transcript;

pub use config::{AppConfig, TimeZoneChoice};
pub use error::{AppError, Result};
pub use models::{
    Attachment, AttachmentState, Chat, ChatSummary, Conversation, ExportUnit, Message, QuoteRef,
    Reaction, TranscriptEntry,
};
pub use report::{
    AttachmentIssue, AttachmentStats, ChatOutcome, ExportReport, MergeWarning, RowDefect,
    SkipReason,
};
pub use rows::{ConversationKind, ConversationRow, MessageRow, SourceRow};
pub use transcript::{MessageKey, TranscriptBlock};
