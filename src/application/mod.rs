//! Application layer - use cases and orchestration.
//!
//! This layer turns raw rows into transcripts, merges them with a previous
//! export and renders the result.

pub mod assembler;
pub mod attachments;
pub mod exporter;
pub mod formatter;
pub mod html;
pub mod merge;
pub mod normalizer;
pub mod renderer;

pub use assembler::{summarize, ChatFilter};
pub use exporter::{load_chats, run_export, ExportOptions, LoadedChats};
pub use formatter::{format_chats_table, format_report};
pub use renderer::RenderOptions;
