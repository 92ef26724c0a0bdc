//! Export pipeline.
//!
//! rows -> normalized messages -> chats -> (merge with previous export) ->
//! attachments -> Markdown/HTML on disk. Conversations are independent and
//! run on a bounded worker pool; the attachment registry is the only shared
//! state.

use std::collections::HashSet;
use std::path::PathBuf;

use crossbeam_channel::bounded;

use crate::domain::identity::ContactDirectory;
use crate::domain::transcript::parse_transcript;
use crate::domain::{
    Chat, ChatOutcome, ExportReport, ExportUnit, MergeWarning, Result, RowDefect, SourceRow,
};
use crate::infrastructure::output_writer::{prepare_destination, ConversationFiles};
use crate::infrastructure::prior_export::{PriorExport, PriorTranscript};

use super::assembler::{assemble, build_conversations, ChatFilter};
use super::attachments::{AttachmentRegistry, AttachmentResolver};
use super::html::render_html;
use super::merge::merge;
use super::normalizer::{NormalizedRows, Normalizer, SourceSnapshot};
use super::renderer::{render_unit, RenderOptions};

/// Chats assembled from a source, plus what was dropped on the way.
#[derive(Debug, Default)]
pub struct LoadedChats {
    pub chats: Vec<Chat>,
    pub row_defects: Vec<RowDefect>,
    pub rows_filtered: usize,
}

/// Normalize and assemble raw rows.
#[must_use]
pub fn load_chats(rows: Vec<SourceRow>, filter: &ChatFilter) -> LoadedChats {
    let snapshot: SourceSnapshot = rows.into_iter().collect();
    let directory = ContactDirectory::from_rows(&snapshot.conversations);
    let normalizer = Normalizer::new(&snapshot.conversations, &directory);
    let normalized: NormalizedRows = normalizer.normalize_rows(snapshot.messages).collect();

    let conversations = build_conversations(&snapshot.conversations);
    let chats = assemble(conversations, normalized.messages, filter);

    let mut row_defects = snapshot.unreadable;
    row_defects.extend(normalized.defects);

    tracing::info!(
        chats = chats.len(),
        skipped = row_defects.len(),
        filtered = normalized.filtered,
        "Loaded source rows"
    );

    LoadedChats {
        chats,
        row_defects,
        rows_filtered: normalized.filtered,
    }
}

/// Options for one export run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub dest: PathBuf,
    /// Previous export to merge with.
    pub old: Option<PathBuf>,
    pub overwrite: bool,
    /// Root of the attachment blobs.
    pub attachments_root: PathBuf,
    pub render: RenderOptions,
    pub html: bool,
    /// Messages per HTML page; 0 means one page.
    pub paginate: usize,
    pub workers: usize,
}

/// Shared, read-only context for the workers.
struct Pipeline<'a> {
    options: &'a ExportOptions,
    prior: Option<&'a PriorExport>,
    resolver: AttachmentResolver<'a>,
}

impl Pipeline<'_> {
    fn html_for(&self, title: &str, markdown: &str) -> Option<String> {
        if !self.options.html {
            return None;
        }
        match parse_transcript(markdown) {
            Ok(blocks) => Some(render_html(title, &blocks, self.options.paginate)),
            Err(e) => {
                tracing::warn!(conversation = title, "HTML skipped: {}", e);
                None
            }
        }
    }

    fn export_chat(&self, chat: Chat) -> std::result::Result<ChatOutcome, String> {
        let dir_name = chat.conversation.dir_name.clone();
        let name = chat.conversation.display_name.clone();
        let files = ConversationFiles::new(&self.options.dest, &dir_name);
        let mut unit = ExportUnit::fresh(chat);
        let mut outcome = ChatOutcome::default();

        if let Some(prior) = self.prior {
            match prior.transcript(&dir_name) {
                PriorTranscript::Parsed(blocks) => {
                    let (merged, stats) = merge(unit, blocks, &self.options.render);
                    unit = merged;
                    outcome.merged = true;
                    outcome.attachments.carried = files
                        .carry_media(&prior.media_dir(&dir_name))
                        .map_err(|e| format!("copying old media: {e}"))?;
                    tracing::debug!(
                        conversation = %name,
                        shared = stats.shared,
                        added = stats.added,
                        retained = stats.retained,
                        "Merged with previous export"
                    );
                }
                PriorTranscript::Unreadable(reason) => {
                    tracing::warn!(
                        conversation = %name,
                        "Previous transcript not merged: {}",
                        reason
                    );
                    outcome.merge_warnings.push(MergeWarning {
                        conversation: name.clone(),
                        path: prior.transcript_path(&dir_name),
                        reason,
                    });
                }
                PriorTranscript::Absent => {}
            }
        }

        let (stats, issues) = self.resolver.resolve_unit(&mut unit, files.dir());
        outcome.attachments.absorb(stats);
        outcome.attachment_issues = issues;

        let markdown = render_unit(&unit, &self.options.render);
        let html = self.html_for(&name, &markdown);
        files
            .write(&markdown, html.as_deref())
            .map_err(|e| format!("writing {}: {e}", files.dir().display()))?;

        outcome.messages_written = unit.entries.len();
        tracing::info!(
            conversation = %name,
            messages = outcome.messages_written,
            merged = outcome.merged,
            "Exported conversation"
        );
        Ok(outcome)
    }

    /// Bring a conversation that only exists in the previous export into the
    /// destination unchanged.
    fn carry_over(
        &self,
        prior: &PriorExport,
        dir_name: &str,
    ) -> std::result::Result<ChatOutcome, String> {
        let markdown = prior
            .raw_transcript(dir_name)
            .map_err(|e| format!("reading previous transcript: {e}"))?;
        let files = ConversationFiles::new(&self.options.dest, dir_name);
        let html = self.html_for(dir_name, &markdown);
        files
            .write(&markdown, html.as_deref())
            .map_err(|e| format!("writing {}: {e}", files.dir().display()))?;
        let carried = files
            .carry_media(&prior.media_dir(dir_name))
            .map_err(|e| format!("copying old media: {e}"))?;

        let messages = parse_transcript(&markdown).map_or(0, |b| b.len());
        tracing::info!(conversation = dir_name, messages, "Carried over from previous export");

        let mut outcome = ChatOutcome {
            messages_written: messages,
            carried_over: true,
            ..ChatOutcome::default()
        };
        outcome.attachments.carried = carried;
        Ok(outcome)
    }
}

/// Run a full export of `loaded` into `options.dest`.
///
/// # Errors
/// Returns error only for fatal preconditions: an unusable destination or an
/// unreadable previous export root. Per-conversation failures are reported.
pub fn run_export(loaded: LoadedChats, options: &ExportOptions) -> Result<ExportReport> {
    prepare_destination(&options.dest, options.old.as_deref(), options.overwrite)?;
    let prior = options.old.as_deref().map(PriorExport::open).transpose()?;

    let registry = AttachmentRegistry::new();
    let pipeline = Pipeline {
        options,
        prior: prior.as_ref(),
        resolver: AttachmentResolver::new(&options.attachments_root, &registry),
    };

    let mut report = ExportReport {
        row_defects: loaded.row_defects,
        rows_filtered: loaded.rows_filtered,
        ..ExportReport::default()
    };

    let total = loaded.chats.len();
    let n_workers = options.workers.clamp(1, total.max(1));
    let (job_tx, job_rx) = bounded::<Chat>(n_workers * 2);
    let (done_tx, done_rx) =
        bounded::<(String, std::result::Result<ChatOutcome, String>)>(total.max(1));

    std::thread::scope(|s| {
        for _ in 0..n_workers {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let pipeline = &pipeline;
            s.spawn(move || {
                while let Ok(chat) = job_rx.recv() {
                    let dir_name = chat.conversation.dir_name.clone();
                    let result = pipeline.export_chat(chat);
                    if done_tx.send((dir_name, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(done_tx);

        for chat in loaded.chats {
            if job_tx.send(chat).is_err() {
                break;
            }
        }
        drop(job_tx);
    });

    tracing::debug!(unique = registry.stored_count(), "Attachments stored");

    let mut written: HashSet<String> = HashSet::new();
    for (dir_name, result) in done_rx.iter() {
        match result {
            Ok(outcome) => {
                written.insert(dir_name);
                report.absorb(outcome);
            }
            Err(reason) => {
                tracing::warn!(conversation = %dir_name, "Conversation failed: {}", reason);
                report.failed_conversations.push((dir_name, reason));
            }
        }
    }

    if let Some(prior) = prior.as_ref() {
        for dir_name in prior.conversation_dirs()? {
            if written.contains(&dir_name) {
                continue;
            }
            match pipeline.carry_over(prior, &dir_name) {
                Ok(outcome) => report.absorb(outcome),
                Err(reason) => {
                    tracing::warn!(conversation = %dir_name, "Carry-over failed: {}", reason);
                    report.failed_conversations.push((dir_name, reason));
                }
            }
        }
    }

    report.failed_conversations.sort();
    Ok(report)
}
