//! Terminal output: the chat table and the post-run report.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::{ChatSummary, ConversationKind, ExportReport, TimeZoneChoice};

/// Issues listed individually before the report switches to a count.
const MAX_LISTED: usize = 10;

/// Formats the chats of a source as a table.
#[must_use]
pub fn format_chats_table(chats: &[ChatSummary], timezone: TimeZoneChoice) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Name", "Kind", "Msgs", "Last message"]);

    for chat in chats {
        let kind = match chat.kind {
            ConversationKind::Private => "direct".to_string(),
            ConversationKind::Group if chat.members > 0 => format!("group ({})", chat.members),
            ConversationKind::Group => "group".to_string(),
        };
        let last = chat
            .last_timestamp
            .and_then(|ts| timezone.format_millis(ts, "%Y-%m-%d %H:%M"))
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            truncate(&chat.display_name, 40),
            kind,
            chat.message_count.to_string(),
            last,
        ]);
    }

    table.to_string()
}

/// Formats the report printed after an export.
#[must_use]
pub fn format_report(report: &ExportReport) -> String {
    let mut lines = vec![
        format!("{}", "📊 Export summary".bold()),
        format!(
            "  Conversations: {} ({} merged, {} carried over)",
            report.conversations_written.to_string().cyan(),
            report.conversations_merged.to_string().cyan(),
            report.conversations_carried_over.to_string().cyan()
        ),
        format!("  Messages written: {}", report.messages_written.to_string().green()),
        format!(
            "  Attachments: {} copied, {} linked, {} reused, {} carried, {} missing",
            report.attachments.copied.to_string().green(),
            report.attachments.linked.to_string().green(),
            report.attachments.reused.to_string().blue(),
            report.attachments.carried.to_string().blue(),
            report.attachment_issues.len().to_string().yellow()
        ),
        format!(
            "  Rows skipped: {}, filtered: {}",
            report.row_defects.len().to_string().yellow(),
            report.rows_filtered
        ),
    ];

    if !report.row_defects.is_empty() {
        lines.push(format!("{}", "Skipped rows:".yellow()));
        lines.extend(listed(report.row_defects.iter().map(|d| match d.sequence {
            Some(seq) => format!("{} #{seq}: {}", d.table, d.reason),
            None => format!("{}: {}", d.table, d.reason),
        })));
    }

    if !report.attachment_issues.is_empty() {
        lines.push(format!("{}", "Missing attachments:".yellow()));
        lines.extend(listed(
            report
                .attachment_issues
                .iter()
                .map(|i| format!("{} / {}: {}", i.conversation, i.name, i.reason)),
        ));
    }

    if !report.merge_warnings.is_empty() {
        lines.push(format!("{}", "Not merged:".yellow()));
        lines.extend(listed(report.merge_warnings.iter().map(|w| {
            format!("{} ({}): {}", w.conversation, w.path.display(), w.reason)
        })));
    }

    if !report.failed_conversations.is_empty() {
        lines.push(format!("{}", "Failed conversations:".red()));
        lines.extend(listed(
            report
                .failed_conversations
                .iter()
                .map(|(name, reason)| format!("{name}: {reason}")),
        ));
    }

    lines.join("\n")
}

fn listed(items: impl ExactSizeIterator<Item = String>) -> Vec<String> {
    let total = items.len();
    let mut out: Vec<String> = items.take(MAX_LISTED).map(|i| format!("  - {i}")).collect();
    if total > MAX_LISTED {
        out.push(format!("  … and {} more", total - MAX_LISTED));
    }
    out
}

/// Truncates a string to max characters with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttachmentIssue, ChatOutcome};

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world!", 8), "hello...");
        assert_eq!(truncate("ääääääääää", 5), "ää...");
    }

    #[test]
    fn test_chats_table() {
        let table = format_chats_table(
            &[ChatSummary {
                display_name: "Book Club".into(),
                kind: ConversationKind::Group,
                members: 5,
                message_count: 42,
                last_timestamp: Some(1_700_000_000_000),
            }],
            TimeZoneChoice::Utc,
        );
        assert!(table.contains("Book Club"));
        assert!(table.contains("group (5)"));
        assert!(table.contains("2023-11-14 22:13"));
    }

    #[test]
    fn test_report_lists_issues() {
        colored::control::set_override(false);
        let mut report = ExportReport::default();
        report.absorb(ChatOutcome {
            messages_written: 2,
            attachment_issues: (0..12)
                .map(|i| AttachmentIssue {
                    conversation: "Aya".into(),
                    name: format!("{i}.png"),
                    reason: "blob not found".into(),
                })
                .collect(),
            ..ChatOutcome::default()
        });

        let text = format_report(&report);
        assert!(text.contains("Messages written: 2"));
        assert!(text.contains("Aya / 0.png: blob not found"));
        assert!(text.contains("and 2 more"));
    }
}
