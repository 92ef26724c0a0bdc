//! Markdown renderer.
//!
//! One block per message:
//! header line, continuation lines of the body, quote lines, attachment
//! lines, reaction lines. Prior blocks from an earlier export are written
//! back verbatim.

use crate::domain::transcript::{
    escape_body_line, write_transcript, DELETED_BODY, HEADER_TIME_FORMAT, MEDIA_DIR,
    MISSING_ATTACHMENT_PREFIX,
};
use crate::domain::{
    Attachment, AttachmentState, ExportUnit, Message, TimeZoneChoice, TranscriptEntry,
};

/// Stamp used when a timestamp is outside chrono's range.
const FALLBACK_STAMP: &str = "1970-01-01, 00:00";

/// Rendering switches.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub timezone: TimeZoneChoice,
    pub quotes: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            timezone: TimeZoneChoice::Local,
            quotes: true,
        }
    }
}

/// Header stamp for a millisecond timestamp.
#[must_use]
pub fn header_stamp(millis: i64, timezone: TimeZoneChoice) -> String {
    timezone
        .format_millis(millis, HEADER_TIME_FORMAT)
        .unwrap_or_else(|| FALLBACK_STAMP.to_string())
}

/// Render one message as a transcript block (no trailing separator).
#[must_use]
pub fn render_block(msg: &Message, opts: &RenderOptions) -> String {
    let stamp = header_stamp(msg.timestamp, opts.timezone);

    if msg.deleted {
        return format!("[{stamp}] {}: {DELETED_BODY}", msg.sender);
    }

    let mut body_lines = msg.body.lines();
    let mut lines = vec![match body_lines.next() {
        Some(first) if !first.is_empty() => format!("[{stamp}] {}: {first}", msg.sender),
        _ => format!("[{stamp}] {}:", msg.sender),
    }];
    lines.extend(body_lines.map(|l| escape_body_line(l).into_owned()));

    if opts.quotes {
        if let Some(quote) = &msg.quote {
            let mut quoted = quote.text.lines();
            match quoted.next() {
                Some(first) if !first.is_empty() => {
                    lines.push(format!("> {}: {first}", quote.author));
                }
                _ => lines.push(format!("> {}:", quote.author)),
            }
            lines.extend(quoted.map(|l| {
                if l.is_empty() {
                    ">".to_string()
                } else {
                    format!("> {l}")
                }
            }));
        }
    }

    lines.extend(msg.attachments.iter().map(attachment_line));
    lines.extend(
        msg.reactions
            .iter()
            .map(|r| format!("(- {}: {} -)", r.reactor, r.emoji)),
    );

    lines.join("\n")
}

fn attachment_line(att: &Attachment) -> String {
    let name = link_text(&att.display_name());
    match &att.state {
        AttachmentState::Stored { file_name } if att.is_image() => {
            format!("![{name}]({MEDIA_DIR}/{file_name})")
        }
        AttachmentState::Stored { file_name } => format!("[{name}]({MEDIA_DIR}/{file_name})"),
        AttachmentState::Pending | AttachmentState::Missing { .. } => {
            format!("{MISSING_ATTACHMENT_PREFIX}{name}]")
        }
    }
}

/// Link text stays on one line and cannot close the link early.
fn link_text(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '[' => '(',
            ']' => ')',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect()
}

/// Render a whole unit: fresh entries from their messages, prior entries
/// verbatim.
#[must_use]
pub fn render_unit(unit: &ExportUnit, opts: &RenderOptions) -> String {
    let rendered: Vec<std::borrow::Cow<'_, str>> = unit
        .entries
        .iter()
        .map(|entry| match entry {
            TranscriptEntry::Fresh(msg) => render_block(msg, opts).into(),
            TranscriptEntry::Prior(block) => block.text.as_str().into(),
        })
        .collect();
    write_transcript(rendered.iter().map(|text| &**text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transcript::parse_transcript;
    use crate::domain::{Conversation, ConversationKind, QuoteRef, Reaction, TranscriptBlock};

    const UTC: RenderOptions = RenderOptions {
        timezone: TimeZoneChoice::Utc,
        quotes: true,
    };

    // 2023-11-14 22:13:20 UTC
    const TS: i64 = 1_700_000_000_000;

    fn msg(ts: i64, sender: &str, body: &str) -> Message {
        Message {
            conversation_id: "c1".into(),
            sequence: 0,
            timestamp: ts,
            sender: sender.into(),
            body: body.into(),
            attachments: Vec::new(),
            quote: None,
            reactions: Vec::new(),
            deleted: false,
        }
    }

    fn attachment(name: &str, ct: &str, state: AttachmentState) -> Attachment {
        Attachment {
            file_name: Some(name.into()),
            content_type: Some(ct.into()),
            storage_key: None,
            state,
        }
    }

    #[test]
    fn test_simple_block() {
        assert_eq!(
            render_block(&msg(TS, "Aya", "hi"), &UTC),
            "[2023-11-14, 22:13] Aya: hi"
        );
    }

    #[test]
    fn test_full_block_layout() {
        let mut m = msg(TS, "Aya", "look\nat this");
        m.quote = Some(QuoteRef {
            timestamp: Some(TS - 60_000),
            author: "Jim".into(),
            text: "what\nis it".into(),
        });
        m.attachments = vec![
            attachment(
                "cat.jpg",
                "image/jpeg",
                AttachmentState::Stored {
                    file_name: "0123456789abcdef.jpg".into(),
                },
            ),
            attachment(
                "notes.pdf",
                "application/pdf",
                AttachmentState::Stored {
                    file_name: "fedcba9876543210.pdf".into(),
                },
            ),
            attachment(
                "gone.png",
                "image/png",
                AttachmentState::Missing {
                    reason: "blob not found".into(),
                },
            ),
        ];
        m.reactions = vec![
            Reaction {
                emoji: "👍".into(),
                reactor: "Jim".into(),
            },
            Reaction {
                emoji: "❤".into(),
                reactor: "Me".into(),
            },
        ];

        let expected = "[2023-11-14, 22:13] Aya: look\n\
at this\n\
> Jim: what\n\
> is it\n\
![cat.jpg](media/0123456789abcdef.jpg)\n\
[notes.pdf](media/fedcba9876543210.pdf)\n\
[missing attachment: gone.png]\n\
(- Jim: 👍 -)\n\
(- Me: ❤ -)";
        assert_eq!(render_block(&m, &UTC), expected);

        let no_quotes = RenderOptions {
            quotes: false,
            ..UTC
        };
        assert!(!render_block(&m, &no_quotes).contains("> Jim"));
    }

    #[test]
    fn test_tombstone() {
        let mut m = msg(TS, "Aya", "secret");
        m.deleted = true;
        m.reactions.push(Reaction {
            emoji: "👍".into(),
            reactor: "Jim".into(),
        });
        assert_eq!(
            render_block(&m, &UTC),
            "[2023-11-14, 22:13] Aya: <message deleted>"
        );
    }

    #[test]
    fn test_attachment_only_message_reparses() {
        let mut m = msg(TS, "Aya", "");
        m.attachments.push(attachment(
            "a.png",
            "image/png",
            AttachmentState::Stored {
                file_name: "0123456789abcdef.png".into(),
            },
        ));
        let text = render_block(&m, &UTC);
        assert!(text.starts_with("[2023-11-14, 22:13] Aya:\n"));
        let block = TranscriptBlock::from_text(&text).unwrap();
        assert_eq!(block.sections().attachments.len(), 1);
    }

    #[test]
    fn test_attachment_name_with_line_break_keeps_one_line() {
        let mut pending = msg(TS, "Aya", "see");
        pending.attachments.push(attachment("a\nb[1].png", "image/png", AttachmentState::Pending));
        let mut stored = pending.clone();
        stored.attachments[0].state = AttachmentState::Stored {
            file_name: "0123456789abcdef.png".into(),
        };

        let pending_text = render_block(&pending, &UTC);
        let stored_text = render_block(&stored, &UTC);
        assert_eq!(pending_text.lines().count(), 2);
        assert!(pending_text.ends_with("[missing attachment: a b(1).png]"));
        assert!(stored_text.ends_with("![a b(1).png](media/0123456789abcdef.png)"));

        let pending_key = TranscriptBlock::from_text(&pending_text).unwrap().key;
        let stored_key = TranscriptBlock::from_text(&stored_text).unwrap().key;
        assert_eq!(pending_key, stored_key);
    }

    #[test]
    fn test_header_like_body_line_is_escaped() {
        let m = msg(TS, "Aya", "forwarded:\n[2023-11-14, 22:00] Bob: fake");
        let text = render_block(&m, &UTC);
        let blocks = parse_transcript(&text).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].key.sender, "Aya");
    }

    #[test]
    fn test_unit_keeps_message_order() {
        let unit = ExportUnit {
            conversation: Conversation {
                id: "c1".into(),
                kind: ConversationKind::Group,
                display_name: "Club".into(),
                dir_name: "Club".into(),
                members: Vec::new(),
            },
            entries: vec![
                TranscriptEntry::Fresh(msg(TS, "Aya", "first")),
                TranscriptEntry::Prior(
                    TranscriptBlock::from_text("[2023-11-14, 22:13] Jim: old words").unwrap(),
                ),
            ],
        };
        assert_eq!(
            render_unit(&unit, &UTC),
            "[2023-11-14, 22:13] Aya: first\n\n[2023-11-14, 22:13] Jim: old words\n\n"
        );
    }
}
