//! Row normalizer.
//!
//! Turns raw database rows into canonical [`Message`] values. A bad row is
//! a skip result, never an error: one malformed message must not abort the
//! export of an otherwise healthy conversation.

use std::collections::HashMap;

use crate::domain::identity::{ContactDirectory, SELF_SENDER, UNKNOWN_SENDER};
use crate::domain::rows::RawMessage;
use crate::domain::{
    Attachment, AttachmentState, ConversationKind, ConversationRow, Message, MessageRow, QuoteRef,
    Reaction, RowDefect, SkipReason, SourceRow,
};

/// Message types that carry conversation content. Everything else is a
/// system notice (key change, group update, timer change, ...).
const CONTENT_TYPES: &[&str] = &["incoming", "outgoing", "call-history"];

/// Result of normalizing one row.
#[derive(Debug)]
pub enum RowOutcome {
    Message(Message),
    /// Valid but not part of the transcript.
    Filtered,
    Skipped(RowDefect),
}

/// Rows split by record kind.
#[derive(Debug, Default)]
pub struct SourceSnapshot {
    pub conversations: Vec<ConversationRow>,
    pub messages: Vec<MessageRow>,
    pub unreadable: Vec<RowDefect>,
}

impl FromIterator<SourceRow> for SourceSnapshot {
    fn from_iter<I: IntoIterator<Item = SourceRow>>(iter: I) -> Self {
        let mut snapshot = Self::default();
        for row in iter {
            match row {
                SourceRow::Conversation(c) => snapshot.conversations.push(c),
                SourceRow::Message(m) => snapshot.messages.push(m),
                SourceRow::Unreadable { table, reason } => snapshot.unreadable.push(RowDefect {
                    table,
                    sequence: None,
                    reason: SkipReason::Unreadable(reason),
                }),
            }
        }
        snapshot
    }
}

/// Everything the normalizer produced for a run.
#[derive(Debug, Default)]
pub struct NormalizedRows {
    pub messages: Vec<Message>,
    pub defects: Vec<RowDefect>,
    pub filtered: usize,
}

impl FromIterator<RowOutcome> for NormalizedRows {
    fn from_iter<I: IntoIterator<Item = RowOutcome>>(iter: I) -> Self {
        let mut out = Self::default();
        for outcome in iter {
            match outcome {
                RowOutcome::Message(m) => out.messages.push(m),
                RowOutcome::Filtered => out.filtered += 1,
                RowOutcome::Skipped(defect) => {
                    tracing::warn!(
                        table = defect.table,
                        row = ?defect.sequence,
                        "Skipping row: {}",
                        defect.reason
                    );
                    out.defects.push(defect);
                }
            }
        }
        out
    }
}

/// Maps message rows to canonical messages.
pub struct Normalizer<'a> {
    directory: &'a ContactDirectory,
    kinds: HashMap<&'a str, ConversationKind>,
}

impl<'a> Normalizer<'a> {
    #[must_use]
    pub fn new(conversations: &'a [ConversationRow], directory: &'a ContactDirectory) -> Self {
        let kinds = conversations
            .iter()
            .map(|c| (c.id.as_str(), c.kind))
            .collect();
        Self { directory, kinds }
    }

    /// Normalize a stream of rows.
    pub fn normalize_rows<I>(&'a self, rows: I) -> impl Iterator<Item = RowOutcome> + 'a
    where
        I: IntoIterator<Item = MessageRow>,
        I::IntoIter: 'a,
    {
        rows.into_iter().map(move |row| self.normalize(row))
    }

    /// Normalize a single message row.
    #[must_use]
    pub fn normalize(&self, row: MessageRow) -> RowOutcome {
        let skip = |reason| {
            RowOutcome::Skipped(RowDefect {
                table: "messages",
                sequence: Some(row.sequence),
                reason,
            })
        };

        let Some(conversation_id) = row.conversation_id.clone().filter(|c| !c.is_empty()) else {
            return skip(SkipReason::MissingConversation);
        };
        let Some(&kind) = self.kinds.get(conversation_id.as_str()) else {
            return skip(SkipReason::OrphanConversation(conversation_id));
        };
        let raw: RawMessage = match serde_json::from_str(&row.json) {
            Ok(raw) => raw,
            Err(e) => return skip(SkipReason::MalformedJson(e.to_string())),
        };

        let msg_type = raw.kind.as_deref().unwrap_or("incoming");
        if !CONTENT_TYPES.contains(&msg_type) {
            return RowOutcome::Filtered;
        }

        let Some(timestamp) = [raw.sent_at, raw.timestamp, raw.received_at]
            .into_iter()
            .flatten()
            .find(|&ts| ts > 0)
        else {
            return skip(SkipReason::MissingTimestamp);
        };

        let sender = if msg_type == "outgoing" {
            SELF_SENDER.to_string()
        } else {
            let counterpart = match kind {
                ConversationKind::Private => self.directory.by_conversation(&conversation_id),
                ConversationKind::Group => None,
            };
            self.directory.resolve_participant(
                raw.source_service_id.as_deref(),
                raw.source.as_deref(),
                counterpart,
            )
        };

        let body = message_body(&raw, msg_type);
        let attachments = raw
            .attachments
            .unwrap_or_default()
            .into_iter()
            .map(|a| Attachment {
                file_name: a.file_name,
                content_type: a.content_type,
                storage_key: a.path.map(|p| p.replace('\\', "/")),
                state: AttachmentState::Pending,
            })
            .collect();
        let reactions = raw
            .reactions
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| {
                let emoji = r.emoji.filter(|e| !e.is_empty())?;
                let reactor = r.from_id.as_deref().map_or_else(
                    || UNKNOWN_SENDER.to_string(),
                    |id| self.directory.by_conversation(id).unwrap_or(id).to_string(),
                );
                Some(Reaction { emoji, reactor })
            })
            .collect();
        let quote = raw.quote.map(|q| QuoteRef {
            timestamp: q.id,
            author: self
                .directory
                .resolve_participant(q.author_aci.as_deref(), q.author.as_deref(), None),
            text: normalize_text(q.text.as_deref().unwrap_or_default()),
        });

        RowOutcome::Message(Message {
            conversation_id,
            sequence: row.sequence,
            timestamp,
            sender,
            body,
            attachments,
            quote,
            reactions,
            deleted: raw.deleted_for_everyone || raw.is_erased,
        })
    }
}

fn message_body(raw: &RawMessage, msg_type: &str) -> String {
    if msg_type == "call-history" {
        return match raw.call_history_details.as_ref().and_then(|d| d.was_incoming) {
            Some(true) => "Incoming call",
            Some(false) => "Outgoing call",
            None => "Call",
        }
        .to_string();
    }

    let body = normalize_text(raw.body.as_deref().unwrap_or_default());
    if !body.is_empty() {
        return body;
    }

    raw.sticker
        .as_ref()
        .and_then(|s| {
            s.emoji
                .clone()
                .or_else(|| s.data.as_ref().and_then(|d| d.emoji.clone()))
        })
        .unwrap_or_default()
}

/// Unify line endings and drop trailing whitespace.
fn normalize_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv(id: &str, kind: ConversationKind, name: &str, sid: Option<&str>) -> ConversationRow {
        ConversationRow {
            id: id.to_string(),
            kind,
            name: Some(name.to_string()),
            profile_name: None,
            profile_full_name: None,
            e164: None,
            service_id: sid.map(String::from),
            members: Vec::new(),
        }
    }

    fn row(seq: i64, conv: &str, json: &str) -> MessageRow {
        MessageRow {
            sequence: seq,
            conversation_id: Some(conv.to_string()),
            json: json.to_string(),
        }
    }

    fn fixture() -> (Vec<ConversationRow>, ContactDirectory) {
        let rows = vec![
            conv("c-aya", ConversationKind::Private, "Aya", Some("aci-aya")),
            conv("c-jim", ConversationKind::Private, "Jim", Some("aci-jim")),
            conv("g-1", ConversationKind::Group, "Book Club", None),
        ];
        let dir = ContactDirectory::from_rows(&rows);
        (rows, dir)
    }

    fn expect_message(outcome: RowOutcome) -> Message {
        match outcome {
            RowOutcome::Message(m) => m,
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn test_group_sender_resolved_by_service_id() {
        let (rows, dir) = fixture();
        let n = Normalizer::new(&rows, &dir);
        let msg = expect_message(n.normalize(row(
            1,
            "g-1",
            r#"{"type":"incoming","sent_at":1000,"sourceServiceId":"aci-jim","body":"yo"}"#,
        )));
        assert_eq!(msg.sender, "Jim");
        assert_eq!(msg.body, "yo");
    }

    #[test]
    fn test_direct_chat_falls_back_to_counterpart() {
        let (rows, dir) = fixture();
        let n = Normalizer::new(&rows, &dir);
        let msg = expect_message(n.normalize(row(1, "c-aya", r#"{"type":"incoming","sent_at":5,"body":"hi"}"#)));
        assert_eq!(msg.sender, "Aya");

        let out = expect_message(n.normalize(row(2, "c-aya", r#"{"type":"outgoing","sent_at":6,"body":"hey"}"#)));
        assert_eq!(out.sender, "Me");
    }

    #[test]
    fn test_orphan_and_malformed_rows_are_skipped() {
        let (rows, dir) = fixture();
        let n = Normalizer::new(&rows, &dir);

        let outcomes: NormalizedRows = n
            .normalize_rows(vec![
                row(1, "c-missing", r#"{"type":"incoming","sent_at":1}"#),
                row(2, "c-aya", "{not json"),
                row(3, "c-aya", r#"{"type":"incoming"}"#),
                row(4, "c-aya", r#"{"type":"incoming","sent_at":9,"body":"ok"}"#),
                MessageRow {
                    sequence: 5,
                    conversation_id: None,
                    json: "{}".into(),
                },
            ])
            .collect();

        assert_eq!(outcomes.messages.len(), 1);
        assert_eq!(outcomes.defects.len(), 4);
        assert_eq!(
            outcomes.defects[0].reason,
            SkipReason::OrphanConversation("c-missing".into())
        );
        assert!(matches!(outcomes.defects[1].reason, SkipReason::MalformedJson(_)));
        assert_eq!(outcomes.defects[2].reason, SkipReason::MissingTimestamp);
        assert_eq!(outcomes.defects[3].reason, SkipReason::MissingConversation);
    }

    #[test]
    fn test_system_notices_are_filtered() {
        let (rows, dir) = fixture();
        let n = Normalizer::new(&rows, &dir);
        assert!(matches!(
            n.normalize(row(1, "g-1", r#"{"type":"group-v2-change","sent_at":1}"#)),
            RowOutcome::Filtered
        ));
    }

    #[test]
    fn test_embedded_records() {
        let (rows, dir) = fixture();
        let n = Normalizer::new(&rows, &dir);
        let msg = expect_message(n.normalize(row(
            7,
            "g-1",
            r#"{
                "type": "incoming",
                "sent_at": 2000,
                "sourceServiceId": "aci-aya",
                "body": "see\r\nthis  ",
                "attachments": [{"path": "ab\\cdef", "fileName": "a.png", "contentType": "image/png"}],
                "reactions": [{"emoji": "👍", "fromId": "c-jim"}, {"emoji": "", "fromId": "c-aya"}, {"emoji": "🎉", "fromId": "c-zed"}],
                "quote": {"id": 1000, "authorAci": "aci-jim", "text": "earlier"}
            }"#,
        )));

        assert_eq!(msg.body, "see\nthis");
        assert_eq!(msg.attachments[0].storage_key.as_deref(), Some("ab/cdef"));
        assert_eq!(
            msg.reactions,
            vec![
                Reaction { emoji: "👍".into(), reactor: "Jim".into() },
                Reaction { emoji: "🎉".into(), reactor: "c-zed".into() },
            ]
        );
        let quote = msg.quote.unwrap();
        assert_eq!(quote.author, "Jim");
        assert_eq!(quote.timestamp, Some(1000));
    }

    #[test]
    fn test_call_sticker_and_deletion() {
        let (rows, dir) = fixture();
        let n = Normalizer::new(&rows, &dir);

        let call = expect_message(n.normalize(row(
            1,
            "c-aya",
            r#"{"type":"call-history","timestamp":10,"callHistoryDetails":{"wasIncoming":true}}"#,
        )));
        assert_eq!(call.body, "Incoming call");
        assert_eq!(call.timestamp, 10);

        let sticker = expect_message(n.normalize(row(
            2,
            "c-aya",
            r#"{"type":"incoming","sent_at":11,"sticker":{"emoji":"🐱"}}"#,
        )));
        assert_eq!(sticker.body, "🐱");

        let deleted = expect_message(n.normalize(row(
            3,
            "c-aya",
            r#"{"type":"incoming","sent_at":12,"deletedForEveryone":true}"#,
        )));
        assert!(deleted.deleted);
    }
}
