//! Fixed row shapes read from the decrypted Signal database.
//!
//! Each record kind gets its own variant so the normalizer can validate rows
//! at its boundary instead of poking at loosely-typed maps.
//!
//! Column contract:
//! ```sql
//! SELECT id, type, name, profileName, profileFullName, e164, serviceId, json
//!   FROM conversations;
//! SELECT rowid, conversationId, json FROM messages ORDER BY rowid;
//! ```

use serde::Deserialize;

/// Kind of conversation as stored in `conversations.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationKind {
    /// One-to-one chat; the row doubles as the contact record.
    Private,
    /// Group chat.
    Group,
}

impl ConversationKind {
    /// Map the raw column value. Anything other than `group` is a contact.
    #[must_use]
    pub fn from_column(value: &str) -> Self {
        if value.eq_ignore_ascii_case("group") {
            Self::Group
        } else {
            Self::Private
        }
    }
}

/// One row of the `conversations` table.
#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: String,
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub profile_name: Option<String>,
    pub profile_full_name: Option<String>,
    pub e164: Option<String>,
    pub service_id: Option<String>,
    /// Service ids of group members (from `json.membersV2`).
    pub members: Vec<String>,
}

/// One row of the `messages` table, before its JSON is decoded.
#[derive(Debug, Clone)]
pub struct MessageRow {
    /// Source order (`rowid`), used to break timestamp ties.
    pub sequence: i64,
    pub conversation_id: Option<String>,
    pub json: String,
}

/// A raw record streamed out of the database.
#[derive(Debug, Clone)]
pub enum SourceRow {
    Conversation(ConversationRow),
    Message(MessageRow),
    /// A row that could not even be decoded into its column shape.
    Unreadable { table: &'static str, reason: String },
}

/// The JSON payload of a message row. Every field is optional because the
/// application has written many shapes over the years.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, rename = "sent_at")]
    pub sent_at: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default, rename = "received_at")]
    pub received_at: Option<i64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, alias = "sourceUuid")]
    pub source_service_id: Option<String>,
    #[serde(default)]
    pub attachments: Option<Vec<RawAttachment>>,
    #[serde(default)]
    pub reactions: Option<Vec<RawReaction>>,
    #[serde(default)]
    pub quote: Option<RawQuote>,
    #[serde(default)]
    pub sticker: Option<RawSticker>,
    #[serde(default)]
    pub call_history_details: Option<RawCallDetails>,
    #[serde(default)]
    pub deleted_for_everyone: bool,
    #[serde(default)]
    pub is_erased: bool,
}

/// Attachment entry embedded in a message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttachment {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Reaction entry embedded in a message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReaction {
    #[serde(default)]
    pub emoji: Option<String>,
    /// Conversation id of the reactor.
    #[serde(default)]
    pub from_id: Option<String>,
}

/// Quoted-message reference embedded in a message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuote {
    /// The quoted message's `sent_at`.
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, alias = "authorUuid")]
    pub author_aci: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSticker {
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub data: Option<RawStickerData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStickerData {
    #[serde(default)]
    pub emoji: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCallDetails {
    #[serde(default)]
    pub was_incoming: Option<bool>,
}

/// The JSON payload of a conversation row; only group membership is read.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConversationJson {
    #[serde(default)]
    pub members_v2: Option<Vec<RawMember>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMember {
    #[serde(default, alias = "uuid")]
    pub aci: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_kind_from_column() {
        assert_eq!(ConversationKind::from_column("group"), ConversationKind::Group);
        assert_eq!(ConversationKind::from_column("private"), ConversationKind::Private);
        assert_eq!(ConversationKind::from_column(""), ConversationKind::Private);
    }

    #[test]
    fn test_raw_message_tolerates_missing_fields() {
        let raw: RawMessage = serde_json::from_str(r#"{"type":"incoming"}"#).unwrap();
        assert_eq!(raw.kind.as_deref(), Some("incoming"));
        assert!(raw.attachments.is_none());
        assert!(raw.reactions.is_none());
        assert!(raw.quote.is_none());
    }

    #[test]
    fn test_raw_message_reads_embedded_records() {
        let raw: RawMessage = serde_json::from_str(
            r#"{
                "type": "incoming",
                "body": "look",
                "sent_at": 1700000000000,
                "sourceServiceId": "aci-1",
                "attachments": [{"path": "ab/cd", "fileName": "a.png", "contentType": "image/png", "size": 3}],
                "reactions": [{"emoji": "👍", "fromId": "conv-2"}],
                "quote": {"id": 1699999999000, "authorAci": "aci-2", "text": "earlier"}
            }"#,
        )
        .unwrap();

        assert_eq!(raw.sent_at, Some(1_700_000_000_000));
        assert_eq!(raw.source_service_id.as_deref(), Some("aci-1"));
        assert_eq!(raw.attachments.unwrap()[0].file_name.as_deref(), Some("a.png"));
        assert_eq!(raw.reactions.unwrap()[0].from_id.as_deref(), Some("conv-2"));
        assert_eq!(raw.quote.unwrap().author_aci.as_deref(), Some("aci-2"));
    }
}
