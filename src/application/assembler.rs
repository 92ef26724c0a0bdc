//! Chat assembler.
//!
//! Groups normalized messages by conversation, resolves conversation names
//! and orders each transcript by `(timestamp, source row)`.

use std::collections::{HashMap, HashSet};

use crate::domain::identity::conversation_display_name;
use crate::domain::{Chat, ChatSummary, Conversation, ConversationRow, Message};

/// Selection of conversations by display name.
#[derive(Debug, Clone, Default)]
pub struct ChatFilter {
    names: Vec<String>,
}

impl ChatFilter {
    /// Build from user supplied names; an empty list selects everything.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn matches(&self, conversation: &Conversation) -> bool {
        self.is_empty()
            || self.names.iter().any(|n| {
                *n == conversation.display_name.to_lowercase()
                    || *n == conversation.dir_name.to_lowercase()
            })
    }
}

/// Filesystem-safe rendering of a display name.
#[must_use]
pub fn sanitize_dir_name(display_name: &str) -> String {
    let cleaned: String = display_name.chars().filter(|c| c.is_alphanumeric()).collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

/// Resolve names for every conversation row. Directory names are made unique
/// in conversation-id order so they stay stable between runs.
#[must_use]
pub fn build_conversations(rows: &[ConversationRow]) -> Vec<Conversation> {
    let mut ordered: Vec<&ConversationRow> = rows.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));

    let mut used: HashSet<String> = HashSet::new();
    ordered
        .into_iter()
        .map(|row| {
            let display_name = conversation_display_name(row);
            let base = sanitize_dir_name(&display_name);
            let mut dir_name = base.clone();
            let mut suffix = 2;
            while used.contains(&dir_name.to_lowercase()) {
                dir_name = format!("{base}{suffix}");
                suffix += 1;
            }
            used.insert(dir_name.to_lowercase());

            Conversation {
                id: row.id.clone(),
                kind: row.kind,
                display_name,
                dir_name,
                members: row.members.clone(),
            }
        })
        .collect()
}

/// Group and order messages. Conversations that end up empty, or that the
/// filter excludes, are dropped.
#[must_use]
pub fn assemble(
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    filter: &ChatFilter,
) -> Vec<Chat> {
    let mut grouped: HashMap<String, Vec<Message>> = HashMap::new();
    for msg in messages {
        grouped.entry(msg.conversation_id.clone()).or_default().push(msg);
    }

    let mut chats: Vec<Chat> = conversations
        .into_iter()
        .filter(|c| filter.matches(c))
        .filter_map(|conversation| {
            let mut messages = grouped.remove(&conversation.id)?;
            if messages.is_empty() {
                return None;
            }
            messages.sort_by_key(Message::sort_key);
            link_quotes(&mut messages);
            Some(Chat {
                conversation,
                messages,
            })
        })
        .collect();

    chats.sort_by(|a, b| a.conversation.dir_name.cmp(&b.conversation.dir_name));

    tracing::info!(
        conversations = chats.len(),
        messages = chats.iter().map(|c| c.messages.len()).sum::<usize>(),
        "Assembled chats"
    );

    chats
}

/// Fill in the text of quotes that arrived without it, from the quoted
/// message in the same chat (matched on sent timestamp and author).
fn link_quotes(messages: &mut [Message]) {
    let by_sent: HashMap<(i64, &str), &str> = messages
        .iter()
        .map(|m| ((m.timestamp, m.sender.as_str()), m.body.as_str()))
        .collect();
    let fills: Vec<(usize, String)> = messages
        .iter()
        .enumerate()
        .filter_map(|(idx, m)| {
            let quote = m.quote.as_ref().filter(|q| q.text.is_empty())?;
            let body = by_sent.get(&(quote.timestamp?, quote.author.as_str()))?;
            Some((idx, (*body).to_string()))
        })
        .collect();
    drop(by_sent);

    for (idx, text) in fills {
        if let Some(quote) = messages[idx].quote.as_mut() {
            quote.text = text;
        }
    }
}

/// One summary row per conversation that has messages.
#[must_use]
pub fn summarize(chats: &[Chat]) -> Vec<ChatSummary> {
    chats
        .iter()
        .map(|c| ChatSummary {
            display_name: c.conversation.display_name.clone(),
            kind: c.conversation.kind,
            members: c.conversation.members.len(),
            message_count: c.messages.len(),
            last_timestamp: c.messages.last().map(|m| m.timestamp),
        })
        .collect()
}
