//! `SQLite` reader for a decrypted Signal Desktop database.
//!
//! Reads the `conversations` and `messages` tables into [`SourceRow`]s. Rows
//! that cannot be decoded become [`SourceRow::Unreadable`] instead of failing
//! the query.

use std::collections::HashSet;
use std::path::Path;

use rusqlite::{Connection, OpenFlags, Row};

use crate::domain::rows::RawConversationJson;
use crate::domain::{AppError, ConversationKind, ConversationRow, MessageRow, Result, SourceRow};

/// Conversation columns in contract order, with older schema names to fall
/// back to.
const CONVERSATION_COLUMNS: &[(&str, &[&str])] = &[
    ("id", &[]),
    ("type", &[]),
    ("name", &[]),
    ("profileName", &[]),
    ("profileFullName", &[]),
    ("e164", &[]),
    ("serviceId", &["uuid"]),
    ("json", &[]),
];

/// `SQLite` reader for the decrypted message store.
pub struct SignalDbReader {
    conn: Connection,
}

impl SignalDbReader {
    /// Opens a decrypted database in read-only mode.
    ///
    /// # Errors
    /// Returns error if database cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(AppError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(path, flags).map_err(AppError::database)?;

        conn.execute_batch(
            "PRAGMA query_only = ON;
             PRAGMA temp_store = MEMORY;",
        )
        .map_err(AppError::database)?;

        Ok(Self { conn })
    }

    /// All conversation rows followed by all message rows in `rowid` order.
    ///
    /// # Errors
    /// Returns error if either table cannot be queried at all.
    pub fn rows(&self) -> Result<Vec<SourceRow>> {
        let mut rows = self.fetch_conversations()?;
        rows.extend(self.fetch_messages()?);
        Ok(rows)
    }

    /// Column names of `table`.
    fn columns(&self, table: &str) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .map_err(AppError::database)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(AppError::database)?
            .filter_map(std::result::Result::ok)
            .collect();
        Ok(names)
    }

    fn fetch_conversations(&self) -> Result<Vec<SourceRow>> {
        let present = self.columns("conversations")?;
        if present.is_empty() {
            return Err(AppError::InvalidData {
                message: "database has no conversations table".to_string(),
            });
        }

        let select: Vec<String> = CONVERSATION_COLUMNS
            .iter()
            .map(|(name, fallbacks)| {
                std::iter::once(name)
                    .chain(fallbacks.iter())
                    .find(|c| present.contains(**c))
                    .map_or_else(|| "NULL".to_string(), |c| format!("\"{c}\""))
            })
            .collect();
        let sql = format!("SELECT {} FROM conversations", select.join(", "));

        let mut stmt = self.conn.prepare(&sql).map_err(AppError::database)?;
        let rows = stmt
            .query_map([], conversation_row)
            .map_err(AppError::database)?;

        let mut out = Vec::new();
        for row in rows {
            match row {
                Ok(conv) => out.push(SourceRow::Conversation(conv)),
                Err(e) => {
                    tracing::warn!("Failed to read conversation row: {}", e);
                    out.push(SourceRow::Unreadable {
                        table: "conversations",
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!("Fetched {} conversation rows", out.len());

        Ok(out)
    }

    fn fetch_messages(&self) -> Result<Vec<SourceRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT rowid, conversationId, json FROM messages ORDER BY rowid")
            .map_err(AppError::database)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .map_err(AppError::database)?;

        let mut out = Vec::new();
        for row in rows {
            match row {
                Ok((sequence, conversation_id, Some(json))) => {
                    out.push(SourceRow::Message(MessageRow {
                        sequence,
                        conversation_id,
                        json,
                    }));
                }
                Ok((sequence, _, None)) => out.push(SourceRow::Unreadable {
                    table: "messages",
                    reason: format!("row {sequence} has no json"),
                }),
                Err(e) => {
                    tracing::warn!("Failed to read message row: {}", e);
                    out.push(SourceRow::Unreadable {
                        table: "messages",
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!("Fetched {} message rows", out.len());

        Ok(out)
    }
}

fn conversation_row(row: &Row<'_>) -> rusqlite::Result<ConversationRow> {
    let kind: Option<String> = row.get(1)?;
    let json: Option<String> = row.get(7)?;
    let members = json
        .as_deref()
        .and_then(|j| serde_json::from_str::<RawConversationJson>(j).ok())
        .and_then(|parsed| parsed.members_v2)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|m| m.aci)
        .collect();

    Ok(ConversationRow {
        id: row.get(0)?,
        kind: ConversationKind::from_column(kind.as_deref().unwrap_or_default()),
        name: row.get(2)?,
        profile_name: row.get(3)?,
        profile_full_name: row.get(4)?,
        e164: row.get(5)?,
        service_id: row.get(6)?,
        members,
    })
}
