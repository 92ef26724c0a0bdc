//! Identity resolution for conversations, senders and reactors.
//!
//! Display names are chosen from an explicit precedence table so the rule can
//! be tested without a database.

use std::collections::HashMap;

use super::rows::{ConversationKind, ConversationRow};

/// Where a display name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    /// Name from the system address book, or the group title.
    ContactName,
    /// Full profile name the contact chose.
    ProfileFullName,
    /// Given profile name only.
    ProfileName,
    /// Phone number.
    PhoneNumber,
    /// Service identifier (ACI/UUID).
    ServiceId,
    /// Internal conversation id, the last resort.
    ConversationId,
}

/// Precedence for direct chats: explicit contact name > profile display
/// name > raw identifier.
pub const CONTACT_PRECEDENCE: &[NameSource] = &[
    NameSource::ContactName,
    NameSource::ProfileFullName,
    NameSource::ProfileName,
    NameSource::PhoneNumber,
    NameSource::ServiceId,
    NameSource::ConversationId,
];

/// Precedence for groups: the title, else the raw id.
pub const GROUP_PRECEDENCE: &[NameSource] = &[NameSource::ContactName, NameSource::ConversationId];

/// Name used when a message has no resolvable sender at all.
pub const UNKNOWN_SENDER: &str = "Unknown";

/// Name used for messages sent from this device.
pub const SELF_SENDER: &str = "Me";

/// Every name candidate a conversation row can offer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameCandidates<'a> {
    pub contact_name: Option<&'a str>,
    pub profile_full_name: Option<&'a str>,
    pub profile_name: Option<&'a str>,
    pub phone_number: Option<&'a str>,
    pub service_id: Option<&'a str>,
    pub conversation_id: Option<&'a str>,
}

impl<'a> NameCandidates<'a> {
    #[must_use]
    pub fn from_row(row: &'a ConversationRow) -> Self {
        Self {
            contact_name: row.name.as_deref(),
            profile_full_name: row.profile_full_name.as_deref(),
            profile_name: row.profile_name.as_deref(),
            phone_number: row.e164.as_deref(),
            service_id: row.service_id.as_deref(),
            conversation_id: Some(row.id.as_str()),
        }
    }

    const fn get(&self, source: NameSource) -> Option<&'a str> {
        match source {
            NameSource::ContactName => self.contact_name,
            NameSource::ProfileFullName => self.profile_full_name,
            NameSource::ProfileName => self.profile_name,
            NameSource::PhoneNumber => self.phone_number,
            NameSource::ServiceId => self.service_id,
            NameSource::ConversationId => self.conversation_id,
        }
    }
}

/// Pick the first non-blank candidate in precedence order.
#[must_use]
pub fn resolve_name<'a>(
    candidates: &NameCandidates<'a>,
    precedence: &[NameSource],
) -> Option<(NameSource, &'a str)> {
    precedence.iter().find_map(|&source| {
        candidates
            .get(source)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| (source, v))
    })
}

/// Display name for a conversation row.
#[must_use]
pub fn conversation_display_name(row: &ConversationRow) -> String {
    let precedence = match row.kind {
        ConversationKind::Private => CONTACT_PRECEDENCE,
        ConversationKind::Group => GROUP_PRECEDENCE,
    };
    resolve_name(&NameCandidates::from_row(row), precedence)
        .map_or_else(|| UNKNOWN_SENDER.to_string(), |(_, name)| name.to_string())
}

/// Lookup table from any known identifier to a resolved display name.
#[derive(Debug, Default)]
pub struct ContactDirectory {
    by_conversation: HashMap<String, String>,
    by_service_id: HashMap<String, String>,
    by_phone: HashMap<String, String>,
}

impl ContactDirectory {
    /// Build the directory from every conversation row. Only direct chats
    /// register service ids and phone numbers.
    #[must_use]
    pub fn from_rows(rows: &[ConversationRow]) -> Self {
        let mut dir = Self::default();
        for row in rows {
            let name = conversation_display_name(row);
            if row.kind == ConversationKind::Private {
                if let Some(sid) = row.service_id.as_deref().filter(|s| !s.is_empty()) {
                    dir.by_service_id
                        .insert(sid.to_ascii_lowercase(), name.clone());
                }
                if let Some(phone) = row.e164.as_deref().filter(|s| !s.is_empty()) {
                    dir.by_phone.insert(phone.to_string(), name.clone());
                }
            }
            dir.by_conversation.insert(row.id.clone(), name);
        }
        dir
    }

    #[must_use]
    pub fn by_conversation(&self, id: &str) -> Option<&str> {
        self.by_conversation.get(id).map(String::as_str)
    }

    #[must_use]
    pub fn by_service_id(&self, service_id: &str) -> Option<&str> {
        self.by_service_id
            .get(&service_id.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn by_phone(&self, phone: &str) -> Option<&str> {
        self.by_phone.get(phone).map(String::as_str)
    }

    /// Resolve a participant known by service id and/or phone number.
    /// Falls back to the raw identifier, then to `fallback`.
    #[must_use]
    pub fn resolve_participant(
        &self,
        service_id: Option<&str>,
        phone: Option<&str>,
        fallback: Option<&str>,
    ) -> String {
        let service_id = service_id.filter(|s| !s.is_empty());
        let phone = phone.filter(|s| !s.is_empty());

        service_id
            .and_then(|s| self.by_service_id(s))
            .or_else(|| phone.and_then(|p| self.by_phone(p)))
            .or(fallback)
            .or(phone)
            .or(service_id)
            .unwrap_or(UNKNOWN_SENDER)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: &str) -> ConversationRow {
        ConversationRow {
            id: id.to_string(),
            kind: ConversationKind::Private,
            name: None,
            profile_name: None,
            profile_full_name: None,
            e164: None,
            service_id: None,
            members: Vec::new(),
        }
    }

    #[test]
    fn test_contact_name_wins() {
        let row = ConversationRow {
            name: Some("Aya Tanaka".into()),
            profile_full_name: Some("aya".into()),
            e164: Some("+15550001".into()),
            ..contact("c1")
        };
        assert_eq!(conversation_display_name(&row), "Aya Tanaka");
    }

    #[test]
    fn test_profile_name_before_raw_identifiers() {
        let row = ConversationRow {
            profile_name: Some("Jim".into()),
            e164: Some("+15550002".into()),
            ..contact("c2")
        };
        assert_eq!(conversation_display_name(&row), "Jim");
    }

    #[test]
    fn test_blank_candidates_are_skipped() {
        let row = ConversationRow {
            name: Some("   ".into()),
            e164: Some("+15550003".into()),
            ..contact("c3")
        };
        let resolved = resolve_name(&NameCandidates::from_row(&row), CONTACT_PRECEDENCE);
        assert_eq!(resolved, Some((NameSource::PhoneNumber, "+15550003")));
    }

    #[test]
    fn test_group_ignores_profile_fields() {
        let row = ConversationRow {
            kind: ConversationKind::Group,
            profile_name: Some("ignored".into()),
            ..contact("g1")
        };
        assert_eq!(conversation_display_name(&row), "g1");
    }

    #[test]
    fn test_directory_resolves_service_id_then_phone() {
        let rows = vec![
            ConversationRow {
                name: Some("Aya".into()),
                service_id: Some("ACI-1".into()),
                e164: Some("+1".into()),
                ..contact("c1")
            },
            ConversationRow {
                name: Some("Jim".into()),
                e164: Some("+2".into()),
                ..contact("c2")
            },
        ];
        let dir = ContactDirectory::from_rows(&rows);

        assert_eq!(dir.resolve_participant(Some("aci-1"), None, None), "Aya");
        assert_eq!(dir.resolve_participant(Some("aci-9"), Some("+2"), None), "Jim");
        assert_eq!(dir.resolve_participant(None, Some("+3"), Some("Fallback")), "Fallback");
        assert_eq!(dir.resolve_participant(None, Some("+3"), None), "+3");
        assert_eq!(dir.resolve_participant(None, None, None), UNKNOWN_SENDER);
    }
}
