//! The Markdown transcript grammar and its best-effort reparse.
//!
//! A transcript is a sequence of blocks separated by one blank line:
//!
//! ```text
//! [2024-01-02, 10:00] Aya: body text
//! more body
//! > Jim: quoted text
//! ![photo.jpg](media/0123456789abcdef.jpg)
//! (- Jim: 👍 -)
//! ```
//!
//! A previous export is the only durable record of past state, so merges key
//! messages on what can be recovered from this text: the minute, the sender
//! and a hash of the body. Reparse is best-effort; a body line that looks like
//! a header is escaped on write so it cannot start a new block.

use std::borrow::Cow;

use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Header timestamp format written by the renderer.
pub const HEADER_TIME_FORMAT: &str = "%Y-%m-%d, %H:%M";

/// Older exports wrote the header without the comma.
const LEGACY_HEADER_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Body of a tombstone line.
pub const DELETED_BODY: &str = "<message deleted>";

/// Per-conversation attachment directory that links point into.
pub const MEDIA_DIR: &str = "media";

/// Prefix of the placeholder written for an unavailable attachment.
pub const MISSING_ATTACHMENT_PREFIX: &str = "[missing attachment: ";

/// Reparse failures. Any of these makes the old transcript opaque.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TranscriptError {
    /// The first non-blank line is not a message header.
    #[error("line {line}: expected a message header, found {content:?}")]
    Unrecognized { line: usize, content: String },
}

/// A parsed `[date, time] Sender: rest` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLine<'a> {
    pub minute: NaiveDateTime,
    pub sender: &'a str,
    pub rest: &'a str,
}

/// Parse a header line, accepting both the current and the legacy stamp.
#[must_use]
pub fn parse_header(line: &str) -> Option<HeaderLine<'_>> {
    let inner = line.strip_prefix('[')?;
    let (stamp, rest) = inner.split_once("] ")?;
    if !(16..=17).contains(&stamp.len()) {
        return None;
    }
    let minute = NaiveDateTime::parse_from_str(stamp, HEADER_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(stamp, LEGACY_HEADER_TIME_FORMAT))
        .ok()?;

    let (sender, rest) = match rest.split_once(": ") {
        Some((sender, body)) => (sender, body),
        None => (rest.trim_end().strip_suffix(':')?, ""),
    };
    if sender.is_empty() {
        return None;
    }

    Some(HeaderLine {
        minute,
        sender,
        rest,
    })
}

/// Escape a body line that would otherwise parse as a header.
#[must_use]
pub fn escape_body_line(line: &str) -> Cow<'_, str> {
    if parse_header(line).is_some() {
        Cow::Owned(format!("\\{line}"))
    } else {
        Cow::Borrowed(line)
    }
}

/// Key identifying a message across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageKey {
    pub minute: NaiveDateTime,
    pub sender: String,
    /// Hex SHA-256 of the normalized body text.
    pub body_hash: String,
}

/// The lines of a block split into its grammar sections.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BlockSections<'a> {
    pub body: Vec<&'a str>,
    pub quote: Vec<&'a str>,
    pub attachments: Vec<&'a str>,
    pub reactions: Vec<&'a str>,
}

/// One message block of a rendered transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptBlock {
    pub key: MessageKey,
    /// Verbatim block text, without the trailing blank separator.
    pub text: String,
}

impl TranscriptBlock {
    /// Build a block from its verbatim text. Returns `None` when the first
    /// line is not a header.
    #[must_use]
    pub fn from_text(text: &str) -> Option<Self> {
        let text = text.trim_end_matches(['\n', '\r', ' ']);
        let first = text.lines().next()?;
        let header = parse_header(first)?;
        let sections = split_sections(header.rest, text.lines().skip(1));
        let key = MessageKey {
            minute: header.minute,
            sender: header.sender.to_string(),
            body_hash: hash_body(&sections.body),
        };
        Some(Self {
            key,
            text: text.to_string(),
        })
    }

    /// Header fields of this block.
    #[must_use]
    pub fn header(&self) -> Option<HeaderLine<'_>> {
        self.text.lines().next().and_then(parse_header)
    }

    /// Split the block into body, quote, attachment and reaction lines.
    #[must_use]
    pub fn sections(&self) -> BlockSections<'_> {
        let mut lines = self.text.lines();
        let rest = lines.next().and_then(parse_header).map_or("", |h| h.rest);
        split_sections(rest, lines)
    }

    /// Whether this block is a tombstone.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.header().is_some_and(|h| h.rest.trim_end() == DELETED_BODY)
    }
}

/// Classify lines from the end: reactions, then attachments, then quotes.
/// Whatever precedes them is body.
fn split_sections<'a>(
    first_rest: &'a str,
    continuation: impl Iterator<Item = &'a str>,
) -> BlockSections<'a> {
    let mut lines: Vec<&'a str> = std::iter::once(first_rest).chain(continuation).collect();

    let reactions = take_trailing(&mut lines, is_reaction_line);
    let attachments = take_trailing(&mut lines, is_attachment_line);
    let quote = take_trailing(&mut lines, is_quote_line);

    BlockSections {
        body: lines,
        quote,
        attachments,
        reactions,
    }
}

/// Pop the trailing run of lines matching `pred`, never consuming the first
/// line (the header remainder is always body).
fn take_trailing<'a>(lines: &mut Vec<&'a str>, pred: fn(&str) -> bool) -> Vec<&'a str> {
    let mut split = lines.len();
    while split > 1 && pred(lines[split - 1]) {
        split -= 1;
    }
    lines.split_off(split)
}

/// `(- Name: emoji -)`
#[must_use]
pub fn is_reaction_line(line: &str) -> bool {
    let line = line.trim_end();
    line.starts_with("(- ") && line.ends_with(" -)")
}

/// `![name](path)`, `[name](path)` or the missing placeholder.
#[must_use]
pub fn is_attachment_line(line: &str) -> bool {
    let line = line.trim_end();
    if line.starts_with(MISSING_ATTACHMENT_PREFIX) && line.ends_with(']') {
        return true;
    }
    let link = line.strip_prefix('!').unwrap_or(line);
    link.starts_with('[') && link.ends_with(')') && link.contains("](")
}

/// `> ...`
#[must_use]
pub fn is_quote_line(line: &str) -> bool {
    line == ">" || line.starts_with("> ")
}

fn hash_body(lines: &[&str]) -> String {
    let normalized = lines
        .iter()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    let digest = Sha256::digest(normalized.trim().as_bytes());
    format!("{digest:x}")
}

/// Parse a whole transcript into blocks.
///
/// # Errors
/// Returns [`TranscriptError::Unrecognized`] when text precedes the first
/// header, which means the file is not a transcript this tool wrote.
pub fn parse_transcript(text: &str) -> Result<Vec<TranscriptBlock>, TranscriptError> {
    let mut blocks = Vec::new();
    let mut current: Option<String> = None;

    for (idx, line) in text.lines().enumerate() {
        if parse_header(line).is_some() {
            if let Some(done) = current.take() {
                blocks.extend(TranscriptBlock::from_text(&done));
            }
            current = Some(line.to_string());
        } else if let Some(buf) = current.as_mut() {
            buf.push('\n');
            buf.push_str(line);
        } else if !line.trim().is_empty() {
            return Err(TranscriptError::Unrecognized {
                line: idx + 1,
                content: line.chars().take(60).collect(),
            });
        }
    }
    if let Some(done) = current {
        blocks.extend(TranscriptBlock::from_text(&done));
    }

    Ok(blocks)
}

/// Serialize blocks back into transcript text.
#[must_use]
pub fn write_transcript<'a>(blocks: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for text in blocks {
        out.push_str(text);
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "[2024-01-02, 10:00] Aya: hi there\n\
second line\n\
> Jim: earlier\n\
![photo.jpg](media/0123456789abcdef.jpg)\n\
(- Jim: 👍 -)\n\
\n\
[2024-01-02, 10:01] Jim: yo\n\
\n";

    #[test]
    fn test_parse_header_current_and_legacy() {
        let h = parse_header("[2024-01-02, 10:00] Aya: hi").unwrap();
        assert_eq!(h.sender, "Aya");
        assert_eq!(h.rest, "hi");

        let legacy = parse_header("[2024-01-02 10:00] Aya: hi  ").unwrap();
        assert_eq!(legacy.minute, h.minute);

        let empty = parse_header("[2024-01-02, 10:00] Aya:").unwrap();
        assert_eq!(empty.rest, "");

        assert!(parse_header("[photo](media/a.jpg)").is_none());
        assert!(parse_header("[2024-13-02, 10:00] Aya: x").is_none());
        assert!(parse_header("plain text").is_none());
    }

    #[test]
    fn test_parse_transcript_blocks() {
        let blocks = parse_transcript(SAMPLE).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].key.sender, "Aya");
        assert!(blocks[0].text.ends_with("(- Jim: 👍 -)"));
        assert_eq!(blocks[1].text, "[2024-01-02, 10:01] Jim: yo");
    }

    #[test]
    fn test_write_after_parse_is_identical() {
        let blocks = parse_transcript(SAMPLE).unwrap();
        let text = write_transcript(blocks.iter().map(|b| b.text.as_str()));
        assert_eq!(text, SAMPLE);
    }

    #[test]
    fn test_sections() {
        let blocks = parse_transcript(SAMPLE).unwrap();
        let sections = blocks[0].sections();
        assert_eq!(sections.body, vec!["hi there", "second line"]);
        assert_eq!(sections.quote, vec!["> Jim: earlier"]);
        assert_eq!(sections.attachments.len(), 1);
        assert_eq!(sections.reactions, vec!["(- Jim: 👍 -)"]);
    }

    #[test]
    fn test_key_ignores_reactions_and_attachments() {
        let a = TranscriptBlock::from_text("[2024-01-02, 10:00] Aya: hi\n(- Jim: 👍 -)").unwrap();
        let b = TranscriptBlock::from_text(
            "[2024-01-02, 10:00] Aya: hi\n[missing attachment: a.png]\n(- Jim: 👍 -)\n(- Aya: ❤ -)",
        )
        .unwrap();
        assert_eq!(a.key, b.key);

        let edited = TranscriptBlock::from_text("[2024-01-02, 10:00] Aya: hello").unwrap();
        assert_ne!(a.key, edited.key);
    }

    #[test]
    fn test_foreign_file_is_rejected() {
        let err = parse_transcript("# Some notes\n[2024-01-02, 10:00] Aya: hi\n").unwrap_err();
        assert!(matches!(err, TranscriptError::Unrecognized { line: 1, .. }));
        assert_eq!(parse_transcript("").unwrap(), Vec::new());
    }

    #[test]
    fn test_escaped_header_stays_in_body() {
        let line = "[2024-01-02, 10:05] Bob: fake";
        let escaped = escape_body_line(line);
        assert_eq!(escaped, format!("\\{line}"));

        let text = format!("[2024-01-02, 10:00] Aya: quoting\n{escaped}\n\n");
        let blocks = parse_transcript(&text).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(escape_body_line("normal"), "normal");
    }

    #[test]
    fn test_tombstone() {
        let block = TranscriptBlock::from_text("[2024-01-02, 10:00] Aya: <message deleted>").unwrap();
        assert!(block.is_tombstone());
    }
}
