//! HTML view of a transcript.
//!
//! Built from the final Markdown, so merged and carried-over conversations
//! render the same way as fresh ones. Message bodies go through
//! `pulldown-cmark` with raw HTML turned into text.

use std::fmt::Write as _;

use html_escape::{encode_double_quoted_attribute, encode_text};
use pulldown_cmark::{html, Event, Options, Parser};

use crate::domain::transcript::{TranscriptBlock, MISSING_ATTACHMENT_PREFIX};
use crate::domain::identity::SELF_SENDER;

const AUDIO_EXTENSIONS: &[&str] = &["m4a", "aac", "mp3", "ogg", "opus", "wav"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm"];

const STYLE: &str = "body{font-family:sans-serif;max-width:50em;margin:auto;background:#f4f4f4}\
nav{display:flex;justify-content:space-between;margin:1em 0}\
.msg{background:#fff;border-radius:6px;margin:.5em 0;padding:.5em .8em}\
.msg.me{background:#e3efff}\
.meta{color:#666;font-size:.85em}\
.sender{font-weight:bold;margin-left:.5em}\
.quote{border-left:3px solid #999;padding-left:.5em;color:#555}\
.reactions{font-size:.85em;color:#555}\
.missing{color:#a00;font-style:italic}\
.deleted{color:#888;font-style:italic}\
figure{margin:.3em 0}img,video{max-width:100%}";

/// Markdown to HTML. Raw HTML is shown as text and single newlines are kept
/// as line breaks.
#[must_use]
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

/// Number of pages for `count` messages.
#[must_use]
pub const fn page_count(count: usize, per_page: usize) -> usize {
    if per_page == 0 || count == 0 {
        1
    } else {
        count.div_ceil(per_page)
    }
}

/// Render a whole conversation page set.
#[must_use]
pub fn render_html(title: &str, blocks: &[TranscriptBlock], per_page: usize) -> String {
    let pages = page_count(blocks.len(), per_page);
    let chunk = if per_page == 0 {
        blocks.len().max(1)
    } else {
        per_page
    };

    let mut content = String::new();
    if blocks.is_empty() {
        content.push_str(&page_open(0, pages));
        content.push_str("</div>\n");
    }
    for (page, group) in blocks.chunks(chunk).enumerate() {
        content.push_str(&page_open(page, pages));
        for block in group {
            content.push_str(&render_message(block));
        }
        content.push_str("</div>\n");
    }

    let title = encode_text(title);
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
<style>{STYLE}</style>\n</head>\n<body>\n<h1>{title}</h1>\n{content}</body>\n</html>\n"
    )
}

fn page_open(page: usize, pages: usize) -> String {
    let prev = if page == 0 {
        "PREV".to_string()
    } else {
        format!("<a href=\"#pg{}\">PREV</a>", page - 1)
    };
    let next = if page + 1 >= pages {
        "NEXT".to_string()
    } else {
        format!("<a href=\"#pg{}\">NEXT</a>", page + 1)
    };
    format!(
        "<div class=\"page\" id=\"pg{page}\">\n<nav><div class=\"prev\">{prev}</div>\
<div class=\"next\">{next}</div></nav>\n"
    )
}

fn render_message(block: &TranscriptBlock) -> String {
    let Some(header) = block.header() else {
        return String::new();
    };
    let sections = block.sections();
    let class = match (header.sender == SELF_SENDER, block.is_tombstone()) {
        (_, true) => "msg deleted",
        (true, false) => "msg me",
        (false, false) => "msg",
    };

    let mut out = String::new();
    let _ = write!(
        out,
        "<div class=\"{class}\">\n<div class=\"meta\"><span class=\"date\">{}</span>\
<span class=\"sender\">{}</span></div>\n",
        header.minute.format("%Y-%m-%d %H:%M"),
        encode_text(header.sender)
    );

    if !sections.quote.is_empty() {
        let quoted: Vec<&str> = sections
            .quote
            .iter()
            .map(|l| l.strip_prefix("> ").unwrap_or(l.trim_start_matches('>')))
            .collect();
        let _ = writeln!(
            out,
            "<div class=\"quote\">{}</div>",
            encode_text(&quoted.join("\n")).replace('\n', "<br>")
        );
    }

    let body = sections.body.join("\n");
    if !body.trim().is_empty() {
        let _ = writeln!(out, "<div class=\"body\">{}</div>", markdown_to_html(&body));
    }

    for line in &sections.attachments {
        out.push_str(&render_attachment(line));
        out.push('\n');
    }

    if !sections.reactions.is_empty() {
        let reactions: Vec<String> = sections
            .reactions
            .iter()
            .map(|l| {
                let inner = l.trim_end().trim_start_matches("(- ").trim_end_matches(" -)");
                encode_text(inner).into_owned()
            })
            .collect();
        let _ = writeln!(out, "<div class=\"reactions\">{}</div>", reactions.join(" · "));
    }

    out.push_str("</div>\n");
    out
}

/// Split `[name](target)` (optionally `!`-prefixed) into its parts.
fn parse_link(line: &str) -> Option<(bool, &str, &str)> {
    let line = line.trim_end();
    let (image, link) = line
        .strip_prefix('!')
        .map_or((false, line), |rest| (true, rest));
    let inner = link.strip_prefix('[')?.strip_suffix(')')?;
    let (name, target) = inner.rsplit_once("](")?;
    Some((image, name, target))
}

fn render_attachment(line: &str) -> String {
    if let Some(name) = line
        .trim_end()
        .strip_prefix(MISSING_ATTACHMENT_PREFIX)
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return format!(
            "<div class=\"missing\">missing attachment: {}</div>",
            encode_text(name)
        );
    }
    let Some((image, name, target)) = parse_link(line) else {
        return format!("<div>{}</div>", encode_text(line));
    };
    let label = encode_text(name);
    let alt = encode_double_quoted_attribute(name);
    let src = encode_double_quoted_attribute(target);
    let ext = target
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();

    if image {
        format!("<figure><a href=\"{src}\"><img src=\"{src}\" alt=\"{alt}\"></a><figcaption>{label}</figcaption></figure>")
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        format!("<div><audio controls src=\"{src}\"></audio> <a href=\"{src}\">{label}</a></div>")
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        format!("<div><video controls src=\"{src}\"></video> <a href=\"{src}\">{label}</a></div>")
    } else {
        format!("<div><a href=\"{src}\">{label}</a></div>")
    }
}
