//! HTML extraction for the source platform's pages.
//!
//! Article pages embed an inline initial-state blob that carries the full
//! note object; when the blob is missing or does not contain the note, a
//! meta-tag fallback chain recovers what it can. The same module extracts
//! the 64-hex client code a session needs for the JSON list endpoint.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::article::DetailRecord;
use crate::constants::{EVAL_CONTENT_MAX_CHARS, PREVIEW_MAX_CHARS};
use crate::timeutil::parse_timestamp;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

// The client code appears under two names inside the inline state blob,
// each either bare or JSON-quoted.
static CLIENT_CODE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"ccd:\s*"([a-f0-9]{64})""#,
        r#""ccd"\s*:\s*"([a-f0-9]{64})""#,
        r#""clientCode"\s*:\s*"([a-f0-9]{64})""#,
        r#"clientCode:\s*"([a-f0-9]{64})""#,
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static OG_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static OG_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:image"]"#).unwrap());
static OG_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:description"]"#).unwrap());
static META_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="description"]"#).unwrap());
static META_AUTHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="author"]"#).unwrap());
static META_ARTICLE_AUTHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="article:author"]"#).unwrap());
static META_PUBLISHED: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="article:published_time"]"#).unwrap());
static TIME_DATETIME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("time[datetime]").unwrap());
static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static JSON_LD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

/// Body resolution order for the fallback parser: platform-specific note
/// containers first, generic content containers last.
const BODY_SELECTORS: &[&str] = &[
    "div.note-common-styles__textnote-body",
    r#"div[class*="textnote-body"]"#,
    r#"div[class*="content"]"#,
    r#"div[class*="article-body"]"#,
    "main",
    "article",
];

/// Remove tags and collapse whitespace into single spaces.
pub fn strip_tags(html: &str) -> String {
    let without_tags = TAG.replace_all(html, " ");
    WHITESPACE.replace_all(&without_tags, " ").trim().to_string()
}

/// First `PREVIEW_MAX_CHARS` characters of cleaned text.
pub fn preview(text: &str) -> String {
    text.chars()
        .take(PREVIEW_MAX_CHARS)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Prepare body text for the evaluation prompt: strip tags, collapse
/// whitespace, bound the length. An empty body degrades to a title-only stub
/// so the model still has something to judge.
pub fn prepare_for_evaluation(body: &str, title: &str) -> String {
    let cleaned: String = strip_tags(body).chars().take(EVAL_CONTENT_MAX_CHARS).collect();
    if cleaned.is_empty() {
        format!("Title only: {title}")
    } else {
        cleaned
    }
}

/// Extract the session client code embedded in a landing page.
pub fn extract_client_code(html: &str) -> Option<String> {
    CLIENT_CODE_PATTERNS
        .iter()
        .find_map(|re| re.captures(html).map(|c| c[1].to_string()))
}

/// Extract and parse the inline `window.__INITIAL_STATE__` blob.
pub fn extract_initial_state(html: &str) -> Option<Value> {
    let marker = "window.__INITIAL_STATE__";
    let start = html.find(marker)? + marker.len();
    let rest = &html[start..];
    let eq = rest.find('=')?;
    let after_eq = &rest[eq + 1..];
    let end = after_eq.find("</script>").unwrap_or(after_eq.len());
    let raw = after_eq[..end].trim().trim_end_matches(';').trim();
    serde_json::from_str(raw).ok()
}

/// Depth-first search of the state blob for the note whose `key` or `id`
/// matches the target.
pub fn find_note_in_state<'a>(state: &'a Value, key: &str) -> Option<&'a Value> {
    match state {
        Value::Object(map) => {
            let key_matches = map.get("key").and_then(Value::as_str) == Some(key);
            let id_matches = map
                .get("id")
                .map(|id| match id {
                    Value::String(s) => s == key,
                    Value::Number(n) => n.to_string() == key,
                    _ => false,
                })
                .unwrap_or(false);
            if key_matches || id_matches {
                return Some(state);
            }
            map.values().find_map(|v| find_note_in_state(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_note_in_state(v, key)),
        _ => None,
    }
}

/// Collect every note-shaped object (has a string `key` and a `user` object)
/// from a landing page's state blob, deduplicated by key. Used by the list
/// collector's HTML fallback for non-interests URLs.
pub fn collect_notes_from_state(state: &Value) -> Vec<Value> {
    let mut notes = Vec::new();
    let mut seen = std::collections::HashSet::new();
    walk_notes(state, &mut notes, &mut seen);
    notes
}

fn walk_notes(value: &Value, out: &mut Vec<Value>, seen: &mut std::collections::HashSet<String>) {
    match value {
        Value::Object(map) => {
            if let Some(key) = map.get("key").and_then(Value::as_str)
                && map.get("user").is_some_and(Value::is_object)
                && seen.insert(key.to_string())
            {
                out.push(value.clone());
            }
            for v in map.values() {
                walk_notes(v, out, seen);
            }
        }
        Value::Array(items) => {
            for v in items {
                walk_notes(v, out, seen);
            }
        }
        _ => {}
    }
}

/// Build a detail record from a note object found in the state blob.
pub fn detail_from_note(note: &Value) -> DetailRecord {
    let body = note.get("body").and_then(Value::as_str).unwrap_or("");
    let content_full = strip_tags(body);
    let content_preview = preview(&content_full);

    let published_at = note
        .get("publish_at")
        .or_else(|| note.get("publishAt"))
        .and_then(Value::as_str)
        .and_then(parse_timestamp);

    DetailRecord {
        title: note.get("name").and_then(Value::as_str).map(str::to_string),
        author: note
            .get("user")
            .and_then(|u| u.get("nickname"))
            .and_then(Value::as_str)
            .map(str::to_string),
        thumbnail: note
            .get("eyecatch")
            .or_else(|| note.get("eyecatch_url"))
            .and_then(Value::as_str)
            .map(str::to_string),
        published_at,
        note_type: note
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("TextNote")
            .to_string(),
        like_count: note.get("like_count").and_then(Value::as_i64).unwrap_or(0),
        comment_count: note.get("comment_count").and_then(Value::as_i64).unwrap_or(0),
        price: note.get("price").and_then(Value::as_i64).unwrap_or(0),
        can_read: note.get("can_read").and_then(Value::as_bool).unwrap_or(true),
        content_preview,
        content_full,
    }
}

/// Meta-tag fallback when the state blob is missing or the note is absent.
/// Each field takes the first populated source in its resolution chain.
pub fn detail_from_page(html: &str) -> DetailRecord {
    let doc = Html::parse_document(html);

    let og_title = meta_content(&doc, &OG_TITLE);
    // og:title carries a "title｜author" suffix on this platform
    let (title_from_og, author_from_og) = match og_title.as_deref().and_then(|t| t.rsplit_once('｜'))
    {
        Some((t, a)) => (
            Some(t.trim().to_string()),
            Some(a.trim().to_string()).filter(|s| !s.is_empty()),
        ),
        None => (og_title.clone(), None),
    };

    let title = title_from_og
        .filter(|t| !t.is_empty())
        .or_else(|| first_text(&doc, &H1))
        .or_else(|| first_text(&doc, &TITLE));

    let author = author_from_og
        .or_else(|| json_ld_author(&doc))
        .or_else(|| meta_content(&doc, &META_AUTHOR))
        .or_else(|| meta_content(&doc, &META_ARTICLE_AUTHOR));

    let thumbnail = meta_content(&doc, &OG_IMAGE);

    let published_at = doc
        .select(&TIME_DATETIME)
        .next()
        .and_then(|el| el.value().attr("datetime"))
        .map(str::to_string)
        .or_else(|| meta_content(&doc, &META_PUBLISHED))
        .and_then(|raw| parse_timestamp(&raw));

    let body_text = BODY_SELECTORS.iter().find_map(|s| {
        let sel = Selector::parse(s).ok()?;
        let el = doc.select(&sel).next()?;
        let text = strip_tags(&el.inner_html());
        (!text.is_empty()).then_some(text)
    });

    let (content_full, content_preview) = match body_text {
        Some(text) => {
            let p = preview(&text);
            (text, p)
        }
        None => {
            let desc = meta_content(&doc, &META_DESCRIPTION)
                .or_else(|| meta_content(&doc, &OG_DESCRIPTION))
                .unwrap_or_default();
            let p = preview(&desc);
            (p.clone(), p)
        }
    };

    DetailRecord {
        title,
        author,
        thumbnail,
        published_at,
        note_type: "TextNote".to_string(),
        like_count: 0,
        comment_count: 0,
        price: 0,
        can_read: true,
        content_preview,
        content_full,
    }
}

/// Parse a full article page: prefer the state blob's note object, fall back
/// to meta-tag extraction.
pub fn parse_article_page(html: &str, key: &str) -> DetailRecord {
    if let Some(state) = extract_initial_state(html)
        && let Some(note) = find_note_in_state(&state, key)
    {
        return detail_from_note(note);
    }
    detail_from_page(html)
}

fn meta_content(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn json_ld_author(doc: &Html) -> Option<String> {
    for script in doc.select(&JSON_LD) {
        let raw: String = script.text().collect();
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        let author = value.get("author")?;
        // author may be an object or an array of objects
        let name = match author {
            Value::Array(items) => items.first().and_then(|a| a.get("name")),
            other => other.get("name"),
        };
        if let Some(name) = name.and_then(Value::as_str).filter(|s| !s.is_empty()) {
            return Some(name.to_string());
        }
    }
    None
}
