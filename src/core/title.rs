use std::sync::LazyLock;

use regex::Regex;

/// Call-to-action words mirrors glue onto link text.
static BOILERPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(скачать|слушать|download|listen)\b").unwrap());

static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2}:\d{2}(?::\d{2})?)\b").unwrap());

const SEPARATORS: &[char] = &[' ', '-', '–', '—', ':', '\u{a0}'];

/// Parse mirror link text into `(artist, title)`.
///
/// Supported patterns:
/// - "Artist - Title"
/// - "Download: Artist - Title"
/// - "Title" (artist left empty for the caller to fill)
pub fn parse_link_text(raw: &str) -> (String, String) {
    let cleaned = clean_link_text(raw);
    match split_artist_title(&cleaned) {
        Some((artist, title)) => (artist, title),
        None => (String::new(), cleaned),
    }
}

/// Strips boilerplate words and surrounding separators.
pub fn clean_link_text(raw: &str) -> String {
    let stripped = BOILERPLATE.replace_all(raw, "");
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_matches(SEPARATORS).to_string()
}

fn split_artist_title(text: &str) -> Option<(String, String)> {
    let (artist, title) = text.split_once(" - ")?;
    let artist = artist.trim_matches(SEPARATORS);
    let title = title.trim_matches(SEPARATORS);
    if artist.is_empty() && title.is_empty() {
        return None;
    }
    Some((artist.to_string(), title.to_string()))
}

/// First `m:ss` (or `h:mm:ss`) looking token in a chunk of text or markup.
pub fn find_duration(text: &str) -> Option<String> {
    DURATION
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
