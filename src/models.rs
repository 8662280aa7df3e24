use std::fmt;

pub const UNKNOWN_TITLE: &str = "Untitled";
pub const UNKNOWN_ARTIST: &str = "Unknown artist";
pub const UNKNOWN_DURATION: &str = "?:??";

/// Which backend produced a track, and therefore how its locator resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    StreamingApi,
    ScrapedMirror,
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::StreamingApi => "SoundCloud",
            SourceKind::ScrapedMirror => "SkySound",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A search hit. `locator` is never playable on its own; it has to go
/// through the resolver for `source` first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub title: String,
    pub artist: String,
    pub duration: String,
    pub source: SourceKind,
    pub locator: String,
    pub thumbnail: Option<String>,
}

impl Track {
    /// Builds a track, filling blank fields with placeholders.
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        duration: impl Into<String>,
        source: SourceKind,
        locator: impl Into<String>,
    ) -> Self {
        Self {
            title: or_placeholder(title.into(), UNKNOWN_TITLE),
            artist: or_placeholder(artist.into(), UNKNOWN_ARTIST),
            duration: or_placeholder(duration.into(), UNKNOWN_DURATION),
            source,
            locator: locator.into(),
            thumbnail: None,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: Option<String>) -> Self {
        self.thumbnail = thumbnail.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn summary(&self) -> String {
        format!("[{}] {} - {}", self.duration, self.artist, self.title)
    }
}

fn or_placeholder(value: String, placeholder: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        placeholder.to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedResult {
    pub score: u8,
    pub track: Track,
}

/// Normalized form of a user query, one field per backend need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchKey {
    /// Trimmed raw query, sent as-is to text search endpoints.
    pub text: String,
    /// Lower-cased, hyphen-separated form.
    pub slug: String,
    /// DNS-safe label (punycode when possible, otherwise the slug).
    pub label: String,
}

/// Formats a millisecond duration as `m:ss`.
pub fn format_millis(millis: u64) -> String {
    format!("{}:{:02}", millis / 60_000, (millis / 1000) % 60)
}
