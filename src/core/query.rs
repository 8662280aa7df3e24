use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::models::SearchKey;

static NON_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9а-я]+").unwrap());

/// Turns a raw user query into the per-backend search key.
///
/// - "Good Morning!" → slug "good-morning"
/// - "Би-2 & Ко" → slug "би-2-ко", label punycode
///
/// An empty (or whitespace-only) query is rejected.
pub fn normalize(raw: &str) -> Result<SearchKey> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(Error::EmptyQuery);
    }

    let slug = slugify(text);
    let label = dns_label(&slug);

    Ok(SearchKey {
        text: text.to_string(),
        slug,
        label,
    })
}

/// Lower-cases and reduces the input to `[a-z0-9а-я]` runs joined by single
/// hyphens.
pub fn slugify(s: &str) -> String {
    let lowered = s.to_lowercase();
    NON_SLUG
        .replace_all(&lowered, "-")
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// IDNA-encodes a slug for use as a subdomain. Falls back to the slug itself
/// when the encoder rejects it.
pub fn dns_label(slug: &str) -> String {
    match idna::domain_to_ascii_strict(slug) {
        Ok(label) if !label.is_empty() => label,
        Ok(_) => slug.to_string(),
        Err(e) => {
            tracing::debug!(slug, error = ?e, "IDNA encoding failed, using raw slug");
            slug.to_string()
        }
    }
}
