//! Merging and ordering of search results.
//!
//! Scores use a substring-tolerant partial ratio: a short query such as
//! "morning" should score high against "Good Morning", which a whole-string
//! ratio would penalize for the length difference.

use crate::models::{RankedResult, Track};

/// Concatenates per-backend result lists, keeping their order.
pub fn aggregate(lists: Vec<Vec<Track>>) -> Vec<Track> {
    lists.into_iter().flatten().collect()
}

/// Scores every track against the query and sorts by descending score.
/// Equal scores keep their input order.
pub fn rank(query: &str, tracks: Vec<Track>) -> Vec<RankedResult> {
    let q = query.trim().to_lowercase();
    let mut ranked: Vec<RankedResult> = tracks
        .into_iter()
        .map(|track| RankedResult {
            score: score(&q, &track),
            track,
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Best of title and artist similarity, 0..=100. `query` must already be
/// lower-cased.
pub fn score(query: &str, track: &Track) -> u8 {
    let title = partial_ratio(query, &track.title.to_lowercase());
    let artist = partial_ratio(query, &track.artist.to_lowercase());
    title.max(artist)
}

/// Similarity of the shorter string to its best-matching window in the
/// longer one, scaled to 0..=100. Windows are every full-length slice plus
/// the shorter prefixes and suffixes.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return if long.is_empty() { 100 } else { 0 };
    }

    let needle: String = short.iter().collect();
    let n = short.len();
    // Partial overlaps at either end count too, so a query hanging off the
    // start or end of the text still matches what it covers.
    let edges = (1..n).flat_map(|i| [&long[..i], &long[long.len() - i..]]);
    let mut best = 0.0_f64;
    for window in long.windows(n).chain(edges) {
        let hay: String = window.iter().collect();
        let similarity = strsim::normalized_levenshtein(&needle, &hay);
        if similarity > best {
            best = similarity;
            if best >= 1.0 {
                break;
            }
        }
    }

    (best * 100.0).round().clamp(0.0, 100.0) as u8
}
