use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::Track;

const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Makes `s` safe as a single path component on the usual filesystems.
/// Reserved and control characters become `_`; trailing dots and spaces,
/// which Windows drops silently, are removed.
pub fn sanitize_filename(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| if c.is_control() || RESERVED.contains(&c) { '_' } else { c })
        .collect();
    cleaned.trim_end_matches(['.', ' ']).to_string()
}

/// `"{artist} - {title}.mp3"` for a track.
pub fn build_filename(track: &Track) -> String {
    format!(
        "{} - {}.mp3",
        sanitize_filename(track.artist.trim()),
        sanitize_filename(track.title.trim())
    )
}

/// First path in `dir` for the track that does not exist yet, adding
/// " (2)", " (3)", … before the extension on collision.
pub fn unique_path(dir: &Path, track: &Track) -> PathBuf {
    let name = build_filename(track);
    let candidate = dir.join(&name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = name.trim_end_matches(".mp3");
    (2..)
        .map(|n| dir.join(format!("{stem} ({n}).mp3")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Writes the audio into `dir` without overwriting anything.
pub fn save_track(dir: &Path, track: &Track, audio: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = unique_path(dir, track);
    std::fs::write(&path, audio)?;
    Ok(path)
}
