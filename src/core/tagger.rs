use std::io::Cursor;

use id3::{Tag, TagLike, Version};

use crate::error::Result;

/// Tag text and optional cover to embed into a downloaded file.
#[derive(Debug, Clone, Default)]
pub struct TagInfo {
    pub title: String,
    pub artist: String,
    pub cover: Option<Vec<u8>>,
}

/// Reads the ID3 tag at the start of `audio`, if any.
pub fn read_tags(audio: &[u8]) -> Result<Option<Tag>> {
    match Tag::read_from2(Cursor::new(audio)) {
        Ok(tag) => Ok(Some(tag)),
        Err(id3::Error {
            kind: id3::ErrorKind::NoTag,
            ..
        }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Returns `audio` with an ID3v2.4 tag in front of the audio frames.
/// Frames of a tag the source already carried are kept unless overridden;
/// a new cover replaces all existing pictures.
pub fn embed_tags(audio: &[u8], info: &TagInfo) -> Result<Vec<u8>> {
    let mut tag = match read_tags(audio) {
        Ok(Some(tag)) => tag,
        Ok(None) => Tag::new(),
        Err(e) => {
            tracing::debug!(error = %e, "unreadable source tag, writing a new one");
            Tag::new()
        }
    };
    tag.set_title(&info.title);
    tag.set_artist(&info.artist);
    if let Some(ref art_data) = info.cover {
        tag.remove_all_pictures();
        tag.add_frame(id3::frame::Picture {
            mime_type: cover_mime(art_data).to_string(),
            picture_type: id3::frame::PictureType::CoverFront,
            description: String::new(),
            data: art_data.clone(),
        });
    }

    let frames = strip_id3v2(audio);
    let mut out = Vec::with_capacity(frames.len() + 1024);
    tag.write_to(&mut out, Version::Id3v24)?;
    out.extend_from_slice(frames);
    Ok(out)
}

/// Skips a leading ID3v2 tag (header, body and optional footer).
fn strip_id3v2(audio: &[u8]) -> &[u8] {
    if audio.len() < 10 || &audio[..3] != b"ID3" {
        return audio;
    }
    let size = audio[6..10]
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | (*b as usize & 0x7F));
    let footer = if audio[5] & 0x10 != 0 { 10 } else { 0 };
    let end = 10 + size + footer;
    if end > audio.len() {
        return audio;
    }
    &audio[end..]
}

/// Cover MIME type from the image's leading bytes; JPEG when unknown.
fn cover_mime(data: &[u8]) -> &'static str {
    match data {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/jpeg",
    }
}
