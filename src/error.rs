use thiserror::Error;

/// Failure inside a backend adapter. These never cross the search boundary;
/// they are logged and flattened to an empty result list there.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("backend answered with status {status}")]
    Unavailable { status: u16 },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("no media found: {0}")]
    NoMedia(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("empty query")]
    EmptyQuery,

    #[error("no resolvable media for {locator}")]
    NoResolvableMedia { locator: String },

    #[error("downloaded file is too small ({len} bytes, expected at least {min})")]
    CorruptOrTruncatedMedia { len: usize, min: usize },

    #[error("download failed with status {0}")]
    Status(u16),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tag error: {0}")]
    Tag(#[from] id3::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
