//! Error types for radar fetching and decoding.

use thiserror::Error;

/// Failure of a site or mosaic update, shown to the user in place of the
/// display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadarError {
    /// No remote or cached file matched the requested time
    #[error("No suitable files found")]
    NoSuitableFile,

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Load failed: {0}")]
    DecodeFailed(String),
}

/// Errors from listing or downloading files.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    /// File is not cached and the fetch mode forbids downloading
    #[error("Not cached: {0}")]
    NotCached(String),
}

/// Errors from decompressing or parsing volume files.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Truncated data: {0}")]
    Truncated(String),

    #[error("Invalid data: {0}")]
    Invalid(String),

    /// External decompressor exited unsuccessfully
    #[error("Command `{command}` failed: {status}")]
    Command { command: String, status: String },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Errors reading or writing settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<FetchError> for RadarError {
    fn from(e: FetchError) -> Self {
        RadarError::FetchFailed(e.to_string())
    }
}

impl From<DecodeError> for RadarError {
    fn from(e: DecodeError) -> Self {
        RadarError::DecodeFailed(e.to_string())
    }
}
