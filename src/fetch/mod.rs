//! Remote file listing and download.
//!
//! Workers talk to a [`FetchService`] from their own thread, so
//! implementations must be `Send + Sync`. [`HttpArchive`] is the real
//! implementation backed by a local cache directory and blocking HTTP.

mod http;
mod nearest;

pub use http::HttpArchive;
pub use nearest::{file_time, find_nearest, CONUS_TIME_OFFSET, FILE_TIME_FORMAT, SITE_TIME_OFFSET};

use crate::error::FetchError;
use regex::Regex;
use std::path::PathBuf;

/// How a fetch treats the local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Only use the cached copy, never touch the network
    Local,
    /// Download only when no cached copy exists
    Once,
    /// Download when missing or when the remote size differs
    Update,
}

/// Describes which files to list.
#[derive(Debug, Clone)]
pub struct ListQuery {
    /// Names must match this to be listed
    pub pattern: Regex,
    /// Cache subdirectory to scan, e.g. the site code
    pub subdir: Option<String>,
    /// Applied to each line of the remote index; capture 1 is the name
    pub extract: Regex,
    /// Remote index to read; `None` lists the cache only
    pub index_url: Option<String>,
}

/// Called with (bytes received, total bytes) while downloading.
pub type ProgressFn<'a> = dyn FnMut(u64, u64) + 'a;

/// Lists and fetches archive files.
pub trait FetchService: Send + Sync {
    /// Lists file names available locally and, when `index_url` is set,
    /// remotely. Remote entries come first in index order, followed by
    /// cache-only entries.
    fn list_available(&self, query: &ListQuery) -> Result<Vec<String>, FetchError>;

    /// Makes `url` available at cache path `local`, returning the full
    /// local path.
    fn fetch(
        &self,
        url: &str,
        local: &str,
        mode: FetchMode,
        progress: &mut ProgressFn<'_>,
    ) -> Result<PathBuf, FetchError>;
}

/// Progress line shown while loading, e.g. `Loading...  12.3% (0.12/1.00 MB)`.
pub fn progress_text(current: u64, total: u64) -> String {
    let fraction = if total > 0 {
        (current as f64 / total as f64).min(1.0)
    } else {
        0.0
    };
    format!(
        "Loading... {:5.1}% ({:.2}/{:.2} MB)",
        fraction * 100.0,
        current as f64 / 1_000_000.0,
        total as f64 / 1_000_000.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_text() {
        assert_eq!(
            progress_text(120_000, 1_000_000),
            "Loading...  12.0% (0.12/1.00 MB)"
        );
        assert_eq!(progress_text(0, 0), "Loading...   0.0% (0.00/0.00 MB)");
    }
}
