//! Cache-backed HTTP archive access.

use super::{FetchMode, FetchService, ListQuery, ProgressFn};
use crate::error::FetchError;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

const USER_AGENT: &str = concat!("nexrad-layers/", env!("CARGO_PKG_VERSION"));

/// Download chunk size.
const CHUNK: usize = 64 * 1024;

/// Files served over HTTP and mirrored under a local cache directory.
pub struct HttpArchive {
    cache_root: PathBuf,
    client: reqwest::blocking::Client,
}

impl HttpArchive {
    pub fn new(cache_root: impl Into<PathBuf>) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            cache_root: cache_root.into(),
            client,
        })
    }

    fn local_files(&self, query: &ListQuery) -> Result<Vec<String>, FetchError> {
        let dir = match &query.subdir {
            Some(sub) => self.cache_root.join(sub),
            None => self.cache_root.clone(),
        };
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if query.pattern.is_match(name) {
                    files.push(name.to_string());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    fn remote_files(&self, url: &str, query: &ListQuery) -> Result<Vec<String>, FetchError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let text = response.text()?;
        Ok(parse_index(&text, query))
    }

    /// Size of the remote file, when the server reports one.
    fn remote_size(&self, url: &str) -> Result<Option<u64>, FetchError> {
        let response = self.client.head(url).send()?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        // A HEAD response has no body, so the size only shows in the header
        let size = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok());
        Ok(size)
    }

    fn download(
        &self,
        url: &str,
        path: &Path,
        progress: &mut ProgressFn<'_>,
    ) -> Result<(), FetchError> {
        log::debug!("Downloading {} -> {}", url, path.display());
        let mut response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let total = response.content_length().unwrap_or(0);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = path.with_extension("part");
        let mut out = fs::File::create(&partial)?;
        let mut buf = vec![0u8; CHUNK];
        let mut received = 0u64;
        progress(0, total);
        loop {
            let n = response.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])?;
            received += n as u64;
            progress(received, total.max(received));
        }
        out.flush()?;
        drop(out);
        fs::rename(&partial, path)?;
        log::info!("Downloaded {} ({} bytes)", url, received);
        Ok(())
    }
}

/// Extracts file names from a remote index listing.
fn parse_index(text: &str, query: &ListQuery) -> Vec<String> {
    text.lines()
        .flat_map(|line| query.extract.captures_iter(line.trim_end()))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .filter(|name| query.pattern.is_match(name))
        .collect()
}

/// Remote names in order, then local names not already listed.
fn merge_listing(remote: Vec<String>, local: Vec<String>) -> Vec<String> {
    let mut files: Vec<String> = Vec::with_capacity(remote.len() + local.len());
    for name in remote.into_iter().chain(local) {
        if !files.contains(&name) {
            files.push(name);
        }
    }
    files
}

impl FetchService for HttpArchive {
    fn list_available(&self, query: &ListQuery) -> Result<Vec<String>, FetchError> {
        let local = self.local_files(query)?;
        let remote = match &query.index_url {
            Some(url) => match self.remote_files(url, query) {
                Ok(files) => files,
                Err(e) => {
                    log::warn!("Failed to list {}: {}", url, e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        log::debug!(
            "Listed {} remote and {} cached file(s)",
            remote.len(),
            local.len()
        );
        Ok(merge_listing(remote, local))
    }

    fn fetch(
        &self,
        url: &str,
        local: &str,
        mode: FetchMode,
        progress: &mut ProgressFn<'_>,
    ) -> Result<PathBuf, FetchError> {
        let path = self.cache_root.join(local);
        let cached = fs::metadata(&path).ok().filter(|m| m.is_file());

        match (mode, cached) {
            (FetchMode::Local, Some(meta)) | (FetchMode::Once, Some(meta)) => {
                progress(meta.len(), meta.len());
                Ok(path)
            }
            (FetchMode::Local, None) => Err(FetchError::NotCached(local.to_string())),
            (FetchMode::Once, None) | (FetchMode::Update, None) => {
                self.download(url, &path, progress)?;
                Ok(path)
            }
            (FetchMode::Update, Some(meta)) => {
                match self.remote_size(url) {
                    Ok(Some(size)) if size == meta.len() => {
                        progress(size, size);
                    }
                    Ok(_) => self.download(url, &path, progress)?,
                    Err(e) => {
                        log::warn!("Using cached {} ({})", local, e);
                        progress(meta.len(), meta.len());
                    }
                }
                Ok(path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn site_query(index_url: Option<String>) -> ListQuery {
        ListQuery {
            pattern: Regex::new(r"^K\w{3}_\d{8}_\d{4}$").unwrap(),
            subdir: Some("KLSX".into()),
            extract: Regex::new(r"\d+ (.*)").unwrap(),
            index_url,
        }
    }

    #[test]
    fn test_parse_index() {
        let text = "1234 KLSX_20240506_2135\n\
                    99 KLSX_20240506_2140\n\
                    garbage\n\
                    55 dir.list\n";
        assert_eq!(
            parse_index(text, &site_query(None)),
            vec!["KLSX_20240506_2135", "KLSX_20240506_2140"]
        );
    }

    #[test]
    fn test_merge_keeps_remote_order() {
        let merged = merge_listing(vec!["b".into(), "a".into()], vec!["a".into(), "c".into()]);
        assert_eq!(merged, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_parse_html_index() {
        let query = ListQuery {
            pattern: Regex::new(r#"^Conus_[^"]*_N0Ronly.gif$"#).unwrap(),
            subdir: None,
            extract: Regex::new(r#"href="([^"]*)""#).unwrap(),
            index_url: None,
        };
        let text = r#"<a href="Conus_20240506_2128_N0Ronly.gif">a</a> <a href="Conus_20240506_2138_N0Ronly.gif">b</a>
<a href="Conus_Loop.gif">loop</a>"#;
        assert_eq!(
            parse_index(text, &query),
            vec![
                "Conus_20240506_2128_N0Ronly.gif",
                "Conus_20240506_2138_N0Ronly.gif",
            ]
        );
    }

    #[test]
    fn test_local_listing_and_modes() {
        let dir = tempfile::tempdir().unwrap();
        let site_dir = dir.path().join("KLSX");
        fs::create_dir_all(&site_dir).unwrap();
        fs::write(site_dir.join("KLSX_20240506_2135"), b"volume").unwrap();
        fs::write(site_dir.join("KLSX_20240506_2135.raw"), b"raw").unwrap();

        let archive = HttpArchive::new(dir.path()).unwrap();
        let files = archive.list_available(&site_query(None)).unwrap();
        assert_eq!(files, vec!["KLSX_20240506_2135"]);

        let mut calls = Vec::new();
        let path = archive
            .fetch(
                "http://127.0.0.1:9/KLSX/KLSX_20240506_2135",
                "KLSX/KLSX_20240506_2135",
                FetchMode::Local,
                &mut |cur, total| calls.push((cur, total)),
            )
            .unwrap();
        assert_eq!(path, site_dir.join("KLSX_20240506_2135"));
        assert_eq!(calls, vec![(6, 6)]);

        let missing = archive.fetch(
            "http://127.0.0.1:9/KLSX/KLSX_20240506_2200",
            "KLSX/KLSX_20240506_2200",
            FetchMode::Local,
            &mut |_, _| {},
        );
        assert!(matches!(missing, Err(FetchError::NotCached(_))));

        // Cached copy satisfies a once-only fetch without network access
        let path = archive
            .fetch(
                "http://127.0.0.1:9/KLSX/KLSX_20240506_2135",
                "KLSX/KLSX_20240506_2135",
                FetchMode::Once,
                &mut |_, _| {},
            )
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_missing_cache_dir_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let archive = HttpArchive::new(dir.path().join("nowhere")).unwrap();
        let files = archive.list_available(&site_query(None)).unwrap();
        assert!(files.is_empty());
    }

    /// Serves `body` to every request on a local port and counts the GETs.
    fn serve(body: &'static [u8]) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let url = format!("http://{}/KLSX/KLSX_20240506_2135", addr);
        let gets = Arc::new(AtomicUsize::new(0));
        let counter = gets.clone();
        std::thread::spawn(move || {
            for mut stream in listener.incoming().flatten() {
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request = String::new();
                reader.read_line(&mut request).unwrap();
                loop {
                    let mut header = String::new();
                    let n = reader.read_line(&mut header).unwrap();
                    if n == 0 || header == "\r\n" {
                        break;
                    }
                }
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                stream.write_all(head.as_bytes()).unwrap();
                if request.starts_with("GET") {
                    counter.fetch_add(1, Ordering::SeqCst);
                    stream.write_all(body).unwrap();
                }
            }
        });
        (url, gets)
    }

    #[test]
    fn test_update_downloads_only_on_size_change() {
        let dir = tempfile::tempdir().unwrap();
        let (url, gets) = serve(b"0123456789");
        let archive = HttpArchive::new(dir.path()).unwrap();
        let local = "KLSX/KLSX_20240506_2135";

        let path = archive
            .fetch(&url, local, FetchMode::Update, &mut |_, _| {})
            .unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"0123456789");
        assert_eq!(gets.load(Ordering::SeqCst), 1);

        // Same size remotely, so the cached copy stands
        let mut calls = Vec::new();
        let mut record = |cur: u64, total: u64| calls.push((cur, total));
        archive
            .fetch(&url, local, FetchMode::Update, &mut record)
            .unwrap();
        assert_eq!(gets.load(Ordering::SeqCst), 1);
        assert_eq!(calls, vec![(10, 10)]);

        fs::write(&path, b"old").unwrap();
        archive
            .fetch(&url, local, FetchMode::Update, &mut |_, _| {})
            .unwrap();
        assert_eq!(gets.load(Ordering::SeqCst), 2);
        assert_eq!(fs::read(&path).unwrap(), b"0123456789");
    }
}
