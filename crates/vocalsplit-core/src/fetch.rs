//! Stem asset fetching
//!
//! Locators are either http(s) URLs served by the separation service, or local
//! files (`file://` URLs and bare paths) when the stems were produced on disk.
//! Everything sits behind [`AssetFetcher`] so the loader and downloader can be
//! driven from memory in tests.

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while fetching an asset
#[derive(Error, Debug)]
pub enum FetchError {
    /// Server answered with a non-success status
    #[error("{locator} returned HTTP {status}")]
    Status { locator: String, status: u16 },

    /// Connection, DNS, TLS or body read failure
    #[error("network error fetching {locator}: {message}")]
    Network { locator: String, message: String },

    /// Local file could not be read
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source of raw asset bytes
pub trait AssetFetcher: Send + Sync {
    /// Fetch the complete resource behind `locator`
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetcher for http(s) URLs and local files
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }

    fn fetch_http(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        log::debug!("fetch: GET {}", url);

        let response = match self.agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(FetchError::Status {
                    locator: url.to_string(),
                    status,
                })
            }
            Err(e) => {
                return Err(FetchError::Network {
                    locator: url.to_string(),
                    message: e.to_string(),
                })
            }
        };

        let content_length: Option<usize> = response
            .header("Content-Length")
            .and_then(|s| s.parse().ok());

        let mut bytes = Vec::with_capacity(content_length.unwrap_or(0));
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| FetchError::Network {
                locator: url.to_string(),
                message: e.to_string(),
            })?;

        log::debug!("fetch: {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }

    fn fetch_file(&self, path: PathBuf) -> Result<Vec<u8>, FetchError> {
        log::debug!("fetch: reading {:?}", path);
        std::fs::read(&path).map_err(|source| FetchError::Io { path, source })
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            self.fetch_http(locator)
        } else if let Some(path) = locator.strip_prefix("file://") {
            self.fetch_file(PathBuf::from(path))
        } else {
            self.fetch_file(PathBuf::from(locator))
        }
    }
}

/// In-memory fetcher
///
/// Unknown locators answer HTTP 404, like a service that has already cleaned
/// up its output directory.
#[derive(Default)]
pub struct MemoryFetcher {
    entries: Mutex<HashMap<String, Result<Vec<u8>, u16>>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for `locator`
    pub fn insert(&self, locator: impl Into<String>, bytes: Vec<u8>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(locator.into(), Ok(bytes));
        }
    }

    /// Answer `locator` with an HTTP error status
    pub fn insert_status(&self, locator: impl Into<String>, status: u16) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(locator.into(), Err(status));
        }
    }

    pub fn remove(&self, locator: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(locator);
        }
    }
}

impl AssetFetcher for MemoryFetcher {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
        let entries = self.entries.lock().map_err(|_| FetchError::Network {
            locator: locator.to_string(),
            message: "fetcher state poisoned".to_string(),
        })?;
        match entries.get(locator) {
            Some(Ok(bytes)) => Ok(bytes.clone()),
            Some(Err(status)) => Err(FetchError::Status {
                locator: locator.to_string(),
                status: *status,
            }),
            None => Err(FetchError::Status {
                locator: locator.to_string(),
                status: 404,
            }),
        }
    }
}
