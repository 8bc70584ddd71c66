//! Stem locators and the separation service reply
//!
//! A separation run produces two resource locators (one per stem) plus the
//! name of the file the user uploaded. The service answers with relative,
//! sometimes Windows-style paths which are normalized against its base URL.

use serde::Deserialize;
use thiserror::Error;

use crate::types::StemRole;

/// Default base URL of the local separation service
pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:5000/";

/// One stem's resource locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StemSource {
    pub role: StemRole,
    /// http(s) URL, `file://` URL or filesystem path
    pub locator: String,
}

impl StemSource {
    pub fn new(role: StemRole, locator: impl Into<String>) -> Self {
        Self {
            role,
            locator: locator.into(),
        }
    }

    /// Last path segment of the locator, without query string or fragment
    pub fn file_name(&self) -> Option<&str> {
        let path = self
            .locator
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        path.rsplit(['/', '\\'])
            .next()
            .filter(|name| !name.is_empty())
    }

    /// Lowercased file extension of the locator path, if it has one
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// The two stems of one separation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StemPair {
    pub vocals: StemSource,
    pub accompaniment: StemSource,
    /// Name of the file the stems were separated from (used for downloads)
    pub original_name: String,
}

impl StemPair {
    pub fn new(
        vocals: impl Into<String>,
        accompaniment: impl Into<String>,
        original_name: impl Into<String>,
    ) -> Self {
        Self {
            vocals: StemSource::new(StemRole::Vocals, vocals),
            accompaniment: StemSource::new(StemRole::Accompaniment, accompaniment),
            original_name: original_name.into(),
        }
    }

    pub fn get(&self, role: StemRole) -> &StemSource {
        match role {
            StemRole::Vocals => &self.vocals,
            StemRole::Accompaniment => &self.accompaniment,
        }
    }

    /// Build a pair from the separation service's JSON reply
    ///
    /// Expects `{"vocals": "...", "accompaniment": "..."}`; an `{"error": "..."}`
    /// reply is returned as [`SplitResponseError::Service`].
    pub fn from_split_response(
        base_url: &str,
        json: &str,
        original_name: impl Into<String>,
    ) -> Result<Self, SplitResponseError> {
        let reply: SplitReply = serde_json::from_str(json)?;

        if let Some(message) = reply.error {
            return Err(SplitResponseError::Service(message));
        }

        let vocals = reply
            .vocals
            .ok_or(SplitResponseError::MissingField("vocals"))?;
        let accompaniment = reply
            .accompaniment
            .ok_or(SplitResponseError::MissingField("accompaniment"))?;

        Ok(Self::new(
            resolve_locator(base_url, &vocals),
            resolve_locator(base_url, &accompaniment),
            original_name,
        ))
    }
}

/// Errors from interpreting a separation reply
#[derive(Error, Debug)]
pub enum SplitResponseError {
    #[error("separation service reported an error: {0}")]
    Service(String),

    #[error("separation reply is missing the {0:?} field")]
    MissingField(&'static str),

    #[error("invalid separation reply: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct SplitReply {
    vocals: Option<String>,
    accompaniment: Option<String>,
    error: Option<String>,
}

/// Turn a service-relative path into an absolute locator
///
/// Backslashes become forward slashes. Absolute http(s) URLs pass through;
/// anything else is joined to `base_url` with exactly one `/` between them.
pub fn resolve_locator(base_url: &str, path: &str) -> String {
    let path = path.replace('\\', "/");
    if path.starts_with("http://") || path.starts_with("https://") {
        return path;
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
