//! Network image resolver.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::ImageError;

use super::{Image, ImageResolver};

/// Default request timeout for icon downloads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Extensions tried when a resource name has none.
const RESOURCE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "pdf"];

/// Fetches remote icons over HTTP and bundled ones from a directory.
///
/// Bytes are returned as-is; decoding is the platform adapter's job.
#[derive(Debug, Clone)]
pub struct HttpImageResolver {
    client: reqwest::Client,
    resource_dir: Option<PathBuf>,
}

impl HttpImageResolver {
    /// Create a resolver with [`DEFAULT_TIMEOUT`].
    pub fn new() -> Result<Self, ImageError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a resolver with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImageError::Client(e.to_string()))?;

        Ok(Self {
            client,
            resource_dir: None,
        })
    }

    /// Look bundled resources up in `dir`.
    pub fn with_resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_dir = Some(dir.into());
        self
    }

    fn resource_path(dir: &Path, name: &str) -> Option<PathBuf> {
        let direct = dir.join(name);
        if direct.is_file() {
            return Some(direct);
        }
        RESOURCE_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", name, ext)))
            .find(|p| p.is_file())
    }
}

impl ImageResolver for HttpImageResolver {
    /// Reads the file synchronously on the calling task. Intended for small
    /// bundled icons; large assets belong behind a remote uri.
    fn resolve_local(&self, name: &str) -> Option<Image> {
        if name.is_empty() || name.contains("..") {
            return None;
        }
        let dir = self.resource_dir.as_deref()?;
        let path = Self::resource_path(dir, name)?;
        match std::fs::read(&path) {
            Ok(data) => Some(Image::new(name, data)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read image resource");
                None
            }
        }
    }

    fn fetch_remote(&self, uri: &str) -> BoxFuture<'static, Result<Image, ImageError>> {
        let client = self.client.clone();
        let uri = uri.to_string();

        async move {
            let fetch_failed = |reason: String| ImageError::FetchFailed {
                uri: uri.clone(),
                reason,
            };

            let response = client
                .get(&uri)
                .send()
                .await
                .map_err(|e| fetch_failed(format!("Request failed: {}", e)))?;

            if !response.status().is_success() {
                return Err(fetch_failed(format!("HTTP {}", response.status())));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| fetch_failed(format!("Failed to read response: {}", e)))?;

            if bytes.is_empty() {
                return Err(ImageError::Empty(uri));
            }

            tracing::debug!(uri = %uri, bytes = bytes.len(), "Fetched remote image");
            Ok(Image::new(uri, bytes.to_vec()))
        }
        .boxed()
    }
}
