//! Image references and loaded images.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Image reference as supplied in props: `{ "uri": "..." }`.
///
/// The uri is either a remote URL or the name of a bundled resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    pub uri: String,
}

impl ImageRef {
    /// Create a reference.
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    /// Where the image has to be loaded from.
    pub fn source(&self) -> ImageSource<'_> {
        let uri = self.uri.trim();
        if uri.starts_with("http://") || uri.starts_with("https://") {
            ImageSource::Remote(uri)
        } else {
            ImageSource::Resource(uri)
        }
    }
}

/// Classified image location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource<'a> {
    /// Fetched asynchronously.
    Remote(&'a str),
    /// Looked up synchronously in the app bundle.
    Resource(&'a str),
}

/// Loaded image bytes. Decoding is left to the platform adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Name the image is registered under (uri or resource name).
    pub name: String,
    pub data: Arc<[u8]>,
}

impl Image {
    /// Wrap loaded bytes.
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}
