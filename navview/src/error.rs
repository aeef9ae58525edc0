//! Error types shared across the view core.
//!
//! Only collaborator failures and handle misuse are represented here. Invalid
//! props never become errors; they are dropped at the boundary.

use thiserror::Error;

/// Failure reported by the routing collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingError {
    /// The directions service answered with an error.
    #[error("{0}")]
    Service(String),

    /// The request never reached the service.
    #[error("Network error: {0}")]
    Network(String),
}

/// Failure while resolving a marker or puck image.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImageError {
    /// No bundled resource with this name.
    #[error("Image resource not found: {0}")]
    NotFound(String),

    /// Remote fetch failed.
    #[error("Failed to fetch {uri}: {reason}")]
    FetchFailed { uri: String, reason: String },

    /// Remote responded with an empty body.
    #[error("Empty image body from {0}")]
    Empty(String),

    /// The HTTP client could not be built.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

/// Errors returned by [`crate::host::ViewHandle`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// The view loop has shut down (view detached or dropped).
    #[error("View loop is closed")]
    Closed,
}
