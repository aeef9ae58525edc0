//! Platform capability seams.
//!
//! The view core talks to the native map and navigation SDKs only through the
//! traits in this module. A platform adapter (one per native SDK) implements
//! them; the core never names a concrete SDK type.
//!
//! # Capabilities
//!
//! | Trait | Used by | Role |
//! |-------|---------|------|
//! | [`MapEngine`] | host, camera, annotations | map creation, style, camera, location puck |
//! | [`AnnotationManager`] | annotation synchronizer | atomic replace of one annotation kind |
//! | [`RoutingService`] | navigation controller | async route calculation |
//! | [`NavigationSdk`] / [`SessionHandle`] | navigation controller | guided session lifecycle |
//! | [`ImageResolver`] | annotation synchronizer, host | marker and puck images |
//!
//! [`headless`] provides an in-memory implementation of every trait; it backs
//! the test suite and the replay CLI. [`http`] provides a network image
//! resolver.

pub mod headless;
pub mod http;
mod image;
mod profile;

pub use image::{Image, ImageRef, ImageSource};
pub use profile::{PaddingProfiles, PlatformProfile};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::annotation::{Annotation, AnnotationId, AnnotationKind};
use crate::error::{ImageError, RoutingError};
use crate::geometry::{CameraFrame, Viewport};
use crate::navigation::{RouteRequest, RouteResponse, SessionId, SessionOptions};

/// Opaque handle to a map instance created by a [`MapEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapHandle(pub u64);

/// Opaque handle to a registered location listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

impl fmt::Display for MapHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map#{}", self.0)
    }
}

/// How a camera change is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraTransition {
    /// Jump without animation.
    Instant,
    /// Eased animation over the given duration.
    Ease(Duration),
}

/// User location indicator settings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PuckOptions {
    /// Whether the indicator is shown at all.
    pub enabled: bool,
    /// Custom indicator image; `None` uses the SDK default puck.
    pub image: Option<Image>,
}

/// Map rendering engine.
pub trait MapEngine: Send {
    /// Create the map view, authenticating with `access_token`.
    fn create_map(&mut self, access_token: Option<&str>, viewport: Viewport) -> MapHandle;

    /// Tear the map down. The handle is invalid afterwards.
    fn destroy_map(&mut self, map: MapHandle);

    /// Load a style. Load failures are reported by the engine itself.
    fn load_style(&mut self, map: MapHandle, uri: &str);

    /// Move the camera.
    fn set_camera(&mut self, map: MapHandle, frame: &CameraFrame, transition: CameraTransition);

    /// Create a manager owning every annotation of `kind` on `map`.
    fn create_annotation_manager(
        &mut self,
        map: MapHandle,
        kind: AnnotationKind,
    ) -> Box<dyn AnnotationManager>;

    /// Configure the user location indicator.
    fn set_location_puck(&mut self, map: MapHandle, options: &PuckOptions);

    /// Start delivering user location updates to the view loop.
    fn add_location_listener(&mut self, map: MapHandle) -> ListenerId;

    /// Stop delivering updates for `listener`.
    fn remove_location_listener(&mut self, map: MapHandle, listener: ListenerId);
}

/// Owner of all annotations of one kind.
pub trait AnnotationManager: Send {
    /// Atomically replace every annotation this manager owns.
    fn replace_all(&mut self, items: &[Annotation]);

    /// Set the icon of a point annotation previously passed to `replace_all`.
    fn set_icon(&mut self, id: AnnotationId, image: &Image);
}

/// Directions service.
pub trait RoutingService: Send + Sync {
    /// Calculate routes for `request`. Resolves once; timeouts are the service's concern.
    fn calculate_route(
        &self,
        request: RouteRequest,
    ) -> BoxFuture<'static, Result<RouteResponse, RoutingError>>;
}

/// Turn-by-turn navigation SDK.
pub trait NavigationSdk: Send {
    /// Start guidance along `response.routes[0]` and attach the session UI.
    ///
    /// Session events must be posted to the view loop tagged with `session`.
    fn start_session(
        &mut self,
        map: MapHandle,
        session: SessionId,
        response: &RouteResponse,
        options: &SessionOptions,
    ) -> Box<dyn SessionHandle>;
}

/// A running guidance session.
pub trait SessionHandle: Send {
    /// Stop guidance. Must tolerate repeated calls.
    fn stop(&mut self);

    /// Remove banners and any other session-owned UI from the view.
    fn detach_ui(&mut self);
}

/// Image loading.
pub trait ImageResolver: Send + Sync {
    /// Look up a bundled image by resource name.
    fn resolve_local(&self, name: &str) -> Option<Image>;

    /// Fetch a remote image.
    fn fetch_remote(&self, uri: &str) -> BoxFuture<'static, Result<Image, ImageError>>;
}

/// The full set of collaborators a view needs.
pub struct Platform {
    pub engine: Box<dyn MapEngine>,
    pub routing: Arc<dyn RoutingService>,
    pub navigation: Box<dyn NavigationSdk>,
    pub images: Arc<dyn ImageResolver>,
    pub profile: PlatformProfile,
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}
