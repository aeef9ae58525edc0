//! Camera resolution.
//!
//! The effective camera is derived from three sources, in priority order:
//!
//! 1. fit-to-annotations, when any annotation is rendered;
//! 2. the explicit camera prop, each missing field taken from the last
//!    resolved frame and then from the configured defaults;
//! 3. nothing, which leaves the engine camera untouched.
//!
//! While a navigation session runs (or tracking was started externally) the
//! camera belongs to the session and resolution yields nothing.

mod follow;

pub use follow::FollowUser;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationSet;
use crate::coord::Coordinate;
use crate::geometry::{bounding_camera_for, CameraFrame, FitLimits, Viewport};
use crate::navigation::Location;
use crate::platform::{CameraTransition, MapEngine, MapHandle, PaddingProfiles};

/// Default zoom when neither the prop nor a previous frame supplies one.
pub const DEFAULT_ZOOM: f64 = 15.0;

/// Default pitch in degrees.
pub const DEFAULT_PITCH: f64 = 0.0;

/// Default duration of the fit animation.
pub const DEFAULT_FIT_EASE: Duration = Duration::from_millis(500);

/// Default zoom used while following the user.
pub const DEFAULT_FOLLOW_ZOOM: f64 = 15.0;

/// Default duration of each follow-user animation.
pub const DEFAULT_FOLLOW_EASE: Duration = Duration::from_millis(1300);

/// Raw camera prop: `{ center: [lat, lng], zoom, pitch, offset }`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraProp {
    #[serde(default)]
    pub center: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub zoom: Option<f64>,
    #[serde(default)]
    pub pitch: Option<f64>,
    #[serde(default)]
    pub offset: Option<bool>,
}

impl CameraProp {
    /// Validated spec. An unusable center is treated as absent.
    pub fn to_spec(&self) -> CameraSpec {
        CameraSpec {
            center: self.center.as_deref().and_then(Coordinate::from_pair),
            zoom: self.zoom.filter(|z| z.is_finite()),
            pitch: self.pitch.filter(|p| p.is_finite()),
            offset: self.offset,
        }
    }
}

/// Explicit camera hints from props.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraSpec {
    pub center: Option<Coordinate>,
    pub zoom: Option<f64>,
    pub pitch: Option<f64>,
    /// Selects the "offset" fit padding.
    pub offset: Option<bool>,
}

impl CameraSpec {
    /// Overlay `update` onto `self` field by field.
    pub fn merge(&self, update: &CameraSpec) -> CameraSpec {
        CameraSpec {
            center: update.center.or(self.center),
            zoom: update.zoom.or(self.zoom),
            pitch: update.pitch.or(self.pitch),
            offset: update.offset.or(self.offset),
        }
    }
}

/// Tunables of the camera controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSettings {
    pub default_zoom: f64,
    pub default_pitch: f64,
    pub limits: FitLimits,
    pub fit_ease: Duration,
    pub follow_zoom: f64,
    pub follow_ease: Duration,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            default_zoom: DEFAULT_ZOOM,
            default_pitch: DEFAULT_PITCH,
            limits: FitLimits::default(),
            fit_ease: DEFAULT_FIT_EASE,
            follow_zoom: DEFAULT_FOLLOW_ZOOM,
            follow_ease: DEFAULT_FOLLOW_EASE,
        }
    }
}

impl CameraSettings {
    /// Set the fallback zoom.
    pub fn with_default_zoom(mut self, zoom: f64) -> Self {
        self.default_zoom = zoom;
        self
    }

    /// Set the fallback pitch.
    pub fn with_default_pitch(mut self, pitch: f64) -> Self {
        self.default_pitch = pitch;
        self
    }

    /// Set the zoom bounds of the fit.
    pub fn with_limits(mut self, min_zoom: f64, max_zoom: f64) -> Self {
        self.limits = FitLimits::new(min_zoom, max_zoom);
        self
    }

    /// Set the fit animation duration.
    pub fn with_fit_ease(mut self, ease: Duration) -> Self {
        self.fit_ease = ease;
        self
    }

    /// Set the follow-user zoom and animation duration.
    pub fn with_follow(mut self, zoom: f64, ease: Duration) -> Self {
        self.follow_zoom = zoom;
        self.follow_ease = ease;
        self
    }
}

/// Resolves and applies the camera of one map.
#[derive(Debug, Clone)]
pub struct CameraController {
    settings: CameraSettings,
    padding: PaddingProfiles,
    last: Option<CameraFrame>,
    applied_since_layout: bool,
}

impl CameraController {
    /// Create a controller using `padding` for annotation fits.
    pub fn new(settings: CameraSettings, padding: PaddingProfiles) -> Self {
        Self {
            settings,
            padding,
            last: None,
            applied_since_layout: false,
        }
    }

    /// Settings in use.
    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// The last frame handed to the engine.
    pub fn last_frame(&self) -> Option<&CameraFrame> {
        self.last.as_ref()
    }

    /// Forget layout-scoped state; the next application is instant.
    pub fn reset_layout(&mut self) {
        self.applied_since_layout = false;
    }

    /// Compute the effective camera. `None` leaves the engine camera alone.
    pub fn resolve(
        &self,
        spec: &CameraSpec,
        set: &AnnotationSet,
        navigating: bool,
        viewport: &Viewport,
    ) -> Option<CameraFrame> {
        if navigating {
            tracing::debug!("Camera owned by navigation, skipping resolution");
            return None;
        }

        let pitch = spec.pitch.unwrap_or(self.settings.default_pitch);

        if !set.is_empty() {
            let points = set.points();
            let padding = self.padding.select(spec.offset.unwrap_or(false));
            return bounding_camera_for(&points, &padding, viewport, &self.settings.limits, pitch);
        }

        let center = spec.center.or_else(|| self.last.map(|f| f.center))?;
        let zoom = spec
            .zoom
            .or_else(|| self.last.map(|f| f.zoom))
            .unwrap_or(self.settings.default_zoom);
        let pitch = spec
            .pitch
            .or_else(|| self.last.map(|f| f.pitch))
            .unwrap_or(self.settings.default_pitch);

        Some(CameraFrame::new(center, zoom, pitch))
    }

    /// Push `frame` to the engine: instant right after layout, eased otherwise.
    pub fn apply(
        &mut self,
        frame: CameraFrame,
        engine: &mut dyn MapEngine,
        map: MapHandle,
    ) -> CameraTransition {
        let transition = if self.applied_since_layout {
            CameraTransition::Ease(self.settings.fit_ease)
        } else {
            CameraTransition::Instant
        };
        self.apply_with(frame, transition, engine, map);
        transition
    }

    /// Push `frame` with an explicit transition.
    pub fn apply_with(
        &mut self,
        frame: CameraFrame,
        transition: CameraTransition,
        engine: &mut dyn MapEngine,
        map: MapHandle,
    ) {
        tracing::debug!(
            center = %frame.center,
            zoom = frame.zoom,
            pitch = frame.pitch,
            ?transition,
            "Applying camera"
        );
        engine.set_camera(map, &frame, transition);
        self.last = Some(frame);
        self.applied_since_layout = true;
    }

    /// Frame used to follow a user location fix.
    pub fn follow_frame(&self, location: &Location) -> Option<CameraFrame> {
        let center = location.coordinate()?;
        let pitch = self
            .last
            .map(|f| f.pitch)
            .unwrap_or(self.settings.default_pitch);
        let frame = CameraFrame::new(center, self.settings.follow_zoom, pitch);
        Some(match location.heading.filter(|h| h.is_finite()) {
            Some(heading) => frame.with_bearing(heading),
            None => frame,
        })
    }
}
