//! Camera geometry.
//!
//! Pure functions for framing a set of coordinates inside a padded viewport.
//! All math is done in Web Mercator world space with 512 px tiles, which is the
//! convention of the vector map engines the view drives.
//!
//! # Fit algorithm
//!
//! ```text
//!   points ──► project ──► world bbox ──► zoom = log2(available_px / bbox_px@z0)
//!                                    └──► center shifted by (left-right, top-bottom)/2
//! ```

mod color;

pub use color::{clamp_opacity, parse_color, Color, DEFAULT_POLYLINE_COLOR};

use serde::{Deserialize, Serialize};

use crate::coord::{project, unproject, Coordinate};

/// World tile size in pixels at zoom 0.
pub const TILE_SIZE: f64 = 512.0;

/// Tolerance in pixels when checking containment.
const CONTAINS_EPSILON_PX: f64 = 1e-6;

/// Screen-space insets in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeInsets {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl EdgeInsets {
    /// Create insets.
    pub const fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }
}

/// Size of the map view in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    /// Create a viewport.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Width and height left after applying `padding`, never below one pixel.
    fn available(&self, padding: &EdgeInsets) -> (f64, f64) {
        (
            (self.width - padding.left - padding.right).max(1.0),
            (self.height - padding.top - padding.bottom).max(1.0),
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        // Phone-sized portrait view until the host reports a real layout.
        Self::new(390.0, 844.0)
    }
}

/// Zoom bounds applied by the fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitLimits {
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for FitLimits {
    fn default() -> Self {
        Self {
            min_zoom: 0.0,
            max_zoom: 20.0,
        }
    }
}

impl FitLimits {
    /// Create limits; reversed bounds are swapped.
    pub fn new(min_zoom: f64, max_zoom: f64) -> Self {
        if min_zoom <= max_zoom {
            Self { min_zoom, max_zoom }
        } else {
            Self {
                min_zoom: max_zoom,
                max_zoom: min_zoom,
            }
        }
    }

    /// Clamp `zoom` into the limits. Never panics, even on reversed or NaN bounds.
    pub fn clamp(&self, zoom: f64) -> f64 {
        let (lo, hi) = if self.min_zoom <= self.max_zoom {
            (self.min_zoom, self.max_zoom)
        } else {
            (self.max_zoom, self.min_zoom)
        };
        zoom.max(lo).min(hi)
    }
}

/// A resolved camera: what the map engine is told to show.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraFrame {
    pub center: Coordinate,
    pub zoom: f64,
    pub pitch: f64,
    /// Heading in degrees; `None` keeps the engine's current bearing.
    pub bearing: Option<f64>,
}

impl CameraFrame {
    /// Create a north-up frame.
    pub fn new(center: Coordinate, zoom: f64, pitch: f64) -> Self {
        Self {
            center,
            zoom,
            pitch,
            bearing: None,
        }
    }

    /// Set the bearing.
    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(bearing);
        self
    }

    /// Project `point` to screen pixels for this frame (north-up, pitch ignored).
    pub fn screen_position(&self, point: Coordinate, viewport: &Viewport) -> (f64, f64) {
        let scale = world_scale(self.zoom);
        let (cx, cy) = project(self.center);
        let (px, py) = project(point);
        (
            viewport.width / 2.0 + (px - cx) * scale,
            viewport.height / 2.0 + (py - cy) * scale,
        )
    }

    /// Whether `point` lies inside the viewport inset by `padding`.
    pub fn contains(&self, point: Coordinate, viewport: &Viewport, padding: &EdgeInsets) -> bool {
        let (sx, sy) = self.screen_position(point, viewport);
        let eps = CONTAINS_EPSILON_PX;
        sx >= padding.left - eps
            && sx <= viewport.width - padding.right + eps
            && sy >= padding.top - eps
            && sy <= viewport.height - padding.bottom + eps
    }
}

/// Pixels spanned by the whole world at `zoom`.
#[inline]
fn world_scale(zoom: f64) -> f64 {
    TILE_SIZE * 2.0_f64.powf(zoom)
}

/// Computes a camera whose padded viewport contains every point.
///
/// Callers must not pass an empty slice; `None` is returned in that case so the
/// caller's fallback chain takes over. A single point (or several identical
/// points) has no extent and is framed at `limits.max_zoom`.
///
/// Bounds are computed with a plain min/max over longitudes, so sets spanning
/// the antimeridian are framed the long way round.
pub fn bounding_camera_for(
    points: &[Coordinate],
    padding: &EdgeInsets,
    viewport: &Viewport,
    limits: &FitLimits,
    pitch: f64,
) -> Option<CameraFrame> {
    let first = points.first()?;
    let (fx, fy) = project(*first);
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (fx, fx, fy, fy);

    for point in &points[1..] {
        let (x, y) = project(*point);
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }

    let (avail_w, avail_h) = viewport.available(padding);
    let zoom_for = |available: f64, extent: f64| {
        if extent > 0.0 {
            (available / (extent * TILE_SIZE)).log2()
        } else {
            f64::INFINITY
        }
    };
    let zoom = limits.clamp(
        zoom_for(avail_w, max_x - min_x).min(zoom_for(avail_h, max_y - min_y)),
    );

    // Shift the camera so the bbox center lands on the padded rectangle's center.
    let scale = world_scale(zoom);
    let offset_x = padding.left + avail_w / 2.0 - viewport.width / 2.0;
    let offset_y = padding.top + avail_h / 2.0 - viewport.height / 2.0;
    let center_x = (min_x + max_x) / 2.0 - offset_x / scale;
    let center_y = ((min_y + max_y) / 2.0 - offset_y / scale).clamp(0.0, 1.0);

    Some(CameraFrame::new(unproject(center_x, center_y), zoom, pitch))
}
