//! Session-level types: options handed to the SDK and events coming back.

use serde::{Deserialize, Serialize};

use crate::coord::Coordinate;
use crate::geometry::Color;
use crate::platform::Image;
use crate::task::Generation;

use super::route::{RouteResponse, TransportMode};

/// Identifies one navigation session; events from older sessions are dropped.
pub type SessionId = Generation;

/// Default speed-up applied to simulated guidance.
pub const DEFAULT_SIMULATION_SPEED: f64 = 5.0;

/// Casing color of the route line while navigating (`#35A68A`).
pub const ROUTE_CASING_COLOR: Color = Color::rgb(0x35, 0xA6, 0x8A);

/// Navigation-only overrides applied to the route line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteLineStyle {
    pub casing_color: Color,
    pub traversed_color: Color,
    /// Applied to every congestion level, including alternatives.
    pub traffic_color: Color,
    /// Whether the traversed part of the line is drawn differently.
    pub tracks_traversal: bool,
}

impl Default for RouteLineStyle {
    fn default() -> Self {
        Self {
            casing_color: ROUTE_CASING_COLOR,
            traversed_color: Color::CLEAR,
            traffic_color: Color::CLEAR,
            tracks_traversal: true,
        }
    }
}

/// Everything the SDK needs to present a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub simulate: bool,
    pub simulation_speed: f64,
    pub shows_end_of_route_feedback: bool,
    pub style_url: Option<String>,
    pub user_puck: Option<Image>,
    pub destination_marker: Option<Image>,
    pub route_line: RouteLineStyle,
}

/// An active guidance run, owned by the navigation controller.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationSession {
    pub id: SessionId,
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub transport_mode: TransportMode,
    pub simulate: bool,
    pub route: RouteResponse,
}

/// A location fix reported by the SDK or the map's location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Course over ground in degrees, when known.
    #[serde(default)]
    pub heading: Option<f64>,
}

impl Location {
    /// Validated position of this fix.
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::new(self.latitude, self.longitude).ok()
    }
}

/// Progress along the active route.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteProgress {
    pub distance_traveled: f64,
    pub duration_remaining: f64,
    pub fraction_traveled: f64,
    pub distance_remaining: f64,
}

/// Events emitted by a running session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    LocationChanged(Location),
    ProgressChanged(RouteProgress),
    Arrived,
    Rerouted,
    /// The user dismissed guidance from the SDK's own UI.
    Cancelled,
}
