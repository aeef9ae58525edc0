//! Route request/response types exchanged with the routing collaborator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coord::Coordinate;

/// Travel mode used for route calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportMode {
    Drive,
    DriveTraffic,
    Walk,
    #[default]
    Bike,
}

impl TransportMode {
    /// Lenient parser for the `transportMode` prop.
    ///
    /// Accepts short names and directions-profile names. Returns `None` for
    /// anything else so the caller can keep its previous mode.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase();
        let name = normalized
            .strip_prefix("mapbox/")
            .unwrap_or(normalized.as_str());
        match name {
            "drive" | "driving" | "car" => Some(TransportMode::Drive),
            "drive-traffic" | "driving-traffic" | "traffic" => Some(TransportMode::DriveTraffic),
            "walk" | "walking" | "foot" => Some(TransportMode::Walk),
            "bike" | "cycling" | "cycle" | "bicycle" => Some(TransportMode::Bike),
            _ => None,
        }
    }

    /// Directions API profile identifier.
    pub fn profile_identifier(&self) -> &'static str {
        match self {
            TransportMode::Drive => "mapbox/driving",
            TransportMode::DriveTraffic => "mapbox/driving-traffic",
            TransportMode::Walk => "mapbox/walking",
            TransportMode::Bike => "mapbox/cycling",
        }
    }

    /// Short name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Drive => "drive",
            TransportMode::DriveTraffic => "drive-traffic",
            TransportMode::Walk => "walk",
            TransportMode::Bike => "bike",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A route calculation request.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub mode: TransportMode,
    /// Token for the directions service (the `navigationToken` prop).
    pub access_token: Option<String>,
}

/// One calculated route. Opaque to the core beyond these summary fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Route {
    /// Length in meters.
    pub distance: f64,
    /// Expected travel time in seconds.
    pub expected_travel_time: f64,
    pub geometry: Vec<Coordinate>,
}

/// Routing service response; the session always uses index 0.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteResponse {
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl RouteResponse {
    /// The route guidance runs on.
    pub fn primary(&self) -> Option<&Route> {
        self.routes.first()
    }
}
