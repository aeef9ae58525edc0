//! Typed view props.
//!
//! The host framework delivers prop changes as JSON-like patches. A field
//! missing from a patch is unchanged; a field present as `null` is cleared.
//! [`ViewProps::apply`] folds a patch into the materialized props and reports
//! which subsystems have to react.

use serde::{Deserialize, Deserializer};

use crate::annotation::{MarkerProp, MarkerSpec, PolylineProp, PolylineSpec};
use crate::camera::{CameraProp, CameraSpec};
use crate::coord::Coordinate;
use crate::navigation::TransportMode;
use crate::platform::ImageRef;

/// Distinguish "absent" (`None`) from "null" (`Some(None)`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A batch of prop changes.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropsPatch {
    #[serde(default, deserialize_with = "double_option")]
    pub origin: Option<Option<Vec<Option<f64>>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub destination: Option<Option<Vec<Option<f64>>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub markers: Option<Option<Vec<MarkerProp>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub polylines: Option<Option<Vec<PolylineProp>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub camera: Option<Option<CameraProp>>,
    #[serde(default, rename = "styleURL", deserialize_with = "double_option")]
    pub style_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub map_token: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub navigation_token: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub transport_mode: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub should_simulate_route: Option<Option<bool>>,
    #[serde(default, deserialize_with = "double_option")]
    pub shows_end_of_route_feedback: Option<Option<bool>>,
    #[serde(default, deserialize_with = "double_option")]
    pub show_user_location: Option<Option<bool>>,
    #[serde(default, deserialize_with = "double_option")]
    pub follow_user: Option<Option<bool>>,
    #[serde(default, deserialize_with = "double_option")]
    pub destination_marker: Option<Option<ImageRef>>,
    #[serde(default, deserialize_with = "double_option")]
    pub user_locator_map: Option<Option<ImageRef>>,
    #[serde(default, deserialize_with = "double_option")]
    pub user_locator_navigation: Option<Option<ImageRef>>,
}

impl PropsPatch {
    /// Patch setting only the markers.
    pub fn markers(markers: Vec<MarkerProp>) -> Self {
        Self {
            markers: Some(Some(markers)),
            ..Self::default()
        }
    }

    /// Patch setting only the polylines.
    pub fn polylines(polylines: Vec<PolylineProp>) -> Self {
        Self {
            polylines: Some(Some(polylines)),
            ..Self::default()
        }
    }

    /// Patch setting route endpoints as raw `[lat, lng]` pairs.
    pub fn route(origin: [f64; 2], destination: [f64; 2]) -> Self {
        Self {
            origin: Some(Some(origin.iter().copied().map(Some).collect())),
            destination: Some(Some(destination.iter().copied().map(Some).collect())),
            ..Self::default()
        }
    }
}

/// What a patch touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PropChanges {
    pub annotations: bool,
    pub camera: bool,
    pub style: bool,
    pub map_token: bool,
    pub puck: bool,
    pub follow: bool,
    /// The destination was supplied with fewer than two usable components.
    pub destination_invalidated: bool,
    pub map_puck_image: bool,
    pub navigation_puck_image: bool,
    pub destination_marker_image: bool,
}

/// Materialized, validated props of one view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewProps {
    pub origin: Option<Coordinate>,
    pub destination: Option<Coordinate>,
    pub markers: Vec<MarkerSpec>,
    pub polylines: Vec<PolylineSpec>,
    pub camera: CameraSpec,
    pub style_url: Option<String>,
    pub map_token: Option<String>,
    pub navigation_token: Option<String>,
    pub transport_mode: TransportMode,
    pub simulate: bool,
    pub shows_end_of_route_feedback: bool,
    pub show_user_location: bool,
    pub follow_user: bool,
    pub destination_marker: Option<ImageRef>,
    pub user_locator_map: Option<ImageRef>,
    pub user_locator_navigation: Option<ImageRef>,
}

fn parse_pair(raw: Option<Vec<Option<f64>>>) -> Option<Coordinate> {
    raw.and_then(|pair| Coordinate::from_pair(&pair))
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl ViewProps {
    /// Props with the given transport mode and everything else defaulted.
    pub fn new(transport_mode: TransportMode) -> Self {
        Self {
            transport_mode,
            ..Self::default()
        }
    }

    /// Fold `patch` into these props.
    pub fn apply(&mut self, patch: PropsPatch) -> PropChanges {
        let mut changes = PropChanges::default();

        if let Some(origin) = patch.origin {
            self.origin = parse_pair(origin);
        }

        if let Some(destination) = patch.destination {
            self.destination = parse_pair(destination);
            if self.destination.is_none() {
                tracing::debug!("Destination cleared or invalid");
                changes.destination_invalidated = true;
            }
        }

        if let Some(markers) = patch.markers {
            let raw = markers.unwrap_or_default();
            self.markers = raw.iter().filter_map(MarkerProp::to_spec).collect();
            if self.markers.len() < raw.len() {
                tracing::debug!(
                    skipped = raw.len() - self.markers.len(),
                    "Skipping markers with invalid coordinates"
                );
            }
            changes.annotations = true;
        }

        if let Some(polylines) = patch.polylines {
            self.polylines = polylines
                .unwrap_or_default()
                .iter()
                .map(PolylineProp::to_spec)
                .collect();
            changes.annotations = true;
        }

        if let Some(camera) = patch.camera {
            self.camera = match camera {
                Some(prop) => self.camera.merge(&prop.to_spec()),
                None => CameraSpec::default(),
            };
            changes.camera = true;
        }

        if let Some(style_url) = patch.style_url {
            let style_url = non_empty(style_url);
            changes.style = style_url != self.style_url;
            self.style_url = style_url;
        }

        if let Some(token) = patch.map_token {
            self.map_token = non_empty(token);
            changes.map_token = true;
        }

        if let Some(token) = patch.navigation_token {
            self.navigation_token = non_empty(token);
        }

        if let Some(Some(mode)) = patch.transport_mode {
            match TransportMode::parse(&mode) {
                Some(parsed) => self.transport_mode = parsed,
                None => tracing::debug!(mode = %mode, "Unknown transport mode, keeping previous"),
            }
        }

        if let Some(simulate) = patch.should_simulate_route {
            self.simulate = simulate.unwrap_or(false);
        }

        if let Some(feedback) = patch.shows_end_of_route_feedback {
            self.shows_end_of_route_feedback = feedback.unwrap_or(false);
        }

        if let Some(show) = patch.show_user_location {
            self.show_user_location = show.unwrap_or(false);
            changes.puck = true;
        }

        if let Some(follow) = patch.follow_user {
            self.follow_user = follow.unwrap_or(false);
            changes.follow = true;
        }

        if let Some(marker) = patch.destination_marker {
            self.destination_marker = marker;
            changes.destination_marker_image = true;
        }

        if let Some(locator) = patch.user_locator_map {
            self.user_locator_map = locator;
            changes.map_puck_image = true;
            changes.puck = true;
        }

        if let Some(locator) = patch.user_locator_navigation {
            self.user_locator_navigation = locator;
            changes.navigation_puck_image = true;
        }

        changes
    }
}
