//! Reconciles marker/polyline descriptions against the map.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::ImageError;
use crate::geometry::{clamp_opacity, parse_color, DEFAULT_POLYLINE_COLOR};
use crate::platform::{AnnotationManager, Image, ImageResolver, ImageSource};
use crate::task::{Generation, GenerationCounter};

use super::{
    Annotation, AnnotationId, AnnotationSet, LineAnnotation, MarkerSpec, PointAnnotation,
    PolylineSpec,
};

/// A remote icon the host must fetch in the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconRequest {
    /// Sync generation the request was issued under.
    pub generation: Generation,
    /// Marker the icon belongs to.
    pub annotation: AnnotationId,
    pub uri: String,
}

/// Result of one [`AnnotationSynchronizer::sync`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub generation: Generation,
    /// The set now on the map.
    pub set: AnnotationSet,
    /// Remote icons still to be loaded.
    pub pending: Vec<IconRequest>,
}

/// Owns the rendered annotations of one map.
pub struct AnnotationSynchronizer {
    point_manager: Box<dyn AnnotationManager>,
    line_manager: Box<dyn AnnotationManager>,
    images: Arc<dyn ImageResolver>,
    generations: GenerationCounter,
    /// Remote icons, limited to the URIs the current markers reference.
    icon_cache: HashMap<String, Image>,
    remote_uris: HashSet<String>,
    current: AnnotationSet,
    polyline_width: f64,
    default_color: String,
}

impl fmt::Debug for AnnotationSynchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationSynchronizer")
            .field("generation", &self.generations.current())
            .field("markers", &self.current.markers.len())
            .field("polylines", &self.current.polylines.len())
            .field("cached_icons", &self.icon_cache.len())
            .finish_non_exhaustive()
    }
}

impl AnnotationSynchronizer {
    /// Create a synchronizer over the two per-kind managers of a map.
    pub fn new(
        point_manager: Box<dyn AnnotationManager>,
        line_manager: Box<dyn AnnotationManager>,
        images: Arc<dyn ImageResolver>,
        polyline_width: f64,
    ) -> Self {
        Self {
            point_manager,
            line_manager,
            images,
            generations: GenerationCounter::new(),
            icon_cache: HashMap::new(),
            remote_uris: HashSet::new(),
            current: AnnotationSet::default(),
            polyline_width,
            default_color: DEFAULT_POLYLINE_COLOR.to_string(),
        }
    }

    /// Override the color used when a polyline has none (or an invalid one).
    pub fn with_default_color(mut self, color: impl Into<String>) -> Self {
        self.default_color = color.into();
        self
    }

    /// The set currently on the map.
    pub fn current(&self) -> &AnnotationSet {
        &self.current
    }

    /// Generation of the latest sync.
    pub fn generation(&self) -> Generation {
        self.generations.current()
    }

    /// Replace every rendered annotation with the given descriptions.
    pub fn sync(&mut self, markers: &[MarkerSpec], polylines: &[PolylineSpec]) -> SyncOutcome {
        let generation = self.generations.advance();
        let mut pending = Vec::new();

        self.remote_uris = markers
            .iter()
            .filter_map(|marker| match marker.icon.as_ref()?.source() {
                ImageSource::Remote(uri) => Some(uri.to_string()),
                ImageSource::Resource(_) => None,
            })
            .collect();
        let remote_uris = &self.remote_uris;
        self.icon_cache.retain(|uri, _| remote_uris.contains(uri));

        let point_annotations: Vec<PointAnnotation> = markers
            .iter()
            .enumerate()
            .map(|(index, marker)| {
                let id = AnnotationId(index);
                let icon = marker
                    .icon
                    .as_ref()
                    .and_then(|icon| match icon.source() {
                        ImageSource::Resource(name) => {
                            let image = self.images.resolve_local(name);
                            if image.is_none() {
                                tracing::warn!(marker = %id, name, "Marker icon resource not found");
                            }
                            image
                        }
                        ImageSource::Remote(uri) => match self.icon_cache.get(uri) {
                            Some(image) => Some(image.clone()),
                            None => {
                                pending.push(IconRequest {
                                    generation,
                                    annotation: id,
                                    uri: uri.to_string(),
                                });
                                None
                            }
                        },
                    });
                PointAnnotation {
                    id,
                    position: marker.coordinate.to_engine(),
                    icon,
                }
            })
            .collect();

        let dropped = polylines.iter().filter(|p| p.points.len() < 2).count();
        if dropped > 0 {
            tracing::debug!(dropped, "Skipping polylines with fewer than two points");
        }

        let line_annotations: Vec<LineAnnotation> = polylines
            .iter()
            .filter(|p| p.points.len() >= 2)
            .enumerate()
            .map(|(index, polyline)| LineAnnotation {
                id: AnnotationId(index),
                points: polyline.points.iter().map(|c| c.to_engine()).collect(),
                color: parse_color(
                    polyline.color.as_deref().unwrap_or(&self.default_color),
                    &self.default_color,
                ),
                width: self.polyline_width,
                opacity: clamp_opacity(polyline.opacity),
            })
            .collect();

        let next = AnnotationSet {
            markers: point_annotations,
            polylines: line_annotations,
        };

        // The set is complete before either manager sees it.
        let points: Vec<Annotation> = next.markers.iter().cloned().map(Annotation::Point).collect();
        let lines: Vec<Annotation> = next.polylines.iter().cloned().map(Annotation::Line).collect();
        self.point_manager.replace_all(&points);
        self.line_manager.replace_all(&lines);
        self.current = next;

        tracing::debug!(
            %generation,
            markers = self.current.markers.len(),
            polylines = self.current.polylines.len(),
            pending_icons = pending.len(),
            "Annotations synchronized"
        );

        SyncOutcome {
            generation,
            set: self.current.clone(),
            pending,
        }
    }

    /// Apply a completed remote icon fetch.
    ///
    /// Returns `true` when the icon was applied. Completions from an older sync
    /// are ignored; failures leave the marker without an icon.
    pub fn apply_icon(
        &mut self,
        generation: Generation,
        annotation: AnnotationId,
        uri: &str,
        result: Result<Image, ImageError>,
    ) -> bool {
        let image = match result {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(marker = %annotation, uri, error = %e, "Marker icon fetch failed");
                return false;
            }
        };

        // Cache regardless of staleness while the current markers still use it.
        if self.remote_uris.contains(uri) {
            self.icon_cache.insert(uri.to_string(), image.clone());
        }

        if !self.generations.is_current(generation) {
            tracing::debug!(%generation, marker = %annotation, "Discarding stale icon completion");
            return false;
        }

        let Some(marker) = self.current.markers.get_mut(annotation.0) else {
            return false;
        };
        marker.icon = Some(image.clone());
        self.point_manager.set_icon(annotation, &image);
        true
    }

    /// Remove every annotation from the map.
    pub fn clear(&mut self) -> SyncOutcome {
        self.sync(&[], &[])
    }
}
