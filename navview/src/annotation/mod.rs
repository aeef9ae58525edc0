//! Marker and polyline annotations.
//!
//! Host props describe markers and polylines wholesale, with no identity across
//! updates. [`AnnotationSynchronizer`] turns each new description into a fully
//! built [`AnnotationSet`] and swaps it onto the map in one replace per kind.
//!
//! # Data flow
//!
//! ```text
//! MarkerProp / PolylineProp (raw props)
//!        │ to_spec()
//!        ▼
//! MarkerSpec / PolylineSpec ──► sync() ──► AnnotationSet ──► AnnotationManager::replace_all
//!                                  │
//!                                  └──► IconRequest (remote icons not yet cached)
//!                                           │ host fetches in background
//!                                           ▼
//!                                      apply_icon(generation, ...)
//! ```

mod synchronizer;

pub use synchronizer::{AnnotationSynchronizer, IconRequest, SyncOutcome};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coord::{Coordinate, LngLat};
use crate::geometry::Color;
use crate::platform::{Image, ImageRef};

/// Which annotation manager an annotation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    Point,
    Polyline,
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationKind::Point => write!(f, "point"),
            AnnotationKind::Polyline => write!(f, "polyline"),
        }
    }
}

/// Position of an annotation within its kind's current set.
///
/// Ids are reassigned on every sync, which keeps repeated syncs of the same
/// input identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(pub usize);

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Raw marker prop: `{ latitude, longitude, image: { uri } }`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarkerProp {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub image: Option<ImageRef>,
}

impl MarkerProp {
    /// Validated marker, or `None` when the position is unusable.
    pub fn to_spec(&self) -> Option<MarkerSpec> {
        let coordinate = Coordinate::from_pair(&[self.latitude, self.longitude])?;
        Some(MarkerSpec {
            coordinate,
            icon: self.image.clone(),
        })
    }
}

/// Raw polyline prop: `{ coordinates: [[lat, lng], ...], color, opacity }`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PolylineProp {
    #[serde(default)]
    pub coordinates: Vec<Vec<Option<f64>>>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub opacity: Option<f64>,
}

impl PolylineProp {
    /// Polyline with invalid pairs removed. May end up with fewer than two points.
    pub fn to_spec(&self) -> PolylineSpec {
        PolylineSpec {
            points: self
                .coordinates
                .iter()
                .filter_map(|pair| Coordinate::from_pair(pair))
                .collect(),
            color: self.color.clone(),
            opacity: self.opacity,
        }
    }
}

/// A marker to render.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub coordinate: Coordinate,
    pub icon: Option<ImageRef>,
}

impl MarkerSpec {
    /// Marker without a custom icon.
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            icon: None,
        }
    }

    /// Set the icon reference.
    pub fn with_icon(mut self, icon: ImageRef) -> Self {
        self.icon = Some(icon);
        self
    }
}

/// A polyline to render. Width is a platform constant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolylineSpec {
    pub points: Vec<Coordinate>,
    pub color: Option<String>,
    pub opacity: Option<f64>,
}

/// A rendered point annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct PointAnnotation {
    pub id: AnnotationId,
    pub position: LngLat,
    pub icon: Option<Image>,
}

/// A rendered line annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct LineAnnotation {
    pub id: AnnotationId,
    pub points: Vec<LngLat>,
    pub color: Color,
    pub width: f64,
    pub opacity: f64,
}

/// One annotation as handed to an [`AnnotationManager`](crate::platform::AnnotationManager).
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Point(PointAnnotation),
    Line(LineAnnotation),
}

impl Annotation {
    /// Manager this annotation belongs to.
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Annotation::Point(_) => AnnotationKind::Point,
            Annotation::Line(_) => AnnotationKind::Polyline,
        }
    }

    /// Position within its kind.
    pub fn id(&self) -> AnnotationId {
        match self {
            Annotation::Point(p) => p.id,
            Annotation::Line(l) => l.id,
        }
    }
}

/// Everything currently rendered.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnnotationSet {
    pub markers: Vec<PointAnnotation>,
    pub polylines: Vec<LineAnnotation>,
}

impl AnnotationSet {
    /// Whether nothing is rendered.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty() && self.polylines.is_empty()
    }

    /// Every marker position and polyline vertex, used for camera fitting.
    pub fn points(&self) -> Vec<Coordinate> {
        self.markers
            .iter()
            .map(|m| Coordinate::from(m.position))
            .chain(
                self.polylines
                    .iter()
                    .flat_map(|l| l.points.iter().copied().map(Coordinate::from)),
            )
            .collect()
    }

    /// Total number of annotations.
    pub fn len(&self) -> usize {
        self.markers.len() + self.polylines.len()
    }
}
