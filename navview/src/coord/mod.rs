//! Coordinate handling module
//!
//! Every coordinate that enters the view core goes through [`Coordinate::from_pair`]
//! (raw `[lat, lng]` prop pairs) or [`Coordinate::new`]. Conversion to the
//! engine-native `(lng, lat)` order happens only in [`Coordinate::to_engine`],
//! so no call site ever swaps the components by hand.
//!
//! The module also carries the Web Mercator projection used by the camera fit.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Minimum latitude accepted for a coordinate.
pub const MIN_LAT: f64 = -90.0;
/// Maximum latitude accepted for a coordinate.
pub const MAX_LAT: f64 = 90.0;
/// Minimum longitude accepted for a coordinate.
pub const MIN_LON: f64 = -180.0;
/// Maximum longitude accepted for a coordinate.
pub const MAX_LON: f64 = 180.0;

/// Latitude limit of the Web Mercator projection.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Errors raised when constructing a coordinate from numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordError {
    /// Latitude outside [-90, 90] or not finite.
    InvalidLatitude(f64),
    /// Longitude outside [-180, 180] or not finite.
    InvalidLongitude(f64),
    /// Raw pair did not contain exactly two present components.
    MalformedPair(usize),
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::InvalidLatitude(lat) => write!(f, "invalid latitude: {}", lat),
            CoordError::InvalidLongitude(lon) => write!(f, "invalid longitude: {}", lon),
            CoordError::MalformedPair(len) => {
                write!(f, "expected 2 coordinate components, got {}", len)
            }
        }
    }
}

impl std::error::Error for CoordError {}

/// A geographic position in `(latitude, longitude)` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Engine-native `(longitude, latitude)` position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl Coordinate {
    /// Create a validated coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordError> {
        if !latitude.is_finite() || !(MIN_LAT..=MAX_LAT).contains(&latitude) {
            return Err(CoordError::InvalidLatitude(latitude));
        }
        if !longitude.is_finite() || !(MIN_LON..=MAX_LON).contains(&longitude) {
            return Err(CoordError::InvalidLongitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Parse a raw `[lat, lng]` pair as delivered by host props.
    ///
    /// Both components must be present; anything else is treated as absent.
    pub fn try_from_pair(pair: &[Option<f64>]) -> Result<Self, CoordError> {
        match pair {
            [Some(lat), Some(lng)] => Self::new(*lat, *lng),
            other => Err(CoordError::MalformedPair(
                other.iter().filter(|c| c.is_some()).count(),
            )),
        }
    }

    /// Lenient variant of [`Coordinate::try_from_pair`].
    pub fn from_pair(pair: &[Option<f64>]) -> Option<Self> {
        match Self::try_from_pair(pair) {
            Ok(coord) => Some(coord),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid coordinate pair");
                None
            }
        }
    }

    /// Convert to the engine's `(lng, lat)` order.
    #[inline]
    pub fn to_engine(self) -> LngLat {
        LngLat {
            lng: self.longitude,
            lat: self.latitude,
        }
    }
}

impl From<LngLat> for Coordinate {
    fn from(p: LngLat) -> Self {
        Self {
            latitude: p.lat,
            longitude: p.lng,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Projects a coordinate into normalized Web Mercator space.
///
/// Returns `(x, y)` with both components in `[0, 1]`, `y = 0` at the north edge.
/// Latitudes beyond the projection limit are clamped.
#[inline]
pub fn project(coord: Coordinate) -> (f64, f64) {
    let lat = coord.latitude.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let x = (coord.longitude + 180.0) / 360.0;
    let lat_rad = lat * PI / 180.0;
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0;
    (x, y.clamp(0.0, 1.0))
}

/// Inverse of [`project`].
#[inline]
pub fn unproject(x: f64, y: f64) -> Coordinate {
    let longitude = x * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();
    Coordinate {
        latitude: lat_rad * 180.0 / PI,
        longitude,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pair_accepts_lat_lng() {
        let coord = Coordinate::from_pair(&[Some(40.7128), Some(-74.0060)]).unwrap();
        assert_eq!(coord.latitude, 40.7128);
        assert_eq!(coord.longitude, -74.0060);
    }

    #[test]
    fn test_from_pair_rejects_nulls() {
        assert!(Coordinate::from_pair(&[None, None]).is_none());
        assert!(Coordinate::from_pair(&[Some(1.0), None]).is_none());
        assert!(Coordinate::from_pair(&[None, Some(1.0)]).is_none());
    }

    #[test]
    fn test_from_pair_rejects_wrong_length() {
        assert!(Coordinate::from_pair(&[]).is_none());
        assert!(Coordinate::from_pair(&[Some(1.0)]).is_none());
        assert!(Coordinate::from_pair(&[Some(1.0), Some(2.0), Some(3.0)]).is_none());
        assert_eq!(
            Coordinate::try_from_pair(&[Some(1.0), None]),
            Err(CoordError::MalformedPair(1))
        );
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(matches!(
            Coordinate::new(91.0, 0.0),
            Err(CoordError::InvalidLatitude(_))
        ));
        assert!(matches!(
            Coordinate::new(0.0, 181.0),
            Err(CoordError::InvalidLongitude(_))
        ));
        assert!(matches!(
            Coordinate::new(f64::NAN, 0.0),
            Err(CoordError::InvalidLatitude(_))
        ));
    }

    #[test]
    fn test_to_engine_swaps_order() {
        let coord = Coordinate::new(45.0, -73.0).unwrap();
        let native = coord.to_engine();
        assert_eq!(native.lng, -73.0);
        assert_eq!(native.lat, 45.0);
        assert_eq!(Coordinate::from(native), coord);
    }

    #[test]
    fn test_project_origin_is_center() {
        let (x, y) = project(Coordinate::new(0.0, 0.0).unwrap());
        assert!((x - 0.5).abs() < 1e-12);
        assert!((y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_project_north_is_up() {
        let (_, north) = project(Coordinate::new(60.0, 0.0).unwrap());
        let (_, south) = project(Coordinate::new(-60.0, 0.0).unwrap());
        assert!(north < south, "y grows southwards");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_projection_roundtrip(
                lat in -85.0..85.0_f64,
                lon in -180.0..180.0_f64
            ) {
                let coord = Coordinate::new(lat, lon).unwrap();
                let (x, y) = project(coord);
                let back = unproject(x, y);

                prop_assert!((back.latitude - lat).abs() < 1e-9);
                prop_assert!((back.longitude - lon).abs() < 1e-9);
            }

            #[test]
            fn test_projection_in_unit_square(
                lat in -90.0..=90.0_f64,
                lon in -180.0..=180.0_f64
            ) {
                let (x, y) = project(Coordinate::new(lat, lon).unwrap());
                prop_assert!((0.0..=1.0).contains(&x));
                prop_assert!((0.0..=1.0).contains(&y));
            }
        }
    }
}
