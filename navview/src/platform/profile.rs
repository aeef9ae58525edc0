//! Per-platform constants.
//!
//! The two native SDKs frame annotations with different insets and draw lines
//! at different widths. Everything else in the core is shared.

use std::fmt;
use std::str::FromStr;

use crate::geometry::EdgeInsets;

/// The two fit paddings, selected by the camera's `offset` flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaddingProfiles {
    /// Used when `offset` is false or absent.
    pub default: EdgeInsets,
    /// Used when `offset` is true (room for overlaid UI at the bottom).
    pub offset: EdgeInsets,
}

impl PaddingProfiles {
    /// Pick the padding for the given `offset` flag.
    pub fn select(&self, offset: bool) -> EdgeInsets {
        if offset {
            self.offset
        } else {
            self.default
        }
    }
}

/// Target platform of the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlatformProfile {
    #[default]
    Ios,
    Android,
}

impl PlatformProfile {
    /// Annotation fit paddings.
    pub fn padding(&self) -> PaddingProfiles {
        match self {
            PlatformProfile::Ios => PaddingProfiles {
                default: EdgeInsets::new(42.0, 32.0, 62.0, 32.0),
                offset: EdgeInsets::new(82.0, 32.0, 168.0, 32.0),
            },
            PlatformProfile::Android => PaddingProfiles {
                default: EdgeInsets::new(42.0, 72.0, 32.0, 72.0),
                offset: EdgeInsets::new(62.0, 72.0, 328.0, 72.0),
            },
        }
    }

    /// Polyline stroke width in points.
    pub fn polyline_width(&self) -> f64 {
        match self {
            PlatformProfile::Ios => 4.0,
            PlatformProfile::Android => 5.0,
        }
    }

    /// Name used in the configuration file.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformProfile::Ios => "ios",
            PlatformProfile::Android => "android",
        }
    }
}

impl fmt::Display for PlatformProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ios" => Ok(PlatformProfile::Ios),
            "android" => Ok(PlatformProfile::Android),
            other => Err(format!("unknown platform profile '{}'", other)),
        }
    }
}
