//! Configuration file support.
//!
//! Settings live in `~/.navview/config.ini`:
//!
//! ```ini
//! [platform]
//! profile = ios
//!
//! [camera]
//! default_zoom = 15
//! default_pitch = 0
//! min_zoom = 0
//! max_zoom = 20
//! fit_ease_ms = 500
//! follow_zoom = 15
//! follow_ease_ms = 1300
//!
//! [annotations]
//! polyline_color = #00AA8D
//! ; polyline_width = 4.0   (defaults to the platform profile)
//!
//! [navigation]
//! transport_mode = bike
//! simulation_speed = 5
//!
//! [logging]
//! level = info
//! ; file = /var/log/navview/navview.log
//! ```
//!
//! A missing file yields defaults. Present but malformed values are errors.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::camera::{
    CameraSettings, DEFAULT_FIT_EASE, DEFAULT_FOLLOW_EASE, DEFAULT_FOLLOW_ZOOM, DEFAULT_PITCH,
    DEFAULT_ZOOM,
};
use crate::geometry::{Color, FitLimits, DEFAULT_POLYLINE_COLOR};
use crate::host::ViewSettings;
use crate::logging::LoggingConfig;
use crate::navigation::{TransportMode, DEFAULT_SIMULATION_SPEED};
use crate::platform::PlatformProfile;

/// Directory under the home directory holding navview files.
pub const CONFIG_DIR_NAME: &str = ".navview";

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors from loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value for {section}.{key}: '{value}' ({reason})")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// `~/.navview/config.ini`, or `./.navview/config.ini` without a home directory.
pub fn config_file_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

/// `[camera]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    pub default_zoom: f64,
    pub default_pitch: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub fit_ease_ms: u64,
    pub follow_zoom: f64,
    pub follow_ease_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let limits = FitLimits::default();
        Self {
            default_zoom: DEFAULT_ZOOM,
            default_pitch: DEFAULT_PITCH,
            min_zoom: limits.min_zoom,
            max_zoom: limits.max_zoom,
            fit_ease_ms: DEFAULT_FIT_EASE.as_millis() as u64,
            follow_zoom: DEFAULT_FOLLOW_ZOOM,
            follow_ease_ms: DEFAULT_FOLLOW_EASE.as_millis() as u64,
        }
    }
}

/// `[annotations]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationsConfig {
    pub polyline_color: String,
    /// `None` uses the platform profile's width.
    pub polyline_width: Option<f64>,
}

impl Default for AnnotationsConfig {
    fn default() -> Self {
        Self {
            polyline_color: DEFAULT_POLYLINE_COLOR.to_string(),
            polyline_width: None,
        }
    }
}

/// `[navigation]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationConfig {
    pub transport_mode: TransportMode,
    pub simulation_speed: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            transport_mode: TransportMode::default(),
            simulation_speed: DEFAULT_SIMULATION_SPEED,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NavViewConfig {
    pub profile: PlatformProfile,
    pub camera: CameraConfig,
    pub annotations: AnnotationsConfig,
    pub navigation: NavigationConfig,
    pub logging: LoggingConfig,
}

fn parse_value<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl NavViewConfig {
    /// Load from [`config_file_path`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini
                .section(Some(key.section()))
                .and_then(|s| s.get(key.key_name()))
            {
                key.set(&mut config, value)?;
            }
        }
        config.validate()?;

        tracing::info!(path = %path.display(), profile = %config.profile, "Configuration loaded");
        Ok(config)
    }

    /// Check constraints that span several keys.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.min_zoom > self.camera.max_zoom {
            return Err(invalid(
                ConfigKey::CameraMinZoom.section(),
                ConfigKey::CameraMinZoom.key_name(),
                &self.camera.min_zoom.to_string(),
                &format!("min_zoom must not exceed max_zoom ({})", self.camera.max_zoom),
            ));
        }
        Ok(())
    }

    /// Save to [`config_file_path`].
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Write every key to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source: std::io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini.write_to_file(path).map_err(write_err)?;

        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Use a platform profile.
    pub fn with_profile(mut self, profile: PlatformProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Set the camera section.
    pub fn with_camera(mut self, camera: CameraConfig) -> Self {
        self.camera = camera;
        self
    }

    /// Set the default transport mode.
    pub fn with_transport_mode(mut self, mode: TransportMode) -> Self {
        self.navigation.transport_mode = mode;
        self
    }

    /// Set the logging section.
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Camera controller settings derived from `[camera]`.
    pub fn camera_settings(&self) -> CameraSettings {
        CameraSettings::default()
            .with_default_zoom(self.camera.default_zoom)
            .with_default_pitch(self.camera.default_pitch)
            .with_limits(self.camera.min_zoom, self.camera.max_zoom)
            .with_fit_ease(Duration::from_millis(self.camera.fit_ease_ms))
            .with_follow(
                self.camera.follow_zoom,
                Duration::from_millis(self.camera.follow_ease_ms),
            )
    }

    /// Host settings derived from the whole file.
    pub fn view_settings(&self) -> ViewSettings {
        let settings = ViewSettings::default()
            .with_camera(self.camera_settings())
            .with_polyline_color(self.annotations.polyline_color.clone())
            .with_transport_mode(self.navigation.transport_mode)
            .with_simulation_speed(self.navigation.simulation_speed);
        match self.annotations.polyline_width {
            Some(width) => settings.with_polyline_width(width),
            None => settings,
        }
    }
}

/// Every key of the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    PlatformProfile,
    CameraDefaultZoom,
    CameraDefaultPitch,
    CameraMinZoom,
    CameraMaxZoom,
    CameraFitEaseMs,
    CameraFollowZoom,
    CameraFollowEaseMs,
    AnnotationsPolylineColor,
    AnnotationsPolylineWidth,
    NavigationTransportMode,
    NavigationSimulationSpeed,
    LoggingLevel,
    LoggingFile,
}

impl ConfigKey {
    /// All keys, in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::PlatformProfile,
            ConfigKey::CameraDefaultZoom,
            ConfigKey::CameraDefaultPitch,
            ConfigKey::CameraMinZoom,
            ConfigKey::CameraMaxZoom,
            ConfigKey::CameraFitEaseMs,
            ConfigKey::CameraFollowZoom,
            ConfigKey::CameraFollowEaseMs,
            ConfigKey::AnnotationsPolylineColor,
            ConfigKey::AnnotationsPolylineWidth,
            ConfigKey::NavigationTransportMode,
            ConfigKey::NavigationSimulationSpeed,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingFile,
        ]
    }

    /// INI section.
    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::PlatformProfile => "platform",
            ConfigKey::CameraDefaultZoom
            | ConfigKey::CameraDefaultPitch
            | ConfigKey::CameraMinZoom
            | ConfigKey::CameraMaxZoom
            | ConfigKey::CameraFitEaseMs
            | ConfigKey::CameraFollowZoom
            | ConfigKey::CameraFollowEaseMs => "camera",
            ConfigKey::AnnotationsPolylineColor | ConfigKey::AnnotationsPolylineWidth => {
                "annotations"
            }
            ConfigKey::NavigationTransportMode | ConfigKey::NavigationSimulationSpeed => {
                "navigation"
            }
            ConfigKey::LoggingLevel | ConfigKey::LoggingFile => "logging",
        }
    }

    /// Key within its section.
    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::PlatformProfile => "profile",
            ConfigKey::CameraDefaultZoom => "default_zoom",
            ConfigKey::CameraDefaultPitch => "default_pitch",
            ConfigKey::CameraMinZoom => "min_zoom",
            ConfigKey::CameraMaxZoom => "max_zoom",
            ConfigKey::CameraFitEaseMs => "fit_ease_ms",
            ConfigKey::CameraFollowZoom => "follow_zoom",
            ConfigKey::CameraFollowEaseMs => "follow_ease_ms",
            ConfigKey::AnnotationsPolylineColor => "polyline_color",
            ConfigKey::AnnotationsPolylineWidth => "polyline_width",
            ConfigKey::NavigationTransportMode => "transport_mode",
            ConfigKey::NavigationSimulationSpeed => "simulation_speed",
            ConfigKey::LoggingLevel => "level",
            ConfigKey::LoggingFile => "file",
        }
    }

    /// `section.key`.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as written to the file; empty when unset.
    pub fn get(&self, config: &NavViewConfig) -> String {
        match self {
            ConfigKey::PlatformProfile => config.profile.to_string(),
            ConfigKey::CameraDefaultZoom => config.camera.default_zoom.to_string(),
            ConfigKey::CameraDefaultPitch => config.camera.default_pitch.to_string(),
            ConfigKey::CameraMinZoom => config.camera.min_zoom.to_string(),
            ConfigKey::CameraMaxZoom => config.camera.max_zoom.to_string(),
            ConfigKey::CameraFitEaseMs => config.camera.fit_ease_ms.to_string(),
            ConfigKey::CameraFollowZoom => config.camera.follow_zoom.to_string(),
            ConfigKey::CameraFollowEaseMs => config.camera.follow_ease_ms.to_string(),
            ConfigKey::AnnotationsPolylineColor => config.annotations.polyline_color.clone(),
            ConfigKey::AnnotationsPolylineWidth => config
                .annotations
                .polyline_width
                .map(|w| w.to_string())
                .unwrap_or_default(),
            ConfigKey::NavigationTransportMode => config.navigation.transport_mode.to_string(),
            ConfigKey::NavigationSimulationSpeed => {
                config.navigation.simulation_speed.to_string()
            }
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingFile => config
                .logging
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Parse and store `value`.
    pub fn set(&self, config: &mut NavViewConfig, value: &str) -> Result<(), ConfigError> {
        let section = self.section();
        let key = self.key_name();
        let value = value.trim();

        match self {
            ConfigKey::PlatformProfile => {
                config.profile = value
                    .parse()
                    .map_err(|e: String| invalid(section, key, value, &e))?;
            }
            ConfigKey::CameraDefaultZoom => {
                config.camera.default_zoom = parse_zoom(section, key, value)?;
            }
            ConfigKey::CameraDefaultPitch => {
                let pitch: f64 = parse_value(section, key, value)?;
                if !(0.0..=85.0).contains(&pitch) {
                    return Err(invalid(section, key, value, "pitch must be within 0-85"));
                }
                config.camera.default_pitch = pitch;
            }
            ConfigKey::CameraMinZoom => config.camera.min_zoom = parse_zoom(section, key, value)?,
            ConfigKey::CameraMaxZoom => config.camera.max_zoom = parse_zoom(section, key, value)?,
            ConfigKey::CameraFitEaseMs => {
                config.camera.fit_ease_ms = parse_value(section, key, value)?;
            }
            ConfigKey::CameraFollowZoom => {
                config.camera.follow_zoom = parse_zoom(section, key, value)?;
            }
            ConfigKey::CameraFollowEaseMs => {
                config.camera.follow_ease_ms = parse_value(section, key, value)?;
            }
            ConfigKey::AnnotationsPolylineColor => {
                if Color::from_hex(value).is_none() {
                    return Err(invalid(section, key, value, "expected #RGB, #RRGGBB or #RRGGBBAA"));
                }
                config.annotations.polyline_color = value.to_string();
            }
            ConfigKey::AnnotationsPolylineWidth => {
                config.annotations.polyline_width = if value.is_empty() {
                    None
                } else {
                    let width: f64 = parse_value(section, key, value)?;
                    if !(width.is_finite() && width > 0.0) {
                        return Err(invalid(section, key, value, "width must be positive"));
                    }
                    Some(width)
                };
            }
            ConfigKey::NavigationTransportMode => {
                config.navigation.transport_mode = TransportMode::parse(value)
                    .ok_or_else(|| invalid(section, key, value, "unknown transport mode"))?;
            }
            ConfigKey::NavigationSimulationSpeed => {
                let speed: f64 = parse_value(section, key, value)?;
                if !(speed.is_finite() && speed > 0.0) {
                    return Err(invalid(section, key, value, "speed must be positive"));
                }
                config.navigation.simulation_speed = speed;
            }
            ConfigKey::LoggingLevel => {
                if value.is_empty() {
                    return Err(invalid(section, key, value, "level must not be empty"));
                }
                config.logging.level = value.to_string();
            }
            ConfigKey::LoggingFile => {
                config.logging.file = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
        }
        Ok(())
    }
}

fn parse_zoom(section: &str, key: &str, value: &str) -> Result<f64, ConfigError> {
    let zoom: f64 = parse_value(section, key, value)?;
    if !(0.0..=24.0).contains(&zoom) {
        return Err(invalid(section, key, value, "zoom must be within 0-24"));
    }
    Ok(zoom)
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .copied()
            .find(|k| k.name() == s.trim())
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = NavViewConfig::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, NavViewConfig::default());
        assert_eq!(config.navigation.transport_mode, TransportMode::Bike);
        assert_eq!(config.camera.fit_ease_ms, 500);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = NavViewConfig::default()
            .with_profile(PlatformProfile::Android)
            .with_transport_mode(TransportMode::Walk);
        config.camera.follow_ease_ms = 900;
        config.annotations.polyline_width = Some(6.5);
        config.logging.file = Some(dir.path().join("navview.log"));

        config.save_to(&path).unwrap();
        let loaded = NavViewConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[camera]\ndefault_zoom = 12\n\n[navigation]\ntransport_mode = driving\n")
            .unwrap();

        let config = NavViewConfig::load_from(&path).unwrap();
        assert_eq!(config.camera.default_zoom, 12.0);
        assert_eq!(config.navigation.transport_mode, TransportMode::Drive);
        assert_eq!(config.camera.max_zoom, 20.0);
        assert_eq!(config.profile, PlatformProfile::Ios);
    }

    #[test]
    fn test_invalid_value_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[navigation]\nsimulation_speed = fast\n").unwrap();

        let err = NavViewConfig::load_from(&path).unwrap_err();
        match err {
            ConfigError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "navigation");
                assert_eq!(key, "simulation_speed");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_reversed_zoom_limits_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[camera]\nmin_zoom = 18\nmax_zoom = 5\n").unwrap();

        match NavViewConfig::load_from(&path).unwrap_err() {
            ConfigError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "camera");
                assert_eq!(key, "min_zoom");
            }
            other => panic!("unexpected error {:?}", other),
        }

        let mut config = NavViewConfig::default();
        ConfigKey::CameraMinZoom.set(&mut config, "18").unwrap();
        ConfigKey::CameraMaxZoom.set(&mut config, "5").unwrap();
        assert!(config.validate().is_err());

        // Even unvalidated, the derived limits stay ordered.
        let limits = config.view_settings().camera.limits;
        assert!(limits.min_zoom <= limits.max_zoom);
    }

    #[test]
    fn test_key_parsing_and_set() {
        let key: ConfigKey = "annotations.polyline_color".parse().unwrap();
        assert_eq!(key, ConfigKey::AnnotationsPolylineColor);
        assert!("annotations.nope".parse::<ConfigKey>().is_err());

        let mut config = NavViewConfig::default();
        key.set(&mut config, "#ff0000").unwrap();
        assert_eq!(key.get(&config), "#ff0000");
        assert!(key.set(&mut config, "red").is_err());
    }

    #[test]
    fn test_view_settings_follow_config() {
        let mut config = NavViewConfig::default();
        config.camera.fit_ease_ms = 250;
        config.navigation.simulation_speed = 2.0;

        let settings = config.view_settings();
        assert_eq!(settings.camera.fit_ease, Duration::from_millis(250));
        assert_eq!(settings.simulation_speed, 2.0);
        assert_eq!(settings.polyline_width, None);
    }
}
