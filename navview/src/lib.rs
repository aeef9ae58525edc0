//! NavView - map and turn-by-turn navigation view core
//!
//! This library keeps a native map view, its marker/polyline annotations, its
//! camera and an optional guided navigation session in sync with props
//! supplied by a declarative UI framework. Native SDKs are reached only
//! through the traits in [`platform`].
//!
//! # Example
//!
//! ```ignore
//! use navview::host::{event_channel, spawn_view, PropsPatch, ViewCommand};
//! use navview::platform::headless::{HeadlessPlatform, ScriptedRouting, StaticImageResolver};
//!
//! let recorder = HeadlessPlatform::new();
//! let platform = recorder.platform(ScriptedRouting::new(), StaticImageResolver::new(), Default::default());
//! let (sink, mut events) = event_channel();
//! let (view, _task) = spawn_view(platform, Default::default(), sink);
//!
//! view.set_props(PropsPatch::route([45.0, -73.0], [45.1, -73.1]))?;
//! view.layout(Viewport::new(390.0, 844.0))?;
//! view.command(ViewCommand::StartNavigation)?;
//! ```

pub mod annotation;
pub mod camera;
pub mod config;
pub mod coord;
pub mod error;
pub mod geometry;
pub mod host;
pub mod logging;
pub mod navigation;
pub mod platform;
pub mod task;

pub use config::{ConfigError, NavViewConfig};
pub use error::{ImageError, RoutingError, ViewError};
pub use host::{spawn_view, ViewEvent, ViewHandle, ViewSettings};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
