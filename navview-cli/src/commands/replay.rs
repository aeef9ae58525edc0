//! `navview replay` - drive a headless view from a JSON script.
//!
//! A script is a list of steps applied in order to one view:
//!
//! ```json
//! {
//!   "steps": [
//!     { "props": { "origin": [45.0, -73.0], "destination": [45.1, -73.1] } },
//!     { "layout": { "width": 390, "height": 844 } },
//!     { "route": { "routes": [{ "distance": 14000, "expectedTravelTime": 900 }] } },
//!     { "command": "startNavigation" },
//!     { "session": { "type": "arrived" } },
//!     "tap"
//!   ]
//! }
//! ```
//!
//! Emitted events are printed as JSON lines, followed by the final view status.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, ValueEnum};
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedReceiver;

use navview::error::RoutingError;
use navview::geometry::Viewport;
use navview::host::{event_channel, spawn_view, PropsPatch, ViewCommand, ViewEvent, ViewStatus};
use navview::navigation::{Location, RouteResponse, SessionEvent};
use navview::platform::headless::{HeadlessPlatform, ScriptedRouting};
use navview::platform::http::HttpImageResolver;
use navview::platform::PlatformProfile;
use navview::NavViewConfig;

use crate::error::CliError;

/// Default pause after the last step for background work to land.
pub const DEFAULT_SETTLE_MS: u64 = 100;

/// Platform profile selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum ProfileArg {
    /// iOS padding and line widths
    Ios,
    /// Android padding and line widths
    Android,
}

impl From<ProfileArg> for PlatformProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Ios => PlatformProfile::Ios,
            ProfileArg::Android => PlatformProfile::Android,
        }
    }
}

/// Arguments for `navview replay`.
#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Replay script (JSON)
    pub script: PathBuf,

    /// Platform profile; overrides `platform.profile` from the config file
    #[arg(long, value_enum)]
    pub profile: Option<ProfileArg>,

    /// Directory searched for bundled image resources
    #[arg(long)]
    pub resources: Option<PathBuf>,

    /// Milliseconds to wait for background work after the last step
    #[arg(long, default_value_t = DEFAULT_SETTLE_MS)]
    pub settle_ms: u64,
}

/// One scripted step.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    Props(PropsPatch),
    Layout(Viewport),
    Command(ViewCommand),
    Tap,
    /// Queue the next routing response.
    Route(RouteResponse),
    /// Queue a routing failure.
    RouteError(String),
    /// Deliver a fix to the active follow-user listener.
    Location(Location),
    /// Deliver an event to the most recent navigation session.
    Session(SessionEvent),
    /// Pause, in milliseconds.
    Wait(u64),
}

/// A parsed replay script.
#[derive(Debug, Deserialize)]
pub struct ReplayScript {
    pub steps: Vec<Step>,
}

impl ReplayScript {
    /// Read and parse a script file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::ScriptRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| CliError::ScriptParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// What a replay produced.
#[derive(Debug)]
pub struct ReplayReport {
    pub events: Vec<ViewEvent>,
    pub status: ViewStatus,
}

fn drain(events: &mut UnboundedReceiver<ViewEvent>, out: &mut Vec<ViewEvent>) {
    while let Ok(event) = events.try_recv() {
        tracing::debug!(event = %event, "Event emitted");
        out.push(event);
    }
}

/// Apply `script` to a fresh headless view.
pub async fn replay(
    script: ReplayScript,
    config: &NavViewConfig,
    images: HttpImageResolver,
    settle: Duration,
) -> Result<ReplayReport, CliError> {
    let recorder = HeadlessPlatform::new();
    let routing = ScriptedRouting::new();
    let platform = recorder.platform(routing.clone(), images, config.profile);
    let (sink, mut rx) = event_channel();
    let (view, task) = spawn_view(platform, config.view_settings(), sink);

    let mut events = Vec::new();
    for (index, step) in script.steps.into_iter().enumerate() {
        tracing::debug!(step = index, ?step, "Replaying step");
        match step {
            Step::Props(patch) => view.set_props(patch)?,
            Step::Layout(viewport) => view.layout(viewport)?,
            Step::Command(command) => view.command(command)?,
            Step::Tap => view.tap()?,
            Step::Route(response) => routing.push(Ok(response)),
            Step::RouteError(message) => routing.push(Err(RoutingError::Service(message))),
            Step::Location(location) => match recorder.snapshot().listeners.last().copied() {
                Some(listener) => view.user_location(listener, location)?,
                None => tracing::warn!(step = index, "No location listener, skipping fix"),
            },
            Step::Session(event) => match recorder.snapshot().last_session {
                Some((session, _)) => view.session_event(session, event)?,
                None => tracing::warn!(step = index, "No navigation session, skipping event"),
            },
            Step::Wait(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
        }
        // Wait for the loop to catch up so events keep step order.
        view.status().await?;
        drain(&mut rx, &mut events);
    }

    tokio::time::sleep(settle).await;
    let status = view.status().await?;
    drain(&mut rx, &mut events);

    view.detach()?;
    if let Err(e) = task.await {
        tracing::warn!(error = %e, "View loop ended abnormally");
    }

    Ok(ReplayReport { events, status })
}

/// Run `navview replay`.
pub async fn run(args: ReplayArgs, mut config: NavViewConfig) -> Result<(), CliError> {
    if let Some(profile) = args.profile {
        config.profile = profile.into();
    }
    let script = ReplayScript::load(&args.script)?;
    let images = match &args.resources {
        Some(dir) => HttpImageResolver::new()?.with_resource_dir(dir),
        None => HttpImageResolver::new()?,
    };

    tracing::info!(
        script = %args.script.display(),
        steps = script.steps.len(),
        profile = %config.profile,
        "Starting replay"
    );

    let report = replay(script, &config, images, Duration::from_millis(args.settle_ms)).await?;

    for event in &report.events {
        println!("{}", event.to_json());
    }
    println!("{}", serde_json::to_string(&report.status)?);
    Ok(())
}
