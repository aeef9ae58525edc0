//! The serialized view loop and the handle that feeds it.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::annotation::AnnotationId;
use crate::error::{ImageError, RoutingError, ViewError};
use crate::geometry::{CameraFrame, Viewport};
use crate::navigation::{Location, NavigationState, RouteResponse, SessionEvent, SessionId};
use crate::platform::{Image, ListenerId, MapHandle, Platform};
use crate::task::Generation;

use super::{EventSink, ImageSlot, PropsPatch, ViewHost, ViewSettings};

/// Commands the host framework can invoke on a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewCommand {
    StartNavigation,
    StopNavigation,
    /// Hand the camera to an external tracker; suppresses annotation fitting.
    StartTracking,
    StopTracking,
}

/// Result of background work, tagged with the generation it was issued under.
#[derive(Debug)]
pub enum Completion {
    Route {
        generation: Generation,
        result: Result<RouteResponse, RoutingError>,
    },
    Icon {
        generation: Generation,
        annotation: AnnotationId,
        uri: String,
        result: Result<Image, ImageError>,
    },
    Image {
        slot: ImageSlot,
        generation: Generation,
        result: Result<Image, ImageError>,
    },
}

/// Everything the view loop processes.
#[derive(Debug)]
pub enum ViewMessage {
    Props(PropsPatch),
    Layout(Viewport),
    Command(ViewCommand),
    Tap,
    /// A fix from a location listener registered through the map engine.
    UserLocation {
        listener: ListenerId,
        location: Location,
    },
    /// An event from a running navigation session.
    Session {
        session: SessionId,
        event: SessionEvent,
    },
    Completion(Completion),
    Status(oneshot::Sender<ViewStatus>),
    Detach,
}

/// Point-in-time view state, for tests and tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewStatus {
    #[serde(serialize_with = "serialize_state")]
    pub navigation: NavigationState,
    #[serde(skip)]
    pub map: Option<MapHandle>,
    pub camera: Option<CameraFrame>,
    pub markers: usize,
    pub polylines: usize,
    pub tracking: bool,
    pub following: bool,
    pub detached: bool,
}

fn serialize_state<S: serde::Serializer>(
    state: &NavigationState,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(state.display_status())
}

/// Cloneable capability to post messages into one view's loop.
#[derive(Debug, Clone)]
pub struct ViewHandle {
    tx: mpsc::UnboundedSender<ViewMessage>,
}

impl ViewHandle {
    /// Post a raw message.
    pub fn send(&self, message: ViewMessage) -> Result<(), ViewError> {
        self.tx.send(message).map_err(|_| ViewError::Closed)
    }

    /// Apply a prop patch.
    pub fn set_props(&self, patch: PropsPatch) -> Result<(), ViewError> {
        self.send(ViewMessage::Props(patch))
    }

    /// Report the view's size.
    pub fn layout(&self, viewport: Viewport) -> Result<(), ViewError> {
        self.send(ViewMessage::Layout(viewport))
    }

    /// Run a command.
    pub fn command(&self, command: ViewCommand) -> Result<(), ViewError> {
        self.send(ViewMessage::Command(command))
    }

    /// Report a tap on the map.
    pub fn tap(&self) -> Result<(), ViewError> {
        self.send(ViewMessage::Tap)
    }

    /// Deliver a location-listener fix.
    pub fn user_location(&self, listener: ListenerId, location: Location) -> Result<(), ViewError> {
        self.send(ViewMessage::UserLocation { listener, location })
    }

    /// Deliver a session event.
    pub fn session_event(&self, session: SessionId, event: SessionEvent) -> Result<(), ViewError> {
        self.send(ViewMessage::Session { session, event })
    }

    /// Tear the view down.
    pub fn detach(&self) -> Result<(), ViewError> {
        self.send(ViewMessage::Detach)
    }

    /// Query the view state once every earlier message has been processed.
    pub async fn status(&self) -> Result<ViewStatus, ViewError> {
        let (reply, rx) = oneshot::channel();
        self.send(ViewMessage::Status(reply))?;
        rx.await.map_err(|_| ViewError::Closed)
    }
}

/// Drains the message channel into a [`ViewHost`].
#[derive(Debug)]
pub struct ViewLoop {
    host: ViewHost,
    rx: mpsc::UnboundedReceiver<ViewMessage>,
}

impl ViewLoop {
    /// Process messages until detach or until every sender is gone.
    pub async fn run(mut self) {
        tracing::debug!("View loop started");
        while let Some(message) = self.rx.recv().await {
            if !self.host.handle(message) {
                break;
            }
        }
        // Dropped without an explicit detach: release everything anyway.
        self.host.detach();
        tracing::debug!("View loop stopped");
    }
}

/// Create a view on `platform` and start its loop on the current runtime.
pub fn spawn_view(
    platform: Platform,
    settings: ViewSettings,
    events: impl EventSink + 'static,
) -> (ViewHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let host = ViewHost::new(platform, settings, Box::new(events), tx.downgrade());
    let view_loop = ViewLoop { host, rx };
    let task = tokio::spawn(view_loop.run());
    (ViewHandle { tx }, task)
}
