//! View host.
//!
//! [`ViewHost`] is the single owner of one map view's state. It consumes typed
//! props, commands and background completions, fans them out to the annotation
//! synchronizer, the camera controller and the navigation controller, and
//! emits host events in order. All of this happens on one serialized loop
//! (see [`spawn_view`]); nothing else ever touches the host.
//!
//! # Message Flow
//!
//! ```text
//!  ViewHandle ──► mpsc ──► ViewLoop ──► ViewHost ──► MapEngine / NavigationSdk
//!      ▲                                   │
//!      │                                   ├──► spawn_completion(route / icon) ──┐
//!      │                                   │                                     │
//!      └───────────── Completion ◄─────────┼─────────────────────────────────────┘
//!                                          └──► EventSink (onNavigationStarted, ...)
//! ```

mod events;
mod props;
mod view_loop;

pub use events::{event_channel, ChannelEventSink, EventSink, ViewEvent};
pub use props::{PropChanges, PropsPatch, ViewProps};
pub use view_loop::{
    spawn_view, Completion, ViewCommand, ViewHandle, ViewLoop, ViewMessage, ViewStatus,
};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::WeakUnboundedSender;

use crate::annotation::{AnnotationId, AnnotationKind, AnnotationSynchronizer};
use crate::camera::{CameraController, CameraSettings, FollowUser};
use crate::error::{ImageError, RoutingError};
use crate::geometry::{Viewport, DEFAULT_POLYLINE_COLOR};
use crate::navigation::{
    Location, NavigationSessionController, RouteLineStyle, RouteOutcome, RouteResponse,
    SessionEvent, SessionId, SessionOptions, StartRequest, StopOutcome, StopReason,
    TransportMode, DEFAULT_SIMULATION_SPEED,
};
use crate::platform::{
    CameraTransition, Image, ImageRef, ImageResolver, ImageSource, ListenerId, MapEngine,
    MapHandle, NavigationSdk, Platform, PlatformProfile, PuckOptions, RoutingService,
};
use crate::task::{spawn_completion, Generation, GenerationCounter};

/// Host-level tunables, usually built from the configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSettings {
    pub camera: CameraSettings,
    pub polyline_color: String,
    /// `None` uses the platform profile's width.
    pub polyline_width: Option<f64>,
    pub transport_mode: TransportMode,
    pub simulation_speed: f64,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            polyline_color: DEFAULT_POLYLINE_COLOR.to_string(),
            polyline_width: None,
            transport_mode: TransportMode::default(),
            simulation_speed: DEFAULT_SIMULATION_SPEED,
        }
    }
}

impl ViewSettings {
    /// Set the camera settings.
    pub fn with_camera(mut self, camera: CameraSettings) -> Self {
        self.camera = camera;
        self
    }

    /// Set the fallback polyline color.
    pub fn with_polyline_color(mut self, color: impl Into<String>) -> Self {
        self.polyline_color = color.into();
        self
    }

    /// Override the platform polyline width.
    pub fn with_polyline_width(mut self, width: f64) -> Self {
        self.polyline_width = Some(width);
        self
    }

    /// Set the initial transport mode.
    pub fn with_transport_mode(mut self, mode: TransportMode) -> Self {
        self.transport_mode = mode;
        self
    }

    /// Set the simulation speed multiplier.
    pub fn with_simulation_speed(mut self, speed: f64) -> Self {
        self.simulation_speed = speed;
        self
    }
}

/// Images referenced by props outside of markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSlot {
    /// `userLocatorMap`: puck on the plain map.
    MapPuck,
    /// `userLocatorNavigation`: puck during guidance.
    NavigationPuck,
    /// `destinationMarker`: handed to the navigation SDK.
    DestinationMarker,
}

/// Loaded images per slot, with per-slot staleness.
#[derive(Debug, Default)]
struct ImageSlots {
    generations: GenerationCounter,
    pending: HashMap<ImageSlot, Generation>,
    loaded: HashMap<ImageSlot, Image>,
}

struct MapState {
    handle: MapHandle,
    annotations: AnnotationSynchronizer,
}

/// Owner of one view's state. Driven by [`ViewLoop`].
pub struct ViewHost {
    engine: Box<dyn MapEngine>,
    routing: Arc<dyn RoutingService>,
    navigation_sdk: Box<dyn NavigationSdk>,
    images: Arc<dyn ImageResolver>,
    profile: PlatformProfile,
    settings: ViewSettings,
    props: ViewProps,
    viewport: Viewport,
    map: Option<MapState>,
    camera: CameraController,
    follow: FollowUser,
    navigation: NavigationSessionController,
    tracking: bool,
    slots: ImageSlots,
    events: Box<dyn EventSink>,
    tx: WeakUnboundedSender<ViewMessage>,
    detached: bool,
}

impl fmt::Debug for ViewHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewHost")
            .field("profile", &self.profile)
            .field("map", &self.map.as_ref().map(|m| m.handle))
            .field("navigation", &self.navigation.state())
            .field("tracking", &self.tracking)
            .field("detached", &self.detached)
            .finish_non_exhaustive()
    }
}

impl ViewHost {
    /// Create a host. `tx` is the loop's own sender, used for background completions.
    pub fn new(
        platform: Platform,
        settings: ViewSettings,
        events: Box<dyn EventSink>,
        tx: WeakUnboundedSender<ViewMessage>,
    ) -> Self {
        let camera = CameraController::new(settings.camera, platform.profile.padding());
        Self {
            engine: platform.engine,
            routing: platform.routing,
            navigation_sdk: platform.navigation,
            images: platform.images,
            profile: platform.profile,
            props: ViewProps::new(settings.transport_mode),
            settings,
            viewport: Viewport::default(),
            map: None,
            camera,
            follow: FollowUser::new(),
            navigation: NavigationSessionController::new(),
            tracking: false,
            slots: ImageSlots::default(),
            events,
            tx,
            detached: false,
        }
    }

    /// Current props.
    pub fn props(&self) -> &ViewProps {
        &self.props
    }

    /// Snapshot for inspection.
    pub fn status(&self) -> ViewStatus {
        ViewStatus {
            navigation: self.navigation.state(),
            map: self.map.as_ref().map(|m| m.handle),
            camera: self.camera.last_frame().copied(),
            markers: self
                .map
                .as_ref()
                .map_or(0, |m| m.annotations.current().markers.len()),
            polylines: self
                .map
                .as_ref()
                .map_or(0, |m| m.annotations.current().polylines.len()),
            tracking: self.tracking,
            following: self.follow.is_active(),
            detached: self.detached,
        }
    }

    /// Dispatch one loop message. Returns `false` once the view is torn down.
    pub fn handle(&mut self, message: ViewMessage) -> bool {
        if self.detached {
            tracing::debug!(?message, "Ignoring message for detached view");
            return false;
        }
        match message {
            ViewMessage::Props(patch) => self.apply_props(patch),
            ViewMessage::Layout(viewport) => self.layout(viewport),
            ViewMessage::Command(command) => self.command(command),
            ViewMessage::Tap => self.events.emit(ViewEvent::Tap),
            ViewMessage::UserLocation { listener, location } => {
                self.user_location(listener, location)
            }
            ViewMessage::Session { session, event } => self.session_event(session, event),
            ViewMessage::Completion(completion) => self.complete(completion),
            ViewMessage::Status(reply) => {
                // Receiver may have given up waiting.
                let _ = reply.send(self.status());
            }
            ViewMessage::Detach => {
                self.detach();
                return false;
            }
        }
        true
    }

    /// Apply a batch of prop changes.
    pub fn apply_props(&mut self, patch: PropsPatch) {
        let changes = self.props.apply(patch);
        tracing::debug!(?changes, "Props applied");

        if changes.destination_invalidated {
            self.stop_navigation(StopReason::DestinationInvalid);
        }

        if changes.map_puck_image {
            self.load_slot(ImageSlot::MapPuck);
        }
        if changes.navigation_puck_image {
            self.load_slot(ImageSlot::NavigationPuck);
        }
        if changes.destination_marker_image {
            self.load_slot(ImageSlot::DestinationMarker);
        }

        let Some(handle) = self.map.as_ref().map(|m| m.handle) else {
            return;
        };

        if changes.map_token {
            tracing::debug!(map = %handle, "Map token changed after map creation, ignoring");
        }
        if changes.style {
            if let Some(style) = &self.props.style_url {
                self.engine.load_style(handle, style);
            }
        }
        if changes.puck {
            self.apply_puck();
        }
        if changes.follow {
            self.follow
                .set_enabled(self.props.follow_user, self.engine.as_mut(), handle);
        }
        if changes.annotations {
            self.sync_annotations();
        } else if changes.camera {
            self.camera_pass();
        }
    }

    /// React to the host's layout pass. The first one creates the map.
    pub fn layout(&mut self, viewport: Viewport) {
        self.viewport = viewport;

        if self.map.is_some() {
            self.camera_pass();
            return;
        }

        let handle = self
            .engine
            .create_map(self.props.map_token.as_deref(), viewport);
        tracing::info!(map = %handle, profile = %self.profile, "Map created");

        if let Some(style) = &self.props.style_url {
            self.engine.load_style(handle, style);
        }

        let width = self
            .settings
            .polyline_width
            .unwrap_or_else(|| self.profile.polyline_width());
        let annotations = AnnotationSynchronizer::new(
            self.engine
                .create_annotation_manager(handle, AnnotationKind::Point),
            self.engine
                .create_annotation_manager(handle, AnnotationKind::Polyline),
            Arc::clone(&self.images),
            width,
        )
        .with_default_color(self.settings.polyline_color.clone());

        self.map = Some(MapState {
            handle,
            annotations,
        });
        self.camera.reset_layout();

        self.apply_puck();
        if self.props.follow_user {
            self.follow.set_enabled(true, self.engine.as_mut(), handle);
        }
        self.sync_annotations();
    }

    /// Run a host command.
    pub fn command(&mut self, command: ViewCommand) {
        tracing::debug!(?command, "Command received");
        match command {
            ViewCommand::StartNavigation => self.start_navigation(),
            ViewCommand::StopNavigation => self.stop_navigation(StopReason::Command),
            ViewCommand::StartTracking => self.tracking = true,
            ViewCommand::StopTracking => self.tracking = false,
        }
    }

    /// Tear everything down. Idempotent.
    pub fn detach(&mut self) {
        if self.detached {
            return;
        }
        self.stop_navigation(StopReason::Teardown);

        if let Some(map) = self.map.take() {
            self.follow.set_enabled(false, self.engine.as_mut(), map.handle);
            self.engine.destroy_map(map.handle);
            tracing::info!(map = %map.handle, "Map destroyed");
        }
        self.detached = true;
    }

    fn sync_annotations(&mut self) {
        let Some(map) = self.map.as_mut() else {
            return;
        };
        let outcome = map
            .annotations
            .sync(&self.props.markers, &self.props.polylines);

        for request in outcome.pending {
            let fetch = self.images.fetch_remote(&request.uri);
            let generation = request.generation;
            let annotation = request.annotation;
            let uri = request.uri;
            self.spawn(fetch, move |result| {
                ViewMessage::Completion(Completion::Icon {
                    generation,
                    annotation,
                    uri,
                    result,
                })
            });
        }

        // One camera pass per completed replace.
        self.camera_pass();
    }

    fn camera_pass(&mut self) {
        let Some(map) = self.map.as_ref() else {
            return;
        };
        let navigating = self.tracking || self.navigation.owns_camera();
        let frame = self.camera.resolve(
            &self.props.camera,
            map.annotations.current(),
            navigating,
            &self.viewport,
        );
        if let Some(frame) = frame {
            self.camera.apply(frame, self.engine.as_mut(), map.handle);
        }
    }

    fn apply_puck(&mut self) {
        let Some(handle) = self.map.as_ref().map(|m| m.handle) else {
            return;
        };
        let options = PuckOptions {
            enabled: self.props.show_user_location,
            image: self.slots.loaded.get(&ImageSlot::MapPuck).cloned(),
        };
        self.engine.set_location_puck(handle, &options);
    }

    fn slot_ref(&self, slot: ImageSlot) -> Option<&ImageRef> {
        match slot {
            ImageSlot::MapPuck => self.props.user_locator_map.as_ref(),
            ImageSlot::NavigationPuck => self.props.user_locator_navigation.as_ref(),
            ImageSlot::DestinationMarker => self.props.destination_marker.as_ref(),
        }
    }

    fn load_slot(&mut self, slot: ImageSlot) {
        self.slots.loaded.remove(&slot);
        self.slots.pending.remove(&slot);

        let Some(image_ref) = self.slot_ref(slot).cloned() else {
            return;
        };
        match image_ref.source() {
            ImageSource::Resource(name) => match self.images.resolve_local(name) {
                Some(image) => {
                    self.slots.loaded.insert(slot, image);
                }
                None => tracing::warn!(?slot, name, "Image resource not found"),
            },
            ImageSource::Remote(uri) => {
                let generation = self.slots.generations.advance();
                self.slots.pending.insert(slot, generation);
                let fetch = self.images.fetch_remote(uri);
                self.spawn(fetch, move |result| {
                    ViewMessage::Completion(Completion::Image {
                        slot,
                        generation,
                        result,
                    })
                });
            }
        }
    }

    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            simulate: self.props.simulate,
            simulation_speed: self.settings.simulation_speed,
            shows_end_of_route_feedback: self.props.shows_end_of_route_feedback,
            style_url: self.props.style_url.clone(),
            user_puck: self.slots.loaded.get(&ImageSlot::NavigationPuck).cloned(),
            destination_marker: self.slots.loaded.get(&ImageSlot::DestinationMarker).cloned(),
            route_line: RouteLineStyle::default(),
        }
    }

    fn start_navigation(&mut self) {
        if self.map.is_none() {
            tracing::debug!("Start ignored, map not laid out yet");
            return;
        }
        let pending = self.navigation.start(StartRequest {
            origin: self.props.origin,
            destination: self.props.destination,
            mode: self.props.transport_mode,
            access_token: self.props.navigation_token.clone(),
            simulate: self.props.simulate,
        });
        if let Some(pending) = pending {
            let generation = pending.generation;
            let fetch = self.routing.calculate_route(pending.request);
            self.spawn(fetch, move |result| {
                ViewMessage::Completion(Completion::Route { generation, result })
            });
        }
    }

    fn stop_navigation(&mut self, reason: StopReason) {
        match self.navigation.stop(reason) {
            StopOutcome::Ended(session) => {
                tracing::debug!(session = %session.id, %reason, "Session released");
                if reason != StopReason::Teardown {
                    self.events.emit(ViewEvent::CancelNavigation);
                    self.apply_puck();
                    self.camera_pass();
                }
            }
            StopOutcome::RequestCancelled | StopOutcome::NotRunning => {}
        }
    }

    fn route_completed(
        &mut self,
        generation: Generation,
        result: Result<RouteResponse, RoutingError>,
    ) {
        let Some(handle) = self.map.as_ref().map(|m| m.handle) else {
            return;
        };
        let options = self.session_options();
        let outcome = self.navigation.complete(
            generation,
            result,
            self.navigation_sdk.as_mut(),
            handle,
            &options,
        );
        match outcome {
            RouteOutcome::Started(_) => {
                if let Some(style) = &self.props.style_url {
                    self.engine.load_style(handle, style);
                }
                self.events.emit(ViewEvent::NavigationStarted);
            }
            RouteOutcome::Failed(message) => self.events.emit(ViewEvent::Error { message }),
            RouteOutcome::NoRoutes | RouteOutcome::Stale => {}
        }
    }

    fn icon_completed(
        &mut self,
        generation: Generation,
        annotation: AnnotationId,
        uri: &str,
        result: Result<Image, ImageError>,
    ) {
        if let Some(map) = self.map.as_mut() {
            map.annotations
                .apply_icon(generation, annotation, uri, result);
        }
    }

    fn image_completed(
        &mut self,
        slot: ImageSlot,
        generation: Generation,
        result: Result<Image, ImageError>,
    ) {
        if self.slots.pending.get(&slot) != Some(&generation) {
            tracing::debug!(?slot, %generation, "Discarding stale image completion");
            return;
        }
        self.slots.pending.remove(&slot);
        match result {
            Ok(image) => {
                self.slots.loaded.insert(slot, image);
                if slot == ImageSlot::MapPuck {
                    self.apply_puck();
                }
            }
            Err(e) => tracing::warn!(?slot, error = %e, "Image fetch failed"),
        }
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Route { generation, result } => self.route_completed(generation, result),
            Completion::Icon {
                generation,
                annotation,
                uri,
                result,
            } => self.icon_completed(generation, annotation, &uri, result),
            Completion::Image {
                slot,
                generation,
                result,
            } => self.image_completed(slot, generation, result),
        }
    }

    fn session_event(&mut self, session: SessionId, event: SessionEvent) {
        let Some(event) = self.navigation.accept_event(session, event) else {
            return;
        };
        match event {
            SessionEvent::LocationChanged(location) => {
                self.events.emit(ViewEvent::LocationChange(location))
            }
            SessionEvent::ProgressChanged(progress) => {
                self.events.emit(ViewEvent::RouteProgressChange(progress))
            }
            SessionEvent::Arrived => self.events.emit(ViewEvent::Arrive),
            SessionEvent::Rerouted => self.events.emit(ViewEvent::Reroute),
            SessionEvent::Cancelled => self.stop_navigation(StopReason::UserCancelled),
        }
    }

    fn user_location(&mut self, listener: ListenerId, location: Location) {
        let Some(handle) = self.map.as_ref().map(|m| m.handle) else {
            return;
        };
        if !self.follow.accepts(listener) {
            tracing::debug!(listener = listener.0, "Location from detached listener");
            return;
        }
        if self.tracking || self.navigation.owns_camera() {
            return;
        }
        if let Some(frame) = self.camera.follow_frame(&location) {
            let ease = self.camera.settings().follow_ease;
            self.camera
                .apply_with(frame, CameraTransition::Ease(ease), self.engine.as_mut(), handle);
        }
    }

    fn spawn<F, T>(&self, future: F, into_message: impl FnOnce(T) -> ViewMessage + Send + 'static)
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        match self.tx.upgrade() {
            Some(tx) => {
                spawn_completion(tx, future, into_message);
            }
            None => tracing::debug!("View loop gone, not spawning background work"),
        }
    }
}
