//! In-memory platform.
//!
//! Every capability records what it was asked to do into one shared state that
//! can be inspected through [`HeadlessPlatform::snapshot`]. Nothing is drawn
//! and no SDK is loaded; location fixes and session events are injected by the
//! caller through the view handle.
//!
//! # Example
//!
//! ```ignore
//! let platform = HeadlessPlatform::new();
//! let routing = ScriptedRouting::new();
//! routing.push(Ok(response));
//!
//! let (handle, _task) = spawn_view(platform.platform(routing, StaticImageResolver::new()), ...);
//! // ... drive the view ...
//! assert_eq!(platform.snapshot().sessions_started, 1);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;

use crate::annotation::{Annotation, AnnotationId, AnnotationKind};
use crate::error::{ImageError, RoutingError};
use crate::geometry::{CameraFrame, Viewport};
use crate::navigation::{RouteRequest, RouteResponse, SessionId, SessionOptions};

use super::{
    AnnotationManager, CameraTransition, Image, ImageResolver, ListenerId, MapEngine, MapHandle,
    NavigationSdk, Platform, PlatformProfile, PuckOptions, RoutingService, SessionHandle,
};

/// Everything the headless platform has recorded so far.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSnapshot {
    pub maps_created: usize,
    pub maps_destroyed: usize,
    pub access_tokens: Vec<Option<String>>,
    pub viewport: Option<Viewport>,
    pub styles: Vec<String>,
    pub camera_calls: Vec<(CameraFrame, CameraTransition)>,
    /// Point annotations currently on the map.
    pub points: Vec<Annotation>,
    /// Line annotations currently on the map.
    pub lines: Vec<Annotation>,
    pub point_replacements: usize,
    pub line_replacements: usize,
    pub icons_set: usize,
    pub puck: Option<PuckOptions>,
    /// Listeners currently registered.
    pub listeners: Vec<ListenerId>,
    pub active_listeners: usize,
    pub listeners_added: usize,
    pub sessions_started: usize,
    pub sessions_stopped: usize,
    pub session_ui_detached: usize,
    pub last_session: Option<(SessionId, SessionOptions)>,
}

impl HeadlessSnapshot {
    /// The last camera handed to the engine.
    pub fn last_camera(&self) -> Option<&CameraFrame> {
        self.camera_calls.last().map(|(frame, _)| frame)
    }
}

type SharedState = Arc<Mutex<HeadlessSnapshot>>;

/// Recording platform backing tests and the replay CLI.
#[derive(Debug, Clone, Default)]
pub struct HeadlessPlatform {
    state: SharedState,
}

impl HeadlessPlatform {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> HeadlessSnapshot {
        self.state.lock().clone()
    }

    /// Map engine writing into this recorder.
    pub fn map_engine(&self) -> HeadlessMapEngine {
        HeadlessMapEngine {
            state: Arc::clone(&self.state),
            next_map: 0,
            next_listener: 0,
        }
    }

    /// Navigation SDK writing into this recorder.
    pub fn navigation_sdk(&self) -> HeadlessNavigationSdk {
        HeadlessNavigationSdk {
            state: Arc::clone(&self.state),
        }
    }

    /// Bundle this recorder with the given routing and image collaborators.
    pub fn platform(
        &self,
        routing: impl RoutingService + 'static,
        images: impl ImageResolver + 'static,
        profile: PlatformProfile,
    ) -> Platform {
        Platform {
            engine: Box::new(self.map_engine()),
            routing: Arc::new(routing),
            navigation: Box::new(self.navigation_sdk()),
            images: Arc::new(images),
            profile,
        }
    }
}

/// Recording [`MapEngine`].
#[derive(Debug)]
pub struct HeadlessMapEngine {
    state: SharedState,
    next_map: u64,
    next_listener: u64,
}

impl MapEngine for HeadlessMapEngine {
    fn create_map(&mut self, access_token: Option<&str>, viewport: Viewport) -> MapHandle {
        self.next_map += 1;
        let mut state = self.state.lock();
        state.maps_created += 1;
        state.access_tokens.push(access_token.map(str::to_string));
        state.viewport = Some(viewport);
        MapHandle(self.next_map)
    }

    fn destroy_map(&mut self, _map: MapHandle) {
        let mut state = self.state.lock();
        state.maps_destroyed += 1;
        state.points.clear();
        state.lines.clear();
        state.puck = None;
    }

    fn load_style(&mut self, _map: MapHandle, uri: &str) {
        self.state.lock().styles.push(uri.to_string());
    }

    fn set_camera(&mut self, _map: MapHandle, frame: &CameraFrame, transition: CameraTransition) {
        self.state.lock().camera_calls.push((*frame, transition));
    }

    fn create_annotation_manager(
        &mut self,
        _map: MapHandle,
        kind: AnnotationKind,
    ) -> Box<dyn AnnotationManager> {
        Box::new(HeadlessAnnotationManager {
            kind,
            state: Arc::clone(&self.state),
        })
    }

    fn set_location_puck(&mut self, _map: MapHandle, options: &PuckOptions) {
        self.state.lock().puck = Some(options.clone());
    }

    fn add_location_listener(&mut self, _map: MapHandle) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        let mut state = self.state.lock();
        state.listeners.push(id);
        state.active_listeners = state.listeners.len();
        state.listeners_added += 1;
        id
    }

    fn remove_location_listener(&mut self, _map: MapHandle, listener: ListenerId) {
        let mut state = self.state.lock();
        state.listeners.retain(|l| *l != listener);
        state.active_listeners = state.listeners.len();
    }
}

/// Recording [`AnnotationManager`] for one kind.
#[derive(Debug)]
pub struct HeadlessAnnotationManager {
    kind: AnnotationKind,
    state: SharedState,
}

impl AnnotationManager for HeadlessAnnotationManager {
    fn replace_all(&mut self, items: &[Annotation]) {
        let mut state = self.state.lock();
        match self.kind {
            AnnotationKind::Point => {
                state.points = items.to_vec();
                state.point_replacements += 1;
            }
            AnnotationKind::Polyline => {
                state.lines = items.to_vec();
                state.line_replacements += 1;
            }
        }
    }

    fn set_icon(&mut self, id: AnnotationId, image: &Image) {
        let mut state = self.state.lock();
        state.icons_set += 1;
        if let Some(Annotation::Point(point)) = state.points.get_mut(id.0) {
            point.icon = Some(image.clone());
        }
    }
}

/// Recording [`NavigationSdk`].
#[derive(Debug)]
pub struct HeadlessNavigationSdk {
    state: SharedState,
}

impl NavigationSdk for HeadlessNavigationSdk {
    fn start_session(
        &mut self,
        _map: MapHandle,
        session: SessionId,
        _response: &RouteResponse,
        options: &SessionOptions,
    ) -> Box<dyn SessionHandle> {
        let mut state = self.state.lock();
        state.sessions_started += 1;
        state.last_session = Some((session, options.clone()));
        Box::new(HeadlessSession {
            state: Arc::clone(&self.state),
        })
    }
}

/// Recording [`SessionHandle`]. Counts every call.
#[derive(Debug)]
pub struct HeadlessSession {
    state: SharedState,
}

impl SessionHandle for HeadlessSession {
    fn stop(&mut self) {
        self.state.lock().sessions_stopped += 1;
    }

    fn detach_ui(&mut self) {
        self.state.lock().session_ui_detached += 1;
    }
}

/// [`RoutingService`] answering from a queue of scripted results.
///
/// Clones share the queue, so results can be pushed after the service was
/// handed to a view. An empty queue answers with a service error.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRouting {
    responses: Arc<Mutex<VecDeque<Result<RouteResponse, RoutingError>>>>,
    requests: Arc<Mutex<Vec<RouteRequest>>>,
    delay: Option<Duration>,
}

impl ScriptedRouting {
    /// Create a service with an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every answer, to exercise in-flight behavior.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue the next answer.
    pub fn push(&self, result: Result<RouteResponse, RoutingError>) {
        self.responses.lock().push_back(result);
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<RouteRequest> {
        self.requests.lock().clone()
    }
}

impl RoutingService for ScriptedRouting {
    fn calculate_route(
        &self,
        request: RouteRequest,
    ) -> BoxFuture<'static, Result<RouteResponse, RoutingError>> {
        tracing::debug!(mode = %request.mode, "Scripted route requested");
        self.requests.lock().push(request);
        let result = self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(RoutingError::Service("no scripted route".to_string())));
        let delay = self.delay;

        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        }
        .boxed()
    }
}

/// [`ImageResolver`] backed by in-memory tables.
#[derive(Debug, Clone, Default)]
pub struct StaticImageResolver {
    local: HashMap<String, Image>,
    remote: HashMap<String, Image>,
    delay: Option<Duration>,
}

impl StaticImageResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bundled resource.
    pub fn with_local(mut self, name: impl Into<String>, image: Image) -> Self {
        self.local.insert(name.into(), image);
        self
    }

    /// Register a remote image.
    pub fn with_remote(mut self, uri: impl Into<String>, image: Image) -> Self {
        self.remote.insert(uri.into(), image);
        self
    }

    /// Delay every remote fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl ImageResolver for StaticImageResolver {
    fn resolve_local(&self, name: &str) -> Option<Image> {
        self.local.get(name).cloned()
    }

    fn fetch_remote(&self, uri: &str) -> BoxFuture<'static, Result<Image, ImageError>> {
        let result = self
            .remote
            .get(uri)
            .cloned()
            .ok_or_else(|| ImageError::NotFound(uri.to_string()));
        let delay = self.delay;

        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Coordinate;
    use crate::navigation::TransportMode;

    fn request() -> RouteRequest {
        RouteRequest {
            origin: Coordinate::new(45.0, -73.0).unwrap(),
            destination: Coordinate::new(45.1, -73.1).unwrap(),
            mode: TransportMode::Walk,
            access_token: None,
        }
    }

    #[test]
    fn test_engine_records_calls() {
        let platform = HeadlessPlatform::new();
        let mut engine = platform.map_engine();

        let map = engine.create_map(Some("pk.test"), Viewport::new(100.0, 200.0));
        engine.load_style(map, "mapbox://styles/mapbox/streets-v12");
        engine.set_location_puck(
            map,
            &PuckOptions {
                enabled: true,
                image: None,
            },
        );

        let snapshot = platform.snapshot();
        assert_eq!(snapshot.maps_created, 1);
        assert_eq!(snapshot.access_tokens, vec![Some("pk.test".to_string())]);
        assert_eq!(snapshot.styles.len(), 1);
        assert!(snapshot.puck.unwrap().enabled);

        engine.destroy_map(map);
        assert_eq!(platform.snapshot().maps_destroyed, 1);
    }

    #[tokio::test]
    async fn test_scripted_routing_answers_in_order() {
        let routing = ScriptedRouting::new();
        routing.push(Ok(RouteResponse::default()));
        routing.push(Err(RoutingError::Network("offline".to_string())));

        assert!(routing.calculate_route(request()).await.is_ok());
        assert_eq!(
            routing.calculate_route(request()).await,
            Err(RoutingError::Network("offline".to_string()))
        );
        assert!(matches!(
            routing.calculate_route(request()).await,
            Err(RoutingError::Service(_))
        ));
        assert_eq!(routing.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_static_images() {
        let images = StaticImageResolver::new()
            .with_local("pin", Image::new("pin", vec![1]))
            .with_remote("https://x/y.png", Image::new("https://x/y.png", vec![2]));

        assert!(images.resolve_local("pin").is_some());
        assert!(images.resolve_local("nope").is_none());
        assert!(images.fetch_remote("https://x/y.png").await.is_ok());
        assert!(matches!(
            images.fetch_remote("https://x/z.png").await,
            Err(ImageError::NotFound(_))
        ));
    }
}
