//! Navigation session lifecycle.
//!
//! # State Machine
//!
//! ```text
//! Idle --[start, endpoints valid]--> Requesting
//! Requesting --[route ok, >= 1 route]--> Active
//! Requesting --[route error]--> Idle (one onError)
//! Requesting --[route ok, 0 routes]--> Idle (no event)
//! Requesting --[stop / destination invalid / teardown]--> Idle (request invalidated)
//! Active --[stop / destination invalid / user cancel / teardown]--> Idle
//! ```
//!
//! The controller is the sole owner of the running session. It never spawns
//! work itself: [`NavigationSessionController::start`] hands back a
//! [`PendingRoute`] that the host runs in the background and feeds back via
//! [`NavigationSessionController::complete`]. Every completion carries the
//! generation it was issued under, so results that arrive after a stop or a
//! newer start are ignored.

mod route;
mod session;

pub use route::{Route, RouteRequest, RouteResponse, TransportMode};
pub use session::{
    Location, NavigationSession, RouteLineStyle, RouteProgress, SessionEvent, SessionId,
    SessionOptions, DEFAULT_SIMULATION_SPEED, ROUTE_CASING_COLOR,
};

use std::fmt;

use crate::coord::Coordinate;
use crate::error::RoutingError;
use crate::platform::{MapHandle, NavigationSdk, SessionHandle};
use crate::task::{Generation, GenerationCounter};

/// Externally visible controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationState {
    /// No session and no request in flight.
    Idle,
    /// Waiting for the routing collaborator.
    Requesting,
    /// Guidance running; the session owns the camera.
    Active,
}

impl NavigationState {
    /// Short label for logs and the CLI.
    pub fn display_status(&self) -> &'static str {
        match self {
            NavigationState::Idle => "idle",
            NavigationState::Requesting => "requesting route",
            NavigationState::Active => "navigating",
        }
    }
}

/// Why a session (or request) is being ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stopNavigation` command.
    Command,
    /// Destination prop no longer holds two valid components.
    DestinationInvalid,
    /// Dismissed from the SDK's own UI.
    UserCancelled,
    /// Host view detached.
    Teardown,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::Command => "command",
            StopReason::DestinationInvalid => "destination invalid",
            StopReason::UserCancelled => "user cancelled",
            StopReason::Teardown => "teardown",
        };
        f.write_str(s)
    }
}

/// Inputs of a start command, taken from the current props.
#[derive(Debug, Clone, PartialEq)]
pub struct StartRequest {
    pub origin: Option<Coordinate>,
    pub destination: Option<Coordinate>,
    pub mode: TransportMode,
    pub access_token: Option<String>,
    pub simulate: bool,
}

/// A route request the host must run in the background.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRoute {
    pub generation: Generation,
    pub request: RouteRequest,
}

/// Result of feeding a routing completion back.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Session started; emit `onNavigationStarted`.
    Started(SessionId),
    /// Routing failed; emit `onError` with this message.
    Failed(String),
    /// Routing succeeded without any route; the request stays pending.
    NoRoutes,
    /// Completion belonged to a superseded request.
    Stale,
}

/// Result of a stop.
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// Nothing was running.
    NotRunning,
    /// An in-flight request was invalidated.
    RequestCancelled,
    /// An active session was released.
    Ended(NavigationSession),
}

struct ActiveSession {
    session: NavigationSession,
    handle: Box<dyn SessionHandle>,
}

enum Phase {
    Idle,
    Requesting {
        generation: Generation,
        request: RouteRequest,
        simulate: bool,
    },
    Active(ActiveSession),
}

/// Drives route request, session start and teardown.
pub struct NavigationSessionController {
    phase: Phase,
    generations: GenerationCounter,
    route_line: Option<RouteLineStyle>,
}

impl fmt::Debug for NavigationSessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationSessionController")
            .field("state", &self.state())
            .field("generation", &self.generations.current())
            .finish_non_exhaustive()
    }
}

impl Default for NavigationSessionController {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationSessionController {
    /// Create an idle controller.
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            generations: GenerationCounter::new(),
            route_line: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> NavigationState {
        match self.phase {
            Phase::Idle => NavigationState::Idle,
            Phase::Requesting { .. } => NavigationState::Requesting,
            Phase::Active(_) => NavigationState::Active,
        }
    }

    /// Whether the session currently owns the camera.
    pub fn owns_camera(&self) -> bool {
        matches!(self.phase, Phase::Active(_))
    }

    /// The running session, if any.
    pub fn session(&self) -> Option<&NavigationSession> {
        match &self.phase {
            Phase::Active(active) => Some(&active.session),
            _ => None,
        }
    }

    /// Route-line overrides in effect; `None` outside a session.
    pub fn route_line_override(&self) -> Option<&RouteLineStyle> {
        self.route_line.as_ref()
    }

    /// Handle a start command.
    ///
    /// Invalid or missing endpoints make this a silent no-op, as does a start
    /// while a request or session is already running.
    pub fn start(&mut self, start: StartRequest) -> Option<PendingRoute> {
        if !matches!(self.phase, Phase::Idle) {
            tracing::debug!(state = ?self.state(), "Start ignored, navigation already running");
            return None;
        }

        let (origin, destination) = match (start.origin, start.destination) {
            (Some(origin), Some(destination)) => (origin, destination),
            (origin, destination) => {
                tracing::debug!(
                    has_origin = origin.is_some(),
                    has_destination = destination.is_some(),
                    "Start ignored, origin or destination missing"
                );
                return None;
            }
        };

        let generation = self.generations.advance();
        let request = RouteRequest {
            origin,
            destination,
            mode: start.mode,
            access_token: start.access_token,
        };

        tracing::info!(
            %generation,
            %origin,
            %destination,
            mode = %start.mode,
            "Requesting route"
        );

        self.phase = Phase::Requesting {
            generation,
            request: request.clone(),
            simulate: start.simulate,
        };

        Some(PendingRoute {
            generation,
            request,
        })
    }

    /// Feed a routing completion back into the state machine.
    pub fn complete(
        &mut self,
        generation: Generation,
        result: Result<RouteResponse, RoutingError>,
        sdk: &mut dyn NavigationSdk,
        map: MapHandle,
        options: &SessionOptions,
    ) -> RouteOutcome {
        let current = matches!(
            self.phase,
            Phase::Requesting { generation: g, .. } if g == generation
        );
        if !current || !self.generations.is_current(generation) {
            tracing::debug!(%generation, "Discarding stale route completion");
            return RouteOutcome::Stale;
        }

        // Zero routes: no transition. The request stays pending until stopped.
        if matches!(&result, Ok(response) if response.routes.is_empty()) {
            tracing::warn!(%generation, "Route calculation returned no routes");
            return RouteOutcome::NoRoutes;
        }

        let Phase::Requesting {
            request, simulate, ..
        } = std::mem::replace(&mut self.phase, Phase::Idle)
        else {
            return RouteOutcome::Stale;
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%generation, error = %e, "Route calculation failed");
                return RouteOutcome::Failed(e.to_string());
            }
        };

        let handle = sdk.start_session(map, generation, &response, options);
        let session = NavigationSession {
            id: generation,
            origin: request.origin,
            destination: request.destination,
            transport_mode: request.mode,
            simulate,
            route: response,
        };

        tracing::info!(
            %generation,
            routes = session.route.routes.len(),
            simulate,
            "Navigation session started"
        );

        self.route_line = Some(options.route_line);
        self.phase = Phase::Active(ActiveSession { session, handle });
        RouteOutcome::Started(generation)
    }

    /// End whatever is running. Safe to call in any state, any number of times.
    pub fn stop(&mut self, reason: StopReason) -> StopOutcome {
        // Clear navigation-only visuals unconditionally.
        self.route_line = None;

        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => StopOutcome::NotRunning,
            Phase::Requesting { generation, .. } => {
                // Invalidate the in-flight request so its completion is ignored.
                self.generations.advance();
                tracing::info!(%generation, %reason, "Route request abandoned");
                StopOutcome::RequestCancelled
            }
            Phase::Active(ActiveSession {
                session,
                mut handle,
            }) => {
                handle.stop();
                handle.detach_ui();
                self.generations.advance();
                tracing::info!(session = %session.id, %reason, "Navigation session stopped");
                StopOutcome::Ended(session)
            }
        }
    }

    /// Filter a session event: returns it only if it belongs to the running session.
    pub fn accept_event(&self, session: SessionId, event: SessionEvent) -> Option<SessionEvent> {
        match &self.phase {
            Phase::Active(active) if active.session.id == session => Some(event),
            _ => {
                tracing::debug!(%session, ?event, "Dropping event from inactive session");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::headless::HeadlessPlatform;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn start_request() -> StartRequest {
        StartRequest {
            origin: Some(coord(45.0, -73.0)),
            destination: Some(coord(45.1, -73.1)),
            mode: TransportMode::Drive,
            access_token: Some("nav-token".to_string()),
            simulate: true,
        }
    }

    fn options() -> SessionOptions {
        SessionOptions {
            simulate: true,
            simulation_speed: DEFAULT_SIMULATION_SPEED,
            shows_end_of_route_feedback: false,
            style_url: None,
            user_puck: None,
            destination_marker: None,
            route_line: RouteLineStyle::default(),
        }
    }

    fn one_route() -> RouteResponse {
        RouteResponse {
            routes: vec![Route {
                distance: 1500.0,
                expected_travel_time: 300.0,
                geometry: vec![coord(45.0, -73.0), coord(45.1, -73.1)],
            }],
        }
    }

    #[test]
    fn test_initial_state_is_idle() {
        let controller = NavigationSessionController::new();
        assert_eq!(controller.state(), NavigationState::Idle);
        assert!(!controller.owns_camera());
        assert!(controller.route_line_override().is_none());
    }

    #[test]
    fn test_start_without_destination_is_noop() {
        let mut controller = NavigationSessionController::new();
        let pending = controller.start(StartRequest {
            destination: None,
            ..start_request()
        });
        assert!(pending.is_none());
        assert_eq!(controller.state(), NavigationState::Idle);
    }

    #[test]
    fn test_start_without_origin_is_noop() {
        let mut controller = NavigationSessionController::new();
        assert!(controller
            .start(StartRequest {
                origin: None,
                ..start_request()
            })
            .is_none());
        assert_eq!(controller.state(), NavigationState::Idle);
    }

    #[test]
    fn test_start_transitions_to_requesting() {
        let mut controller = NavigationSessionController::new();
        let pending = controller.start(start_request()).unwrap();

        assert_eq!(controller.state(), NavigationState::Requesting);
        assert_eq!(pending.request.mode, TransportMode::Drive);
        assert_eq!(pending.request.origin, coord(45.0, -73.0));
        assert_eq!(pending.request.access_token.as_deref(), Some("nav-token"));
    }

    #[test]
    fn test_second_start_while_requesting_is_ignored() {
        let mut controller = NavigationSessionController::new();
        controller.start(start_request()).unwrap();
        assert!(controller.start(start_request()).is_none());
        assert_eq!(controller.state(), NavigationState::Requesting);
    }

    #[test]
    fn test_route_success_activates_session() {
        let platform = HeadlessPlatform::new();
        let mut sdk = platform.navigation_sdk();
        let mut controller = NavigationSessionController::new();
        let pending = controller.start(start_request()).unwrap();

        let outcome = controller.complete(
            pending.generation,
            Ok(one_route()),
            &mut sdk,
            MapHandle(1),
            &options(),
        );

        assert_eq!(outcome, RouteOutcome::Started(pending.generation));
        assert_eq!(controller.state(), NavigationState::Active);
        assert!(controller.owns_camera());
        assert_eq!(controller.session().unwrap().transport_mode, TransportMode::Drive);
        assert!(controller.route_line_override().is_some());
        assert_eq!(platform.snapshot().sessions_started, 1);
    }

    #[test]
    fn test_route_failure_returns_to_idle() {
        let platform = HeadlessPlatform::new();
        let mut sdk = platform.navigation_sdk();
        let mut controller = NavigationSessionController::new();
        let pending = controller.start(start_request()).unwrap();

        let outcome = controller.complete(
            pending.generation,
            Err(RoutingError::Service("No route found".to_string())),
            &mut sdk,
            MapHandle(1),
            &options(),
        );

        assert_eq!(outcome, RouteOutcome::Failed("No route found".to_string()));
        assert_eq!(controller.state(), NavigationState::Idle);
        assert_eq!(platform.snapshot().sessions_started, 0);
    }

    #[test]
    fn test_zero_routes_keep_request_pending_until_stopped() {
        let platform = HeadlessPlatform::new();
        let mut sdk = platform.navigation_sdk();
        let mut controller = NavigationSessionController::new();
        let pending = controller.start(start_request()).unwrap();

        let outcome = controller.complete(
            pending.generation,
            Ok(RouteResponse::default()),
            &mut sdk,
            MapHandle(1),
            &options(),
        );

        assert_eq!(outcome, RouteOutcome::NoRoutes);
        assert_eq!(controller.state(), NavigationState::Requesting);
        assert!(controller.start(start_request()).is_none());
        assert_eq!(platform.snapshot().sessions_started, 0);

        assert_eq!(
            controller.stop(StopReason::Command),
            StopOutcome::RequestCancelled
        );
        assert_eq!(controller.state(), NavigationState::Idle);
        assert!(controller.start(start_request()).is_some());
    }

    #[test]
    fn test_completion_after_stop_is_stale() {
        let platform = HeadlessPlatform::new();
        let mut sdk = platform.navigation_sdk();
        let mut controller = NavigationSessionController::new();
        let pending = controller.start(start_request()).unwrap();

        assert_eq!(
            controller.stop(StopReason::Command),
            StopOutcome::RequestCancelled
        );
        let outcome = controller.complete(
            pending.generation,
            Ok(one_route()),
            &mut sdk,
            MapHandle(1),
            &options(),
        );

        assert_eq!(outcome, RouteOutcome::Stale);
        assert_eq!(controller.state(), NavigationState::Idle);
        assert_eq!(platform.snapshot().sessions_started, 0);
    }

    #[test]
    fn test_completion_of_previous_request_is_stale() {
        let platform = HeadlessPlatform::new();
        let mut sdk = platform.navigation_sdk();
        let mut controller = NavigationSessionController::new();
        let first = controller.start(start_request()).unwrap();
        controller.stop(StopReason::Command);
        let second = controller.start(start_request()).unwrap();

        let stale = controller.complete(
            first.generation,
            Ok(one_route()),
            &mut sdk,
            MapHandle(1),
            &options(),
        );
        assert_eq!(stale, RouteOutcome::Stale);
        assert_eq!(controller.state(), NavigationState::Requesting);

        let fresh = controller.complete(
            second.generation,
            Ok(one_route()),
            &mut sdk,
            MapHandle(1),
            &options(),
        );
        assert_eq!(fresh, RouteOutcome::Started(second.generation));
    }

    #[test]
    fn test_stop_releases_session_once() {
        let platform = HeadlessPlatform::new();
        let mut sdk = platform.navigation_sdk();
        let mut controller = NavigationSessionController::new();
        let pending = controller.start(start_request()).unwrap();
        controller.complete(
            pending.generation,
            Ok(one_route()),
            &mut sdk,
            MapHandle(1),
            &options(),
        );

        let outcome = controller.stop(StopReason::DestinationInvalid);
        assert!(matches!(outcome, StopOutcome::Ended(_)));
        assert_eq!(controller.state(), NavigationState::Idle);
        assert!(controller.route_line_override().is_none());

        assert_eq!(controller.stop(StopReason::Command), StopOutcome::NotRunning);

        let snapshot = platform.snapshot();
        assert_eq!(snapshot.sessions_stopped, 1);
        assert_eq!(snapshot.session_ui_detached, 1);
    }

    #[test]
    fn test_stop_from_idle_is_noop() {
        let mut controller = NavigationSessionController::new();
        assert_eq!(controller.stop(StopReason::Teardown), StopOutcome::NotRunning);
        assert_eq!(controller.stop(StopReason::Command), StopOutcome::NotRunning);
        assert_eq!(controller.state(), NavigationState::Idle);
    }

    #[test]
    fn test_events_only_accepted_from_running_session() {
        let platform = HeadlessPlatform::new();
        let mut sdk = platform.navigation_sdk();
        let mut controller = NavigationSessionController::new();
        let pending = controller.start(start_request()).unwrap();

        assert!(controller
            .accept_event(pending.generation, SessionEvent::Arrived)
            .is_none());

        controller.complete(
            pending.generation,
            Ok(one_route()),
            &mut sdk,
            MapHandle(1),
            &options(),
        );
        assert_eq!(
            controller.accept_event(pending.generation, SessionEvent::Arrived),
            Some(SessionEvent::Arrived)
        );

        controller.stop(StopReason::Command);
        assert!(controller
            .accept_event(pending.generation, SessionEvent::Rerouted)
            .is_none());
    }
}
