//! Integration tests for the view host.
//!
//! These tests drive a complete view through its handle, on the headless
//! platform:
//! - props → annotation sync → camera fit
//! - start/stop commands → routing → navigation session lifecycle
//! - background completions arriving late
//! - follow-user listener bookkeeping
//!
//! Run with: `cargo test --test view_host_integration`

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use navview::annotation::MarkerProp;
use navview::coord::Coordinate;
use navview::error::{RoutingError, ViewError};
use navview::geometry::Viewport;
use navview::host::{event_channel, spawn_view, PropsPatch, ViewCommand, ViewEvent, ViewHandle};
use navview::host::ViewSettings;
use navview::navigation::{
    Location, NavigationState, Route, RouteProgress, RouteResponse, SessionEvent, TransportMode,
};
use navview::platform::headless::{HeadlessPlatform, ScriptedRouting, StaticImageResolver};
use navview::platform::{CameraTransition, Image, ImageRef, PlatformProfile};

// ============================================================================
// Helper Functions
// ============================================================================

struct TestView {
    view: ViewHandle,
    task: JoinHandle<()>,
    recorder: HeadlessPlatform,
    routing: ScriptedRouting,
    events: UnboundedReceiver<ViewEvent>,
}

fn setup_with(routing: ScriptedRouting, images: StaticImageResolver) -> TestView {
    let recorder = HeadlessPlatform::new();
    let platform = recorder.platform(routing.clone(), images, PlatformProfile::Ios);
    let (sink, events) = event_channel();
    let (view, task) = spawn_view(platform, ViewSettings::default(), sink);
    TestView {
        view,
        task,
        recorder,
        routing,
        events,
    }
}

fn setup() -> TestView {
    setup_with(ScriptedRouting::new(), StaticImageResolver::new())
}

fn viewport() -> Viewport {
    Viewport::new(390.0, 844.0)
}

fn coord(lat: f64, lon: f64) -> Coordinate {
    Coordinate::new(lat, lon).unwrap()
}

fn one_route() -> RouteResponse {
    RouteResponse {
        routes: vec![Route {
            distance: 14_000.0,
            expected_travel_time: 900.0,
            geometry: vec![coord(45.0, -73.0), coord(45.1, -73.1)],
        }],
    }
}

fn patch(json: &str) -> PropsPatch {
    serde_json::from_str(json).unwrap()
}

fn marker(lat: f64, lon: f64) -> MarkerProp {
    MarkerProp {
        latitude: Some(lat),
        longitude: Some(lon),
        image: None,
    }
}

/// Poll the view until it reaches `state`.
async fn wait_for_state(view: &ViewHandle, state: NavigationState) {
    for _ in 0..200 {
        if view.status().await.unwrap().navigation == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("view never reached {:?}", state);
}

/// Let spawned completions land, then make sure the loop processed them.
async fn settle(view: &ViewHandle) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    view.status().await.unwrap();
}

fn drain(events: &mut UnboundedReceiver<ViewEvent>) -> Vec<ViewEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

/// Lay out a view with a drive route and start navigating.
async fn start_active_session(t: &mut TestView) {
    t.routing.push(Ok(one_route()));
    t.view
        .set_props(PropsPatch {
            transport_mode: Some(Some("drive".to_string())),
            ..PropsPatch::route([45.0, -73.0], [45.1, -73.1])
        })
        .unwrap();
    t.view.layout(viewport()).unwrap();
    t.view.command(ViewCommand::StartNavigation).unwrap();
    wait_for_state(&t.view, NavigationState::Active).await;
}

// ============================================================================
// Navigation Lifecycle
// ============================================================================

/// Start with valid endpoints and one mocked route reaches Active and emits
/// exactly one onNavigationStarted.
#[tokio::test]
async fn test_start_navigation_reaches_active() {
    let mut t = setup();
    start_active_session(&mut t).await;

    // A second start while Active is ignored.
    t.view.command(ViewCommand::StartNavigation).unwrap();
    settle(&t.view).await;

    let events = drain(&mut t.events);
    assert_eq!(events, vec![ViewEvent::NavigationStarted]);

    let requests = t.routing.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].mode, TransportMode::Drive);
    assert_eq!(requests[0].origin, coord(45.0, -73.0));
    assert_eq!(requests[0].destination, coord(45.1, -73.1));

    let snapshot = t.recorder.snapshot();
    assert_eq!(snapshot.sessions_started, 1);
    let (_, options) = snapshot.last_session.unwrap();
    assert_eq!(options.simulation_speed, 5.0);
    assert_eq!(options.route_line.casing_color.to_hex(), "#35A68A");
}

#[tokio::test]
async fn test_start_without_destination_is_silent() {
    let mut t = setup();
    t.view
        .set_props(patch(r#"{"origin": [45.0, -73.0]}"#))
        .unwrap();
    t.view.layout(viewport()).unwrap();
    t.view.command(ViewCommand::StartNavigation).unwrap();
    settle(&t.view).await;

    assert_eq!(t.view.status().await.unwrap().navigation, NavigationState::Idle);
    assert!(t.routing.requests().is_empty());
    assert!(drain(&mut t.events).is_empty());
}

/// Destination `[null, null]` while Active forces a stop; the session is
/// stopped exactly once.
#[tokio::test]
async fn test_invalid_destination_stops_active_session() {
    let mut t = setup();
    start_active_session(&mut t).await;
    drain(&mut t.events);

    t.view
        .set_props(patch(r#"{"destination": [null, null]}"#))
        .unwrap();
    // A second invalidation has nothing left to stop.
    t.view
        .set_props(patch(r#"{"destination": [12.0]}"#))
        .unwrap();
    settle(&t.view).await;

    assert_eq!(t.view.status().await.unwrap().navigation, NavigationState::Idle);
    let snapshot = t.recorder.snapshot();
    assert_eq!(snapshot.sessions_stopped, 1);
    assert_eq!(snapshot.session_ui_detached, 1);
    assert_eq!(drain(&mut t.events), vec![ViewEvent::CancelNavigation]);
}

#[tokio::test]
async fn test_routing_failure_emits_single_error() {
    let mut t = setup();
    t.routing
        .push(Err(RoutingError::Service("No route found".to_string())));
    t.view
        .set_props(PropsPatch::route([45.0, -73.0], [45.1, -73.1]))
        .unwrap();
    t.view.layout(viewport()).unwrap();
    t.view.command(ViewCommand::StartNavigation).unwrap();
    settle(&t.view).await;

    assert_eq!(t.view.status().await.unwrap().navigation, NavigationState::Idle);
    assert_eq!(
        drain(&mut t.events),
        vec![ViewEvent::Error {
            message: "No route found".to_string()
        }]
    );
    assert_eq!(t.recorder.snapshot().sessions_started, 0);

    // Not stuck: a later start goes through.
    t.routing.push(Ok(one_route()));
    t.view.command(ViewCommand::StartNavigation).unwrap();
    wait_for_state(&t.view, NavigationState::Active).await;
}

#[tokio::test]
async fn test_zero_routes_keep_request_pending_without_event() {
    let mut t = setup();
    t.routing.push(Ok(RouteResponse::default()));
    t.view
        .set_props(PropsPatch::route([45.0, -73.0], [45.1, -73.1]))
        .unwrap();
    t.view.layout(viewport()).unwrap();
    t.view.command(ViewCommand::StartNavigation).unwrap();
    settle(&t.view).await;

    assert_eq!(
        t.view.status().await.unwrap().navigation,
        NavigationState::Requesting
    );
    assert!(drain(&mut t.events).is_empty());
    assert_eq!(t.recorder.snapshot().sessions_started, 0);

    // A stop recovers the pending request silently; a new start then works.
    t.view.command(ViewCommand::StopNavigation).unwrap();
    assert_eq!(t.view.status().await.unwrap().navigation, NavigationState::Idle);
    assert!(drain(&mut t.events).is_empty());

    t.routing.push(Ok(one_route()));
    t.view.command(ViewCommand::StartNavigation).unwrap();
    wait_for_state(&t.view, NavigationState::Active).await;
    assert_eq!(t.routing.requests().len(), 2);
}

#[tokio::test]
async fn test_stop_while_requesting_discards_route() {
    let routing = ScriptedRouting::new().with_delay(Duration::from_millis(30));
    let mut t = setup_with(routing, StaticImageResolver::new());
    t.routing.push(Ok(one_route()));
    t.view
        .set_props(PropsPatch::route([45.0, -73.0], [45.1, -73.1]))
        .unwrap();
    t.view.layout(viewport()).unwrap();
    t.view.command(ViewCommand::StartNavigation).unwrap();
    assert_eq!(
        t.view.status().await.unwrap().navigation,
        NavigationState::Requesting
    );

    t.view.command(ViewCommand::StopNavigation).unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    settle(&t.view).await;

    assert_eq!(t.view.status().await.unwrap().navigation, NavigationState::Idle);
    assert_eq!(t.recorder.snapshot().sessions_started, 0);
    assert!(drain(&mut t.events).is_empty());
}

#[tokio::test]
async fn test_session_events_are_forwarded_in_order() {
    let mut t = setup();
    start_active_session(&mut t).await;
    drain(&mut t.events);
    let (session, _) = t.recorder.snapshot().last_session.unwrap();

    let location = Location {
        latitude: 45.05,
        longitude: -73.05,
        heading: Some(180.0),
    };
    let progress = RouteProgress {
        distance_traveled: 7_000.0,
        duration_remaining: 450.0,
        fraction_traveled: 0.5,
        distance_remaining: 7_000.0,
    };
    t.view
        .session_event(session, SessionEvent::LocationChanged(location))
        .unwrap();
    t.view
        .session_event(session, SessionEvent::ProgressChanged(progress))
        .unwrap();
    t.view.session_event(session, SessionEvent::Rerouted).unwrap();
    t.view.session_event(session, SessionEvent::Arrived).unwrap();
    settle(&t.view).await;

    assert_eq!(
        drain(&mut t.events),
        vec![
            ViewEvent::LocationChange(location),
            ViewEvent::RouteProgressChange(progress),
            ViewEvent::Reroute,
            ViewEvent::Arrive,
        ]
    );
}

#[tokio::test]
async fn test_user_cancel_ends_session() {
    let mut t = setup();
    start_active_session(&mut t).await;
    drain(&mut t.events);
    let (session, _) = t.recorder.snapshot().last_session.unwrap();

    t.view
        .session_event(session, SessionEvent::Cancelled)
        .unwrap();
    settle(&t.view).await;

    assert_eq!(t.view.status().await.unwrap().navigation, NavigationState::Idle);
    assert_eq!(drain(&mut t.events), vec![ViewEvent::CancelNavigation]);

    // Events from the ended session are dropped.
    t.view.session_event(session, SessionEvent::Arrived).unwrap();
    settle(&t.view).await;
    assert!(drain(&mut t.events).is_empty());
}

#[tokio::test]
async fn test_session_start_reloads_style() {
    let mut t = setup();
    t.view
        .set_props(patch(r#"{"styleURL": "mapbox://styles/acme/navigation"}"#))
        .unwrap();
    start_active_session(&mut t).await;

    let styles = t.recorder.snapshot().styles;
    assert_eq!(
        styles,
        vec![
            "mapbox://styles/acme/navigation".to_string(),
            "mapbox://styles/acme/navigation".to_string()
        ]
    );
}

// ============================================================================
// Annotations and Camera
// ============================================================================

/// A single marker frames the camera on the marker, inside the default padding.
#[tokio::test]
async fn test_single_marker_fit() {
    let t = setup();
    t.view
        .set_props(PropsPatch::markers(vec![marker(40.0, -74.0)]))
        .unwrap();
    t.view.layout(viewport()).unwrap();

    let status = t.view.status().await.unwrap();
    let camera = status.camera.unwrap();
    assert!((camera.center.latitude - 40.0).abs() < 1e-3);
    assert!((camera.center.longitude - (-74.0)).abs() < 1e-3);

    let padding = PlatformProfile::Ios.padding().select(false);
    assert!(camera.contains(coord(40.0, -74.0), &viewport(), &padding));

    let snapshot = t.recorder.snapshot();
    assert_eq!(snapshot.camera_calls.len(), 1);
    assert_eq!(snapshot.camera_calls[0].1, CameraTransition::Instant);
}

#[tokio::test]
async fn test_annotation_fit_instant_then_eased() {
    let t = setup();
    t.view.layout(viewport()).unwrap();
    t.view
        .set_props(patch(
            r##"{
                "markers": [{"latitude": 45.0, "longitude": -73.0}],
                "polylines": [{"coordinates": [[45.0, -73.0], [45.2, -73.3]], "color": "#FF0000"}]
            }"##,
        ))
        .unwrap();

    let status = t.view.status().await.unwrap();
    assert_eq!(status.markers, 1);
    assert_eq!(status.polylines, 1);

    let snapshot = t.recorder.snapshot();
    // The layout pass had nothing to frame.
    assert_eq!(snapshot.camera_calls.len(), 1);
    assert_eq!(
        snapshot.camera_calls[0].1,
        CameraTransition::Instant,
        "first application after layout is instant"
    );
    let padding = PlatformProfile::Ios.padding().select(false);
    let frame = snapshot.last_camera().unwrap();
    for point in [coord(45.0, -73.0), coord(45.2, -73.3)] {
        assert!(frame.contains(point, &viewport(), &padding));
    }

    t.view
        .set_props(PropsPatch::markers(vec![marker(46.0, -72.0)]))
        .unwrap();
    t.view.status().await.unwrap();
    let snapshot = t.recorder.snapshot();
    assert_eq!(snapshot.camera_calls.len(), 2);
    assert_eq!(
        snapshot.camera_calls[1].1,
        CameraTransition::Ease(Duration::from_millis(500))
    );
}

#[tokio::test]
async fn test_clearing_annotations_removes_everything() {
    let t = setup();
    t.view
        .set_props(patch(
            r#"{
                "markers": [{"latitude": 1.0, "longitude": 2.0}],
                "polylines": [{"coordinates": [[0.0, 0.0], [1.0, 1.0]]}]
            }"#,
        ))
        .unwrap();
    t.view.layout(viewport()).unwrap();
    t.view
        .set_props(patch(r#"{"markers": null, "polylines": []}"#))
        .unwrap();

    let status = t.view.status().await.unwrap();
    assert_eq!(status.markers, 0);
    assert_eq!(status.polylines, 0);

    let snapshot = t.recorder.snapshot();
    assert!(snapshot.points.is_empty());
    assert!(snapshot.lines.is_empty());
    // Empty set and no explicit center: the camera stays where it was.
    assert!(status.camera.is_some());
}

#[tokio::test]
async fn test_explicit_camera_without_annotations() {
    let t = setup();
    t.view
        .set_props(patch(r#"{"camera": {"center": [48.85, 2.35], "zoom": 11}}"#))
        .unwrap();
    t.view.layout(viewport()).unwrap();

    let camera = t.view.status().await.unwrap().camera.unwrap();
    assert_eq!(camera.center, coord(48.85, 2.35));
    assert_eq!(camera.zoom, 11.0);
    assert_eq!(camera.pitch, 0.0);
}

#[tokio::test]
async fn test_tracking_suppresses_fit() {
    let t = setup();
    t.view.layout(viewport()).unwrap();
    t.view.command(ViewCommand::StartTracking).unwrap();
    t.view
        .set_props(PropsPatch::markers(vec![marker(10.0, 10.0)]))
        .unwrap();
    t.view.status().await.unwrap();
    assert!(t.recorder.snapshot().camera_calls.is_empty());

    t.view.command(ViewCommand::StopTracking).unwrap();
    t.view
        .set_props(PropsPatch::markers(vec![marker(10.0, 10.0)]))
        .unwrap();
    t.view.status().await.unwrap();
    assert_eq!(t.recorder.snapshot().camera_calls.len(), 1);
}

/// A remote icon that completes after a newer sync must not touch the map.
#[tokio::test]
async fn test_stale_icon_completion_is_ignored() {
    let uri = "https://cdn.example.com/pin.png";
    let images = StaticImageResolver::new()
        .with_remote(uri, Image::new(uri, vec![1, 2, 3]))
        .with_delay(Duration::from_millis(20));
    let t = setup_with(ScriptedRouting::new(), images);

    t.view.layout(viewport()).unwrap();
    t.view
        .set_props(PropsPatch::markers(vec![MarkerProp {
            image: Some(ImageRef::new(uri)),
            ..marker(1.0, 2.0)
        }]))
        .unwrap();
    t.view
        .set_props(PropsPatch::markers(vec![marker(3.0, 4.0)]))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    settle(&t.view).await;

    assert_eq!(t.recorder.snapshot().icons_set, 0);
}

#[tokio::test]
async fn test_remote_icon_applies_when_current() {
    let uri = "https://cdn.example.com/pin.png";
    let images =
        StaticImageResolver::new().with_remote(uri, Image::new(uri, vec![1, 2, 3]));
    let t = setup_with(ScriptedRouting::new(), images);

    t.view.layout(viewport()).unwrap();
    t.view
        .set_props(PropsPatch::markers(vec![MarkerProp {
            image: Some(ImageRef::new(uri)),
            ..marker(1.0, 2.0)
        }]))
        .unwrap();
    settle(&t.view).await;

    assert_eq!(t.recorder.snapshot().icons_set, 1);
}

// ============================================================================
// Follow User, Puck, Taps
// ============================================================================

#[tokio::test]
async fn test_follow_user_toggling_keeps_one_listener() {
    let t = setup();
    t.view.layout(viewport()).unwrap();

    for _ in 0..3 {
        t.view.set_props(patch(r#"{"followUser": true}"#)).unwrap();
        t.view.set_props(patch(r#"{"followUser": true}"#)).unwrap();
        t.view.set_props(patch(r#"{"followUser": false}"#)).unwrap();
    }
    t.view.status().await.unwrap();
    assert_eq!(t.recorder.snapshot().active_listeners, 0);

    t.view.set_props(patch(r#"{"followUser": true}"#)).unwrap();
    let status = t.view.status().await.unwrap();
    assert!(status.following);
    let snapshot = t.recorder.snapshot();
    assert_eq!(snapshot.active_listeners, 1);
    assert_eq!(snapshot.listeners_added, 4);
}

#[tokio::test]
async fn test_follow_user_eases_to_location() {
    let t = setup();
    t.view.set_props(patch(r#"{"followUser": true}"#)).unwrap();
    t.view.layout(viewport()).unwrap();
    t.view.status().await.unwrap();
    let listener = t.recorder.snapshot().listeners[0];

    t.view
        .user_location(
            listener,
            Location {
                latitude: 52.52,
                longitude: 13.40,
                heading: Some(90.0),
            },
        )
        .unwrap();
    t.view.status().await.unwrap();

    let snapshot = t.recorder.snapshot();
    let (frame, transition) = snapshot.camera_calls.last().unwrap();
    assert_eq!(frame.center, coord(52.52, 13.40));
    assert_eq!(frame.zoom, 15.0);
    assert_eq!(frame.bearing, Some(90.0));
    assert_eq!(*transition, CameraTransition::Ease(Duration::from_millis(1300)));
}

#[tokio::test]
async fn test_puck_uses_local_locator_image() {
    let images = StaticImageResolver::new().with_local("puck", Image::new("puck", vec![7]));
    let t = setup_with(ScriptedRouting::new(), images);
    t.view
        .set_props(patch(
            r#"{"showUserLocation": true, "userLocatorMap": {"uri": "puck"}}"#,
        ))
        .unwrap();
    t.view.layout(viewport()).unwrap();
    t.view.status().await.unwrap();

    let puck = t.recorder.snapshot().puck.unwrap();
    assert!(puck.enabled);
    assert_eq!(puck.image.unwrap().name, "puck");
}

#[tokio::test]
async fn test_tap_emits_empty_message() {
    let mut t = setup();
    t.view.layout(viewport()).unwrap();
    t.view.tap().unwrap();
    t.view.status().await.unwrap();

    let events = drain(&mut t.events);
    assert_eq!(events, vec![ViewEvent::Tap]);
    assert_eq!(events[0].payload(), serde_json::json!({ "message": "" }));
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn test_detach_releases_everything() {
    let mut t = setup();
    t.view.set_props(patch(r#"{"followUser": true}"#)).unwrap();
    start_active_session(&mut t).await;

    t.view.detach().unwrap();
    (&mut t.task).await.unwrap();

    let snapshot = t.recorder.snapshot();
    assert_eq!(snapshot.sessions_stopped, 1);
    assert_eq!(snapshot.maps_destroyed, 1);
    assert_eq!(snapshot.active_listeners, 0);
    assert_eq!(t.view.tap(), Err(ViewError::Closed));
}

#[tokio::test]
async fn test_dropping_handles_tears_down() {
    let t = setup();
    t.view.layout(viewport()).unwrap();
    t.view.status().await.unwrap();

    let TestView {
        view, task, recorder, ..
    } = t;
    drop(view);
    task.await.unwrap();

    assert_eq!(recorder.snapshot().maps_destroyed, 1);
}
