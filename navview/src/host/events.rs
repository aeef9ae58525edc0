//! Events emitted to the host framework.

use std::fmt;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::navigation::{Location, RouteProgress};

/// An event delivered to the host, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    LocationChange(Location),
    RouteProgressChange(RouteProgress),
    Error { message: String },
    CancelNavigation,
    Arrive,
    NavigationStarted,
    Tap,
    Reroute,
}

impl ViewEvent {
    /// Event name as registered with the host framework.
    pub fn name(&self) -> &'static str {
        match self {
            ViewEvent::LocationChange(_) => "onLocationChange",
            ViewEvent::RouteProgressChange(_) => "onRouteProgressChange",
            ViewEvent::Error { .. } => "onError",
            ViewEvent::CancelNavigation => "onCancelNavigation",
            ViewEvent::Arrive => "onArrive",
            ViewEvent::NavigationStarted => "onNavigationStarted",
            ViewEvent::Tap => "onTap",
            ViewEvent::Reroute => "onReroute",
        }
    }

    /// JSON payload handed to the host callback.
    pub fn payload(&self) -> Value {
        match self {
            ViewEvent::LocationChange(location) => json!({
                "latitude": location.latitude,
                "longitude": location.longitude,
                "heading": location.heading,
            }),
            ViewEvent::RouteProgressChange(progress) => json!({
                "distanceTraveled": progress.distance_traveled,
                "durationRemaining": progress.duration_remaining,
                "fractionTraveled": progress.fraction_traveled,
                "distanceRemaining": progress.distance_remaining,
            }),
            ViewEvent::Error { message } => json!({ "message": message }),
            ViewEvent::Tap => json!({ "message": "" }),
            ViewEvent::CancelNavigation
            | ViewEvent::Arrive
            | ViewEvent::NavigationStarted
            | ViewEvent::Reroute => json!({}),
        }
    }

    /// `{ "event": name, "payload": ... }`, one line per event in the replay CLI.
    pub fn to_json(&self) -> Value {
        json!({ "event": self.name(), "payload": self.payload() })
    }
}

impl fmt::Display for ViewEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name(), self.payload())
    }
}

/// Receiver of view events.
pub trait EventSink: Send {
    /// Deliver one event. Must not block.
    fn emit(&self, event: ViewEvent);
}

/// [`EventSink`] forwarding into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<ViewEvent>,
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: ViewEvent) {
        tracing::debug!(event = event.name(), "Emitting view event");
        if self.tx.send(event).is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }
}

/// Create a channel-backed sink and its receiving end.
pub fn event_channel() -> (ChannelEventSink, mpsc::UnboundedReceiver<ViewEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelEventSink { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(ViewEvent::NavigationStarted.name(), "onNavigationStarted");
        assert_eq!(ViewEvent::CancelNavigation.name(), "onCancelNavigation");
        assert_eq!(
            ViewEvent::Error {
                message: "x".to_string()
            }
            .name(),
            "onError"
        );
    }

    #[test]
    fn test_payload_shapes() {
        assert_eq!(ViewEvent::Tap.payload(), json!({ "message": "" }));
        assert_eq!(
            ViewEvent::Error {
                message: "No route found".to_string()
            }
            .payload(),
            json!({ "message": "No route found" })
        );

        let progress = ViewEvent::RouteProgressChange(RouteProgress {
            distance_traveled: 100.0,
            duration_remaining: 60.0,
            fraction_traveled: 0.25,
            distance_remaining: 300.0,
        });
        assert_eq!(progress.payload()["fractionTraveled"], json!(0.25));
    }

    #[test]
    fn test_channel_sink_preserves_order() {
        let (sink, mut rx) = event_channel();
        sink.emit(ViewEvent::NavigationStarted);
        sink.emit(ViewEvent::Arrive);

        assert_eq!(rx.try_recv().unwrap(), ViewEvent::NavigationStarted);
        assert_eq!(rx.try_recv().unwrap(), ViewEvent::Arrive);
        assert!(rx.try_recv().is_err());
    }
}
