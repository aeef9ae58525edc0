//! Follow-user mode.

use crate::platform::{ListenerId, MapEngine, MapHandle};

/// Keeps at most one location listener registered on a map.
#[derive(Debug, Default)]
pub struct FollowUser {
    listener: Option<ListenerId>,
}

impl FollowUser {
    /// Start disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a listener is registered.
    pub fn is_active(&self) -> bool {
        self.listener.is_some()
    }

    /// Attach or detach the listener. Returns whether anything changed.
    pub fn set_enabled(&mut self, enabled: bool, engine: &mut dyn MapEngine, map: MapHandle) -> bool {
        match (enabled, self.listener) {
            (true, None) => {
                let id = engine.add_location_listener(map);
                tracing::debug!(%map, listener = id.0, "Follow-user enabled");
                self.listener = Some(id);
                true
            }
            (false, Some(id)) => {
                engine.remove_location_listener(map, id);
                tracing::debug!(%map, listener = id.0, "Follow-user disabled");
                self.listener = None;
                true
            }
            _ => false,
        }
    }

    /// Whether an update from `listener` should move the camera.
    pub fn accepts(&self, listener: ListenerId) -> bool {
        self.listener == Some(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Viewport;
    use crate::platform::headless::HeadlessPlatform;

    #[test]
    fn test_toggling_keeps_single_listener() {
        let platform = HeadlessPlatform::new();
        let mut engine = platform.map_engine();
        let map = engine.create_map(None, Viewport::default());
        let mut follow = FollowUser::new();

        assert!(follow.set_enabled(true, &mut engine, map));
        assert!(!follow.set_enabled(true, &mut engine, map));
        assert_eq!(platform.snapshot().active_listeners, 1);

        assert!(follow.set_enabled(false, &mut engine, map));
        assert!(!follow.set_enabled(false, &mut engine, map));
        assert_eq!(platform.snapshot().active_listeners, 0);

        for _ in 0..5 {
            follow.set_enabled(true, &mut engine, map);
            follow.set_enabled(false, &mut engine, map);
        }
        follow.set_enabled(true, &mut engine, map);
        assert_eq!(platform.snapshot().active_listeners, 1);
        assert!(follow.is_active());
    }

    #[test]
    fn test_accepts_only_current_listener() {
        let platform = HeadlessPlatform::new();
        let mut engine = platform.map_engine();
        let map = engine.create_map(None, Viewport::default());
        let mut follow = FollowUser::new();

        follow.set_enabled(true, &mut engine, map);
        let snapshot = platform.snapshot();
        let current = snapshot.listeners[0];
        assert!(follow.accepts(current));
        assert!(!follow.accepts(ListenerId(current.0 + 100)));
    }
}
