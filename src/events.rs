use std::collections::VecDeque;

use bevy::prelude::*;
use serde::Serialize;

const MAX_EVENTS: usize = 500;

/// One overworld event as seen by the camera and the HTTP API.
#[derive(Serialize, Clone, Debug)]
pub struct GameEvent {
    pub name: String,
    pub data: serde_json::Value,
    pub frame: u64,
}

/// Bounded history of session events. The session forwarder advances `frame`
/// once per fixed tick.
#[derive(Resource, Default)]
pub struct GameEventBus {
    pub recent: VecDeque<GameEvent>,
    pub frame: u64,
    pub dropped_events: u64,
    last_overflow_log_frame: u64,
}

impl GameEventBus {
    pub fn emit(&mut self, name: impl Into<String>, data: serde_json::Value) {
        self.recent.push_back(GameEvent {
            name: name.into(),
            data,
            frame: self.frame,
        });
        if self.recent.len() <= MAX_EVENTS {
            return;
        }
        let excess = self.recent.len() - MAX_EVENTS;
        self.recent.drain(..excess);
        self.dropped_events = self.dropped_events.saturating_add(excess as u64);
        if self.frame.saturating_sub(self.last_overflow_log_frame) >= 60 {
            self.last_overflow_log_frame = self.frame;
            warn!(
                "[Overworld events] Dropped {} buffered events (total dropped: {})",
                excess, self.dropped_events
            );
        }
    }

    /// Events emitted on or after `frame`, oldest first.
    pub fn since(&self, frame: u64) -> impl Iterator<Item = &GameEvent> {
        self.recent.iter().filter(move |e| e.frame >= frame)
    }
}

pub struct GameEventsPlugin;

impl Plugin for GameEventsPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(GameEventBus::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_bus_tracks_dropped_events() {
        let mut bus = GameEventBus::default();
        for i in 0..(MAX_EVENTS + 25) {
            bus.emit("tile_entered", serde_json::json!({ "i": i }));
        }
        assert_eq!(bus.recent.len(), MAX_EVENTS);
        assert_eq!(bus.dropped_events, 25);
        assert_eq!(bus.recent.front().map(|e| e.data["i"].clone()), Some(25.into()));
    }

    #[test]
    fn since_filters_by_frame() {
        let mut bus = GameEventBus::default();
        bus.emit("warp_started", serde_json::Value::Null);
        bus.frame = 4;
        bus.emit("warp_completed", serde_json::Value::Null);
        let names: Vec<_> = bus.since(3).map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["warp_completed"]);
    }
}
