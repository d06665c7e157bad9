use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::input::VirtualInput;
use crate::session::{OverworldSession, SessionSnapshot};

const FRAME_MS: f32 = 1000.0 / 60.0;

/// One minute of fixed steps; `OVERWORLD_SIM_MAX_FRAMES` overrides it.
pub const DEFAULT_MAX_SIMULATION_FRAMES: u32 = 3600;

fn max_simulation_frames() -> u32 {
    static LIMIT: OnceLock<u32> = OnceLock::new();
    *LIMIT.get_or_init(|| {
        std::env::var("OVERWORLD_SIM_MAX_FRAMES")
            .ok()
            .and_then(|value| value.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_SIMULATION_FRAMES)
    })
}

#[derive(Deserialize, Clone)]
pub struct SimulationRequest {
    pub inputs: Vec<SimInput>,
    pub max_frames: u32,
    #[serde(default = "default_record_interval")]
    pub record_interval: u32,
    /// Stop early once the entity stands on this map.
    #[serde(default)]
    pub until_map: Option<String>,
}

fn default_record_interval() -> u32 {
    1
}

#[derive(Deserialize, Clone)]
pub struct SimInput {
    pub frame: u32,
    pub action: String,
    #[serde(default)]
    pub duration: u32,
}

#[derive(Serialize, Clone)]
pub struct SimulationResult {
    pub outcome: String,
    pub frames_elapsed: u32,
    pub trace: Vec<TraceFrame>,
    pub events: Vec<SimEvent>,
}

#[derive(Serialize, Clone)]
pub struct TraceFrame {
    pub frame: u32,
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
}

#[derive(Serialize, Clone)]
pub struct SimEvent {
    pub frame: u32,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: serde_json::Value,
}

/// Ticks the session once per entry of `frames`, holding that frame's actions,
/// and returns the snapshot taken after each tick.
pub fn run_inputs(
    session: &mut OverworldSession,
    frames: &[Vec<String>],
    dt_ms: f32,
) -> Vec<SessionSnapshot> {
    let mut input = VirtualInput::default();
    frames
        .iter()
        .map(|actions| {
            input.set_held(actions.iter().cloned());
            session.tick(&input, dt_ms);
            session.snapshot()
        })
        .collect()
}

/// Expands a scheduled input list into per-frame actions, at most `frame_limit` frames.
fn schedule(request: &SimulationRequest, frame_limit: u32) -> Vec<Vec<String>> {
    let frame_count = request.max_frames.min(frame_limit);
    let mut frames: Vec<Vec<String>> = vec![Vec::new(); frame_count as usize];
    for input in &request.inputs {
        let duration = input.duration.max(1);
        for f in input.frame..input.frame.saturating_add(duration).min(frame_count) {
            frames[f as usize].push(input.action.clone());
        }
    }
    frames
}

pub fn run_simulation(session: &mut OverworldSession, request: &SimulationRequest) -> SimulationResult {
    let frames = schedule(request, max_simulation_frames());
    let mut trace = Vec::new();
    let mut events = Vec::new();
    let mut outcome = "timeout".to_string();
    let mut frames_elapsed = 0;

    for (frame, actions) in frames.iter().enumerate() {
        let frame = frame as u32;
        let snapshot = run_inputs(session, std::slice::from_ref(actions), FRAME_MS)
            .pop()
            .unwrap_or_else(|| session.snapshot());
        frames_elapsed = frame + 1;

        for (name, data) in session.drain_events() {
            events.push(SimEvent {
                frame,
                event_type: name.to_string(),
                data,
            });
        }

        let reached = request
            .until_map
            .as_deref()
            .is_some_and(|map| snapshot.map_id.as_deref() == Some(map) && !snapshot.warp.in_progress);
        if reached || (request.record_interval > 0 && frame % request.record_interval == 0) {
            trace.push(TraceFrame { frame, snapshot });
        }
        if reached {
            outcome = "reached_map".to_string();
            break;
        }
    }

    SimulationResult {
        outcome,
        frames_elapsed,
        trace,
        events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Direction, MovementConfig, WarpConfig};
    use crate::world_data::{demo_manifest, SpawnPoint};

    fn session_at(x: i32, y: i32, facing: Direction) -> OverworldSession {
        let mut manifest = demo_manifest();
        manifest.spawn = Some(SpawnPoint {
            map: "town".into(),
            x,
            y,
            facing,
            travel_mode: Default::default(),
        });
        let warp = WarpConfig {
            inline_loads: true,
            ..WarpConfig::default()
        };
        OverworldSession::from_manifest(&manifest, MovementConfig::default(), warp)
            .expect("session")
    }

    #[test]
    fn run_inputs_returns_one_snapshot_per_frame() {
        let mut session = session_at(10, 7, Direction::Down);
        let mut frames = vec![vec!["left".to_string()]];
        frames.extend((0..19).map(|_| Vec::new()));
        let snapshots = run_inputs(&mut session, &frames, FRAME_MS);
        assert_eq!(snapshots.len(), 20);
        assert_eq!(snapshots[0].facing, Direction::Left);
        assert!(snapshots[0].moving);
        assert_eq!(snapshots[19].tile, (9, 7));
        assert!(!snapshots[19].moving);
    }

    #[test]
    fn simulation_walks_through_the_house_door() {
        let mut session = session_at(5, 7, Direction::Up);
        let request = SimulationRequest {
            inputs: vec![SimInput {
                frame: 0,
                action: "up".into(),
                duration: 40,
            }],
            max_frames: 600,
            record_interval: 30,
            until_map: Some("house".into()),
        };
        let result = run_simulation(&mut session, &request);
        assert_eq!(result.outcome, "reached_map");
        assert!(result.events.iter().any(|e| e.event_type == "warp_completed"));
        let last = result.trace.last().expect("trace");
        assert_eq!(last.snapshot.map_id.as_deref(), Some("house"));
    }

    #[test]
    fn schedule_clamps_frames_and_long_holds() {
        let request = SimulationRequest {
            inputs: vec![SimInput {
                frame: 8,
                action: "up".into(),
                duration: u32::MAX,
            }],
            max_frames: u32::MAX,
            record_interval: 1,
            until_map: None,
        };
        let frames = schedule(&request, 10);
        assert_eq!(frames.len(), 10);
        assert!(frames[7].is_empty());
        assert_eq!(frames[8], vec!["up".to_string()]);
        assert_eq!(frames[9], vec!["up".to_string()]);
    }
}
