use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Marks the sprite that mirrors the overworld player
#[derive(Component)]
pub struct PlayerSprite;

/// Marks a sprite spawned for a map tile
#[derive(Component)]
pub struct TileSprite;

/// Whether the app runs without a window
#[derive(Resource, Clone, Copy, Default)]
pub struct HeadlessMode(pub bool);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Direction {
    /// Priority order used when several directions are held at once.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Tile delta; y grows downward.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn action_name(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    #[default]
    Foot,
    Cycle,
    Surf,
    Underwater,
}

impl TravelMode {
    pub fn is_surf_capable(self) -> bool {
        matches!(self, TravelMode::Surf | TravelMode::Underwater)
    }
}

/// Movement tuning. Speeds are in pixels per millisecond.
#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    pub tile_size: f32,
    pub walk_speed: f32,
    pub run_multiplier: f32,
    pub surf_multiplier: f32,
    pub cycle_speed: f32,
    pub cycle_top_speed: f32,
    pub frame_ms: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            tile_size: 16.0,
            walk_speed: 0.06,
            run_multiplier: 2.0,
            surf_multiplier: 2.0,
            cycle_speed: 0.12,
            cycle_top_speed: 0.24,
            frame_ms: 1000.0 / 60.0,
        }
    }
}

/// Warp and door choreography tuning. Durations are in milliseconds.
#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpConfig {
    pub cooldown_ms: f32,
    pub min_check_cooldown_ms: f32,
    pub fade_ms: f32,
    pub walk_over_fade_ms: f32,
    pub connection_depth: u32,
    pub door_frame_ms: f32,
    pub door_frame_count: u32,
    pub door_settle_ms: f32,
    /// Build destination worlds on the calling thread instead of a worker.
    pub inline_loads: bool,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 350.0,
            min_check_cooldown_ms: 50.0,
            fade_ms: 500.0,
            walk_over_fade_ms: 300.0,
            connection_depth: 2,
            door_frame_ms: 90.0,
            door_frame_count: 3,
            door_settle_ms: 200.0,
            inline_loads: cfg!(target_arch = "wasm32"),
        }
    }
}
