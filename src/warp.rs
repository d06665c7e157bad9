use serde::{Deserialize, Serialize};

use crate::behaviors;
use crate::components::Direction;
use crate::tilemap::{TileResolver, WorldState};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarpEvent {
    /// Local tile coordinates on the owning map.
    pub x: i32,
    pub y: i32,
    pub dest_map: String,
    #[serde(default)]
    pub dest_warp_id: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarpKind {
    Door,
    Teleport,
    Arrow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WarpProtocol {
    AnimatedDoor,
    NonAnimatedDoor,
    Teleport,
    Arrow(Direction),
}

impl WarpProtocol {
    pub fn kind(self) -> WarpKind {
        match self {
            WarpProtocol::AnimatedDoor | WarpProtocol::NonAnimatedDoor => WarpKind::Door,
            WarpProtocol::Teleport => WarpKind::Teleport,
            WarpProtocol::Arrow(_) => WarpKind::Arrow,
        }
    }
}

/// Arrows win over doors, doors over teleports.
pub fn classify(behavior: u16) -> Option<WarpProtocol> {
    if let Some(dir) = behaviors::arrow_warp_direction(behavior) {
        return Some(WarpProtocol::Arrow(dir));
    }
    if behaviors::is_door(behavior) {
        return Some(WarpProtocol::AnimatedDoor);
    }
    if behaviors::is_non_animated_door(behavior) {
        return Some(WarpProtocol::NonAnimatedDoor);
    }
    if behaviors::is_teleport_warp(behavior) {
        return Some(WarpProtocol::Teleport);
    }
    None
}

pub fn classify_kind(behavior: u16) -> Option<WarpKind> {
    classify(behavior).map(WarpProtocol::kind)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WarpTrigger {
    pub kind: WarpKind,
    pub source_map: String,
    pub warp_event: WarpEvent,
    pub behavior: u16,
    pub facing: Direction,
}

/// Builds a trigger for the warp event on a world tile, if there is one.
pub fn trigger_at(
    world: &WorldState,
    x: i32,
    y: i32,
    facing: Direction,
) -> Option<WarpTrigger> {
    let tile = world.resolve(x, y)?;
    let map = world.map(tile.map_index)?;
    let warp = map.layout.warp_at(tile.local_x, tile.local_y)?;
    // A warp event on an unclassified tile is a plain walk-over warp.
    let kind = classify_kind(tile.behavior()).unwrap_or(WarpKind::Teleport);
    Some(WarpTrigger {
        kind,
        source_map: map.id().to_string(),
        warp_event: warp.clone(),
        behavior: tile.behavior(),
        facing,
    })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckedTile {
    pub map_id: String,
    pub x: i32,
    pub y: i32,
}

/// Single-warp-in-flight guard plus re-trigger suppression.
#[derive(Clone, Debug, Default, Serialize)]
pub struct WarpRuntimeState {
    pub in_progress: bool,
    pub cooldown_ms: f32,
    pub last_checked_tile: Option<CheckedTile>,
}

impl WarpRuntimeState {
    pub fn update(&mut self, dt_ms: f32) {
        if self.cooldown_ms > 0.0 {
            self.cooldown_ms = (self.cooldown_ms - dt_ms).max(0.0);
        }
    }

    pub fn is_on_cooldown(&self) -> bool {
        self.cooldown_ms > 0.0
    }

    pub fn is_same_tile(&self, map_id: &str, x: i32, y: i32) -> bool {
        self.last_checked_tile
            .as_ref()
            .is_some_and(|t| t.map_id == map_id && t.x == x && t.y == y)
    }

    /// Whether a walk-over warp on this tile may fire now.
    pub fn can_trigger(&self, map_id: &str, x: i32, y: i32) -> Result<(), NoWarpReason> {
        if self.is_same_tile(map_id, x, y) {
            Err(NoWarpReason::TileNotChanged)
        } else if self.in_progress {
            Err(NoWarpReason::InProgress)
        } else if self.is_on_cooldown() {
            Err(NoWarpReason::OnCooldown)
        } else {
            Ok(())
        }
    }

    pub fn update_last_checked_tile(&mut self, tile: CheckedTile, min_cooldown_ms: f32) {
        self.last_checked_tile = Some(tile);
        self.cooldown_ms = self.cooldown_ms.max(min_cooldown_ms);
    }

    pub fn set_cooldown(&mut self, cooldown_ms: f32) {
        self.cooldown_ms = cooldown_ms;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalkOverAction {
    None(NoWarpReason),
    /// Standing on an arrow; fires only when the matching direction is pressed.
    AwaitArrowInput(WarpTrigger),
    AutoDoor {
        trigger: WarpTrigger,
        entry_direction: Direction,
        metatile_id: u16,
    },
    Warp(WarpTrigger),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoWarpReason {
    DoorActive,
    NoTile,
    TileNotChanged,
    InProgress,
    OnCooldown,
    NoTrigger,
}

/// Checks the tile the entity stands on for a walk-over warp. Call only while
/// the entity is not moving. Records the tile as checked when it changed.
pub fn process_walk_over(
    state: &mut WarpRuntimeState,
    world: &WorldState,
    position: (i32, i32),
    facing: Direction,
    door_sequence_active: bool,
    min_check_cooldown_ms: f32,
) -> WalkOverAction {
    if door_sequence_active {
        return WalkOverAction::None(NoWarpReason::DoorActive);
    }
    let (x, y) = position;
    let Some(tile) = world.resolve(x, y) else {
        return WalkOverAction::None(NoWarpReason::NoTile);
    };
    let Some(map) = world.map(tile.map_index) else {
        return WalkOverAction::None(NoWarpReason::NoTile);
    };
    let action = match state.can_trigger(map.id(), x, y) {
        Err(NoWarpReason::TileNotChanged) => {
            return WalkOverAction::None(NoWarpReason::TileNotChanged);
        }
        Err(reason) => WalkOverAction::None(reason),
        Ok(()) => match trigger_at(world, x, y, facing) {
            None => WalkOverAction::None(NoWarpReason::NoTrigger),
            Some(trigger) if trigger.kind == WarpKind::Arrow => {
                WalkOverAction::AwaitArrowInput(trigger)
            }
            Some(trigger) if behaviors::is_non_animated_door(trigger.behavior) => {
                WalkOverAction::AutoDoor {
                    trigger,
                    entry_direction: facing,
                    metatile_id: tile.metatile_id,
                }
            }
            Some(trigger) => WalkOverAction::Warp(trigger),
        },
    };

    state.update_last_checked_tile(
        CheckedTile {
            map_id: map.id().to_string(),
            x,
            y,
        },
        min_check_cooldown_ms,
    );
    action
}
