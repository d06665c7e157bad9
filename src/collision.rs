use std::collections::HashMap;

use serde::Serialize;

use crate::behaviors;
use crate::components::{Direction, TravelMode};
use crate::tilemap::{ResolvedTile, TileResolver};

pub const UNIVERSAL_ELEVATION: u8 = 15;
pub const GROUND_ELEVATION: u8 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    OutOfBounds,
    Collision,
    ElevationMismatch,
    ImpassableBehavior,
    RequiresSurf,
    DirectionalImpassable,
    ObjectEvent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepVerdict {
    Passable,
    Blocked(BlockReason),
}

impl StepVerdict {
    pub fn is_passable(self) -> bool {
        self == StepVerdict::Passable
    }
}

#[derive(Clone, Copy, Debug)]
pub struct StepQuery {
    pub elevation: u8,
    pub travel_mode: TravelMode,
    pub ignore_elevation: bool,
}

impl StepQuery {
    pub fn new(elevation: u8, travel_mode: TravelMode) -> Self {
        Self {
            elevation,
            travel_mode,
            ignore_elevation: false,
        }
    }

    pub fn ignoring_elevation(self) -> Self {
        Self {
            ignore_elevation: true,
            ..self
        }
    }
}

/// NPCs, items and other occupants checked after the tile rules pass.
pub trait ObjectCollision {
    fn has_object_collision(&self, x: i32, y: i32, elevation: u8) -> bool;
}

pub struct NoObjects;

impl ObjectCollision for NoObjects {
    fn has_object_collision(&self, _x: i32, _y: i32, _elevation: u8) -> bool {
        false
    }
}

/// Occupied cells keyed by world tile, each with the occupant's elevation.
#[derive(Clone, Debug, Default)]
pub struct ObjectOccupancy {
    cells: HashMap<(i32, i32), u8>,
}

impl ObjectOccupancy {
    pub fn insert(&mut self, x: i32, y: i32, elevation: u8) {
        self.cells.insert((x, y), elevation);
    }

    pub fn remove(&mut self, x: i32, y: i32) {
        self.cells.remove(&(x, y));
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }
}

impl ObjectCollision for ObjectOccupancy {
    fn has_object_collision(&self, x: i32, y: i32, elevation: u8) -> bool {
        self.cells
            .get(&(x, y))
            .is_some_and(|&occupant| elevation_allows(elevation, occupant))
    }
}

/// Whether an entity at `current` may stand on a tile at `target` elevation.
pub fn elevation_allows(current: u8, target: u8) -> bool {
    if current == GROUND_ELEVATION {
        return true;
    }
    if target == GROUND_ELEVATION || target == UNIVERSAL_ELEVATION {
        return true;
    }
    if current == UNIVERSAL_ELEVATION {
        return true;
    }
    current == target
}

pub fn check_step(tile: Option<&ResolvedTile>, query: StepQuery) -> StepVerdict {
    let Some(tile) = tile else {
        return StepVerdict::Blocked(BlockReason::OutOfBounds);
    };
    let attrs = tile.attributes;

    if behaviors::is_sand(attrs.behavior) {
        return StepVerdict::Passable;
    }
    if attrs.collision != 0 && !behaviors::is_door(attrs.behavior) {
        return StepVerdict::Blocked(BlockReason::Collision);
    }
    if !query.ignore_elevation && !elevation_allows(query.elevation, attrs.elevation) {
        return StepVerdict::Blocked(BlockReason::ElevationMismatch);
    }
    if behaviors::is_explicitly_impassable(attrs.behavior) {
        return StepVerdict::Blocked(BlockReason::ImpassableBehavior);
    }
    if behaviors::is_surfable(attrs.behavior) && !query.travel_mode.is_surf_capable() {
        return StepVerdict::Blocked(BlockReason::RequiresSurf);
    }
    if behaviors::is_directionally_impassable(attrs.behavior) {
        return StepVerdict::Blocked(BlockReason::DirectionalImpassable);
    }
    StepVerdict::Passable
}

/// Full verdict for a world tile: tile rules first, then occupants.
pub fn check_world_step(
    tiles: &dyn TileResolver,
    objects: &dyn ObjectCollision,
    x: i32,
    y: i32,
    query: StepQuery,
) -> StepVerdict {
    let verdict = check_step(tiles.resolve(x, y).as_ref(), query);
    if !verdict.is_passable() {
        return verdict;
    }
    if objects.has_object_collision(x, y, query.elevation) {
        return StepVerdict::Blocked(BlockReason::ObjectEvent);
    }
    StepVerdict::Passable
}

/// Landing tile when stepping from `from` onto a ledge that faces `direction`.
pub fn ledge_jump_landing(
    tiles: &dyn TileResolver,
    objects: &dyn ObjectCollision,
    from: (i32, i32),
    direction: Direction,
    query: StepQuery,
) -> Option<(i32, i32)> {
    let (dx, dy) = direction.delta();
    let ledge = tiles.resolve(from.0 + dx, from.1 + dy)?;
    if behaviors::ledge_direction(ledge.behavior()) != Some(direction) {
        return None;
    }
    let landing = (from.0 + dx * 2, from.1 + dy * 2);
    let verdict = check_world_step(
        tiles,
        objects,
        landing.0,
        landing.1,
        query.ignoring_elevation(),
    );
    verdict.is_passable().then_some(landing)
}
