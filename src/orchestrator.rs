//! Map transitions: rebuilding the world around the destination, placing the
//! entity and arming the door exit when one applies.

use bevy::log::{debug, info, warn};
use serde_json::json;

use crate::behaviors;
use crate::components::Direction;
use crate::door::DoorExitPlan;
use crate::door_anims::AnimationSpawner;
use crate::error::WorldLoadError;
use crate::screen_effects::FadeMode;
use crate::session::OverworldSession;
use crate::tilemap::{TileResolver, WorldState};
use crate::warp::{CheckedTile, WarpKind, WarpTrigger};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WarpOptions {
    /// Proceed even though a warp is already marked in progress.
    pub force: bool,
    /// The warp ends a door entry (or auto door warp).
    pub from_door: bool,
}

/// A warp waiting for its world build.
#[derive(Clone, Debug)]
pub(crate) struct ActiveWarp {
    pub trigger: WarpTrigger,
    pub options: WarpOptions,
    pub prior_facing: Direction,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Destination {
    pub map_id: String,
    pub tile: (i32, i32),
    pub facing: Direction,
    pub requires_exit_sequence: bool,
    pub animated_door: bool,
    pub metatile_id: u16,
    pub exit_direction: Direction,
}

/// Facing on arrival: out of a door is always down, arrows keep the facing
/// the entity had, everything else faces up.
pub fn arrival_facing(kind: WarpKind, lands_on_door: bool, prior_facing: Direction) -> Direction {
    if lands_on_door {
        Direction::Down
    } else if kind == WarpKind::Arrow {
        prior_facing
    } else {
        Direction::Up
    }
}

pub fn exit_direction(trigger: &WarpTrigger) -> Direction {
    match trigger.kind {
        WarpKind::Arrow => trigger.facing,
        WarpKind::Door | WarpKind::Teleport => Direction::Down,
    }
}

/// Finds the destination map (falling back to the anchor) and warp event
/// (falling back to the first one) in a freshly built world.
pub fn resolve_destination(
    world: &WorldState,
    trigger: &WarpTrigger,
    prior_facing: Direction,
) -> Result<Destination, WorldLoadError> {
    let wanted = &trigger.warp_event.dest_map;
    let map = world
        .find_map(wanted)
        .or_else(|| {
            warn!(
                "[Overworld warp] Map '{}' missing from built world; using anchor '{}'",
                wanted, world.anchor_id
            );
            world.anchor()
        })
        .ok_or_else(|| WorldLoadError::UnknownMap(wanted.clone()))?;

    let warp_id = trigger.warp_event.dest_warp_id;
    let warp = match map.layout.warps.get(warp_id) {
        Some(warp) => warp,
        None => {
            let first = map.layout.warps.first().ok_or_else(|| WorldLoadError::NoWarpEvents {
                map: map.id().to_string(),
            })?;
            warn!(
                "[Overworld warp] Map '{}' has no warp {}; using warp 0",
                map.id(),
                warp_id
            );
            first
        }
    };

    let tile = (map.offset_x + warp.x, map.offset_y + warp.y);
    let resolved = world.resolve(tile.0, tile.1);
    let behavior = resolved.map(|t| t.behavior()).unwrap_or_default();
    let requires_exit_sequence = behaviors::requires_door_exit_sequence(behavior);
    Ok(Destination {
        map_id: map.id().to_string(),
        tile,
        facing: arrival_facing(trigger.kind, requires_exit_sequence, prior_facing),
        requires_exit_sequence,
        animated_door: behaviors::is_door(behavior),
        metatile_id: resolved.map(|t| t.metatile_id).unwrap_or_default(),
        exit_direction: exit_direction(trigger),
    })
}

impl OverworldSession {
    /// Starts a map transition. Returns false when another warp is already in
    /// flight and `force` is not set.
    pub fn perform_warp(&mut self, trigger: WarpTrigger, options: WarpOptions) -> bool {
        if self.warp.in_progress && !options.force {
            debug!(
                "[Overworld warp] Ignoring warp to '{}': another warp is in progress",
                trigger.warp_event.dest_map
            );
            return false;
        }
        self.warp.in_progress = true;
        let prior_facing = self.player.facing();
        self.player.lock_input();

        let generation = self.loader.bump_generation();
        info!(
            "[Overworld warp] {:?} warp from '{}' to '{}' #{} (generation {})",
            trigger.kind,
            trigger.source_map,
            trigger.warp_event.dest_map,
            trigger.warp_event.dest_warp_id,
            generation
        );
        self.emit(
            "warp_started",
            json!({
                "kind": trigger.kind,
                "from": trigger.source_map,
                "to": trigger.warp_event.dest_map,
                "warp_id": trigger.warp_event.dest_warp_id,
                "generation": generation,
            }),
        );
        self.loader
            .request(&trigger.warp_event.dest_map, self.warp_config.connection_depth);
        self.active_warp = Some(ActiveWarp {
            trigger,
            options,
            prior_facing,
        });
        self.poll_world_load();
        true
    }

    /// Applies the newest finished build, if any.
    pub(crate) fn poll_world_load(&mut self) {
        let Some(done) = self.loader.poll() else {
            return;
        };
        let Some(active) = self.active_warp.take() else {
            debug!(
                "[Overworld loader] Build of '{}' finished with no warp waiting",
                done.anchor_map_id
            );
            return;
        };
        let outcome = done.result.and_then(|world| {
            let destination = resolve_destination(&world, &active.trigger, active.prior_facing)?;
            Ok((world, destination))
        });
        match outcome {
            Ok((world, destination)) => self.complete_warp(active, world, destination),
            Err(e) => self.fail_warp(active, e),
        }
    }

    fn complete_warp(&mut self, active: ActiveWarp, world: WorldState, dest: Destination) {
        // Context and position change together.
        self.world = world;
        self.world_generation = self.world_generation.wrapping_add(1);
        self.objects.clear();
        self.player.set_position(dest.tile, dest.facing, &self.world);

        self.entry.reset(&mut self.anims);
        self.anims.clear();
        self.pending_walk_over = None;
        let now = self.now_ms;
        if active.options.from_door && dest.requires_exit_sequence {
            self.player.set_hidden(true);
            self.exit.start(
                DoorExitPlan {
                    door: dest.tile,
                    metatile_id: dest.metatile_id,
                    animated: dest.animated_door,
                    direction: dest.exit_direction,
                },
                now,
                &self.timings,
                &mut self.anims,
            );
            self.fade.arm(FadeMode::In, now, self.warp_config.fade_ms);
        } else {
            self.player.set_hidden(false);
            self.fade.arm(FadeMode::In, now, self.warp_config.fade_ms);
            self.exit.reset(&mut self.anims);
            self.player.unlock_input();
            self.warp.in_progress = false;
        }

        self.warp.update_last_checked_tile(
            CheckedTile {
                map_id: dest.map_id.clone(),
                x: dest.tile.0,
                y: dest.tile.1,
            },
            self.warp_config.min_check_cooldown_ms,
        );
        self.warp.set_cooldown(self.warp_config.cooldown_ms);

        info!(
            "[Overworld warp] Arrived on '{}' at ({}, {}) facing {:?}",
            dest.map_id, dest.tile.0, dest.tile.1, dest.facing
        );
        self.emit(
            "warp_completed",
            json!({
                "map": dest.map_id,
                "x": dest.tile.0,
                "y": dest.tile.1,
                "facing": dest.facing,
                "door_exit": self.exit.is_active(),
            }),
        );
    }

    fn fail_warp(&mut self, active: ActiveWarp, error: WorldLoadError) {
        warn!(
            "[Overworld warp] Warp to '{}' failed: {}",
            active.trigger.warp_event.dest_map, error
        );
        self.player.unlock_input();
        self.player.set_hidden(false);
        self.warp.in_progress = false;
        self.pending_walk_over = None;
        self.entry.reset(&mut self.anims);
        self.exit.reset(&mut self.anims);
        // The entity may be standing on the trigger tile; it must not refire.
        let (x, y) = self.player.tile();
        if let Some(map_id) = self.current_map_id().map(str::to_string) {
            self.warp.update_last_checked_tile(
                CheckedTile { map_id, x, y },
                self.warp_config.min_check_cooldown_ms,
            );
        }
        self.warp.set_cooldown(self.warp_config.cooldown_ms);
        self.fade
            .arm(FadeMode::In, self.now_ms, self.warp_config.fade_ms);
        self.emit(
            "warp_failed",
            json!({
                "to": active.trigger.warp_event.dest_map,
                "error": error.to_string(),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warp::WarpEvent;
    use crate::world_data::{demo_manifest, ManifestWorldBuilder, WorldBuilder};

    fn trigger(kind: WarpKind, dest_map: &str, dest_warp_id: usize, facing: Direction) -> WarpTrigger {
        WarpTrigger {
            kind,
            source_map: "town".into(),
            warp_event: WarpEvent {
                x: 0,
                y: 0,
                dest_map: dest_map.into(),
                dest_warp_id,
            },
            behavior: 0,
            facing,
        }
    }

    fn built(anchor: &str) -> WorldState {
        ManifestWorldBuilder::from_manifest(&demo_manifest())
            .expect("demo")
            .build_world(anchor, 1)
            .expect("built")
    }

    #[test]
    fn facing_table() {
        assert_eq!(arrival_facing(WarpKind::Door, true, Direction::Left), Direction::Down);
        assert_eq!(arrival_facing(WarpKind::Arrow, false, Direction::Left), Direction::Left);
        assert_eq!(arrival_facing(WarpKind::Teleport, false, Direction::Left), Direction::Up);
        assert_eq!(arrival_facing(WarpKind::Door, false, Direction::Left), Direction::Up);
    }

    #[test]
    fn door_destination_requires_exit() {
        let world = built("town");
        let dest = resolve_destination(
            &world,
            &trigger(WarpKind::Arrow, "town", 0, Direction::Down),
            Direction::Down,
        )
        .expect("resolved");
        assert_eq!(dest.tile, (5, 5));
        assert!(dest.requires_exit_sequence);
        assert!(dest.animated_door);
        assert_eq!(dest.facing, Direction::Down);
        assert_eq!(dest.exit_direction, Direction::Down);
    }

    #[test]
    fn missing_warp_falls_back_to_first() {
        let world = built("house");
        let dest = resolve_destination(
            &world,
            &trigger(WarpKind::Door, "house", 7, Direction::Up),
            Direction::Up,
        )
        .expect("resolved");
        assert_eq!(dest.tile, (4, 5));
        assert_eq!(dest.facing, Direction::Up);
    }

    #[test]
    fn map_without_warps_is_an_error() {
        let world = built("route");
        assert!(matches!(
            resolve_destination(
                &world,
                &trigger(WarpKind::Teleport, "route", 0, Direction::Up),
                Direction::Up
            ),
            Err(WorldLoadError::NoWarpEvents { .. })
        ));
    }
}
