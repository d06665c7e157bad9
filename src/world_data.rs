//! World manifests: the maps, their edge connections and the spawn point.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;

use bevy::log::warn;
use serde::{Deserialize, Serialize};

use crate::behaviors::*;
use crate::components::{Direction, TravelMode};
use crate::error::WorldLoadError;
use crate::tilemap::{MapLayout, MapTile, TileAttributes, WorldMap, WorldState};
use crate::warp::WarpEvent;

/// Builds the stitched world around an anchor map. Runs on a worker thread.
pub trait WorldBuilder: Send + Sync {
    fn build_world(
        &self,
        anchor_map_id: &str,
        connection_depth: u32,
    ) -> Result<WorldState, WorldLoadError>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapConnection {
    pub map: String,
    /// Side of this map the neighbor is attached to.
    pub direction: Direction,
    /// Shift along the shared edge, in tiles.
    #[serde(default)]
    pub offset: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManifestMap {
    #[serde(flatten)]
    pub layout: MapLayout,
    #[serde(default)]
    pub connections: Vec<MapConnection>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub map: String,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub facing: Direction,
    #[serde(default)]
    pub travel_mode: TravelMode,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldManifest {
    pub maps: Vec<ManifestMap>,
    pub spawn: Option<SpawnPoint>,
    /// Metatiles that have door graphics. Empty means every door animates.
    pub door_metatiles: Vec<u16>,
}

impl WorldManifest {
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

pub fn load_manifest(path: &Path) -> Result<WorldManifest, WorldLoadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| WorldLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&contents)?)
}

/// Manifest baked in at build time, if one was supplied.
pub fn embedded_manifest() -> Option<WorldManifest> {
    let raw = include_str!(concat!(env!("OUT_DIR"), "/overworld_embedded_world.json"));
    match serde_json::from_str::<WorldManifest>(raw) {
        Ok(manifest) if !manifest.is_empty() => Some(manifest),
        Ok(_) => None,
        Err(e) => {
            warn!("[Overworld loader] Embedded world is invalid: {}", e);
            None
        }
    }
}

#[derive(Clone, Debug)]
struct BuilderMap {
    layout: Arc<MapLayout>,
    connections: Vec<MapConnection>,
}

#[derive(Clone, Debug)]
pub struct ManifestWorldBuilder {
    maps: HashMap<String, BuilderMap>,
}

impl ManifestWorldBuilder {
    pub fn from_manifest(manifest: &WorldManifest) -> Result<Self, WorldLoadError> {
        let mut maps = HashMap::new();
        for entry in &manifest.maps {
            let layout = &entry.layout;
            if !layout.is_well_formed() {
                return Err(WorldLoadError::MalformedMap {
                    map: layout.id.clone(),
                    reason: format!(
                        "{} tiles for a {}x{} map",
                        layout.tiles.len(),
                        layout.width,
                        layout.height
                    ),
                });
            }
            maps.insert(
                layout.id.clone(),
                BuilderMap {
                    layout: Arc::new(layout.clone()),
                    connections: entry.connections.clone(),
                },
            );
        }
        for (id, map) in &maps {
            if let Some(missing) = map.connections.iter().find(|c| !maps.contains_key(&c.map)) {
                return Err(WorldLoadError::MalformedMap {
                    map: id.clone(),
                    reason: format!("connection to unknown map '{}'", missing.map),
                });
            }
        }
        Ok(Self { maps })
    }
}

fn neighbor_offset(
    base: &WorldMap,
    neighbor: &MapLayout,
    connection: &MapConnection,
) -> (i32, i32) {
    let (bx, by) = (base.offset_x, base.offset_y);
    match connection.direction {
        Direction::Up => (bx + connection.offset, by - neighbor.height),
        Direction::Down => (bx + connection.offset, by + base.layout.height),
        Direction::Left => (bx - neighbor.width, by + connection.offset),
        Direction::Right => (bx + base.layout.width, by + connection.offset),
    }
}

impl WorldBuilder for ManifestWorldBuilder {
    fn build_world(
        &self,
        anchor_map_id: &str,
        connection_depth: u32,
    ) -> Result<WorldState, WorldLoadError> {
        let anchor = self
            .maps
            .get(anchor_map_id)
            .ok_or_else(|| WorldLoadError::UnknownMap(anchor_map_id.to_string()))?;

        let mut placed: Vec<WorldMap> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(anchor_map_id);
        queue.push_back((
            WorldMap {
                layout: anchor.layout.clone(),
                offset_x: 0,
                offset_y: 0,
            },
            0u32,
        ));

        while let Some((current, depth)) = queue.pop_front() {
            if depth < connection_depth {
                if let Some(entry) = self.maps.get(current.id()) {
                    for connection in &entry.connections {
                        let Some((id, neighbor)) = self.maps.get_key_value(&connection.map) else {
                            continue;
                        };
                        if !seen.insert(id.as_str()) {
                            continue;
                        }
                        let (offset_x, offset_y) =
                            neighbor_offset(&current, &neighbor.layout, connection);
                        queue.push_back((
                            WorldMap {
                                layout: neighbor.layout.clone(),
                                offset_x,
                                offset_y,
                            },
                            depth + 1,
                        ));
                    }
                }
            }
            placed.push(current);
        }

        Ok(WorldState {
            anchor_id: anchor_map_id.to_string(),
            maps: placed,
        })
    }
}

pub const DEMO_DOOR_METATILE: u16 = 0x21;

const GROUND: MapTile = MapTile {
    metatile: 0x01,
    attributes: TileAttributes::new(MB_NORMAL, 0, 3),
};
const WALL: MapTile = MapTile {
    metatile: 0x03,
    attributes: TileAttributes::new(MB_NORMAL, 1, 3),
};

fn paint(layout: &mut MapLayout, xs: std::ops::Range<i32>, ys: std::ops::Range<i32>, tile: MapTile) {
    for y in ys {
        for x in xs.clone() {
            layout.set_tile(x, y, tile);
        }
    }
}

fn tile(metatile: u16, behavior: u16, collision: u8, elevation: u8) -> MapTile {
    MapTile {
        metatile,
        attributes: TileAttributes::new(behavior, collision, elevation),
    }
}

fn warp(x: i32, y: i32, dest_map: &str, dest_warp_id: usize) -> WarpEvent {
    WarpEvent {
        x,
        y,
        dest_map: dest_map.to_string(),
        dest_warp_id,
    }
}

/// Small built-in world exercising every transition protocol.
pub fn demo_manifest() -> WorldManifest {
    let mut town = MapLayout::filled("town", 20, 16, GROUND);
    paint(&mut town, 0..1, 0..16, WALL);
    paint(&mut town, 19..20, 0..16, WALL);
    paint(&mut town, 0..20, 15..16, WALL);
    // House front with its door.
    paint(&mut town, 3..8, 3..6, WALL);
    town.set_tile(5, 5, tile(DEMO_DOOR_METATILE, MB_ANIMATED_DOOR, 1, 3));
    // Cave stairs.
    paint(&mut town, 13..16, 3..5, WALL);
    town.set_tile(14, 4, tile(0x22, MB_NON_ANIMATED_DOOR, 0, 3));
    paint(&mut town, 8..13, 10..11, tile(0x24, MB_JUMP_SOUTH, 0, 3));
    paint(&mut town, 14..19, 10..15, tile(0x23, MB_POND_WATER, 0, 1));
    paint(&mut town, 14..19, 8..9, tile(0x25, MB_ICE, 0, 3));
    paint(&mut town, 9..12, 13..15, tile(0x26, MB_SAND, 0, 3));
    paint(&mut town, 2..5, 8..10, tile(0x02, MB_TALL_GRASS, 0, 3));
    town.set_tile(2, 13, tile(0x27, MB_AQUA_HIDEOUT_WARP, 0, 3));
    let town = town
        .with_warp(warp(5, 5, "house", 0))
        .with_warp(warp(14, 4, "cave", 0))
        .with_warp(warp(2, 13, "cave", 1));

    let mut route = MapLayout::filled("route", 20, 10, GROUND);
    paint(&mut route, 0..1, 0..10, WALL);
    paint(&mut route, 19..20, 0..10, WALL);
    paint(&mut route, 0..20, 0..1, WALL);
    paint(&mut route, 4..16, 3..7, tile(0x02, MB_TALL_GRASS, 0, 3));

    let mut house = MapLayout::filled("house", 8, 6, GROUND);
    paint(&mut house, 0..8, 0..1, WALL);
    paint(&mut house, 0..1, 0..6, WALL);
    paint(&mut house, 7..8, 0..6, WALL);
    house.set_tile(4, 5, tile(0x28, MB_SOUTH_ARROW_WARP, 0, 3));
    let house = house.with_warp(warp(4, 5, "town", 0));

    let mut cave = MapLayout::filled("cave", 10, 8, tile(0x11, MB_NORMAL, 0, 3));
    paint(&mut cave, 0..10, 0..1, WALL);
    paint(&mut cave, 0..10, 7..8, WALL);
    cave.set_tile(5, 1, tile(0x22, MB_NON_ANIMATED_DOOR, 0, 3));
    let cave = cave
        .with_warp(warp(5, 1, "town", 1))
        .with_warp(warp(8, 6, "town", 2));

    WorldManifest {
        maps: vec![
            ManifestMap {
                layout: town,
                connections: vec![MapConnection {
                    map: "route".into(),
                    direction: Direction::Up,
                    offset: 0,
                }],
            },
            ManifestMap {
                layout: route,
                connections: vec![MapConnection {
                    map: "town".into(),
                    direction: Direction::Down,
                    offset: 0,
                }],
            },
            ManifestMap {
                layout: house,
                connections: Vec::new(),
            },
            ManifestMap {
                layout: cave,
                connections: Vec::new(),
            },
        ],
        spawn: Some(SpawnPoint {
            map: "town".into(),
            x: 10,
            y: 7,
            facing: Direction::Down,
            travel_mode: TravelMode::Foot,
        }),
        door_metatiles: vec![DEMO_DOOR_METATILE],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tilemap::TileResolver;

    #[test]
    fn demo_world_stitches_route_above_town() {
        let builder = ManifestWorldBuilder::from_manifest(&demo_manifest()).expect("valid demo");
        let world = builder.build_world("town", 2).expect("built");
        assert_eq!(world.anchor_id, "town");
        let route = world.find_map("route").expect("route stitched");
        assert_eq!((route.offset_x, route.offset_y), (0, -10));
        assert!(world.find_map("house").is_none());
        let tile = world.resolve(5, -5).expect("route tile");
        assert_eq!(tile.behavior(), MB_TALL_GRASS);
    }

    #[test]
    fn depth_zero_loads_only_the_anchor() {
        let builder = ManifestWorldBuilder::from_manifest(&demo_manifest()).expect("valid demo");
        let world = builder.build_world("route", 0).expect("built");
        assert_eq!(world.maps.len(), 1);
    }

    #[test]
    fn unknown_anchor_is_an_error() {
        let builder = ManifestWorldBuilder::from_manifest(&demo_manifest()).expect("valid demo");
        assert!(matches!(
            builder.build_world("nowhere", 1),
            Err(WorldLoadError::UnknownMap(id)) if id == "nowhere"
        ));
    }

    #[test]
    fn malformed_maps_are_rejected() {
        let mut manifest = demo_manifest();
        manifest.maps[0].layout.tiles.pop();
        assert!(matches!(
            ManifestWorldBuilder::from_manifest(&manifest),
            Err(WorldLoadError::MalformedMap { .. })
        ));

        let mut manifest = demo_manifest();
        manifest.maps[2].connections.push(MapConnection {
            map: "sky".into(),
            direction: Direction::Left,
            offset: 0,
        });
        assert!(ManifestWorldBuilder::from_manifest(&manifest).is_err());
    }

    #[test]
    fn overflowing_dimensions_are_rejected() {
        let mut manifest = demo_manifest();
        manifest.maps[0].layout.width = i32::MAX;
        manifest.maps[0].layout.height = 3;
        assert!(matches!(
            ManifestWorldBuilder::from_manifest(&manifest),
            Err(WorldLoadError::MalformedMap { .. })
        ));

        let huge = MapLayout::filled("huge", i32::MAX, i32::MAX, MapTile::default());
        assert!(huge.tiles.is_empty());
        assert!(!huge.is_well_formed());
        assert!(huge.tile(i32::MAX - 1, i32::MAX - 1).is_none());
    }

    #[test]
    fn manifest_json_round_trips_tile_attributes() {
        let json = serde_json::json!({
            "maps": [{
                "id": "tiny",
                "width": 2,
                "height": 1,
                "tiles": [
                    {"metatile": 1, "behavior": 0, "collision": 0, "elevation": 3},
                    {"metatile": 33, "behavior": MB_ANIMATED_DOOR, "collision": 1, "elevation": 3}
                ],
                "warps": [{"x": 1, "y": 0, "dest_map": "tiny"}]
            }],
            "spawn": {"map": "tiny", "x": 0, "y": 0}
        });
        let manifest: WorldManifest = serde_json::from_value(json).expect("parses");
        let builder = ManifestWorldBuilder::from_manifest(&manifest).expect("valid");
        let world = builder.build_world("tiny", 1).expect("built");
        let door = world.resolve(1, 0).expect("door");
        assert_eq!(door.metatile_id, 33);
        assert_eq!(door.behavior(), MB_ANIMATED_DOOR);
        assert_eq!(manifest.spawn.map(|s| s.facing), Some(Direction::Down));
    }
}
