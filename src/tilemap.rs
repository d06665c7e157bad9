use std::sync::Arc;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::behaviors;
use crate::components::{HeadlessMode, MovementConfig, TileSprite};
use crate::session::OverworldSession;
use crate::warp::WarpEvent;

pub struct TilemapPlugin;

impl Plugin for TilemapPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(SpawnedWorld::default())
            .add_systems(Update, sync_tile_sprites);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TileAttributes {
    #[serde(default)]
    pub behavior: u16,
    /// Static blockage bits; 0 is passable.
    #[serde(default)]
    pub collision: u8,
    /// 0 reaches everything, 15 is a universal bridge level.
    #[serde(default)]
    pub elevation: u8,
}

impl TileAttributes {
    pub const fn new(behavior: u16, collision: u8, elevation: u8) -> Self {
        Self {
            behavior,
            collision,
            elevation,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MapTile {
    #[serde(default)]
    pub metatile: u16,
    #[serde(flatten)]
    pub attributes: TileAttributes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedTile {
    pub metatile_id: u16,
    pub attributes: TileAttributes,
    /// Index into `WorldState::maps`.
    pub map_index: usize,
    pub local_x: i32,
    pub local_y: i32,
}

impl ResolvedTile {
    pub fn behavior(&self) -> u16 {
        self.attributes.behavior
    }
}

/// World tile lookup. Returns `None` outside every loaded map and never panics.
pub trait TileResolver {
    fn resolve(&self, x: i32, y: i32) -> Option<ResolvedTile>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapLayout {
    pub id: String,
    pub width: i32,
    pub height: i32,
    /// Row-major, `width * height` entries.
    pub tiles: Vec<MapTile>,
    #[serde(default)]
    pub warps: Vec<WarpEvent>,
}

/// `width * height`, or `None` for negative or overflowing dimensions.
fn tile_count(width: i32, height: i32) -> Option<usize> {
    if width < 0 || height < 0 {
        return None;
    }
    usize::try_from(width.checked_mul(height)?).ok()
}

impl MapLayout {
    /// A layout whose dimensions overflow gets no tiles and fails `is_well_formed`.
    pub fn filled(id: impl Into<String>, width: i32, height: i32, tile: MapTile) -> Self {
        let count = tile_count(width.max(0), height.max(0)).unwrap_or(0);
        Self {
            id: id.into(),
            width: width.max(0),
            height: height.max(0),
            tiles: vec![tile; count],
            warps: Vec::new(),
        }
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let idx = y.checked_mul(self.width)?.checked_add(x)?;
        usize::try_from(idx).ok()
    }

    pub fn tile(&self, x: i32, y: i32) -> Option<&MapTile> {
        self.tiles.get(self.index(x, y)?)
    }

    pub fn set_tile(&mut self, x: i32, y: i32, tile: MapTile) {
        if let Some(slot) = self.index(x, y).and_then(|idx| self.tiles.get_mut(idx)) {
            *slot = tile;
        }
    }

    pub fn set_attributes(&mut self, x: i32, y: i32, attributes: TileAttributes) {
        let metatile = self.tile(x, y).map(|t| t.metatile).unwrap_or_default();
        self.set_tile(
            x,
            y,
            MapTile {
                metatile,
                attributes,
            },
        );
    }

    pub fn warp_at(&self, x: i32, y: i32) -> Option<&WarpEvent> {
        self.warps.iter().find(|w| w.x == x && w.y == y)
    }

    pub fn with_warp(mut self, warp: WarpEvent) -> Self {
        self.warps.push(warp);
        self
    }

    pub fn is_well_formed(&self) -> bool {
        tile_count(self.width, self.height) == Some(self.tiles.len())
    }
}

/// A map placed in the stitched world coordinate space.
#[derive(Clone, Debug)]
pub struct WorldMap {
    pub layout: Arc<MapLayout>,
    pub offset_x: i32,
    pub offset_y: i32,
}

impl WorldMap {
    pub fn id(&self) -> &str {
        &self.layout.id
    }
}

/// The anchor map and its neighbors stitched into one coordinate space.
#[derive(Clone, Debug)]
pub struct WorldState {
    pub anchor_id: String,
    pub maps: Vec<WorldMap>,
}

impl WorldState {
    pub fn single(layout: MapLayout) -> Self {
        Self {
            anchor_id: layout.id.clone(),
            maps: vec![WorldMap {
                layout: Arc::new(layout),
                offset_x: 0,
                offset_y: 0,
            }],
        }
    }

    pub fn map(&self, index: usize) -> Option<&WorldMap> {
        self.maps.get(index)
    }

    pub fn find_map(&self, id: &str) -> Option<&WorldMap> {
        self.maps.iter().find(|m| m.id() == id)
    }

    pub fn anchor(&self) -> Option<&WorldMap> {
        self.find_map(&self.anchor_id).or_else(|| self.maps.first())
    }

    /// Total extent in tiles, as `(min_x, min_y, max_x, max_y)` exclusive of the max.
    pub fn bounds(&self) -> (i32, i32, i32, i32) {
        let mut bounds: Option<(i32, i32, i32, i32)> = None;
        for m in &self.maps {
            let (x0, y0) = (m.offset_x, m.offset_y);
            let (x1, y1) = (x0 + m.layout.width, y0 + m.layout.height);
            bounds = Some(match bounds {
                None => (x0, y0, x1, y1),
                Some((a, b, c, d)) => (a.min(x0), b.min(y0), c.max(x1), d.max(y1)),
            });
        }
        bounds.unwrap_or((0, 0, 0, 0))
    }
}

impl TileResolver for WorldState {
    fn resolve(&self, x: i32, y: i32) -> Option<ResolvedTile> {
        self.maps.iter().enumerate().find_map(|(map_index, m)| {
            let (lx, ly) = (x - m.offset_x, y - m.offset_y);
            m.layout.tile(lx, ly).map(|tile| ResolvedTile {
                metatile_id: tile.metatile,
                attributes: tile.attributes,
                map_index,
                local_x: lx,
                local_y: ly,
            })
        })
    }
}

/// Which world the tile sprites currently mirror.
#[derive(Resource, Default)]
struct SpawnedWorld {
    generation: Option<u64>,
}

fn sync_tile_sprites(
    mut commands: Commands,
    headless: Res<HeadlessMode>,
    movement: Res<MovementConfig>,
    session: Option<Res<OverworldSession>>,
    mut spawned: ResMut<SpawnedWorld>,
    existing: Query<Entity, With<TileSprite>>,
) {
    if headless.0 {
        return;
    }
    let Some(session) = session else {
        return;
    };
    let generation = session.world_generation();
    if spawned.generation == Some(generation) {
        return;
    }
    spawned.generation = Some(generation);

    for entity in existing.iter() {
        commands.entity(entity).despawn();
    }

    let ts = movement.tile_size;
    let world = session.world();
    for m in &world.maps {
        for ly in 0..m.layout.height {
            for lx in 0..m.layout.width {
                let Some(tile) = m.layout.tile(lx, ly) else {
                    continue;
                };
                let wx = (m.offset_x + lx) as f32 * ts + ts / 2.0;
                let wy = -((m.offset_y + ly) as f32 * ts + ts / 2.0);
                commands.spawn((
                    TileSprite,
                    tile_color_sprite(&tile.attributes, ts),
                    Transform::from_xyz(wx, wy, 0.0),
                ));
            }
        }
    }
}

pub fn tile_color_sprite(attributes: &TileAttributes, ts: f32) -> Sprite {
    let color = match behaviors::describe(attributes.behavior) {
        "door" => Color::srgb(0.55, 0.3, 0.15),
        "stairs" => Color::srgb(0.45, 0.4, 0.35),
        "arrow_warp" => Color::srgb(0.85, 0.75, 0.2),
        "teleport" => Color::srgb(0.6, 0.2, 0.7),
        "ledge" => Color::srgb(0.35, 0.5, 0.2),
        "water" => Color::srgb(0.15, 0.35, 0.75),
        "sand" => Color::srgb(0.85, 0.78, 0.5),
        "ice" => Color::srgb(0.75, 0.9, 0.95),
        "grass" => Color::srgb(0.2, 0.55, 0.2),
        _ if attributes.collision != 0 => Color::srgb(0.25, 0.25, 0.28),
        _ => Color::srgb(0.4, 0.65, 0.35),
    };
    Sprite::from_color(color, Vec2::new(ts, ts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(id: &str, w: i32, h: i32) -> MapLayout {
        MapLayout::filled(id, w, h, MapTile::default())
    }

    #[test]
    fn resolve_returns_none_outside_every_map() {
        let world = WorldState::single(plain("town", 4, 4));
        assert!(world.resolve(-1, 0).is_none());
        assert!(world.resolve(4, 0).is_none());
        assert!(world.resolve(3, 3).is_some());
    }

    #[test]
    fn resolve_uses_map_offsets() {
        let mut route = plain("route", 3, 3);
        route.set_attributes(1, 1, TileAttributes::new(behaviors::MB_TALL_GRASS, 0, 3));
        let world = WorldState {
            anchor_id: "town".into(),
            maps: vec![
                WorldMap {
                    layout: Arc::new(plain("town", 4, 4)),
                    offset_x: 0,
                    offset_y: 0,
                },
                WorldMap {
                    layout: Arc::new(route),
                    offset_x: 0,
                    offset_y: -3,
                },
            ],
        };
        let tile = world.resolve(1, -2).expect("route tile");
        assert_eq!(tile.map_index, 1);
        assert_eq!((tile.local_x, tile.local_y), (1, 1));
        assert_eq!(tile.behavior(), behaviors::MB_TALL_GRASS);
        assert_eq!(world.bounds(), (0, -3, 4, 4));
    }
}
