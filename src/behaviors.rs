//! Metatile behavior codes and the predicates the movement and warp code asks of them.

use crate::components::Direction;

pub const MB_NORMAL: u16 = 0x00;
pub const MB_SECRET_BASE_WALL: u16 = 0x01;
pub const MB_TALL_GRASS: u16 = 0x02;
pub const MB_LONG_GRASS: u16 = 0x03;
pub const MB_DEEP_SAND: u16 = 0x06;
pub const MB_SHORT_GRASS: u16 = 0x07;
pub const MB_NO_RUNNING: u16 = 0x0A;
pub const MB_BATTLE_PYRAMID_WARP: u16 = 0x0D;
pub const MB_MOSSDEEP_GYM_WARP: u16 = 0x0E;
pub const MB_MT_PYRE_HOLE: u16 = 0x0F;
pub const MB_POND_WATER: u16 = 0x10;
pub const MB_INTERIOR_DEEP_WATER: u16 = 0x11;
pub const MB_DEEP_WATER: u16 = 0x12;
pub const MB_WATERFALL: u16 = 0x13;
pub const MB_SOOTOPOLIS_DEEP_WATER: u16 = 0x14;
pub const MB_OCEAN_WATER: u16 = 0x15;
pub const MB_PUDDLE: u16 = 0x16;
pub const MB_SHALLOW_WATER: u16 = 0x17;
pub const MB_NO_SURFACING: u16 = 0x18;
pub const MB_ICE: u16 = 0x20;
pub const MB_SAND: u16 = 0x21;
pub const MB_SEAWEED: u16 = 0x22;
pub const MB_HOT_SPRINGS: u16 = 0x28;
pub const MB_LAVARIDGE_GYM_B1F_WARP: u16 = 0x29;
pub const MB_SEAWEED_NO_SURFACING: u16 = 0x2A;
pub const MB_IMPASSABLE_EAST: u16 = 0x30;
pub const MB_IMPASSABLE_WEST: u16 = 0x31;
pub const MB_IMPASSABLE_NORTH: u16 = 0x32;
pub const MB_IMPASSABLE_SOUTH: u16 = 0x33;
pub const MB_IMPASSABLE_NORTHEAST: u16 = 0x34;
pub const MB_IMPASSABLE_NORTHWEST: u16 = 0x35;
pub const MB_IMPASSABLE_SOUTHEAST: u16 = 0x36;
pub const MB_IMPASSABLE_SOUTHWEST: u16 = 0x37;
pub const MB_JUMP_EAST: u16 = 0x38;
pub const MB_JUMP_WEST: u16 = 0x39;
pub const MB_JUMP_NORTH: u16 = 0x3A;
pub const MB_JUMP_SOUTH: u16 = 0x3B;
pub const MB_JUMP_NORTHEAST: u16 = 0x3C;
pub const MB_JUMP_NORTHWEST: u16 = 0x3D;
pub const MB_JUMP_SOUTHEAST: u16 = 0x3E;
pub const MB_JUMP_SOUTHWEST: u16 = 0x3F;
pub const MB_NON_ANIMATED_DOOR: u16 = 0x60;
pub const MB_LADDER: u16 = 0x61;
pub const MB_EAST_ARROW_WARP: u16 = 0x62;
pub const MB_WEST_ARROW_WARP: u16 = 0x63;
pub const MB_NORTH_ARROW_WARP: u16 = 0x64;
pub const MB_SOUTH_ARROW_WARP: u16 = 0x65;
pub const MB_AQUA_HIDEOUT_WARP: u16 = 0x67;
pub const MB_LAVARIDGE_GYM_1F_WARP: u16 = 0x68;
pub const MB_ANIMATED_DOOR: u16 = 0x69;
pub const MB_WATER_DOOR: u16 = 0x6C;
pub const MB_WATER_SOUTH_ARROW_WARP: u16 = 0x6D;
pub const MB_DEEP_SOUTH_WARP: u16 = 0x6E;
pub const MB_BRIDGE_OVER_OCEAN: u16 = 0x70;
pub const MB_BRIDGE_OVER_POND_LOW: u16 = 0x71;
pub const MB_BRIDGE_OVER_POND_MED: u16 = 0x72;
pub const MB_BRIDGE_OVER_POND_HIGH: u16 = 0x73;
pub const MB_IMPASSABLE_SOUTH_AND_NORTH: u16 = 0xC0;
pub const MB_IMPASSABLE_WEST_AND_EAST: u16 = 0xC1;
pub const MB_MUDDY_SLOPE: u16 = 0xD0;
pub const MB_BUMPY_SLOPE: u16 = 0xD1;
pub const MB_CRACKED_FLOOR: u16 = 0xD2;
pub const MB_ISOLATED_VERTICAL_RAIL: u16 = 0xD3;
pub const MB_ISOLATED_HORIZONTAL_RAIL: u16 = 0xD4;
pub const MB_VERTICAL_RAIL: u16 = 0xD5;
pub const MB_HORIZONTAL_RAIL: u16 = 0xD6;

pub fn is_sand(behavior: u16) -> bool {
    matches!(behavior, MB_SAND | MB_DEEP_SAND)
}

/// Doors that play an open/close animation.
pub fn is_door(behavior: u16) -> bool {
    matches!(behavior, MB_ANIMATED_DOOR | MB_WATER_DOOR)
}

/// Stairs, ladders and similar: a door choreography without animation.
pub fn is_non_animated_door(behavior: u16) -> bool {
    matches!(behavior, MB_NON_ANIMATED_DOOR | MB_DEEP_SOUTH_WARP)
}

pub fn requires_door_exit_sequence(behavior: u16) -> bool {
    is_door(behavior) || is_non_animated_door(behavior)
}

pub fn is_teleport_warp(behavior: u16) -> bool {
    matches!(
        behavior,
        MB_AQUA_HIDEOUT_WARP
            | MB_LAVARIDGE_GYM_1F_WARP
            | MB_LAVARIDGE_GYM_B1F_WARP
            | MB_BATTLE_PYRAMID_WARP
            | MB_MOSSDEEP_GYM_WARP
            | MB_DEEP_SOUTH_WARP
            | MB_MT_PYRE_HOLE
    )
}

pub fn arrow_warp_direction(behavior: u16) -> Option<Direction> {
    match behavior {
        MB_SOUTH_ARROW_WARP | MB_WATER_SOUTH_ARROW_WARP => Some(Direction::Down),
        MB_NORTH_ARROW_WARP => Some(Direction::Up),
        MB_WEST_ARROW_WARP => Some(Direction::Left),
        MB_EAST_ARROW_WARP => Some(Direction::Right),
        _ => None,
    }
}

pub fn is_arrow_warp(behavior: u16) -> bool {
    arrow_warp_direction(behavior).is_some()
}

/// Water that needs a surf-capable travel mode.
pub fn is_surfable(behavior: u16) -> bool {
    matches!(
        behavior,
        MB_POND_WATER
            | MB_INTERIOR_DEEP_WATER
            | MB_DEEP_WATER
            | MB_WATERFALL
            | MB_SOOTOPOLIS_DEEP_WATER
            | MB_OCEAN_WATER
            | MB_NO_SURFACING
            | MB_SEAWEED
            | MB_SEAWEED_NO_SURFACING
            | MB_WATER_SOUTH_ARROW_WARP
    )
}

pub fn is_explicitly_impassable(behavior: u16) -> bool {
    behavior == MB_SECRET_BASE_WALL
}

pub fn is_directionally_impassable(behavior: u16) -> bool {
    (MB_IMPASSABLE_EAST..=MB_JUMP_SOUTHWEST).contains(&behavior)
        || matches!(
            behavior,
            MB_IMPASSABLE_SOUTH_AND_NORTH | MB_IMPASSABLE_WEST_AND_EAST
        )
}

/// Direction a ledge must be approached from to jump it. Diagonal ledges never jump.
pub fn ledge_direction(behavior: u16) -> Option<Direction> {
    match behavior {
        MB_JUMP_EAST => Some(Direction::Right),
        MB_JUMP_WEST => Some(Direction::Left),
        MB_JUMP_NORTH => Some(Direction::Up),
        MB_JUMP_SOUTH => Some(Direction::Down),
        _ => None,
    }
}

pub fn is_ice(behavior: u16) -> bool {
    behavior == MB_ICE
}

pub fn forbids_running(behavior: u16) -> bool {
    matches!(
        behavior,
        MB_NO_RUNNING | MB_LONG_GRASS | MB_HOT_SPRINGS | MB_DEEP_SAND
    )
}

pub fn is_tall_grass(behavior: u16) -> bool {
    matches!(behavior, MB_TALL_GRASS | MB_LONG_GRASS)
}

pub fn is_rail(behavior: u16) -> bool {
    (MB_ISOLATED_VERTICAL_RAIL..=MB_HORIZONTAL_RAIL).contains(&behavior)
}

/// Short label used in event payloads and the inspection API.
pub fn describe(behavior: u16) -> &'static str {
    if is_door(behavior) {
        "door"
    } else if is_non_animated_door(behavior) {
        "stairs"
    } else if is_arrow_warp(behavior) {
        "arrow_warp"
    } else if is_teleport_warp(behavior) {
        "teleport"
    } else if ledge_direction(behavior).is_some() {
        "ledge"
    } else if is_surfable(behavior) {
        "water"
    } else if is_sand(behavior) {
        "sand"
    } else if is_ice(behavior) {
        "ice"
    } else if is_tall_grass(behavior) {
        "grass"
    } else if is_rail(behavior) {
        "rail"
    } else if matches!(behavior, MB_MUDDY_SLOPE | MB_BUMPY_SLOPE) {
        "slope"
    } else {
        "normal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_south_warp_is_a_stair_and_a_teleport() {
        assert!(is_non_animated_door(MB_DEEP_SOUTH_WARP));
        assert!(is_teleport_warp(MB_DEEP_SOUTH_WARP));
        assert!(requires_door_exit_sequence(MB_DEEP_SOUTH_WARP));
    }

    #[test]
    fn ledges_are_in_the_directional_impassable_range() {
        for b in [MB_JUMP_EAST, MB_JUMP_WEST, MB_JUMP_NORTH, MB_JUMP_SOUTH] {
            assert!(is_directionally_impassable(b));
            assert!(ledge_direction(b).is_some());
        }
        assert!(ledge_direction(MB_JUMP_SOUTHWEST).is_none());
        assert!(!is_directionally_impassable(MB_NORMAL));
    }

    #[test]
    fn arrow_directions() {
        assert_eq!(arrow_warp_direction(MB_WATER_SOUTH_ARROW_WARP), Some(Direction::Down));
        assert_eq!(arrow_warp_direction(MB_NORTH_ARROW_WARP), Some(Direction::Up));
        assert_eq!(arrow_warp_direction(MB_EAST_ARROW_WARP), Some(Direction::Right));
        assert_eq!(arrow_warp_direction(MB_ANIMATED_DOOR), None);
    }
}
