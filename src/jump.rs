//! Vertical bob tables for ledge and scripted jumps.

use serde::Serialize;

use crate::components::Direction;

pub const ARC_LEN: usize = 16;

/// Signed pixel offsets per frame; negative is up.
pub const HIGH_ARC: [i8; ARC_LEN] = [-4, -6, -8, -10, -11, -12, -12, -12, -11, -10, -9, -8, -6, -4, 0, 0];
pub const NORMAL_ARC: [i8; ARC_LEN] = [-2, -4, -6, -8, -9, -10, -10, -10, -9, -8, -6, -5, -3, -2, 0, 0];
pub const LOW_ARC: [i8; ARC_LEN] = [0, -2, -3, -4, -5, -6, -6, -6, -5, -5, -4, -3, -2, 0, 0, 0];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpDistance {
    InPlace,
    Normal,
    Far,
}

impl JumpDistance {
    pub fn tiles(self) -> i32 {
        match self {
            JumpDistance::InPlace => 0,
            JumpDistance::Normal => 1,
            JumpDistance::Far => 2,
        }
    }

    pub fn frame_count(self) -> u32 {
        match self {
            JumpDistance::Far => 32,
            JumpDistance::InPlace | JumpDistance::Normal => 16,
        }
    }

    pub fn duration_ms(self, frame_ms: f32) -> f32 {
        self.frame_count() as f32 * frame_ms
    }

    pub fn arc(self) -> &'static [i8; ARC_LEN] {
        match self {
            JumpDistance::InPlace => &LOW_ARC,
            JumpDistance::Normal => &NORMAL_ARC,
            JumpDistance::Far => &HIGH_ARC,
        }
    }

    /// Sprite offset for a frame. Far jumps advance the table every second frame.
    pub fn vertical_offset(self, frame: u32) -> f32 {
        let index = match self {
            JumpDistance::Far => frame >> 1,
            JumpDistance::InPlace | JumpDistance::Normal => frame,
        };
        let index = (index as usize).min(ARC_LEN - 1);
        self.arc()[index] as f32
    }
}

/// Progress of one jump, tracked in pixels relative to the start tile.
#[derive(Clone, Debug, PartialEq)]
pub struct JumpMotion {
    pub distance: JumpDistance,
    pub direction: Direction,
    pub start_tile: (i32, i32),
    pub elapsed_ms: f32,
    pub duration_ms: f32,
    frame_ms: f32,
}

impl JumpMotion {
    pub fn new(
        start_tile: (i32, i32),
        direction: Direction,
        distance: JumpDistance,
        frame_ms: f32,
    ) -> Self {
        Self {
            distance,
            direction,
            start_tile,
            elapsed_ms: 0.0,
            duration_ms: distance.duration_ms(frame_ms),
            frame_ms,
        }
    }

    pub fn landing_tile(&self) -> (i32, i32) {
        let (dx, dy) = self.direction.delta();
        let n = self.distance.tiles();
        (self.start_tile.0 + dx * n, self.start_tile.1 + dy * n)
    }

    pub fn advance(&mut self, dt_ms: f32) {
        self.elapsed_ms = (self.elapsed_ms + dt_ms.max(0.0)).min(self.duration_ms);
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed_ms >= self.duration_ms
    }

    pub fn progress(&self) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        (self.elapsed_ms / self.duration_ms).clamp(0.0, 1.0)
    }

    pub fn frame(&self) -> u32 {
        if self.frame_ms <= 0.0 {
            return 0;
        }
        (self.elapsed_ms / self.frame_ms) as u32
    }

    pub fn vertical_offset(&self) -> f32 {
        self.distance.vertical_offset(self.frame())
    }

    pub fn start_pixel(&self, tile_size: f32) -> (f32, f32) {
        (
            self.start_tile.0 as f32 * tile_size,
            self.start_tile.1 as f32 * tile_size,
        )
    }

    pub fn target_pixel(&self, tile_size: f32) -> (f32, f32) {
        let (x, y) = self.landing_tile();
        (x as f32 * tile_size, y as f32 * tile_size)
    }

    /// Rendered top-left pixel, without the vertical bob.
    pub fn pixel_position(&self, tile_size: f32) -> (f32, f32) {
        let (sx, sy) = self.start_pixel(tile_size);
        let (tx, ty) = self.target_pixel(tile_size);
        let t = self.progress();
        (sx + (tx - sx) * t, sy + (ty - sy) * t)
    }

    /// Tile the sprite visually occupies; trails the logical landing tile.
    pub fn visual_tile(&self) -> (i32, i32) {
        let (dx, dy) = self.direction.delta();
        let covered = (self.progress() * self.distance.tiles() as f32).floor() as i32;
        (self.start_tile.0 + dx * covered, self.start_tile.1 + dy * covered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_MS: f32 = 1000.0 / 60.0;

    #[test]
    fn far_jump_samples_every_second_frame() {
        assert_eq!(JumpDistance::Far.vertical_offset(0), -4.0);
        assert_eq!(JumpDistance::Far.vertical_offset(1), -4.0);
        assert_eq!(JumpDistance::Far.vertical_offset(2), -6.0);
        assert_eq!(JumpDistance::Far.vertical_offset(31), 0.0);
        assert_eq!(JumpDistance::Far.vertical_offset(500), 0.0);
    }

    #[test]
    fn normal_and_in_place_use_their_own_tables() {
        assert_eq!(JumpDistance::Normal.vertical_offset(5), -10.0);
        assert_eq!(JumpDistance::InPlace.vertical_offset(0), 0.0);
        assert_eq!(JumpDistance::InPlace.vertical_offset(5), -6.0);
        assert_eq!(JumpDistance::Normal.vertical_offset(99), 0.0);
    }

    #[test]
    fn south_jump_increases_y() {
        let motion = JumpMotion::new((5, 5), Direction::Down, JumpDistance::Far, FRAME_MS);
        assert_eq!(motion.landing_tile(), (5, 7));
        let mut halfway = motion.clone();
        halfway.advance(motion.duration_ms / 2.0);
        let (_, y) = halfway.pixel_position(16.0);
        assert!(y > 5.0 * 16.0);
    }

    #[test]
    fn visual_tile_trails_the_landing_tile() {
        let mut motion = JumpMotion::new((20, 10), Direction::Right, JumpDistance::Far, FRAME_MS);
        motion.advance(200.0);
        assert_eq!(motion.visual_tile(), (20, 10));
        motion.advance(70.0);
        assert_eq!(motion.visual_tile(), (21, 10));
        assert!(!motion.is_complete());
        motion.advance(300.0);
        assert_eq!(motion.visual_tile(), (22, 10));
        assert!(motion.is_complete());
    }
}
