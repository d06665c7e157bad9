use std::collections::{BTreeMap, HashSet};

use bevy::log::{debug, warn};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AnimationId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorAnimKind {
    Open,
    Close,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DoorAnimationRequest {
    pub kind: DoorAnimKind,
    pub x: i32,
    pub y: i32,
    pub metatile_id: u16,
    pub started_at_ms: f64,
    /// Keep showing the last frame after the animation ends.
    pub hold_last_frame: bool,
}

/// Door animation playback as seen by the door sequencer.
///
/// `spawn` may fail (unknown door graphics, exhausted assets); the sequencer
/// then treats the animation as already finished. `is_finished` must answer
/// true for ids it does not know.
pub trait AnimationSpawner: Send + Sync {
    fn spawn(&mut self, request: DoorAnimationRequest) -> Option<AnimationId>;
    fn remove(&mut self, id: AnimationId);
    fn clear(&mut self);
    fn is_finished(&self, id: AnimationId, now_ms: f64) -> bool;
}

#[derive(Clone, Debug, Serialize)]
pub struct DoorAnimation {
    pub id: AnimationId,
    #[serde(flatten)]
    pub request: DoorAnimationRequest,
    pub frame_count: u32,
    pub frame_ms: f32,
}

impl DoorAnimation {
    pub fn duration_ms(&self) -> f64 {
        f64::from(self.frame_ms) * f64::from(self.frame_count)
    }

    pub fn is_finished(&self, now_ms: f64) -> bool {
        now_ms - self.request.started_at_ms >= self.duration_ms()
    }

    /// Frame index to draw; closing doors play the open frames backwards.
    pub fn frame(&self, now_ms: f64) -> u32 {
        let last = self.frame_count.saturating_sub(1);
        let elapsed = (now_ms - self.request.started_at_ms).max(0.0);
        let step = if self.frame_ms > 0.0 {
            ((elapsed / f64::from(self.frame_ms)) as u32).min(last)
        } else {
            last
        };
        match self.request.kind {
            DoorAnimKind::Open => step,
            DoorAnimKind::Close => last - step,
        }
    }
}

/// In-memory door animation list. With a catalog, only listed metatiles
/// have door graphics.
#[derive(Clone, Debug)]
pub struct DoorAnimationRegistry {
    animations: BTreeMap<AnimationId, DoorAnimation>,
    next_id: u64,
    frame_ms: f32,
    frame_count: u32,
    catalog: Option<HashSet<u16>>,
}

impl DoorAnimationRegistry {
    pub fn new(frame_ms: f32, frame_count: u32) -> Self {
        Self {
            animations: BTreeMap::new(),
            next_id: 1,
            frame_ms,
            frame_count: frame_count.max(1),
            catalog: None,
        }
    }

    pub fn with_catalog(mut self, metatiles: impl IntoIterator<Item = u16>) -> Self {
        self.catalog = Some(metatiles.into_iter().collect());
        self
    }

    pub fn animation_ms(&self) -> f64 {
        f64::from(self.frame_ms) * f64::from(self.frame_count)
    }

    pub fn get(&self, id: AnimationId) -> Option<&DoorAnimation> {
        self.animations.get(&id)
    }

    pub fn active(&self) -> impl Iterator<Item = &DoorAnimation> {
        self.animations.values()
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    /// Drops finished animations that do not hold their last frame.
    pub fn prune(&mut self, now_ms: f64) {
        self.animations
            .retain(|_, anim| anim.request.hold_last_frame || !anim.is_finished(now_ms));
    }
}

impl AnimationSpawner for DoorAnimationRegistry {
    fn spawn(&mut self, request: DoorAnimationRequest) -> Option<AnimationId> {
        if let Some(catalog) = &self.catalog {
            if !catalog.contains(&request.metatile_id) {
                warn!(
                    "[Overworld door] No door graphics for metatile {:#x} at ({}, {})",
                    request.metatile_id, request.x, request.y
                );
                return None;
            }
        }
        let id = AnimationId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        debug!(
            "[Overworld door] Spawned {:?} animation {} at ({}, {})",
            request.kind, id.0, request.x, request.y
        );
        self.animations.insert(
            id,
            DoorAnimation {
                id,
                request,
                frame_count: self.frame_count,
                frame_ms: self.frame_ms,
            },
        );
        Some(id)
    }

    fn remove(&mut self, id: AnimationId) {
        self.animations.remove(&id);
    }

    fn clear(&mut self) {
        self.animations.clear();
    }

    fn is_finished(&self, id: AnimationId, now_ms: f64) -> bool {
        self.animations
            .get(&id)
            .is_none_or(|anim| anim.is_finished(now_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: DoorAnimKind, started_at_ms: f64, hold: bool) -> DoorAnimationRequest {
        DoorAnimationRequest {
            kind,
            x: 4,
            y: 2,
            metatile_id: 0x21,
            started_at_ms,
            hold_last_frame: hold,
        }
    }

    #[test]
    fn animation_finishes_after_all_frames() {
        let mut registry = DoorAnimationRegistry::new(90.0, 3);
        let id = registry
            .spawn(request(DoorAnimKind::Open, 1000.0, true))
            .expect("spawned");
        assert!(!registry.is_finished(id, 1200.0));
        assert!(registry.is_finished(id, 1270.0));
        assert_eq!(registry.get(id).map(|a| a.frame(1100.0)), Some(1));
        assert_eq!(registry.get(id).map(|a| a.frame(9000.0)), Some(2));
    }

    #[test]
    fn close_animation_runs_backwards() {
        let mut registry = DoorAnimationRegistry::new(90.0, 3);
        let id = registry
            .spawn(request(DoorAnimKind::Close, 0.0, false))
            .expect("spawned");
        let anim = registry.get(id).expect("present");
        assert_eq!(anim.frame(0.0), 2);
        assert_eq!(anim.frame(200.0), 0);
    }

    #[test]
    fn unknown_ids_count_as_finished() {
        let registry = DoorAnimationRegistry::new(90.0, 3);
        assert!(registry.is_finished(AnimationId(42), 0.0));
    }

    #[test]
    fn catalog_rejects_unknown_metatiles() {
        let mut registry = DoorAnimationRegistry::new(90.0, 3).with_catalog([0x99]);
        assert!(registry.spawn(request(DoorAnimKind::Open, 0.0, true)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn prune_keeps_held_animations() {
        let mut registry = DoorAnimationRegistry::new(90.0, 3);
        let held = registry
            .spawn(request(DoorAnimKind::Open, 0.0, true))
            .expect("spawned");
        registry.spawn(request(DoorAnimKind::Close, 0.0, false));
        registry.prune(1000.0);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(held).is_some());
        registry.clear();
        assert!(registry.is_empty());
    }
}
