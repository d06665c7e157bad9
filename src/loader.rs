use std::sync::Arc;

use bevy::log::{debug, warn};
use crossbeam_channel::{Receiver, TryRecvError};

use crate::error::WorldLoadError;
use crate::tilemap::WorldState;
use crate::world_data::WorldBuilder;

/// A finished build for the newest request.
#[derive(Debug)]
pub struct CompletedLoad {
    pub generation: u64,
    pub anchor_map_id: String,
    pub result: Result<WorldState, WorldLoadError>,
}

struct PendingLoad {
    generation: u64,
    anchor_map_id: String,
    rx: Receiver<Result<WorldState, WorldLoadError>>,
}

/// Runs world builds off the tick thread and tags each with a generation.
/// Only a completion whose generation is still current is handed back.
pub struct WorldLoader {
    builder: Arc<dyn WorldBuilder>,
    inline: bool,
    generation: u64,
    pending: Vec<PendingLoad>,
}

impl WorldLoader {
    pub fn new(builder: Arc<dyn WorldBuilder>, inline: bool) -> Self {
        Self {
            builder,
            inline,
            generation: 0,
            pending: Vec::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Invalidates every outstanding build.
    pub fn bump_generation(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    /// True while the current generation still has a build outstanding.
    pub fn is_loading(&self) -> bool {
        self.pending.iter().any(|p| p.generation == self.generation)
    }

    /// Builds synchronously, bypassing the generation bookkeeping.
    pub fn build_now(&self, anchor_map_id: &str, depth: u32) -> Result<WorldState, WorldLoadError> {
        self.builder.build_world(anchor_map_id, depth)
    }

    /// Starts a build for the current generation.
    pub fn request(&mut self, anchor_map_id: &str, depth: u32) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let anchor = anchor_map_id.to_string();
        if self.inline {
            let _ = tx.send(self.builder.build_world(&anchor, depth));
        } else {
            let builder = Arc::clone(&self.builder);
            let worker_anchor = anchor.clone();
            let spawned = std::thread::Builder::new()
                .name("overworld-world-loader".into())
                .spawn(move || {
                    let _ = tx.send(builder.build_world(&worker_anchor, depth));
                });
            if let Err(e) = spawned {
                warn!(
                    "[Overworld loader] Could not start worker ({}); building '{}' inline",
                    e, anchor
                );
                let (tx, inline_rx) = crossbeam_channel::bounded(1);
                let _ = tx.send(self.builder.build_world(&anchor, depth));
                self.pending.push(PendingLoad {
                    generation: self.generation,
                    anchor_map_id: anchor,
                    rx: inline_rx,
                });
                return;
            }
        }
        self.pending.push(PendingLoad {
            generation: self.generation,
            anchor_map_id: anchor,
            rx,
        });
    }

    /// Collects finished builds. Stale completions are dropped here.
    pub fn poll(&mut self) -> Option<CompletedLoad> {
        let current = self.generation;
        let mut completed = None;
        self.pending.retain(|pending| {
            let result = match pending.rx.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => Err(WorldLoadError::WorkerDisconnected),
            };
            if pending.generation != current {
                debug!(
                    "[Overworld loader] Discarding stale build of '{}' (generation {} < {})",
                    pending.anchor_map_id, pending.generation, current
                );
            } else {
                completed = Some(CompletedLoad {
                    generation: pending.generation,
                    anchor_map_id: pending.anchor_map_id.clone(),
                    result,
                });
            }
            false
        });
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world_data::{demo_manifest, ManifestWorldBuilder};
    use std::time::{Duration, Instant};

    fn builder() -> Arc<dyn WorldBuilder> {
        Arc::new(ManifestWorldBuilder::from_manifest(&demo_manifest()).expect("demo"))
    }

    #[test]
    fn inline_build_completes_on_next_poll() {
        let mut loader = WorldLoader::new(builder(), true);
        let generation = loader.bump_generation();
        loader.request("house", 1);
        assert!(loader.is_loading());
        let done = loader.poll().expect("completed");
        assert_eq!(done.generation, generation);
        assert_eq!(done.result.expect("ok").anchor_id, "house");
        assert!(!loader.is_loading());
    }

    #[test]
    fn stale_generation_is_discarded() {
        let mut loader = WorldLoader::new(builder(), true);
        loader.bump_generation();
        loader.request("house", 1);
        loader.bump_generation();
        assert!(loader.poll().is_none());
        assert!(!loader.is_loading());
    }

    #[test]
    fn threaded_build_reports_errors() {
        let mut loader = WorldLoader::new(builder(), false);
        loader.bump_generation();
        loader.request("missing", 1);
        let deadline = Instant::now() + Duration::from_secs(5);
        let done = loop {
            if let Some(done) = loader.poll() {
                break done;
            }
            assert!(Instant::now() < deadline, "worker never reported");
            std::thread::sleep(Duration::from_millis(2));
        };
        assert!(matches!(done.result, Err(WorldLoadError::UnknownMap(_))));
    }
}
