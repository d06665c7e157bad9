use std::sync::Arc;

use bevy::prelude::*;
use crossbeam_channel::Receiver;
use serde::Serialize;
use serde_json::json;

use crate::collision::ObjectOccupancy;
use crate::components::{Direction, MovementConfig, TravelMode, WarpConfig};
use crate::door::{
    DoorCommand, DoorEntryPlan, DoorEntrySequence, DoorExitSequence, DoorTimings, DoorView,
    EntryStage, ExitStage,
};
use crate::door_anims::{DoorAnimation, DoorAnimationRegistry};
use crate::error::WorldLoadError;
use crate::events::GameEventBus;
use crate::input::VirtualInput;
use crate::loader::WorldLoader;
use crate::movement::{MovementStateKind, RenderFrame, StepContext};
use crate::orchestrator::{ActiveWarp, WarpOptions};
use crate::player::{DoorWarpRequest, ForceMoveOptions, MovementEvent, Player};
use crate::screen_effects::{FadeController, FadeMode};
use crate::tilemap::{TileResolver, WorldState};
use crate::warp::{self, WalkOverAction, WarpEvent, WarpKind, WarpProtocol, WarpRuntimeState, WarpTrigger};
use crate::world_data::{ManifestWorldBuilder, SpawnPoint, WorldBuilder, WorldManifest};

pub struct OverworldPlugin;

impl Plugin for OverworldPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            (tick_session, forward_session_events)
                .chain()
                .run_if(resource_exists::<OverworldSession>),
        );
    }
}

fn tick_session(
    time: Res<Time>,
    input: Res<VirtualInput>,
    mut session: ResMut<OverworldSession>,
) {
    let dt_ms = time.delta_secs() * 1000.0;
    session.tick(&input, dt_ms);
}

fn forward_session_events(mut session: ResMut<OverworldSession>, mut bus: ResMut<GameEventBus>) {
    bus.frame = bus.frame.saturating_add(1);
    for (name, data) in session.drain_events() {
        bus.emit(name, data);
    }
}

/// Point-in-time view of the entity and the transition machinery.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    pub now_ms: f64,
    pub map_id: Option<String>,
    pub tile: (i32, i32),
    pub visual_tile: (i32, i32),
    pub pixel: (f32, f32),
    pub facing: Direction,
    pub state: MovementStateKind,
    pub travel_mode: TravelMode,
    pub elevation: u8,
    pub previous_elevation: u8,
    pub moving: bool,
    pub input_locked: bool,
    pub hidden: bool,
    pub render: RenderFrame,
    pub warp: WarpRuntimeState,
    pub entry_stage: EntryStage,
    pub exit_stage: ExitStage,
    pub fade_alpha: f32,
    pub world_generation: u64,
}

/// Owns the entity, the loaded world and every transition in flight.
#[derive(Resource)]
pub struct OverworldSession {
    pub(crate) movement: MovementConfig,
    pub(crate) warp_config: WarpConfig,
    pub(crate) timings: DoorTimings,
    pub(crate) world: WorldState,
    pub(crate) world_generation: u64,
    pub(crate) player: Player,
    pub(crate) objects: ObjectOccupancy,
    pub(crate) warp: WarpRuntimeState,
    pub(crate) entry: DoorEntrySequence,
    pub(crate) exit: DoorExitSequence,
    pub(crate) anims: DoorAnimationRegistry,
    pub(crate) fade: FadeController,
    pub(crate) loader: WorldLoader,
    pub(crate) active_warp: Option<ActiveWarp>,
    /// Walk-over warp waiting for its fade-out.
    pub(crate) pending_walk_over: Option<WarpTrigger>,
    pub(crate) now_ms: f64,
    door_requests: Receiver<DoorWarpRequest>,
    events: Vec<(&'static str, serde_json::Value)>,
}

impl OverworldSession {
    pub fn new(
        builder: Arc<dyn WorldBuilder>,
        spawn: &SpawnPoint,
        movement: MovementConfig,
        warp_config: WarpConfig,
        door_metatiles: &[u16],
    ) -> Result<Self, WorldLoadError> {
        let loader = WorldLoader::new(builder, warp_config.inline_loads);
        let world = loader.build_now(&spawn.map, warp_config.connection_depth)?;
        let origin = world
            .find_map(&spawn.map)
            .map(|m| (m.offset_x, m.offset_y))
            .unwrap_or_default();
        let tile = (origin.0 + spawn.x, origin.1 + spawn.y);

        let mut player = Player::spawn(tile, spawn.facing, spawn.travel_mode, &world);
        let (tx, door_requests) = crossbeam_channel::unbounded();
        player.set_door_warp_handler(Box::new(move |request: DoorWarpRequest| {
            let _ = tx.send(request);
        }));

        let mut anims =
            DoorAnimationRegistry::new(warp_config.door_frame_ms, warp_config.door_frame_count);
        if !door_metatiles.is_empty() {
            anims = anims.with_catalog(door_metatiles.iter().copied());
        }

        let mut warp = WarpRuntimeState::default();
        if let Some(resolved) = world.resolve(tile.0, tile.1) {
            if let Some(map) = world.map(resolved.map_index) {
                warp.last_checked_tile = Some(warp::CheckedTile {
                    map_id: map.id().to_string(),
                    x: tile.0,
                    y: tile.1,
                });
            }
        }

        info!(
            "[Overworld] Session spawned on '{}' at ({}, {})",
            spawn.map, tile.0, tile.1
        );
        Ok(Self {
            timings: DoorTimings::from(&warp_config),
            movement,
            warp_config,
            world,
            world_generation: 0,
            player,
            objects: ObjectOccupancy::default(),
            warp,
            entry: DoorEntrySequence::default(),
            exit: DoorExitSequence::default(),
            anims,
            fade: FadeController::default(),
            loader,
            active_warp: None,
            pending_walk_over: None,
            now_ms: 0.0,
            door_requests,
            events: Vec::new(),
        })
    }

    pub fn from_manifest(
        manifest: &WorldManifest,
        movement: MovementConfig,
        warp_config: WarpConfig,
    ) -> Result<Self, WorldLoadError> {
        let builder = ManifestWorldBuilder::from_manifest(manifest)?;
        let spawn = match &manifest.spawn {
            Some(spawn) => spawn.clone(),
            None => {
                let first = manifest
                    .maps
                    .first()
                    .ok_or_else(|| WorldLoadError::UnknownMap("<empty manifest>".into()))?;
                SpawnPoint {
                    map: first.layout.id.clone(),
                    x: first.layout.width / 2,
                    y: first.layout.height / 2,
                    facing: Direction::Down,
                    travel_mode: TravelMode::Foot,
                }
            }
        };
        Self::new(
            Arc::new(builder),
            &spawn,
            movement,
            warp_config,
            &manifest.door_metatiles,
        )
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Bumped every time a warp replaces the world.
    pub fn world_generation(&self) -> u64 {
        self.world_generation
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn movement_config(&self) -> &MovementConfig {
        &self.movement
    }

    pub fn objects_mut(&mut self) -> &mut ObjectOccupancy {
        &mut self.objects
    }

    pub fn entry_stage(&self) -> EntryStage {
        self.entry.stage
    }

    pub fn exit_stage(&self) -> ExitStage {
        self.exit.stage
    }

    pub fn door_sequence_active(&self) -> bool {
        self.entry.is_active() || self.exit.is_active()
    }

    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    pub fn fade_alpha(&self) -> f32 {
        self.fade.alpha(self.now_ms)
    }

    pub fn fade(&self) -> &FadeController {
        &self.fade
    }

    pub fn door_animations(&self) -> impl Iterator<Item = &DoorAnimation> {
        self.anims.active()
    }

    pub fn set_travel_mode(&mut self, mode: TravelMode) {
        self.player.set_travel_mode(mode);
    }

    pub fn drain_events(&mut self) -> Vec<(&'static str, serde_json::Value)> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn emit(&mut self, name: &'static str, data: serde_json::Value) {
        self.events.push((name, data));
    }

    pub fn current_map_id(&self) -> Option<&str> {
        let (x, y) = self.player.tile();
        let tile = self.world.resolve(x, y)?;
        self.world.map(tile.map_index).map(|m| m.id())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let body = &self.player.body;
        SessionSnapshot {
            now_ms: self.now_ms,
            map_id: self.current_map_id().map(str::to_string),
            tile: self.player.tile(),
            visual_tile: self.player.visual_tile(),
            pixel: self.player.pixel_position(self.movement.tile_size),
            facing: body.facing,
            state: self.player.state_kind(),
            travel_mode: body.travel_mode,
            elevation: body.elevation,
            previous_elevation: body.previous_elevation,
            moving: body.is_moving,
            input_locked: body.input_locked,
            hidden: body.hidden,
            render: self.player.render_frame(),
            warp: self.warp.clone(),
            entry_stage: self.entry.stage,
            exit_stage: self.exit.stage,
            fade_alpha: self.fade_alpha(),
            world_generation: self.world_generation,
        }
    }

    /// Warps to a warp event on any known map, as a script or the API would.
    pub fn warp_to(&mut self, map_id: &str, warp_id: usize) -> Result<(), String> {
        let (x, y) = self.player.tile();
        let trigger = WarpTrigger {
            kind: WarpKind::Teleport,
            source_map: self.current_map_id().unwrap_or_default().to_string(),
            warp_event: WarpEvent {
                x,
                y,
                dest_map: map_id.to_string(),
                dest_warp_id: warp_id,
            },
            behavior: 0,
            facing: self.player.facing(),
        };
        if self.perform_warp(trigger, WarpOptions::default()) {
            Ok(())
        } else {
            Err("A warp is already in progress".to_string())
        }
    }

    /// One fixed step of the whole overworld.
    pub fn tick(&mut self, input: &VirtualInput, dt_ms: f32) {
        self.now_ms += f64::from(dt_ms.max(0.0));
        self.warp.update(dt_ms);
        self.anims.prune(self.now_ms);

        let ctx = StepContext {
            tiles: &self.world,
            objects: &self.objects,
            config: &self.movement,
        };
        self.player.handle_input(input, &ctx);
        while let Ok(request) = self.door_requests.try_recv() {
            self.handle_door_warp_request(request);
        }

        let ctx = StepContext {
            tiles: &self.world,
            objects: &self.objects,
            config: &self.movement,
        };
        self.player.update(dt_ms, &ctx);
        self.forward_movement_events();

        self.advance_door_sequences();
        self.advance_pending_walk_over();
        self.poll_world_load();
        self.check_walk_over();
    }

    fn forward_movement_events(&mut self) {
        for event in self.player.drain_events() {
            match event {
                MovementEvent::TileEntered { x, y, behavior } => self.emit(
                    "tile_entered",
                    json!({ "x": x, "y": y, "behavior": behavior }),
                ),
                MovementEvent::JumpLanded { x, y } => {
                    self.emit("jump_landed", json!({ "x": x, "y": y }))
                }
                MovementEvent::SlideStarted { .. } => {}
            }
        }
    }

    fn handle_door_warp_request(&mut self, request: DoorWarpRequest) {
        if self.entry.is_active() || self.warp.in_progress {
            debug!("[Overworld door] Door warp ignored: a transition is already running");
            return;
        }
        let facing = self.player.facing();
        let Some(trigger) = warp::trigger_at(&self.world, request.target_x, request.target_y, facing)
        else {
            debug!(
                "[Overworld door] No warp event at ({}, {})",
                request.target_x, request.target_y
            );
            return;
        };

        match warp::classify(request.behavior) {
            Some(WarpProtocol::Arrow(direction)) => {
                if facing != direction {
                    return;
                }
                self.start_auto_door_warp(trigger, facing);
            }
            Some(WarpProtocol::AnimatedDoor) => {
                self.player.lock_input();
                self.warp.in_progress = true;
                let metatile_id = self
                    .world
                    .resolve(request.target_x, request.target_y)
                    .map(|t| t.metatile_id)
                    .unwrap_or_default();
                self.entry.start(
                    DoorEntryPlan {
                        trigger,
                        target: (request.target_x, request.target_y),
                        metatile_id,
                        animated: true,
                        direction: facing,
                    },
                    self.now_ms,
                    &mut self.anims,
                );
                self.emit_entry_stage();
            }
            Some(WarpProtocol::NonAnimatedDoor) => self.start_auto_door_warp(trigger, facing),
            Some(WarpProtocol::Teleport) | None => self.begin_walk_over_warp(trigger),
        }
    }

    fn start_auto_door_warp(&mut self, trigger: WarpTrigger, direction: Direction) {
        self.player.lock_input();
        self.warp.in_progress = true;
        let commands = self.entry.start_auto_warp(
            trigger,
            direction,
            true,
            self.now_ms,
            &self.timings,
            &mut self.anims,
        );
        self.emit_entry_stage();
        self.dispatch_door_commands(commands);
    }

    fn begin_walk_over_warp(&mut self, trigger: WarpTrigger) {
        self.player.lock_input();
        self.warp.in_progress = true;
        self.fade
            .arm(FadeMode::Out, self.now_ms, self.warp_config.walk_over_fade_ms);
        self.pending_walk_over = Some(trigger);
    }

    fn advance_pending_walk_over(&mut self) {
        if self.pending_walk_over.is_none() || !self.fade.is_complete(self.now_ms) {
            return;
        }
        if let Some(trigger) = self.pending_walk_over.take() {
            self.perform_warp(
                trigger,
                WarpOptions {
                    force: true,
                    from_door: false,
                },
            );
        }
    }

    fn check_walk_over(&mut self) {
        if self.player.is_moving() {
            return;
        }
        let action = warp::process_walk_over(
            &mut self.warp,
            &self.world,
            self.player.tile(),
            self.player.facing(),
            self.entry.is_active() || self.exit.is_active(),
            self.warp_config.min_check_cooldown_ms,
        );
        match action {
            WalkOverAction::None(_) | WalkOverAction::AwaitArrowInput(_) => {}
            WalkOverAction::AutoDoor {
                trigger,
                entry_direction,
                ..
            } => self.start_auto_door_warp(trigger, entry_direction),
            WalkOverAction::Warp(trigger) => self.begin_walk_over_warp(trigger),
        }
    }

    fn door_view(&self) -> DoorView {
        DoorView {
            now_ms: self.now_ms,
            entity_moving: self.player.is_moving(),
            fade_complete: self.fade.is_complete(self.now_ms),
        }
    }

    fn advance_door_sequences(&mut self) {
        if self.entry.is_active() {
            let before = self.entry.stage;
            let view = self.door_view();
            let commands = self.entry.advance(view, &self.timings, &mut self.anims);
            if self.entry.stage != before {
                self.emit_entry_stage();
            }
            self.dispatch_door_commands(commands);
        }
        if self.exit.is_active() {
            let before = self.exit.stage;
            let view = self.door_view();
            let commands = self.exit.advance(view, &mut self.anims);
            if self.exit.stage != before {
                self.emit("door_exit_stage", json!({ "stage": self.exit.stage }));
            }
            self.dispatch_door_commands(commands);
        }
    }

    fn emit_entry_stage(&mut self) {
        self.emit("door_entry_stage", json!({ "stage": self.entry.stage }));
    }

    fn dispatch_door_commands(&mut self, commands: Vec<DoorCommand>) {
        for command in commands {
            match command {
                DoorCommand::ForceStep(direction) => {
                    let ctx = StepContext {
                        tiles: &self.world,
                        objects: &self.objects,
                        config: &self.movement,
                    };
                    let started = self.player.force_move(
                        direction,
                        ForceMoveOptions {
                            ignore_collision: true,
                            suppress_chain: true,
                        },
                        &ctx,
                    );
                    if !started {
                        warn!("[Overworld door] Forced {:?} step did not start", direction);
                    }
                }
                DoorCommand::SetHidden(hidden) => self.player.set_hidden(hidden),
                DoorCommand::Fade { mode, duration_ms } => {
                    self.fade.arm(mode, self.now_ms, duration_ms)
                }
                DoorCommand::Warp(trigger) => {
                    self.perform_warp(
                        trigger,
                        WarpOptions {
                            force: true,
                            from_door: true,
                        },
                    );
                }
                DoorCommand::FinishExit => {
                    self.player.unlock_input();
                    self.player.set_hidden(false);
                    self.warp.in_progress = false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world_data::demo_manifest;

    const DT: f32 = 1000.0 / 60.0;

    fn inline_config() -> WarpConfig {
        WarpConfig {
            inline_loads: true,
            ..WarpConfig::default()
        }
    }

    fn demo_session(x: i32, y: i32, facing: Direction) -> OverworldSession {
        let mut manifest = demo_manifest();
        manifest.spawn = Some(SpawnPoint {
            map: "town".into(),
            x,
            y,
            facing,
            travel_mode: TravelMode::Foot,
        });
        OverworldSession::from_manifest(&manifest, MovementConfig::default(), inline_config())
            .expect("session")
    }

    fn held(actions: &[&str]) -> VirtualInput {
        let mut input = VirtualInput::default();
        input.set_held(actions.iter().copied());
        input
    }

    fn run_until(
        session: &mut OverworldSession,
        input: &VirtualInput,
        max_frames: usize,
        done: impl Fn(&OverworldSession) -> bool,
    ) -> usize {
        for frame in 0..max_frames {
            if done(session) {
                return frame;
            }
            session.tick(input, DT);
        }
        assert!(done(session), "condition not reached in {max_frames} frames");
        max_frames
    }

    #[test]
    fn animated_door_warp_runs_entry_and_exit() {
        let mut session = demo_session(5, 6, Direction::Up);
        session.tick(&held(&["up"]), DT);

        assert!(session.warp.in_progress);
        assert!(session.player.is_input_locked());
        assert_eq!(session.entry_stage(), EntryStage::Opening);

        let idle = VirtualInput::default();
        run_until(&mut session, &idle, 400, |s| {
            s.current_map_id() == Some("house")
        });
        let snap = session.snapshot();
        assert_eq!(snap.tile, (4, 5));
        assert_eq!(snap.facing, Direction::Up);
        assert!(!snap.input_locked);
        assert!(!snap.warp.in_progress);
        assert!(!snap.hidden);
        assert_eq!(session.world_generation(), 1);

        let events: Vec<_> = session.drain_events().into_iter().map(|(n, _)| n).collect();
        assert!(events.contains(&"warp_started"));
        assert!(events.contains(&"warp_completed"));
        assert!(events.contains(&"door_entry_stage"));
    }

    #[test]
    fn arrow_out_of_house_exits_through_the_door() {
        let mut session = demo_session(5, 6, Direction::Up);
        session.tick(&held(&["up"]), DT);
        let idle = VirtualInput::default();
        run_until(&mut session, &idle, 400, |s| {
            s.current_map_id() == Some("house") && !s.warp.in_progress
        });
        run_until(&mut session, &idle, 60, |s| !s.warp.is_on_cooldown());

        session.tick(&held(&["down"]), DT);
        assert!(session.warp.in_progress);
        assert!(session.player.is_input_locked());

        run_until(&mut session, &idle, 400, |s| s.current_map_id() == Some("town"));
        assert_eq!(session.player.tile(), (5, 5));
        assert_eq!(session.player.facing(), Direction::Down);
        assert!(session.player.body.hidden);
        assert_eq!(session.exit_stage(), ExitStage::Opening);

        run_until(&mut session, &idle, 400, |s| !s.door_sequence_active());
        assert_eq!(session.player.tile(), (5, 6));
        assert!(!session.player.is_input_locked());
        assert!(!session.player.body.hidden);
        assert!(!session.warp.in_progress);
        assert_eq!(session.door_animations().count(), 0);
    }

    #[test]
    fn stairs_warp_and_return() {
        let mut session = demo_session(14, 5, Direction::Up);
        session.tick(&held(&["up"]), DT);
        assert!(session.warp.in_progress);
        let idle = VirtualInput::default();
        run_until(&mut session, &idle, 200, |s| s.current_map_id() == Some("cave"));
        assert_eq!(session.player.tile(), (5, 1));
        assert_eq!(session.player.facing(), Direction::Down);
        run_until(&mut session, &idle, 200, |s| !s.door_sequence_active());
        assert_eq!(session.player.tile(), (5, 2));
        assert!(!session.player.is_input_locked());
    }

    #[test]
    fn teleport_pad_fades_then_warps() {
        let mut session = demo_session(3, 13, Direction::Left);
        session.tick(&held(&["left"]), DT);
        let idle = VirtualInput::default();
        run_until(&mut session, &idle, 30, |s| s.warp.in_progress);
        assert!(session.player.is_input_locked());
        assert!(session.pending_walk_over.is_some());
        run_until(&mut session, &idle, 60, |s| s.current_map_id() == Some("cave"));
        assert_eq!(session.player.tile(), (8, 6));
        assert_eq!(session.player.facing(), Direction::Up);
        assert!(!session.warp.in_progress);
        // Landing on a warp tile must not bounce straight back.
        for _ in 0..60 {
            session.tick(&idle, DT);
        }
        assert_eq!(session.current_map_id(), Some("cave"));
    }

    #[test]
    fn perform_warp_is_ignored_while_in_progress() {
        let mut session = demo_session(10, 7, Direction::Down);
        session.warp.in_progress = true;
        assert!(session.warp_to("house", 0).is_err());
        assert_eq!(session.current_map_id(), Some("town"));
        assert_eq!(session.loader.generation(), 0);
    }

    #[test]
    fn failed_load_restores_control() {
        let mut session = demo_session(10, 7, Direction::Down);
        session.warp_to("atlantis", 0).expect("accepted");
        assert!(!session.warp.in_progress);
        assert!(!session.player.is_input_locked());
        assert_eq!(session.current_map_id(), Some("town"));
        assert_eq!(session.fade.mode(), Some(FadeMode::In));
        let names: Vec<_> = session.drain_events().into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"warp_failed"));
    }

    struct FailingBuilder {
        inner: ManifestWorldBuilder,
        broken_map: &'static str,
    }

    impl WorldBuilder for FailingBuilder {
        fn build_world(&self, anchor: &str, depth: u32) -> Result<WorldState, WorldLoadError> {
            if anchor == self.broken_map {
                return Err(WorldLoadError::UnknownMap(anchor.to_string()));
            }
            self.inner.build_world(anchor, depth)
        }
    }

    #[test]
    fn failed_door_warp_does_not_refire_from_the_door_tile() {
        let manifest = demo_manifest();
        let builder = FailingBuilder {
            inner: ManifestWorldBuilder::from_manifest(&manifest).expect("demo"),
            broken_map: "house",
        };
        let spawn = SpawnPoint {
            map: "town".into(),
            x: 5,
            y: 6,
            facing: Direction::Up,
            travel_mode: TravelMode::Foot,
        };
        let mut session = OverworldSession::new(
            Arc::new(builder),
            &spawn,
            MovementConfig::default(),
            inline_config(),
            &manifest.door_metatiles,
        )
        .expect("session");

        session.tick(&held(&["up"]), DT);
        assert_eq!(session.entry_stage(), EntryStage::Opening);
        let idle = VirtualInput::default();
        for _ in 0..240 {
            session.tick(&idle, DT);
        }

        let names: Vec<_> = session.drain_events().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names.iter().filter(|n| **n == "warp_started").count(), 1);
        assert_eq!(names.iter().filter(|n| **n == "warp_failed").count(), 1);
        assert_eq!(session.current_map_id(), Some("town"));
        assert_eq!(session.player.tile(), (5, 5));
        assert_eq!(session.entry_stage(), EntryStage::Idle);
        assert!(session.pending_walk_over.is_none());
        assert!(!session.warp.in_progress);
        assert!(!session.player.is_input_locked());
        assert!(session.warp.is_same_tile("town", 5, 5));
    }

    struct SlowBuilder {
        inner: ManifestWorldBuilder,
        slow_map: &'static str,
    }

    impl WorldBuilder for SlowBuilder {
        fn build_world(&self, anchor: &str, depth: u32) -> Result<WorldState, WorldLoadError> {
            if anchor == self.slow_map {
                std::thread::sleep(std::time::Duration::from_millis(80));
            }
            self.inner.build_world(anchor, depth)
        }
    }

    #[test]
    fn stale_threaded_build_is_discarded() {
        let manifest = demo_manifest();
        let builder = SlowBuilder {
            inner: ManifestWorldBuilder::from_manifest(&manifest).expect("demo"),
            slow_map: "house",
        };
        let config = WarpConfig {
            inline_loads: false,
            ..WarpConfig::default()
        };
        let spawn = manifest.spawn.clone().expect("spawn");
        let mut session = OverworldSession::new(
            Arc::new(builder),
            &spawn,
            MovementConfig::default(),
            config,
            &manifest.door_metatiles,
        )
        .expect("session");

        assert!(session.warp_to("house", 0).is_ok());
        // A forced warp supersedes the slow build before it lands.
        let (x, y) = session.player.tile();
        let trigger = WarpTrigger {
            kind: WarpKind::Teleport,
            source_map: "town".into(),
            warp_event: WarpEvent {
                x,
                y,
                dest_map: "cave".into(),
                dest_warp_id: 1,
            },
            behavior: 0,
            facing: Direction::Down,
        };
        assert!(session.perform_warp(
            trigger,
            WarpOptions {
                force: true,
                from_door: false
            }
        ));

        let idle = VirtualInput::default();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while session.warp.in_progress {
            assert!(std::time::Instant::now() < deadline, "warp never finished");
            session.tick(&idle, DT);
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(session.current_map_id(), Some("cave"));

        // Let the superseded build finish; it must not be applied.
        std::thread::sleep(std::time::Duration::from_millis(150));
        for _ in 0..5 {
            session.tick(&idle, DT);
        }
        assert_eq!(session.current_map_id(), Some("cave"));
        assert_eq!(session.world_generation(), 1);
        assert!(!session.loader.is_loading());
    }

    #[test]
    fn objects_block_steps_until_the_world_changes() {
        let mut session = demo_session(10, 7, Direction::Up);
        session.objects_mut().insert(10, 8, 3);
        session.tick(&held(&["down"]), DT);
        assert_eq!(session.player.tile(), (10, 7));
        assert_eq!(session.player.facing(), Direction::Down);

        session.warp_to("cave", 1).expect("accepted");
        assert_eq!(session.objects.len(), 0);
    }

    #[test]
    fn ledge_jump_emits_landing_event() {
        let mut session = demo_session(10, 9, Direction::Down);
        session.tick(&held(&["down"]), DT);
        assert_eq!(session.player.tile(), (10, 11));
        let idle = VirtualInput::default();
        run_until(&mut session, &idle, 60, |s| !s.player.is_moving());
        let names: Vec<_> = session.drain_events().into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"jump_landed"));
        assert!(names.contains(&"tile_entered"));
    }
}
