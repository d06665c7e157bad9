//! Travel states. Each variant answers the same contract (`enter`, `exit`,
//! `update`, `handle_input`, `render_frame`, `speed`); `Player` drives the
//! transitions between them.

use serde::Serialize;

use crate::behaviors;
use crate::collision::{self, BlockReason, ObjectCollision, StepVerdict};
use crate::components::{Direction, MovementConfig, TravelMode};
use crate::input::VirtualInput;
use crate::jump::{JumpDistance, JumpMotion};
use crate::player::{DoorWarpRequest, MovementEvent, PlayerBody, StepKind};
use crate::tilemap::TileResolver;

/// Collaborators a state consults while deciding and advancing steps.
pub struct StepContext<'a> {
    pub tiles: &'a dyn TileResolver,
    pub objects: &'a dyn ObjectCollision,
    pub config: &'a MovementConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementStateKind {
    Normal,
    Running,
    Jumping,
    Surfing,
    Underwater,
    Cycling,
}

#[derive(Clone, Debug, PartialEq)]
pub struct JumpState {
    pub motion: JumpMotion,
    /// Travel mode to land in; a surf dismount lands on foot.
    pub resume_mode: TravelMode,
    took_input_lock: bool,
}

impl JumpState {
    pub fn new(
        body: &PlayerBody,
        direction: Direction,
        distance: JumpDistance,
        resume_mode: TravelMode,
        frame_ms: f32,
    ) -> Self {
        Self {
            motion: JumpMotion::new((body.tile_x, body.tile_y), direction, distance, frame_ms),
            resume_mode,
            took_input_lock: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleState {
    /// Consecutive completed steps; anything above zero rides at top speed.
    pub streak: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MovementState {
    Normal,
    Running,
    Jumping(JumpState),
    Surfing,
    Underwater,
    Cycling(CycleState),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pose {
    Stand,
    Walk,
    Run,
    Jump,
    Surf,
    Swim,
    Cycle,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RenderFrame {
    pub pose: Pose,
    pub facing: Direction,
    pub alternate: bool,
    /// Vertical sprite offset in pixels; negative is up.
    pub y_offset: f32,
}

#[derive(Debug, Default)]
pub struct InputOutcome {
    pub transition: Option<MovementState>,
    pub door_warp: Option<DoorWarpRequest>,
}

#[derive(Debug, Default)]
pub struct UpdateOutcome {
    pub moved: bool,
    pub transition: Option<MovementState>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum StepAttempt {
    Walk,
    Jump(JumpDistance),
    Dismount,
    DoorWarp(DoorWarpRequest),
    Blocked(BlockReason),
}

#[derive(Clone, Copy)]
struct StepRules {
    ledges: bool,
    water_only: bool,
}

impl MovementState {
    pub fn grounded(mode: TravelMode) -> Self {
        match mode {
            TravelMode::Foot => MovementState::Normal,
            TravelMode::Cycle => MovementState::Cycling(CycleState::default()),
            TravelMode::Surf => MovementState::Surfing,
            TravelMode::Underwater => MovementState::Underwater,
        }
    }

    pub fn kind(&self) -> MovementStateKind {
        match self {
            MovementState::Normal => MovementStateKind::Normal,
            MovementState::Running => MovementStateKind::Running,
            MovementState::Jumping(_) => MovementStateKind::Jumping,
            MovementState::Surfing => MovementStateKind::Surfing,
            MovementState::Underwater => MovementStateKind::Underwater,
            MovementState::Cycling(_) => MovementStateKind::Cycling,
        }
    }

    pub fn enter(&mut self, body: &mut PlayerBody) {
        match self {
            MovementState::Jumping(jump) => {
                jump.took_input_lock = !body.input_locked;
                body.input_locked = true;
                // Other systems must never see the entity on the jumped-over tile.
                body.set_tile(jump.motion.landing_tile());
                body.step = None;
                body.is_moving = true;
            }
            MovementState::Cycling(cycle) => cycle.streak = 0,
            MovementState::Normal
            | MovementState::Running
            | MovementState::Surfing
            | MovementState::Underwater => {}
        }
    }

    pub fn exit(&mut self, body: &mut PlayerBody) {
        if let MovementState::Jumping(jump) = self {
            if jump.took_input_lock {
                body.input_locked = false;
            }
        }
    }

    pub fn speed(&self, config: &MovementConfig) -> f32 {
        match self {
            MovementState::Normal | MovementState::Underwater => config.walk_speed,
            MovementState::Running => config.walk_speed * config.run_multiplier,
            MovementState::Surfing => config.walk_speed * config.surf_multiplier,
            MovementState::Cycling(cycle) if cycle.streak == 0 => config.cycle_speed,
            MovementState::Cycling(_) => config.cycle_top_speed,
            MovementState::Jumping(jump) => {
                let distance = jump.motion.distance.tiles() as f32 * config.tile_size;
                if jump.motion.duration_ms > 0.0 {
                    distance / jump.motion.duration_ms
                } else {
                    0.0
                }
            }
        }
    }

    pub fn render_frame(&self, body: &PlayerBody) -> RenderFrame {
        let (pose, y_offset) = match self {
            MovementState::Jumping(jump) => (Pose::Jump, jump.motion.vertical_offset()),
            MovementState::Surfing => (Pose::Surf, 0.0),
            MovementState::Underwater => (Pose::Swim, 0.0),
            MovementState::Cycling(_) => (Pose::Cycle, 0.0),
            MovementState::Running if body.is_moving => (Pose::Run, 0.0),
            MovementState::Normal | MovementState::Running if body.is_moving => (Pose::Walk, 0.0),
            MovementState::Normal | MovementState::Running => (Pose::Stand, 0.0),
        };
        RenderFrame {
            pose,
            facing: body.facing,
            alternate: body.walk_frame_alternate,
            y_offset,
        }
    }

    pub fn handle_input(
        &mut self,
        body: &mut PlayerBody,
        input: &VirtualInput,
        ctx: &StepContext,
    ) -> InputOutcome {
        let mut outcome = InputOutcome::default();
        if matches!(self, MovementState::Jumping(_)) || body.input_locked || body.is_moving {
            return outcome;
        }

        let Some(direction) = input.held_direction() else {
            if let MovementState::Cycling(cycle) = self {
                cycle.streak = 0;
            }
            return outcome;
        };

        let here_forbids_running = ctx
            .tiles
            .resolve(body.tile_x, body.tile_y)
            .is_some_and(|t| behaviors::forbids_running(t.behavior()));
        match self {
            MovementState::Normal if input.run_held() && !here_forbids_running => {
                outcome.transition = Some(MovementState::Running);
            }
            MovementState::Running if !input.run_held() || here_forbids_running => {
                outcome.transition = Some(MovementState::Normal);
            }
            _ => {}
        }

        let rules = match self {
            MovementState::Normal | MovementState::Running | MovementState::Cycling(_) => {
                StepRules {
                    ledges: true,
                    water_only: false,
                }
            }
            MovementState::Surfing => StepRules {
                ledges: false,
                water_only: true,
            },
            MovementState::Underwater | MovementState::Jumping(_) => StepRules {
                ledges: false,
                water_only: false,
            },
        };

        match attempt_step(body, direction, ctx, rules) {
            StepAttempt::Walk => body.begin_step(StepKind::Player),
            StepAttempt::Jump(distance) => {
                outcome.transition = Some(MovementState::Jumping(JumpState::new(
                    body,
                    direction,
                    distance,
                    body.travel_mode,
                    ctx.config.frame_ms,
                )));
            }
            StepAttempt::Dismount => {
                outcome.transition = Some(MovementState::Jumping(JumpState::new(
                    body,
                    direction,
                    JumpDistance::Normal,
                    TravelMode::Foot,
                    ctx.config.frame_ms,
                )));
            }
            StepAttempt::DoorWarp(request) => outcome.door_warp = Some(request),
            StepAttempt::Blocked(_) => {
                if let MovementState::Cycling(cycle) = self {
                    cycle.streak = 0;
                }
            }
        }
        outcome
    }

    pub fn update(
        &mut self,
        body: &mut PlayerBody,
        dt_ms: f32,
        ctx: &StepContext,
        events: &mut Vec<MovementEvent>,
    ) -> UpdateOutcome {
        let speed = self.speed(ctx.config);
        match self {
            MovementState::Jumping(jump) => {
                jump.motion.advance(dt_ms);
                if !jump.motion.is_complete() {
                    return UpdateOutcome {
                        moved: true,
                        transition: None,
                    };
                }
                body.is_moving = false;
                body.travel_mode = jump.resume_mode;
                let (x, y) = (body.tile_x, body.tile_y);
                let landed = ctx.tiles.resolve(x, y);
                body.refresh_elevation(landed.map(|t| t.attributes.elevation));
                events.push(MovementEvent::JumpLanded { x, y });
                events.push(MovementEvent::TileEntered {
                    x,
                    y,
                    behavior: landed.map(|t| t.behavior()).unwrap_or_default(),
                });
                UpdateOutcome {
                    moved: true,
                    transition: Some(MovementState::grounded(jump.resume_mode)),
                }
            }
            MovementState::Cycling(cycle) => {
                let (moved, finished) = advance_walk(body, speed, dt_ms, ctx, events);
                if finished {
                    cycle.streak = cycle.streak.saturating_add(1);
                }
                UpdateOutcome {
                    moved,
                    transition: None,
                }
            }
            MovementState::Normal
            | MovementState::Running
            | MovementState::Surfing
            | MovementState::Underwater => {
                let (moved, _) = advance_walk(body, speed, dt_ms, ctx, events);
                UpdateOutcome {
                    moved,
                    transition: None,
                }
            }
        }
    }
}

fn attempt_step(
    body: &mut PlayerBody,
    direction: Direction,
    ctx: &StepContext,
    rules: StepRules,
) -> StepAttempt {
    body.facing = direction;

    // Arrow warps fire from the tile the entity already stands on.
    if let Some(here) = ctx.tiles.resolve(body.tile_x, body.tile_y) {
        if behaviors::arrow_warp_direction(here.behavior()) == Some(direction) {
            return StepAttempt::DoorWarp(DoorWarpRequest {
                target_x: body.tile_x,
                target_y: body.tile_y,
                behavior: here.behavior(),
            });
        }
    }

    let (dx, dy) = direction.delta();
    let (tx, ty) = (body.tile_x + dx, body.tile_y + dy);
    let target = ctx.tiles.resolve(tx, ty);

    if let Some(tile) = &target {
        if behaviors::requires_door_exit_sequence(tile.behavior()) {
            return StepAttempt::DoorWarp(DoorWarpRequest {
                target_x: tx,
                target_y: ty,
                behavior: tile.behavior(),
            });
        }
    }

    let query = body.step_query();
    if rules.ledges
        && collision::ledge_jump_landing(
            ctx.tiles,
            ctx.objects,
            (body.tile_x, body.tile_y),
            direction,
            query,
        )
        .is_some()
    {
        return StepAttempt::Jump(JumpDistance::Far);
    }

    if rules.water_only {
        if let Some(tile) = &target {
            if !behaviors::is_surfable(tile.behavior()) {
                let mut land = query.ignoring_elevation();
                land.travel_mode = TravelMode::Foot;
                return match collision::check_world_step(ctx.tiles, ctx.objects, tx, ty, land) {
                    StepVerdict::Passable => StepAttempt::Dismount,
                    StepVerdict::Blocked(reason) => StepAttempt::Blocked(reason),
                };
            }
        }
    }

    if let StepVerdict::Blocked(reason) = collision::check_step(target.as_ref(), query) {
        if let Some(tile) = &target {
            if behaviors::is_teleport_warp(tile.behavior()) {
                return StepAttempt::DoorWarp(DoorWarpRequest {
                    target_x: tx,
                    target_y: ty,
                    behavior: tile.behavior(),
                });
            }
        }
        return StepAttempt::Blocked(reason);
    }
    if ctx.objects.has_object_collision(tx, ty, body.elevation) {
        return StepAttempt::Blocked(BlockReason::ObjectEvent);
    }
    StepAttempt::Walk
}

/// Advances a grounded step. Returns `(moved, finished_step)`.
fn advance_walk(
    body: &mut PlayerBody,
    speed: f32,
    dt_ms: f32,
    ctx: &StepContext,
    events: &mut Vec<MovementEvent>,
) -> (bool, bool) {
    if !body.is_moving {
        return (false, false);
    }
    body.pixels_moved += speed * dt_ms;
    if body.pixels_moved < ctx.config.tile_size {
        return (true, false);
    }

    let direction = body.facing;
    let (dx, dy) = direction.delta();
    body.set_tile((body.tile_x + dx, body.tile_y + dy));
    body.is_moving = false;
    body.walk_frame_alternate = !body.walk_frame_alternate;
    let step = body.step.take();

    let (x, y) = (body.tile_x, body.tile_y);
    let entered = ctx.tiles.resolve(x, y);
    body.refresh_elevation(entered.map(|t| t.attributes.elevation));
    let behavior = entered.map(|t| t.behavior()).unwrap_or_default();
    events.push(MovementEvent::TileEntered { x, y, behavior });

    let chain = !matches!(
        step,
        Some(StepKind::Forced {
            suppress_chain: true
        })
    );
    if chain && behaviors::is_ice(behavior) {
        let (nx, ny) = (x + dx, y + dy);
        // Doors are entered through the door protocol, never by sliding.
        let door_ahead = ctx
            .tiles
            .resolve(nx, ny)
            .is_some_and(|t| behaviors::requires_door_exit_sequence(t.behavior()));
        let verdict = collision::check_world_step(ctx.tiles, ctx.objects, nx, ny, body.step_query());
        if !door_ahead && verdict.is_passable() {
            body.begin_step(StepKind::Slide);
            events.push(MovementEvent::SlideStarted { x, y, direction });
        }
    }
    (true, true)
}
