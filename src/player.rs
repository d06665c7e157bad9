use serde::Serialize;

use crate::collision::{self, StepQuery, UNIVERSAL_ELEVATION};
use crate::components::{Direction, MovementConfig, TravelMode};
use crate::input::VirtualInput;
use crate::jump::JumpDistance;
use crate::movement::{JumpState, MovementState, MovementStateKind, RenderFrame, StepContext};
use crate::tilemap::TileResolver;

/// Why the current step is happening; decides whether it may chain into a slide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepKind {
    Player,
    Forced { suppress_chain: bool },
    Slide,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DoorWarpRequest {
    pub target_x: i32,
    pub target_y: i32,
    pub behavior: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MovementEvent {
    TileEntered { x: i32, y: i32, behavior: u16 },
    JumpLanded { x: i32, y: i32 },
    SlideStarted { x: i32, y: i32, direction: Direction },
}

/// Receives steps blocked by a door, stair, teleport or matching arrow tile.
pub trait DoorWarpHandler: Send + Sync {
    fn on_door_warp_attempt(&mut self, request: DoorWarpRequest);
}

impl<F> DoorWarpHandler for F
where
    F: FnMut(DoorWarpRequest) + Send + Sync,
{
    fn on_door_warp_attempt(&mut self, request: DoorWarpRequest) {
        self(request)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ForceMoveOptions {
    pub ignore_collision: bool,
    /// Do not start an autonomous follow-up step (ice slide) when this one ends.
    pub suppress_chain: bool,
}

/// Position state of the overworld entity.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerBody {
    pub tile_x: i32,
    pub tile_y: i32,
    /// Progress into the current step, always in `[0, tile_size)`.
    pub pixels_moved: f32,
    pub facing: Direction,
    pub is_moving: bool,
    pub input_locked: bool,
    pub elevation: u8,
    pub previous_elevation: u8,
    pub travel_mode: TravelMode,
    pub hidden: bool,
    pub walk_frame_alternate: bool,
    pub(crate) step: Option<StepKind>,
}

impl PlayerBody {
    pub fn step_query(&self) -> StepQuery {
        StepQuery::new(self.elevation, self.travel_mode)
    }

    /// Moves to a tile and zeroes the sub-tile offset.
    pub(crate) fn set_tile(&mut self, (x, y): (i32, i32)) {
        self.tile_x = x;
        self.tile_y = y;
        self.pixels_moved = 0.0;
    }

    pub(crate) fn begin_step(&mut self, kind: StepKind) {
        self.is_moving = true;
        self.pixels_moved = 0.0;
        self.step = Some(kind);
    }

    pub(crate) fn refresh_elevation(&mut self, tile_elevation: Option<u8>) {
        let Some(elevation) = tile_elevation else {
            return;
        };
        if elevation == UNIVERSAL_ELEVATION {
            return;
        }
        self.elevation = elevation;
        if elevation != 0 {
            self.previous_elevation = elevation;
        }
    }

    /// Top-left pixel, interpolated along the current step.
    pub fn pixel_position(&self, tile_size: f32) -> (f32, f32) {
        let (mut x, mut y) = (
            self.tile_x as f32 * tile_size,
            self.tile_y as f32 * tile_size,
        );
        if self.is_moving {
            let (dx, dy) = self.facing.delta();
            x += dx as f32 * self.pixels_moved;
            y += dy as f32 * self.pixels_moved;
        }
        (x, y)
    }
}

pub struct Player {
    pub body: PlayerBody,
    state: MovementState,
    door_warp_handler: Option<Box<dyn DoorWarpHandler>>,
    events: Vec<MovementEvent>,
}

impl Player {
    pub fn spawn(
        tile: (i32, i32),
        facing: Direction,
        travel_mode: TravelMode,
        tiles: &dyn TileResolver,
    ) -> Self {
        let elevation = tiles
            .resolve(tile.0, tile.1)
            .map(|t| t.attributes.elevation)
            .unwrap_or_default();
        Self {
            body: PlayerBody {
                tile_x: tile.0,
                tile_y: tile.1,
                pixels_moved: 0.0,
                facing,
                is_moving: false,
                input_locked: false,
                elevation,
                previous_elevation: elevation,
                travel_mode,
                hidden: false,
                walk_frame_alternate: false,
                step: None,
            },
            state: MovementState::grounded(travel_mode),
            door_warp_handler: None,
            events: Vec::new(),
        }
    }

    pub fn set_door_warp_handler(&mut self, handler: Box<dyn DoorWarpHandler>) {
        self.door_warp_handler = Some(handler);
    }

    pub fn state(&self) -> &MovementState {
        &self.state
    }

    pub fn state_kind(&self) -> MovementStateKind {
        self.state.kind()
    }

    pub fn tile(&self) -> (i32, i32) {
        (self.body.tile_x, self.body.tile_y)
    }

    pub fn facing(&self) -> Direction {
        self.body.facing
    }

    pub fn is_moving(&self) -> bool {
        self.body.is_moving
    }

    pub fn is_input_locked(&self) -> bool {
        self.body.input_locked
    }

    pub fn lock_input(&mut self) {
        self.body.input_locked = true;
    }

    pub fn unlock_input(&mut self) {
        self.body.input_locked = false;
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.body.hidden = hidden;
    }

    pub fn speed(&self, config: &MovementConfig) -> f32 {
        self.state.speed(config)
    }

    pub fn render_frame(&self) -> RenderFrame {
        self.state.render_frame(&self.body)
    }

    pub fn pixel_position(&self, tile_size: f32) -> (f32, f32) {
        match &self.state {
            MovementState::Jumping(jump) => jump.motion.pixel_position(tile_size),
            _ => self.body.pixel_position(tile_size),
        }
    }

    /// Tile the sprite appears on. Lags the logical tile during jumps.
    pub fn visual_tile(&self) -> (i32, i32) {
        match &self.state {
            MovementState::Jumping(jump) => jump.motion.visual_tile(),
            _ => self.tile(),
        }
    }

    pub fn handle_input(&mut self, input: &VirtualInput, ctx: &StepContext) {
        let outcome = self.state.handle_input(&mut self.body, input, ctx);
        if let Some(request) = outcome.door_warp {
            if let Some(handler) = self.door_warp_handler.as_mut() {
                handler.on_door_warp_attempt(request);
            }
        }
        if let Some(next) = outcome.transition {
            self.transition_to(next);
        }
    }

    /// Advances the active state; returns whether the entity moved this tick.
    pub fn update(&mut self, dt_ms: f32, ctx: &StepContext) -> bool {
        let outcome = self
            .state
            .update(&mut self.body, dt_ms, ctx, &mut self.events);
        if let Some(next) = outcome.transition {
            self.transition_to(next);
        }
        outcome.moved
    }

    /// Scripted single step. Works while input is locked.
    pub fn force_move(
        &mut self,
        direction: Direction,
        options: ForceMoveOptions,
        ctx: &StepContext,
    ) -> bool {
        if self.body.is_moving || matches!(self.state, MovementState::Jumping(_)) {
            return false;
        }
        self.body.facing = direction;
        if !options.ignore_collision {
            let (dx, dy) = direction.delta();
            let verdict = collision::check_world_step(
                ctx.tiles,
                ctx.objects,
                self.body.tile_x + dx,
                self.body.tile_y + dy,
                self.body.step_query(),
            );
            if !verdict.is_passable() {
                return false;
            }
        }
        self.body.begin_step(StepKind::Forced {
            suppress_chain: options.suppress_chain,
        });
        true
    }

    pub fn start_scripted_jump(
        &mut self,
        direction: Direction,
        distance: JumpDistance,
        config: &MovementConfig,
    ) -> bool {
        if self.body.is_moving {
            return false;
        }
        self.body.facing = direction;
        let jump = JumpState::new(
            &self.body,
            direction,
            distance,
            self.body.travel_mode,
            config.frame_ms,
        );
        self.transition_to(MovementState::Jumping(jump));
        true
    }

    /// Places the entity on a tile, cancelling any step or jump in flight.
    /// Leaves the input lock exactly as it was.
    pub fn set_position(&mut self, tile: (i32, i32), facing: Direction, tiles: &dyn TileResolver) {
        let was_locked = self.body.input_locked;
        self.body.set_tile(tile);
        self.body.is_moving = false;
        self.body.step = None;
        self.body.facing = facing;
        let elevation = tiles
            .resolve(tile.0, tile.1)
            .map(|t| t.attributes.elevation)
            .unwrap_or_default();
        self.body.elevation = elevation;
        self.body.previous_elevation = elevation;
        self.transition_to(MovementState::grounded(self.body.travel_mode));
        self.body.input_locked = was_locked;
    }

    pub fn set_travel_mode(&mut self, mode: TravelMode) {
        self.body.travel_mode = mode;
        if !matches!(self.state, MovementState::Jumping(_)) {
            self.transition_to(MovementState::grounded(mode));
        }
    }

    pub fn drain_events(&mut self) -> Vec<MovementEvent> {
        std::mem::take(&mut self.events)
    }

    fn transition_to(&mut self, next: MovementState) {
        self.state.exit(&mut self.body);
        self.state = next;
        self.state.enter(&mut self.body);
    }
}
