//! Door entry and exit choreography.
//!
//! Both sequences are advanced once per tick by the session. They own their
//! door animations through the `AnimationSpawner` they are handed, and report
//! everything else (stepping, hiding, fading, warping) as `DoorCommand`s.

use serde::Serialize;

use crate::components::{Direction, WarpConfig};
use crate::door_anims::{AnimationId, AnimationSpawner, DoorAnimKind, DoorAnimationRequest};
use crate::screen_effects::FadeMode;
use crate::warp::WarpTrigger;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStage {
    #[default]
    Idle,
    Opening,
    Stepping,
    Closing,
    WaitingBeforeFade,
    FadingOut,
    /// Held until the transition completes or fails and resets the sequence.
    Warping,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStage {
    #[default]
    Idle,
    Opening,
    Stepping,
    Closing,
    Done,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DoorCommand {
    /// Forced step ignoring collision, with chaining suppressed.
    ForceStep(Direction),
    SetHidden(bool),
    Fade { mode: FadeMode, duration_ms: f32 },
    /// Perform the warp with `force` and `from_door`.
    Warp(WarpTrigger),
    /// Exit finished: unlock input, unhide, release the warp guard.
    FinishExit,
}

/// What the sequencer may observe about the rest of the session this tick.
#[derive(Clone, Copy, Debug)]
pub struct DoorView {
    pub now_ms: f64,
    pub entity_moving: bool,
    pub fade_complete: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct DoorTimings {
    pub frame_ms: f32,
    pub frame_count: u32,
    pub settle_ms: f32,
    pub fade_ms: f32,
}

impl DoorTimings {
    pub fn animation_ms(&self) -> f64 {
        f64::from(self.frame_ms) * f64::from(self.frame_count)
    }
}

impl From<&WarpConfig> for DoorTimings {
    fn from(config: &WarpConfig) -> Self {
        Self {
            frame_ms: config.door_frame_ms,
            frame_count: config.door_frame_count,
            settle_ms: config.door_settle_ms,
            fade_ms: config.fade_ms,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DoorEntryPlan {
    pub trigger: WarpTrigger,
    pub target: (i32, i32),
    pub metatile_id: u16,
    pub animated: bool,
    pub direction: Direction,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct DoorEntrySequence {
    pub stage: EntryStage,
    #[serde(skip)]
    pub trigger: Option<WarpTrigger>,
    pub target: (i32, i32),
    pub metatile_id: u16,
    pub animated: bool,
    pub direction: Direction,
    pub open_anim: Option<AnimationId>,
    pub close_anim: Option<AnimationId>,
    pub stage_started_ms: f64,
}

impl DoorEntrySequence {
    pub fn is_active(&self) -> bool {
        self.stage != EntryStage::Idle
    }

    /// Begins walking into a door. Animated doors get an open animation that
    /// holds its last frame until the entity has passed through.
    pub fn start(&mut self, plan: DoorEntryPlan, now_ms: f64, spawner: &mut dyn AnimationSpawner) {
        self.reset(spawner);
        let open_anim = if plan.animated {
            spawner.spawn(DoorAnimationRequest {
                kind: DoorAnimKind::Open,
                x: plan.target.0,
                y: plan.target.1,
                metatile_id: plan.metatile_id,
                started_at_ms: now_ms,
                hold_last_frame: true,
            })
        } else {
            None
        };
        *self = Self {
            stage: EntryStage::Opening,
            trigger: Some(plan.trigger),
            target: plan.target,
            metatile_id: plan.metatile_id,
            animated: plan.animated,
            direction: plan.direction,
            open_anim,
            close_anim: None,
            stage_started_ms: now_ms,
        };
    }

    /// Warp without a door step: stairs, arrows and stepped-on ladders.
    pub fn start_auto_warp(
        &mut self,
        trigger: WarpTrigger,
        direction: Direction,
        skip_wait: bool,
        now_ms: f64,
        timings: &DoorTimings,
        spawner: &mut dyn AnimationSpawner,
    ) -> Vec<DoorCommand> {
        self.reset(spawner);
        let (x, y) = (trigger.warp_event.x, trigger.warp_event.y);
        *self = Self {
            stage: if skip_wait {
                EntryStage::FadingOut
            } else {
                EntryStage::WaitingBeforeFade
            },
            trigger: Some(trigger),
            target: (x, y),
            metatile_id: 0,
            animated: false,
            direction,
            open_anim: None,
            close_anim: None,
            stage_started_ms: now_ms,
        };
        if skip_wait {
            vec![DoorCommand::Fade {
                mode: FadeMode::Out,
                duration_ms: timings.fade_ms,
            }]
        } else {
            Vec::new()
        }
    }

    /// Moves at most one stage forward.
    pub fn advance(
        &mut self,
        view: DoorView,
        timings: &DoorTimings,
        spawner: &mut dyn AnimationSpawner,
    ) -> Vec<DoorCommand> {
        let mut commands = Vec::new();
        match self.stage {
            EntryStage::Opening => {
                let opened = !self.animated
                    || self
                        .open_anim
                        .is_none_or(|id| spawner.is_finished(id, view.now_ms));
                if opened {
                    self.enter(EntryStage::Stepping, view.now_ms);
                    commands.push(DoorCommand::ForceStep(self.direction));
                }
            }
            EntryStage::Stepping => {
                if !view.entity_moving {
                    commands.push(DoorCommand::SetHidden(true));
                    if self.animated {
                        self.close_anim = spawner.spawn(DoorAnimationRequest {
                            kind: DoorAnimKind::Close,
                            x: self.target.0,
                            y: self.target.1,
                            metatile_id: self.metatile_id,
                            started_at_ms: view.now_ms,
                            hold_last_frame: false,
                        });
                        if let Some(open) = self.open_anim.take() {
                            spawner.remove(open);
                        }
                        self.enter(EntryStage::Closing, view.now_ms);
                    } else {
                        self.enter(EntryStage::WaitingBeforeFade, view.now_ms);
                    }
                }
            }
            EntryStage::Closing => {
                let closed = self
                    .close_anim
                    .is_none_or(|id| spawner.is_finished(id, view.now_ms));
                if closed {
                    if let Some(close) = self.close_anim.take() {
                        spawner.remove(close);
                    }
                    self.enter(EntryStage::WaitingBeforeFade, view.now_ms);
                }
            }
            EntryStage::WaitingBeforeFade => {
                if view.now_ms - self.stage_started_ms >= f64::from(timings.settle_ms) {
                    self.enter(EntryStage::FadingOut, view.now_ms);
                    commands.push(DoorCommand::Fade {
                        mode: FadeMode::Out,
                        duration_ms: timings.fade_ms,
                    });
                }
            }
            EntryStage::FadingOut => {
                if view.fade_complete {
                    self.enter(EntryStage::Warping, view.now_ms);
                    if let Some(trigger) = self.trigger.clone() {
                        commands.push(DoorCommand::Warp(trigger));
                    }
                }
            }
            EntryStage::Idle | EntryStage::Warping => {}
        }
        commands
    }

    /// Returns to idle, dropping any animation this sequence still owns.
    pub fn reset(&mut self, spawner: &mut dyn AnimationSpawner) {
        for id in [self.open_anim.take(), self.close_anim.take()]
            .into_iter()
            .flatten()
        {
            spawner.remove(id);
        }
        *self = Self::default();
    }

    fn enter(&mut self, stage: EntryStage, now_ms: f64) {
        self.stage = stage;
        self.stage_started_ms = now_ms;
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DoorExitPlan {
    pub door: (i32, i32),
    pub metatile_id: u16,
    pub animated: bool,
    pub direction: Direction,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct DoorExitSequence {
    pub stage: ExitStage,
    pub door: (i32, i32),
    pub metatile_id: u16,
    pub animated: bool,
    pub direction: Direction,
    pub open_anim: Option<AnimationId>,
    pub close_anim: Option<AnimationId>,
    pub stage_started_ms: f64,
}

impl DoorExitSequence {
    pub fn is_active(&self) -> bool {
        self.stage != ExitStage::Idle
    }

    /// Arms the walk out of a door the entity was just placed on. An animated
    /// door is shown already open.
    pub fn start(
        &mut self,
        plan: DoorExitPlan,
        now_ms: f64,
        timings: &DoorTimings,
        spawner: &mut dyn AnimationSpawner,
    ) {
        self.reset(spawner);
        let open_anim = if plan.animated {
            spawner.spawn(DoorAnimationRequest {
                kind: DoorAnimKind::Open,
                x: plan.door.0,
                y: plan.door.1,
                metatile_id: plan.metatile_id,
                started_at_ms: now_ms - timings.animation_ms(),
                hold_last_frame: true,
            })
        } else {
            None
        };
        *self = Self {
            stage: ExitStage::Opening,
            door: plan.door,
            metatile_id: plan.metatile_id,
            animated: plan.animated,
            direction: plan.direction,
            open_anim,
            close_anim: None,
            stage_started_ms: now_ms,
        };
    }

    pub fn advance(
        &mut self,
        view: DoorView,
        spawner: &mut dyn AnimationSpawner,
    ) -> Vec<DoorCommand> {
        let mut commands = Vec::new();
        match self.stage {
            ExitStage::Idle => {}
            ExitStage::Opening => {
                let opened = self
                    .open_anim
                    .is_none_or(|id| spawner.is_finished(id, view.now_ms));
                if opened && view.fade_complete {
                    self.enter(ExitStage::Stepping, view.now_ms);
                    commands.push(DoorCommand::SetHidden(false));
                    commands.push(DoorCommand::ForceStep(self.direction));
                }
            }
            ExitStage::Stepping => {
                if !view.entity_moving {
                    if self.animated {
                        self.close_anim = spawner.spawn(DoorAnimationRequest {
                            kind: DoorAnimKind::Close,
                            x: self.door.0,
                            y: self.door.1,
                            metatile_id: self.metatile_id,
                            started_at_ms: view.now_ms,
                            hold_last_frame: false,
                        });
                        if let Some(open) = self.open_anim.take() {
                            spawner.remove(open);
                        }
                        self.enter(ExitStage::Closing, view.now_ms);
                    } else {
                        self.enter(ExitStage::Done, view.now_ms);
                    }
                }
            }
            ExitStage::Closing => {
                let closed = self
                    .close_anim
                    .is_none_or(|id| spawner.is_finished(id, view.now_ms));
                if closed {
                    if let Some(close) = self.close_anim.take() {
                        spawner.remove(close);
                    }
                    self.enter(ExitStage::Done, view.now_ms);
                }
            }
            ExitStage::Done => {
                commands.push(DoorCommand::FinishExit);
                self.reset(spawner);
            }
        }
        commands
    }

    pub fn reset(&mut self, spawner: &mut dyn AnimationSpawner) {
        for id in [self.open_anim.take(), self.close_anim.take()]
            .into_iter()
            .flatten()
        {
            spawner.remove(id);
        }
        *self = Self::default();
    }

    fn enter(&mut self, stage: ExitStage, now_ms: f64) {
        self.stage = stage;
        self.stage_started_ms = now_ms;
    }
}
