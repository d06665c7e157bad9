use bevy::prelude::*;

use crate::components::HeadlessMode;
use crate::events::GameEventBus;
use crate::session::OverworldSession;

#[derive(Resource, Clone)]
pub struct CameraConfig {
    pub follow_speed: f32,
    pub zoom: f32,
    pub deadzone: Vec2,
    /// Keep the view centre inside the loaded maps.
    pub clamp_to_world: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            follow_speed: 0.2,
            zoom: 2.0,
            deadzone: Vec2::new(4.0, 4.0),
            clamp_to_world: true,
        }
    }
}

#[derive(Resource, Default)]
struct CameraRuntimeState {
    base: Vec2,
    /// Jump straight to the target on the next follow step.
    snap: bool,
}

#[derive(Resource, Default)]
struct CameraEventCursor {
    last_frame: u64,
    processed_in_frame: usize,
}

#[derive(Component)]
pub struct MainCamera;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(CameraConfig::default())
            .insert_resource(CameraRuntimeState {
                base: Vec2::ZERO,
                snap: true,
            })
            .insert_resource(CameraEventCursor::default())
            .add_systems(Startup, spawn_camera)
            .add_systems(
                Update,
                (apply_camera_events, camera_follow, camera_zoom).chain(),
            );
    }
}

/// A warp moves the entity across the world in one frame; the view follows
/// without easing.
fn apply_camera_events(
    bus: Res<GameEventBus>,
    mut runtime: ResMut<CameraRuntimeState>,
    mut cursor: ResMut<CameraEventCursor>,
) {
    let mut count_in_frame = 0usize;
    for ev in bus.since(cursor.last_frame) {
        if ev.frame == cursor.last_frame {
            count_in_frame += 1;
            if count_in_frame <= cursor.processed_in_frame {
                continue;
            }
        } else {
            count_in_frame = 1;
        }

        if ev.name == "warp_completed" {
            runtime.snap = true;
        }

        cursor.last_frame = ev.frame;
        cursor.processed_in_frame = count_in_frame;
    }
}

fn spawn_camera(mut commands: Commands, headless: Res<HeadlessMode>) {
    if headless.0 {
        return;
    }
    commands.spawn((MainCamera, Camera2d, Transform::from_xyz(0.0, 0.0, 100.0)));
}

/// World-space centre of the entity sprite. Tile rows grow downward, bevy's y
/// grows upward.
pub fn player_focus(session: &OverworldSession) -> Vec2 {
    let ts = session.movement_config().tile_size;
    let (px, py) = session.player().pixel_position(ts);
    Vec2::new(px + ts / 2.0, -(py + ts / 2.0))
}

fn world_rect(session: &OverworldSession) -> Rect {
    let ts = session.movement_config().tile_size;
    let (x0, y0, x1, y1) = session.world().bounds();
    Rect::new(
        x0 as f32 * ts,
        -(y1 as f32 * ts),
        x1 as f32 * ts,
        -(y0 as f32 * ts),
    )
}

/// One easing step from `current` toward `target`.
pub fn follow_step(
    current: Vec2,
    mut target: Vec2,
    config: &CameraConfig,
    bounds: Option<Rect>,
    dt_secs: f32,
) -> Vec2 {
    if (target.x - current.x).abs() < config.deadzone.x {
        target.x = current.x;
    }
    if (target.y - current.y).abs() < config.deadzone.y {
        target.y = current.y;
    }
    if let Some(rect) = bounds {
        target = target.clamp(rect.min, rect.max.max(rect.min));
    }
    let speed = if config.follow_speed.is_finite() {
        config.follow_speed
    } else {
        1.0
    };
    let alpha = (speed * dt_secs * 60.0).clamp(0.0, 1.0);
    current.lerp(target, alpha)
}

fn camera_follow(
    time: Res<Time>,
    config: Res<CameraConfig>,
    mut runtime: ResMut<CameraRuntimeState>,
    session: Option<Res<OverworldSession>>,
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
) {
    let Some(session) = session else {
        return;
    };
    let Ok(mut cam_transform) = camera_query.get_single_mut() else {
        return;
    };

    let target = player_focus(&session);
    let bounds = config.clamp_to_world.then(|| world_rect(&session));
    runtime.base = if runtime.snap {
        runtime.snap = false;
        bounds.map_or(target, |r| target.clamp(r.min, r.max.max(r.min)))
    } else {
        follow_step(runtime.base, target, &config, bounds, time.delta_secs())
    };
    cam_transform.translation.x = runtime.base.x;
    cam_transform.translation.y = runtime.base.y;
}

fn camera_zoom(config: Res<CameraConfig>, mut query: Query<&mut OrthographicProjection, With<MainCamera>>) {
    let Ok(mut projection) = query.get_single_mut() else {
        return;
    };
    projection.scale = 1.0 / config.zoom.max(0.05);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warp_completion_requests_a_snap() {
        let mut app = App::new();
        app.insert_resource(GameEventBus::default())
            .insert_resource(CameraRuntimeState::default())
            .insert_resource(CameraEventCursor::default())
            .add_systems(Update, apply_camera_events);

        {
            let mut bus = app.world_mut().resource_mut::<GameEventBus>();
            bus.frame = 1;
            bus.emit("tile_entered", serde_json::json!({"x": 1, "y": 2}));
        }
        app.update();
        assert!(!app.world().resource::<CameraRuntimeState>().snap);

        app.world_mut()
            .resource_mut::<GameEventBus>()
            .emit("warp_completed", serde_json::json!({"map": "house"}));
        app.update();
        assert!(app.world().resource::<CameraRuntimeState>().snap);

        // Already processed events are not replayed.
        app.world_mut().resource_mut::<CameraRuntimeState>().snap = false;
        app.update();
        assert!(!app.world().resource::<CameraRuntimeState>().snap);
    }

    #[test]
    fn follow_respects_deadzone_and_bounds() {
        let config = CameraConfig {
            follow_speed: 1.0,
            ..CameraConfig::default()
        };
        let dt = 1.0;
        let held = follow_step(Vec2::ZERO, Vec2::new(2.0, -3.0), &config, None, dt);
        assert_eq!(held, Vec2::ZERO);

        let bounds = Rect::new(0.0, -100.0, 50.0, 0.0);
        let clamped = follow_step(Vec2::ZERO, Vec2::new(80.0, -40.0), &config, Some(bounds), dt);
        assert_eq!(clamped, Vec2::new(50.0, -40.0));
    }
}
