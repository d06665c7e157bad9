use bevy::prelude::*;

use crate::components::{HeadlessMode, PlayerSprite};
use crate::door_anims::{AnimationId, DoorAnimKind};
use crate::movement::{Pose, RenderFrame};
use crate::session::OverworldSession;

pub struct RenderPlugin;

impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_player_sprite)
            .add_systems(Update, (sync_player_sprite, sync_door_sprites));
    }
}

/// Overlay drawn on a door tile while its animation plays.
#[derive(Component)]
pub struct DoorSprite(pub AnimationId);

fn spawn_player_sprite(mut commands: Commands, headless: Res<HeadlessMode>) {
    if headless.0 {
        return;
    }
    commands.spawn((
        PlayerSprite,
        Sprite::from_color(pose_color(Pose::Stand, false), Vec2::new(12.0, 14.0)),
        Transform::from_xyz(0.0, 0.0, 10.0),
    ));
}

/// Placeholder tint per pose; alternate frames are slightly darker.
fn pose_color(pose: Pose, alternate: bool) -> Color {
    let (r, g, b) = match pose {
        Pose::Stand | Pose::Walk => (0.9, 0.2, 0.2),
        Pose::Run => (1.0, 0.45, 0.2),
        Pose::Jump => (1.0, 0.8, 0.3),
        Pose::Surf => (0.3, 0.6, 1.0),
        Pose::Swim => (0.2, 0.3, 0.7),
        Pose::Cycle => (0.8, 0.3, 0.9),
    };
    let shade = if alternate { 0.8 } else { 1.0 };
    Color::srgb(r * shade, g * shade, b * shade)
}

/// Sprite centre in bevy space for a top-left pixel and the frame's bob.
pub fn sprite_translation(pixel: (f32, f32), frame: &RenderFrame, tile_size: f32) -> Vec2 {
    Vec2::new(
        pixel.0 + tile_size / 2.0,
        -(pixel.1 + frame.y_offset + tile_size / 2.0),
    )
}

fn sync_player_sprite(
    session: Option<Res<OverworldSession>>,
    mut query: Query<(&mut Transform, &mut Sprite, &mut Visibility), With<PlayerSprite>>,
) {
    let Some(session) = session else {
        return;
    };
    let Ok((mut transform, mut sprite, mut visibility)) = query.get_single_mut() else {
        return;
    };
    let ts = session.movement_config().tile_size;
    let frame = session.player().render_frame();
    let at = sprite_translation(session.player().pixel_position(ts), &frame, ts);
    transform.translation.x = at.x;
    transform.translation.y = at.y;
    sprite.color = pose_color(frame.pose, frame.alternate);
    *visibility = if session.player().body.hidden {
        Visibility::Hidden
    } else {
        Visibility::Inherited
    };
}

fn sync_door_sprites(
    mut commands: Commands,
    headless: Res<HeadlessMode>,
    session: Option<Res<OverworldSession>>,
    mut existing: Query<(Entity, &DoorSprite, &mut Sprite)>,
) {
    if headless.0 {
        return;
    }
    let Some(session) = session else {
        return;
    };
    let ts = session.movement_config().tile_size;
    let now = session.now_ms();

    for (entity, door, _) in existing.iter() {
        if !session.door_animations().any(|a| a.id == door.0) {
            commands.entity(entity).despawn();
        }
    }

    for anim in session.door_animations() {
        let last = anim.frame_count.saturating_sub(1).max(1) as f32;
        // Frame 0 is shut; the last frame is fully open.
        let openness = anim.frame(now) as f32 / last;
        let color = Color::srgba(0.1, 0.05, 0.0, openness);
        if let Some((_, _, mut sprite)) = existing.iter_mut().find(|(_, d, _)| d.0 == anim.id) {
            sprite.color = color;
            continue;
        }
        let kind_z = match anim.request.kind {
            DoorAnimKind::Open => 1.0,
            DoorAnimKind::Close => 1.1,
        };
        commands.spawn((
            DoorSprite(anim.id),
            Sprite::from_color(color, Vec2::new(ts, ts)),
            Transform::from_xyz(
                anim.request.x as f32 * ts + ts / 2.0,
                -(anim.request.y as f32 * ts + ts / 2.0),
                kind_z,
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Direction;

    #[test]
    fn jump_bob_raises_the_sprite() {
        let mut frame = RenderFrame {
            pose: Pose::Jump,
            facing: Direction::Down,
            alternate: false,
            y_offset: 0.0,
        };
        let grounded = sprite_translation((32.0, 48.0), &frame, 16.0);
        assert_eq!(grounded, Vec2::new(40.0, -56.0));
        frame.y_offset = -6.0;
        let airborne = sprite_translation((32.0, 48.0), &frame, 16.0);
        assert_eq!(airborne.y, -50.0);
    }
}
