use bevy::prelude::*;
use serde::Serialize;

use crate::camera::MainCamera;
use crate::components::HeadlessMode;
use crate::session::OverworldSession;

pub struct ScreenEffectsPlugin;

impl Plugin for ScreenEffectsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_screen_overlay)
            .add_systems(Update, sync_overlay_visual);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeMode {
    /// Black to clear.
    In,
    /// Clear to black.
    Out,
}

/// Full-screen fade driven by the session clock.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FadeController {
    mode: Option<FadeMode>,
    start_ms: f64,
    duration_ms: f64,
}

impl FadeController {
    pub fn arm(&mut self, mode: FadeMode, start_ms: f64, duration_ms: f32) {
        self.mode = Some(mode);
        self.start_ms = start_ms;
        self.duration_ms = f64::from(duration_ms.max(0.0));
    }

    pub fn mode(&self) -> Option<FadeMode> {
        self.mode
    }

    pub fn progress(&self, now_ms: f64) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        ((now_ms - self.start_ms) / self.duration_ms).clamp(0.0, 1.0) as f32
    }

    /// Overlay opacity. A finished fade-out stays black until a fade-in is armed.
    pub fn alpha(&self, now_ms: f64) -> f32 {
        match self.mode {
            None => 0.0,
            Some(FadeMode::Out) => self.progress(now_ms),
            Some(FadeMode::In) => 1.0 - self.progress(now_ms),
        }
    }

    /// True when nothing is armed or the armed fade has run its course.
    pub fn is_complete(&self, now_ms: f64) -> bool {
        self.mode.is_none() || now_ms - self.start_ms >= self.duration_ms
    }
}

/// Marker for the fade overlay sprite
#[derive(Component)]
pub struct ScreenOverlay;

fn spawn_screen_overlay(mut commands: Commands, headless: Res<HeadlessMode>) {
    if headless.0 {
        return;
    }
    commands.spawn((
        ScreenOverlay,
        Sprite::from_color(Color::srgba(0.0, 0.0, 0.0, 0.0), Vec2::new(4096.0, 4096.0)),
        Transform::from_xyz(0.0, 0.0, 300.0),
    ));
}

fn sync_overlay_visual(
    session: Option<Res<OverworldSession>>,
    camera_q: Query<&Transform, (With<MainCamera>, Without<ScreenOverlay>)>,
    mut overlay_q: Query<(&mut Sprite, &mut Transform), With<ScreenOverlay>>,
) {
    let Some(session) = session else {
        return;
    };
    let Ok((mut sprite, mut transform)) = overlay_q.get_single_mut() else {
        return;
    };
    if let Ok(cam_transform) = camera_q.get_single() {
        transform.translation.x = cam_transform.translation.x;
        transform.translation.y = cam_transform.translation.y;
    }
    sprite.color = Color::srgba(0.0, 0.0, 0.0, session.fade_alpha());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_fade_is_clear_and_complete() {
        let fade = FadeController::default();
        assert_eq!(fade.alpha(1000.0), 0.0);
        assert!(fade.is_complete(0.0));
    }

    #[test]
    fn fade_out_holds_black_after_completion() {
        let mut fade = FadeController::default();
        fade.arm(FadeMode::Out, 100.0, 500.0);
        assert!(!fade.is_complete(350.0));
        assert!((fade.alpha(350.0) - 0.5).abs() < 1e-4);
        assert!(fade.is_complete(600.0));
        assert_eq!(fade.alpha(5000.0), 1.0);

        fade.arm(FadeMode::In, 600.0, 500.0);
        assert_eq!(fade.alpha(600.0), 1.0);
        assert_eq!(fade.alpha(1100.0), 0.0);
    }
}
