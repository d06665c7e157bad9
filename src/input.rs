use bevy::prelude::*;
use std::collections::HashSet;

use crate::components::Direction;

pub const RUN_ACTION: &str = "run";

/// Abstraction layer between raw input and the overworld session.
/// Keyboard (windowed), the HTTP API and headless simulations all write to this.
#[derive(Resource, Default, Clone, Debug)]
pub struct VirtualInput {
    pub active: HashSet<String>,
    pub just_pressed: HashSet<String>,
    pub just_released: HashSet<String>,
}

impl VirtualInput {
    pub fn pressed(&self, action: &str) -> bool {
        self.active.contains(action)
    }

    pub fn just_pressed(&self, action: &str) -> bool {
        self.just_pressed.contains(action)
    }

    /// First held direction in up, down, left, right order.
    pub fn held_direction(&self) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|d| self.pressed(d.action_name()))
    }

    pub fn run_held(&self) -> bool {
        self.pressed(RUN_ACTION)
    }

    /// Replaces the held set, deriving press/release edges from the previous one.
    pub fn set_held<I, S>(&mut self, actions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let next: HashSet<String> = actions.into_iter().map(Into::into).collect();
        self.just_pressed = next.difference(&self.active).cloned().collect();
        self.just_released = self.active.difference(&next).cloned().collect();
        self.active = next;
    }

    pub fn clear_frame(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
    }
}

/// Keeps keyboard input from overwriting actions injected by the API.
#[derive(Resource, Default, Clone, Copy)]
pub struct ExternalInputOverride(pub bool);

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(VirtualInput::default())
            .insert_resource(ExternalInputOverride::default())
            .add_systems(
                PreUpdate,
                keyboard_to_virtual.run_if(resource_exists::<ButtonInput<KeyCode>>),
            )
            .add_systems(Last, clear_virtual_input);
    }
}

fn keyboard_to_virtual(
    keyboard: Res<ButtonInput<KeyCode>>,
    external: Res<ExternalInputOverride>,
    mut vinput: ResMut<VirtualInput>,
) {
    if external.0 {
        return;
    }
    let bindings: [(&str, &[KeyCode]); 5] = [
        ("up", &[KeyCode::KeyW, KeyCode::ArrowUp]),
        ("down", &[KeyCode::KeyS, KeyCode::ArrowDown]),
        ("left", &[KeyCode::KeyA, KeyCode::ArrowLeft]),
        ("right", &[KeyCode::KeyD, KeyCode::ArrowRight]),
        (RUN_ACTION, &[KeyCode::KeyX, KeyCode::ShiftLeft]),
    ];
    let held = bindings
        .iter()
        .filter(|(_, keys)| keys.iter().any(|k| keyboard.pressed(*k)))
        .map(|(action, _)| *action);
    vinput.set_held(held);
}

fn clear_virtual_input(mut vinput: ResMut<VirtualInput>) {
    vinput.clear_frame();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_direction_uses_priority_order() {
        let mut input = VirtualInput::default();
        input.set_held(["right", "down"]);
        assert_eq!(input.held_direction(), Some(Direction::Down));
        input.set_held(["left", "run"]);
        assert_eq!(input.held_direction(), Some(Direction::Left));
        assert!(input.run_held());
    }

    #[test]
    fn set_held_tracks_edges() {
        let mut input = VirtualInput::default();
        input.set_held(["up"]);
        assert!(input.just_pressed("up"));
        input.set_held(["up", "run"]);
        assert!(!input.just_pressed("up"));
        assert!(input.just_pressed("run"));
        input.set_held(Vec::<String>::new());
        assert!(input.just_released.contains("up"));
        assert_eq!(input.held_direction(), None);
    }
}
