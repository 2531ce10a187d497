use bevy::prelude::*;

use crate::EditorCamera;

/// Cursor position and the world ray under it, from the editor camera.
pub(crate) fn cursor_ray(
    windows: &Query<&Window>,
    cameras: &Query<(&Camera, &GlobalTransform), With<EditorCamera>>,
) -> Option<(Vec2, Ray3d)> {
    let window = windows.single().ok()?;
    let cursor = window.cursor_position()?;
    let (camera, cam_tf) = cameras.single().ok()?;
    let ray = camera.viewport_to_world(cam_tf, cursor).ok()?;
    Some((cursor, ray))
}

pub(crate) fn additive_modifier(keyboard: &ButtonInput<KeyCode>) -> bool {
    keyboard.any_pressed([
        KeyCode::ControlLeft,
        KeyCode::ControlRight,
        KeyCode::ShiftLeft,
        KeyCode::ShiftRight,
    ])
}

pub(crate) fn ctrl_pressed(keyboard: &ButtonInput<KeyCode>) -> bool {
    keyboard.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight])
}
