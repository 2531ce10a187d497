//! Object-level selection, used outside edit mode.

use bevy::picking::mesh_picking::ray_cast::{MeshRayCast, MeshRayCastSettings, RayCastVisibility};
use bevy::prelude::*;

use crate::EditorCamera;
use crate::edit_mode::EditMode;
use crate::mesh_registry::EditableObject;
use crate::viewport_util::{additive_modifier, cursor_ray};

pub struct SelectionPlugin;

impl Plugin for SelectionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ObjectSelection>()
            .add_observer(on_selected_removed)
            .add_systems(Update, handle_object_pick);
    }
}

/// Marker component placed on selected objects.
#[derive(Component)]
pub struct Selected;

#[derive(Resource, Default, Debug)]
pub struct ObjectSelection {
    /// Ordered list of selected objects. The last one is the primary.
    pub entities: Vec<Entity>,
}

impl ObjectSelection {
    pub fn select_single(&mut self, commands: &mut Commands, entity: Entity) {
        // Keep the marker on `entity` so its removal observer does not fire.
        for &e in self.entities.iter().filter(|&&e| e != entity) {
            if let Ok(mut ec) = commands.get_entity(e) {
                ec.remove::<Selected>();
            }
        }
        self.entities.clear();
        self.entities.push(entity);
        commands.entity(entity).insert(Selected);
    }

    /// Ctrl/Shift+Click behaviour.
    pub fn toggle(&mut self, commands: &mut Commands, entity: Entity) {
        if let Some(pos) = self.entities.iter().position(|&e| e == entity) {
            self.entities.remove(pos);
            commands.entity(entity).remove::<Selected>();
        } else {
            self.entities.push(entity);
            commands.entity(entity).insert(Selected);
        }
    }

    pub fn clear(&mut self, commands: &mut Commands) {
        for &e in &self.entities {
            if let Ok(mut ec) = commands.get_entity(e) {
                ec.remove::<Selected>();
            }
        }
        self.entities.clear();
    }

    /// Replace the selection from exclusive-world code.
    pub fn set_in_world(world: &mut World, entities: Vec<Entity>) {
        let old = std::mem::take(&mut world.resource_mut::<ObjectSelection>().entities);
        for e in old {
            if let Ok(mut entity) = world.get_entity_mut(e) {
                entity.remove::<Selected>();
            }
        }
        for &e in &entities {
            if let Ok(mut entity) = world.get_entity_mut(e) {
                entity.insert(Selected);
            }
        }
        world.resource_mut::<ObjectSelection>().entities = entities;
    }

    pub fn primary(&self) -> Option<Entity> {
        self.entities.last().copied()
    }

    pub fn is_selected(&self, entity: Entity) -> bool {
        self.entities.contains(&entity)
    }
}

fn on_selected_removed(trigger: On<Remove, Selected>, mut selection: ResMut<ObjectSelection>) {
    let entity = trigger.event_target();
    selection.entities.retain(|&e| e != entity);
}

fn handle_object_pick(
    mouse: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
    edit_mode: Res<EditMode>,
    windows: Query<&Window>,
    cameras: Query<(&Camera, &GlobalTransform), With<EditorCamera>>,
    editable: Query<(), With<EditableObject>>,
    mut selection: ResMut<ObjectSelection>,
    mut commands: Commands,
    mut ray_cast: MeshRayCast,
) {
    if !mouse.just_pressed(MouseButton::Left) || *edit_mode != EditMode::Object {
        return;
    }
    let Some((_, ray)) = cursor_ray(&windows, &cameras) else {
        return;
    };

    let settings = MeshRayCastSettings::default().with_visibility(RayCastVisibility::Any);
    let hit = ray_cast
        .cast_ray(ray, &settings)
        .iter()
        .map(|(entity, _)| *entity)
        .find(|entity| editable.contains(*entity));

    let additive = additive_modifier(&keyboard);
    match hit {
        Some(entity) if additive => selection.toggle(&mut commands, entity),
        Some(entity) => selection.select_single(&mut commands, entity),
        None if !additive => selection.clear(&mut commands),
        None => {}
    }
}
