//! Undoable mesh edits and the undo/redo key bindings.

use std::collections::BTreeMap;

use bevy::prelude::*;

pub use quadrille_commands::{CommandGroup, CommandHistory, EditorCommand};

use crate::edit_mode::{self, MeshSelection};
use crate::error::{MeshEditError, Result};
use crate::mesh_registry::{EditableMesh, MeshRegistry, ObjectId};
use crate::qmesh::{MeshSnapshot, QMesh, VertexId};
use crate::transaction::ActiveEdit;

pub struct CommandHistoryPlugin;

impl Plugin for CommandHistoryPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CommandHistory>()
            .add_systems(Update, handle_undo_redo_keys);
    }
}

/// Run `edit` against the editable mesh of `object`. Marks the mesh changed
/// so it is re-rendered.
pub fn edit_object_mesh<T>(
    world: &mut World,
    object: ObjectId,
    edit: impl FnOnce(&mut QMesh) -> Result<T>,
) -> Result<T> {
    let entity = world
        .resource::<MeshRegistry>()
        .entity(object)
        .ok_or(MeshEditError::UnknownObject(object))?;
    let mut editable = world
        .get_mut::<EditableMesh>(entity)
        .ok_or(MeshEditError::UnknownObject(object))?;
    edit(&mut editable.mesh)
}

// ---------------------------------------------------------------------------
// MoveVertices
// ---------------------------------------------------------------------------

pub struct MoveVertices {
    pub object: ObjectId,
    pub old: BTreeMap<VertexId, Vec3>,
    pub new: BTreeMap<VertexId, Vec3>,
}

fn set_positions(world: &mut World, object: ObjectId, positions: &BTreeMap<VertexId, Vec3>) {
    let result = edit_object_mesh(world, object, |mesh| {
        for (id, position) in positions {
            mesh.set_vertex_position(id, *position)?;
        }
        Ok(())
    });
    if let Err(err) = result {
        err.log("Move vertices");
    }
}

impl EditorCommand for MoveVertices {
    fn apply(&mut self, world: &mut World) {
        set_positions(world, self.object, &self.new);
    }

    fn revert(&mut self, world: &mut World) {
        set_positions(world, self.object, &self.old);
    }

    fn description(&self) -> &str {
        "Move vertices"
    }
}

// ---------------------------------------------------------------------------
// SetTopology: whole-mesh before/after, used for cuts
// ---------------------------------------------------------------------------

pub struct SetTopology {
    pub object: ObjectId,
    pub before: MeshSnapshot,
    pub after: MeshSnapshot,
    pub label: String,
}

fn restore_snapshot(world: &mut World, object: ObjectId, snapshot: &MeshSnapshot, label: &str) {
    if let Err(err) = edit_object_mesh(world, object, |mesh| mesh.restore(snapshot)) {
        err.log(label);
        return;
    }
    edit_mode::prune_selection(world);
}

impl EditorCommand for SetTopology {
    fn apply(&mut self, world: &mut World) {
        restore_snapshot(world, self.object, &self.after, &self.label);
    }

    fn revert(&mut self, world: &mut World) {
        restore_snapshot(world, self.object, &self.before, &self.label);
    }

    fn description(&self) -> &str {
        &self.label
    }
}

// ---------------------------------------------------------------------------
// Keyboard shortcut system
// ---------------------------------------------------------------------------

/// Cancel whatever edit is still pending on the edited object.
pub(crate) fn cancel_pending_edit(world: &mut World) {
    if world.resource::<ActiveEdit>().is_idle() {
        return;
    }
    let Some(object) = world.resource::<MeshSelection>().object else {
        return;
    };
    world.resource_scope(|world, mut active: Mut<ActiveEdit>| {
        let result = edit_object_mesh(world, object, |mesh| {
            active.cancel(mesh);
            Ok(())
        });
        if let Err(err) = result {
            err.log("Cancel pending edit");
            // The object is gone; nothing left to restore.
            active.take();
        }
    });
}

fn handle_undo_redo_keys(world: &mut World) {
    let keyboard = world.resource::<ButtonInput<KeyCode>>();
    let ctrl = keyboard.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight]);
    let shift = keyboard.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]);
    if !ctrl || !keyboard.just_pressed(KeyCode::KeyZ) {
        return;
    }

    cancel_pending_edit(world);
    let done = world.resource_scope(|world, mut history: Mut<CommandHistory>| {
        if shift { history.redo(world) } else { history.undo(world) }
    });
    match done {
        Some(label) if shift => info!("Redo: {label}"),
        Some(label) => info!("Undo: {label}"),
        None => debug!("Nothing to {}", if shift { "redo" } else { "undo" }),
    }
    edit_mode::prune_selection(world);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_registry::{EditableObject, MeshRegistryPlugin};
    use crate::qmesh::fixtures::{face_near, unit_cube};
    use crate::settings::{CutMode, MeshEditSettings};

    fn world_with_cube() -> (World, ObjectId, Entity) {
        let mut world = World::new();
        world.init_resource::<MeshRegistry>();
        world.init_resource::<MeshSelection>();
        let id = world.resource_mut::<MeshRegistry>().allocate();
        let entity = world
            .spawn((EditableObject { id }, EditableMesh { mesh: unit_cube() }))
            .id();
        world.resource_mut::<MeshRegistry>().register(id, entity, None);
        (world, id, entity)
    }

    fn snapshot(world: &World, entity: Entity) -> MeshSnapshot {
        world.get::<EditableMesh>(entity).unwrap().mesh.snapshot()
    }

    #[test]
    fn move_vertices_round_trips_through_history() {
        let (mut world, id, entity) = world_with_cube();
        let before = snapshot(&world, entity);
        let vertex = VertexId::from_serial(0);
        let old = before.vertices[&vertex];

        let mut history = CommandHistory::default();
        history.execute(
            Box::new(MoveVertices {
                object: id,
                old: BTreeMap::from([(vertex.clone(), old)]),
                new: BTreeMap::from([(vertex.clone(), old + Vec3::Y)]),
            }),
            &mut world,
        );
        let after = snapshot(&world, entity);
        assert_eq!(after.vertices[&vertex], old + Vec3::Y);

        assert_eq!(history.undo(&mut world).as_deref(), Some("Move vertices"));
        assert_eq!(snapshot(&world, entity), before);
        history.redo(&mut world);
        assert_eq!(snapshot(&world, entity), after);
    }

    #[test]
    fn cut_undo_redo_restores_exact_snapshots() {
        let (mut world, id, entity) = world_with_cube();
        let before = snapshot(&world, entity);

        {
            let mut editable = world.get_mut::<EditableMesh>(entity).unwrap();
            let top = face_near(&editable.mesh, Vec3::new(0.0, 0.5, 0.0));
            crate::knife::knife_cut(
                &mut editable.mesh,
                &top,
                Vec3::new(0.0, 0.5, -0.7),
                Vec3::new(0.0, 0.5, 0.7),
                CutMode::Quad,
                &MeshEditSettings::default(),
            )
            .unwrap();
        }
        let after = snapshot(&world, entity);

        let mut history = CommandHistory::default();
        history.record(Box::new(SetTopology {
            object: id,
            before: before.clone(),
            after: after.clone(),
            label: "Knife cut".into(),
        }));

        history.undo(&mut world);
        assert_eq!(snapshot(&world, entity), before);
        history.redo(&mut world);
        assert_eq!(snapshot(&world, entity), after);
        history.undo(&mut world);
        assert_eq!(snapshot(&world, entity), before);
    }

    #[test]
    fn ids_minted_after_undo_do_not_collide() {
        let (mut world, id, entity) = world_with_cube();
        let before = snapshot(&world, entity);
        let added = edit_object_mesh(&mut world, id, |mesh| Ok(mesh.add_vertex(Vec3::ONE))).unwrap();
        let after = snapshot(&world, entity);

        let mut history = CommandHistory::default();
        history.record(Box::new(SetTopology {
            object: id,
            before,
            after,
            label: "Add vertex".into(),
        }));
        history.undo(&mut world);

        let next = edit_object_mesh(&mut world, id, |mesh| Ok(mesh.add_vertex(Vec3::ZERO))).unwrap();
        assert_ne!(next, added);
    }

    #[test]
    fn commands_on_missing_objects_are_no_ops() {
        let mut world = World::new();
        world.init_resource::<MeshRegistry>();
        let mut command = MoveVertices {
            object: ObjectId(3),
            old: BTreeMap::new(),
            new: BTreeMap::new(),
        };
        command.apply(&mut world);
        command.revert(&mut world);
    }

    #[test]
    fn undo_key_reverts_last_command() {
        let mut app = App::new();
        app.init_resource::<Assets<Mesh>>()
            .init_resource::<ButtonInput<KeyCode>>()
            .init_resource::<MeshSelection>()
            .init_resource::<ActiveEdit>()
            .add_plugins((MeshRegistryPlugin, CommandHistoryPlugin));

        let id = ObjectId(0);
        let entity = app
            .world_mut()
            .spawn((EditableObject { id }, EditableMesh { mesh: unit_cube() }))
            .id();
        let before = snapshot(app.world(), entity);
        let vertex = VertexId::from_serial(1);
        let old = before.vertices[&vertex];
        app.world_mut().resource_scope(|world, mut history: Mut<CommandHistory>| {
            history.execute(
                Box::new(MoveVertices {
                    object: id,
                    old: BTreeMap::from([(vertex.clone(), old)]),
                    new: BTreeMap::from([(vertex.clone(), Vec3::splat(4.0))]),
                }),
                world,
            );
        });

        let mut keys = app.world_mut().resource_mut::<ButtonInput<KeyCode>>();
        keys.press(KeyCode::ControlLeft);
        keys.press(KeyCode::KeyZ);
        app.update();

        assert_eq!(snapshot(app.world(), entity), before);
        assert!(app.world().resource::<CommandHistory>().can_redo());
    }
}
