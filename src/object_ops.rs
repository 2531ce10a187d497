//! Spawning, deleting and duplicating editable objects, all undoable.

use bevy::prelude::*;

use crate::commands::{CommandGroup, CommandHistory, EditorCommand};
use crate::edit_mode::{EditMode, MeshSelection, exit_edit_mode};
use crate::error::{MeshEditError, Result};
use crate::mesh_registry::{EditableMesh, EditableObject, MeshRegistry, ObjectId};
use crate::qmesh::{MeshSnapshot, QMesh};
use crate::selection::ObjectSelection;
use crate::viewport_util::ctrl_pressed;

pub struct ObjectOpsPlugin;

impl Plugin for ObjectOpsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, handle_object_keys);
    }
}

/// Everything needed to bring an object back after it was despawned.
#[derive(Clone, Debug)]
pub struct ObjectRecord {
    pub id: ObjectId,
    pub name: Option<Name>,
    pub transform: Transform,
    pub snapshot: Option<MeshSnapshot>,
    pub mesh: Option<Handle<Mesh>>,
    pub material: Option<Handle<StandardMaterial>>,
}

impl ObjectRecord {
    pub fn capture(world: &World, entity: Entity) -> Result<Self> {
        let id = world
            .get::<EditableObject>(entity)
            .map(|o| o.id)
            .ok_or_else(|| MeshEditError::InvalidSourceMesh(format!("{entity:?} is not editable")))?;
        Ok(Self {
            id,
            name: world.get::<Name>(entity).cloned(),
            transform: world.get::<Transform>(entity).copied().unwrap_or_default(),
            snapshot: world.get::<EditableMesh>(entity).map(|e| e.mesh.snapshot()),
            mesh: world.get::<Mesh3d>(entity).map(|m| m.0.clone()),
            material: world
                .get::<MeshMaterial3d<StandardMaterial>>(entity)
                .map(|m| m.0.clone()),
        })
    }

    pub fn spawn(&self, world: &mut World) -> Entity {
        let mut entity = world.spawn((
            EditableObject { id: self.id },
            self.transform,
            Mesh3d(self.mesh.clone().unwrap_or_default()),
        ));
        if let Some(name) = &self.name {
            entity.insert(name.clone());
        }
        if let Some(material) = &self.material {
            entity.insert(MeshMaterial3d(material.clone()));
        }
        if let Some(snapshot) = &self.snapshot {
            match QMesh::from_snapshot(snapshot) {
                Ok(mesh) => {
                    entity.insert(EditableMesh { mesh });
                }
                Err(err) => err.log("Respawn object"),
            }
        }
        entity.id()
    }
}

fn despawn_object(world: &mut World, id: ObjectId) {
    if world.resource::<MeshSelection>().object == Some(id) && *world.resource::<EditMode>() != EditMode::Object {
        exit_edit_mode(world);
    }
    let Some(entity) = world.resource::<MeshRegistry>().entity(id) else {
        MeshEditError::UnknownObject(id).log("Despawn object");
        return;
    };
    world.despawn(entity);
}

// ---------------------------------------------------------------------------
// SpawnObject / DeleteObject
// ---------------------------------------------------------------------------

pub struct SpawnObject {
    pub record: ObjectRecord,
    pub label: String,
}

impl EditorCommand for SpawnObject {
    fn apply(&mut self, world: &mut World) {
        self.record.spawn(world);
    }

    fn revert(&mut self, world: &mut World) {
        despawn_object(world, self.record.id);
    }

    fn description(&self) -> &str {
        &self.label
    }
}

pub struct DeleteObject {
    pub record: ObjectRecord,
}

impl EditorCommand for DeleteObject {
    fn apply(&mut self, world: &mut World) {
        // Pick up edits made since the record was taken.
        if let Some(entity) = world.resource::<MeshRegistry>().entity(self.record.id)
            && let Ok(record) = ObjectRecord::capture(world, entity)
        {
            self.record = record;
        }
        despawn_object(world, self.record.id);
    }

    fn revert(&mut self, world: &mut World) {
        self.record.spawn(world);
    }

    fn description(&self) -> &str {
        "Delete object"
    }
}

/// Spawn of a copy of `source` under a fresh id.
pub struct DuplicateObject {
    pub source: ObjectId,
    pub record: ObjectRecord,
}

impl EditorCommand for DuplicateObject {
    fn apply(&mut self, world: &mut World) {
        self.record.spawn(world);
    }

    fn revert(&mut self, world: &mut World) {
        despawn_object(world, self.record.id);
    }

    fn description(&self) -> &str {
        "Duplicate object"
    }
}

// ---------------------------------------------------------------------------
// Selection-level operations
// ---------------------------------------------------------------------------

/// Spawn a new editable object as an undoable step.
pub fn spawn_object(
    world: &mut World,
    name: &str,
    transform: Transform,
    mesh: Handle<Mesh>,
    material: Option<Handle<StandardMaterial>>,
) -> ObjectId {
    let id = world.resource_mut::<MeshRegistry>().allocate();
    let command = SpawnObject {
        record: ObjectRecord {
            id,
            name: Some(Name::new(name.to_string())),
            transform,
            snapshot: None,
            mesh: Some(mesh),
            material,
        },
        label: format!("Spawn {name}"),
    };
    world.resource_scope(|world, mut history: Mut<CommandHistory>| {
        history.execute(Box::new(command), world);
    });
    id
}

fn selected_records(world: &World) -> Vec<ObjectRecord> {
    world
        .resource::<ObjectSelection>()
        .entities
        .iter()
        .filter_map(|&entity| ObjectRecord::capture(world, entity).ok())
        .collect()
}

pub fn delete_selected(world: &mut World) {
    let records = selected_records(world);
    if records.is_empty() {
        return;
    }
    let count = records.len();
    ObjectSelection::set_in_world(world, Vec::new());
    let group = CommandGroup {
        commands: records
            .into_iter()
            .map(|record| Box::new(DeleteObject { record }) as Box<dyn EditorCommand>)
            .collect(),
        label: "Delete objects".to_string(),
    };
    world.resource_scope(|world, mut history: Mut<CommandHistory>| {
        history.execute(Box::new(group), world);
    });
    info!("Deleted {count} objects");
}

pub fn duplicate_selected(world: &mut World) {
    let records = selected_records(world);
    if records.is_empty() {
        return;
    }

    let mut commands: Vec<Box<dyn EditorCommand>> = Vec::new();
    let mut new_ids = Vec::new();
    for mut record in records {
        let source = record.id;
        record.id = world.resource_mut::<MeshRegistry>().allocate();
        record.transform.translation += Vec3::new(0.5, 0.0, 0.5);
        record.name = Some(Name::new(match &record.name {
            Some(name) => format!("{} (Copy)", name.as_str()),
            None => format!("{source} (Copy)"),
        }));
        new_ids.push(record.id);
        commands.push(Box::new(DuplicateObject { source, record }));
    }

    world.resource_scope(|world, mut history: Mut<CommandHistory>| {
        history.execute(
            Box::new(CommandGroup {
                commands,
                label: "Duplicate objects".to_string(),
            }),
            world,
        );
    });

    let registry = world.resource::<MeshRegistry>();
    let entities: Vec<Entity> = new_ids.iter().filter_map(|id| registry.entity(*id)).collect();
    ObjectSelection::set_in_world(world, entities);
}

// ---------------------------------------------------------------------------
// Keyboard shortcuts
// ---------------------------------------------------------------------------

fn handle_object_keys(world: &mut World) {
    if *world.resource::<EditMode>() != EditMode::Object {
        return;
    }
    let keyboard = world.resource::<ButtonInput<KeyCode>>();
    let delete = keyboard.just_pressed(KeyCode::Delete);
    let duplicate = ctrl_pressed(keyboard) && keyboard.just_pressed(KeyCode::KeyD);

    if delete {
        delete_selected(world);
    } else if duplicate {
        duplicate_selected(world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit_mode::{ActiveTool, enter_edit_mode};
    use crate::error::EditNotice;
    use crate::mesh_registry::MeshRegistryPlugin;
    use crate::selection::SelectionPlugin;
    use crate::transaction::ActiveEdit;

    fn app() -> App {
        let mut app = App::new();
        app.init_resource::<Assets<Mesh>>()
            .init_resource::<EditMode>()
            .init_resource::<ActiveTool>()
            .init_resource::<MeshSelection>()
            .init_resource::<ActiveEdit>()
            .init_resource::<CommandHistory>()
            .add_message::<EditNotice>()
            .add_plugins(MeshRegistryPlugin);
        app.world_mut().init_resource::<ObjectSelection>();
        app
    }

    fn spawn_cube(world: &mut World) -> ObjectId {
        let mesh = world
            .resource_mut::<Assets<Mesh>>()
            .add(Mesh::from(Cuboid::default()));
        spawn_object(world, "Cube", Transform::default(), mesh, None)
    }

    #[test]
    fn spawn_is_undoable() {
        let mut app = app();
        let world = app.world_mut();
        let id = spawn_cube(world);
        assert!(world.resource::<MeshRegistry>().contains(id));

        world.resource_scope(|world, mut history: Mut<CommandHistory>| history.undo(world));
        assert!(!world.resource::<MeshRegistry>().contains(id));

        world.resource_scope(|world, mut history: Mut<CommandHistory>| history.redo(world));
        assert!(world.resource::<MeshRegistry>().contains(id));
    }

    #[test]
    fn delete_then_undo_restores_edited_geometry() {
        let mut app = app();
        let world = app.world_mut();
        let id = spawn_cube(world);
        let entity = world.resource::<MeshRegistry>().entity(id).unwrap();
        enter_edit_mode(world, entity).unwrap();
        let snapshot = world.get::<EditableMesh>(entity).unwrap().mesh.snapshot();
        exit_edit_mode(world);

        ObjectSelection::set_in_world(world, vec![entity]);
        delete_selected(world);
        assert!(world.get_entity(entity).is_err());
        assert!(world.resource::<ObjectSelection>().entities.is_empty());

        world.resource_scope(|world, mut history: Mut<CommandHistory>| history.undo(world));
        let restored = world.resource::<MeshRegistry>().entity(id).unwrap();
        assert_eq!(world.get::<EditableMesh>(restored).unwrap().mesh.snapshot(), snapshot);
        assert_eq!(world.get::<Name>(restored).map(Name::as_str), Some("Cube"));
    }

    #[test]
    fn duplicate_gets_a_fresh_id_and_selection() {
        let mut app = app();
        let world = app.world_mut();
        let id = spawn_cube(world);
        let entity = world.resource::<MeshRegistry>().entity(id).unwrap();
        ObjectSelection::set_in_world(world, vec![entity]);

        duplicate_selected(world);
        let selection = world.resource::<ObjectSelection>().entities.clone();
        assert_eq!(selection.len(), 1);
        let copy = selection[0];
        assert_ne!(copy, entity);
        let copy_id = world.get::<EditableObject>(copy).unwrap().id;
        assert_ne!(copy_id, id);
        assert_eq!(world.get::<Name>(copy).map(Name::as_str), Some("Cube (Copy)"));
        assert_eq!(
            world.get::<Transform>(copy).unwrap().translation,
            Vec3::new(0.5, 0.0, 0.5)
        );

        world.resource_scope(|world, mut history: Mut<CommandHistory>| history.undo(world));
        assert!(!world.resource::<MeshRegistry>().contains(copy_id));
        assert!(world.resource::<MeshRegistry>().contains(id));
    }

    #[test]
    fn deleting_the_edited_object_leaves_edit_mode() {
        let mut app = app();
        app.add_plugins(SelectionPlugin);
        let world = app.world_mut();
        let id = spawn_cube(world);
        let entity = world.resource::<MeshRegistry>().entity(id).unwrap();
        enter_edit_mode(world, entity).unwrap();

        ObjectSelection::set_in_world(world, vec![entity]);
        delete_selected(world);
        assert_eq!(*world.resource::<EditMode>(), EditMode::Object);
    }
}
