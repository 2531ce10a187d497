//! Maps object ids to scene entities and keeps each object's rendered mesh
//! in step with its editable geometry.

use std::collections::HashMap;
use std::fmt;

use bevy::prelude::*;
use quadrille_geometry::UvProjection;
use serde::{Deserialize, Serialize};

use crate::error::{MeshEditError, Result};
use crate::qmesh::{QMesh, RenderBuffer};
use crate::settings::MeshEditSettings;

/// Stable identifier for an editable object. Survives despawn and respawn
/// through undo, unlike [`Entity`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Reflect)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj{}", self.0)
    }
}

/// Marks an entity whose mesh can be edited.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct EditableObject {
    pub id: ObjectId,
}

/// The editable geometry of an object. Inserted on first entry into edit
/// mode; any change to it is re-rendered by [`sync_edited_meshes`].
#[derive(Component, Clone, Debug, Default)]
pub struct EditableMesh {
    pub mesh: QMesh,
}

#[derive(Debug)]
struct RegistryEntry {
    entity: Entity,
    handle: Option<Handle<Mesh>>,
    /// Whether `handle` was created by the registry and may be disposed.
    owned: bool,
    buffer: Option<RenderBuffer>,
}

#[derive(Resource, Default, Debug)]
pub struct MeshRegistry {
    entries: HashMap<ObjectId, RegistryEntry>,
    next_id: u64,
}

impl MeshRegistry {
    pub fn allocate(&mut self) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Record `entity` as the owner of `id`. `handle` is the entity's current
    /// mesh, which the registry never disposes.
    pub fn register(&mut self, id: ObjectId, entity: Entity, handle: Option<Handle<Mesh>>) {
        self.next_id = self.next_id.max(id.0 + 1);
        let previous = self.entries.insert(
            id,
            RegistryEntry {
                entity,
                handle,
                owned: false,
                buffer: None,
            },
        );
        if let Some(previous) = previous {
            warn!("Object {id} re-registered (was {:?}, now {entity:?})", previous.entity);
        }
    }

    /// Forget `id`, disposing any mesh asset the registry created for it.
    pub fn unregister(&mut self, id: ObjectId, meshes: &mut Assets<Mesh>) -> Option<Entity> {
        let entry = self.entries.remove(&id)?;
        if let (true, Some(handle)) = (entry.owned, &entry.handle) {
            meshes.remove(handle);
        }
        Some(entry.entity)
    }

    pub fn entity(&self, id: ObjectId) -> Option<Entity> {
        self.entries.get(&id).map(|entry| entry.entity)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The buffer last uploaded for `id`.
    pub fn render_buffer(&self, id: ObjectId) -> Option<&RenderBuffer> {
        self.entries.get(&id)?.buffer.as_ref()
    }

    /// Recompile `mesh`, upload it as a new asset and dispose the previous
    /// one. Also rebuilds the mesh's triangle index map.
    pub fn sync(
        &mut self,
        id: ObjectId,
        mesh: &mut QMesh,
        meshes: &mut Assets<Mesh>,
        uvs: Option<&UvProjection>,
    ) -> Result<Handle<Mesh>> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(MeshEditError::UnknownObject(id))?;

        let buffer = mesh.compile(uvs);
        let handle = meshes.add(buffer.to_mesh());
        if let (true, Some(old)) = (entry.owned, entry.handle.take()) {
            meshes.remove(&old);
        }
        entry.handle = Some(handle.clone());
        entry.owned = true;
        entry.buffer = Some(buffer);
        Ok(handle)
    }
}

pub struct MeshRegistryPlugin;

impl Plugin for MeshRegistryPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MeshRegistry>()
            .init_resource::<MeshEditSettings>()
            .register_type::<EditableObject>()
            .add_observer(on_editable_added)
            .add_observer(on_editable_removed)
            .add_systems(PostUpdate, sync_edited_meshes);
    }
}

fn on_editable_added(
    trigger: On<Add, EditableObject>,
    objects: Query<(&EditableObject, Option<&Mesh3d>)>,
    mut registry: ResMut<MeshRegistry>,
) {
    let entity = trigger.event_target();
    if let Ok((object, mesh)) = objects.get(entity) {
        registry.register(object.id, entity, mesh.map(|m| m.0.clone()));
        debug!("Registered editable object {} as {entity:?}", object.id);
    }
}

fn on_editable_removed(
    trigger: On<Remove, EditableObject>,
    objects: Query<&EditableObject>,
    mut registry: ResMut<MeshRegistry>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    let entity = trigger.event_target();
    let Ok(object) = objects.get(entity) else {
        return;
    };
    // A respawned object may already own the id again.
    if registry.entity(object.id) == Some(entity) {
        registry.unregister(object.id, &mut meshes);
        debug!("Unregistered editable object {}", object.id);
    }
}

/// Re-render every object whose geometry changed this frame.
pub fn sync_edited_meshes(
    mut objects: Query<(&EditableObject, &mut EditableMesh, &mut Mesh3d), Changed<EditableMesh>>,
    mut registry: ResMut<MeshRegistry>,
    mut meshes: ResMut<Assets<Mesh>>,
    settings: Res<MeshEditSettings>,
) {
    for (object, mut editable, mut mesh3d) in &mut objects {
        let editable = editable.bypass_change_detection();
        match registry.sync(object.id, &mut editable.mesh, &mut meshes, settings.uv_projection()) {
            Ok(handle) => mesh3d.0 = handle,
            Err(err) => err.log("Render sync"),
        }
    }
}
