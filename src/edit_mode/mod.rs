//! Object mode / mesh edit mode, the element selection inside a mesh, and
//! the active tool.

mod interaction;
mod pick;

use std::collections::BTreeSet;

use bevy::prelude::*;

use crate::commands::{cancel_pending_edit, edit_object_mesh};
use crate::error::{EditNotice, MeshEditError, Result};
use crate::mesh_registry::{EditableMesh, EditableObject, MeshRegistry, ObjectId};
use crate::qmesh::{FaceId, MeshEdge, QMesh, VertexId};
use crate::settings::MeshEditSettings;
use crate::transaction::ActiveEdit;

pub use pick::{PickHit, PickTarget, resolve_pick, snap_knife_point};

pub struct EditModePlugin;

impl Plugin for EditModePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<EditMode>()
            .init_resource::<ActiveTool>()
            .init_resource::<MeshSelection>()
            .init_resource::<ActiveEdit>()
            .add_message::<ViewportClick>()
            .register_type::<EditMode>()
            .register_type::<ActiveTool>()
            .add_systems(
                Update,
                (
                    interaction::handle_edit_mode_keys,
                    interaction::emit_viewport_clicks,
                    interaction::handle_mesh_pick,
                    interaction::handle_knife_tool,
                    interaction::handle_vertex_drag,
                )
                    .chain(),
            );
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// A left click over the viewport while a mesh is in edit mode.
#[derive(Message, Clone, Copy, Debug)]
pub struct ViewportClick {
    /// World-space ray under the cursor.
    pub ray: Ray3d,
    /// First hit on the edited object.
    pub hit: Option<PickHit>,
    /// Shift or Ctrl held: toggle instead of replace.
    pub additive: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Reflect)]
pub enum SelectionMode {
    Vertex,
    Edge,
    #[default]
    Face,
}

#[derive(Resource, Clone, Copy, Debug, Default, PartialEq, Eq, Reflect)]
#[reflect(Resource)]
pub enum EditMode {
    #[default]
    Object,
    Mesh(SelectionMode),
}

impl EditMode {
    pub fn selection_mode(self) -> Option<SelectionMode> {
        match self {
            EditMode::Object => None,
            EditMode::Mesh(mode) => Some(mode),
        }
    }
}

#[derive(Resource, Clone, Copy, Debug, Default, PartialEq, Eq, Reflect)]
#[reflect(Resource)]
pub enum ActiveTool {
    #[default]
    Select,
    Knife,
}

/// Selected elements of the object being edited. Each selection mode keeps
/// its own set, and switching modes leaves all three intact.
#[derive(Resource, Clone, Debug, Default, PartialEq)]
pub struct MeshSelection {
    /// The object in edit mode, or the last one edited.
    pub object: Option<ObjectId>,
    pub vertices: BTreeSet<VertexId>,
    pub edges: BTreeSet<MeshEdge>,
    pub faces: BTreeSet<FaceId>,
    /// Mode to return to on the next entry into edit mode.
    pub last_mode: SelectionMode,
}

impl MeshSelection {
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.faces.clear();
    }

    pub fn clear_mode(&mut self, mode: SelectionMode) {
        match mode {
            SelectionMode::Vertex => self.vertices.clear(),
            SelectionMode::Edge => self.edges.clear(),
            SelectionMode::Face => self.faces.clear(),
        }
    }

    pub fn is_empty(&self, mode: SelectionMode) -> bool {
        match mode {
            SelectionMode::Vertex => self.vertices.is_empty(),
            SelectionMode::Edge => self.edges.is_empty(),
            SelectionMode::Face => self.faces.is_empty(),
        }
    }

    /// Apply a click. Additive clicks toggle the target; plain clicks
    /// replace the set for `mode`, and clear it when nothing was hit.
    pub fn apply_pick(&mut self, mode: SelectionMode, target: Option<PickTarget>, additive: bool) {
        if !additive {
            self.clear_mode(mode);
        }
        let Some(target) = target else {
            return;
        };
        fn toggle<T: Ord>(set: &mut BTreeSet<T>, item: T, additive: bool) {
            if additive && set.contains(&item) {
                set.remove(&item);
            } else {
                set.insert(item);
            }
        }
        match target {
            PickTarget::Vertex(v) => toggle(&mut self.vertices, v, additive),
            PickTarget::Edge(e) => toggle(&mut self.edges, e, additive),
            PickTarget::Face(f) => toggle(&mut self.faces, f, additive),
        }
    }

    /// Vertices an operation on the current selection would move.
    pub fn affected_vertices(&self, mode: SelectionMode, mesh: &QMesh) -> BTreeSet<VertexId> {
        match mode {
            SelectionMode::Vertex => self.vertices.clone(),
            SelectionMode::Edge => self
                .edges
                .iter()
                .flat_map(|e| [e.lo().clone(), e.hi().clone()])
                .collect(),
            SelectionMode::Face => self
                .faces
                .iter()
                .filter_map(|f| mesh.face(f).ok())
                .flat_map(|face| face.vertices().iter().cloned())
                .collect(),
        }
    }

    /// Drop elements that no longer exist in `mesh`.
    pub fn prune(&mut self, mesh: &QMesh) {
        let edges = mesh.edges();
        self.vertices.retain(|v| mesh.contains_vertex(v));
        self.edges.retain(|e| edges.contains(e));
        self.faces.retain(|f| mesh.contains_face(f));
    }
}

// ---------------------------------------------------------------------------
// Mode transitions
// ---------------------------------------------------------------------------

/// Enter mesh edit mode on `entity`, building its editable mesh from the
/// rendered one on first entry.
pub fn enter_edit_mode(world: &mut World, entity: Entity) -> Result<ObjectId> {
    let object = world
        .get::<EditableObject>(entity)
        .map(|o| o.id)
        .ok_or_else(|| MeshEditError::InvalidSourceMesh(format!("{entity:?} is not editable")))?;

    if world.get::<EditableMesh>(entity).is_none() {
        let weld = world.resource::<MeshEditSettings>().weld_tolerance;
        let source = world
            .get::<Mesh3d>(entity)
            .and_then(|handle| world.resource::<Assets<Mesh>>().get(&handle.0))
            .ok_or_else(|| MeshEditError::InvalidSourceMesh(format!("{object} has no loaded mesh")))?;
        let mesh = QMesh::from_bevy_mesh(source, weld)?;
        info!(
            "Editing {object}: {} vertices, {} faces",
            mesh.vertex_count(),
            mesh.face_count()
        );
        world.entity_mut(entity).insert(EditableMesh { mesh });
    }

    cancel_pending_edit(world);
    let mut selection = world.resource_mut::<MeshSelection>();
    if selection.object != Some(object) {
        selection.clear();
        selection.object = Some(object);
    }
    let mode = selection.last_mode;
    *world.resource_mut::<EditMode>() = EditMode::Mesh(mode);
    Ok(object)
}

/// Leave edit mode, cancelling any pending edit.
pub fn exit_edit_mode(world: &mut World) {
    cancel_pending_edit(world);
    if let EditMode::Mesh(mode) = *world.resource::<EditMode>() {
        world.resource_mut::<MeshSelection>().last_mode = mode;
    }
    *world.resource_mut::<ActiveTool>() = ActiveTool::Select;
    *world.resource_mut::<EditMode>() = EditMode::Object;
}

/// Drop selected elements that the edited mesh no longer has.
pub fn prune_selection(world: &mut World) {
    let Some(object) = world.get_resource::<MeshSelection>().and_then(|s| s.object) else {
        return;
    };
    let Some(entity) = world.resource::<MeshRegistry>().entity(object) else {
        return;
    };
    let Some(editable) = world.get::<EditableMesh>(entity) else {
        return;
    };
    let mut selection = world.resource::<MeshSelection>().clone();
    selection.prune(&editable.mesh);
    *world.resource_mut::<MeshSelection>() = selection;
}

/// Report a failed edit: log it and, for user-facing failures, raise a
/// notice.
pub(crate) fn report(world: &mut World, context: &str, err: &MeshEditError) {
    err.log(context);
    world.write_message(EditNotice::from_error(context, err));
}

/// Run `edit` on the mesh currently in edit mode.
pub fn edit_active_mesh<T>(world: &mut World, edit: impl FnOnce(&mut QMesh) -> Result<T>) -> Result<T> {
    let object = world
        .resource::<MeshSelection>()
        .object
        .ok_or_else(|| MeshEditError::InvalidSourceMesh("no object in edit mode".into()))?;
    edit_object_mesh(world, object, edit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_registry::MeshRegistryPlugin;
    use crate::qmesh::fixtures::{face_near, unit_cube};
    use quadrille_geometry::EdgeKey;

    #[test]
    fn plain_click_replaces_and_additive_toggles() {
        let mut selection = MeshSelection::default();
        let a = VertexId::from_serial(0);
        let b = VertexId::from_serial(1);

        selection.apply_pick(SelectionMode::Vertex, Some(PickTarget::Vertex(a.clone())), false);
        selection.apply_pick(SelectionMode::Vertex, Some(PickTarget::Vertex(b.clone())), true);
        assert_eq!(selection.vertices.len(), 2);

        selection.apply_pick(SelectionMode::Vertex, Some(PickTarget::Vertex(a.clone())), true);
        assert_eq!(selection.vertices, BTreeSet::from([b.clone()]));

        selection.apply_pick(SelectionMode::Vertex, Some(PickTarget::Vertex(a.clone())), false);
        assert_eq!(selection.vertices, BTreeSet::from([a]));

        selection.apply_pick(SelectionMode::Vertex, None, false);
        assert!(selection.vertices.is_empty());
    }

    #[test]
    fn mode_sets_are_independent() {
        let mesh = unit_cube();
        let mut selection = MeshSelection::default();
        let top = face_near(&mesh, Vec3::new(0.0, 0.5, 0.0));
        selection.apply_pick(SelectionMode::Face, Some(PickTarget::Face(top)), false);
        selection.apply_pick(
            SelectionMode::Edge,
            Some(PickTarget::Edge(EdgeKey::new(VertexId::from_serial(0), VertexId::from_serial(1)))),
            false,
        );
        assert_eq!(selection.faces.len(), 1);
        assert_eq!(selection.edges.len(), 1);
        assert_eq!(selection.affected_vertices(SelectionMode::Face, &mesh).len(), 4);
        assert_eq!(selection.affected_vertices(SelectionMode::Edge, &mesh).len(), 2);
    }

    #[test]
    fn prune_drops_vanished_elements() {
        let mut mesh = unit_cube();
        let mut selection = MeshSelection::default();
        let top = face_near(&mesh, Vec3::new(0.0, 0.5, 0.0));
        let bottom = face_near(&mesh, Vec3::new(0.0, -0.5, 0.0));
        selection.faces.extend([top.clone(), bottom.clone()]);
        selection.vertices.insert(VertexId::from("v99"));

        mesh.remove_face(&top).unwrap();
        selection.prune(&mesh);
        assert_eq!(selection.faces, BTreeSet::from([bottom]));
        assert!(selection.vertices.is_empty());
    }

    fn edit_app() -> (App, Entity) {
        let mut app = App::new();
        app.init_resource::<Assets<Mesh>>()
            .init_resource::<EditMode>()
            .init_resource::<ActiveTool>()
            .init_resource::<MeshSelection>()
            .init_resource::<ActiveEdit>()
            .add_message::<EditNotice>()
            .add_plugins(MeshRegistryPlugin);

        let world = app.world_mut();
        let handle = world
            .resource_mut::<Assets<Mesh>>()
            .add(Mesh::from(Cuboid::default()));
        let id = world.resource_mut::<MeshRegistry>().allocate();
        let entity = world.spawn((EditableObject { id }, Mesh3d(handle))).id();
        (app, entity)
    }

    #[test]
    fn entering_edit_mode_builds_mesh_and_binds_object() {
        let (mut app, entity) = edit_app();
        let world = app.world_mut();
        let object = enter_edit_mode(world, entity).unwrap();

        assert_eq!(*world.resource::<EditMode>(), EditMode::Mesh(SelectionMode::Face));
        assert_eq!(world.resource::<MeshSelection>().object, Some(object));
        let editable = world.get::<EditableMesh>(entity).unwrap();
        assert_eq!(editable.mesh.vertex_count(), 8);
        assert_eq!(editable.mesh.quad_count(), 6);
    }

    #[test]
    fn exiting_remembers_selection_mode_and_keeps_selection() {
        let (mut app, entity) = edit_app();
        let world = app.world_mut();
        enter_edit_mode(world, entity).unwrap();
        *world.resource_mut::<EditMode>() = EditMode::Mesh(SelectionMode::Vertex);
        world
            .resource_mut::<MeshSelection>()
            .vertices
            .insert(VertexId::from_serial(0));
        *world.resource_mut::<ActiveTool>() = ActiveTool::Knife;

        exit_edit_mode(world);
        assert_eq!(*world.resource::<EditMode>(), EditMode::Object);
        assert_eq!(*world.resource::<ActiveTool>(), ActiveTool::Select);

        enter_edit_mode(world, entity).unwrap();
        assert_eq!(*world.resource::<EditMode>(), EditMode::Mesh(SelectionMode::Vertex));
        assert_eq!(world.resource::<MeshSelection>().vertices.len(), 1);
    }

    #[test]
    fn non_editable_entity_is_refused() {
        let (mut app, _) = edit_app();
        let world = app.world_mut();
        let plain = world.spawn(Transform::default()).id();
        assert!(enter_edit_mode(world, plain).is_err());
        assert_eq!(*world.resource::<EditMode>(), EditMode::Object);
    }
}
