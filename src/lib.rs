//! Interactive polygon mesh editing for Bevy: quad-aware editable meshes,
//! a knife tool, vertex dragging and undoable object operations.

pub mod commands;
pub mod edit_mode;
pub mod error;
pub mod gizmos;
pub mod knife;
pub mod mesh_registry;
pub mod object_ops;
pub mod qmesh;
pub mod selection;
pub mod settings;
pub mod transaction;
pub mod vertex_drag;
pub mod viewport_util;

use bevy::prelude::*;

pub use error::{EditNotice, MeshEditError, Result, ValidationFailure};
pub use mesh_registry::{EditableMesh, EditableObject, MeshRegistry, ObjectId};
pub use qmesh::{FaceId, MeshSnapshot, QMesh, VertexId};
pub use settings::{CutMode, MeshEditSettings};

/// Marks the camera used for viewport picking.
#[derive(Component, Default)]
pub struct EditorCamera;

pub struct MeshEditPlugin;

impl Plugin for MeshEditPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<EditNotice>()
            .register_type::<MeshEditSettings>()
            .add_plugins((
                commands::CommandHistoryPlugin,
                mesh_registry::MeshRegistryPlugin,
                selection::SelectionPlugin,
                edit_mode::EditModePlugin,
                object_ops::ObjectOpsPlugin,
                gizmos::EditGizmosPlugin,
            ));
    }
}
