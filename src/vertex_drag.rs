use std::collections::BTreeMap;

use bevy::prelude::*;

use crate::commands::MoveVertices;
use crate::error::{Result, ValidationFailure};
use crate::mesh_registry::ObjectId;
use crate::qmesh::{QMesh, VertexId};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Reflect)]
pub enum DragConstraint {
    #[default]
    Free,
    AxisX,
    AxisY,
    AxisZ,
}

impl DragConstraint {
    /// Pressing the same axis again returns to free movement.
    pub fn toggled(self, axis: DragConstraint) -> Self {
        if self == axis { DragConstraint::Free } else { axis }
    }

    pub fn axis(self) -> Option<Vec3> {
        match self {
            DragConstraint::Free => None,
            DragConstraint::AxisX => Some(Vec3::X),
            DragConstraint::AxisY => Some(Vec3::Y),
            DragConstraint::AxisZ => Some(Vec3::Z),
        }
    }
}

/// A vertex move in progress. Positions are always written as start plus
/// the current offset, so repeated updates never accumulate error.
#[derive(Clone, Debug)]
pub struct VertexDrag {
    start_positions: BTreeMap<VertexId, Vec3>,
    pub constraint: DragConstraint,
    pub start_cursor: Vec2,
}

impl VertexDrag {
    pub fn start(mesh: &QMesh, vertices: impl IntoIterator<Item = VertexId>) -> Result<Self> {
        let start_positions = vertices
            .into_iter()
            .map(|id| {
                let position = mesh.position(&id)?;
                Ok((id, position))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        if start_positions.is_empty() {
            return Err(ValidationFailure::EmptySelection.into());
        }
        Ok(Self {
            start_positions,
            constraint: DragConstraint::Free,
            start_cursor: Vec2::ZERO,
        })
    }

    pub fn with_cursor(mut self, cursor: Vec2) -> Self {
        self.start_cursor = cursor;
        self
    }

    pub fn start_positions(&self) -> &BTreeMap<VertexId, Vec3> {
        &self.start_positions
    }

    /// Move every dragged vertex to its start position plus `offset`
    /// (object space), masked to the active axis.
    pub fn change(&self, mesh: &mut QMesh, offset: Vec3) -> Result<()> {
        let offset = match self.constraint.axis() {
            Some(axis) => axis * offset.dot(axis),
            None => offset,
        };
        for (id, start) in &self.start_positions {
            mesh.set_vertex_position(id, *start + offset)?;
        }
        Ok(())
    }

    /// Put every dragged vertex back where it started.
    pub fn cancel(self, mesh: &mut QMesh) {
        for (id, start) in &self.start_positions {
            if let Err(err) = mesh.set_vertex_position(id, *start) {
                err.log("Cancel vertex drag");
            }
        }
    }

    /// Finish the drag, producing the undo record. `None` if nothing moved.
    pub fn finish(self, mesh: &QMesh, object: ObjectId) -> Option<MoveVertices> {
        let new: BTreeMap<VertexId, Vec3> = self
            .start_positions
            .keys()
            .filter_map(|id| Some((id.clone(), mesh.position(id).ok()?)))
            .collect();
        if new == self.start_positions {
            return None;
        }
        Some(MoveVertices {
            object,
            old: self.start_positions,
            new,
        })
    }
}

/// Object-space offset for a cursor movement of `mouse_delta` pixels.
///
/// Free drags move in the camera's view plane. Axis drags follow the
/// object's local axis as it appears on screen.
pub fn compute_drag_offset(
    constraint: DragConstraint,
    mouse_delta: Vec2,
    cam_tf: &GlobalTransform,
    camera: &Camera,
    object_global: &GlobalTransform,
    sensitivity: f32,
) -> Option<Vec3> {
    let origin = object_global.translation();
    let scale = (cam_tf.translation() - origin).length() * sensitivity;
    let to_local = object_global.affine().inverse();

    match constraint.axis() {
        None => {
            let world_offset = cam_tf.right().as_vec3() * mouse_delta.x * scale
                + cam_tf.up().as_vec3() * (-mouse_delta.y) * scale;
            Some(to_local.transform_vector3(world_offset))
        }
        Some(axis) => {
            let world_axis = object_global.affine().transform_vector3(axis);
            let origin_screen = camera.world_to_viewport(cam_tf, origin).ok()?;
            let axis_screen = camera.world_to_viewport(cam_tf, origin + world_axis).ok()?;
            let screen_axis = (axis_screen - origin_screen).normalize_or_zero();
            Some(axis * mouse_delta.dot(screen_axis) * scale)
        }
    }
}
