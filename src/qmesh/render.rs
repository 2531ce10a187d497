use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::*;
use quadrille_geometry::{FacePlane, UvProjection, compute_face_uvs};

use super::QMesh;

/// Flat-shaded triangle buffers ready for upload. Each face gets its own
/// copies of its corners so normals stay per face.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderBuffer {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub indices: Vec<u32>,
}

impl RenderBuffer {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn to_mesh(&self) -> Mesh {
        let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, default());
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, self.positions.clone());
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, self.normals.clone());
        if let Some(uvs) = &self.uvs {
            mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs.clone());
        }
        mesh.insert_indices(Indices::U32(self.indices.clone()));
        mesh
    }
}

impl QMesh {
    /// Triangulate every face in order and rebuild the triangle index map to
    /// match. Triangle `t` of the result is `indices[3t..3t + 3]`.
    pub fn compile(&mut self, uvs: Option<&UvProjection>) -> RenderBuffer {
        let mut buffer = RenderBuffer {
            uvs: uvs.map(|_| Vec::new()),
            ..default()
        };

        for (id, face) in self.faces() {
            let corners: Vec<Vec3> = face
                .vertices()
                .iter()
                .filter_map(|v| self.vertex(v).map(|v| v.position))
                .collect();
            if corners.len() != face.vertices().len() {
                error!("Face {id} references a missing vertex; skipped in render buffer");
                continue;
            }
            let plane = FacePlane::from_polygon(&corners)
                .unwrap_or_else(|| FacePlane::from_normal_and_point(Vec3::Y, corners[0]));
            let normal = plane.normal;

            let base = buffer.positions.len() as u32;
            buffer.positions.extend(corners.iter().map(|p| p.to_array()));
            buffer
                .normals
                .extend(std::iter::repeat_n(normal.to_array(), corners.len()));
            if let (Some(out), Some(projection)) = (buffer.uvs.as_mut(), uvs) {
                out.extend(compute_face_uvs(&corners, &plane, projection));
            }
            for k in 1..corners.len() as u32 - 1 {
                buffer.indices.extend([base, base + k, base + k + 1]);
            }
        }

        self.rebuild_index_map();
        buffer
    }
}
