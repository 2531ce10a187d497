use std::collections::BTreeMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::{FaceId, QMesh, VertexId};
use crate::error::{MeshEditError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceSnapshot {
    pub id: FaceId,
    pub vertices: Vec<VertexId>,
}

/// Immutable copy of a mesh's vertices and faces, in render order. Equal
/// snapshots describe identical meshes, ids included.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshSnapshot {
    pub vertices: BTreeMap<VertexId, Vec3>,
    pub faces: Vec<FaceSnapshot>,
}

impl MeshSnapshot {
    /// Positions and fan-triangulated indices, one position per vertex.
    pub fn to_flat_buffers(&self) -> (Vec<[f32; 3]>, Vec<u32>) {
        let slots: BTreeMap<&VertexId, u32> = self
            .vertices
            .keys()
            .enumerate()
            .map(|(i, id)| (id, i as u32))
            .collect();
        let positions = self.vertices.values().map(|p| p.to_array()).collect();

        let mut indices = Vec::new();
        for face in &self.faces {
            let Some(corners) = face
                .vertices
                .iter()
                .map(|v| slots.get(v).copied())
                .collect::<Option<Vec<u32>>>()
            else {
                continue;
            };
            for k in 1..corners.len().saturating_sub(1) {
                indices.extend([corners[0], corners[k], corners[k + 1]]);
            }
        }
        (positions, indices)
    }
}

impl QMesh {
    pub fn snapshot(&self) -> MeshSnapshot {
        MeshSnapshot {
            vertices: self
                .vertices
                .iter()
                .map(|(id, v)| (id.clone(), v.position))
                .collect(),
            faces: self
                .faces()
                .map(|(id, face)| FaceSnapshot {
                    id: id.clone(),
                    vertices: face.vertices.clone(),
                })
                .collect(),
        }
    }

    pub fn from_snapshot(snapshot: &MeshSnapshot) -> Result<Self> {
        let mut mesh = QMesh::new();
        mesh.restore(snapshot)?;
        Ok(mesh)
    }

    /// Replace the whole mesh with `snapshot`. Validates first; on error the
    /// mesh is unchanged. Id counters never move backwards.
    pub fn restore(&mut self, snapshot: &MeshSnapshot) -> Result<()> {
        let mut rebuilt = QMesh::new();
        for (id, position) in &snapshot.vertices {
            rebuilt.vertices.insert(
                id.clone(),
                super::QVertex {
                    position: *position,
                    faces: default(),
                },
            );
        }
        for face in &snapshot.faces {
            if rebuilt.faces.contains_key(&face.id) {
                return Err(MeshEditError::InvalidFace(format!("face {} appears twice", face.id)));
            }
            rebuilt.validate_loop(&face.vertices)?;
            for v in &face.vertices {
                if let Some(vertex) = rebuilt.vertices.get_mut(v) {
                    vertex.faces.insert(face.id.clone());
                }
            }
            rebuilt.faces.insert(
                face.id.clone(),
                super::QFace {
                    vertices: face.vertices.clone(),
                },
            );
            rebuilt.face_order.push(face.id.clone());
        }

        let next_vertex = snapshot
            .vertices
            .keys()
            .filter_map(VertexId::serial)
            .max()
            .map_or(0, |s| s + 1);
        let next_face = snapshot
            .faces
            .iter()
            .filter_map(|f| f.id.serial())
            .max()
            .map_or(0, |s| s + 1);

        self.vertices = rebuilt.vertices;
        self.faces = rebuilt.faces;
        self.face_order = rebuilt.face_order;
        self.next_vertex = self.next_vertex.max(next_vertex);
        self.next_face = self.next_face.max(next_face);
        self.topology_revision += 1;
        Ok(())
    }
}
