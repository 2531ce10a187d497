//! Editable polygon mesh: vertices and triangle/quad faces addressed by
//! stable string identifiers, plus the map from render-triangle indices back
//! to the faces that produced them.

mod build;
mod index_map;
mod render;
mod snapshot;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use bevy::prelude::*;
use quadrille_geometry::{EdgeKey, FacePlane};
use serde::{Deserialize, Serialize};

use crate::error::{MeshEditError, Result};

pub use index_map::TriangleFaceMap;
pub use render::RenderBuffer;
pub use snapshot::{FaceSnapshot, MeshSnapshot};

macro_rules! string_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub(crate) fn from_serial(serial: u64) -> Self {
                Self(format!(concat!($prefix, "{}"), serial))
            }

            /// Numeric suffix, if the id was minted by a mesh.
            pub(crate) fn serial(&self) -> Option<u64> {
                self.0.strip_prefix($prefix)?.parse().ok()
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

string_id!(VertexId, "v");
string_id!(FaceId, "f");

/// Undirected edge between two vertices.
pub type MeshEdge = EdgeKey<VertexId>;

#[derive(Clone, Debug, PartialEq)]
pub struct QVertex {
    pub position: Vec3,
    faces: BTreeSet<FaceId>,
}

impl QVertex {
    /// Faces that use this vertex as a corner.
    pub fn faces(&self) -> &BTreeSet<FaceId> {
        &self.faces
    }
}

/// An ordered loop of three or four corners. Winding is consistent across
/// the mesh; a quad renders as the fan `(0, 1, 2), (0, 2, 3)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QFace {
    vertices: Vec<VertexId>,
}

impl QFace {
    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    pub fn is_quad(&self) -> bool {
        self.vertices.len() == 4
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices.len() - 2
    }

    /// Boundary edges in loop order.
    pub fn edges(&self) -> Vec<MeshEdge> {
        let n = self.vertices.len();
        (0..n)
            .map(|i| EdgeKey::new(self.vertices[i].clone(), self.vertices[(i + 1) % n].clone()))
            .collect()
    }

    /// Corner triples in render order.
    pub fn render_triangles(&self) -> Vec<[VertexId; 3]> {
        let v = &self.vertices;
        (1..v.len() - 1)
            .map(|i| [v[0].clone(), v[i].clone(), v[i + 1].clone()])
            .collect()
    }
}

/// The editable mesh.
///
/// Identifiers are never reused: counters only move forward, including
/// across snapshot restores. `topology_revision` changes whenever the face
/// list changes, which invalidates the triangle index map until the next
/// [`QMesh::compile`].
#[derive(Clone, Debug, Default)]
pub struct QMesh {
    vertices: BTreeMap<VertexId, QVertex>,
    faces: HashMap<FaceId, QFace>,
    face_order: Vec<FaceId>,
    next_vertex: u64,
    next_face: u64,
    topology_revision: u64,
    index: TriangleFaceMap,
}

impl QMesh {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.face_order.len()
    }

    /// Render triangles the current faces produce.
    pub fn triangle_count(&self) -> usize {
        self.faces().map(|(_, face)| face.triangle_count()).sum()
    }

    pub fn quad_count(&self) -> usize {
        self.faces().filter(|(_, face)| face.is_quad()).count()
    }

    pub fn topology_revision(&self) -> u64 {
        self.topology_revision
    }

    pub fn vertex(&self, id: &VertexId) -> Option<&QVertex> {
        self.vertices.get(id)
    }

    pub fn position(&self, id: &VertexId) -> Result<Vec3> {
        self.vertices
            .get(id)
            .map(|v| v.position)
            .ok_or_else(|| MeshEditError::UnknownVertex(id.clone()))
    }

    pub fn vertices(&self) -> impl Iterator<Item = (&VertexId, &QVertex)> {
        self.vertices.iter()
    }

    pub fn face(&self, id: &FaceId) -> Result<&QFace> {
        self.faces
            .get(id)
            .ok_or_else(|| MeshEditError::UnknownFace(id.clone()))
    }

    pub fn contains_face(&self, id: &FaceId) -> bool {
        self.faces.contains_key(id)
    }

    pub fn contains_vertex(&self, id: &VertexId) -> bool {
        self.vertices.contains_key(id)
    }

    /// Faces in render order.
    pub fn faces(&self) -> impl Iterator<Item = (&FaceId, &QFace)> {
        self.face_order
            .iter()
            .filter_map(|id| self.faces.get(id).map(|face| (id, face)))
    }

    pub fn face_positions(&self, id: &FaceId) -> Result<Vec<Vec3>> {
        self.face(id)?
            .vertices
            .iter()
            .map(|v| self.position(v))
            .collect()
    }

    pub fn face_plane(&self, id: &FaceId) -> Result<FacePlane> {
        let positions = self.face_positions(id)?;
        FacePlane::from_polygon(&positions)
            .ok_or_else(|| MeshEditError::InvariantViolation(format!("face {id} has zero area")))
    }

    pub fn face_centroid(&self, id: &FaceId) -> Result<Vec3> {
        let positions = self.face_positions(id)?;
        Ok(positions.iter().sum::<Vec3>() / positions.len() as f32)
    }

    pub fn face_edges(&self, id: &FaceId) -> Result<Vec<MeshEdge>> {
        Ok(self.face(id)?.edges())
    }

    /// Every boundary edge of every face. Quad diagonals are not edges.
    pub fn edges(&self) -> BTreeSet<MeshEdge> {
        self.faces().flat_map(|(_, face)| face.edges()).collect()
    }

    pub fn edge_positions(&self, edge: &MeshEdge) -> Result<(Vec3, Vec3)> {
        Ok((self.position(edge.lo())?, self.position(edge.hi())?))
    }

    /// The four exterior edges of a quad face, derived from its two render
    /// triangles. `None` for triangles.
    pub fn quad_exterior_edges(&self, id: &FaceId) -> Result<Option<[MeshEdge; 4]>> {
        let face = self.face(id)?;
        if !face.is_quad() {
            return Ok(None);
        }
        let triangles = face.render_triangles();
        match quadrille_geometry::quad_exterior_edges(&triangles[0], &triangles[1]) {
            Some(edges) => Ok(Some(edges)),
            None => Err(MeshEditError::InvariantViolation(format!(
                "quad {id} render triangles do not share a diagonal"
            ))),
        }
    }

    /// Closest vertex to `point` (object space) within `threshold`.
    pub fn find_nearby_vertex(&self, point: Vec3, threshold: f32) -> Option<VertexId> {
        quadrille_geometry::find_nearby_vertex(
            point,
            self.vertices.iter().map(|(id, v)| (id.clone(), v.position)),
            threshold,
        )
    }

    /// Closest edge to `point` (object space) within `threshold`, together
    /// with the nearest point on it.
    pub fn find_nearby_edge(&self, point: Vec3, threshold: f32) -> Option<(MeshEdge, Vec3)> {
        let edges: Vec<(MeshEdge, Vec3, Vec3)> = self
            .edges()
            .into_iter()
            .filter_map(|edge| {
                let (a, b) = self.edge_positions(&edge).ok()?;
                Some((edge, a, b))
            })
            .collect();
        quadrille_geometry::find_nearby_edge(point, edges, threshold)
    }

    // -----------------------------------------------------------------------
    // Triangle index map
    // -----------------------------------------------------------------------

    pub fn index_map(&self) -> &TriangleFaceMap {
        &self.index
    }

    /// Rebuild the triangle index map for the current faces. [`compile`]
    /// does this as part of producing a render buffer.
    ///
    /// [`compile`]: QMesh::compile
    pub fn rebuild_index_map(&mut self) {
        let faces: Vec<(FaceId, usize)> = self
            .faces()
            .map(|(id, face)| (id.clone(), face.triangle_count()))
            .collect();
        self.index.rebuild(faces, self.topology_revision);
    }

    fn current_index(&self) -> Result<&TriangleFaceMap> {
        if self.index.revision() != Some(self.topology_revision) {
            return Err(MeshEditError::StaleIndexMap {
                built: self.index.revision(),
                current: self.topology_revision,
            });
        }
        Ok(&self.index)
    }

    /// Face that produced render triangle `triangle`.
    pub fn face_for_triangle(&self, triangle: usize) -> Result<&FaceId> {
        let index = self.current_index()?;
        index
            .face_for_triangle(triangle)
            .ok_or(MeshEditError::TriangleOutOfRange {
                triangle,
                count: index.triangle_count(),
            })
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    pub fn add_vertex(&mut self, position: Vec3) -> VertexId {
        let id = VertexId::from_serial(self.next_vertex);
        self.next_vertex += 1;
        self.vertices.insert(
            id.clone(),
            QVertex {
                position,
                faces: BTreeSet::new(),
            },
        );
        id
    }

    pub fn set_vertex_position(&mut self, id: &VertexId, position: Vec3) -> Result<()> {
        let vertex = self
            .vertices
            .get_mut(id)
            .ok_or_else(|| MeshEditError::UnknownVertex(id.clone()))?;
        vertex.position = position;
        Ok(())
    }

    /// Remove a vertex that no face references.
    pub fn remove_orphan_vertex(&mut self, id: &VertexId) -> Result<()> {
        let vertex = self
            .vertices
            .get(id)
            .ok_or_else(|| MeshEditError::UnknownVertex(id.clone()))?;
        if !vertex.faces.is_empty() {
            return Err(MeshEditError::InvalidFace(format!(
                "vertex {id} is still used by {} faces",
                vertex.faces.len()
            )));
        }
        self.vertices.remove(id);
        Ok(())
    }

    pub fn add_face(&mut self, vertices: Vec<VertexId>) -> Result<FaceId> {
        self.validate_loop(&vertices)?;
        let slot = self.face_order.len();
        Ok(self.insert_face(slot, vertices))
    }

    pub fn remove_face(&mut self, id: &FaceId) -> Result<QFace> {
        let face = self
            .faces
            .remove(id)
            .ok_or_else(|| MeshEditError::UnknownFace(id.clone()))?;
        self.face_order.retain(|f| f != id);
        self.detach(id, &face);
        self.topology_revision += 1;
        Ok(face)
    }

    /// Swap `id` for one face per loop, keeping the replacements at the
    /// removed face's position in render order. All loops are validated
    /// before anything changes.
    pub fn replace_face(&mut self, id: &FaceId, loops: Vec<Vec<VertexId>>) -> Result<Vec<FaceId>> {
        let slot = self
            .face_order
            .iter()
            .position(|f| f == id)
            .ok_or_else(|| MeshEditError::UnknownFace(id.clone()))?;
        for vertices in &loops {
            self.validate_loop(vertices)?;
        }

        self.remove_face(id)?;
        Ok(loops
            .into_iter()
            .enumerate()
            .map(|(offset, vertices)| self.insert_face(slot + offset, vertices))
            .collect())
    }

    fn validate_loop(&self, vertices: &[VertexId]) -> Result<()> {
        if !(3..=4).contains(&vertices.len()) {
            return Err(MeshEditError::InvalidFace(format!(
                "a face needs 3 or 4 corners, got {}",
                vertices.len()
            )));
        }
        for (i, v) in vertices.iter().enumerate() {
            if !self.vertices.contains_key(v) {
                return Err(MeshEditError::UnknownVertex(v.clone()));
            }
            if vertices[..i].contains(v) {
                return Err(MeshEditError::InvalidFace(format!("corner {v} repeats")));
            }
        }
        Ok(())
    }

    fn insert_face(&mut self, slot: usize, vertices: Vec<VertexId>) -> FaceId {
        let id = FaceId::from_serial(self.next_face);
        self.next_face += 1;
        for v in &vertices {
            if let Some(vertex) = self.vertices.get_mut(v) {
                vertex.faces.insert(id.clone());
            }
        }
        self.faces.insert(id.clone(), QFace { vertices });
        self.face_order.insert(slot.min(self.face_order.len()), id.clone());
        self.topology_revision += 1;
        id
    }

    fn detach(&mut self, id: &FaceId, face: &QFace) {
        for v in &face.vertices {
            if let Some(vertex) = self.vertices.get_mut(v) {
                vertex.faces.remove(id);
            }
        }
    }

    /// Check the vertex/face back-references agree. Used by tests and by
    /// snapshot restore.
    pub fn validate(&self) -> Result<()> {
        for (id, face) in &self.faces {
            for v in &face.vertices {
                let vertex = self.vertex(v).ok_or_else(|| MeshEditError::UnknownVertex(v.clone()))?;
                if !vertex.faces.contains(id) {
                    return Err(MeshEditError::InvariantViolation(format!(
                        "vertex {v} does not list face {id}"
                    )));
                }
            }
        }
        for (id, vertex) in &self.vertices {
            for f in &vertex.faces {
                let face = self.face(f)?;
                if !face.vertices.contains(id) {
                    return Err(MeshEditError::InvariantViolation(format!(
                        "vertex {id} lists face {f} which does not use it"
                    )));
                }
            }
        }
        if self.face_order.len() != self.faces.len() {
            return Err(MeshEditError::InvariantViolation(
                "face order and face table disagree".into(),
            ));
        }
        Ok(())
    }
}
