//! Construction from triangle soup: weld coincident positions, then merge
//! qualifying coplanar triangle pairs into quads.

use std::collections::HashMap;

use bevy::mesh::{Indices, PrimitiveTopology, VertexAttributeValues};
use bevy::prelude::*;
use quadrille_geometry::pair_quads;

use super::{QMesh, VertexId};
use crate::error::{MeshEditError, Result};

impl QMesh {
    /// Build from indexed triangles. Positions closer than `weld_tolerance`
    /// become one vertex; triangles that collapse after welding are dropped.
    pub fn from_triangles(positions: &[Vec3], triangles: &[[u32; 3]], weld_tolerance: f32) -> Result<Self> {
        for tri in triangles {
            if let Some(bad) = tri.iter().find(|i| **i as usize >= positions.len()) {
                return Err(MeshEditError::InvalidSourceMesh(format!(
                    "index {bad} out of range for {} positions",
                    positions.len()
                )));
            }
        }

        let (welded, remap) = weld_positions(positions, weld_tolerance);
        let mut dropped = 0;
        let triangles: Vec<[u32; 3]> = triangles
            .iter()
            .map(|tri| tri.map(|i| remap[i as usize]))
            .filter(|[a, b, c]| {
                let keep = a != b && b != c && c != a;
                dropped += usize::from(!keep);
                keep
            })
            .collect();
        if dropped > 0 {
            warn!("Dropped {dropped} degenerate triangles while welding");
        }

        let pairs = pair_quads(&triangles, &welded);

        let mut mesh = QMesh::new();
        let mut ids: HashMap<u32, VertexId> = HashMap::new();
        let mut used: Vec<u32> = triangles.iter().flatten().copied().collect();
        used.sort_unstable();
        used.dedup();
        for index in used {
            ids.insert(index, mesh.add_vertex(welded[index as usize]));
        }
        let id = |i: u32| ids[&i].clone();

        for (i, tri) in triangles.iter().enumerate() {
            let corners = match pairs[i] {
                Some(j) if j < i => continue,
                Some(j) => quad_corners(*tri, triangles[j]),
                None => tri.to_vec(),
            };
            mesh.add_face(corners.into_iter().map(id).collect())?;
        }

        debug!(
            "Built mesh: {} vertices, {} faces ({} quads)",
            mesh.vertex_count(),
            mesh.face_count(),
            mesh.quad_count()
        );
        Ok(mesh)
    }

    /// Build from a bevy triangle-list mesh. Non-indexed meshes are read as
    /// consecutive position triples.
    pub fn from_bevy_mesh(mesh: &Mesh, weld_tolerance: f32) -> Result<Self> {
        if mesh.primitive_topology() != PrimitiveTopology::TriangleList {
            return Err(MeshEditError::InvalidSourceMesh(format!(
                "expected a triangle list, got {:?}",
                mesh.primitive_topology()
            )));
        }
        let Some(VertexAttributeValues::Float32x3(raw)) = mesh.attribute(Mesh::ATTRIBUTE_POSITION) else {
            return Err(MeshEditError::InvalidSourceMesh(
                "missing Float32x3 position attribute".into(),
            ));
        };
        let positions: Vec<Vec3> = raw.iter().map(|p| Vec3::from_array(*p)).collect();

        let flat: Vec<u32> = match mesh.indices() {
            Some(Indices::U16(indices)) => indices.iter().map(|i| u32::from(*i)).collect(),
            Some(Indices::U32(indices)) => indices.clone(),
            None => (0..positions.len() as u32).collect(),
        };
        if flat.len() % 3 != 0 {
            return Err(MeshEditError::InvalidSourceMesh(format!(
                "{} indices do not form whole triangles",
                flat.len()
            )));
        }
        let triangles: Vec<[u32; 3]> = flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
        Self::from_triangles(&positions, &triangles, weld_tolerance)
    }
}

/// Collapse positions within `tolerance` of each other. Returns the unique
/// positions and, for each input position, its index among them.
fn weld_positions(positions: &[Vec3], tolerance: f32) -> (Vec<Vec3>, Vec<u32>) {
    let cell_size = tolerance.max(f32::EPSILON);
    let cell_of = |p: Vec3| (p / cell_size).floor().as_ivec3();

    let mut cells: HashMap<IVec3, Vec<u32>> = HashMap::new();
    let mut welded: Vec<Vec3> = Vec::new();
    let mut remap = Vec::with_capacity(positions.len());

    for &position in positions {
        let cell = cell_of(position);
        let mut found = None;
        'search: for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = cells.get(&(cell + IVec3::new(dx, dy, dz))) else {
                        continue;
                    };
                    if let Some(&hit) = candidates
                        .iter()
                        .find(|&&c| welded[c as usize].distance(position) <= tolerance)
                    {
                        found = Some(hit);
                        break 'search;
                    }
                }
            }
        }

        let index = found.unwrap_or_else(|| {
            let index = welded.len() as u32;
            welded.push(position);
            cells.entry(cell).or_default().push(index);
            index
        });
        remap.push(index);
    }

    (welded, remap)
}

/// Corner loop for the quad formed by `a` and its partner `b`, arranged so
/// that the render fan `(0, 1, 2), (0, 2, 3)` reproduces the original
/// diagonal and winding.
fn quad_corners(a: [u32; 3], b: [u32; 3]) -> Vec<u32> {
    let apex_a = (0..3).find(|&k| !b.contains(&a[k])).unwrap_or(0);
    let p = a[(apex_a + 1) % 3];
    let q = a[(apex_a + 2) % 3];
    let apex_b = b.into_iter().find(|v| !a.contains(v)).unwrap_or(b[0]);
    vec![p, apex_b, q, a[apex_a]]
}

#[cfg(test)]
mod tests {
    use bevy::asset::RenderAssetUsages;

    use super::super::fixtures::*;
    use super::*;

    #[test]
    fn cube_builds_as_six_quads() {
        let mesh = unit_cube();
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.face_count(), 6);
        assert_eq!(mesh.quad_count(), 6);
        assert_eq!(mesh.triangle_count(), 12);
        mesh.validate().unwrap();
    }

    #[test]
    fn quad_corners_reproduce_source_triangles() {
        let a = [0, 1, 2];
        let b = [0, 2, 3];
        let quad = quad_corners(a, b);
        let fan = [[quad[0], quad[1], quad[2]], [quad[0], quad[2], quad[3]]];
        let rotate = |t: [u32; 3]| {
            let m = (0..3).min_by_key(|&k| t[k]).unwrap();
            [t[m], t[(m + 1) % 3], t[(m + 2) % 3]]
        };
        let mut got: Vec<[u32; 3]> = fan.into_iter().map(rotate).collect();
        got.sort();
        assert_eq!(got, vec![rotate(a), rotate(b)]);
    }

    #[test]
    fn split_vertices_are_welded() {
        // Every triangle carries its own three positions, as flat-shaded
        // exports do.
        let triangles = cube_triangles();
        let mut positions = Vec::new();
        let mut soup = Vec::new();
        for tri in &triangles {
            let base = positions.len() as u32;
            positions.extend(tri.iter().map(|&i| CUBE_POSITIONS[i as usize] + Vec3::splat(1e-6)));
            soup.push([base, base + 1, base + 2]);
        }
        let mesh = QMesh::from_triangles(&positions, &soup, 1e-4).unwrap();
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.quad_count(), 6);
    }

    #[test]
    fn collapsed_triangles_are_dropped() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(1e-6, 0.0, 0.0)];
        let mesh = QMesh::from_triangles(&positions, &[[0, 1, 2], [0, 3, 2]], 1e-4).unwrap();
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.vertex_count(), 3);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let result = QMesh::from_triangles(&[Vec3::ZERO], &[[0, 1, 2]], 1e-4);
        assert!(matches!(result, Err(MeshEditError::InvalidSourceMesh(_))));
    }

    #[test]
    fn non_coplanar_pairs_stay_triangles() {
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.5),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let mesh = QMesh::from_triangles(&positions, &[[0, 1, 2], [0, 2, 3]], 1e-4).unwrap();
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.quad_count(), 0);
    }

    #[test]
    fn trapezoid_imports_as_one_quad() {
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(3.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ];
        let mesh = QMesh::from_triangles(&positions, &[[0, 1, 2], [0, 2, 3]], 1e-4).unwrap();
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.quad_count(), 1);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn imports_bevy_cuboid() {
        let source: Mesh = Cuboid::new(1.0, 1.0, 1.0).into();
        let mesh = QMesh::from_bevy_mesh(&source, 1e-4).unwrap();
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.quad_count(), 6);
    }

    #[test]
    fn rejects_non_triangle_topology() {
        let source = Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::default());
        assert!(matches!(
            QMesh::from_bevy_mesh(&source, 1e-4),
            Err(MeshEditError::InvalidSourceMesh(_))
        ));
    }
}
