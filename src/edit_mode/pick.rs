//! Turning a ray hit on a rendered triangle into a vertex, edge or face.

use bevy::prelude::*;
use quadrille_geometry::{find_nearby_edge, find_nearby_vertex};

use super::SelectionMode;
use crate::error::Result;
use crate::qmesh::{FaceId, MeshEdge, QMesh, VertexId};
use crate::settings::MeshEditSettings;

/// A ray hit on an object's rendered mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickHit {
    pub triangle: usize,
    /// World space.
    pub point: Vec3,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PickTarget {
    Vertex(VertexId),
    Edge(MeshEdge),
    Face(FaceId),
}

/// Resolve `hit` to an element for `mode`.
///
/// Vertex mode always yields the hit face's nearest corner. Edge mode yields
/// the nearest boundary edge of the hit face within
/// `edge_pick_threshold`, or nothing. Face mode yields the whole logical
/// face, so either triangle of a quad selects the quad.
pub fn resolve_pick(
    mesh: &QMesh,
    to_world: &GlobalTransform,
    mode: SelectionMode,
    hit: PickHit,
    settings: &MeshEditSettings,
) -> Result<Option<PickTarget>> {
    let face = mesh.face_for_triangle(hit.triangle)?.clone();
    let corners = mesh.face(&face)?.vertices().to_vec();

    Ok(match mode {
        SelectionMode::Face => Some(PickTarget::Face(face)),
        SelectionMode::Vertex => {
            let world: Vec<(VertexId, Vec3)> = corners
                .into_iter()
                .map(|v| Ok((v.clone(), to_world.transform_point(mesh.position(&v)?))))
                .collect::<Result<_>>()?;
            find_nearby_vertex(hit.point, world, f32::INFINITY).map(PickTarget::Vertex)
        }
        SelectionMode::Edge => {
            let edges = mesh
                .face_edges(&face)?
                .into_iter()
                .map(|edge| {
                    let (a, b) = mesh.edge_positions(&edge)?;
                    Ok((edge, to_world.transform_point(a), to_world.transform_point(b)))
                })
                .collect::<Result<Vec<_>>>()?;
            find_nearby_edge(hit.point, edges, settings.edge_pick_threshold)
                .map(|(edge, _)| PickTarget::Edge(edge))
        }
    })
}

/// Snap a knife point (world space) to a corner or edge of `face`.
/// Corners win over edges.
pub fn snap_knife_point(
    mesh: &QMesh,
    face: &FaceId,
    point: Vec3,
    to_world: &GlobalTransform,
    settings: &MeshEditSettings,
) -> Result<Vec3> {
    let world: Vec<Vec3> = mesh
        .face_positions(face)?
        .into_iter()
        .map(|p| to_world.transform_point(p))
        .collect();

    if let Some(corner) = find_nearby_vertex(
        point,
        world.iter().map(|p| (*p, *p)),
        settings.vertex_snap_threshold,
    ) {
        return Ok(corner);
    }
    let n = world.len();
    let edges = (0..n).map(|i| ((), world[i], world[(i + 1) % n]));
    Ok(find_nearby_edge(point, edges, settings.edge_snap_threshold)
        .map_or(point, |(_, closest)| closest))
}
