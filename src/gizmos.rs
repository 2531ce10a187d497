//! Edit-mode overlays drawn with gizmos: the wireframe of the edited mesh,
//! highlighted selection, the knife line and drag constraints.

use bevy::prelude::*;

use crate::edit_mode::{EditMode, MeshSelection, SelectionMode};
use crate::mesh_registry::{EditableMesh, MeshRegistry};
use crate::qmesh::{MeshEdge, QMesh};
use crate::transaction::ActiveEdit;
use crate::vertex_drag::DragConstraint;

const EDGE_COLOR: Color = Color::srgba(1.0, 0.8, 0.0, 1.0);
const VERTEX_COLOR: Color = Color::srgba(1.0, 1.0, 1.0, 1.0);
const SELECTED_COLOR: Color = Color::srgba(0.0, 1.0, 0.5, 1.0);
const NORMAL_COLOR: Color = Color::srgb(0.0, 1.0, 1.0);
const KNIFE_COLOR: Color = Color::srgb(1.0, 0.3, 0.9);
const CROSSING_COLOR: Color = Color::srgb(1.0, 1.0, 0.2);

pub struct EditGizmosPlugin;

impl Plugin for EditGizmosPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PostUpdate, draw_edit_gizmos.after(bevy::transform::TransformSystems::Propagate));
    }
}

/// Every edge of `mesh` with whether it is highlighted. An edge is
/// highlighted when selected directly or when it bounds a selected face.
pub fn edge_overlay(mesh: &QMesh, selection: &MeshSelection, mode: SelectionMode) -> Vec<(MeshEdge, bool)> {
    let face_edges: Vec<MeshEdge> = match mode {
        SelectionMode::Face => selection
            .faces
            .iter()
            .filter_map(|face| mesh.face_edges(face).ok())
            .flatten()
            .collect(),
        _ => Vec::new(),
    };
    mesh.edges()
        .into_iter()
        .map(|edge| {
            let selected = match mode {
                SelectionMode::Edge => selection.edges.contains(&edge),
                SelectionMode::Vertex => selection.vertices.contains(edge.lo()) && selection.vertices.contains(edge.hi()),
                SelectionMode::Face => face_edges.contains(&edge),
            };
            (edge, selected)
        })
        .collect()
}

fn draw_edit_gizmos(
    edit_mode: Res<EditMode>,
    selection: Res<MeshSelection>,
    active: Res<ActiveEdit>,
    registry: Res<MeshRegistry>,
    objects: Query<(&EditableMesh, &GlobalTransform)>,
    mut gizmos: Gizmos,
) {
    let EditMode::Mesh(mode) = *edit_mode else {
        return;
    };
    let Some(entity) = selection.object.and_then(|id| registry.entity(id)) else {
        return;
    };
    let Ok((editable, global)) = objects.get(entity) else {
        return;
    };
    let mesh = &editable.mesh;

    for (edge, selected) in edge_overlay(mesh, &selection, mode) {
        let Ok((a, b)) = mesh.edge_positions(&edge) else {
            continue;
        };
        let color = if selected { SELECTED_COLOR } else { EDGE_COLOR };
        gizmos.line(global.transform_point(a), global.transform_point(b), color);
    }

    match mode {
        SelectionMode::Vertex => {
            for (id, vertex) in mesh.vertices() {
                let color = if selection.vertices.contains(id) {
                    SELECTED_COLOR
                } else {
                    VERTEX_COLOR
                };
                gizmos.sphere(Isometry3d::from_translation(global.transform_point(vertex.position)), 0.03, color);
            }
        }
        SelectionMode::Face => {
            let (_, rotation, _) = global.to_scale_rotation_translation();
            for face in &selection.faces {
                let (Ok(centroid), Ok(plane)) = (mesh.face_centroid(face), mesh.face_plane(face)) else {
                    continue;
                };
                let start = global.transform_point(centroid);
                gizmos.arrow(start, start + rotation * plane.normal * 0.3, NORMAL_COLOR);
            }
        }
        SelectionMode::Edge => {}
    }

    if let Some(knife) = active.knife() {
        let points: Vec<Vec3> = knife.points().iter().map(|p| global.transform_point(*p)).collect();
        for point in &points {
            gizmos.sphere(Isometry3d::from_translation(*point), 0.025, KNIFE_COLOR);
        }
        if let [a, b] = points[..] {
            gizmos.line(a, b, KNIFE_COLOR);
        }
        if let Some(plan) = knife.plan() {
            for crossing in plan.crossings {
                gizmos.sphere(Isometry3d::from_translation(global.transform_point(crossing)), 0.04, CROSSING_COLOR);
            }
        }
    }

    if let Some(drag) = active.drag()
        && let Some(axis) = drag.constraint.axis()
    {
        let color = match drag.constraint {
            DragConstraint::AxisX => Color::srgb(1.0, 0.2, 0.2),
            DragConstraint::AxisY => Color::srgb(0.2, 1.0, 0.2),
            _ => Color::srgb(0.2, 0.4, 1.0),
        };
        let (_, rotation, _) = global.to_scale_rotation_translation();
        let world_axis = rotation * axis;
        let center = global.translation();
        gizmos.line(center - world_axis * 50.0, center + world_axis * 50.0, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qmesh::fixtures::{face_near, unit_cube};

    #[test]
    fn selected_face_highlights_its_boundary() {
        let mesh = unit_cube();
        let face = face_near(&mesh, Vec3::new(0.0, 0.5, 0.0));
        let mut selection = MeshSelection::default();
        selection.faces.insert(face);

        let overlay = edge_overlay(&mesh, &selection, SelectionMode::Face);
        assert_eq!(overlay.len(), 12);
        assert_eq!(overlay.iter().filter(|(_, selected)| *selected).count(), 4);
    }

    #[test]
    fn vertex_mode_highlights_edges_between_selected_vertices() {
        let mesh = unit_cube();
        let edge = mesh.edges().into_iter().next().unwrap();
        let mut selection = MeshSelection::default();
        selection.vertices.insert(edge.lo().clone());
        selection.vertices.insert(edge.hi().clone());

        let highlighted: Vec<_> = edge_overlay(&mesh, &selection, SelectionMode::Vertex)
            .into_iter()
            .filter(|(_, selected)| *selected)
            .map(|(edge, _)| edge)
            .collect();
        assert_eq!(highlighted, vec![edge.clone()]);
    }

    #[test]
    fn selections_of_other_modes_do_not_highlight() {
        let mesh = unit_cube();
        let mut selection = MeshSelection::default();
        selection.faces.insert(face_near(&mesh, Vec3::new(0.0, 0.5, 0.0)));

        assert!(edge_overlay(&mesh, &selection, SelectionMode::Edge).iter().all(|(_, s)| !s));
    }
}
