//! Planning and applying a single knife cut on one face.
//!
//! A cut is planned against an immutable mesh and applied in one step, so a
//! rejected cut never leaves partial topology behind.

use bevy::prelude::*;
use quadrille_geometry::{
    AREA_EPSILON, EPSILON, EdgeKey, parameter_of_point_on_segment, point_in_triangle,
    point_to_segment_distance, segment_segment_intersection,
};

use crate::error::{MeshEditError, Result, ValidationFailure};
use crate::qmesh::{FaceId, MeshEdge, QMesh, VertexId};
use crate::settings::{CutMode, MeshEditSettings};

/// A corner of a face produced by a cut.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CutCorner {
    Existing(VertexId),
    /// Index into [`CutPlan::new_vertices`].
    New(usize),
}

/// The replacement topology for one face, computed but not yet applied.
#[derive(Clone, Debug, PartialEq)]
pub struct CutPlan {
    pub face: FaceId,
    /// Corners of `face` when the plan was made; applying a plan against a
    /// face that has since changed is refused.
    pub source: Vec<VertexId>,
    /// Where the cut line meets the face boundary, object space.
    pub crossings: [Vec3; 2],
    pub new_vertices: Vec<Vec3>,
    pub faces: Vec<Vec<CutCorner>>,
}

/// What an applied cut changed.
#[derive(Clone, Debug, PartialEq)]
pub struct CutOutcome {
    pub removed: FaceId,
    pub added_faces: Vec<FaceId>,
    pub added_vertices: Vec<VertexId>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Site {
    /// Through corner `k` of the working loop.
    Corner(usize),
    /// Through the interior of loop edge `e` (from corner `e` to `e + 1`).
    Edge(usize, Vec3),
}

impl Site {
    fn point(&self, positions: &[Vec3]) -> Vec3 {
        match *self {
            Site::Corner(k) => positions[k],
            Site::Edge(_, p) => p,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Node {
    Corner(usize),
    Crossing(usize),
}

/// Plan a cut through `face` along the stroke from `start` to `end` (object
/// space). Both points are projected onto the face plane and only the edges
/// the stroke itself crosses are cut, unless
/// [`MeshEditSettings::extend_cut_line`] stretches it across the face.
pub fn plan_cut(
    mesh: &QMesh,
    face: &FaceId,
    start: Vec3,
    end: Vec3,
    mode: CutMode,
    settings: &MeshEditSettings,
) -> Result<CutPlan> {
    let source = mesh.face(face)?.vertices().to_vec();
    if !(3..=4).contains(&source.len()) {
        return Err(ValidationFailure::UnsupportedFace {
            face: face.clone(),
            corners: source.len(),
        }
        .into());
    }

    let plane = mesh.face_plane(face)?;
    let extent = loop_extent(&mesh.face_positions(face)?);
    let a = plane.project_point(start);
    let b = plane.project_point(end);
    if a.distance(b) <= EPSILON * extent {
        return Err(ValidationFailure::CoincidentPoints.into());
    }

    let (work, leftover) = working_loop(mesh, face, &source, (a + b) * 0.5, mode)?;
    let positions: Vec<Vec3> = work.iter().map(|v| mesh.position(v)).collect::<Result<_>>()?;
    let n = work.len();
    let loop_edge = |e: usize| EdgeKey::new(work[e].clone(), work[(e + 1) % n].clone());

    let hugs_edge = |e: usize, point: Vec3| {
        point_to_segment_distance(point, positions[e], positions[(e + 1) % n]) <= settings.weld_tolerance
    };
    if let Some(e) = (0..n).find(|&e| hugs_edge(e, a) && hugs_edge(e, b)) {
        return Err(ValidationFailure::SameEdge { edge: loop_edge(e) }.into());
    }

    let sites = find_crossings(&positions, a, b, settings);
    let [first, second] = match sites[..] {
        [] => return Err(ValidationFailure::NoEdgeIntersection { face: face.clone() }.into()),
        [_] => return Err(ValidationFailure::SingleEdgeIntersection { face: face.clone() }.into()),
        [s, t] => [s, t],
        _ => {
            return Err(ValidationFailure::AmbiguousCut {
                face: face.clone(),
                count: sites.len(),
            }
            .into());
        }
    };

    match (first, second) {
        (Site::Corner(i), Site::Corner(j)) => {
            let gap = i.abs_diff(j);
            if gap == 1 || gap == n - 1 || (n == 4 && i.min(j) == 0 && i.max(j) == 2) {
                let edge = EdgeKey::new(work[i].clone(), work[j].clone());
                return Err(ValidationFailure::AlongExistingEdge { edge }.into());
            }
        }
        (Site::Corner(k), Site::Edge(e, _)) | (Site::Edge(e, _), Site::Corner(k)) => {
            if k == e || k == (e + 1) % n {
                return Err(ValidationFailure::SameEdge { edge: loop_edge(e) }.into());
            }
        }
        (Site::Edge(e, _), Site::Edge(f, _)) => {
            if e == f {
                return Err(ValidationFailure::SameEdge { edge: loop_edge(e) }.into());
            }
        }
    }

    let mut new_vertices = Vec::new();
    let mut corner_for = |site: &Site| -> CutCorner {
        match *site {
            Site::Corner(k) => CutCorner::Existing(work[k].clone()),
            Site::Edge(_, point) => match mesh.find_nearby_vertex(point, settings.weld_tolerance) {
                Some(existing) => CutCorner::Existing(existing),
                None => {
                    new_vertices.push(point);
                    CutCorner::New(new_vertices.len() - 1)
                }
            },
        }
    };
    let crossing_corners = [corner_for(&first), corner_for(&second)];

    let node_corner = |node: &Node| match *node {
        Node::Corner(k) => CutCorner::Existing(work[k].clone()),
        Node::Crossing(s) => crossing_corners[s].clone(),
    };
    let node_position = |node: &Node| match *node {
        Node::Corner(k) => positions[k],
        Node::Crossing(s) => [first, second][s].point(&positions),
    };

    let loops = match (n, first, second) {
        (3, Site::Edge(e, _), Site::Edge(f, _)) => split_triangle_across_edges(e, f),
        _ => split_loop(n, [first, second]),
    };

    for nodes in &loops {
        let points: Vec<Vec3> = nodes.iter().map(node_position).collect();
        if fan_is_degenerate(&points, extent) {
            return Err(ValidationFailure::DegenerateTriangulation { face: face.clone() }.into());
        }
    }

    let mut faces: Vec<Vec<CutCorner>> = loops
        .iter()
        .map(|nodes| nodes.iter().map(node_corner).collect())
        .collect();
    if let Some(rest) = leftover {
        faces.push(rest.into_iter().map(CutCorner::Existing).collect());
    }

    Ok(CutPlan {
        face: face.clone(),
        source,
        crossings: [first.point(&positions), second.point(&positions)],
        new_vertices,
        faces,
    })
}

/// Apply a plan produced by [`plan_cut`] against the same mesh state.
pub fn apply_cut(mesh: &mut QMesh, plan: &CutPlan) -> Result<CutOutcome> {
    if mesh.face(&plan.face)?.vertices() != plan.source.as_slice() {
        return Err(MeshEditError::InvariantViolation(format!(
            "cut plan for face {} is out of date",
            plan.face
        )));
    }
    for corner in plan.faces.iter().flatten() {
        match corner {
            CutCorner::Existing(id) if !mesh.contains_vertex(id) => {
                return Err(MeshEditError::UnknownVertex(id.clone()));
            }
            CutCorner::New(i) if *i >= plan.new_vertices.len() => {
                return Err(MeshEditError::InvariantViolation(format!(
                    "cut plan refers to new vertex {i} of {}",
                    plan.new_vertices.len()
                )));
            }
            _ => {}
        }
    }

    let added_vertices: Vec<VertexId> = plan.new_vertices.iter().map(|p| mesh.add_vertex(*p)).collect();
    let loops = plan
        .faces
        .iter()
        .map(|corners| {
            corners
                .iter()
                .map(|corner| match corner {
                    CutCorner::Existing(id) => id.clone(),
                    CutCorner::New(i) => added_vertices[*i].clone(),
                })
                .collect()
        })
        .collect();

    match mesh.replace_face(&plan.face, loops) {
        Ok(added_faces) => Ok(CutOutcome {
            removed: plan.face.clone(),
            added_faces,
            added_vertices,
        }),
        Err(err) => {
            for id in &added_vertices {
                if let Err(rollback) = mesh.remove_orphan_vertex(id) {
                    error!("Failed to roll back cut vertex {id} on face {}: {rollback}", plan.face);
                }
            }
            Err(err)
        }
    }
}

/// Plan and apply in one step.
pub fn knife_cut(
    mesh: &mut QMesh,
    face: &FaceId,
    start: Vec3,
    end: Vec3,
    mode: CutMode,
    settings: &MeshEditSettings,
) -> Result<CutOutcome> {
    let plan = plan_cut(mesh, face, start, end, mode, settings)?;
    apply_cut(mesh, &plan)
}

/// The corner loop the cut operates on, plus any part of the face left
/// untouched. Quad mode keeps the whole quad; triangle mode on a quad works
/// on the render half containing `midpoint`.
fn working_loop(
    mesh: &QMesh,
    face: &FaceId,
    corners: &[VertexId],
    midpoint: Vec3,
    mode: CutMode,
) -> Result<(Vec<VertexId>, Option<Vec<VertexId>>)> {
    if corners.len() == 3 {
        return Ok((corners.to_vec(), None));
    }

    if mode == CutMode::Quad {
        match mesh.quad_exterior_edges(face) {
            Ok(Some(exterior)) if exterior_matches_loop(&exterior, corners) => {
                return Ok((corners.to_vec(), None));
            }
            Ok(_) => error!("Quad {face} exterior edges disagree with its corners; cutting one triangle"),
            Err(err) => err.log("Quad cut"),
        }
    }

    let halves = [
        vec![corners[0].clone(), corners[1].clone(), corners[2].clone()],
        vec![corners[0].clone(), corners[2].clone(), corners[3].clone()],
    ];
    let mut triangles = [[Vec3::ZERO; 3]; 2];
    for (half, tri) in halves.iter().zip(triangles.iter_mut()) {
        for (slot, v) in tri.iter_mut().zip(half) {
            *slot = mesh.position(v)?;
        }
    }
    let pick = if point_in_triangle(midpoint, triangles[0]) {
        0
    } else if point_in_triangle(midpoint, triangles[1]) {
        1
    } else {
        let centroid = |t: &[Vec3; 3]| (t[0] + t[1] + t[2]) / 3.0;
        usize::from(centroid(&triangles[1]).distance(midpoint) < centroid(&triangles[0]).distance(midpoint))
    };
    let [first, second] = halves;
    Ok(if pick == 0 {
        (first, Some(second))
    } else {
        (second, Some(first))
    })
}

fn exterior_matches_loop(exterior: &[MeshEdge; 4], corners: &[VertexId]) -> bool {
    let n = corners.len();
    (0..n).all(|i| exterior.contains(&EdgeKey::new(corners[i].clone(), corners[(i + 1) % n].clone())))
}

/// Intersect the stroke from `a` to `b` with every loop edge and collapse
/// hits that land on the same corner or point.
fn find_crossings(positions: &[Vec3], a: Vec3, b: Vec3, settings: &MeshEditSettings) -> Vec<Site> {
    let n = positions.len();
    let (line_start, line_end) = if settings.extend_cut_line {
        let direction = (b - a).normalize();
        let reach = positions.iter().map(|p| p.distance(a)).fold(0.0, f32::max) + a.distance(b) + 1.0;
        (a - direction * reach, b + direction * reach)
    } else {
        (a, b)
    };

    let mut sites: Vec<Site> = Vec::new();
    for e in 0..n {
        let p = positions[e];
        let q = positions[(e + 1) % n];
        let Some((along, point)) = stroke_meets_edge(line_start, line_end, p, q, settings) else {
            continue;
        };
        let length = p.distance(q);
        let site = if along * length <= settings.weld_tolerance {
            Site::Corner(e)
        } else if (1.0 - along) * length <= settings.weld_tolerance {
            Site::Corner((e + 1) % n)
        } else {
            Site::Edge(e, point)
        };

        let point = site.point(positions);
        let duplicate = sites
            .iter()
            .any(|s| *s == site || s.point(positions).distance(point) <= settings.weld_tolerance);
        if !duplicate {
            sites.push(site);
        }
    }
    sites
}

/// Parameter along edge `p`..`q` and the point where the stroke meets it.
/// A stroke end resting on the edge counts as meeting it.
fn stroke_meets_edge(
    start: Vec3,
    end: Vec3,
    p: Vec3,
    q: Vec3,
    settings: &MeshEditSettings,
) -> Option<(f32, Vec3)> {
    if let Some(hit) = segment_segment_intersection(start, end, p, q, settings.cut_tolerance) {
        return Some((hit.along_b, hit.point));
    }
    [start, end].into_iter().find_map(|tip| {
        let along = parameter_of_point_on_segment(tip, p, q).clamp(0.0, 1.0);
        let point = p.lerp(q, along);
        (point.distance(tip) <= settings.weld_tolerance).then_some((along, point))
    })
}

/// Three triangles for a triangle cut across two of its edges, keyed by the
/// edge pair. The corner shared by both cut edges ends up alone in its own
/// triangle.
fn split_triangle_across_edges(e: usize, f: usize) -> Vec<Vec<Node>> {
    use self::Node::{Corner as V, Crossing as X};
    // Crossing 0 lies on edge `e`, crossing 1 on edge `f`.
    let on = |edge: usize| if edge == e { X(0) } else { X(1) };
    match (e.min(f), e.max(f)) {
        (0, 1) => {
            let (p, q) = (on(0), on(1));
            vec![vec![p, V(1), q], vec![V(0), p, q], vec![V(0), q, V(2)]]
        }
        (1, 2) => {
            let (p, q) = (on(1), on(2));
            vec![vec![p, V(2), q], vec![V(0), V(1), p], vec![V(0), p, q]]
        }
        _ => {
            let (p, q) = (on(2), on(0));
            vec![vec![p, V(0), q], vec![q, V(1), V(2)], vec![q, V(2), p]]
        }
    }
}

/// Split a convex loop of `n` corners along the chord between two sites.
/// Pieces with five corners are split again into a quad and a triangle.
fn split_loop(n: usize, sites: [Site; 2]) -> Vec<Vec<Node>> {
    let mut sequence = Vec::with_capacity(n + 2);
    let mut at = [0; 2];
    for k in 0..n {
        sequence.push(Node::Corner(k));
        for (s, site) in sites.iter().enumerate() {
            if *site == Site::Corner(k) {
                at[s] = sequence.len() - 1;
            }
        }
        for (s, site) in sites.iter().enumerate() {
            if matches!(site, Site::Edge(e, _) if *e == k) {
                sequence.push(Node::Crossing(s));
                at[s] = sequence.len() - 1;
            }
        }
    }
    // Corner sites keep their corner node but stand in for the crossing.
    let sequence: Vec<Node> = sequence
        .into_iter()
        .map(|node| match node {
            Node::Corner(k) => sites
                .iter()
                .position(|s| *s == Site::Corner(k))
                .map_or(node, Node::Crossing),
            crossing => crossing,
        })
        .collect();

    let (lo, hi) = (at[0].min(at[1]), at[0].max(at[1]));
    let first: Vec<Node> = sequence[lo..=hi].to_vec();
    let second: Vec<Node> = sequence[hi..].iter().chain(&sequence[..=lo]).copied().collect();

    [first, second]
        .into_iter()
        .flat_map(|piece| match piece.len() {
            5 => vec![
                vec![piece[0], piece[1], piece[2], piece[3]],
                vec![piece[0], piece[3], piece[4]],
            ],
            _ => vec![piece],
        })
        .collect()
}

/// Largest distance between two corners.
fn loop_extent(points: &[Vec3]) -> f32 {
    points
        .iter()
        .enumerate()
        .flat_map(|(i, p)| points[i + 1..].iter().map(move |q| p.distance(*q)))
        .fold(0.0, f32::max)
}

/// Whether any fan triangle of `points` has no area relative to a face of
/// size `extent`.
fn fan_is_degenerate(points: &[Vec3], extent: f32) -> bool {
    let threshold = AREA_EPSILON * extent * extent;
    (1..points.len() - 1).any(|k| {
        let area = (points[k] - points[0]).cross(points[k + 1] - points[0]).length() * 0.5;
        area <= threshold
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qmesh::fixtures::{face_near, single_triangle, unit_cube};

    fn settings() -> MeshEditSettings {
        MeshEditSettings::default()
    }

    fn face_points(mesh: &QMesh) -> Vec<Vec<Vec3>> {
        mesh.faces()
            .map(|(id, _)| mesh.face_positions(id).unwrap())
            .collect()
    }

    fn assert_faces_near(actual: &[Vec<Vec3>], expected: &[Vec<Vec3>]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert_eq!(a.len(), e.len());
            for (p, q) in a.iter().zip(e) {
                assert!(p.distance(*q) < 1e-5, "{a:?} != {e:?}");
            }
        }
    }

    const V0: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    const V1: Vec3 = Vec3::new(2.0, 0.0, 0.0);
    const V2: Vec3 = Vec3::new(0.0, 2.0, 0.0);

    #[test]
    fn triangle_cut_across_first_two_edges() {
        let mut mesh = single_triangle();
        let face = face_near(&mesh, Vec3::ZERO);
        let outcome = knife_cut(
            &mut mesh,
            &face,
            Vec3::new(1.5, -0.2, 0.0),
            Vec3::new(1.5, 0.8, 0.0),
            CutMode::Quad,
            &settings(),
        )
        .unwrap();
        assert_eq!(outcome.added_vertices.len(), 2);
        assert_eq!(outcome.added_faces.len(), 3);

        let p = Vec3::new(1.5, 0.0, 0.0);
        let q = Vec3::new(1.5, 0.5, 0.0);
        assert_faces_near(&face_points(&mesh), &[vec![p, V1, q], vec![V0, p, q], vec![V0, q, V2]]);
        mesh.validate().unwrap();
    }

    #[test]
    fn triangle_cut_across_last_and_first_edges() {
        let mut mesh = single_triangle();
        let face = face_near(&mesh, Vec3::ZERO);
        knife_cut(
            &mut mesh,
            &face,
            Vec3::new(0.7, -0.1, 0.0),
            Vec3::new(-0.1, 0.7, 0.0),
            CutMode::Quad,
            &settings(),
        )
        .unwrap();

        let p = Vec3::new(0.0, 0.6, 0.0);
        let q = Vec3::new(0.6, 0.0, 0.0);
        assert_faces_near(&face_points(&mesh), &[vec![p, V0, q], vec![q, V1, V2], vec![q, V2, p]]);
    }

    #[test]
    fn triangle_cuts_tile_the_face_with_consistent_winding() {
        // One cut per edge pair: (0, 1), (1, 2) and (2, 0).
        let lines = [
            (Vec3::new(1.5, -0.2, 0.0), Vec3::new(1.5, 0.8, 0.0)),
            (Vec3::new(-0.2, 1.0, 0.0), Vec3::new(1.2, 1.0, 0.0)),
            (Vec3::new(0.7, -0.1, 0.0), Vec3::new(-0.1, 0.7, 0.0)),
        ];
        for (start, end) in lines {
            let mut mesh = single_triangle();
            let face = face_near(&mesh, Vec3::ZERO);
            let outcome = knife_cut(&mut mesh, &face, start, end, CutMode::Quad, &settings()).unwrap();
            assert_eq!(outcome.added_faces.len(), 3);

            let mut corners = 0;
            let mut area = 0.0;
            for id in &outcome.added_faces {
                let p = mesh.face_positions(id).unwrap();
                corners += p.len();
                let signed = (p[1] - p[0]).cross(p[2] - p[0]).z * 0.5;
                assert!(signed > 0.0, "face {id} is wound backwards");
                area += signed;
            }
            assert_eq!(corners, 9);
            assert!((area - 2.0).abs() < 1e-5, "cut pieces cover {area}, expected 2");
        }
    }

    #[test]
    fn cut_through_corner_splits_in_two() {
        let mut mesh = single_triangle();
        let face = face_near(&mesh, Vec3::ZERO);
        let outcome = knife_cut(
            &mut mesh,
            &face,
            Vec3::new(-0.2, -0.2, 0.0),
            Vec3::new(1.2, 1.2, 0.0),
            CutMode::Quad,
            &settings(),
        )
        .unwrap();
        assert_eq!(outcome.added_vertices.len(), 1);
        let m = Vec3::new(1.0, 1.0, 0.0);
        assert_faces_near(&face_points(&mesh), &[vec![V0, V1, m], vec![m, V2, V0]]);
    }

    #[test]
    fn quad_cut_across_opposite_edges_makes_two_quads() {
        let mut mesh = unit_cube();
        let top = face_near(&mesh, Vec3::new(0.0, 0.5, 0.0));
        // Off-plane points are projected onto the face.
        let outcome = knife_cut(
            &mut mesh,
            &top,
            Vec3::new(0.0, 0.9, -0.7),
            Vec3::new(0.0, 0.2, 0.7),
            CutMode::Quad,
            &settings(),
        )
        .unwrap();

        assert_eq!(mesh.vertex_count(), 10);
        assert_eq!(mesh.face_count(), 7);
        assert_eq!(mesh.quad_count(), 7);
        assert!(!mesh.contains_face(&top));
        for id in &outcome.added_vertices {
            let p = mesh.position(id).unwrap();
            assert!(p.x.abs() < 1e-5 && (p.y - 0.5).abs() < 1e-5 && (p.z.abs() - 0.5).abs() < 1e-5);
        }
        mesh.validate().unwrap();
    }

    #[test]
    fn quad_cut_across_adjacent_edges_isolates_corner() {
        let mut mesh = unit_cube();
        let top = face_near(&mesh, Vec3::new(0.0, 0.5, 0.0));
        let outcome = knife_cut(
            &mut mesh,
            &top,
            Vec3::new(0.1, 0.5, -0.6),
            Vec3::new(0.6, 0.5, -0.1),
            CutMode::Quad,
            &settings(),
        )
        .unwrap();

        assert_eq!(outcome.added_vertices.len(), 2);
        let sizes: Vec<usize> = outcome
            .added_faces
            .iter()
            .map(|f| mesh.face(f).unwrap().vertices().len())
            .collect();
        assert_eq!(sizes, vec![3, 4, 3]);
        assert_eq!(mesh.quad_count(), 6);
    }

    #[test]
    fn triangle_mode_cuts_one_half_of_a_quad() {
        let mut mesh = unit_cube();
        let top = face_near(&mesh, Vec3::new(0.0, 0.5, 0.0));
        let outcome = knife_cut(
            &mut mesh,
            &top,
            Vec3::new(0.2, 0.5, -0.7),
            Vec3::new(0.2, 0.5, 0.7),
            CutMode::Triangle,
            &settings(),
        )
        .unwrap();

        assert_eq!(outcome.added_vertices.len(), 2);
        assert_eq!(outcome.added_faces.len(), 4);
        assert!(
            outcome
                .added_faces
                .iter()
                .all(|f| mesh.face(f).unwrap().vertices().len() == 3)
        );
        assert_eq!(mesh.quad_count(), 5);
    }

    #[test]
    fn cut_reuses_vertex_on_shared_edge() {
        let mut mesh = unit_cube();
        let top = face_near(&mesh, Vec3::new(0.0, 0.5, 0.0));
        knife_cut(
            &mut mesh,
            &top,
            Vec3::new(0.0, 0.5, -0.7),
            Vec3::new(0.0, 0.5, 0.7),
            CutMode::Quad,
            &settings(),
        )
        .unwrap();
        assert_eq!(mesh.vertex_count(), 10);

        let front = face_near(&mesh, Vec3::new(0.0, 0.0, -0.5));
        let outcome = knife_cut(
            &mut mesh,
            &front,
            Vec3::new(0.0, -0.7, -0.5),
            Vec3::new(0.0, 0.7, -0.5),
            CutMode::Quad,
            &settings(),
        )
        .unwrap();
        assert_eq!(outcome.added_vertices.len(), 1);
        assert_eq!(mesh.vertex_count(), 11);
    }

    #[test]
    fn cut_along_an_edge_is_rejected_without_changes() {
        let mut mesh = unit_cube();
        let top = face_near(&mesh, Vec3::new(0.0, 0.5, 0.0));
        let before = mesh.snapshot();
        let result = knife_cut(
            &mut mesh,
            &top,
            Vec3::new(-0.2, 0.5, -0.5),
            Vec3::new(0.2, 0.5, -0.5),
            CutMode::Quad,
            &settings(),
        );
        assert!(matches!(
            result,
            Err(MeshEditError::Validation(ValidationFailure::SameEdge { .. }))
        ));
        assert_eq!(mesh.snapshot(), before);
    }

    #[test]
    fn stroke_inside_the_face_cuts_nothing() {
        let mut mesh = single_triangle();
        let face = face_near(&mesh, Vec3::ZERO);
        let before = mesh.snapshot();
        let result = knife_cut(
            &mut mesh,
            &face,
            Vec3::new(0.4, 0.3, 0.0),
            Vec3::new(0.6, 0.3, 0.0),
            CutMode::Quad,
            &settings(),
        );
        assert_eq!(result, Err(ValidationFailure::NoEdgeIntersection { face: face.clone() }.into()));
        assert_eq!(mesh.snapshot(), before);
    }

    #[test]
    fn stroke_ending_inside_the_face_crosses_one_edge() {
        let mesh = single_triangle();
        let face = face_near(&mesh, Vec3::ZERO);
        let result = plan_cut(
            &mesh,
            &face,
            Vec3::new(0.5, -0.2, 0.0),
            Vec3::new(0.5, 0.3, 0.0),
            CutMode::Quad,
            &settings(),
        );
        assert_eq!(result, Err(ValidationFailure::SingleEdgeIntersection { face }.into()));
    }

    #[test]
    fn stroke_starting_on_an_edge_cuts_from_there() {
        let mut mesh = single_triangle();
        let face = face_near(&mesh, Vec3::ZERO);
        let outcome = knife_cut(
            &mut mesh,
            &face,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.5, 0.0),
            CutMode::Quad,
            &settings(),
        )
        .unwrap();
        assert_eq!(outcome.added_faces.len(), 3);
        let p = Vec3::new(1.0, 0.0, 0.0);
        let q = Vec3::new(1.0, 1.0, 0.0);
        assert_faces_near(&face_points(&mesh), &[vec![p, V1, q], vec![V0, p, q], vec![V0, q, V2]]);
    }

    #[test]
    fn extended_line_reaches_the_boundary() {
        let mut mesh = single_triangle();
        let face = face_near(&mesh, Vec3::ZERO);
        let settings = MeshEditSettings {
            extend_cut_line: true,
            ..settings()
        };
        let outcome = knife_cut(
            &mut mesh,
            &face,
            Vec3::new(0.4, 0.3, 0.0),
            Vec3::new(0.6, 0.3, 0.0),
            CutMode::Quad,
            &settings,
        )
        .unwrap();
        assert_eq!(outcome.added_vertices.len(), 2);
        for id in &outcome.added_vertices {
            let p = mesh.position(id).unwrap();
            assert!((p.y - 0.3).abs() < 1e-5);
            assert!(p.x.abs() < 1e-5 || (p.x - 1.7).abs() < 1e-5, "{p}");
        }
    }

    #[test]
    fn small_faces_can_still_be_cut() {
        let scale = 0.002;
        let mut mesh =
            QMesh::from_triangles(&[V0 * scale, V1 * scale, V2 * scale], &[[0, 1, 2]], 1e-6).unwrap();
        let face = face_near(&mesh, Vec3::ZERO);
        let outcome = knife_cut(
            &mut mesh,
            &face,
            Vec3::new(1.5, -0.2, 0.0) * scale,
            Vec3::new(1.5, 0.8, 0.0) * scale,
            CutMode::Quad,
            &settings(),
        )
        .unwrap();
        assert_eq!(outcome.added_faces.len(), 3);
        mesh.validate().unwrap();
    }

    #[test]
    fn cut_along_render_diagonal_is_rejected() {
        let mesh = unit_cube();
        let top = face_near(&mesh, Vec3::new(0.0, 0.5, 0.0));
        let corners = mesh.face_positions(&top).unwrap();
        let result = plan_cut(
            &mesh,
            &top,
            corners[0].lerp(corners[2], -0.2),
            corners[0].lerp(corners[2], 1.2),
            CutMode::Quad,
            &settings(),
        );
        assert!(matches!(
            result,
            Err(MeshEditError::Validation(ValidationFailure::AlongExistingEdge { .. }))
        ));
    }

    #[test]
    fn cut_along_other_diagonal_resplits_quad() {
        let mut mesh = unit_cube();
        let top = face_near(&mesh, Vec3::new(0.0, 0.5, 0.0));
        let corners = mesh.face_positions(&top).unwrap();
        let outcome = knife_cut(
            &mut mesh,
            &top,
            corners[1].lerp(corners[3], -0.2),
            corners[1].lerp(corners[3], 1.2),
            CutMode::Quad,
            &settings(),
        )
        .unwrap();
        assert!(outcome.added_vertices.is_empty());
        assert_eq!(outcome.added_faces.len(), 2);
        assert_eq!(mesh.vertex_count(), 8);
    }

    #[test]
    fn coincident_points_are_rejected() {
        let mesh = single_triangle();
        let face = face_near(&mesh, Vec3::ZERO);
        let point = Vec3::new(0.5, 0.5, 0.0);
        assert_eq!(
            plan_cut(&mesh, &face, point, point, CutMode::Quad, &settings()),
            Err(ValidationFailure::CoincidentPoints.into())
        );
    }

    #[test]
    fn stale_plan_is_refused() {
        let mut mesh = unit_cube();
        let top = face_near(&mesh, Vec3::new(0.0, 0.5, 0.0));
        let plan = plan_cut(
            &mesh,
            &top,
            Vec3::new(0.0, 0.5, -0.7),
            Vec3::new(0.0, 0.5, 0.7),
            CutMode::Quad,
            &settings(),
        )
        .unwrap();
        apply_cut(&mut mesh, &plan).unwrap();
        let vertices = mesh.vertex_count();
        assert!(apply_cut(&mut mesh, &plan).is_err());
        assert_eq!(mesh.vertex_count(), vertices);
    }

    #[test]
    fn failed_apply_rolls_back_new_vertices() {
        let mut mesh = single_triangle();
        let face = face_near(&mesh, Vec3::ZERO);
        let source = mesh.face(&face).unwrap().vertices().to_vec();
        let before = mesh.snapshot();
        let plan = CutPlan {
            face: face.clone(),
            source: source.clone(),
            crossings: [V0, V1],
            new_vertices: vec![Vec3::new(1.0, 0.0, 0.0)],
            faces: vec![vec![
                CutCorner::Existing(source[0].clone()),
                CutCorner::New(0),
                CutCorner::Existing(source[0].clone()),
            ]],
        };
        assert!(matches!(apply_cut(&mut mesh, &plan), Err(MeshEditError::InvalidFace(_))));
        assert_eq!(mesh.snapshot(), before);
        assert_eq!(mesh.vertex_count(), 3);
    }

    #[test]
    fn plan_does_not_touch_the_mesh() {
        let mesh = unit_cube();
        let top = face_near(&mesh, Vec3::new(0.0, 0.5, 0.0));
        let before = mesh.snapshot();
        let plan = plan_cut(
            &mesh,
            &top,
            Vec3::new(0.0, 0.5, -0.7),
            Vec3::new(0.0, 0.5, 0.7),
            CutMode::Quad,
            &settings(),
        )
        .unwrap();
        assert_eq!(plan.new_vertices.len(), 2);
        assert_eq!(plan.faces.len(), 2);
        assert_eq!(mesh.snapshot(), before);
    }
}
