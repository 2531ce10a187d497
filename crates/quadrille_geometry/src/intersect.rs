use bevy::math::{Ray3d, Vec3};

use crate::{AREA_EPSILON, EPSILON, FacePlane};

/// Slack applied to barycentric components and segment parameters so that
/// points exactly on a boundary survive float round-off.
const PARAMETER_EPSILON: f32 = 1e-5;

/// Closest points of two "intersecting" segments must agree this closely,
/// otherwise the segments are skew and do not meet.
const SKEW_TOLERANCE: f32 = 1e-3;

/// Intersect an infinite line with a plane. `None` when the line is parallel
/// to the plane.
///
/// The ray's origin and direction only define the line; hits behind the
/// origin are returned too.
pub fn plane_line_intersection(line: Ray3d, plane: &FacePlane) -> Option<Vec3> {
    let direction = *line.direction;
    let denom = plane.normal.dot(direction);
    if denom.abs() < EPSILON {
        return None;
    }
    let t = (plane.distance - plane.normal.dot(line.origin)) / denom;
    Some(line.origin + direction * t)
}

/// Barycentric coordinates `(u, v, w)` of `point` with respect to the
/// triangle, such that `point ~= a * u + b * v + c * w`. The point is
/// implicitly projected onto the triangle's plane. `None` for degenerate
/// triangles.
pub fn barycentric(point: Vec3, [a, b, c]: [Vec3; 3]) -> Option<Vec3> {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = point - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom <= AREA_EPSILON * AREA_EPSILON * d00 * d11 {
        return None;
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    Some(Vec3::new(1.0 - v - w, v, w))
}

/// Boundary-inclusive point-in-triangle test via barycentric coordinates.
pub fn point_in_triangle(point: Vec3, triangle: [Vec3; 3]) -> bool {
    barycentric(point, triangle).is_some_and(|bary| bary.min_element() >= -PARAMETER_EPSILON)
}

/// Unit normal of a triangle using counter-clockwise winding, or zero if
/// the triangle is degenerate.
pub fn triangle_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a).normalize_or_zero()
}

/// Where two segments meet, with the parameter along each.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentIntersection {
    pub point: Vec3,
    /// Parameter along the first segment, in `[0, 1]`.
    pub along_a: f32,
    /// Parameter along the second segment, in `[0, 1]`.
    pub along_b: f32,
}

/// Intersect segment `a` with segment `b` using the cross-product method.
///
/// Returns `None` when the segments are parallel (the squared sine of the
/// angle between them is within `tolerance`),
/// when either parameter falls outside `[0, 1]`, or when the segments are
/// skew and never actually touch.
pub fn segment_segment_intersection(
    a_start: Vec3,
    a_end: Vec3,
    b_start: Vec3,
    b_end: Vec3,
    tolerance: f32,
) -> Option<SegmentIntersection> {
    let r = a_end - a_start;
    let s = b_end - b_start;
    let r_cross_s = r.cross(s);
    let denom = r_cross_s.length_squared();
    if denom <= tolerance * r.length_squared() * s.length_squared() {
        return None;
    }

    let offset = b_start - a_start;
    let t = offset.cross(s).dot(r_cross_s) / denom;
    let u = offset.cross(r).dot(r_cross_s) / denom;

    let range = -PARAMETER_EPSILON..=1.0 + PARAMETER_EPSILON;
    if !range.contains(&t) || !range.contains(&u) {
        return None;
    }
    let t = t.clamp(0.0, 1.0);
    let u = u.clamp(0.0, 1.0);

    let on_a = a_start + r * t;
    let on_b = b_start + s * u;
    if on_a.distance(on_b) > SKEW_TOLERANCE {
        return None;
    }

    Some(SegmentIntersection {
        point: (on_a + on_b) * 0.5,
        along_a: t,
        along_b: u,
    })
}

/// Unclamped parameter of the projection of `point` onto the line through
/// `start` and `end`. Zero for a degenerate segment.
pub fn parameter_of_point_on_segment(point: Vec3, start: Vec3, end: Vec3) -> f32 {
    let dir = end - start;
    let len_sq = dir.length_squared();
    if len_sq < f32::EPSILON {
        return 0.0;
    }
    (point - start).dot(dir) / len_sq
}

pub fn closest_point_on_segment(point: Vec3, start: Vec3, end: Vec3) -> Vec3 {
    let t = parameter_of_point_on_segment(point, start, end).clamp(0.0, 1.0);
    start + (end - start) * t
}

pub fn point_to_segment_distance(point: Vec3, start: Vec3, end: Vec3) -> f32 {
    point.distance(closest_point_on_segment(point, start, end))
}

/// Nearest vertex to `point` within `threshold`. Linear scan.
pub fn find_nearby_vertex<K>(
    point: Vec3,
    vertices: impl IntoIterator<Item = (K, Vec3)>,
    threshold: f32,
) -> Option<K> {
    let mut best = None;
    let mut best_dist = threshold;
    for (key, position) in vertices {
        let dist = position.distance(point);
        if dist <= best_dist {
            best_dist = dist;
            best = Some(key);
        }
    }
    best
}

/// Nearest edge to `point` within `threshold`, with the closest point on it.
/// Linear scan.
pub fn find_nearby_edge<K>(
    point: Vec3,
    edges: impl IntoIterator<Item = (K, Vec3, Vec3)>,
    threshold: f32,
) -> Option<(K, Vec3)> {
    let mut best = None;
    let mut best_dist = threshold;
    for (key, start, end) in edges {
        let closest = closest_point_on_segment(point, start, end);
        let dist = closest.distance(point);
        if dist <= best_dist {
            best_dist = dist;
            best = Some((key, closest));
        }
    }
    best
}
