use bevy::math::Vec3;
use serde::{Deserialize, Serialize};

use crate::{AREA_EPSILON, EPSILON};

/// An oriented plane `normal . p = distance`.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct FacePlane {
    pub normal: Vec3,
    pub distance: f32,
}

impl FacePlane {
    /// `normal` is normalized; a zero normal yields a degenerate plane.
    pub fn from_normal_and_point(normal: Vec3, point: Vec3) -> Self {
        let normal = normal.normalize_or_zero();
        Self {
            normal,
            distance: normal.dot(point),
        }
    }

    /// Plane through three points with counter-clockwise winding. `None` if
    /// the points are collinear.
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Option<Self> {
        let normal = (b - a).cross(c - a);
        if is_flat(normal, &[a, b, c]) {
            return None;
        }
        Some(Self::from_normal_and_point(normal, a))
    }

    /// Best-fit plane of a polygon using Newell's method, which stays stable
    /// for slightly non-planar quads.
    pub fn from_polygon(points: &[Vec3]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let mut normal = Vec3::ZERO;
        for (i, current) in points.iter().enumerate() {
            let next = points[(i + 1) % points.len()];
            normal.x += (current.y - next.y) * (current.z + next.z);
            normal.y += (current.z - next.z) * (current.x + next.x);
            normal.z += (current.x - next.x) * (current.y + next.y);
        }
        if is_flat(normal, points) {
            return None;
        }
        let centroid = points.iter().copied().sum::<Vec3>() / points.len() as f32;
        Some(Self::from_normal_and_point(normal, centroid))
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.distance
    }

    /// Orthogonal projection of `point` onto the plane.
    pub fn project_point(&self, point: Vec3) -> Vec3 {
        point - self.normal * self.signed_distance(point)
    }

    pub fn contains(&self, point: Vec3) -> bool {
        self.signed_distance(point).abs() < EPSILON
    }
}

/// Whether an area vector (twice the enclosed area) vanishes next to the
/// size of the points that produced it.
fn is_flat(area: Vec3, points: &[Vec3]) -> bool {
    let min = points.iter().copied().fold(Vec3::INFINITY, Vec3::min);
    let max = points.iter().copied().fold(Vec3::NEG_INFINITY, Vec3::max);
    let extent_sq = (max - min).length_squared();
    area.length() <= AREA_EPSILON * extent_sq
}
