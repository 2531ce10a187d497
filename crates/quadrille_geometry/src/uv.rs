use bevy::math::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::FacePlane;

/// Offset, scale and rotation applied to a face's planar UVs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UvProjection {
    pub offset: Vec2,
    pub scale: Vec2,
    pub rotation: f32,
}

impl Default for UvProjection {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
        }
    }
}

/// In-plane texture axes `(u, v)` for a face.
///
/// `u` follows the world axis picked by the dominant component of the
/// normal, flattened into the plane, and `v = normal x u`. Faces on the same
/// plane always get the same axes, so the pieces of a cut face keep
/// continuous UVs.
pub fn face_texture_axes(plane: &FacePlane) -> (Vec3, Vec3) {
    let n = plane.normal;
    let abs = n.abs();
    let reference = if abs.y >= abs.x && abs.y >= abs.z {
        Vec3::X
    } else if abs.x >= abs.z {
        Vec3::NEG_Z * n.x.signum()
    } else {
        Vec3::X * n.z.signum()
    };
    let u = (reference - n * n.dot(reference)).normalize_or_zero();
    (u, n.cross(u))
}

/// UVs for the corners of one face lying on `plane`.
pub fn compute_face_uvs(corners: &[Vec3], plane: &FacePlane, projection: &UvProjection) -> Vec<[f32; 2]> {
    let (u_axis, v_axis) = face_texture_axes(plane);
    let (sin_r, cos_r) = projection.rotation.sin_cos();
    let scale = projection.scale.max(Vec2::splat(0.001));

    corners
        .iter()
        .map(|corner| {
            let planar = Vec2::new(corner.dot(u_axis), corner.dot(v_axis));
            let rotated = Vec2::new(
                planar.x * cos_r - planar.y * sin_r,
                planar.x * sin_r + planar.y * cos_r,
            );
            (rotated / scale + projection.offset).to_array()
        })
        .collect()
}
