//! Stateless geometry shared by the mesh editing core.
//!
//! Everything here is a pure function of its inputs. Callers pick the space
//! (world or object-local) and are responsible for converting between them.

mod edge;
mod intersect;
mod plane;
mod quad;
mod uv;

pub use edge::EdgeKey;
pub use intersect::{
    SegmentIntersection, barycentric, closest_point_on_segment, find_nearby_edge,
    find_nearby_vertex, parameter_of_point_on_segment, plane_line_intersection,
    point_in_triangle, point_to_segment_distance, segment_segment_intersection, triangle_normal,
};
pub use plane::FacePlane;
pub use quad::{pair_quads, quad_exterior_edges, quad_pair_qualifies};
pub use uv::{UvProjection, compute_face_uvs, face_texture_axes};

/// General-purpose geometric epsilon for lengths and plane distances.
pub const EPSILON: f32 = 1e-4;

/// Areas at or below this fraction of a shape's squared size count as zero.
pub const AREA_EPSILON: f32 = 1e-6;
