use std::collections::HashMap;
use std::ops::Range;

use super::FaceId;

/// Bidirectional map between render-triangle indices and faces.
///
/// Triangles are numbered in the order the render buffer emits them, so a
/// face's triangles are always a contiguous range. The map remembers the
/// topology revision it was built for; lookups against a newer mesh are
/// refused by [`super::QMesh`].
#[derive(Clone, Debug, Default)]
pub struct TriangleFaceMap {
    triangle_faces: Vec<FaceId>,
    face_triangles: HashMap<FaceId, Range<usize>>,
    revision: Option<u64>,
}

impl TriangleFaceMap {
    pub(super) fn rebuild(&mut self, faces: impl IntoIterator<Item = (FaceId, usize)>, revision: u64) {
        self.triangle_faces.clear();
        self.face_triangles.clear();
        for (face, count) in faces {
            let start = self.triangle_faces.len();
            self.triangle_faces
                .extend(std::iter::repeat_n(face.clone(), count));
            self.face_triangles.insert(face, start..start + count);
        }
        self.revision = Some(revision);
    }

    pub fn face_for_triangle(&self, triangle: usize) -> Option<&FaceId> {
        self.triangle_faces.get(triangle)
    }

    pub fn triangles_for_face(&self, face: &FaceId) -> Option<Range<usize>> {
        self.face_triangles.get(face).cloned()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_faces.len()
    }

    pub fn face_count(&self) -> usize {
        self.face_triangles.len()
    }

    /// Topology revision this map was built for.
    pub fn revision(&self) -> Option<u64> {
        self.revision
    }
}
