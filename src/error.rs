//! Error taxonomy for the mesh editing core.
//!
//! Every failure is one of three kinds: a validation failure (the request was
//! refused, nothing changed), a lookup failure (a stale or unknown reference,
//! treated as a no-op), or an invariant violation (internal inconsistency,
//! logged and recovered from).

use bevy::prelude::*;
use thiserror::Error;

use crate::mesh_registry::ObjectId;
use crate::qmesh::{FaceId, MeshEdge, VertexId};

pub type Result<T> = std::result::Result<T, MeshEditError>;

/// A user request that cannot be carried out as given.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    #[error("a cut needs two points, got {got}")]
    TooFewPoints { got: usize },

    #[error("cut points coincide")]
    CoincidentPoints,

    #[error("cut line does not cross any eligible edge of face {face}")]
    NoEdgeIntersection { face: FaceId },

    #[error("cut line crosses only one edge of face {face}")]
    SingleEdgeIntersection { face: FaceId },

    #[error("cut line crosses {count} edges of face {face}; expected two")]
    AmbiguousCut { face: FaceId, count: usize },

    #[error("both cut points fall on edge {edge}")]
    SameEdge { edge: MeshEdge },

    #[error("cut runs along existing edge {edge}")]
    AlongExistingEdge { edge: MeshEdge },

    #[error("cut would produce a degenerate triangle in face {face}")]
    DegenerateTriangulation { face: FaceId },

    #[error("face {face} has {corners} corners; only triangles and quads can be cut")]
    UnsupportedFace { face: FaceId, corners: usize },

    #[error("nothing is selected")]
    EmptySelection,

    #[error("no target face for the knife")]
    NoTarget,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshEditError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error("triangle index map is stale (built for topology revision {built:?}, mesh is at {current})")]
    StaleIndexMap { built: Option<u64>, current: u64 },

    #[error("triangle {triangle} is out of range ({count} triangles)")]
    TriangleOutOfRange { triangle: usize, count: usize },

    #[error("unknown face {0}")]
    UnknownFace(FaceId),

    #[error("unknown vertex {0}")]
    UnknownVertex(VertexId),

    #[error("unknown object {0}")]
    UnknownObject(ObjectId),

    #[error("invalid face: {0}")]
    InvalidFace(String),

    #[error("source mesh cannot be edited: {0}")]
    InvalidSourceMesh(String),

    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

/// Coarse classification used to decide how a failure is surfaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Lookup,
    Invariant,
}

impl MeshEditError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeshEditError::Validation(_) | MeshEditError::InvalidFace(_) | MeshEditError::InvalidSourceMesh(_) => {
                ErrorKind::Validation
            }
            MeshEditError::StaleIndexMap { .. }
            | MeshEditError::TriangleOutOfRange { .. }
            | MeshEditError::UnknownFace(_)
            | MeshEditError::UnknownVertex(_)
            | MeshEditError::UnknownObject(_) => ErrorKind::Lookup,
            MeshEditError::InvariantViolation(_) => ErrorKind::Invariant,
        }
    }

    /// Log at the level matching the error's kind.
    pub fn log(&self, context: &str) {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::Lookup => warn!("{context}: {self}"),
            ErrorKind::Invariant => error!("{context}: {self}"),
        }
    }
}

/// Non-fatal, user-facing notification about a refused edit.
#[derive(Message, Clone, Debug, PartialEq)]
pub struct EditNotice {
    pub message: String,
}

impl EditNotice {
    pub fn from_error(context: &str, err: &MeshEditError) -> Self {
        Self {
            message: format!("{context}: {err}"),
        }
    }
}
