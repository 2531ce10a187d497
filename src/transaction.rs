//! At most one uncommitted edit exists at a time. Starting a new one
//! cancels whatever was pending.

use bevy::prelude::*;

use crate::knife::KnifeCut;
use crate::qmesh::QMesh;
use crate::vertex_drag::VertexDrag;

#[derive(Debug)]
pub enum PendingEdit {
    VertexDrag(VertexDrag),
    Knife(KnifeCut),
}

impl PendingEdit {
    pub fn label(&self) -> &'static str {
        match self {
            PendingEdit::VertexDrag(_) => "vertex drag",
            PendingEdit::Knife(_) => "knife cut",
        }
    }

    /// Undo any live changes the edit has made to `mesh`.
    pub fn cancel(self, mesh: &mut QMesh) {
        match self {
            PendingEdit::VertexDrag(drag) => drag.cancel(mesh),
            // Knife cuts only touch the mesh on commit.
            PendingEdit::Knife(_) => {}
        }
    }
}

#[derive(Resource, Default, Debug)]
pub struct ActiveEdit {
    pending: Option<PendingEdit>,
}

impl ActiveEdit {
    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    pub fn begin(&mut self, edit: PendingEdit, mesh: &mut QMesh) {
        self.cancel(mesh);
        debug!("Begin {}", edit.label());
        self.pending = Some(edit);
    }

    /// Cancel the pending edit, if any. Returns whether one was cancelled.
    pub fn cancel(&mut self, mesh: &mut QMesh) -> bool {
        match self.pending.take() {
            Some(edit) => {
                debug!("Cancel {}", edit.label());
                edit.cancel(mesh);
                true
            }
            None => false,
        }
    }

    /// Take the pending edit out for committing.
    pub fn take(&mut self) -> Option<PendingEdit> {
        self.pending.take()
    }

    pub fn drag(&self) -> Option<&VertexDrag> {
        match &self.pending {
            Some(PendingEdit::VertexDrag(drag)) => Some(drag),
            _ => None,
        }
    }

    pub fn drag_mut(&mut self) -> Option<&mut VertexDrag> {
        match &mut self.pending {
            Some(PendingEdit::VertexDrag(drag)) => Some(drag),
            _ => None,
        }
    }

    pub fn knife(&self) -> Option<&KnifeCut> {
        match &self.pending {
            Some(PendingEdit::Knife(knife)) => Some(knife),
            _ => None,
        }
    }

    pub fn knife_mut(&mut self) -> Option<&mut KnifeCut> {
        match &mut self.pending {
            Some(PendingEdit::Knife(knife)) => Some(knife),
            _ => None,
        }
    }
}
