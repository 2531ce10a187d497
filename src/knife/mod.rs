//! Knife tool: pick two points on a face, preview, then commit the cut.

mod cut;

use bevy::prelude::*;

use crate::error::{Result, ValidationFailure};
use crate::qmesh::{FaceId, QMesh};
use crate::settings::{CutMode, MeshEditSettings};

pub use cut::{CutCorner, CutOutcome, CutPlan, apply_cut, knife_cut, plan_cut};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KnifePhase {
    /// Waiting for more points.
    Drawing { points: usize },
    /// Two points placed and the cut validated.
    Ready,
}

/// An in-progress knife cut on one face.
#[derive(Clone, Debug)]
pub struct KnifeCut {
    target: FaceId,
    mode: CutMode,
    points: Vec<Vec3>,
    plan: Option<CutPlan>,
}

impl KnifeCut {
    pub fn new(target: FaceId, mode: CutMode) -> Self {
        Self {
            target,
            mode,
            points: Vec::with_capacity(2),
            plan: None,
        }
    }

    pub fn target(&self) -> &FaceId {
        &self.target
    }

    pub fn mode(&self) -> CutMode {
        self.mode
    }

    /// Placed points, object space.
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn plan(&self) -> Option<&CutPlan> {
        self.plan.as_ref()
    }

    pub fn phase(&self) -> KnifePhase {
        match self.plan {
            Some(_) => KnifePhase::Ready,
            None => KnifePhase::Drawing {
                points: self.points.len(),
            },
        }
    }

    /// Place a point (object space). The second point plans the cut; if the
    /// plan is rejected the point is discarded and the first one kept. A
    /// point placed after the cut is ready starts a new line.
    pub fn add_point(&mut self, mesh: &QMesh, point: Vec3, settings: &MeshEditSettings) -> Result<KnifePhase> {
        if self.plan.is_some() {
            self.points.clear();
            self.plan = None;
        }
        self.points.push(point);
        if let [start, end] = self.points[..] {
            match plan_cut(mesh, &self.target, start, end, self.mode, settings) {
                Ok(plan) => self.plan = Some(plan),
                Err(err) => {
                    self.points.pop();
                    return Err(err);
                }
            }
        }
        Ok(self.phase())
    }

    /// Change the cut mode, replanning if both points are placed.
    pub fn set_mode(&mut self, mesh: &QMesh, mode: CutMode, settings: &MeshEditSettings) -> Result<()> {
        self.mode = mode;
        if let [start, end] = self.points[..] {
            self.plan = None;
            self.plan = Some(plan_cut(mesh, &self.target, start, end, mode, settings)?);
        }
        Ok(())
    }

    /// Apply the planned cut.
    pub fn commit(self, mesh: &mut QMesh) -> Result<CutOutcome> {
        let Some(plan) = self.plan else {
            return Err(ValidationFailure::TooFewPoints {
                got: self.points.len(),
            }
            .into());
        };
        let outcome = apply_cut(mesh, &plan)?;
        info!(
            "Knife cut face {}: {} new faces, {} new vertices",
            outcome.removed,
            outcome.added_faces.len(),
            outcome.added_vertices.len()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeshEditError;
    use crate::qmesh::fixtures::{face_near, unit_cube};

    fn top_knife(mesh: &QMesh) -> KnifeCut {
        KnifeCut::new(face_near(mesh, Vec3::new(0.0, 0.5, 0.0)), CutMode::Quad)
    }

    #[test]
    fn two_points_make_a_ready_cut() {
        let mut mesh = unit_cube();
        let settings = MeshEditSettings::default();
        let mut knife = top_knife(&mesh);
        assert_eq!(knife.phase(), KnifePhase::Drawing { points: 0 });
        assert_eq!(
            knife.add_point(&mesh, Vec3::new(0.0, 0.5, -0.7), &settings),
            Ok(KnifePhase::Drawing { points: 1 })
        );
        assert_eq!(
            knife.add_point(&mesh, Vec3::new(0.0, 0.5, 0.7), &settings),
            Ok(KnifePhase::Ready)
        );
        let outcome = knife.commit(&mut mesh).unwrap();
        assert_eq!(outcome.added_faces.len(), 2);
    }

    #[test]
    fn rejected_second_point_keeps_the_first() {
        let mesh = unit_cube();
        let settings = MeshEditSettings::default();
        let mut knife = top_knife(&mesh);
        knife.add_point(&mesh, Vec3::new(-0.2, 0.5, -0.5), &settings).unwrap();
        let result = knife.add_point(&mesh, Vec3::new(0.2, 0.5, -0.5), &settings);
        assert!(matches!(result, Err(MeshEditError::Validation(_))));
        assert_eq!(knife.points().len(), 1);
        assert_eq!(knife.phase(), KnifePhase::Drawing { points: 1 });
    }

    #[test]
    fn stroke_short_of_the_edges_stays_drawing() {
        let mesh = unit_cube();
        let settings = MeshEditSettings::default();
        let mut knife = top_knife(&mesh);
        knife.add_point(&mesh, Vec3::new(0.0, 0.5, -0.3), &settings).unwrap();
        let result = knife.add_point(&mesh, Vec3::new(0.0, 0.5, 0.3), &settings);
        assert!(matches!(
            result,
            Err(MeshEditError::Validation(ValidationFailure::NoEdgeIntersection { .. }))
        ));
        assert_eq!(knife.phase(), KnifePhase::Drawing { points: 1 });
    }

    #[test]
    fn commit_without_plan_fails() {
        let mut mesh = unit_cube();
        let knife = top_knife(&mesh);
        let before = mesh.snapshot();
        assert_eq!(
            knife.commit(&mut mesh),
            Err(ValidationFailure::TooFewPoints { got: 0 }.into())
        );
        assert_eq!(mesh.snapshot(), before);
    }

    #[test]
    fn switching_mode_replans() {
        let mesh = unit_cube();
        let settings = MeshEditSettings::default();
        let mut knife = top_knife(&mesh);
        knife.add_point(&mesh, Vec3::new(0.2, 0.5, -0.7), &settings).unwrap();
        knife.add_point(&mesh, Vec3::new(0.2, 0.5, 0.7), &settings).unwrap();
        assert_eq!(knife.plan().unwrap().faces.len(), 2);
        knife.set_mode(&mesh, CutMode::Triangle, &settings).unwrap();
        assert_eq!(knife.plan().unwrap().faces.len(), 4);
    }
}
