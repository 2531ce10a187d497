use bevy::prelude::*;
use quadrille_geometry::UvProjection;

/// Which edges a knife cut may cross on a quad face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Reflect)]
pub enum CutMode {
    /// Cut the logical quad across its four exterior edges; the internal
    /// diagonal is never crossed.
    #[default]
    Quad,
    /// Cut a single render triangle across its own three edges.
    Triangle,
}

impl CutMode {
    pub fn toggled(self) -> Self {
        match self {
            CutMode::Quad => CutMode::Triangle,
            CutMode::Triangle => CutMode::Quad,
        }
    }
}

/// Tunables for mesh editing. Distances are world-space unless noted.
#[derive(Resource, Clone, Debug, Reflect)]
#[reflect(Resource)]
pub struct MeshEditSettings {
    /// Object-space distance under which positions are treated as the same
    /// vertex, both when welding imported geometry and when placing cut
    /// vertices.
    pub weld_tolerance: f32,
    /// Parallel rejection threshold for segment intersection, as the squared
    /// sine of the angle between the segments.
    pub cut_tolerance: f32,
    pub vertex_snap_threshold: f32,
    pub edge_snap_threshold: f32,
    pub edge_pick_threshold: f32,
    pub cut_mode: CutMode,
    /// Stretch the knife stroke across the whole face instead of cutting
    /// only the edges between the two placed points.
    pub extend_cut_line: bool,
    /// World units per pixel per unit of camera distance while dragging.
    pub drag_sensitivity: f32,
    /// Emit paraxial UVs into the render buffer.
    pub generate_uvs: bool,
    #[reflect(ignore)]
    pub uv_projection: UvProjection,
}

impl Default for MeshEditSettings {
    fn default() -> Self {
        Self {
            weld_tolerance: 1e-4,
            cut_tolerance: 1e-8,
            vertex_snap_threshold: 0.1,
            edge_snap_threshold: 0.1,
            edge_pick_threshold: 0.25,
            cut_mode: CutMode::Quad,
            extend_cut_line: false,
            drag_sensitivity: 0.003,
            generate_uvs: true,
            uv_projection: UvProjection::default(),
        }
    }
}

impl MeshEditSettings {
    pub fn uv_projection(&self) -> Option<&UvProjection> {
        self.generate_uvs.then_some(&self.uv_projection)
    }
}
