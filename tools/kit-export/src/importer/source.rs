//! Source scene contract
//!
//! Plain-data form of whatever an external 3D-interchange decoder produced.
//! Adapters (see `gltf.rs`) decode a file into this shape in one scoped
//! call; the normalizer never sees library types or lifetimes. Everything
//! here is still in author space and author time units.

use glam::{Mat4, Quat, Vec2, Vec3};

#[derive(Debug, Clone, Default)]
pub struct SourceScene {
    pub meshes: Vec<SourceMesh>,
    pub materials: Vec<SourceMaterial>,
    pub animations: Vec<SourceAnimation>,
}

impl SourceScene {
    /// Material name for a face's material index, if any non-empty name
    /// exists.
    pub fn material_name(&self, index: u32) -> Option<&str> {
        self.materials
            .get(index as usize)
            .map(|m| m.name.as_str())
            .filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceMaterial {
    pub name: String,
}

/// One face as decoded; interchange libraries normally pre-triangulate, so
/// anything but 3 indices is counted and skipped downstream.
#[derive(Debug, Clone)]
pub struct SourceFace {
    pub material_index: u32,
    pub indices: Vec<u32>,
}

/// A skinning cluster: one bone plus the vertices it influences.
#[derive(Debug, Clone)]
pub struct SourceCluster {
    pub bone_name: String,
    /// Name of the parent node, if the bone has one.
    pub parent_name: Option<String>,
    pub inverse_bind_pose: Mat4,
    /// The bone node's local transform at bind time.
    pub node_transform: Mat4,
    /// (vertex id, weight) pairs.
    pub weights: Vec<(u32, f32)>,
}

#[derive(Debug, Clone, Default)]
pub struct SourceMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub tangents: Option<Vec<Vec3>>,
    pub tex_coords: [Option<Vec<Vec2>>; 4],
    pub faces: Vec<SourceFace>,
    pub clusters: Vec<SourceCluster>,
}

/// Raw per-bone animation keys, in ticks.
#[derive(Debug, Clone, Default)]
pub struct SourceChannel {
    pub bone_name: String,
    pub position_keys: Vec<(f64, Vec3)>,
    pub rotation_keys: Vec<(f64, Quat)>,
    pub scale_keys: Vec<(f64, Vec3)>,
}

#[derive(Debug, Clone, Default)]
pub struct SourceAnimation {
    pub name: String,
    pub duration_ticks: f64,
    /// 0 means the source did not report a time scale.
    pub ticks_per_second: f64,
    pub channels: Vec<SourceChannel>,
}
