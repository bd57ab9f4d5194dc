//! Intermediate scene document
//!
//! The normalized in-memory representation of meshes, skeletons and
//! animations, decoupled from any one import library. The document owns
//! everything in it and lives for exactly one command invocation.

use std::collections::BTreeMap;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use hashbrown::HashMap;

/// Default material path used when a source mesh carries no material name.
pub const DEFAULT_MATERIAL_PATH: &str = "Core/Default/Material";

bitflags::bitflags! {
    /// Which per-vertex attributes a submesh carries (and, at bake time,
    /// which of them actually get serialized).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VertexFlags: u32 {
        const NORMAL       = 1 << 0;
        const TANGENT      = 1 << 1;
        const BONES        = 1 << 2;
        const TEX_COORDS_1 = 1 << 3;
        const TEX_COORDS_2 = 1 << 4;
        const TEX_COORDS_3 = 1 << 5;
        const TEX_COORDS_4 = 1 << 6;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IndexFlags: u32 {
        const USE_16BIT = 1 << 0;
    }
}

impl Default for VertexFlags {
    fn default() -> Self {
        VertexFlags::empty()
    }
}

impl Default for IndexFlags {
    fn default() -> Self {
        IndexFlags::empty()
    }
}

/// One vertex in engine space. Attributes a source mesh does not provide
/// stay zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Position with w fixed to 1.
    pub position: Vec4,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub tex_coords: [Vec2; 4],
    /// Submesh-local bone ids, slot-assigned in first-seen order.
    pub bones: [u32; 4],
    pub weights: [f32; 4],
    /// Next free bone slot. Bookkeeping only, never serialized.
    pub weight_count: u8,
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: Vec4::new(0.0, 0.0, 0.0, 1.0),
            normal: Vec3::ZERO,
            tangent: Vec3::ZERO,
            tex_coords: [Vec2::ZERO; 4],
            bones: [0; 4],
            weights: [0.0; 4],
            weight_count: 0,
        }
    }
}

impl Vertex {
    /// Assign a (bone, weight) pair to the next free slot. Returns false
    /// when all four slots are taken; the caller counts the drop.
    pub fn push_weight(&mut self, bone: u32, weight: f32) -> bool {
        let slot = self.weight_count as usize;
        if slot >= 4 {
            return false;
        }
        self.bones[slot] = bone;
        self.weights[slot] = weight;
        self.weight_count += 1;
        true
    }
}

/// A contiguous vertex/index range sharing one material. Indices are always
/// a triangle list (stride 3).
#[derive(Debug, Clone, Default)]
pub struct Submesh {
    pub material_path: String,
    pub vertex_flags: VertexFlags,
    pub index_flags: IndexFlags,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Bone name to submesh-local bone id.
    pub bone_index: BTreeMap<String, u32>,
    /// Collision triangles, filled by `generate_triangles`.
    pub triangles: Vec<[Vec3; 3]>,
}

impl Submesh {
    pub fn new(material_path: impl Into<String>) -> Self {
        Self {
            material_path: material_path.into(),
            ..Default::default()
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub submeshes: Vec<Submesh>,
}

/// Stable bone handle within one skeleton's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoneId(pub usize);

/// A bone in the arena. Parent and children are plain index lookups, never
/// owning references.
#[derive(Debug, Clone)]
pub struct Bone {
    pub name: String,
    pub parent: Option<BoneId>,
    pub children: Vec<BoneId>,
    pub inverse_bind_pose: Mat4,
    pub initial_transform: Mat4,
}

#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    pub name: String,
    bones: Vec<Bone>,
    pub root_bones: Vec<BoneId>,
    bone_index: HashMap<String, BoneId>,
}

impl Skeleton {
    /// Add a new bone with no parent link yet. The caller resolves parents
    /// in a later pass once every bone exists.
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        inverse_bind_pose: Mat4,
        initial_transform: Mat4,
    ) -> BoneId {
        let name = name.into();
        let id = BoneId(self.bones.len());
        self.bone_index.insert(name.clone(), id);
        self.bones.push(Bone {
            name,
            parent: None,
            children: Vec::new(),
            inverse_bind_pose,
            initial_transform,
        });
        id
    }

    pub fn find_bone(&self, name: &str) -> Option<BoneId> {
        self.bone_index.get(name).copied()
    }

    pub fn bone(&self, id: BoneId) -> &Bone {
        &self.bones[id.0]
    }

    pub fn bone_mut(&mut self, id: BoneId) -> &mut Bone {
        &mut self.bones[id.0]
    }

    /// Bones in arena order (stable, deterministic).
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Link `child` under `parent`.
    pub fn set_parent(&mut self, child: BoneId, parent: BoneId) {
        self.bones[child.0].parent = Some(parent);
        self.bones[parent.0].children.push(child);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Key<T> {
    pub time: f32,
    pub value: T,
}

/// Keyframe track; times are seconds, strictly non-decreasing.
#[derive(Debug, Clone, Default)]
pub struct Track<T> {
    pub keys: Vec<Key<T>>,
}

/// Per-bone animation data: one track each for translation, rotation and
/// scale.
#[derive(Debug, Clone, Default)]
pub struct AnimationChannel {
    /// Bone name this channel drives.
    pub name: String,
    pub translation: Track<Vec3>,
    pub rotation: Track<Quat>,
    pub scale: Track<Vec3>,
}

#[derive(Debug, Clone, Default)]
pub struct Animation {
    pub name: String,
    /// Clip length in seconds.
    pub duration: f32,
    pub channels: Vec<AnimationChannel>,
}

/// Owns every mesh, skeleton and animation produced by one import. Nothing
/// in here outlives the command that built it.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub meshes: Vec<Mesh>,
    pub skeletons: Vec<Skeleton>,
    pub animations: Vec<Animation>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_mesh_mut(&mut self, name: &str) -> Option<&mut Mesh> {
        self.meshes.iter_mut().find(|m| m.name == name)
    }
}
