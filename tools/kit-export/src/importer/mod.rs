//! Scene importer (normalization pipeline)
//!
//! Turns a decoded [`SourceScene`] into the intermediate scene document:
//! coordinate conversion, per-vertex attribute extraction, bone/weight
//! assignment (up to 4 per vertex) and submesh partition by material.

pub mod gltf;
pub mod source;

use glam::Quat;
use hashbrown::HashMap;

use crate::convert;
use crate::document::{
    AnimationChannel, Animation, Document, IndexFlags, Key, Mesh, Skeleton, Submesh, Track,
    Vertex, VertexFlags, DEFAULT_MATERIAL_PATH,
};
use source::{SourceChannel, SourceMesh, SourceScene};

/// Prefix some interchange exporters put on clip names.
const ANIM_STACK_PREFIX: &str = "AnimStack::";

/// Fallback time scale when the source reports none.
const DEFAULT_TICKS_PER_SECOND: f64 = 30.0;

/// Counters for the two accepted silent-drop cases. Both are warnings, not
/// failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// 5th and later bone weights on a single vertex.
    pub dropped_weights: u64,
    /// Faces whose vertex count was not 3.
    pub skipped_faces: u64,
}

/// 16-bit indices whenever every index fits; the boundary is deliberately
/// on the index count, not the vertex count.
pub fn index_flags_for(index_count: usize) -> IndexFlags {
    if index_count < 65536 {
        IndexFlags::USE_16BIT
    } else {
        IndexFlags::empty()
    }
}

/// In-progress submesh for one (mesh, material) partition.
struct SubmeshBuilder {
    submesh: Submesh,
    /// Source vertex id to submesh-local vertex id. Discarded once the
    /// document is built.
    source_to_local: HashMap<u32, u32>,
}

impl SubmeshBuilder {
    fn new(material_path: String, vertex_flags: VertexFlags) -> Self {
        let mut submesh = Submesh::new(material_path);
        submesh.vertex_flags = vertex_flags;
        Self {
            submesh,
            source_to_local: HashMap::new(),
        }
    }

    /// Local id for a source vertex, materializing it on first reference.
    fn local_vertex(&mut self, src: &SourceMesh, source_id: u32) -> u32 {
        if let Some(&local) = self.source_to_local.get(&source_id) {
            return local;
        }
        let local = self.submesh.vertices.len() as u32;
        self.submesh.vertices.push(make_vertex(src, source_id));
        self.source_to_local.insert(source_id, local);
        local
    }
}

/// Build one engine-space vertex from the source attribute arrays. Missing
/// attributes stay zero.
fn make_vertex(src: &SourceMesh, id: u32) -> Vertex {
    let i = id as usize;
    let mut v = Vertex::default();
    v.position = src.positions[i].extend(1.0);
    if let Some(normals) = &src.normals {
        v.normal = normals[i];
    }
    if let Some(tangents) = &src.tangents {
        v.tangent = tangents[i];
    }
    for (set, coords) in src.tex_coords.iter().enumerate() {
        if let Some(coords) = coords {
            v.tex_coords[set] = coords[i];
        }
    }
    convert::vertex_to_engine(&mut v);
    v
}

fn detect_vertex_flags(src: &SourceMesh) -> VertexFlags {
    let mut flags = VertexFlags::empty();
    if src.normals.is_some() {
        flags |= VertexFlags::NORMAL;
    }
    if src.tangents.is_some() {
        flags |= VertexFlags::TANGENT;
    }
    const TEX_FLAGS: [VertexFlags; 4] = [
        VertexFlags::TEX_COORDS_1,
        VertexFlags::TEX_COORDS_2,
        VertexFlags::TEX_COORDS_3,
        VertexFlags::TEX_COORDS_4,
    ];
    for (set, coords) in src.tex_coords.iter().enumerate() {
        if coords.is_some() {
            flags |= TEX_FLAGS[set];
        }
    }
    flags
}

/// Normalize a decoded scene into `doc`. Returns the drop counters.
pub fn normalize(scene: &SourceScene, doc: &mut Document) -> ImportStats {
    let mut stats = ImportStats::default();

    let mut skeleton = Skeleton::default();
    // Parent names recorded at bone creation, resolved once every bone
    // exists.
    let mut pending_parents: Vec<(crate::document::BoneId, String)> = Vec::new();

    for src_mesh in &scene.meshes {
        let vertex_flags = detect_vertex_flags(src_mesh);

        // Partition faces by material index, first-seen order.
        let mut builders: Vec<SubmeshBuilder> = Vec::new();
        let mut builder_for_material: HashMap<u32, usize> = HashMap::new();

        for face in &src_mesh.faces {
            if face.indices.len() != 3 {
                stats.skipped_faces += 1;
                continue;
            }

            let slot = *builder_for_material
                .entry(face.material_index)
                .or_insert_with(|| {
                    let material_path = scene
                        .material_name(face.material_index)
                        .unwrap_or(DEFAULT_MATERIAL_PATH)
                        .to_owned();
                    builders.push(SubmeshBuilder::new(material_path, vertex_flags));
                    builders.len() - 1
                });

            let builder = &mut builders[slot];
            for &source_id in &face.indices {
                let local = builder.local_vertex(src_mesh, source_id);
                builder.submesh.indices.push(local);
            }
        }

        for builder in &mut builders {
            builder.submesh.index_flags = index_flags_for(builder.submesh.indices.len());
        }

        // Skinning clusters: new bone names extend the skeleton; weights
        // fill up to four submesh-local slots per vertex.
        for cluster in &src_mesh.clusters {
            if skeleton.name.is_empty() {
                skeleton.name = src_mesh.name.clone();
            }

            if skeleton.find_bone(&cluster.bone_name).is_none() {
                let id = skeleton.add_bone(
                    cluster.bone_name.clone(),
                    convert::mat4_to_engine(cluster.inverse_bind_pose),
                    convert::mat4_to_engine(cluster.node_transform),
                );
                match &cluster.parent_name {
                    Some(parent) => pending_parents.push((id, parent.clone())),
                    None => skeleton.root_bones.push(id),
                }
            }

            for builder in &mut builders {
                let next = builder.submesh.bone_index.len() as u32;
                let local_bone = *builder
                    .submesh
                    .bone_index
                    .entry(cluster.bone_name.clone())
                    .or_insert(next);

                for &(vertex_id, weight) in &cluster.weights {
                    if let Some(&local) = builder.source_to_local.get(&vertex_id)
                        && !builder.submesh.vertices[local as usize].push_weight(local_bone, weight)
                    {
                        stats.dropped_weights += 1;
                    }
                }
            }
        }

        for builder in &mut builders {
            if !builder.submesh.bone_index.is_empty() {
                builder.submesh.vertex_flags |= VertexFlags::BONES;
            }
        }

        // Merge into an existing mesh with the same name, else create one.
        tracing::info!("Imported mesh {}", src_mesh.name);
        let submeshes = builders.into_iter().map(|b| b.submesh);
        match doc.find_mesh_mut(&src_mesh.name) {
            Some(mesh) => mesh.submeshes.extend(submeshes),
            None => doc.meshes.push(Mesh {
                name: src_mesh.name.clone(),
                submeshes: submeshes.collect(),
            }),
        }
    }

    // Resolve recorded parent names; anything unresolvable becomes a root.
    for (bone, parent_name) in pending_parents {
        match skeleton.find_bone(&parent_name) {
            Some(parent) => skeleton.set_parent(bone, parent),
            None => skeleton.root_bones.push(bone),
        }
    }

    if skeleton.bone_count() > 0 {
        tracing::info!("Imported skeleton {} ({} bones)", skeleton.name, skeleton.bone_count());
        doc.skeletons.push(skeleton);
    }

    let mesh_prefix = doc.meshes.first().map(|m| m.name.clone());
    for src_anim in &scene.animations {
        doc.animations.push(import_animation(src_anim, mesh_prefix.as_deref()));
    }

    if stats.skipped_faces > 0 {
        tracing::warn!("Skipped {} non-triangular faces", stats.skipped_faces);
    }
    if stats.dropped_weights > 0 {
        tracing::warn!(
            "Dropped {} bone weights beyond 4 per vertex",
            stats.dropped_weights
        );
    }

    stats
}

/// Strip the exporter prefix and any path-like segments, then disambiguate
/// with the mesh name.
fn resolve_clip_name(raw: &str, mesh_prefix: Option<&str>) -> String {
    let mut name = raw.strip_prefix(ANIM_STACK_PREFIX).unwrap_or(raw);
    if let Some(last) = name.rsplit('|').next() {
        name = last;
    }
    match mesh_prefix {
        Some(prefix) => format!("{prefix}_{name}"),
        None => name.to_owned(),
    }
}

fn import_animation(
    src: &crate::importer::source::SourceAnimation,
    mesh_prefix: Option<&str>,
) -> Animation {
    let tps = if src.ticks_per_second == 0.0 {
        tracing::warn!("Ticks per second not set (or 0), default to 30.");
        DEFAULT_TICKS_PER_SECOND
    } else {
        src.ticks_per_second
    };

    let name = resolve_clip_name(&src.name, mesh_prefix);
    let duration = (src.duration_ticks / tps) as f32;
    tracing::info!("Importing animation {}, {} seconds", name, duration);

    Animation {
        name,
        duration,
        channels: src
            .channels
            .iter()
            .map(|channel| import_channel(channel, tps))
            .collect(),
    }
}

fn import_channel(src: &SourceChannel, tps: f64) -> AnimationChannel {
    let mut channel = AnimationChannel {
        name: src.bone_name.clone(),
        ..Default::default()
    };

    channel.translation = Track {
        keys: src
            .position_keys
            .iter()
            .map(|&(t, v)| Key {
                time: (t / tps) as f32,
                value: convert::vec3_to_engine(v),
            })
            .collect(),
    };
    channel.rotation = Track {
        keys: src
            .rotation_keys
            .iter()
            .map(|&(t, q)| Key::<Quat> {
                time: (t / tps) as f32,
                value: convert::quat_to_engine(q),
            })
            .collect(),
    };
    channel.scale = Track {
        keys: src
            .scale_keys
            .iter()
            .map(|&(t, v)| Key {
                time: (t / tps) as f32,
                value: convert::scale_to_engine(v),
            })
            .collect(),
    };

    channel
}
