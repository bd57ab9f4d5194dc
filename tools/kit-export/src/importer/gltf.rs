//! glTF/GLB scene adapter
//!
//! Decodes a glTF file into the plain-data [`SourceScene`]. All library
//! types stay inside this module; per-primitive joint/weight pairs are
//! inverted here into per-bone clusters so the normalizer only ever sees
//! one skinning shape.

use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec2, Vec3};
use hashbrown::{HashMap, HashSet};
use std::path::Path;

use super::source::{
    SourceAnimation, SourceChannel, SourceCluster, SourceFace, SourceMaterial, SourceMesh,
    SourceScene,
};

/// Sentinel for primitives without a material; resolves to no name and
/// therefore to the default material downstream.
const NO_MATERIAL: u32 = u32::MAX;

/// Decode `input` into a source scene. One scoped call owns every glTF
/// buffer; nothing borrowed escapes.
pub fn load_scene(input: &Path) -> Result<SourceScene> {
    let (document, buffers, _images) =
        gltf::import(input).with_context(|| format!("Failed to load glTF: {:?}", input))?;

    let materials = document
        .materials()
        .map(|m| SourceMaterial {
            name: m.name().unwrap_or("").to_owned(),
        })
        .collect();

    // Child node index to parent node index, for bone parent names.
    let mut parents: HashMap<usize, usize> = HashMap::new();
    for node in document.nodes() {
        for child in node.children() {
            parents.insert(child.index(), node.index());
        }
    }

    let mut meshes = Vec::new();
    for node in document.nodes() {
        let Some(mesh) = node.mesh() else {
            continue;
        };
        meshes.push(load_mesh(&node, &mesh, &buffers, &document, &parents)?);
    }

    let animations = document
        .animations()
        .map(|animation| load_animation(&animation, &buffers))
        .collect::<Result<Vec<_>>>()?;

    Ok(SourceScene {
        meshes,
        materials,
        animations,
    })
}

/// Attribute accumulator across a mesh's primitives. glTF allows attribute
/// sets to differ per primitive; absent runs are zero-padded so every array
/// stays aligned with `positions`.
#[derive(Default)]
struct Attributes {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    has_normals: bool,
    tangents: Vec<Vec3>,
    has_tangents: bool,
    tex_coords: [Vec<Vec2>; 4],
    has_tex_coords: [bool; 4],
    /// Per-vertex (joint, weight) slots, aligned with `positions`.
    joints: Vec<[u16; 4]>,
    weights: Vec<[f32; 4]>,
    has_skin: bool,
}

fn load_mesh(
    node: &gltf::Node,
    mesh: &gltf::Mesh,
    buffers: &[gltf::buffer::Data],
    document: &gltf::Document,
    parents: &HashMap<usize, usize>,
) -> Result<SourceMesh> {
    let name = node
        .name()
        .or_else(|| mesh.name())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Mesh{}", mesh.index()));

    let mut attrs = Attributes::default();
    let mut faces = Vec::new();

    for primitive in mesh.primitives() {
        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

        let positions: Vec<Vec3> = reader
            .read_positions()
            .with_context(|| format!("No positions in mesh {name}"))?
            .map(Vec3::from)
            .collect();
        let base = attrs.positions.len();
        let count = positions.len();
        attrs.positions.extend(positions);

        pad_and_extend(
            &mut attrs.normals,
            &mut attrs.has_normals,
            base,
            count,
            reader
                .read_normals()
                .map(|iter| iter.map(Vec3::from).collect()),
        );
        // Tangent W (handedness sign) is dropped; only the direction is kept.
        pad_and_extend(
            &mut attrs.tangents,
            &mut attrs.has_tangents,
            base,
            count,
            reader
                .read_tangents()
                .map(|iter| iter.map(|t| Vec3::new(t[0], t[1], t[2])).collect()),
        );
        for set in 0..4u32 {
            pad_and_extend(
                &mut attrs.tex_coords[set as usize],
                &mut attrs.has_tex_coords[set as usize],
                base,
                count,
                reader
                    .read_tex_coords(set)
                    .map(|iter| iter.into_f32().map(Vec2::from).collect()),
            );
        }

        let joints: Option<Vec<[u16; 4]>> =
            reader.read_joints(0).map(|iter| iter.into_u16().collect());
        let weights: Option<Vec<[f32; 4]>> =
            reader.read_weights(0).map(|iter| iter.into_f32().collect());
        match (joints, weights) {
            (Some(j), Some(w)) if j.len() == count && w.len() == count => {
                attrs.joints.resize(base, [0; 4]);
                attrs.weights.resize(base, [0.0; 4]);
                attrs.joints.extend(j);
                attrs.weights.extend(w);
                attrs.has_skin = true;
            }
            (None, None) => {}
            _ => {
                tracing::warn!("Mesh {name} has partial skinning data, ignoring skinning");
            }
        }

        let material_index = primitive
            .material()
            .index()
            .map(|i| i as u32)
            .unwrap_or(NO_MATERIAL);

        // Unindexed primitives use their vertex order directly.
        let indices: Vec<u32> = match reader.read_indices() {
            Some(iter) => iter.into_u32().collect(),
            None => (0..count as u32).collect(),
        };
        for triangle in indices.chunks_exact(3) {
            faces.push(SourceFace {
                material_index,
                indices: triangle.iter().map(|&i| base as u32 + i).collect(),
            });
        }
    }

    let total = attrs.positions.len();
    attrs.joints.resize(total, [0; 4]);
    attrs.weights.resize(total, [0.0; 4]);

    let clusters = match node.skin() {
        Some(skin) if attrs.has_skin => load_clusters(&skin, buffers, document, parents, &attrs)?,
        _ => Vec::new(),
    };

    let tex_coords = std::array::from_fn(|set| {
        attrs.has_tex_coords[set].then(|| std::mem::take(&mut attrs.tex_coords[set]))
    });

    Ok(SourceMesh {
        name,
        positions: attrs.positions,
        normals: attrs.has_normals.then_some(attrs.normals),
        tangents: attrs.has_tangents.then_some(attrs.tangents),
        tex_coords,
        faces,
        clusters,
    })
}

/// Extend `out` with this primitive's values, padding with zeros when a
/// primitive does not carry the attribute other primitives do.
fn pad_and_extend<T: Default + Clone>(
    out: &mut Vec<T>,
    present: &mut bool,
    base: usize,
    count: usize,
    values: Option<Vec<T>>,
) {
    match values {
        Some(values) => {
            out.resize(base, T::default());
            out.extend(values);
            *present = true;
        }
        None => out.resize(base + count, T::default()),
    }
}

/// Invert per-vertex joint/weight slots into one cluster per skin joint.
fn load_clusters(
    skin: &gltf::Skin,
    buffers: &[gltf::buffer::Data],
    document: &gltf::Document,
    parents: &HashMap<usize, usize>,
    attrs: &Attributes,
) -> Result<Vec<SourceCluster>> {
    let reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));
    let inverse_bind: Vec<Mat4> = reader
        .read_inverse_bind_matrices()
        .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
        .unwrap_or_default();

    let joints: Vec<gltf::Node> = skin.joints().collect();
    let joint_set: HashSet<usize> = joints.iter().map(|j| j.index()).collect();

    let mut clusters = Vec::with_capacity(joints.len());
    for (joint_id, joint) in joints.iter().enumerate() {
        let bone_name = joint
            .name()
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Bone{}", joint.index()));

        // Parent name only when the parent node is itself a joint of this
        // skin; the skeleton root's scene ancestry is not part of the rig.
        let parent_name = parents
            .get(&joint.index())
            .filter(|parent| joint_set.contains(*parent))
            .and_then(|&parent| document.nodes().nth(parent))
            .and_then(|n| n.name().map(str::to_owned));

        let mut weights = Vec::new();
        for (vertex, (slots, slot_weights)) in
            attrs.joints.iter().zip(&attrs.weights).enumerate()
        {
            for (slot, &weight) in slot_weights.iter().enumerate() {
                if weight > 0.0 && slots[slot] as usize == joint_id {
                    weights.push((vertex as u32, weight));
                }
            }
        }

        clusters.push(SourceCluster {
            bone_name,
            parent_name,
            inverse_bind_pose: inverse_bind.get(joint_id).copied().unwrap_or(Mat4::IDENTITY),
            node_transform: Mat4::from_cols_array_2d(&joint.transform().matrix()),
            weights,
        });
    }

    Ok(clusters)
}

fn load_animation(
    animation: &gltf::Animation,
    buffers: &[gltf::buffer::Data],
) -> Result<SourceAnimation> {
    let name = animation
        .name()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Animation{}", animation.index()));

    // Channels target nodes one property at a time; regroup them per bone.
    let mut by_node: HashMap<usize, SourceChannel> = HashMap::new();
    let mut order: Vec<usize> = Vec::new();
    let mut duration_ticks: f64 = 0.0;

    for channel in animation.channels() {
        let node = channel.target().node();
        let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));

        let times: Vec<f64> = reader
            .read_inputs()
            .with_context(|| format!("Animation {name} channel has no key times"))?
            .map(f64::from)
            .collect();
        if let Some(&last) = times.last() {
            duration_ticks = duration_ticks.max(last);
        }

        let entry = by_node.entry(node.index()).or_insert_with(|| {
            order.push(node.index());
            SourceChannel {
                bone_name: node
                    .name()
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("Bone{}", node.index())),
                ..Default::default()
            }
        });

        use gltf::animation::util::ReadOutputs;
        match reader
            .read_outputs()
            .with_context(|| format!("Animation {name} channel has no key values"))?
        {
            ReadOutputs::Translations(iter) => {
                entry.position_keys = times.iter().copied().zip(iter.map(Vec3::from)).collect();
            }
            ReadOutputs::Rotations(iter) => {
                entry.rotation_keys = times
                    .iter()
                    .copied()
                    .zip(iter.into_f32().map(Quat::from_array))
                    .collect();
            }
            ReadOutputs::Scales(iter) => {
                entry.scale_keys = times.iter().copied().zip(iter.map(Vec3::from)).collect();
            }
            ReadOutputs::MorphTargetWeights(_) => {
                tracing::warn!("Animation {name} targets morph weights, unsupported, skipping");
            }
        }
    }

    Ok(SourceAnimation {
        name,
        duration_ticks,
        // glTF key times are seconds already.
        ticks_per_second: 1.0,
        channels: order.into_iter().filter_map(|i| by_node.remove(&i)).collect(),
    })
}
