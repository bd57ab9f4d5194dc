//! Payload baking
//!
//! Serializes the intermediate document into asset payload streams:
//! render meshes with vertex dedup under the serialized attribute set,
//! position-only physics meshes, skeletons and animation clips. Baking is
//! pure; the callers in `mesh.rs` wrap payloads in containers and write
//! files.

use anyhow::{Result, bail};
use glam::Vec3;
use hashbrown::HashMap;

use kit_common::Stream;

use crate::document::{Animation, IndexFlags, Skeleton, Submesh, Track, Vertex, VertexFlags};

/// Bit-exact key over the attributes that will actually be serialized.
/// Attributes masked out by `flags` do not participate, so two vertices
/// differing only in an unserialized attribute collapse into one.
fn vertex_key(v: &Vertex, flags: VertexFlags) -> Vec<u32> {
    let mut key = Vec::with_capacity(26);
    key.extend(v.position.to_array().map(f32::to_bits));
    if flags.contains(VertexFlags::NORMAL) {
        key.extend(v.normal.to_array().map(f32::to_bits));
    }
    if flags.contains(VertexFlags::TANGENT) {
        key.extend(v.tangent.to_array().map(f32::to_bits));
    }
    const TEX_FLAGS: [VertexFlags; 4] = [
        VertexFlags::TEX_COORDS_1,
        VertexFlags::TEX_COORDS_2,
        VertexFlags::TEX_COORDS_3,
        VertexFlags::TEX_COORDS_4,
    ];
    for (set, flag) in TEX_FLAGS.iter().enumerate() {
        if flags.contains(*flag) {
            key.extend(v.tex_coords[set].to_array().map(f32::to_bits));
        }
    }
    if flags.contains(VertexFlags::BONES) {
        key.extend(v.bones);
        key.extend(v.weights.map(f32::to_bits));
    }
    key
}

/// Deduplicated vertex list plus a remap from old index to new.
fn dedup_vertices(vertices: &[Vertex], flags: VertexFlags) -> (Vec<Vertex>, Vec<u32>) {
    let mut unique = Vec::with_capacity(vertices.len());
    let mut remap = Vec::with_capacity(vertices.len());
    let mut seen: HashMap<Vec<u32>, u32> = HashMap::with_capacity(vertices.len());

    for v in vertices {
        let next = unique.len() as u32;
        let id = *seen.entry(vertex_key(v, flags)).or_insert_with(|| {
            unique.push(*v);
            next
        });
        remap.push(id);
    }

    (unique, remap)
}

fn write_vertex(out: &mut Stream, v: &Vertex, flags: VertexFlags) {
    out.write_vec4(v.position);
    if flags.contains(VertexFlags::NORMAL) {
        out.write_vec3(v.normal);
    }
    if flags.contains(VertexFlags::TANGENT) {
        out.write_vec3(v.tangent);
    }
    const TEX_FLAGS: [VertexFlags; 4] = [
        VertexFlags::TEX_COORDS_1,
        VertexFlags::TEX_COORDS_2,
        VertexFlags::TEX_COORDS_3,
        VertexFlags::TEX_COORDS_4,
    ];
    for (set, flag) in TEX_FLAGS.iter().enumerate() {
        if flags.contains(*flag) {
            out.write_vec2(v.tex_coords[set]);
        }
    }
    if flags.contains(VertexFlags::BONES) {
        for bone in v.bones {
            out.write_u32(bone);
        }
        for weight in v.weights {
            out.write_f32(weight);
        }
    }
}

/// Bake one submesh into a render-mesh payload. `vertex_flags` and
/// `index_flags` are the post-intersection set actually serialized.
pub fn bake_submesh(
    submesh: &Submesh,
    vertex_flags: VertexFlags,
    index_flags: IndexFlags,
) -> Stream {
    let (vertices, remap) = dedup_vertices(&submesh.vertices, vertex_flags);

    let mut out = Stream::new();
    out.write_str(&submesh.material_path);
    out.write_u32(vertex_flags.bits());
    out.write_u32(index_flags.bits());

    out.write_u64(vertices.len() as u64);
    for v in &vertices {
        write_vertex(&mut out, v, vertex_flags);
    }

    out.write_u64(submesh.indices.len() as u64);
    for &index in &submesh.indices {
        let index = remap[index as usize];
        if index_flags.contains(IndexFlags::USE_16BIT) {
            out.write_u16(index as u16);
        } else {
            out.write_u32(index);
        }
    }

    out
}

/// Expand the index list into explicit collision triangles.
pub fn generate_triangles(submesh: &mut Submesh) {
    submesh.triangles = submesh
        .indices
        .chunks_exact(3)
        .map(|tri| {
            [
                submesh.vertices[tri[0] as usize].position.truncate(),
                submesh.vertices[tri[1] as usize].position.truncate(),
                submesh.vertices[tri[2] as usize].position.truncate(),
            ]
        })
        .collect();
}

/// Bake collision triangles into a position-only physics payload. Requires
/// `generate_triangles` to have run.
pub fn bake_physics_submesh(submesh: &Submesh) -> Result<Stream> {
    if submesh.triangles.is_empty() {
        bail!("Submesh has no collision triangles, run triangle generation first");
    }

    // Positions dedup on their own, untied from render attributes.
    let mut positions: Vec<Vec3> = Vec::new();
    let mut seen: HashMap<[u32; 3], u32> = HashMap::new();
    let mut indices: Vec<u32> = Vec::with_capacity(submesh.triangles.len() * 3);

    for triangle in &submesh.triangles {
        for &corner in triangle {
            let next = positions.len() as u32;
            let id = *seen
                .entry(corner.to_array().map(f32::to_bits))
                .or_insert_with(|| {
                    positions.push(corner);
                    next
                });
            indices.push(id);
        }
    }

    let mut out = Stream::new();
    out.write_u64(positions.len() as u64);
    for p in &positions {
        out.write_vec3(*p);
    }
    out.write_u64(indices.len() as u64);
    for i in indices {
        out.write_u32(i);
    }

    Ok(out)
}

/// Bake a skeleton: bones in arena order, each naming its parent by arena
/// index (-1 for roots).
pub fn bake_skeleton(skeleton: &Skeleton) -> Stream {
    let mut out = Stream::new();
    out.write_str(&skeleton.name);
    out.write_u64(skeleton.bone_count() as u64);
    for bone in skeleton.bones() {
        out.write_str(&bone.name);
        out.write_i64(bone.parent.map(|p| p.0 as i64).unwrap_or(-1));
        out.write_mat4(bone.inverse_bind_pose);
        out.write_mat4(bone.initial_transform);
    }
    out
}

fn write_track<T: Copy>(out: &mut Stream, track: &Track<T>, mut write: impl FnMut(&mut Stream, T)) {
    out.write_u64(track.keys.len() as u64);
    for key in &track.keys {
        out.write_f32(key.time);
        write(out, key.value);
    }
}

pub fn bake_animation(animation: &Animation) -> Stream {
    let mut out = Stream::new();
    out.write_str(&animation.name);
    out.write_f32(animation.duration);
    out.write_u64(animation.channels.len() as u64);
    for channel in &animation.channels {
        out.write_str(&channel.name);
        write_track(&mut out, &channel.translation, Stream::write_vec3);
        write_track(&mut out, &channel.rotation, Stream::write_quat);
        write_track(&mut out, &channel.scale, Stream::write_vec3);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{AnimationChannel, Key};
    use glam::{Mat4, Quat, Vec2, Vec4};

    fn flat_quad() -> Submesh {
        // Two triangles sharing an edge, every corner duplicated per face.
        let corners = [
            Vec4::new(0.0, 0.0, 0.0, 1.0),
            Vec4::new(1.0, 0.0, 0.0, 1.0),
            Vec4::new(1.0, 1.0, 0.0, 1.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
            Vec4::new(1.0, 1.0, 0.0, 1.0),
            Vec4::new(0.0, 1.0, 0.0, 1.0),
        ];
        let mut submesh = Submesh::new("M");
        for position in corners {
            submesh.vertices.push(Vertex {
                position,
                ..Default::default()
            });
        }
        submesh.indices = (0..6).collect();
        submesh
    }

    #[test]
    fn dedup_of_distinct_vertices_is_identity() {
        let mut submesh = Submesh::new("M");
        for i in 0..8 {
            submesh.vertices.push(Vertex {
                position: Vec4::new(i as f32, 0.0, 0.0, 1.0),
                normal: Vec3::new(0.0, 1.0, 0.0),
                ..Default::default()
            });
        }

        let (unique, remap) = dedup_vertices(&submesh.vertices, VertexFlags::NORMAL);

        assert_eq!(unique.len(), submesh.vertices.len());
        assert_eq!(remap, (0..8).collect::<Vec<u32>>());
    }

    #[test]
    fn sixteen_bit_index_boundary() {
        use crate::importer::index_flags_for;

        assert_eq!(index_flags_for(65535), IndexFlags::USE_16BIT);
        assert_eq!(index_flags_for(65536), IndexFlags::empty());
    }

    #[test]
    fn dedup_merges_shared_corners() {
        let submesh = flat_quad();
        let (unique, remap) = dedup_vertices(&submesh.vertices, VertexFlags::empty());

        assert_eq!(unique.len(), 4);
        assert_eq!(remap, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn dedup_ignores_masked_attributes() {
        let mut submesh = flat_quad();
        // Distinct UVs on otherwise equal corners.
        submesh.vertices[0].tex_coords[0] = Vec2::new(0.0, 0.0);
        submesh.vertices[3].tex_coords[0] = Vec2::new(0.5, 0.5);

        let (without, _) = dedup_vertices(&submesh.vertices, VertexFlags::empty());
        let (with, _) = dedup_vertices(&submesh.vertices, VertexFlags::TEX_COORDS_1);

        assert_eq!(without.len(), 4);
        assert_eq!(with.len(), 5);
    }

    #[test]
    fn baked_submesh_preserves_winding() {
        let submesh = flat_quad();
        let mut payload = bake_submesh(&submesh, VertexFlags::empty(), IndexFlags::USE_16BIT);

        assert_eq!(payload.read_str().unwrap(), "M");
        assert_eq!(payload.read_u32().unwrap(), 0);
        assert_eq!(payload.read_u32().unwrap(), IndexFlags::USE_16BIT.bits());

        let vertex_count = payload.read_u64().unwrap();
        assert_eq!(vertex_count, 4);
        let mut positions = Vec::new();
        for _ in 0..vertex_count {
            positions.push(payload.read_vec4().unwrap());
        }

        let index_count = payload.read_u64().unwrap();
        assert_eq!(index_count, 6);
        let indices: Vec<u16> = (0..index_count)
            .map(|_| payload.read_u16().unwrap())
            .collect();

        // Same triangles, same order, through the remap.
        assert_eq!(indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(positions[0], Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(positions[3], Vec4::new(0.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn wide_indices_serialize_as_u32() {
        let submesh = flat_quad();
        let mut payload = bake_submesh(&submesh, VertexFlags::empty(), IndexFlags::empty());

        payload.read_str().unwrap();
        payload.read_u32().unwrap();
        payload.read_u32().unwrap();
        let vertex_count = payload.read_u64().unwrap();
        for _ in 0..vertex_count {
            payload.read_vec4().unwrap();
        }
        let index_count = payload.read_u64().unwrap();
        assert_eq!(index_count, 6);
        for expected in [0u32, 1, 2, 0, 2, 3] {
            assert_eq!(payload.read_u32().unwrap(), expected);
        }
    }

    #[test]
    fn physics_bake_requires_triangles() {
        let submesh = flat_quad();
        assert!(bake_physics_submesh(&submesh).is_err());
    }

    #[test]
    fn physics_bake_dedups_positions() {
        let mut submesh = flat_quad();
        generate_triangles(&mut submesh);

        let mut payload = bake_physics_submesh(&submesh).unwrap();
        assert_eq!(payload.read_u64().unwrap(), 4);
        for _ in 0..4 {
            payload.read_vec3().unwrap();
        }
        assert_eq!(payload.read_u64().unwrap(), 6);
    }

    #[test]
    fn skeleton_bake_round_trips() {
        let mut skeleton = Skeleton::default();
        skeleton.name = "Figure".to_owned();
        let root = skeleton.add_bone("Root", Mat4::IDENTITY, Mat4::IDENTITY);
        let arm = skeleton.add_bone("Arm", Mat4::IDENTITY, Mat4::IDENTITY);
        skeleton.set_parent(arm, root);
        skeleton.root_bones.push(root);

        let mut payload = bake_skeleton(&skeleton);
        assert_eq!(payload.read_str().unwrap(), "Figure");
        assert_eq!(payload.read_u64().unwrap(), 2);

        assert_eq!(payload.read_str().unwrap(), "Root");
        assert_eq!(payload.read_i64().unwrap(), -1);
        payload.read_mat4().unwrap();
        payload.read_mat4().unwrap();

        assert_eq!(payload.read_str().unwrap(), "Arm");
        assert_eq!(payload.read_i64().unwrap(), 0);
    }

    #[test]
    fn animation_bake_round_trips() {
        let animation = Animation {
            name: "Figure_Walk".to_owned(),
            duration: 2.0,
            channels: vec![AnimationChannel {
                name: "Root".to_owned(),
                translation: Track {
                    keys: vec![Key {
                        time: 0.5,
                        value: Vec3::new(1.0, 2.0, 3.0),
                    }],
                },
                rotation: Track {
                    keys: vec![Key {
                        time: 0.5,
                        value: Quat::IDENTITY,
                    }],
                },
                scale: Track { keys: Vec::new() },
            }],
        };

        let mut payload = bake_animation(&animation);
        assert_eq!(payload.read_str().unwrap(), "Figure_Walk");
        assert_eq!(payload.read_f32().unwrap(), 2.0);
        assert_eq!(payload.read_u64().unwrap(), 1);
        assert_eq!(payload.read_str().unwrap(), "Root");

        assert_eq!(payload.read_u64().unwrap(), 1);
        assert_eq!(payload.read_f32().unwrap(), 0.5);
        assert_eq!(payload.read_vec3().unwrap(), Vec3::new(1.0, 2.0, 3.0));

        assert_eq!(payload.read_u64().unwrap(), 1);
        payload.read_f32().unwrap();
        assert_eq!(payload.read_quat().unwrap(), Quat::IDENTITY);

        assert_eq!(payload.read_u64().unwrap(), 0);
    }
}
