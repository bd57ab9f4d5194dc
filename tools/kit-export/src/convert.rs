//! Author-space to engine-space conversion
//!
//! The authoring convention (right-handed, Z-up) differs from the engine's,
//! so every imported vector, quaternion and matrix gets remapped: Y and Z
//! swap with `y' = -z, z' = y`. Matrices cannot be converted per-element
//! when handedness changes; they are decomposed into scale, rotation and
//! translation, each component converted, then recomposed as `T * R * S`.

use glam::{Mat4, Quat, Vec2, Vec3};

use crate::document::Vertex;

/// Axis remap for positions, translations and directions.
pub fn vec3_to_engine(v: Vec3) -> Vec3 {
    Vec3::new(v.x, -v.z, v.y)
}

/// Inverse of [`vec3_to_engine`].
pub fn vec3_from_engine(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.z, -v.y)
}

/// Scale factors swap axes without negation.
pub fn scale_to_engine(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.z, v.y)
}

/// Normals get the axis remap plus a final full negation.
pub fn normal_to_engine(v: Vec3) -> Vec3 {
    -vec3_to_engine(v)
}

/// UVs flip the V axis.
pub fn uv_to_engine(uv: Vec2) -> Vec2 {
    Vec2::new(uv.x, 1.0 - uv.y)
}

/// Quaternions remap the vector part like [`vec3_to_engine`], preserving
/// the scalar part.
pub fn quat_to_engine(q: Quat) -> Quat {
    Quat::from_xyzw(q.x, -q.z, q.y, q.w)
}

/// Decompose, convert each component, recompose as `T * R * S`.
pub fn mat4_to_engine(m: Mat4) -> Mat4 {
    let (scale, rotation, translation) = m.to_scale_rotation_translation();
    Mat4::from_scale_rotation_translation(
        scale_to_engine(scale),
        quat_to_engine(rotation),
        vec3_to_engine(translation),
    )
}

/// Convert every attribute of a vertex in place.
pub fn vertex_to_engine(v: &mut Vertex) {
    let p = vec3_to_engine(v.position.truncate());
    v.position = p.extend(1.0);
    v.normal = normal_to_engine(v.normal);
    v.tangent = vec3_to_engine(v.tangent);
    for uv in v.tex_coords.iter_mut() {
        *uv = uv_to_engine(*uv);
    }
}
