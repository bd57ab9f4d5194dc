//! Material asset creation
//!
//! Materials are tiny: a class name naming the engine-side instance type,
//! plus a length-prefixed instance block that type knows how to decode.
//! The default material's block is five texture paths; an empty material
//! carries no block at all.

use anyhow::Result;

use kit_common::{Stream, asset::class, write_asset};

use crate::spec::{EmptyMaterialSpec, MaterialSpec};

/// Instance class of the engine's standard five-texture material.
pub const DEFAULT_MATERIAL_CLASS: &str = "kit::DefaultMaterial";

pub fn create_default_material(spec: &MaterialSpec) -> Result<()> {
    let mut instance = Stream::new();
    instance.write_str(&spec.albedo);
    instance.write_str(&spec.normal);
    instance.write_str(&spec.metalness);
    instance.write_str(&spec.occlusion);
    instance.write_str(&spec.roughness);

    let mut payload = Stream::new();
    payload.write_str(DEFAULT_MATERIAL_CLASS);
    payload.write_stream(&instance);

    tracing::info!("Created default material {:?}", spec.output_file);
    write_asset(&spec.output_file, class::MATERIAL, &payload)
}

pub fn create_empty_material(spec: &EmptyMaterialSpec) -> Result<()> {
    let mut payload = Stream::new();
    payload.write_str(&spec.material_class);
    payload.write_u64(0);

    tracing::info!(
        "Created empty material {:?} ({})",
        spec.output_file,
        spec.material_class
    );
    write_asset(&spec.output_file, class::MATERIAL, &payload)
}
