//! Shader module compilation
//!
//! Shells out to `glslangValidator` to compile GLSL to SPIR-V, then wraps
//! the binary with its pipeline stage mask. The stage comes from the source
//! file extension, matching what the compiler itself infers.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::{env, fs};

use kit_common::{Stream, asset::class, write_asset};

const COMPILER: &str = "glslangValidator";

/// Stage bit for a shader source extension. Values match the engine's
/// pipeline stage flags.
fn stage_mask(extension: &str) -> Result<i64> {
    Ok(match extension {
        "vert" => 0x1,
        "tesc" => 0x2,
        "tese" => 0x4,
        "geom" => 0x8,
        "frag" => 0x10,
        "comp" => 0x20,
        other => bail!(
            "Unknown shader stage extension {:?} (expected vert, tesc, tese, geom, frag or comp)",
            other
        ),
    })
}

/// Locate the compiler on PATH, falling back to the Vulkan SDK directory.
fn find_compiler() -> Result<PathBuf> {
    if let Ok(path) = which::which(COMPILER) {
        return Ok(path);
    }
    if let Ok(sdk) = env::var("VULKAN_SDK") {
        let candidate = Path::new(&sdk).join("bin").join(COMPILER);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    bail!("{COMPILER} not found on PATH or under $VULKAN_SDK/bin")
}

pub fn create_shader_module(source: &Path, output: &Path) -> Result<()> {
    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .with_context(|| format!("Shader source {:?} has no stage extension", source))?;
    let mask = stage_mask(extension)?;

    let compiler = find_compiler()?;
    let spv_dir = tempfile::tempdir().context("Failed to create temp dir for SPIR-V output")?;
    let spv_path = spv_dir.path().join("module.spv");

    let result = Command::new(&compiler)
        .arg("-V")
        .arg(source)
        .arg("-o")
        .arg(&spv_path)
        .output()
        .with_context(|| format!("Failed to run {:?}", compiler))?;
    if !result.status.success() {
        bail!(
            "Shader compilation failed for {:?}:\n{}{}",
            source,
            String::from_utf8_lossy(&result.stdout),
            String::from_utf8_lossy(&result.stderr)
        );
    }

    let spv = fs::read(&spv_path)
        .with_context(|| format!("Failed to read compiled SPIR-V for {:?}", source))?;

    let mut payload = Stream::new();
    payload.write_i64(mask);
    payload.write_u64(spv.len() as u64);
    payload.write_bytes(&spv);

    tracing::info!(
        "Compiled shader {:?}: stage mask {:#x}, {} bytes of SPIR-V",
        source,
        mask,
        spv.len()
    );

    write_asset(output, class::SHADER_MODULE, &payload)
}
