//! Kit `.asset` container codec
//!
//! Wraps an arbitrary serialized payload with a fixed magic, a format
//! version, an asset class tag and LZ4 block compression.
//!
//! # Layout
//! ```text
//! 0x00: magic              12 bytes, "KitAsset;)<3"
//! 0x0C: version            u64 (currently 0)
//! 0x14: asset class        u64 byte count + UTF-8 bytes
//! var:  uncompressed size  u64
//! var:  compressed payload u64 byte count + LZ4 block data
//! ```
//!
//! A reader must validate the magic before trusting the rest of the header,
//! and must reject unrecognized versions outright.

use std::path::Path;

use anyhow::{Context, Result};

use crate::stream::{Stream, StreamError};

/// First 12 bytes of every Kit asset file.
pub const ASSET_MAGIC: &[u8; 12] = b"KitAsset;)<3";

/// Current container format version.
pub const ASSET_VERSION: u64 = 0;

/// Asset class tags. The class string tells a consumer which payload schema
/// to decode; it carries no other meaning.
pub mod class {
    pub const MESH: &str = "kit::Mesh";
    pub const PHYSICS_MESH: &str = "kit::PhysicsMesh";
    pub const SKELETON: &str = "kit::Skeleton";
    pub const ANIMATION: &str = "kit::Animation";
    pub const TEXTURE: &str = "kit::Texture";
    pub const FONT: &str = "kit::Font";
    pub const MATERIAL: &str = "kit::Material";
    pub const SHADER_MODULE: &str = "kit::ShaderModule";
}

/// Errors produced when decoding an asset container.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("bad magic bytes, not a Kit asset")]
    BadMagic,

    #[error("unsupported asset version {0}")]
    UnsupportedVersion(u64),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Build the container bytes for `payload` under the given asset class.
pub fn encode_asset(asset_class: &str, payload: &Stream) -> Stream {
    let compressed = payload.compress();

    let mut out = Stream::new();
    out.write_bytes(ASSET_MAGIC);
    out.write_u64(ASSET_VERSION);
    out.write_str(asset_class);
    out.write_u64(payload.len() as u64);
    out.write_stream(&compressed);
    out
}

/// Decode a container, returning the asset class tag and the decompressed
/// payload stream.
pub fn decode_asset(bytes: &[u8]) -> Result<(String, Stream), AssetError> {
    let mut s = Stream::from_bytes(bytes.to_vec());

    let magic = s.read_bytes(ASSET_MAGIC.len())?;
    if magic != ASSET_MAGIC {
        return Err(AssetError::BadMagic);
    }

    let version = s.read_u64()?;
    if version != ASSET_VERSION {
        return Err(AssetError::UnsupportedVersion(version));
    }

    let asset_class = s.read_str()?;
    let uncompressed_size = s.read_u64()? as usize;
    let compressed = s.read_stream()?;

    let payload = compressed.decompress(uncompressed_size)?;
    Ok((asset_class, payload))
}

/// Encode `payload` and write it to `path`, creating parent directories as
/// needed. Overwrites any existing file at `path` without confirmation.
///
/// Partial files left behind by a failed write are an accepted risk.
pub fn write_asset(path: &Path, asset_class: &str, payload: &Stream) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create path for output file: {:?}", path))?;
    }

    let container = encode_asset(asset_class, payload);
    std::fs::write(path, container.as_bytes())
        .with_context(|| format!("Failed to write asset: {:?}", path))?;

    tracing::info!("Wrote asset {:?} ({})", path, asset_class);
    Ok(())
}

/// Read and decode the asset file at `path`.
pub fn read_asset(path: &Path) -> Result<(String, Stream)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read asset: {:?}", path))?;
    decode_asset(&bytes).with_context(|| format!("Failed to decode asset: {:?}", path))
}
