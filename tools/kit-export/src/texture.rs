//! Texture import
//!
//! Decodes source images into raw RGBA payloads plus sampling state. LDR
//! sources become 8-bit RGBA tagged with their colorspace; `.hdr` sources
//! keep full float range as RGBA32F. Pre-authored mip levels append after
//! the base image.

use anyhow::{Context, Result, bail};
use std::path::Path;

use kit_common::{Stream, asset::class, write_asset};

use crate::spec::TextureSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8Srgb,
    Rgba8Linear,
    Rgba32Float,
}

impl TextureFormat {
    pub fn to_u32(self) -> u32 {
        match self {
            TextureFormat::Rgba8Srgb => 0,
            TextureFormat::Rgba8Linear => 1,
            TextureFormat::Rgba32Float => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Bilinear,
    Trilinear,
    Anisotropic,
}

impl Filter {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "nearest" => Ok(Filter::Nearest),
            "bilinear" => Ok(Filter::Bilinear),
            "trilinear" => Ok(Filter::Trilinear),
            "anisotropic" => Ok(Filter::Anisotropic),
            other => bail!(
                "Unknown filter {:?} (expected nearest, bilinear, trilinear or anisotropic)",
                other
            ),
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            Filter::Nearest => 0,
            Filter::Bilinear => 1,
            Filter::Trilinear => 2,
            Filter::Anisotropic => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSampling {
    Clamp,
    ClampMirrored,
    Repeat,
    RepeatMirrored,
}

impl EdgeSampling {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "clamp" => Ok(EdgeSampling::Clamp),
            "clamp-mirrored" => Ok(EdgeSampling::ClampMirrored),
            "repeat" => Ok(EdgeSampling::Repeat),
            "repeat-mirrored" => Ok(EdgeSampling::RepeatMirrored),
            other => bail!(
                "Unknown edge sampling {:?} (expected clamp, clamp-mirrored, repeat or repeat-mirrored)",
                other
            ),
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            EdgeSampling::Clamp => 0,
            EdgeSampling::ClampMirrored => 1,
            EdgeSampling::Repeat => 2,
            EdgeSampling::RepeatMirrored => 3,
        }
    }
}

fn parse_colorspace(s: &str) -> Result<bool> {
    match s {
        "srgb" => Ok(true),
        "linear" => Ok(false),
        other => bail!("Unknown colorspace {:?} (expected srgb or linear)", other),
    }
}

fn is_hdr(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("hdr"))
}

/// One decoded image level: raw RGBA bytes plus pixel dimensions.
struct Level {
    width: u32,
    height: u32,
    bytes: Vec<u8>,
}

fn decode_level(path: &Path, format: TextureFormat) -> Result<Level> {
    let img = image::open(path).with_context(|| format!("Failed to load image {:?}", path))?;
    Ok(match format {
        TextureFormat::Rgba32Float => {
            let img = img.to_rgba32f();
            Level {
                width: img.width(),
                height: img.height(),
                bytes: bytemuck::cast_slice(img.as_raw()).to_vec(),
            }
        }
        _ => {
            let img = img.to_rgba8();
            Level {
                width: img.width(),
                height: img.height(),
                bytes: img.into_raw(),
            }
        }
    })
}

pub fn import_texture(spec: &TextureSpec) -> Result<()> {
    let srgb = parse_colorspace(&spec.colorspace)?;
    let filter = Filter::parse(&spec.filter)?;
    let edge = EdgeSampling::parse(&spec.edge_sampling)?;
    if !(1.0..=16.0).contains(&spec.max_anisotropy) {
        bail!(
            "max_anisotropy {} out of range (expected 1 to 16)",
            spec.max_anisotropy
        );
    }

    let format = if is_hdr(&spec.source_file) {
        TextureFormat::Rgba32Float
    } else if srgb {
        TextureFormat::Rgba8Srgb
    } else {
        TextureFormat::Rgba8Linear
    };

    let base = decode_level(&spec.source_file, format)?;
    let mut levels = vec![base];
    for path in &spec.levels {
        let level = decode_level(path, format)?;
        let previous = levels.last().unwrap();
        if level.width > previous.width || level.height > previous.height {
            bail!(
                "Mip level {:?} ({}x{}) is larger than the level before it ({}x{})",
                path,
                level.width,
                level.height,
                previous.width,
                previous.height
            );
        }
        levels.push(level);
    }

    let mut payload = Stream::new();
    payload.write_u32(format.to_u32());
    payload.write_u32(levels[0].width);
    payload.write_u32(levels[0].height);
    payload.write_u32(levels.len() as u32);
    payload.write_u32(filter.to_u32());
    payload.write_u32(edge.to_u32());
    payload.write_f32(spec.max_anisotropy);
    for level in &levels {
        payload.write_u64(level.bytes.len() as u64);
        payload.write_bytes(&level.bytes);
    }

    tracing::info!(
        "Imported texture {:?}: {}x{}, {} levels",
        spec.source_file,
        levels[0].width,
        levels[0].height,
        levels.len()
    );

    write_asset(&spec.output_file, class::TEXTURE, &payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kit_common::read_asset;
    use std::path::PathBuf;

    #[test]
    fn sampler_options_parse() {
        assert_eq!(Filter::parse("nearest").unwrap(), Filter::Nearest);
        assert_eq!(Filter::parse("trilinear").unwrap(), Filter::Trilinear);
        assert_eq!(
            EdgeSampling::parse("repeat-mirrored").unwrap(),
            EdgeSampling::RepeatMirrored
        );
        assert!(Filter::parse("cubic").is_err());
        assert!(EdgeSampling::parse("wrap").is_err());
        assert!(parse_colorspace("gamma").is_err());
    }

    #[test]
    fn hdr_detection_is_extension_based() {
        assert!(is_hdr(Path::new("sky.hdr")));
        assert!(is_hdr(Path::new("sky.HDR")));
        assert!(!is_hdr(Path::new("sky.png")));
    }

    #[test]
    fn png_imports_as_rgba8() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("checker.png");
        let output = dir.path().join("Texture_Checker.asset");

        let mut img = image::RgbaImage::new(2, 2);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 1, image::Rgba([0, 0, 255, 255]));
        img.save(&source).unwrap();

        let spec = TextureSpec {
            source_file: source,
            output_file: output.clone(),
            colorspace: "linear".to_owned(),
            filter: "nearest".to_owned(),
            edge_sampling: "repeat".to_owned(),
            max_anisotropy: 1.0,
            levels: Vec::new(),
        };
        import_texture(&spec).unwrap();

        let (asset_class, mut payload) = read_asset(&output).unwrap();
        assert_eq!(asset_class, class::TEXTURE);
        assert_eq!(payload.read_u32().unwrap(), TextureFormat::Rgba8Linear.to_u32());
        assert_eq!(payload.read_u32().unwrap(), 2);
        assert_eq!(payload.read_u32().unwrap(), 2);
        assert_eq!(payload.read_u32().unwrap(), 1);
        assert_eq!(payload.read_u32().unwrap(), Filter::Nearest.to_u32());
        assert_eq!(payload.read_u32().unwrap(), EdgeSampling::Repeat.to_u32());
        assert_eq!(payload.read_f32().unwrap(), 1.0);

        let len = payload.read_u64().unwrap() as usize;
        assert_eq!(len, 2 * 2 * 4);
        let bytes = payload.read_bytes(len).unwrap();
        assert_eq!(&bytes[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn oversized_mip_level_fails() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.png");
        let big = dir.path().join("big.png");
        image::RgbaImage::new(2, 2).save(&base).unwrap();
        image::RgbaImage::new(4, 4).save(&big).unwrap();

        let spec = TextureSpec {
            source_file: base,
            output_file: dir.path().join("out.asset"),
            colorspace: "srgb".to_owned(),
            filter: "anisotropic".to_owned(),
            edge_sampling: "clamp".to_owned(),
            max_anisotropy: 16.0,
            levels: vec![big],
        };
        assert!(import_texture(&spec).is_err());
    }

    #[test]
    fn missing_source_reports_path() {
        let spec = TextureSpec {
            source_file: PathBuf::from("/nonexistent/x.png"),
            output_file: PathBuf::from("/nonexistent/out.asset"),
            colorspace: "srgb".to_owned(),
            filter: "anisotropic".to_owned(),
            edge_sampling: "clamp".to_owned(),
            max_anisotropy: 16.0,
            levels: Vec::new(),
        };
        let err = import_texture(&spec).unwrap_err();
        assert!(format!("{err:#}").contains("x.png"));
    }
}
