//! Font import
//!
//! Rasterizes a fixed charset at the spec's native size and packs the
//! coverage bitmaps into a square RGBA float atlas on a uniform cell grid.
//! Glyphs are keyed and emitted by codepoint so the payload is byte-stable
//! across runs.

use anyhow::{Context, Result, anyhow, bail};
use glam::{Vec2, Vec4};
use std::collections::BTreeMap;
use std::fs;

use kit_common::{Stream, asset::class, write_asset};

use crate::spec::FontSpec;

/// Printable ASCII. Codepoints outside this set fall back to the engine's
/// missing-glyph box at draw time.
fn charset() -> impl Iterator<Item = char> {
    ' '..='~'
}

struct Glyph {
    advance: Vec2,
    /// Offset from the pen position to the bitmap origin.
    placement: Vec2,
    size: Vec2,
    /// Atlas rectangle as (u0, v0, u1, v1).
    uv: Vec4,
}

struct RasterGlyph {
    metrics: fontdue::Metrics,
    coverage: Vec<u8>,
}

/// Side length of the square cell grid holding `count` glyphs.
fn grid_side(count: usize) -> usize {
    (count as f64).sqrt().ceil() as usize
}

pub fn import_font(spec: &FontSpec) -> Result<()> {
    if !(spec.native_size.is_finite() && spec.native_size > 0.0) {
        bail!("native_size {} out of range (must be positive)", spec.native_size);
    }

    let bytes = fs::read(&spec.source_file)
        .with_context(|| format!("Failed to read font {:?}", spec.source_file))?;
    let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
        .map_err(|e| anyhow!("Failed to parse font {:?}: {e}", spec.source_file))?;

    // BTreeMap iteration gives codepoint order everywhere below.
    let mut rasterized: BTreeMap<u32, RasterGlyph> = BTreeMap::new();
    for c in charset() {
        let (metrics, coverage) = font.rasterize(c, spec.native_size);
        rasterized.insert(c as u32, RasterGlyph { metrics, coverage });
    }

    // Uniform cells sized to the largest bitmap, at least the native size.
    let mut cell = spec.native_size.ceil() as usize;
    for glyph in rasterized.values() {
        cell = cell.max(glyph.metrics.width).max(glyph.metrics.height);
    }

    let grid = grid_side(rasterized.len());
    let atlas_size = grid * cell;
    let mut atlas = vec![0.0f32; atlas_size * atlas_size * 4];

    let mut glyphs: BTreeMap<u32, Glyph> = BTreeMap::new();
    for (slot, (&codepoint, raster)) in rasterized.iter().enumerate() {
        let cell_x = (slot % grid) * cell;
        let cell_y = (slot / grid) * cell;

        let m = &raster.metrics;
        for row in 0..m.height {
            for col in 0..m.width {
                let value = raster.coverage[row * m.width + col] as f32 / 255.0;
                let pixel = ((cell_y + row) * atlas_size + cell_x + col) * 4;
                atlas[pixel..pixel + 4].fill(value);
            }
        }

        let scale = 1.0 / atlas_size as f32;
        glyphs.insert(
            codepoint,
            Glyph {
                advance: Vec2::new(m.advance_width, m.advance_height),
                placement: Vec2::new(m.xmin as f32, m.ymin as f32),
                size: Vec2::new(m.width as f32, m.height as f32),
                uv: Vec4::new(
                    cell_x as f32 * scale,
                    cell_y as f32 * scale,
                    (cell_x + m.width) as f32 * scale,
                    (cell_y + m.height) as f32 * scale,
                ),
            },
        );
    }

    let mut payload = Stream::new();
    payload.write_u16(glyphs.len() as u16);
    for (&codepoint, glyph) in &glyphs {
        payload.write_u32(codepoint);
        payload.write_vec2(glyph.advance);
        payload.write_vec2(glyph.placement);
        payload.write_vec2(glyph.size);
        payload.write_vec4(glyph.uv);
    }
    payload.write_f32(spec.native_size);
    payload.write_u32(atlas_size as u32);
    payload.write_u32(atlas_size as u32);
    let atlas_bytes: &[u8] = bytemuck::cast_slice(&atlas);
    payload.write_u64(atlas_bytes.len() as u64);
    payload.write_bytes(atlas_bytes);

    tracing::info!(
        "Imported font {:?}: {} glyphs, {}px atlas",
        spec.source_file,
        glyphs.len(),
        atlas_size
    );

    write_asset(&spec.output_file, class::FONT, &payload)
}
