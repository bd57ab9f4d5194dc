//! Import specifications
//!
//! A `.import` file is a TOML document sitting next to (or pointed at) a
//! source asset, with exactly one top-level table naming the asset kind.
//! Everything but the source path has a default, so a minimal spec is two
//! lines.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::document::{IndexFlags, VertexFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecKind {
    Mesh,
    Texture,
    Font,
    Material,
    EmptyMaterial,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture: Option<TextureSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<FontSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<MaterialSpec>,
    #[serde(rename = "empty-material", skip_serializing_if = "Option::is_none")]
    pub empty_material: Option<EmptyMaterialSpec>,
}

impl ImportSpec {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read import spec {:?}", path))?;
        let spec: ImportSpec = toml::from_str(&text)
            .with_context(|| format!("Failed to parse import spec {:?}", path))?;
        spec.kind()?;
        Ok(spec)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).context("Failed to serialize import spec")?;
        fs::write(path, text).with_context(|| format!("Failed to write import spec {:?}", path))
    }

    /// A fresh mesh spec with every option at its default.
    pub fn default_mesh(source_file: PathBuf) -> Self {
        Self {
            mesh: Some(MeshSpec {
                source_file,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// The one kind this spec describes. More or fewer than one table is an
    /// error.
    pub fn kind(&self) -> Result<SpecKind> {
        let kinds = [
            self.mesh.as_ref().map(|_| SpecKind::Mesh),
            self.texture.as_ref().map(|_| SpecKind::Texture),
            self.font.as_ref().map(|_| SpecKind::Font),
            self.material.as_ref().map(|_| SpecKind::Material),
            self.empty_material.as_ref().map(|_| SpecKind::EmptyMaterial),
        ];
        let mut present = kinds.into_iter().flatten();
        match (present.next(), present.next()) {
            (Some(kind), None) => Ok(kind),
            (None, _) => bail!(
                "Import spec has no asset table (expected one of mesh, texture, font, material, empty-material)"
            ),
            (Some(_), Some(_)) => bail!("Import spec has more than one asset table"),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeshSpec {
    pub source_file: PathBuf,
    /// Also bake position-only collision meshes.
    #[serde(default = "default_true")]
    pub physics: bool,
    #[serde(default = "default_true")]
    pub skeleton: bool,
    #[serde(default = "default_true")]
    pub animations: bool,
    /// Allow 16-bit indices where they fit.
    #[serde(default = "default_true")]
    pub index16: bool,
    #[serde(default = "default_true")]
    pub normal: bool,
    #[serde(default = "default_true")]
    pub tangent: bool,
    #[serde(default = "default_true")]
    pub bones: bool,
    #[serde(default = "default_true")]
    pub tex_coord1: bool,
    #[serde(default = "default_true")]
    pub tex_coord2: bool,
    #[serde(default = "default_true")]
    pub tex_coord3: bool,
    #[serde(default = "default_true")]
    pub tex_coord4: bool,
    /// Source material name to engine material path.
    #[serde(default)]
    pub material_mapping: Vec<MaterialMapping>,
}

impl MeshSpec {
    /// Attributes the spec permits; intersected with what the source
    /// actually carries at bake time.
    pub fn requested_vertex_flags(&self) -> VertexFlags {
        let mut flags = VertexFlags::empty();
        if self.normal {
            flags |= VertexFlags::NORMAL;
        }
        if self.tangent {
            flags |= VertexFlags::TANGENT;
        }
        if self.bones {
            flags |= VertexFlags::BONES;
        }
        if self.tex_coord1 {
            flags |= VertexFlags::TEX_COORDS_1;
        }
        if self.tex_coord2 {
            flags |= VertexFlags::TEX_COORDS_2;
        }
        if self.tex_coord3 {
            flags |= VertexFlags::TEX_COORDS_3;
        }
        if self.tex_coord4 {
            flags |= VertexFlags::TEX_COORDS_4;
        }
        flags
    }

    pub fn requested_index_flags(&self) -> IndexFlags {
        if self.index16 {
            IndexFlags::USE_16BIT
        } else {
            IndexFlags::empty()
        }
    }

    /// Engine material path for a source material name, if mapped.
    pub fn mapped_material(&self, id: &str) -> Option<&str> {
        self.material_mapping
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.path.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaterialMapping {
    /// Material name as the source file spells it.
    pub id: String,
    pub path: String,
}

fn default_colorspace() -> String {
    "srgb".to_owned()
}

fn default_filter() -> String {
    "anisotropic".to_owned()
}

fn default_edge_sampling() -> String {
    "clamp".to_owned()
}

fn default_max_anisotropy() -> f32 {
    16.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextureSpec {
    pub source_file: PathBuf,
    pub output_file: PathBuf,
    #[serde(default = "default_colorspace")]
    pub colorspace: String,
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default = "default_edge_sampling")]
    pub edge_sampling: String,
    #[serde(default = "default_max_anisotropy")]
    pub max_anisotropy: f32,
    /// Pre-authored mip levels, finest first. The source image is level 0.
    #[serde(default)]
    pub levels: Vec<PathBuf>,
}

fn default_native_size() -> f32 {
    32.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FontSpec {
    pub source_file: PathBuf,
    pub output_file: PathBuf,
    /// Rasterization size in pixels.
    #[serde(default = "default_native_size")]
    pub native_size: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaterialSpec {
    pub output_file: PathBuf,
    #[serde(default)]
    pub albedo: String,
    #[serde(default)]
    pub normal: String,
    #[serde(default)]
    pub metalness: String,
    #[serde(default)]
    pub occlusion: String,
    #[serde(default)]
    pub roughness: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmptyMaterialSpec {
    pub output_file: PathBuf,
    /// Asset class the engine instantiates for this material.
    pub material_class: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_mesh_spec_gets_defaults() {
        let spec: ImportSpec = toml::from_str(
            r#"
            [mesh]
            source_file = "rock.glb"
            "#,
        )
        .unwrap();

        assert_eq!(spec.kind().unwrap(), SpecKind::Mesh);
        let mesh = spec.mesh.unwrap();
        assert!(mesh.physics);
        assert!(mesh.skeleton);
        assert!(mesh.animations);
        assert!(mesh.index16);
        assert_eq!(mesh.requested_vertex_flags(), VertexFlags::all());
        assert_eq!(mesh.requested_index_flags(), IndexFlags::USE_16BIT);
        assert!(mesh.material_mapping.is_empty());
    }

    #[test]
    fn mesh_spec_attribute_opt_outs() {
        let spec: ImportSpec = toml::from_str(
            r#"
            [mesh]
            source_file = "rock.glb"
            tangent = false
            bones = false
            index16 = false

            [[mesh.material_mapping]]
            id = "Stone"
            path = "Materials/Stone"
            "#,
        )
        .unwrap();

        let mesh = spec.mesh.unwrap();
        let flags = mesh.requested_vertex_flags();
        assert!(!flags.contains(VertexFlags::TANGENT));
        assert!(!flags.contains(VertexFlags::BONES));
        assert!(flags.contains(VertexFlags::NORMAL));
        assert_eq!(mesh.requested_index_flags(), IndexFlags::empty());
        assert_eq!(mesh.mapped_material("Stone"), Some("Materials/Stone"));
        assert_eq!(mesh.mapped_material("Wood"), None);
    }

    #[test]
    fn texture_spec_defaults() {
        let spec: ImportSpec = toml::from_str(
            r#"
            [texture]
            source_file = "albedo.png"
            output_file = "Texture_Albedo.asset"
            "#,
        )
        .unwrap();

        assert_eq!(spec.kind().unwrap(), SpecKind::Texture);
        let texture = spec.texture.unwrap();
        assert_eq!(texture.colorspace, "srgb");
        assert_eq!(texture.filter, "anisotropic");
        assert_eq!(texture.edge_sampling, "clamp");
        assert_eq!(texture.max_anisotropy, 16.0);
        assert!(texture.levels.is_empty());
    }

    #[test]
    fn empty_material_table_name_is_hyphenated() {
        let spec: ImportSpec = toml::from_str(
            r#"
            [empty-material]
            output_file = "Material_Sky.asset"
            material_class = "kit::SkyMaterial"
            "#,
        )
        .unwrap();
        assert_eq!(spec.kind().unwrap(), SpecKind::EmptyMaterial);
    }

    #[test]
    fn zero_or_two_tables_fail() {
        let empty: ImportSpec = toml::from_str("").unwrap();
        assert!(empty.kind().is_err());

        let double: ImportSpec = toml::from_str(
            r#"
            [mesh]
            source_file = "rock.glb"

            [font]
            source_file = "mono.ttf"
            output_file = "Font_Mono.asset"
            "#,
        )
        .unwrap();
        assert!(double.kind().is_err());
    }

    #[test]
    fn default_mesh_spec_round_trips() {
        let spec = ImportSpec::default_mesh(PathBuf::from("figure.glb"));
        let text = toml::to_string_pretty(&spec).unwrap();
        let parsed: ImportSpec = toml::from_str(&text).unwrap();
        assert_eq!(parsed.kind().unwrap(), SpecKind::Mesh);
        assert_eq!(parsed.mesh.unwrap().source_file, PathBuf::from("figure.glb"));
    }
}
