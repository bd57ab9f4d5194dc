//! Command registry
//!
//! Each tool operation is a table entry: name, fixed argument count and a
//! run function. The binary looks commands up here and maps the outcome to
//! an exit code, so adding an operation is one entry plus its module.

use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

use kit_common::Stream;

use crate::spec::{ImportSpec, SpecKind};
use crate::{font, material, mesh, shader, texture};

pub struct CommandSpec {
    pub name: &'static str,
    pub required_args: usize,
    pub usage: &'static str,
    /// Spec kind this command consumes, for dispatch through `import`.
    pub import_kind: Option<SpecKind>,
    pub run: fn(&[String]) -> Result<()>,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "import",
        required_args: 1,
        usage: "import <file.import>",
        import_kind: None,
        run: run_import,
    },
    CommandSpec {
        name: "import_mesh",
        required_args: 1,
        usage: "import_mesh <scene file>",
        import_kind: Some(SpecKind::Mesh),
        run: run_import_mesh,
    },
    CommandSpec {
        name: "import_physics_mesh",
        required_args: 2,
        usage: "import_physics_mesh <scene file> <output dir>",
        import_kind: None,
        run: run_import_physics_mesh,
    },
    CommandSpec {
        name: "import_texture",
        required_args: 1,
        usage: "import_texture <file.import>",
        import_kind: Some(SpecKind::Texture),
        run: run_import_texture,
    },
    CommandSpec {
        name: "import_font",
        required_args: 1,
        usage: "import_font <file.import>",
        import_kind: Some(SpecKind::Font),
        run: run_import_font,
    },
    CommandSpec {
        name: "create_default_material",
        required_args: 1,
        usage: "create_default_material <file.import>",
        import_kind: Some(SpecKind::Material),
        run: run_create_default_material,
    },
    CommandSpec {
        name: "create_empty_material",
        required_args: 1,
        usage: "create_empty_material <file.import>",
        import_kind: Some(SpecKind::EmptyMaterial),
        run: run_create_empty_material,
    },
    CommandSpec {
        name: "create_shader_module",
        required_args: 2,
        usage: "create_shader_module <shader source> <output file>",
        import_kind: None,
        run: run_create_shader_module,
    },
    CommandSpec {
        name: "test_compression",
        required_args: 0,
        usage: "test_compression",
        import_kind: None,
        run: run_test_compression,
    },
];

pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.name == name)
}

/// Spec plus the directory its relative paths resolve against.
fn load_spec(path: &Path) -> Result<(ImportSpec, PathBuf)> {
    let spec = ImportSpec::load(path)?;
    let base = path.parent().unwrap_or(Path::new(".")).to_path_buf();
    Ok((spec, base))
}

fn rebase(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Dispatch by the spec's root table: run the registry command whose
/// `import_kind` matches.
fn run_import(args: &[String]) -> Result<()> {
    let path = Path::new(&args[0]);
    let (spec, _) = load_spec(path)?;
    let kind = spec.kind()?;
    let Some(command) = COMMANDS.iter().find(|c| c.import_kind == Some(kind)) else {
        bail!("No command registered for spec kind {:?}", kind);
    };
    (command.run)(args)
}

fn run_import_mesh(args: &[String]) -> Result<()> {
    mesh::import_mesh(Path::new(&args[0]))
}

fn run_import_physics_mesh(args: &[String]) -> Result<()> {
    mesh::import_physics_mesh(Path::new(&args[0]), Path::new(&args[1]))
}

fn run_import_texture(args: &[String]) -> Result<()> {
    let path = Path::new(&args[0]);
    let (spec, base) = load_spec(path)?;
    let Some(mut texture) = spec.texture else {
        bail!("Import spec {:?} is not a texture spec", path);
    };
    texture.source_file = rebase(&base, texture.source_file);
    texture.output_file = rebase(&base, texture.output_file);
    texture.levels = texture
        .levels
        .into_iter()
        .map(|level| rebase(&base, level))
        .collect();
    texture::import_texture(&texture)
}

fn run_import_font(args: &[String]) -> Result<()> {
    let path = Path::new(&args[0]);
    let (spec, base) = load_spec(path)?;
    let Some(mut font) = spec.font else {
        bail!("Import spec {:?} is not a font spec", path);
    };
    font.source_file = rebase(&base, font.source_file);
    font.output_file = rebase(&base, font.output_file);
    font::import_font(&font)
}

fn run_create_default_material(args: &[String]) -> Result<()> {
    let path = Path::new(&args[0]);
    let (spec, base) = load_spec(path)?;
    let Some(mut material_spec) = spec.material else {
        bail!("Import spec {:?} is not a material spec", path);
    };
    material_spec.output_file = rebase(&base, material_spec.output_file);
    material::create_default_material(&material_spec)
}

fn run_create_empty_material(args: &[String]) -> Result<()> {
    let path = Path::new(&args[0]);
    let (spec, base) = load_spec(path)?;
    let Some(mut material_spec) = spec.empty_material else {
        bail!("Import spec {:?} is not an empty-material spec", path);
    };
    material_spec.output_file = rebase(&base, material_spec.output_file);
    material::create_empty_material(&material_spec)
}

fn run_create_shader_module(args: &[String]) -> Result<()> {
    shader::create_shader_module(Path::new(&args[0]), Path::new(&args[1]))
}

/// Self-check: round-trip a fixed reference sequence through the block
/// codec.
fn run_test_compression(_args: &[String]) -> Result<()> {
    let data = vec![0x00, 0x11, 0x44, 0x22, 0x33, b'f', b'o', b'o', b'b', b'a', b'r'];

    let original = Stream::from_bytes(data);
    let compressed = original.compress();
    let restored = compressed.decompress(original.len())?;
    if restored.as_bytes() != original.as_bytes() {
        bail!("Compression round trip mismatch");
    }

    tracing::info!(
        "Compression ok: {} -> {} bytes",
        original.len(),
        compressed.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn registry_names_are_unique() {
        for (i, a) in COMMANDS.iter().enumerate() {
            for b in &COMMANDS[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn lookup_finds_known_commands() {
        assert!(find("import_mesh").is_some());
        assert_eq!(find("import_texture").unwrap().required_args, 1);
        assert_eq!(find("create_shader_module").unwrap().required_args, 2);
        assert_eq!(find("test_compression").unwrap().required_args, 0);
        assert!(find("frobnicate").is_none());
    }

    #[test]
    fn every_spec_kind_has_a_dispatch_target() {
        for kind in [
            SpecKind::Mesh,
            SpecKind::Texture,
            SpecKind::Font,
            SpecKind::Material,
            SpecKind::EmptyMaterial,
        ] {
            assert!(COMMANDS.iter().any(|c| c.import_kind == Some(kind)));
        }
    }

    #[test]
    fn compression_self_check_passes() {
        run_test_compression(&[]).unwrap();
    }

    #[test]
    fn import_dispatches_by_spec_kind() {
        let dir = tempfile::tempdir().unwrap();
        let spec_path = dir.path().join("sky.import");
        fs::write(
            &spec_path,
            r#"
            [empty-material]
            output_file = "Material_Sky.asset"
            material_class = "kit::SkyMaterial"
            "#,
        )
        .unwrap();

        run_import(&[spec_path.to_string_lossy().into_owned()]).unwrap();
        assert!(dir.path().join("Material_Sky.asset").exists());
    }

    #[test]
    fn kind_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let spec_path = dir.path().join("sky.import");
        fs::write(
            &spec_path,
            r#"
            [empty-material]
            output_file = "Material_Sky.asset"
            material_class = "kit::SkyMaterial"
            "#,
        )
        .unwrap();

        assert!(run_import_texture(&[spec_path.to_string_lossy().into_owned()]).is_err());
    }
}
