//! Mesh import pipeline
//!
//! Drives a full scene import: resolve the `.import` spec (writing a
//! default one on first contact), decode the source scene, normalize it,
//! then bake every mesh, physics mesh, skeleton and animation into assets
//! next to the input.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use kit_common::{asset::class, write_asset};

use crate::bake;
use crate::document::Document;
use crate::importer;
use crate::spec::{ImportSpec, MeshSpec};

/// Spec file for an input: the input itself if it already is one, else the
/// input path with `.import` appended.
fn spec_path_for(input: &Path) -> PathBuf {
    if input.extension().and_then(|e| e.to_str()) == Some("import") {
        return input.to_path_buf();
    }
    let mut os = input.as_os_str().to_owned();
    os.push(".import");
    PathBuf::from(os)
}

/// Load the spec next to `input`, materializing a default mesh spec on
/// first import.
fn resolve_mesh_spec(input: &Path) -> Result<(ImportSpec, PathBuf)> {
    let spec_path = spec_path_for(input);
    if !spec_path.exists() {
        let source = PathBuf::from(
            input
                .file_name()
                .with_context(|| format!("Input path {:?} has no file name", input))?,
        );
        tracing::info!("No import spec for {:?}, writing default {:?}", input, spec_path);
        ImportSpec::default_mesh(source).save(&spec_path)?;
    }
    let spec = ImportSpec::load(&spec_path)?;
    Ok((spec, spec_path))
}

fn asset_path(dir: &Path, kind: &str, name: &str, index: Option<usize>) -> PathBuf {
    match index {
        Some(i) => dir.join(format!("{kind}_{name}_{i}.asset")),
        None => dir.join(format!("{kind}_{name}.asset")),
    }
}

/// Bake a normalized document per the mesh spec's switches. `out_dir` is
/// the directory the source asset lives in.
pub fn bake_document(doc: &mut Document, spec: &MeshSpec, out_dir: &Path) -> Result<()> {
    let requested_vertex = spec.requested_vertex_flags();
    let requested_index = spec.requested_index_flags();

    for mesh in &mut doc.meshes {
        let multiple = mesh.submeshes.len() > 1;
        for (i, submesh) in mesh.submeshes.iter_mut().enumerate() {
            if let Some(path) = spec.mapped_material(&submesh.material_path) {
                submesh.material_path = path.to_owned();
            }

            let used_vertex = submesh.vertex_flags & requested_vertex;
            let used_index = submesh.index_flags & requested_index;
            let index = multiple.then_some(i);

            let payload = bake::bake_submesh(submesh, used_vertex, used_index);
            write_asset(
                &asset_path(out_dir, "Mesh", &mesh.name, index),
                class::MESH,
                &payload,
            )?;

            if spec.physics {
                bake::generate_triangles(submesh);
                let payload = bake::bake_physics_submesh(submesh)?;
                write_asset(
                    &asset_path(out_dir, "PhysicsMesh", &mesh.name, index),
                    class::PHYSICS_MESH,
                    &payload,
                )?;
            }
        }
    }

    if spec.skeleton {
        for skeleton in &doc.skeletons {
            let payload = bake::bake_skeleton(skeleton);
            write_asset(
                &asset_path(out_dir, "Skeleton", &skeleton.name, None),
                class::SKELETON,
                &payload,
            )?;
        }
    }

    if spec.animations {
        for animation in &doc.animations {
            let payload = bake::bake_animation(animation);
            write_asset(
                &asset_path(out_dir, "Animation", &animation.name, None),
                class::ANIMATION,
                &payload,
            )?;
        }
    }

    Ok(())
}

/// Run the full import for one source scene file.
pub fn import_mesh(input: &Path) -> Result<()> {
    let (spec, spec_path) = resolve_mesh_spec(input)?;
    let Some(mesh_spec) = &spec.mesh else {
        bail!("Import spec {:?} is not a mesh spec", spec_path);
    };

    let base_dir = spec_path.parent().unwrap_or(Path::new("."));
    let source = base_dir.join(&mesh_spec.source_file);

    let scene = importer::gltf::load_scene(&source)?;
    if scene.meshes.is_empty() {
        bail!("No meshes found in {:?}", source);
    }

    let mut doc = Document::new();
    importer::normalize(&scene, &mut doc);
    bake_document(&mut doc, mesh_spec, base_dir)
}

/// Import only the collision side of a scene, writing into `out_dir`.
pub fn import_physics_mesh(input: &Path, out_dir: &Path) -> Result<()> {
    let scene = importer::gltf::load_scene(input)?;
    if scene.meshes.is_empty() {
        bail!("No meshes found in {:?}", input);
    }

    let mut doc = Document::new();
    importer::normalize(&scene, &mut doc);

    for mesh in &mut doc.meshes {
        let multiple = mesh.submeshes.len() > 1;
        for (i, submesh) in mesh.submeshes.iter_mut().enumerate() {
            bake::generate_triangles(submesh);
            let payload = bake::bake_physics_submesh(submesh)?;
            write_asset(
                &asset_path(out_dir, "PhysicsMesh", &mesh.name, multiple.then_some(i)),
                class::PHYSICS_MESH,
                &payload,
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Mesh, Submesh, Vertex, VertexFlags};
    use glam::Vec4;
    use kit_common::read_asset;

    fn one_triangle_document(material: &str) -> Document {
        let mut submesh = Submesh::new(material);
        submesh.vertex_flags = VertexFlags::NORMAL;
        submesh.index_flags = crate::importer::index_flags_for(3);
        for x in 0..3 {
            submesh.vertices.push(Vertex {
                position: Vec4::new(x as f32, 0.0, 0.0, 1.0),
                ..Default::default()
            });
        }
        submesh.indices = vec![0, 1, 2];

        Document {
            meshes: vec![Mesh {
                name: "Rock".to_owned(),
                submeshes: vec![submesh],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn spec_path_appends_or_passes_through() {
        assert_eq!(
            spec_path_for(Path::new("art/figure.glb")),
            PathBuf::from("art/figure.glb.import")
        );
        assert_eq!(
            spec_path_for(Path::new("art/figure.glb.import")),
            PathBuf::from("art/figure.glb.import")
        );
    }

    #[test]
    fn bake_document_writes_mesh_and_physics_assets() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = one_triangle_document("Stone");
        // Parse rather than construct so the documented defaults apply.
        let spec: MeshSpec = toml::from_str(r#"source_file = "rock.glb""#).unwrap();

        bake_document(&mut doc, &spec, dir.path()).unwrap();

        let (mesh_class, _) = read_asset(&dir.path().join("Mesh_Rock.asset")).unwrap();
        assert_eq!(mesh_class, class::MESH);
        let (physics_class, _) = read_asset(&dir.path().join("PhysicsMesh_Rock.asset")).unwrap();
        assert_eq!(physics_class, class::PHYSICS_MESH);
    }

    #[test]
    fn material_mapping_applies_before_bake() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = one_triangle_document("Stone");
        let spec: MeshSpec = toml::from_str(
            r#"
            source_file = "rock.glb"
            physics = false

            [[material_mapping]]
            id = "Stone"
            path = "Materials/Stone"
            "#,
        )
        .unwrap();

        bake_document(&mut doc, &spec, dir.path()).unwrap();

        let (_, mut payload) = read_asset(&dir.path().join("Mesh_Rock.asset")).unwrap();
        assert_eq!(payload.read_str().unwrap(), "Materials/Stone");
    }

    #[test]
    fn missing_spec_materializes_a_default() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("figure.glb");
        std::fs::write(&input, b"not really a glb").unwrap();

        let (spec, spec_path) = resolve_mesh_spec(&input).unwrap();
        assert!(spec_path.exists());
        assert_eq!(
            spec.mesh.unwrap().source_file,
            PathBuf::from("figure.glb")
        );
    }
}
