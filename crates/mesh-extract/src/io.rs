//! Reading scenes and selections, writing extracted assets.
//!
//! Assets are written either as native JSON (every channel, skin, bone binding and
//! blend shapes) or as Wavefront OBJ with a companion MTL file (geometry, UV0, normals
//! and materials only).

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::assemble::ExtractedAsset;
use crate::error::{ExtractError, ExtractResult};
use crate::scene::{Scene, SelectedTriangle};
use crate::types::MaterialId;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Native JSON asset.
    Asset,
    /// Wavefront OBJ plus MTL.
    Obj,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Asset => "json",
            OutputFormat::Obj => "obj",
        }
    }

    pub fn from_obj_flag(save_as_obj: bool) -> Self {
        if save_as_obj {
            OutputFormat::Obj
        } else {
            OutputFormat::Asset
        }
    }
}

/// Options for [`save_asset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveOptions {
    /// Overwrite an existing file instead of picking a unique name.
    pub replace_existing: bool,

    /// Copy material textures next to the output (OBJ only).
    pub extract_textures: bool,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> ExtractResult<T> {
    let file = File::open(path).map_err(|e| ExtractError::IoRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| ExtractError::ParseError {
        path: path.to_path_buf(),
        details: e.to_string(),
    })
}

/// Load a scene from JSON. Relative texture paths are resolved against the scene's
/// directory.
pub fn load_scene(path: &Path) -> ExtractResult<Scene> {
    let mut scene: Scene = read_json(path)?;

    if let Some(dir) = path.parent() {
        for material in &mut scene.materials {
            if let Some(texture) = material.diffuse_texture.as_mut() {
                if texture.is_relative() {
                    *texture = dir.join(&*texture);
                }
            }
        }
    }

    info!(
        "Loaded scene from {:?}: {} objects, {} meshes, {} bones, {} materials",
        path,
        scene.objects.len(),
        scene.meshes.len(),
        scene.bones.len(),
        scene.materials.len()
    );
    Ok(scene)
}

/// Load a triangle selection (a JSON array of selected triangles).
pub fn load_selection(path: &Path) -> ExtractResult<Vec<SelectedTriangle>> {
    let selection: Vec<SelectedTriangle> = read_json(path)?;
    debug!("Loaded {} selected triangles from {:?}", selection.len(), path);
    Ok(selection)
}

/// Load a native JSON asset.
pub fn load_asset(path: &Path) -> ExtractResult<ExtractedAsset> {
    let asset: ExtractedAsset = read_json(path)?;
    debug!(
        "Loaded asset '{}' from {:?}: {} vertices",
        asset.name,
        path,
        asset.vertex_count()
    );
    Ok(asset)
}

/// Pick the path an output is written to.
///
/// With `replace_existing` an existing file is removed and its path reused. Otherwise
/// the first free name of the form `name 1.ext`, `name 2.ext`, ... is returned.
pub fn resolve_output_path(path: &Path, replace_existing: bool) -> ExtractResult<PathBuf> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    if replace_existing {
        debug!("Replacing existing {:?}", path);
        std::fs::remove_file(path).map_err(|e| ExtractError::IoWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
        return Ok(path.to_path_buf());
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("asset")
        .to_string();
    let extension = path.extension().and_then(|e| e.to_str());

    let mut n = 1usize;
    loop {
        let file_name = match extension {
            Some(ext) => format!("{} {}.{}", stem, n, ext),
            None => format!("{} {}", stem, n),
        };
        let candidate = path.with_file_name(file_name);
        if !candidate.exists() {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Write `asset` into `dir` as `<asset name>.<ext>`.
///
/// Returns the path actually written, which differs from the plain name when an
/// existing file is kept.
pub fn save_asset(
    asset: &ExtractedAsset,
    scene: &Scene,
    dir: &Path,
    format: OutputFormat,
    options: SaveOptions,
) -> ExtractResult<PathBuf> {
    let requested = dir.join(format!("{}.{}", asset.name, format.extension()));
    let path = resolve_output_path(&requested, options.replace_existing)?;

    match format {
        OutputFormat::Asset => save_asset_json(asset, &path)?,
        OutputFormat::Obj => {
            let textures = if options.extract_textures {
                copy_textures(asset, scene, dir)?
            } else {
                HashMap::new()
            };
            save_obj(asset, scene, &textures, &path)?;
        }
    }

    Ok(path)
}

/// Save an asset as native JSON.
pub fn save_asset_json(asset: &ExtractedAsset, path: &Path) -> ExtractResult<()> {
    info!("Saving asset '{}' to {:?}", asset.name, path);

    let file = File::create(path).map_err(|e| ExtractError::IoWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, asset).map_err(|e| ExtractError::IoWrite {
        path: path.to_path_buf(),
        source: std::io::Error::other(e.to_string()),
    })?;

    writer.flush().map_err(|e| ExtractError::IoWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

/// Copy the diffuse textures of the asset's materials into `dir`.
///
/// Returns the copied file name per material. Missing source files are skipped with a
/// warning.
pub fn copy_textures(
    asset: &ExtractedAsset,
    scene: &Scene,
    dir: &Path,
) -> ExtractResult<HashMap<MaterialId, String>> {
    let mut copied = HashMap::new();

    for id in asset.materials.iter().flatten() {
        if copied.contains_key(id) {
            continue;
        }
        let Some(source) = scene.material(*id).and_then(|m| m.diffuse_texture.as_ref()) else {
            continue;
        };
        let Some(file_name) = source.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !source.exists() {
            warn!("Texture {:?} does not exist; not copying it", source);
            continue;
        }

        let target = dir.join(file_name);
        if target != *source {
            std::fs::copy(source, &target).map_err(|e| ExtractError::IoWrite {
                path: target.clone(),
                source: e,
            })?;
            debug!("Copied texture {:?} to {:?}", source, target);
        }
        copied.insert(*id, file_name.to_string());
    }

    Ok(copied)
}

/// OBJ/MTL names can't contain whitespace.
fn obj_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

/// MTL name of a material slot. Scene materials carry their handle as a suffix so
/// names that sanitize alike stay distinct; only unassigned slots map to `default`.
fn material_name(scene: &Scene, material: Option<MaterialId>) -> String {
    match material {
        Some(id) => match scene.material(id) {
            Some(m) => format!("{}_{}", obj_name(&m.name), id.0),
            None => format!("material_{}", id.0),
        },
        None => "default".to_string(),
    }
}

/// Save an asset to OBJ, writing materials to a sibling `.mtl` file.
///
/// Indices are written 1-based. Faces reference UV0 and normals with the same index as
/// the position when those channels are present. `textures` maps materials to copied
/// texture files; materials without an entry reference their original texture path.
pub fn save_obj(
    asset: &ExtractedAsset,
    scene: &Scene,
    textures: &HashMap<MaterialId, String>,
    path: &Path,
) -> ExtractResult<()> {
    info!("Saving asset '{}' to {:?} (OBJ format)", asset.name, path);

    let io_err = |e: std::io::Error| ExtractError::IoWrite {
        path: path.to_path_buf(),
        source: e,
    };

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(&asset.name);
    let mtl_file_name = format!("{}.mtl", obj_name(stem));
    let mtl_path = path.with_file_name(&mtl_file_name);

    let names: Vec<String> = asset
        .materials
        .iter()
        .map(|&m| material_name(scene, m))
        .collect();

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# OBJ file exported by mesh-extract").map_err(io_err)?;
    writeln!(writer, "# Vertices: {}", asset.vertex_count()).map_err(io_err)?;
    writeln!(writer, "# Triangles: {}", asset.triangle_count()).map_err(io_err)?;
    writeln!(writer, "mtllib {}", mtl_file_name).map_err(io_err)?;
    writeln!(writer, "o {}", obj_name(&asset.name)).map_err(io_err)?;

    let attributes = &asset.attributes;
    for p in &attributes.positions {
        writeln!(writer, "v {:.6} {:.6} {:.6}", p.x, p.y, p.z).map_err(io_err)?;
    }

    let has_uvs = !attributes.uvs[0].is_empty();
    for uv in &attributes.uvs[0] {
        writeln!(writer, "vt {:.6} {:.6}", uv.x, uv.y).map_err(io_err)?;
    }

    let has_normals = !attributes.normals.is_empty();
    for n in &attributes.normals {
        writeln!(writer, "vn {:.6} {:.6} {:.6}", n.x, n.y, n.z).map_err(io_err)?;
    }

    for (s, (submesh, name)) in asset.submeshes.iter().zip(&names).enumerate() {
        writeln!(writer, "g submesh_{}", s).map_err(io_err)?;
        writeln!(writer, "usemtl {}", name).map_err(io_err)?;
        for tri in submesh.triangles() {
            let [a, b, c] = tri.map(|i| {
                let i = i + 1;
                match (has_uvs, has_normals) {
                    (true, true) => format!("{}/{}/{}", i, i, i),
                    (true, false) => format!("{}/{}", i, i),
                    (false, true) => format!("{}//{}", i, i),
                    (false, false) => i.to_string(),
                }
            });
            writeln!(writer, "f {} {} {}", a, b, c).map_err(io_err)?;
        }
    }

    writer.flush().map_err(io_err)?;

    save_mtl(asset, scene, textures, &names, &mtl_path)?;

    info!(
        "Saved {} vertices, {} triangles in {} submeshes to {:?}",
        asset.vertex_count(),
        asset.triangle_count(),
        asset.submeshes.len(),
        path
    );

    Ok(())
}

fn save_mtl(
    asset: &ExtractedAsset,
    scene: &Scene,
    textures: &HashMap<MaterialId, String>,
    names: &[String],
    path: &Path,
) -> ExtractResult<()> {
    let io_err = |e: std::io::Error| ExtractError::IoWrite {
        path: path.to_path_buf(),
        source: e,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# MTL file exported by mesh-extract").map_err(io_err)?;

    let mut written: Vec<&str> = Vec::new();
    for (material, name) in asset.materials.iter().zip(names) {
        if written.contains(&name.as_str()) {
            continue;
        }
        written.push(name);

        writeln!(writer).map_err(io_err)?;
        writeln!(writer, "newmtl {}", name).map_err(io_err)?;
        writeln!(writer, "Kd 1.000000 1.000000 1.000000").map_err(io_err)?;

        let Some(id) = material else {
            continue;
        };
        let texture = match textures.get(id) {
            Some(copied) => Some(copied.clone()),
            None => scene
                .material(*id)
                .and_then(|m| m.diffuse_texture.as_ref())
                .map(|t| t.display().to_string()),
        };
        if let Some(texture) = texture {
            writeln!(writer, "map_Kd {}", texture).map_err(io_err)?;
        }
    }

    writer.flush().map_err(io_err)?;
    debug!("Wrote {} materials to {:?}", written.len(), path);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::OutputKind;
    use crate::types::{SubMesh, VertexAttributes};
    use nalgebra::{Point3, Vector2, Vector3};
    use tempfile::TempDir;

    fn two_material_asset(scene: &mut Scene) -> ExtractedAsset {
        let a = scene.add_material("Mat A");
        let b = scene.add_material("MatB");
        let attributes = VertexAttributes {
            positions: (0..6).map(|i| Point3::new(i as f32, (i % 2) as f32, 0.0)).collect(),
            normals: vec![Vector3::z(); 6],
            uvs: std::array::from_fn(|c| {
                if c == 0 {
                    (0..6).map(|i| Vector2::new(i as f32 / 5.0, 0.5)).collect()
                } else {
                    Vec::new()
                }
            }),
            ..Default::default()
        };
        let submeshes = vec![
            SubMesh::new(vec![0, 1, 2], Some(a)),
            SubMesh::new(vec![3, 4, 5], Some(b)),
        ];
        ExtractedAsset {
            name: "Two Mats".into(),
            bounds: attributes.bounds(),
            materials: vec![Some(a), Some(b)],
            attributes,
            submeshes,
            blend_shapes: Vec::new(),
            kind: OutputKind::Plain,
        }
    }

    #[test]
    fn test_resolve_output_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Mesh.json");
        assert_eq!(resolve_output_path(&path, false).unwrap(), path);

        std::fs::write(&path, "{}").unwrap();
        assert_eq!(
            resolve_output_path(&path, false).unwrap(),
            dir.path().join("Mesh 1.json")
        );

        std::fs::write(dir.path().join("Mesh 1.json"), "{}").unwrap();
        assert_eq!(
            resolve_output_path(&path, false).unwrap(),
            dir.path().join("Mesh 2.json")
        );

        assert_eq!(resolve_output_path(&path, true).unwrap(), path);
        assert!(!path.exists());
    }

    #[test]
    fn test_save_obj_reads_back() {
        let dir = TempDir::new().unwrap();
        let mut scene = Scene::new();
        let asset = two_material_asset(&mut scene);

        let path = save_asset(
            &asset,
            &scene,
            dir.path(),
            OutputFormat::Obj,
            SaveOptions::default(),
        )
        .expect("should save");
        assert_eq!(path, dir.path().join("Two Mats.obj"));
        assert!(dir.path().join("Two_Mats.mtl").exists());

        let (models, materials) = tobj::load_obj(
            &path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )
        .expect("tobj should parse our output");

        let triangles: usize = models.iter().map(|m| m.mesh.indices.len() / 3).sum();
        assert_eq!(triangles, 2);
        assert_eq!(models.len(), 2);
        assert!(models.iter().all(|m| !m.mesh.normals.is_empty()));
        assert!(models.iter().all(|m| !m.mesh.texcoords.is_empty()));

        let materials = materials.expect("mtl should load");
        let names: Vec<&str> = materials.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Mat_A_0", "MatB_1"]);
    }

    #[test]
    fn test_mtl_names_stay_distinct() {
        let dir = TempDir::new().unwrap();
        let mut scene = Scene::new();
        let mut asset = two_material_asset(&mut scene);

        // "Metal Plate" and "Metal_Plate" sanitize to the same string.
        let plate = scene.add_material("Metal Plate");
        let plate_alt = scene.add_material("Metal_Plate");
        let named_default = scene.add_material("default");
        for (id, texture) in [(plate, "plate.png"), (plate_alt, "plate_alt.png")] {
            scene.materials[id.0 as usize].diffuse_texture = Some(PathBuf::from(texture));
        }
        asset.submeshes = vec![
            SubMesh::new(vec![0, 1, 2], Some(plate)),
            SubMesh::new(vec![3, 4, 5], Some(plate_alt)),
            SubMesh::new(vec![0, 2, 4], Some(named_default)),
            SubMesh::new(vec![1, 3, 5], None),
        ];
        asset.materials = asset.submeshes.iter().map(|s| s.material).collect();

        let path = dir.path().join("plates.obj");
        save_obj(&asset, &scene, &HashMap::new(), &path).unwrap();

        let mtl = std::fs::read_to_string(dir.path().join("plates.mtl")).unwrap();
        let newmtl: Vec<&str> = mtl
            .lines()
            .filter_map(|l| l.strip_prefix("newmtl "))
            .collect();
        assert_eq!(newmtl.len(), 4);
        let mut unique = newmtl.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 4);
        assert!(mtl.contains("map_Kd plate.png"));
        assert!(mtl.contains("map_Kd plate_alt.png"));
    }

    #[test]
    fn test_json_asset_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut scene = Scene::new();
        let asset = two_material_asset(&mut scene);

        let path = save_asset(
            &asset,
            &scene,
            dir.path(),
            OutputFormat::Asset,
            SaveOptions::default(),
        )
        .unwrap();
        let loaded = load_asset(&path).unwrap();
        assert_eq!(loaded, asset);
    }

    #[test]
    fn test_copy_textures() {
        let source_dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let texture = source_dir.path().join("albedo.png");
        std::fs::write(&texture, b"png").unwrap();

        let mut scene = Scene::new();
        let asset = two_material_asset(&mut scene);
        scene.materials[0].diffuse_texture = Some(texture);
        scene.materials[1].diffuse_texture = Some(source_dir.path().join("missing.png"));

        let copied = copy_textures(&asset, &scene, out_dir.path()).unwrap();
        assert_eq!(copied.len(), 1);
        assert_eq!(copied.get(&MaterialId(0)).map(String::as_str), Some("albedo.png"));
        assert!(out_dir.path().join("albedo.png").exists());
    }

    #[test]
    fn test_load_scene_resolves_textures() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scene.json");
        std::fs::write(
            &path,
            r#"{ "materials": [ { "name": "skin", "diffuse_texture": "tex/skin.png" } ] }"#,
        )
        .unwrap();

        let scene = load_scene(&path).unwrap();
        assert_eq!(
            scene.materials[0].diffuse_texture.as_deref(),
            Some(dir.path().join("tex/skin.png").as_path())
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_scene(Path::new("/nonexistent/scene.json"));
        assert!(matches!(result, Err(ExtractError::IoRead { .. })));
    }
}
