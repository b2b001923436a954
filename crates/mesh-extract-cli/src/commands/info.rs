//! `info` command: summarize a scene.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use mesh_extract::{io, Scene, SourceKind};
use serde::Serialize;

use crate::output;
use crate::OutputFormat;

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Scene file (JSON)
    pub scene: PathBuf,
}

#[derive(Debug, Serialize)]
struct ObjectInfo {
    id: u32,
    name: String,
    kind: &'static str,
    mesh: String,
    vertices: usize,
    triangles: usize,
    submeshes: usize,
    materials: usize,
    bones: usize,
    blend_shapes: usize,
    has_bone_weights: bool,
}

#[derive(Debug, Serialize)]
struct SceneInfo {
    objects: Vec<ObjectInfo>,
    meshes: usize,
    bones: usize,
    materials: usize,
}

fn summarize(scene: &Scene) -> Result<SceneInfo> {
    let mut objects = Vec::with_capacity(scene.objects.len());

    for (id, object) in scene.objects.iter().enumerate() {
        // Skinned sources are summarized through their bind-pose mesh.
        let mesh = scene.mesh_for(mesh_extract::ObjectId(id as u32), true)?;
        let kind = match object.source {
            SourceKind::Static { .. } => "static",
            SourceKind::Skinned { .. } => "skinned",
        };
        objects.push(ObjectInfo {
            id: id as u32,
            name: object.name.clone(),
            kind,
            mesh: mesh.name.clone(),
            vertices: mesh.attributes.vertex_count(),
            triangles: mesh.triangle_count(),
            submeshes: mesh.submeshes.len(),
            materials: object.source.materials().len(),
            bones: object.source.bones().len(),
            blend_shapes: mesh.blend_shapes.len(),
            has_bone_weights: !mesh.bone_weights.is_empty(),
        });
    }

    Ok(SceneInfo {
        objects,
        meshes: scene.meshes.len(),
        bones: scene.bones.len(),
        materials: scene.materials.len(),
    })
}

pub fn run(args: &InfoArgs, format: OutputFormat, quiet: bool) -> Result<()> {
    let scene = io::load_scene(&args.scene).with_context(|| format!("loading scene {:?}", args.scene))?;
    let info = summarize(&scene)?;

    if format == OutputFormat::Text {
        output::info(
            &format!(
                "Scene: {} objects, {} meshes, {} bones, {} materials",
                info.objects.len(),
                info.meshes,
                info.bones,
                info.materials
            ),
            format,
            quiet,
        );
        for object in &info.objects {
            let mut line = format!(
                "  #{} {} ({}): mesh '{}', {} verts, {} tris, {} submeshes, {} materials",
                object.id,
                object.name,
                object.kind,
                object.mesh,
                object.vertices,
                object.triangles,
                object.submeshes,
                object.materials
            );
            if object.has_bone_weights {
                line.push_str(&format!(", {} bones", object.bones));
            }
            if object.blend_shapes > 0 {
                line.push_str(&format!(", {} blend shapes", object.blend_shapes));
            }
            output::info(&line, format, quiet);
        }
    }

    output::print(&info, format, quiet);
    Ok(())
}
