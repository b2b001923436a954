//! `extract` command: run the pipeline and save every produced asset.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use mesh_extract::{
    extract_selection, io, ExtractConfig, NoProgress, ObjectId, OutputFormat as AssetFormat,
    SaveOptions, Scene, SelectedTriangle,
};
use serde::Serialize;
use tracing::debug;

use crate::output::{self, NoticeOutput};
use crate::OutputFormat;

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Scene file (JSON)
    pub scene: PathBuf,

    /// Selected triangles (JSON array). Without it, whole objects are selected
    #[arg(short, long)]
    pub selection: Option<PathBuf>,

    /// Select every triangle of this object (repeatable). Defaults to all objects
    #[arg(long = "object", value_name = "ID")]
    pub objects: Vec<u32>,

    /// Directory the assets are written to
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Extraction config (TOML or JSON); flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base name of the produced assets
    #[arg(short, long)]
    pub name: Option<String>,

    /// Overwrite existing files
    #[arg(long)]
    pub replace: bool,

    /// Save as Wavefront OBJ
    #[arg(long)]
    pub obj: bool,

    /// Copy material textures next to OBJ output
    #[arg(long)]
    pub textures: bool,

    /// Export bone weights
    #[arg(long)]
    pub bone_weights: bool,

    /// Export a copy of the bone hierarchy (needs --bone-weights)
    #[arg(long)]
    pub bone_transforms: bool,

    /// Export blend shapes (keeps vertices in each object's own space)
    #[arg(long)]
    pub blend_shapes: bool,

    /// Keep one asset per source object
    #[arg(long)]
    pub no_combine: bool,

    /// Put all triangles into a single submesh
    #[arg(long, conflicts_with = "by_submesh")]
    pub flatten: bool,

    /// Group by original submesh index instead of by material
    #[arg(long)]
    pub by_submesh: bool,
}

impl ExtractArgs {
    /// Load the config file, if any, and apply the flag overrides.
    fn config(&self) -> Result<ExtractConfig> {
        let mut config = match &self.config {
            Some(path) => ExtractConfig::load(path)
                .with_context(|| format!("loading config {:?}", path))?,
            None => ExtractConfig::default(),
        };

        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        config.replace_existing |= self.replace;
        config.save_as_obj |= self.obj;
        config.extract_textures |= self.textures;
        config.extract_bone_weights |= self.bone_weights;
        config.extract_bone_transforms |= self.bone_transforms;
        config.extract_blend_shapes |= self.blend_shapes;
        if self.no_combine {
            config.combine_meshes = false;
        }
        if self.flatten {
            config.preserve_submeshes = false;
        }
        if self.by_submesh {
            config.combine_submeshes_by_material = false;
        }

        Ok(config)
    }

    fn selection(&self, scene: &Scene) -> Result<Vec<SelectedTriangle>> {
        if let Some(path) = &self.selection {
            return io::load_selection(path).with_context(|| format!("loading selection {:?}", path));
        }

        let objects: Vec<ObjectId> = if self.objects.is_empty() {
            (0..scene.objects.len() as u32).map(ObjectId).collect()
        } else {
            self.objects.iter().copied().map(ObjectId).collect()
        };

        let mut selection = Vec::new();
        for object in objects {
            selection.extend(scene.select_all(object)?);
        }
        Ok(selection)
    }
}

#[derive(Debug, Serialize)]
struct AssetOutput {
    name: String,
    path: PathBuf,
    kind: &'static str,
    vertices: usize,
    triangles: usize,
    submeshes: usize,
}

#[derive(Debug, Serialize)]
struct ExtractOutput {
    assets: Vec<AssetOutput>,
    notices: Vec<NoticeOutput>,
}

pub fn run(args: &ExtractArgs, format: OutputFormat, quiet: bool) -> Result<()> {
    let scene = io::load_scene(&args.scene).with_context(|| format!("loading scene {:?}", args.scene))?;
    let selection = args.selection(&scene)?;
    let config = args.config()?;
    debug!("Effective config: {:?}", config);

    let extraction = extract_selection(&scene, &selection, &config, &mut NoProgress)?;

    for notice in &extraction.notices {
        output::notice(notice, format, quiet);
    }

    if !extraction.assets.is_empty() {
        std::fs::create_dir_all(&args.output)
            .with_context(|| format!("creating output directory {:?}", args.output))?;
    }

    let save_options = SaveOptions {
        replace_existing: extraction.config.replace_existing,
        extract_textures: extraction.config.extract_textures,
    };
    let asset_format = AssetFormat::from_obj_flag(extraction.config.save_as_obj);

    let mut saved = Vec::with_capacity(extraction.assets.len());
    for asset in &extraction.assets {
        let path = io::save_asset(asset, &scene, &args.output, asset_format, save_options)?;
        output::success(
            &format!(
                "Saved {} asset '{}' ({} vertices, {} triangles) to {}",
                asset.kind.name(),
                asset.name,
                asset.vertex_count(),
                asset.triangle_count(),
                path.display()
            ),
            format,
            quiet,
        );
        saved.push(AssetOutput {
            name: asset.name.clone(),
            path,
            kind: asset.kind.name(),
            vertices: asset.vertex_count(),
            triangles: asset.triangle_count(),
            submeshes: asset.submeshes.len(),
        });
    }

    output::print(
        &ExtractOutput {
            assets: saved,
            notices: extraction.notices.iter().map(NoticeOutput::from).collect(),
        },
        format,
        quiet,
    );

    Ok(())
}
