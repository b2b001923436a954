//! The extraction entry point: selection in, finished assets and notices out.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::assemble::{assemble_combined, assemble_reduced, AssembleOptions, ExtractedAsset};
use crate::combine::{combine, MaterialMerge};
use crate::config::ExtractConfig;
use crate::error::ExtractResult;
use crate::extract::{extract, ExtractOptions};
use crate::notice::Notice;
use crate::reduce::{reduce, ReducedMesh, SubMeshGrouping};
use crate::scene::{Scene, SelectedTriangle};
use crate::types::ObjectId;

/// Receives progress updates. Purely observational.
pub trait ProgressSink {
    /// `fraction` runs from 0.0 to 1.0 over the whole call.
    fn report(&mut self, stage: &str, fraction: f32);
}

impl<F> ProgressSink for F
where
    F: FnMut(&str, f32),
{
    fn report(&mut self, stage: &str, fraction: f32) {
        self(stage, fraction)
    }
}

/// A sink that discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _stage: &str, _fraction: f32) {}
}

/// Result of [`extract_selection`].
#[derive(Debug, Clone)]
pub struct Extraction {
    pub assets: Vec<ExtractedAsset>,

    pub notices: Vec<Notice>,

    /// The configuration after downgrades; persistence should follow this one.
    pub config: ExtractConfig,
}

impl Extraction {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Rebuild meshes from a triangle selection.
///
/// Triangles are grouped by owning object; each object is extracted, reduced and then
/// either combined with the others or assembled on its own. Unsupported option
/// combinations and empty selections produce notices, not errors. Errors are limited
/// to handles that don't exist in `scene`.
pub fn extract_selection(
    scene: &Scene,
    selection: &[SelectedTriangle],
    config: &ExtractConfig,
    progress: &mut dyn ProgressSink,
) -> ExtractResult<Extraction> {
    let (config, mut notices) = config.normalized();

    let mut per_object: BTreeMap<ObjectId, Vec<SelectedTriangle>> = BTreeMap::new();
    for tri in selection {
        per_object.entry(tri.object).or_default().push(*tri);
    }
    for &object in per_object.keys() {
        scene.object(object)?;
    }

    let options = ExtractOptions {
        bone_weights: config.extract_bone_weights,
        blend_shapes: config.extract_blend_shapes,
        pivot: config.pivot,
    };
    let grouping =
        SubMeshGrouping::from_flags(config.preserve_submeshes, config.combine_submeshes_by_material);

    info!(
        "Extracting {} triangles from {} objects",
        selection.len(),
        per_object.len()
    );

    let total = per_object.len().max(1) as f32;
    let mut reduced: Vec<ReducedMesh> = Vec::with_capacity(per_object.len());
    for (i, (object, triangles)) in per_object.iter().enumerate() {
        progress.report("Extracting", i as f32 / total);

        let Some(buffers) = extract(scene, *object, &options)? else {
            continue;
        };
        let mesh = reduce(&buffers, triangles, grouping);
        if mesh.triangle_count() == 0 {
            debug!("No valid triangles selected on '{}'", mesh.name);
            continue;
        }
        reduced.push(mesh);
    }

    if reduced.is_empty() {
        notices.push(Notice::NothingToExtract);
        return Ok(finish(Vec::new(), notices, config, progress));
    }

    let wants_combine = config.combine_meshes && reduced.len() > 1;
    if wants_combine && config.extract_bone_weights {
        notices.push(Notice::CombineDisabledForBoneWeights);
    }

    progress.report("Assembling", 0.9);

    let assets = if wants_combine && !config.extract_bone_weights {
        let combined = combine(&reduced, MaterialMerge::from_flag(config.combine_submeshes_by_material));
        if !combined.dropped_channels.is_empty() {
            notices.push(Notice::ChannelsDropped {
                channels: combined.dropped_channels.clone(),
            });
        }
        vec![assemble_combined(scene, combined, config.name.clone())?]
    } else {
        let assemble_options = AssembleOptions {
            bone_weights: config.extract_bone_weights,
            bone_transforms: config.extract_bone_transforms,
        };
        let single = reduced.len() == 1;
        let mut assets = Vec::with_capacity(reduced.len());
        for mesh in reduced {
            let name = if single {
                config.name.clone()
            } else {
                format!("{} {}", config.name, scene.object(mesh.source)?.name)
            };
            let (asset, raised) = assemble_reduced(scene, mesh, name, assemble_options)?;
            notices.extend(raised);
            assets.push(asset);
        }
        assets
    };

    Ok(finish(assets, notices, config, progress))
}

fn finish(
    assets: Vec<ExtractedAsset>,
    notices: Vec<Notice>,
    config: ExtractConfig,
    progress: &mut dyn ProgressSink,
) -> Extraction {
    for notice in &notices {
        notice.log();
    }
    progress.report("Done", 1.0);

    info!(
        "Extraction produced {} assets ({} vertices, {} triangles), {} notices",
        assets.len(),
        assets.iter().map(ExtractedAsset::vertex_count).sum::<usize>(),
        assets.iter().map(ExtractedAsset::triangle_count).sum::<usize>(),
        notices.len()
    );

    Extraction {
        assets,
        notices,
        config,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use crate::scene::{MeshData, SceneObject, SourceKind, Transform};
    use crate::types::VertexAttributes;
    use nalgebra::Point3;

    fn single_triangle_scene() -> (Scene, ObjectId) {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(MeshData {
            name: "tri".into(),
            attributes: VertexAttributes {
                positions: vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
                ..Default::default()
            },
            submeshes: vec![vec![0, 1, 2]],
            ..Default::default()
        });
        let object = scene.add_object(SceneObject {
            name: "Tri".into(),
            transform: Transform::identity(),
            source: SourceKind::Static {
                mesh,
                materials: vec![],
            },
        });
        (scene, object)
    }

    #[test]
    fn test_empty_selection_is_notice() {
        let (scene, _) = single_triangle_scene();
        let result =
            extract_selection(&scene, &[], &ExtractConfig::default(), &mut NoProgress).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.notices, vec![Notice::NothingToExtract]);
    }

    #[test]
    fn test_unknown_object_is_error() {
        let (scene, _) = single_triangle_scene();
        let selection = [SelectedTriangle::new(ObjectId(7), 0, [0, 1, 2])];
        let result = extract_selection(&scene, &selection, &ExtractConfig::default(), &mut NoProgress);
        assert!(matches!(result, Err(ExtractError::UnknownObject { object: 7 })));
    }

    #[test]
    fn test_progress_reaches_done() {
        let (scene, object) = single_triangle_scene();
        let selection = scene.select_all(object).unwrap();

        let mut stages: Vec<(String, f32)> = Vec::new();
        let mut sink = |stage: &str, fraction: f32| stages.push((stage.to_string(), fraction));
        let result =
            extract_selection(&scene, &selection, &ExtractConfig::default(), &mut sink).unwrap();

        assert_eq!(result.assets.len(), 1);
        assert_eq!(result.assets[0].name, "Extracted");
        assert_eq!(stages.first().map(|s| s.0.as_str()), Some("Extracting"));
        assert_eq!(stages.last(), Some(&("Done".to_string(), 1.0)));
    }

    #[test]
    fn test_downgrade_notices_are_returned() {
        let (scene, object) = single_triangle_scene();
        let selection = scene.select_all(object).unwrap();
        let config = ExtractConfig {
            save_as_obj: true,
            extract_blend_shapes: true,
            ..Default::default()
        };

        let result = extract_selection(&scene, &selection, &config, &mut NoProgress).unwrap();
        assert!(!result.config.save_as_obj);
        assert!(result.notices.contains(&Notice::ObjExportDisabled));
    }
}
