//! Output assembly: turn reduced or combined meshes into finished assets.
//!
//! An asset is one of three kinds, checked in priority order:
//!
//! 1. **Skinned**: bone weights were requested and the mesh carries them. Holds the
//!    skin, a bone binding and optionally a copy of the bone hierarchy.
//! 2. **Shaped**: the mesh has blend shapes. Carries the root bone name and animator
//!    setup of the representative source.
//! 3. **Plain**: vertices, submeshes and materials only.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blend_shape::BlendShapeChannel;
use crate::bones::{BoneBinding, BoneHierarchy};
use crate::combine::CombinedMesh;
use crate::error::ExtractResult;
use crate::notice::Notice;
use crate::reduce::ReducedMesh;
use crate::scene::{AnimatorConfig, Scene, SceneObject};
use crate::skin::SkinData;
use crate::types::{Aabb, MaterialId, SubMesh, VertexAttributes};

/// Which bone data the assembler attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssembleOptions {
    pub bone_weights: bool,
    pub bone_transforms: bool,
}

/// Kind-specific payload of an [`ExtractedAsset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputKind {
    Plain,

    Skinned {
        skin: SkinData,

        /// `None` when the source had no resolvable root bone.
        #[serde(default)]
        binding: Option<BoneBinding>,

        /// Present only when bone transforms were requested.
        #[serde(default)]
        hierarchy: Option<BoneHierarchy>,
    },

    Shaped {
        #[serde(default)]
        root_bone: Option<String>,

        #[serde(default)]
        animator: Option<AnimatorConfig>,
    },
}

impl OutputKind {
    pub fn name(&self) -> &'static str {
        match self {
            OutputKind::Plain => "plain",
            OutputKind::Skinned { .. } => "skinned",
            OutputKind::Shaped { .. } => "shaped",
        }
    }
}

/// A finished mesh ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedAsset {
    pub name: String,

    pub attributes: VertexAttributes,

    pub submeshes: Vec<SubMesh>,

    /// Material list aligned with `submeshes`.
    pub materials: Vec<Option<MaterialId>>,

    /// Recomputed from the final positions. `None` for an empty mesh.
    pub bounds: Option<Aabb>,

    #[serde(default)]
    pub blend_shapes: Vec<BlendShapeChannel>,

    pub kind: OutputKind,
}

impl ExtractedAsset {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.attributes.vertex_count()
    }

    pub fn triangle_count(&self) -> usize {
        self.submeshes.iter().map(SubMesh::triangle_count).sum()
    }

    pub fn skin(&self) -> Option<&SkinData> {
        match &self.kind {
            OutputKind::Skinned { skin, .. } => Some(skin),
            _ => None,
        }
    }
}

/// Assemble the output for a single reduced source.
///
/// Returns the asset plus any notice raised while attaching bone data.
pub fn assemble_reduced(
    scene: &Scene,
    mesh: ReducedMesh,
    name: impl Into<String>,
    options: AssembleOptions,
) -> ExtractResult<(ExtractedAsset, Vec<Notice>)> {
    let object = scene.object(mesh.source)?;
    let mut notices = Vec::new();

    let kind = match mesh.skin {
        Some(skin) if options.bone_weights => {
            skinned_kind(scene, object, skin, options.bone_transforms, &mut notices)
        }
        _ if !mesh.blend_shapes.is_empty() => shaped_kind(scene, Some(object)),
        _ => OutputKind::Plain,
    };

    let asset = finish(
        name.into(),
        mesh.attributes,
        mesh.submeshes,
        mesh.blend_shapes,
        kind,
    );
    Ok((asset, notices))
}

/// Assemble the output for a combined mesh. Combined meshes never carry skin.
///
/// The first skinned source, if any, is the representative for a shaped output.
pub fn assemble_combined(
    scene: &Scene,
    mesh: CombinedMesh,
    name: impl Into<String>,
) -> ExtractResult<ExtractedAsset> {
    let kind = if mesh.blend_shapes.is_empty() {
        OutputKind::Plain
    } else {
        let mut representative = None;
        for &source in &mesh.sources {
            let object = scene.object(source)?;
            if object.source.is_skinned() {
                representative = Some(object);
                break;
            }
        }
        shaped_kind(scene, representative)
    };

    Ok(finish(
        name.into(),
        mesh.attributes,
        mesh.submeshes,
        mesh.blend_shapes,
        kind,
    ))
}

fn skinned_kind(
    scene: &Scene,
    object: &SceneObject,
    skin: SkinData,
    bone_transforms: bool,
    notices: &mut Vec<Notice>,
) -> OutputKind {
    let root = object
        .source
        .resolve_root_bone()
        .filter(|&root| scene.bone(root).is_some());

    let Some(root) = root else {
        notices.push(Notice::MissingRootBone {
            object: object.name.clone(),
        });
        return OutputKind::Skinned {
            skin,
            binding: None,
            hierarchy: None,
        };
    };

    let binding = BoneBinding::capture(scene, root, object.source.bones());
    let hierarchy = if bone_transforms {
        BoneHierarchy::copy_from(scene, root)
    } else {
        None
    };

    OutputKind::Skinned {
        skin,
        binding,
        hierarchy,
    }
}

fn shaped_kind(scene: &Scene, representative: Option<&SceneObject>) -> OutputKind {
    let root_bone = representative
        .and_then(|o| o.source.resolve_root_bone())
        .and_then(|b| scene.bone(b))
        .map(|b| b.name.clone());
    let animator = representative.and_then(|o| o.source.animator()).cloned();

    OutputKind::Shaped {
        root_bone,
        animator,
    }
}

fn finish(
    name: String,
    attributes: VertexAttributes,
    submeshes: Vec<SubMesh>,
    blend_shapes: Vec<BlendShapeChannel>,
    kind: OutputKind,
) -> ExtractedAsset {
    let bounds = attributes.bounds();
    let materials = submeshes.iter().map(|s| s.material).collect();

    debug!(
        "Assembled {} asset '{}': {} vertices, {} submeshes",
        kind.name(),
        name,
        attributes.vertex_count(),
        submeshes.len()
    );

    ExtractedAsset {
        name,
        attributes,
        submeshes,
        materials,
        bounds,
        blend_shapes,
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend_shape::BlendShapeFrame;
    use crate::combine::{combine, MaterialMerge};
    use crate::extract::{extract, ExtractOptions};
    use crate::reduce::{reduce, SubMeshGrouping};
    use crate::scene::{MeshData, SourceKind, Transform};
    use crate::skin::BoneWeight;
    use crate::types::{BoneId, ObjectId};
    use approx::assert_relative_eq;
    use nalgebra::{Matrix4, Point3, Vector3};

    fn quad_mesh() -> MeshData {
        MeshData {
            name: "quad".into(),
            attributes: VertexAttributes {
                positions: vec![
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(2.0, 0.0, 0.0),
                    Point3::new(2.0, 3.0, 0.0),
                    Point3::new(0.0, 3.0, 0.0),
                ],
                ..Default::default()
            },
            submeshes: vec![vec![0, 1, 2, 0, 2, 3]],
            bind_poses: vec![Matrix4::identity(), Matrix4::identity()],
            bones_per_vertex: vec![1, 1, 2, 1],
            bone_weights: vec![
                BoneWeight::new(0, 1.0),
                BoneWeight::new(1, 1.0),
                BoneWeight::new(0, 0.5),
                BoneWeight::new(1, 0.5),
                BoneWeight::new(1, 1.0),
            ],
            blend_shapes: vec![BlendShapeChannel {
                name: "smile".into(),
                frames: vec![BlendShapeFrame {
                    weight: 100.0,
                    delta_vertices: vec![Vector3::y(); 4],
                    ..Default::default()
                }],
            }],
        }
    }

    fn skinned_scene(root_bone: Option<BoneId>) -> (Scene, ObjectId) {
        let mut scene = Scene::new();
        let hips = scene.add_bone("hips", Transform::identity(), None);
        let spine = scene.add_bone("spine", Transform::identity(), Some(hips));
        let mesh = scene.add_mesh(quad_mesh());
        let object = scene.add_object(SceneObject {
            name: "Body".into(),
            transform: Transform::identity(),
            source: SourceKind::Skinned {
                shared_mesh: mesh,
                baked_mesh: None,
                materials: vec![],
                root_bone,
                bones: if root_bone.is_some() { vec![hips, spine] } else { vec![] },
                animator: Some(AnimatorConfig {
                    controller: Some("Locomotion".into()),
                    ..Default::default()
                }),
            },
        });
        (scene, object)
    }

    fn reduced(scene: &Scene, object: ObjectId, options: ExtractOptions) -> ReducedMesh {
        let buffers = extract(scene, object, &options).unwrap().unwrap();
        let selection = scene.select_all(object).unwrap();
        reduce(&buffers, &selection, SubMeshGrouping::ByMaterial)
    }

    #[test]
    fn test_skinned_output_with_hierarchy() {
        let (scene, object) = skinned_scene(Some(BoneId(0)));
        let options = ExtractOptions {
            bone_weights: true,
            blend_shapes: true,
            ..Default::default()
        };
        let mesh = reduced(&scene, object, options);

        let (asset, notices) = assemble_reduced(
            &scene,
            mesh,
            "Body",
            AssembleOptions {
                bone_weights: true,
                bone_transforms: true,
            },
        )
        .unwrap();

        assert!(notices.is_empty());
        let OutputKind::Skinned {
            skin,
            binding,
            hierarchy,
        } = &asset.kind
        else {
            panic!("expected skinned output, got {}", asset.kind.name());
        };
        assert_eq!(skin.weights.len(), 5);
        assert_eq!(binding.as_ref().unwrap().bone_paths[1].as_deref(), Some("spine"));
        assert_eq!(hierarchy.as_ref().unwrap().len(), 2);
        // Blend shapes ride along with the skinned output.
        assert_eq!(asset.blend_shapes.len(), 1);
    }

    #[test]
    fn test_missing_root_bone_keeps_weights() {
        let (scene, object) = skinned_scene(None);
        let options = ExtractOptions {
            bone_weights: true,
            ..Default::default()
        };
        let mesh = reduced(&scene, object, options);

        let (asset, notices) = assemble_reduced(
            &scene,
            mesh,
            "Body",
            AssembleOptions {
                bone_weights: true,
                bone_transforms: true,
            },
        )
        .unwrap();

        assert_eq!(
            notices,
            vec![Notice::MissingRootBone {
                object: "Body".into()
            }]
        );
        assert!(asset.skin().is_some());
        assert!(matches!(
            asset.kind,
            OutputKind::Skinned {
                binding: None,
                hierarchy: None,
                ..
            }
        ));
    }

    #[test]
    fn test_shaped_output_carries_animator() {
        let (scene, object) = skinned_scene(Some(BoneId(0)));
        let options = ExtractOptions {
            blend_shapes: true,
            ..Default::default()
        };
        let mesh = reduced(&scene, object, options);

        let (asset, _) = assemble_reduced(&scene, mesh, "Face", AssembleOptions::default()).unwrap();
        match &asset.kind {
            OutputKind::Shaped {
                root_bone,
                animator,
            } => {
                assert_eq!(root_bone.as_deref(), Some("hips"));
                assert_eq!(
                    animator.as_ref().and_then(|a| a.controller.as_deref()),
                    Some("Locomotion")
                );
            }
            other => panic!("expected shaped output, got {}", other.name()),
        }
    }

    #[test]
    fn test_plain_output_bounds_recomputed() {
        let (scene, object) = skinned_scene(Some(BoneId(0)));
        let mesh = reduced(&scene, object, ExtractOptions::default());

        let (asset, _) = assemble_reduced(&scene, mesh, "Plain", AssembleOptions::default()).unwrap();
        assert_eq!(asset.kind, OutputKind::Plain);
        let bounds = asset.bounds.unwrap();
        assert_relative_eq!(bounds.max, Point3::new(2.0, 3.0, 0.0));
        assert_eq!(asset.materials, vec![None]);
    }

    #[test]
    fn test_combined_shaped_uses_skinned_representative() {
        let (mut scene, skinned) = skinned_scene(Some(BoneId(1)));
        let static_mesh = scene.add_mesh(quad_mesh());
        let plain = scene.add_object(SceneObject {
            name: "Prop".into(),
            transform: Transform::identity(),
            source: SourceKind::Static {
                mesh: static_mesh,
                materials: vec![],
            },
        });
        let options = ExtractOptions {
            blend_shapes: true,
            ..Default::default()
        };
        let parts = vec![
            reduced(&scene, plain, options),
            reduced(&scene, skinned, options),
        ];

        let combined = combine(&parts, MaterialMerge::ByMaterial);
        let asset = assemble_combined(&scene, combined, "Both").unwrap();
        assert_eq!(asset.vertex_count(), 8);
        assert!(matches!(
            &asset.kind,
            OutputKind::Shaped { root_bone: Some(name), .. } if name == "spine"
        ));
    }
}
