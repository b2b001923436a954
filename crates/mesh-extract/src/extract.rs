//! Mesh buffer extraction: snapshot a scene object's mesh into plain arrays.

use nalgebra::Vector3;
use tracing::{debug, info, warn};

use crate::blend_shape::{sanitize_channels, BlendShapeChannel};
use crate::error::ExtractResult;
use crate::scene::Scene;
use crate::skin::SkinData;
use crate::types::{MaterialId, ObjectId, VertexAttributes};

/// What to pull from a source mesh and where to place it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractOptions {
    /// Copy bind poses and bone weights.
    pub bone_weights: bool,

    /// Copy blend shape frames.
    pub blend_shapes: bool,

    /// World-space pivot subtracted from positions when neither skin nor blend
    /// shapes are exported.
    pub pivot: Vector3<f32>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            bone_weights: false,
            blend_shapes: false,
            pivot: Vector3::zeros(),
        }
    }
}

impl ExtractOptions {
    /// Skin and blend shape data are only valid relative to the bind pose space.
    #[inline]
    pub fn keeps_bind_space(&self) -> bool {
        self.bone_weights || self.blend_shapes
    }
}

/// Immutable snapshot of one source mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMeshBuffers {
    /// Object the mesh was read from.
    pub object: ObjectId,

    pub name: String,

    /// Vertex channels in world space, or in the object's reference frame when the
    /// bind space is kept.
    pub attributes: VertexAttributes,

    /// Triangle lists per submesh, whole triangles only, all indices in range.
    pub submeshes: Vec<Vec<u32>>,

    /// Materials, index-aligned with `submeshes`. May be empty.
    pub materials: Vec<Option<MaterialId>>,

    pub skin: Option<SkinData>,

    pub blend_shapes: Vec<BlendShapeChannel>,
}

impl SourceMeshBuffers {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.attributes.vertex_count()
    }

    pub fn triangle_count(&self) -> usize {
        self.submeshes.iter().map(|s| s.len() / 3).sum()
    }

    /// Material assigned to a submesh, `None` if unassigned or out of range.
    pub fn material_for_submesh(&self, submesh: u32) -> Option<MaterialId> {
        self.materials.get(submesh as usize).copied().flatten()
    }

    /// First assigned material, used when submeshes are flattened.
    pub fn first_material(&self) -> Option<MaterialId> {
        self.materials.iter().flatten().next().copied()
    }
}

/// Snapshot the mesh of `object`.
///
/// Returns `Ok(None)` when the mesh has no triangles, which is a legitimate empty
/// case rather than an error. Errors only on dangling handles.
pub fn extract(
    scene: &Scene,
    object: ObjectId,
    options: &ExtractOptions,
) -> ExtractResult<Option<SourceMeshBuffers>> {
    let scene_object = scene.object(object)?;
    let keep_bind_space = options.keeps_bind_space();
    let mesh = scene.mesh_for(object, keep_bind_space)?;
    let transform = &scene_object.transform;

    let mut attributes = mesh.attributes.clone();
    for channel in attributes.drop_mismatched_channels() {
        warn!(
            "Mesh '{}' channel {} does not match {} vertices; treating it as absent",
            mesh.name,
            channel,
            attributes.vertex_count()
        );
    }
    let vertex_count = attributes.vertex_count();

    for p in &mut attributes.positions {
        let world = transform.transform_point(p);
        *p = if keep_bind_space {
            transform.inverse_transform_point(&world)
        } else {
            world
        };
    }
    if !keep_bind_space {
        attributes.recenter(options.pivot);
    }

    for n in &mut attributes.normals {
        let world = transform.transform_direction(n);
        *n = if keep_bind_space {
            transform.inverse_transform_direction(&world)
        } else {
            world
        };
    }

    let submeshes: Vec<Vec<u32>> = mesh
        .submeshes
        .iter()
        .enumerate()
        .map(|(s, indices)| sanitize_indices(&mesh.name, s, indices, vertex_count))
        .collect();

    let triangle_count: usize = submeshes.iter().map(|s| s.len() / 3).sum();
    if triangle_count == 0 {
        info!("Mesh '{}' has no triangles, nothing to extract", mesh.name);
        return Ok(None);
    }

    let skin = if options.bone_weights {
        let skin = SkinData::new(
            mesh.bind_poses.clone(),
            mesh.bones_per_vertex.clone(),
            mesh.bone_weights.clone(),
            vertex_count,
        );
        if skin.is_none() && !mesh.bone_weights.is_empty() {
            warn!(
                "Mesh '{}' bone weights are inconsistent with its vertex count; skipping them",
                mesh.name
            );
        }
        skin
    } else {
        None
    };

    let blend_shapes = if options.blend_shapes {
        sanitize_channels(&mesh.blend_shapes, vertex_count)
    } else {
        Vec::new()
    };

    debug!(
        "Extracted '{}' from '{}': {} vertices, {} submeshes, {} triangles, skin={}, blend shapes={}",
        mesh.name,
        scene_object.name,
        vertex_count,
        submeshes.len(),
        triangle_count,
        skin.is_some(),
        blend_shapes.len()
    );

    Ok(Some(SourceMeshBuffers {
        object,
        name: mesh.name.clone(),
        attributes,
        submeshes,
        materials: scene_object.source.materials().to_vec(),
        skin,
        blend_shapes,
    }))
}

/// Keep whole triangles whose corners index existing vertices.
fn sanitize_indices(mesh: &str, submesh: usize, indices: &[u32], vertex_count: usize) -> Vec<u32> {
    let mut clean = Vec::with_capacity(indices.len());
    let mut dropped = indices.len() % 3;

    for tri in indices.chunks_exact(3) {
        if tri.iter().all(|&i| (i as usize) < vertex_count) {
            clean.extend_from_slice(tri);
        } else {
            dropped += 3;
        }
    }

    if dropped > 0 {
        warn!(
            "Mesh '{}' submesh {} has {} invalid indices; ignoring them",
            mesh, submesh, dropped
        );
    }
    clean
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend_shape::BlendShapeFrame;
    use crate::scene::{MeshData, SceneObject, SourceKind, Transform};
    use crate::skin::BoneWeight;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector2};

    fn triangle_mesh() -> MeshData {
        MeshData {
            name: "tri".into(),
            attributes: VertexAttributes {
                positions: vec![
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(0.0, 1.0, 0.0),
                ],
                normals: vec![Vector3::z(); 3],
                ..Default::default()
            },
            submeshes: vec![vec![0, 1, 2]],
            ..Default::default()
        }
    }

    fn scene_with(mesh: MeshData, transform: Transform) -> (Scene, ObjectId) {
        let mut scene = Scene::new();
        let mat = scene.add_material("mat");
        let mesh = scene.add_mesh(mesh);
        let obj = scene.add_object(SceneObject {
            name: "obj".into(),
            transform,
            source: SourceKind::Static {
                mesh,
                materials: vec![Some(mat)],
            },
        });
        (scene, obj)
    }

    #[test]
    fn test_world_space_with_pivot() {
        let (scene, obj) = scene_with(
            triangle_mesh(),
            Transform::from_translation(Vector3::new(10.0, 0.0, 0.0)),
        );
        let options = ExtractOptions {
            pivot: Vector3::new(1.0, 1.0, 1.0),
            ..Default::default()
        };

        let buffers = extract(&scene, obj, &options).unwrap().expect("has triangles");
        assert_relative_eq!(buffers.attributes.positions[1], Point3::new(10.0, -1.0, -1.0));
        assert_eq!(buffers.materials.len(), 1);
        assert!(buffers.skin.is_none());
    }

    #[test]
    fn test_bind_space_ignores_pivot_and_transform() {
        let (scene, obj) = scene_with(
            triangle_mesh(),
            Transform::from_translation(Vector3::new(10.0, 0.0, 0.0)),
        );
        let options = ExtractOptions {
            blend_shapes: true,
            pivot: Vector3::new(1.0, 1.0, 1.0),
            ..Default::default()
        };

        let buffers = extract(&scene, obj, &options).unwrap().unwrap();
        assert_relative_eq!(
            buffers.attributes.positions[1],
            Point3::new(1.0, 0.0, 0.0),
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_mismatched_channel_is_absent() {
        let mut mesh = triangle_mesh();
        mesh.attributes.uvs[1] = vec![Vector2::zeros(); 2];
        let (scene, obj) = scene_with(mesh, Transform::identity());

        let buffers = extract(&scene, obj, &ExtractOptions::default()).unwrap().unwrap();
        assert!(buffers.attributes.uvs[1].is_empty());
        assert_eq!(buffers.attributes.normals.len(), 3);
    }

    #[test]
    fn test_invalid_triangles_dropped_and_empty_is_none() {
        let mut mesh = triangle_mesh();
        mesh.submeshes = vec![vec![0, 1, 5, 2]];
        let (scene, obj) = scene_with(mesh, Transform::identity());

        let result = extract(&scene, obj, &ExtractOptions::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_skin_and_blend_shapes_copied_on_request() {
        let mut mesh = triangle_mesh();
        mesh.bones_per_vertex = vec![1, 1, 1];
        mesh.bone_weights = vec![BoneWeight::new(0, 1.0); 3];
        mesh.bind_poses = vec![nalgebra::Matrix4::identity()];
        mesh.blend_shapes = vec![BlendShapeChannel {
            name: "bulge".into(),
            frames: vec![BlendShapeFrame {
                weight: 100.0,
                delta_vertices: vec![Vector3::x(); 3],
                ..Default::default()
            }],
        }];
        let (scene, obj) = scene_with(mesh, Transform::identity());

        let plain = extract(&scene, obj, &ExtractOptions::default()).unwrap().unwrap();
        assert!(plain.skin.is_none());
        assert!(plain.blend_shapes.is_empty());

        let options = ExtractOptions {
            bone_weights: true,
            blend_shapes: true,
            ..Default::default()
        };
        let full = extract(&scene, obj, &options).unwrap().unwrap();
        assert_eq!(full.skin.as_ref().unwrap().weights.len(), 3);
        assert_eq!(full.blend_shapes.len(), 1);
    }
}
