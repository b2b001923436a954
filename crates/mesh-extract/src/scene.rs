//! Input model: the scene the selection was made in.
//!
//! Everything is stored in flat arenas and addressed by integer handles
//! ([`MeshId`], [`ObjectId`], [`BoneId`], [`MaterialId`]). Material identity is
//! handle identity.

use std::path::PathBuf;

use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::blend_shape::BlendShapeChannel;
use crate::error::{ExtractError, ExtractResult};
use crate::skin::BoneWeight;
use crate::types::{BoneId, MaterialId, MeshId, ObjectId, VertexAttributes};

/// Translation, rotation and (possibly non-uniform) scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::repeat(1.0),
        }
    }

    pub fn from_translation(translation: Vector3<f32>) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    /// Local point to parent/world space.
    pub fn transform_point(&self, p: &Point3<f32>) -> Point3<f32> {
        let scaled = p.coords.component_mul(&self.scale);
        Point3::from(self.rotation * scaled + self.translation)
    }

    /// Parent/world point to local space. Zero scale axes collapse to zero.
    pub fn inverse_transform_point(&self, p: &Point3<f32>) -> Point3<f32> {
        let local = self.rotation.inverse() * (p.coords - self.translation);
        Point3::from(local.zip_map(&self.scale, safe_div))
    }

    /// Rotate a direction into parent/world space. Scale is ignored.
    pub fn transform_direction(&self, v: &Vector3<f32>) -> Vector3<f32> {
        self.rotation * v
    }

    /// Rotate a parent/world direction into local space. Scale is ignored.
    pub fn inverse_transform_direction(&self, v: &Vector3<f32>) -> Vector3<f32> {
        self.rotation.inverse() * v
    }
}

#[inline]
fn safe_div(a: f32, b: f32) -> f32 {
    if b.abs() > f32::EPSILON {
        a / b
    } else {
        0.0
    }
}

/// A mesh asset: vertex data, submesh index lists, optional skin and blend shapes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub name: String,

    #[serde(flatten)]
    pub attributes: VertexAttributes,

    /// One flat triangle list per submesh.
    #[serde(default)]
    pub submeshes: Vec<Vec<u32>>,

    #[serde(default)]
    pub bind_poses: Vec<Matrix4<f32>>,

    /// Number of weights per vertex; the weights themselves are stored flat in
    /// `bone_weights`, vertex by vertex.
    #[serde(default)]
    pub bones_per_vertex: Vec<u8>,

    #[serde(default)]
    pub bone_weights: Vec<BoneWeight>,

    #[serde(default)]
    pub blend_shapes: Vec<BlendShapeChannel>,
}

impl MeshData {
    /// Total triangle count over all submeshes.
    pub fn triangle_count(&self) -> usize {
        self.submeshes.iter().map(|s| s.len() / 3).sum()
    }
}

/// A material entry. Only the name and main texture matter to extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,

    #[serde(default)]
    pub diffuse_texture: Option<PathBuf>,
}

/// Animation setup carried over to shaped outputs. Opaque to extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimatorConfig {
    #[serde(default)]
    pub controller: Option<String>,

    #[serde(default)]
    pub avatar: Option<String>,

    #[serde(default)]
    pub apply_root_motion: bool,
}

/// The renderer that owns a selected mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    /// A plain mesh renderer.
    Static {
        mesh: MeshId,
        #[serde(default)]
        materials: Vec<Option<MaterialId>>,
    },

    /// A skinned renderer.
    Skinned {
        /// The bind-pose mesh shared by all instances.
        shared_mesh: MeshId,

        /// A snapshot of the currently deformed vertices, if the caller baked one.
        #[serde(default)]
        baked_mesh: Option<MeshId>,

        #[serde(default)]
        materials: Vec<Option<MaterialId>>,

        #[serde(default)]
        root_bone: Option<BoneId>,

        #[serde(default)]
        bones: Vec<BoneId>,

        #[serde(default)]
        animator: Option<AnimatorConfig>,
    },
}

impl SourceKind {
    /// Materials, index-aligned with the mesh's submeshes.
    pub fn materials(&self) -> &[Option<MaterialId>] {
        match self {
            SourceKind::Static { materials, .. } | SourceKind::Skinned { materials, .. } => {
                materials
            }
        }
    }

    /// Mesh to read. Skin and blend-shape export need the undeformed shared mesh;
    /// otherwise a baked snapshot is preferred when one exists.
    pub fn mesh(&self, want_bind_pose: bool) -> MeshId {
        match self {
            SourceKind::Static { mesh, .. } => *mesh,
            SourceKind::Skinned {
                shared_mesh,
                baked_mesh,
                ..
            } => {
                if want_bind_pose {
                    *shared_mesh
                } else {
                    baked_mesh.unwrap_or(*shared_mesh)
                }
            }
        }
    }

    /// Root bone, falling back to the first bone of the renderer.
    pub fn resolve_root_bone(&self) -> Option<BoneId> {
        match self {
            SourceKind::Static { .. } => None,
            SourceKind::Skinned {
                root_bone, bones, ..
            } => root_bone.or_else(|| bones.first().copied()),
        }
    }

    pub fn bones(&self) -> &[BoneId] {
        match self {
            SourceKind::Static { .. } => &[],
            SourceKind::Skinned { bones, .. } => bones,
        }
    }

    pub fn animator(&self) -> Option<&AnimatorConfig> {
        match self {
            SourceKind::Static { .. } => None,
            SourceKind::Skinned { animator, .. } => animator.as_ref(),
        }
    }

    pub fn is_skinned(&self) -> bool {
        matches!(self, SourceKind::Skinned { .. })
    }
}

/// A scene object owning a renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,

    /// World transform. For skinned renderers this is also the reference frame the
    /// bind poses were authored against.
    #[serde(default)]
    pub transform: Transform,

    pub source: SourceKind,
}

/// A node of a bone hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneNode {
    pub name: String,

    #[serde(default)]
    pub local: Transform,

    #[serde(default)]
    pub parent: Option<BoneId>,

    #[serde(default)]
    pub children: Vec<BoneId>,
}

/// All inputs a selection can refer to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub meshes: Vec<MeshData>,

    #[serde(default)]
    pub objects: Vec<SceneObject>,

    #[serde(default)]
    pub bones: Vec<BoneNode>,

    #[serde(default)]
    pub materials: Vec<Material>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: MeshData) -> MeshId {
        self.meshes.push(mesh);
        MeshId(self.meshes.len() as u32 - 1)
    }

    pub fn add_object(&mut self, object: SceneObject) -> ObjectId {
        self.objects.push(object);
        ObjectId(self.objects.len() as u32 - 1)
    }

    pub fn add_material(&mut self, name: impl Into<String>) -> MaterialId {
        self.materials.push(Material {
            name: name.into(),
            diffuse_texture: None,
        });
        MaterialId(self.materials.len() as u32 - 1)
    }

    /// Add a bone and link it below `parent`.
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        local: Transform,
        parent: Option<BoneId>,
    ) -> BoneId {
        let id = BoneId(self.bones.len() as u32);
        self.bones.push(BoneNode {
            name: name.into(),
            local,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent.and_then(|p| self.bones.get_mut(p.index())) {
            parent.children.push(id);
        }
        id
    }

    pub fn object(&self, id: ObjectId) -> ExtractResult<&SceneObject> {
        self.objects
            .get(id.index())
            .ok_or(ExtractError::UnknownObject { object: id.0 })
    }

    pub fn mesh(&self, id: MeshId) -> Option<&MeshData> {
        self.meshes.get(id.index())
    }

    pub fn bone(&self, id: BoneId) -> Option<&BoneNode> {
        self.bones.get(id.index())
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.index())
    }

    /// Resolve the mesh an object reads for the given mode.
    pub fn mesh_for(&self, id: ObjectId, want_bind_pose: bool) -> ExtractResult<&MeshData> {
        let object = self.object(id)?;
        let mesh_id = object.source.mesh(want_bind_pose);
        self.mesh(mesh_id).ok_or_else(|| ExtractError::UnknownMesh {
            object: object.name.clone(),
            mesh: mesh_id.0,
        })
    }

    /// Select every triangle of an object's mesh.
    pub fn select_all(&self, id: ObjectId) -> ExtractResult<Vec<SelectedTriangle>> {
        let mesh = self.mesh_for(id, true)?;
        Ok(mesh
            .submeshes
            .iter()
            .enumerate()
            .flat_map(|(s, indices)| {
                indices
                    .chunks_exact(3)
                    .map(move |c| SelectedTriangle::new(id, s as u32, [c[0], c[1], c[2]]))
            })
            .collect())
    }
}

/// A triangle picked by the caller: owning object, submesh and original corner indices.
///
/// Ordering is lexicographic over (object, submesh, corners), which gives selections a
/// canonical order independent of how they were assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SelectedTriangle {
    pub object: ObjectId,
    pub submesh: u32,
    pub indices: [u32; 3],
}

impl SelectedTriangle {
    pub fn new(object: ObjectId, submesh: u32, indices: [u32; 3]) -> Self {
        Self {
            object,
            submesh,
            indices,
        }
    }
}
