//! Mesh extraction from triangle selections.
//!
//! This crate rebuilds standalone meshes from triangles picked on existing scene
//! objects. Common operations include:
//!
//! - **Extraction**: snapshot a static or skinned source into plain vertex buffers
//! - **Reduction**: keep only the selected triangles and the vertices they use
//! - **Combination**: merge several reduced meshes into one buffer
//! - **Assembly**: attach bone weights, bone hierarchy copies or blend shapes
//! - **Saving**: native JSON assets or Wavefront OBJ with materials
//!
//! # Example
//!
//! ```no_run
//! use mesh_extract::{extract_selection, io, ExtractConfig, NoProgress};
//! use std::path::Path;
//!
//! let scene = io::load_scene(Path::new("scene.json")).unwrap();
//! let selection = io::load_selection(Path::new("selection.json")).unwrap();
//!
//! let config = ExtractConfig::default();
//! let result = extract_selection(&scene, &selection, &config, &mut NoProgress).unwrap();
//!
//! for notice in &result.notices {
//!     println!("{}", notice);
//! }
//! for asset in &result.assets {
//!     println!("{}", asset.validate());
//! }
//! ```

mod error;
mod notice;
mod types;

pub mod assemble;
pub mod blend_shape;
pub mod bones;
pub mod combine;
pub mod config;
pub mod extract;
pub mod io;
pub mod pipeline;
pub mod reduce;
pub mod scene;
pub mod skin;
pub mod validate;

// Re-export core types at crate root
pub use error::{ExtractError, ExtractResult};
pub use notice::{Notice, Severity};
pub use types::{
    Aabb, BoneId, Channel, Color, MaterialId, MeshId, ObjectId, SubMesh, VertexAttributes,
    MAX_UV_CHANNELS,
};

// Re-export commonly used items
pub use assemble::{ExtractedAsset, OutputKind};
pub use blend_shape::{BlendShapeChannel, BlendShapeFrame};
pub use bones::{BoneBinding, BoneHierarchy, MAX_BONE_DEPTH};
pub use combine::{combine, CombinedMesh, MaterialMerge};
pub use config::ExtractConfig;
pub use extract::{extract, ExtractOptions, SourceMeshBuffers};
pub use io::{load_asset, load_scene, load_selection, save_asset, OutputFormat, SaveOptions};
pub use pipeline::{extract_selection, Extraction, NoProgress, ProgressSink};
pub use reduce::{reduce, IndexRemap, ReducedMesh, SubMeshGrouping};
pub use scene::{
    AnimatorConfig, BoneNode, Material, MeshData, Scene, SceneObject, SelectedTriangle,
    SourceKind, Transform,
};
pub use skin::{BoneWeight, SkinData};
pub use validate::{validate_asset, MeshReport};

// Convenience methods on ExtractedAsset
impl ExtractedAsset {
    /// Validate the asset and return a report of any issues.
    pub fn validate(&self) -> MeshReport {
        validate::validate_asset(self)
    }

    /// Save the asset as native JSON.
    pub fn save_json(&self, path: impl AsRef<std::path::Path>) -> ExtractResult<()> {
        io::save_asset_json(self, path.as_ref())
    }

    /// Load a native JSON asset.
    pub fn load(path: impl AsRef<std::path::Path>) -> ExtractResult<Self> {
        io::load_asset(path.as_ref())
    }
}
