//! Extraction configuration.
//!
//! All switches are plain booleans. Interactions between them are resolved by
//! [`ExtractConfig::normalized`], which downgrades unsupported combinations and reports
//! what it changed.

use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, ExtractResult};
use crate::notice::Notice;

/// Options consumed by [`crate::extract_selection`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Base name of the produced assets.
    pub name: String,

    /// Overwrite existing output files instead of picking a unique name.
    pub replace_existing: bool,

    /// Keep submeshes; otherwise every output has a single submesh.
    pub preserve_submeshes: bool,

    /// Group submeshes by material identity instead of by original submesh index.
    pub combine_submeshes_by_material: bool,

    /// Merge the results of all source objects into one mesh.
    pub combine_meshes: bool,

    /// Write a Wavefront OBJ instead of a native asset.
    pub save_as_obj: bool,

    /// Copy material textures next to the output.
    pub extract_textures: bool,

    pub extract_bone_weights: bool,

    /// Copy the bone hierarchy into the output. Needs bone weights.
    pub extract_bone_transforms: bool,

    pub extract_blend_shapes: bool,

    /// World-space pivot of the output. Ignored when skin or blend shapes are exported.
    pub pivot: Vector3<f32>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            name: "Extracted".to_string(),
            replace_existing: false,
            preserve_submeshes: true,
            combine_submeshes_by_material: true,
            combine_meshes: true,
            save_as_obj: false,
            extract_textures: false,
            extract_bone_weights: false,
            extract_bone_transforms: false,
            extract_blend_shapes: false,
            pivot: Vector3::zeros(),
        }
    }
}

impl ExtractConfig {
    /// Resolve unsupported switch combinations.
    ///
    /// - OBJ output can hold neither skin nor blend shapes: fall back to a native asset.
    /// - Bone transforms without bone weights have nothing to bind to: disable them.
    pub fn normalized(&self) -> (Self, Vec<Notice>) {
        let mut config = self.clone();
        let mut notices = Vec::new();

        if config.save_as_obj && (config.extract_bone_weights || config.extract_blend_shapes) {
            config.save_as_obj = false;
            notices.push(Notice::ObjExportDisabled);
        }

        if config.extract_bone_transforms && !config.extract_bone_weights {
            config.extract_bone_transforms = false;
            notices.push(Notice::BoneTransformsNeedWeights);
        }

        (config, notices)
    }

    /// Parse from TOML text.
    pub fn from_toml(text: &str) -> ExtractResult<Self> {
        toml::from_str(text).map_err(|e| ExtractError::Config {
            details: e.to_string(),
        })
    }

    pub fn to_toml(&self) -> ExtractResult<String> {
        toml::to_string_pretty(self).map_err(|e| ExtractError::Config {
            details: e.to_string(),
        })
    }

    /// Parse from JSON text.
    pub fn from_json(text: &str) -> ExtractResult<Self> {
        serde_json::from_str(text).map_err(|e| ExtractError::Config {
            details: e.to_string(),
        })
    }

    pub fn to_json(&self) -> ExtractResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ExtractError::Config {
            details: e.to_string(),
        })
    }

    /// Load a config file, choosing the parser from the extension (`.toml` or `.json`).
    pub fn load(path: &Path) -> ExtractResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ExtractError::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        let parse_error = |details: String| ExtractError::ParseError {
            path: path.to_path_buf(),
            details,
        };

        match extension.as_deref() {
            Some("toml") => toml::from_str(&text).map_err(|e| parse_error(e.to_string())),
            Some("json") => serde_json::from_str(&text).map_err(|e| parse_error(e.to_string())),
            _ => Err(ExtractError::UnsupportedFormat { extension }),
        }
    }
}
