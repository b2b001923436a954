//! Recoverable conditions reported back to the caller.

use std::fmt;

use tracing::{info, warn};

use crate::types::Channel;

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Something the pipeline adjusted or skipped without failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The selection produced no triangles.
    NothingToExtract,

    /// OBJ output was requested together with bone weights or blend shapes.
    ObjExportDisabled,

    /// Bone transforms were requested without bone weights.
    BoneTransformsNeedWeights,

    /// Meshes were not combined because bone weights are exported.
    CombineDisabledForBoneWeights,

    /// A skinned source has no root bone; its hierarchy could not be captured.
    MissingRootBone { object: String },

    /// Channels present on only some of the combined inputs were removed.
    ChannelsDropped { channels: Vec<Channel> },
}

impl Notice {
    pub fn severity(&self) -> Severity {
        match self {
            Notice::NothingToExtract
            | Notice::ObjExportDisabled
            | Notice::BoneTransformsNeedWeights
            | Notice::CombineDisabledForBoneWeights
            | Notice::ChannelsDropped { .. } => Severity::Info,
            Notice::MissingRootBone { .. } => Severity::Warning,
        }
    }

    /// Emit the notice through `tracing` at its severity.
    pub fn log(&self) {
        match self.severity() {
            Severity::Info => info!("{}", self),
            Severity::Warning => warn!("{}", self),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NothingToExtract => write!(f, "Nothing to extract"),
            Notice::ObjExportDisabled => write!(
                f,
                "OBJ cannot hold bone weights or blend shapes; saving a native asset instead"
            ),
            Notice::BoneTransformsNeedWeights => {
                write!(f, "Bone transforms need bone weights; skipping bone transforms")
            }
            Notice::CombineDisabledForBoneWeights => write!(
                f,
                "Meshes with bone weights can't be combined; saving one asset per source"
            ),
            Notice::MissingRootBone { object } => write!(
                f,
                "'{}' has no root bone; bone weights are kept but bones can't be re-linked",
                object
            ),
            Notice::ChannelsDropped { channels } => {
                let names: Vec<String> = channels.iter().map(|c| c.to_string()).collect();
                write!(
                    f,
                    "Dropped channels missing on some combined meshes: {}",
                    names.join(", ")
                )
            }
        }
    }
}
