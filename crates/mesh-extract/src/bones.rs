//! Bone hierarchy copies and deferred bone binding.
//!
//! A skinned output references bones by path relative to its root bone, so the weights
//! can be re-linked to whatever hierarchy the output is later instantiated under.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::scene::{Scene, Transform};
use crate::types::BoneId;

/// Maximum hierarchy depth followed when copying or walking a rig.
///
/// Malformed or cyclic rigs are cut off here.
pub const MAX_BONE_DEPTH: usize = 50;

/// One bone of a copied hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopiedBone {
    pub name: String,
    pub local: Transform,
    /// Index of the parent in [`BoneHierarchy::bones`]; `None` for the root.
    pub parent: Option<usize>,
}

/// A detached copy of a bone hierarchy. Index 0 is the root, parents precede children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoneHierarchy {
    pub bones: Vec<CopiedBone>,
}

impl BoneHierarchy {
    /// Copy `root` and everything below it, depth first, up to [`MAX_BONE_DEPTH`].
    pub fn copy_from(scene: &Scene, root: BoneId) -> Option<Self> {
        let root_node = scene.bone(root)?;
        let mut bones = vec![CopiedBone {
            name: root_node.name.clone(),
            local: root_node.local,
            parent: None,
        }];

        let mut visited: HashSet<BoneId> = HashSet::new();
        visited.insert(root);

        let mut truncated = false;
        let mut stack: Vec<(BoneId, usize, usize)> = vec![(root, 0, 0)];

        while let Some((id, copied_index, depth)) = stack.pop() {
            let Some(node) = scene.bone(id) else {
                continue;
            };
            if node.children.is_empty() {
                continue;
            }
            if depth + 1 >= MAX_BONE_DEPTH {
                truncated = true;
                continue;
            }

            // Reverse so children pop in declaration order.
            for &child in node.children.iter().rev() {
                if !visited.insert(child) {
                    continue;
                }
                let Some(child_node) = scene.bone(child) else {
                    continue;
                };
                bones.push(CopiedBone {
                    name: child_node.name.clone(),
                    local: child_node.local,
                    parent: Some(copied_index),
                });
                stack.push((child, bones.len() - 1, depth + 1));
            }
        }

        if truncated {
            warn!(
                "Bone hierarchy below '{}' is deeper than {} levels; deeper bones were not copied",
                root_node.name, MAX_BONE_DEPTH
            );
        }

        Some(Self { bones })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Path of a bone relative to the root: `""` for the root, `"spine/chest"` below it.
    pub fn path_of(&self, index: usize) -> Option<String> {
        let mut names = Vec::new();
        let mut current = self.bones.get(index)?;
        let mut guard = 0;
        while let Some(parent) = current.parent {
            names.push(current.name.as_str());
            current = self.bones.get(parent)?;
            guard += 1;
            if guard > MAX_BONE_DEPTH {
                return None;
            }
        }
        names.reverse();
        Some(names.join("/"))
    }

    /// Map every bone path to its index. The first bone wins on duplicate paths.
    pub fn path_index(&self) -> HashMap<String, usize> {
        let mut index = HashMap::with_capacity(self.bones.len());
        for i in 0..self.bones.len() {
            if let Some(path) = self.path_of(i) {
                index.entry(path).or_insert(i);
            }
        }
        index
    }
}

/// Bone references of a skinned output, recorded relative to its root bone.
///
/// `bone_paths[i]` belongs to bone index `i` of the bone weights. `None` marks a bone
/// that is not below the root bone and can't be re-linked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoneBinding {
    pub root_bone: String,
    pub bone_paths: Vec<Option<String>>,
}

impl BoneBinding {
    /// Record the path of every renderer bone relative to `root`.
    pub fn capture(scene: &Scene, root: BoneId, bones: &[BoneId]) -> Option<Self> {
        let root_node = scene.bone(root)?;
        let bone_paths: Vec<Option<String>> = bones
            .iter()
            .map(|&bone| relative_path(scene, root, bone))
            .collect();

        let unresolved = bone_paths.iter().filter(|p| p.is_none()).count();
        if unresolved > 0 {
            warn!(
                "{} bones are not below root bone '{}' and will not be re-linked",
                unresolved, root_node.name
            );
        }

        Some(Self {
            root_bone: root_node.name.clone(),
            bone_paths,
        })
    }

    /// Resolve every recorded bone against an instantiated hierarchy.
    ///
    /// Returns, per bone, the index into `hierarchy.bones` or `None` if not found.
    pub fn resolve(&self, hierarchy: &BoneHierarchy) -> Vec<Option<usize>> {
        let index = hierarchy.path_index();
        self.bone_paths
            .iter()
            .map(|path| path.as_ref().and_then(|p| index.get(p).copied()))
            .collect()
    }
}

/// Path of `bone` relative to `root` by walking parents.
fn relative_path(scene: &Scene, root: BoneId, bone: BoneId) -> Option<String> {
    let mut names = Vec::new();
    let mut current = bone;
    for _ in 0..MAX_BONE_DEPTH {
        if current == root {
            names.reverse();
            return Some(names.join("/"));
        }
        let node = scene.bone(current)?;
        names.push(node.name.as_str());
        current = node.parent?;
    }
    None
}
