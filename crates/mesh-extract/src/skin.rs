//! Skinning data: bind poses and variable-count bone weights.

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

/// Influence of one bone on one vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoneWeight {
    /// Index into the renderer's bone list / the bind pose array.
    pub bone_index: u32,
    pub weight: f32,
}

impl BoneWeight {
    pub fn new(bone_index: u32, weight: f32) -> Self {
        Self { bone_index, weight }
    }
}

/// Bind poses plus per-vertex weights.
///
/// `weights` is flat: the first `bones_per_vertex[0]` entries belong to vertex 0, the
/// next `bones_per_vertex[1]` to vertex 1 and so on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkinData {
    pub bind_poses: Vec<Matrix4<f32>>,
    pub bones_per_vertex: Vec<u8>,
    pub weights: Vec<BoneWeight>,
}

impl SkinData {
    /// Build skin data, or `None` when the arrays are empty or inconsistent with
    /// `vertex_count`.
    pub fn new(
        bind_poses: Vec<Matrix4<f32>>,
        bones_per_vertex: Vec<u8>,
        weights: Vec<BoneWeight>,
        vertex_count: usize,
    ) -> Option<Self> {
        if weights.is_empty() || bones_per_vertex.len() != vertex_count {
            return None;
        }
        let total: usize = bones_per_vertex.iter().map(|&n| n as usize).sum();
        if total != weights.len() {
            return None;
        }
        Some(Self {
            bind_poses,
            bones_per_vertex,
            weights,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.bones_per_vertex.len()
    }

    /// Start offset of every vertex's weights in the flat array.
    fn offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.bones_per_vertex.len());
        let mut running = 0usize;
        for &count in &self.bones_per_vertex {
            offsets.push(running);
            running += count as usize;
        }
        offsets
    }

    /// Keep only the vertices at `retained`, in that order. Bind poses are copied whole.
    pub fn gather(&self, retained: &[u32]) -> Self {
        let offsets = self.offsets();
        let mut bones_per_vertex = Vec::with_capacity(retained.len());
        let mut weights = Vec::new();

        for &v in retained {
            let v = v as usize;
            let count = self.bones_per_vertex[v];
            bones_per_vertex.push(count);
            weights.extend_from_slice(&self.weights[offsets[v]..offsets[v] + count as usize]);
        }

        Self {
            bind_poses: self.bind_poses.clone(),
            bones_per_vertex,
            weights,
        }
    }
}
