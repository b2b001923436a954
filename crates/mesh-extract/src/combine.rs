//! Combining several reduced meshes into one vertex buffer.

use tracing::{debug, info, warn};

use crate::blend_shape::{merge_channels, BlendShapeChannel};
use crate::reduce::ReducedMesh;
use crate::types::{Channel, MaterialId, ObjectId, SubMesh, VertexAttributes};

/// How submeshes of different inputs end up in the combined mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaterialMerge {
    /// One output submesh per distinct material over all inputs (first-seen order).
    #[default]
    ByMaterial,

    /// Output submesh `s` collects submesh `s` of every input that has one. The slot
    /// takes the first non-null material found for it.
    BySlot,
}

impl MaterialMerge {
    pub fn from_flag(combine_by_material: bool) -> Self {
        if combine_by_material {
            MaterialMerge::ByMaterial
        } else {
            MaterialMerge::BySlot
        }
    }
}

/// Union of several reduced meshes.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedMesh {
    /// Source object of every input, in input order.
    pub sources: Vec<ObjectId>,

    pub attributes: VertexAttributes,

    pub submeshes: Vec<SubMesh>,

    /// Blend shapes merged by channel name over all inputs.
    pub blend_shapes: Vec<BlendShapeChannel>,

    /// Index offset applied to each input (running sum of prior vertex counts).
    pub offsets: Vec<u32>,

    /// Channels present on some inputs only, removed from the result.
    pub dropped_channels: Vec<Channel>,
}

impl CombinedMesh {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.attributes.vertex_count()
    }

    pub fn materials(&self) -> Vec<Option<MaterialId>> {
        self.submeshes.iter().map(|s| s.material).collect()
    }
}

/// Concatenate `meshes` into one buffer, offsetting every input's indices by the
/// number of vertices placed before it.
///
/// Skin data is not combined; inputs carrying it lose it with a warning.
pub fn combine(meshes: &[ReducedMesh], merge: MaterialMerge) -> CombinedMesh {
    let total: usize = meshes.iter().map(ReducedMesh::vertex_count).sum();

    let mut attributes = VertexAttributes::default();
    attributes.positions.reserve(total);
    let mut offsets = Vec::with_capacity(meshes.len());

    for mesh in meshes {
        offsets.push(attributes.vertex_count() as u32);
        attributes.append(&mesh.attributes);
        if mesh.skin.is_some() {
            warn!("Bone weights of '{}' are not carried into combined meshes", mesh.name);
        }
    }

    let mut dropped_channels = Vec::new();
    for channel in Channel::all() {
        let mut inputs = meshes.iter().filter(|m| m.vertex_count() > 0);
        let present = inputs.clone().any(|m| m.attributes.has(channel));
        let complete = inputs.all(|m| m.attributes.has(channel));
        if present && !complete {
            info!("Channel {} is missing on some inputs; dropping it from the combined mesh", channel);
            attributes.clear(channel);
            dropped_channels.push(channel);
        }
    }

    let submeshes = match merge {
        MaterialMerge::ByMaterial => merge_by_material(meshes, &offsets),
        MaterialMerge::BySlot => merge_by_slot(meshes, &offsets),
    };

    let blend_shapes = if meshes.iter().any(|m| !m.blend_shapes.is_empty()) {
        let parts: Vec<(usize, &[BlendShapeChannel])> = meshes
            .iter()
            .map(|m| (m.vertex_count(), m.blend_shapes.as_slice()))
            .collect();
        merge_channels(&parts)
    } else {
        Vec::new()
    };

    debug!(
        "Combined {} meshes: {} vertices, {} submeshes, {} blend shapes",
        meshes.len(),
        attributes.vertex_count(),
        submeshes.len(),
        blend_shapes.len()
    );

    CombinedMesh {
        sources: meshes.iter().map(|m| m.source).collect(),
        attributes,
        submeshes,
        blend_shapes,
        offsets,
        dropped_channels,
    }
}

fn append_offset(dst: &mut Vec<u32>, src: &[u32], offset: u32) {
    dst.extend(src.iter().map(|&i| i + offset));
}

fn merge_by_material(meshes: &[ReducedMesh], offsets: &[u32]) -> Vec<SubMesh> {
    let mut materials: Vec<Option<MaterialId>> = Vec::new();
    for sub in meshes.iter().flat_map(|m| &m.submeshes) {
        if !materials.contains(&sub.material) {
            materials.push(sub.material);
        }
    }

    materials
        .into_iter()
        .map(|material| {
            let mut indices = Vec::new();
            for (mesh, &offset) in meshes.iter().zip(offsets) {
                for sub in mesh.submeshes.iter().filter(|s| s.material == material) {
                    append_offset(&mut indices, &sub.indices, offset);
                }
            }
            SubMesh::new(indices, material)
        })
        .collect()
}

fn merge_by_slot(meshes: &[ReducedMesh], offsets: &[u32]) -> Vec<SubMesh> {
    let slots = meshes.iter().map(|m| m.submeshes.len()).max().unwrap_or(0);
    let mut submeshes = vec![SubMesh::default(); slots];

    for (mesh, &offset) in meshes.iter().zip(offsets) {
        for (slot, sub) in submeshes.iter_mut().zip(&mesh.submeshes) {
            // First material wins; a null slot is backfilled by a later input.
            if slot.material.is_none() {
                slot.material = sub.material;
            }
            append_offset(&mut slot.indices, &sub.indices, offset);
        }
    }

    submeshes
}
