//! Triangle selection reduction: rebuild a compact mesh from selected triangles.
//!
//! The reduced mesh keeps only the vertices referenced by the selection. Vertices are
//! ordered by ascending original index, so the output depends only on the selection as
//! a set and never on the order triangles were picked in.

use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::blend_shape::{trim_channels, BlendShapeChannel};
use crate::extract::SourceMeshBuffers;
use crate::scene::SelectedTriangle;
use crate::skin::SkinData;
use crate::types::{MaterialId, ObjectId, SubMesh, VertexAttributes};

/// How selected triangles are distributed over output submeshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubMeshGrouping {
    /// Everything in one submesh using the source's first assigned material.
    Flatten,

    /// One submesh per distinct material, in first-seen order. Triangles without a
    /// material share a bucket. Falls back to [`SubMeshGrouping::BySubMesh`] when the
    /// source has no materials at all.
    #[default]
    ByMaterial,

    /// One submesh per original submesh index, ascending.
    BySubMesh,
}

impl SubMeshGrouping {
    pub fn from_flags(preserve_submeshes: bool, combine_by_material: bool) -> Self {
        match (preserve_submeshes, combine_by_material) {
            (false, _) => SubMeshGrouping::Flatten,
            (true, true) => SubMeshGrouping::ByMaterial,
            (true, false) => SubMeshGrouping::BySubMesh,
        }
    }
}

/// Mapping from retained original vertex indices to compacted indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexRemap {
    /// Original indices, ascending and unique. Position = new index.
    retained: Vec<u32>,

    /// Original index → new index.
    old_to_new: HashMap<u32, u32>,
}

impl IndexRemap {
    /// Build the remap from the corners of the given triangles.
    pub fn from_triangles<I>(triangles: I) -> Self
    where
        I: IntoIterator<Item = [u32; 3]>,
    {
        let referenced: HashSet<u32> = triangles.into_iter().flatten().collect();
        let mut retained: Vec<u32> = referenced.into_iter().collect();
        retained.sort_unstable();

        let old_to_new = retained
            .iter()
            .enumerate()
            .map(|(new, &old)| (old, new as u32))
            .collect();

        Self {
            retained,
            old_to_new,
        }
    }

    /// Retained original indices in output order.
    #[inline]
    pub fn retained(&self) -> &[u32] {
        &self.retained
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.retained.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    /// New index of an original vertex.
    #[inline]
    pub fn get(&self, old: u32) -> Option<u32> {
        self.old_to_new.get(&old).copied()
    }

    /// Remap all three corners.
    pub fn remap(&self, tri: [u32; 3]) -> Option<[u32; 3]> {
        Some([self.get(tri[0])?, self.get(tri[1])?, self.get(tri[2])?])
    }
}

/// A mesh rebuilt from a triangle selection on one source.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedMesh {
    /// Object the triangles were selected on.
    pub source: ObjectId,

    pub name: String,

    pub attributes: VertexAttributes,

    /// Submeshes sharing the single vertex buffer above.
    pub submeshes: Vec<SubMesh>,

    pub skin: Option<SkinData>,

    /// Blend shapes trimmed to the retained vertices.
    pub blend_shapes: Vec<BlendShapeChannel>,

    /// Original vertex index of every output vertex.
    pub retained: Vec<u32>,
}

impl ReducedMesh {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.attributes.vertex_count()
    }

    pub fn triangle_count(&self) -> usize {
        self.submeshes.iter().map(SubMesh::triangle_count).sum()
    }

    /// Material list aligned with `submeshes`.
    pub fn materials(&self) -> Vec<Option<MaterialId>> {
        self.submeshes.iter().map(|s| s.material).collect()
    }
}

/// Rebuild a compact mesh from the triangles of `selection` that belong to `buffers`.
///
/// Triangles of other objects are ignored. Duplicates collapse; triangles with corners
/// outside the source vertex range are skipped with a warning.
pub fn reduce(
    buffers: &SourceMeshBuffers,
    selection: &[SelectedTriangle],
    grouping: SubMeshGrouping,
) -> ReducedMesh {
    let vertex_count = buffers.vertex_count();

    let mut triangles: Vec<SelectedTriangle> = selection
        .iter()
        .filter(|t| t.object == buffers.object)
        .copied()
        .collect();
    let before = triangles.len();
    triangles.retain(|t| t.indices.iter().all(|&i| (i as usize) < vertex_count));
    if triangles.len() < before {
        warn!(
            "Skipped {} selected triangles referencing vertices outside '{}' ({} vertices)",
            before - triangles.len(),
            buffers.name,
            vertex_count
        );
    }
    triangles.sort_unstable();
    triangles.dedup();

    let remap = IndexRemap::from_triangles(triangles.iter().map(|t| t.indices));
    let retained = remap.retained();

    let attributes = buffers.attributes.gather(retained);
    let skin = buffers.skin.as_ref().map(|s| s.gather(retained));
    let blend_shapes = trim_channels(&buffers.blend_shapes, retained);

    let submeshes = if triangles.is_empty() {
        Vec::new()
    } else {
        group_triangles(buffers, &triangles, &remap, grouping)
    };

    debug!(
        "Reduced '{}': {} of {} vertices, {} triangles in {} submeshes",
        buffers.name,
        remap.len(),
        vertex_count,
        triangles.len(),
        submeshes.len()
    );

    ReducedMesh {
        source: buffers.object,
        name: buffers.name.clone(),
        attributes,
        submeshes,
        skin,
        blend_shapes,
        retained: retained.to_vec(),
    }
}

fn group_triangles(
    buffers: &SourceMeshBuffers,
    triangles: &[SelectedTriangle],
    remap: &IndexRemap,
    grouping: SubMeshGrouping,
) -> Vec<SubMesh> {
    // Every corner was checked against the vertex count and fed into the remap.
    let corners = |t: &SelectedTriangle| remap.remap(t.indices).unwrap_or_default();

    let grouping = if grouping == SubMeshGrouping::ByMaterial && buffers.materials.is_empty() {
        SubMeshGrouping::BySubMesh
    } else {
        grouping
    };

    match grouping {
        SubMeshGrouping::Flatten => {
            let indices = triangles.iter().flat_map(corners).collect();
            vec![SubMesh::new(indices, buffers.first_material())]
        }
        SubMeshGrouping::ByMaterial => {
            let mut buckets: Vec<SubMesh> = Vec::new();
            let mut bucket_of: HashMap<Option<MaterialId>, usize> = HashMap::new();

            for tri in triangles {
                let material = buffers.material_for_submesh(tri.submesh);
                let slot = *bucket_of.entry(material).or_insert_with(|| {
                    buckets.push(SubMesh::new(Vec::new(), material));
                    buckets.len() - 1
                });
                buckets[slot].indices.extend(corners(tri));
            }
            buckets
        }
        SubMeshGrouping::BySubMesh => {
            let mut by_index: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
            for tri in triangles {
                by_index.entry(tri.submesh).or_default().extend(corners(tri));
            }
            by_index
                .into_iter()
                .map(|(s, indices)| SubMesh::new(indices, buffers.material_for_submesh(s)))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector2};

    const A: MaterialId = MaterialId(0);
    const B: MaterialId = MaterialId(1);

    /// Ten vertices, two submeshes: 0 uses material A, 1 uses material B.
    fn buffers(materials: Vec<Option<MaterialId>>) -> SourceMeshBuffers {
        let positions: Vec<Point3<f32>> = (0..10).map(|i| Point3::new(i as f32, 0.0, 0.0)).collect();
        let uv0 = (0..10).map(|i| Vector2::new(i as f32, 0.5)).collect();
        let mut attributes = VertexAttributes {
            positions,
            ..Default::default()
        };
        attributes.uvs[0] = uv0;

        SourceMeshBuffers {
            object: ObjectId(0),
            name: "source".into(),
            attributes,
            submeshes: vec![vec![0, 1, 2, 2, 3, 4], vec![5, 6, 7, 7, 8, 9]],
            materials,
            skin: None,
            blend_shapes: Vec::new(),
        }
    }

    fn tri(submesh: u32, indices: [u32; 3]) -> SelectedTriangle {
        SelectedTriangle::new(ObjectId(0), submesh, indices)
    }

    #[test]
    fn test_remap_is_sorted_and_bijective() {
        let remap = IndexRemap::from_triangles([[7, 3, 5], [5, 3, 9]]);
        assert_eq!(remap.retained(), &[3, 5, 7, 9]);
        assert_eq!(remap.get(7), Some(2));
        assert_eq!(remap.get(4), None);
        assert_eq!(remap.remap([9, 3, 5]), Some([3, 0, 1]));
    }

    #[test]
    fn test_two_materials_scenario() {
        let source = buffers(vec![Some(A), Some(B)]);
        let selection = [tri(0, [0, 1, 2]), tri(1, [5, 6, 7])];

        let reduced = reduce(&source, &selection, SubMeshGrouping::ByMaterial);

        assert_eq!(reduced.vertex_count(), 6);
        assert_eq!(reduced.materials(), vec![Some(A), Some(B)]);
        assert_eq!(reduced.submeshes[0].indices, vec![0, 1, 2]);
        assert_eq!(reduced.submeshes[1].indices, vec![3, 4, 5]);
        assert_eq!(reduced.retained, vec![0, 1, 2, 5, 6, 7]);
    }

    #[test]
    fn test_selection_order_does_not_matter() {
        let source = buffers(vec![Some(A), Some(B)]);
        let forward = [tri(0, [2, 3, 4]), tri(1, [7, 8, 9]), tri(0, [0, 1, 2])];
        let backward = [tri(0, [0, 1, 2]), tri(1, [7, 8, 9]), tri(0, [2, 3, 4])];

        let a = reduce(&source, &forward, SubMeshGrouping::ByMaterial);
        let b = reduce(&source, &backward, SubMeshGrouping::ByMaterial);
        assert_eq!(a, b);
    }

    #[test]
    fn test_shared_vertex_is_not_duplicated() {
        let source = buffers(vec![Some(A), Some(B)]);
        // Vertex 2 is shared across submeshes with different materials.
        let selection = [tri(0, [0, 1, 2]), tri(1, [2, 6, 7])];

        let reduced = reduce(&source, &selection, SubMeshGrouping::ByMaterial);
        assert_eq!(reduced.vertex_count(), 5);
        assert_eq!(reduced.submeshes[0].indices[2], reduced.submeshes[1].indices[0]);
    }

    #[test]
    fn test_flatten_uses_first_material() {
        let source = buffers(vec![None, Some(B)]);
        let selection = [tri(0, [0, 1, 2]), tri(1, [5, 6, 7])];

        let reduced = reduce(&source, &selection, SubMeshGrouping::Flatten);
        assert_eq!(reduced.submeshes.len(), 1);
        assert_eq!(reduced.submeshes[0].material, Some(B));
        assert_eq!(reduced.submeshes[0].indices.len(), 6);
    }

    #[test]
    fn test_same_material_merges_and_null_gets_own_bucket() {
        let source = buffers(vec![Some(A), Some(A), None]);
        let mut s = source.clone();
        s.submeshes.push(vec![0, 5, 9]);
        let selection = [tri(0, [0, 1, 2]), tri(1, [5, 6, 7]), tri(2, [0, 5, 9])];

        let reduced = reduce(&s, &selection, SubMeshGrouping::ByMaterial);
        assert_eq!(reduced.materials(), vec![Some(A), None]);
        assert_eq!(reduced.submeshes[0].triangle_count(), 2);
        assert_eq!(reduced.submeshes[1].triangle_count(), 1);
    }

    #[test]
    fn test_by_submesh_without_materials() {
        let source = buffers(Vec::new());
        let selection = [tri(1, [5, 6, 7]), tri(0, [0, 1, 2])];

        let reduced = reduce(&source, &selection, SubMeshGrouping::ByMaterial);
        assert_eq!(reduced.submeshes.len(), 2);
        assert_eq!(reduced.submeshes[0].indices, vec![0, 1, 2]);
        assert_eq!(reduced.materials(), vec![None, None]);
    }

    #[test]
    fn test_empty_channels_stay_empty() {
        let source = buffers(vec![Some(A)]);
        let reduced = reduce(&source, &[tri(0, [0, 1, 2])], SubMeshGrouping::BySubMesh);

        assert_eq!(reduced.attributes.uvs[0].len(), 3);
        assert!(reduced.attributes.uvs[1].is_empty());
        assert!(reduced.attributes.normals.is_empty());
    }

    #[test]
    fn test_out_of_range_and_foreign_triangles_skipped() {
        let source = buffers(vec![Some(A)]);
        let selection = [
            tri(0, [0, 1, 42]),
            SelectedTriangle::new(ObjectId(1), 0, [0, 1, 2]),
            tri(0, [3, 4, 2]),
        ];

        let reduced = reduce(&source, &selection, SubMeshGrouping::BySubMesh);
        assert_eq!(reduced.retained, vec![2, 3, 4]);
        assert_eq!(reduced.triangle_count(), 1);
    }
}
