//! Structural validation of extracted assets.

use nalgebra::Point3;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::assemble::ExtractedAsset;
use crate::types::Channel;

/// Validation report for an extracted asset.
#[derive(Debug, Clone, Serialize)]
pub struct MeshReport {
    pub name: String,

    /// Asset kind: plain, skinned or shaped.
    pub kind: String,

    pub vertex_count: usize,

    pub triangle_count: usize,

    pub submesh_count: usize,

    /// Indices pointing past the vertex buffer.
    pub out_of_range_indices: usize,

    /// Submeshes whose index count isn't a multiple of three.
    pub incomplete_submeshes: usize,

    /// Vertices no triangle references.
    pub unreferenced_vertices: usize,

    /// Channels populated with a length other than the vertex count.
    #[serde(serialize_with = "serialize_channels")]
    pub mismatched_channels: Vec<Channel>,

    /// Whether the material list lines up with the submeshes.
    pub materials_aligned: bool,

    /// Whether per-vertex weight counts cover every vertex and sum to the weight count.
    /// `None` when the asset carries no skin.
    pub skin_consistent: Option<bool>,

    /// Blend shape frames whose populated delta arrays don't match the vertex count.
    pub mismatched_blend_frames: usize,

    /// Bounding box as (min_corner, max_corner).
    pub bounds: Option<(Point3<f32>, Point3<f32>)>,

    /// Dimensions (x, y, z).
    pub dimensions: Option<(f32, f32, f32)>,
}

fn serialize_channels<S>(channels: &[Channel], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(channels.iter().map(|c| c.to_string()))
}

impl MeshReport {
    /// Every index in range, whole triangles, consistent channels and skin.
    pub fn is_valid(&self) -> bool {
        self.vertex_count > 0
            && self.triangle_count > 0
            && self.out_of_range_indices == 0
            && self.incomplete_submeshes == 0
            && self.mismatched_channels.is_empty()
            && self.materials_aligned
            && self.skin_consistent != Some(false)
            && self.mismatched_blend_frames == 0
    }

    /// Every vertex is used by at least one triangle.
    pub fn is_compact(&self) -> bool {
        self.unreferenced_vertices == 0
    }
}

impl std::fmt::Display for MeshReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Asset '{}' ({}):", self.name, self.kind)?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Triangles: {}", self.triangle_count)?;
        writeln!(f, "  Submeshes: {}", self.submesh_count)?;

        if let Some((min, max)) = &self.bounds {
            writeln!(
                f,
                "  Bounds: [{:.3}, {:.3}, {:.3}] to [{:.3}, {:.3}, {:.3}]",
                min.x, min.y, min.z, max.x, max.y, max.z
            )?;
        }

        if let Some((dx, dy, dz)) = &self.dimensions {
            writeln!(f, "  Dimensions: {:.3} x {:.3} x {:.3}", dx, dy, dz)?;
        }

        if self.out_of_range_indices > 0 {
            writeln!(f, "  Out-of-range indices: {}", self.out_of_range_indices)?;
        }
        if self.incomplete_submeshes > 0 {
            writeln!(f, "  Incomplete submeshes: {}", self.incomplete_submeshes)?;
        }
        if !self.mismatched_channels.is_empty() {
            let names: Vec<String> = self.mismatched_channels.iter().map(|c| c.to_string()).collect();
            writeln!(f, "  Mismatched channels: {}", names.join(", "))?;
        }
        if !self.materials_aligned {
            writeln!(f, "  Materials: NOT aligned with submeshes")?;
        }
        if let Some(consistent) = self.skin_consistent {
            writeln!(f, "  Skin: {}", if consistent { "ok" } else { "INCONSISTENT" })?;
        }
        if self.mismatched_blend_frames > 0 {
            writeln!(f, "  Mismatched blend shape frames: {}", self.mismatched_blend_frames)?;
        }

        writeln!(
            f,
            "  Compact: {} (unreferenced vertices: {})",
            if self.is_compact() { "yes" } else { "no" },
            self.unreferenced_vertices
        )?;
        writeln!(f, "  Valid: {}", if self.is_valid() { "yes" } else { "NO" })?;

        Ok(())
    }
}

/// Validate an asset and return a report.
pub fn validate_asset(asset: &ExtractedAsset) -> MeshReport {
    let vertex_count = asset.vertex_count();

    let mut referenced = vec![false; vertex_count];
    let mut out_of_range_indices = 0;
    for &i in asset.submeshes.iter().flat_map(|s| &s.indices) {
        match referenced.get_mut(i as usize) {
            Some(seen) => *seen = true,
            None => out_of_range_indices += 1,
        }
    }
    let unreferenced_vertices = referenced.iter().filter(|&&seen| !seen).count();

    let incomplete_submeshes = asset
        .submeshes
        .iter()
        .filter(|s| s.indices.len() % 3 != 0)
        .count();

    let skin_consistent = asset.skin().map(|skin| {
        let total: usize = skin.bones_per_vertex.iter().map(|&n| n as usize).sum();
        skin.vertex_count() == vertex_count && total == skin.weights.len()
    });

    let mismatched_blend_frames = asset
        .blend_shapes
        .iter()
        .flat_map(|c| &c.frames)
        .filter(|frame| {
            [
                frame.delta_vertices.len(),
                frame.delta_normals.len(),
                frame.delta_tangents.len(),
            ]
            .iter()
            .any(|&len| len != 0 && len != vertex_count)
        })
        .count();

    let bounds = asset.attributes.bounds().map(|b| (b.min, b.max));
    let dimensions = bounds.map(|(min, max)| (max.x - min.x, max.y - min.y, max.z - min.z));

    let report = MeshReport {
        name: asset.name.clone(),
        kind: asset.kind.name().to_string(),
        vertex_count,
        triangle_count: asset.triangle_count(),
        submesh_count: asset.submeshes.len(),
        out_of_range_indices,
        incomplete_submeshes,
        unreferenced_vertices,
        mismatched_channels: asset.attributes.mismatched_channels(),
        materials_aligned: asset.materials.len() == asset.submeshes.len(),
        skin_consistent,
        mismatched_blend_frames,
        bounds,
        dimensions,
    };

    if out_of_range_indices > 0 {
        warn!(
            "Asset '{}' has {} indices outside its {} vertices",
            asset.name, out_of_range_indices, vertex_count
        );
    }
    if !report.mismatched_channels.is_empty() {
        warn!(
            "Asset '{}' has {} channels with the wrong length",
            asset.name,
            report.mismatched_channels.len()
        );
    }

    debug!("{}", report);

    report
}

/// Log a summary of a report.
pub fn log_validation(report: &MeshReport) {
    info!(
        "{}: {} verts, {} tris, {} submeshes",
        report.name, report.vertex_count, report.triangle_count, report.submesh_count
    );

    if report.is_valid() {
        info!("Asset '{}' is valid", report.name);
    } else {
        warn!("Asset '{}' failed validation", report.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::OutputKind;
    use crate::types::{SubMesh, VertexAttributes};
    use nalgebra::{Vector2, Vector3};

    fn asset(positions: usize, submeshes: Vec<SubMesh>) -> ExtractedAsset {
        let attributes = VertexAttributes {
            positions: (0..positions)
                .map(|i| Point3::new(i as f32, 0.0, (i % 2) as f32))
                .collect(),
            ..Default::default()
        };
        ExtractedAsset {
            name: "test".into(),
            bounds: attributes.bounds(),
            materials: submeshes.iter().map(|s| s.material).collect(),
            attributes,
            submeshes,
            blend_shapes: Vec::new(),
            kind: OutputKind::Plain,
        }
    }

    #[test]
    fn test_valid_asset() {
        let report = validate_asset(&asset(3, vec![SubMesh::new(vec![0, 1, 2], None)]));
        assert!(report.is_valid());
        assert!(report.is_compact());
        assert_eq!(report.triangle_count, 1);
        assert_eq!(report.dimensions, Some((2.0, 0.0, 1.0)));
    }

    #[test]
    fn test_out_of_range_and_incomplete() {
        let report = validate_asset(&asset(3, vec![SubMesh::new(vec![0, 1, 3, 2], None)]));
        assert!(!report.is_valid());
        assert_eq!(report.out_of_range_indices, 1);
        assert_eq!(report.incomplete_submeshes, 1);
    }

    #[test]
    fn test_mismatched_channel_and_unreferenced_vertex() {
        let mut bad = asset(4, vec![SubMesh::new(vec![0, 1, 2], None)]);
        bad.attributes.normals = vec![Vector3::z(); 2];
        bad.attributes.uvs[0] = vec![Vector2::zeros(); 4];

        let report = validate_asset(&bad);
        assert_eq!(report.mismatched_channels, vec![Channel::Normals]);
        assert_eq!(report.unreferenced_vertices, 1);
        assert!(!report.is_valid());
        assert!(report.to_string().contains("Mismatched channels: normals"));
    }

    #[test]
    fn test_materials_misaligned() {
        let mut bad = asset(3, vec![SubMesh::new(vec![0, 1, 2], None)]);
        bad.materials.clear();
        assert!(!validate_asset(&bad).materials_aligned);
    }
}
