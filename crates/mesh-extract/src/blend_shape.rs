//! Blend shapes (morph targets) and their trimming to a vertex subset.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One keyframe of a blend shape channel.
///
/// Delta arrays are either empty or one entry per vertex of the owning mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlendShapeFrame {
    /// Channel weight at which this frame is fully applied.
    pub weight: f32,

    #[serde(default)]
    pub delta_vertices: Vec<Vector3<f32>>,

    #[serde(default)]
    pub delta_normals: Vec<Vector3<f32>>,

    #[serde(default)]
    pub delta_tangents: Vec<Vector3<f32>>,
}

impl BlendShapeFrame {
    /// Produce the frame restricted to `retained` vertices, in that order.
    ///
    /// Entry `i` of each trimmed array corresponds to original vertex `retained[i]`,
    /// matching the order used for every other vertex channel. Empty arrays stay empty.
    pub fn trim(&self, retained: &[u32]) -> Self {
        fn pick(src: &[Vector3<f32>], retained: &[u32]) -> Vec<Vector3<f32>> {
            if src.is_empty() {
                return Vec::new();
            }
            retained.iter().map(|&i| src[i as usize]).collect()
        }

        Self {
            weight: self.weight,
            delta_vertices: pick(&self.delta_vertices, retained),
            delta_normals: pick(&self.delta_normals, retained),
            delta_tangents: pick(&self.delta_tangents, retained),
        }
    }

    /// Clear delta arrays whose length disagrees with `vertex_count`.
    ///
    /// Returns true if anything was cleared.
    pub fn drop_mismatched(&mut self, vertex_count: usize) -> bool {
        let mut dropped = false;
        for deltas in [
            &mut self.delta_vertices,
            &mut self.delta_normals,
            &mut self.delta_tangents,
        ] {
            if !deltas.is_empty() && deltas.len() != vertex_count {
                deltas.clear();
                dropped = true;
            }
        }
        dropped
    }
}

/// A named blend shape with one or more frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlendShapeChannel {
    pub name: String,
    pub frames: Vec<BlendShapeFrame>,
}

impl BlendShapeChannel {
    /// Trim every frame to the retained vertices.
    pub fn trim(&self, retained: &[u32]) -> Self {
        Self {
            name: self.name.clone(),
            frames: self.frames.iter().map(|f| f.trim(retained)).collect(),
        }
    }
}

/// Copy a mesh's blend shapes, dropping channels without frames and clearing delta
/// arrays that do not match the vertex count.
pub fn sanitize_channels(channels: &[BlendShapeChannel], vertex_count: usize) -> Vec<BlendShapeChannel> {
    channels
        .iter()
        .filter(|c| !c.frames.is_empty())
        .map(|c| {
            let mut channel = c.clone();
            for frame in &mut channel.frames {
                if frame.drop_mismatched(vertex_count) {
                    warn!(
                        "Blend shape '{}' has delta arrays not matching {} vertices; treating them as absent",
                        channel.name, vertex_count
                    );
                }
            }
            channel
        })
        .collect()
}

/// Trim every frame of every channel.
pub fn trim_channels(channels: &[BlendShapeChannel], retained: &[u32]) -> Vec<BlendShapeChannel> {
    channels.iter().map(|c| c.trim(retained)).collect()
}

/// Merge the channels of several meshes laid out back to back.
///
/// `parts` holds, per input, its vertex count and channels. Channels are matched by
/// name (first-seen order) and frames by position; an input lacking a channel or frame
/// contributes zero deltas over its vertex range.
pub fn merge_channels(parts: &[(usize, &[BlendShapeChannel])]) -> Vec<BlendShapeChannel> {
    let total: usize = parts.iter().map(|(n, _)| n).sum();

    let mut names: Vec<&str> = Vec::new();
    for (_, channels) in parts {
        for c in channels.iter() {
            if !names.contains(&c.name.as_str()) {
                names.push(&c.name);
            }
        }
    }

    names
        .into_iter()
        .map(|name| {
            let contributors: Vec<Option<&BlendShapeChannel>> = parts
                .iter()
                .map(|(_, channels)| channels.iter().find(|c| c.name == name))
                .collect();

            let frame_count = contributors
                .iter()
                .flatten()
                .map(|c| c.frames.len())
                .max()
                .unwrap_or(0);

            let frames = (0..frame_count)
                .map(|f| {
                    let weight = contributors
                        .iter()
                        .flatten()
                        .find_map(|c| c.frames.get(f))
                        .map_or(0.0, |frame| frame.weight);

                    let mut merged = BlendShapeFrame {
                        weight,
                        delta_vertices: Vec::with_capacity(total),
                        delta_normals: Vec::with_capacity(total),
                        delta_tangents: Vec::with_capacity(total),
                    };

                    for ((count, _), channel) in parts.iter().zip(&contributors) {
                        let frame = channel.and_then(|c| c.frames.get(f));
                        extend_or_zero(&mut merged.delta_vertices, frame.map(vertex_deltas), *count);
                        extend_or_zero(&mut merged.delta_normals, frame.map(normal_deltas), *count);
                        extend_or_zero(&mut merged.delta_tangents, frame.map(tangent_deltas), *count);
                    }

                    // A delta kind nobody provided stays absent.
                    for (deltas, provided) in [
                        (&mut merged.delta_vertices, any_frame(&contributors, f, vertex_deltas)),
                        (&mut merged.delta_normals, any_frame(&contributors, f, normal_deltas)),
                        (&mut merged.delta_tangents, any_frame(&contributors, f, tangent_deltas)),
                    ] {
                        if !provided {
                            deltas.clear();
                        }
                    }

                    merged
                })
                .collect();

            BlendShapeChannel {
                name: name.to_string(),
                frames,
            }
        })
        .collect()
}

fn extend_or_zero(dst: &mut Vec<Vector3<f32>>, src: Option<&Vec<Vector3<f32>>>, count: usize) {
    match src {
        Some(src) if src.len() == count => dst.extend_from_slice(src),
        _ => dst.extend(std::iter::repeat(Vector3::zeros()).take(count)),
    }
}

fn vertex_deltas(frame: &BlendShapeFrame) -> &Vec<Vector3<f32>> {
    &frame.delta_vertices
}

fn normal_deltas(frame: &BlendShapeFrame) -> &Vec<Vector3<f32>> {
    &frame.delta_normals
}

fn tangent_deltas(frame: &BlendShapeFrame) -> &Vec<Vector3<f32>> {
    &frame.delta_tangents
}

fn any_frame(
    contributors: &[Option<&BlendShapeChannel>],
    frame: usize,
    deltas: fn(&BlendShapeFrame) -> &Vec<Vector3<f32>>,
) -> bool {
    contributors
        .iter()
        .flatten()
        .filter_map(|c| c.frames.get(frame))
        .any(|f| !deltas(f).is_empty())
}
