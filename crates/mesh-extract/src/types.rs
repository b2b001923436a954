//! Core mesh buffer types shared by every pipeline stage.

use nalgebra::{Point3, Vector2, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// Number of texture coordinate channels a mesh can carry.
pub const MAX_UV_CHANNELS: usize = 8;

/// Linear RGBA vertex color.
pub type Color = [f32; 4];

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Position of the referenced entry in its owning arena.
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

handle!(
    /// Handle of a mesh asset inside a [`crate::Scene`].
    MeshId
);
handle!(
    /// Handle of a renderer-owning object inside a [`crate::Scene`].
    ObjectId
);
handle!(
    /// Handle of a bone transform inside a [`crate::Scene`].
    BoneId
);
handle!(
    /// Material identity. Two submeshes share a material iff their ids are equal.
    MaterialId
);

/// A per-vertex attribute channel other than positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Normals,
    Tangents,
    Uv(usize),
    Colors,
}

impl Channel {
    /// Every optional channel, in a stable order.
    pub fn all() -> impl Iterator<Item = Channel> {
        [Channel::Normals, Channel::Tangents, Channel::Colors]
            .into_iter()
            .chain((0..MAX_UV_CHANNELS).map(Channel::Uv))
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Normals => write!(f, "normals"),
            Channel::Tangents => write!(f, "tangents"),
            Channel::Uv(i) => write!(f, "uv{}", i),
            Channel::Colors => write!(f, "colors"),
        }
    }
}

/// Structure-of-arrays vertex data.
///
/// Positions define the vertex count. Every other channel is either empty or exactly
/// as long as `positions`; an empty channel means "not present", never "all zero".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VertexAttributes {
    pub positions: Vec<Point3<f32>>,

    #[serde(default)]
    pub normals: Vec<Vector3<f32>>,

    /// Tangents with handedness in `w`.
    #[serde(default)]
    pub tangents: Vec<Vector4<f32>>,

    #[serde(default)]
    pub uvs: [Vec<Vector2<f32>>; MAX_UV_CHANNELS],

    #[serde(default)]
    pub colors: Vec<Color>,
}

impl VertexAttributes {
    /// Number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Length of a channel's array.
    pub fn channel_len(&self, channel: Channel) -> usize {
        match channel {
            Channel::Normals => self.normals.len(),
            Channel::Tangents => self.tangents.len(),
            Channel::Uv(i) => self.uvs.get(i).map_or(0, Vec::len),
            Channel::Colors => self.colors.len(),
        }
    }

    /// Whether a channel is present (non-empty).
    #[inline]
    pub fn has(&self, channel: Channel) -> bool {
        self.channel_len(channel) > 0
    }

    /// Drop a channel's data.
    pub fn clear(&mut self, channel: Channel) {
        match channel {
            Channel::Normals => self.normals.clear(),
            Channel::Tangents => self.tangents.clear(),
            Channel::Uv(i) => {
                if let Some(uv) = self.uvs.get_mut(i) {
                    uv.clear();
                }
            }
            Channel::Colors => self.colors.clear(),
        }
    }

    /// Channels whose length disagrees with the vertex count.
    pub fn mismatched_channels(&self) -> Vec<Channel> {
        let n = self.vertex_count();
        Channel::all()
            .filter(|&c| {
                let len = self.channel_len(c);
                len != 0 && len != n
            })
            .collect()
    }

    /// Clear every channel whose length disagrees with the vertex count.
    ///
    /// Returns the cleared channels.
    pub fn drop_mismatched_channels(&mut self) -> Vec<Channel> {
        let mismatched = self.mismatched_channels();
        for &channel in &mismatched {
            self.clear(channel);
        }
        mismatched
    }

    /// Copy the vertices at `retained` (in that order) into a new attribute set.
    ///
    /// Channels absent here stay absent in the result. Every index in `retained`
    /// must be below [`Self::vertex_count`].
    pub fn gather(&self, retained: &[u32]) -> Self {
        fn pick<T: Copy>(src: &[T], retained: &[u32]) -> Vec<T> {
            if src.is_empty() {
                return Vec::new();
            }
            retained.iter().map(|&i| src[i as usize]).collect()
        }

        Self {
            positions: pick(&self.positions, retained),
            normals: pick(&self.normals, retained),
            tangents: pick(&self.tangents, retained),
            uvs: std::array::from_fn(|i| pick(&self.uvs[i], retained)),
            colors: pick(&self.colors, retained),
        }
    }

    /// Append another attribute set.
    ///
    /// Channels are concatenated as-is; callers that mix inputs with different
    /// channel presence are responsible for clearing the partial channels afterwards.
    pub fn append(&mut self, other: &Self) {
        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.tangents.extend_from_slice(&other.tangents);
        for (dst, src) in self.uvs.iter_mut().zip(other.uvs.iter()) {
            dst.extend_from_slice(src);
        }
        self.colors.extend_from_slice(&other.colors);
    }

    /// Translate all positions by `-offset`.
    pub fn recenter(&mut self, offset: Vector3<f32>) {
        for p in &mut self.positions {
            *p -= offset;
        }
    }

    /// Compute the axis-aligned bounding box of the positions.
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(&self.positions)
    }
}

/// An index list rendered with a single material.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubMesh {
    /// Flat triangle list, three indices per triangle.
    pub indices: Vec<u32>,

    /// Material for this submesh. `None` means no material was assigned.
    pub material: Option<MaterialId>,
}

impl SubMesh {
    pub fn new(indices: Vec<u32>, material: Option<MaterialId>) -> Self {
        Self { indices, material }
    }

    /// Number of complete triangles.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Iterate triangles as index triples.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|c| [c[0], c[1], c[2]])
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    /// Bounding box of a point set, `None` when empty.
    pub fn from_points(points: &[Point3<f32>]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut min = *first;
        let mut max = *first;

        for p in rest {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        Some(Self { min, max })
    }

    #[inline]
    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }
}
