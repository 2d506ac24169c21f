//! Per vertex bone indices and weights for linear blend skinning.
use glam::{Mat4, Vec4};
use log::warn;

use crate::error::AddInfluenceError;

/// The maximum number of bones that can influence a single vertex.
pub const MAX_INFLUENCES: usize = 4;

// Using a bone name allows meshes to reference bones before the skeleton is known.
// Bone indices are assigned by the skeleton in the order names are first seen.
/// The vertices affected by a single bone in a single mesh.
#[derive(Debug, PartialEq, Clone)]
pub struct Influence {
    pub bone_name: String,
    /// The transform from mesh space to the bone's local space in the bind pose.
    pub offset: Mat4,
    pub weights: Vec<SkinWeight>,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct SkinWeight {
    /// The index of the vertex within its mesh.
    pub vertex_index: u32,
    pub weight: f32,
}

/// What to do when a vertex is influenced by more than [MAX_INFLUENCES] bones.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum InfluenceOverflow {
    /// Fail with [AddInfluenceError::TooManyInfluences].
    #[default]
    Strict,
    /// Keep the largest weights by replacing the smallest stored weight.
    /// Dropped influences are logged as warnings.
    KeepLargest,
}

/// Up to [MAX_INFLUENCES] bone indices and weights for a single vertex.
///
/// Slots with a weight of `0.0` are unused.
/// Weights are stored as given and are not normalized.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct VertexInfluences {
    pub bone_indices: [u32; MAX_INFLUENCES],
    pub weights: [f32; MAX_INFLUENCES],
}

impl VertexInfluences {
    /// The number of used slots.
    pub fn count(&self) -> usize {
        self.weights.iter().filter(|w| **w != 0.0).count()
    }

    fn add(
        &mut self,
        vertex: usize,
        bone: u32,
        weight: f32,
        overflow: InfluenceOverflow,
    ) -> Result<(), AddInfluenceError> {
        if let Some(i) = self.weights.iter().position(|w| *w == 0.0) {
            self.bone_indices[i] = bone;
            self.weights[i] = weight;
            return Ok(());
        }

        match overflow {
            InfluenceOverflow::Strict => Err(AddInfluenceError::TooManyInfluences {
                vertex,
                bone: bone as usize,
            }),
            InfluenceOverflow::KeepLargest => {
                // All slots are used, so there is always a smallest weight.
                let (smallest, smallest_weight) = self
                    .weights
                    .iter()
                    .copied()
                    .enumerate()
                    .min_by(|(_, a), (_, b)| a.total_cmp(b))
                    .unwrap_or((0, 0.0));

                if weight > smallest_weight {
                    warn!(
                        "Vertex {vertex} has more than {MAX_INFLUENCES} influences. Replacing bone {} weight {smallest_weight} with bone {bone} weight {weight}.",
                        self.bone_indices[smallest]
                    );
                    self.bone_indices[smallest] = bone;
                    self.weights[smallest] = weight;
                } else {
                    warn!(
                        "Vertex {vertex} has more than {MAX_INFLUENCES} influences. Ignoring bone {bone} weight {weight}."
                    );
                }
                Ok(())
            }
        }
    }
}

/// The bone influences for every vertex in the model's combined vertex buffer.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct WeightTable {
    vertices: Vec<VertexInfluences>,
}

impl WeightTable {
    /// Create a table for `vertex_count` vertices with no influences.
    pub fn new(vertex_count: usize) -> Self {
        Self {
            vertices: vec![VertexInfluences::default(); vertex_count],
        }
    }

    /// Assign `weight` for `bone` to the first unused slot for `vertex`.
    pub fn add_influence(
        &mut self,
        vertex: usize,
        bone: usize,
        weight: f32,
        overflow: InfluenceOverflow,
    ) -> Result<(), AddInfluenceError> {
        let vertex_count = self.vertices.len();
        let influences = self
            .vertices
            .get_mut(vertex)
            .ok_or(AddInfluenceError::VertexOutOfRange {
                vertex,
                vertex_count,
            })?;
        influences.add(vertex, bone as u32, weight, overflow)
    }

    pub fn vertex(&self, vertex: usize) -> Option<&VertexInfluences> {
        self.vertices.get(vertex)
    }

    /// The number of bones influencing `vertex` or 0 if `vertex` is out of range.
    pub fn influence_count(&self, vertex: usize) -> usize {
        self.vertices.get(vertex).map_or(0, |v| v.count())
    }

    pub fn vertices(&self) -> &[VertexInfluences] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// The bone indices for each vertex for use as a vertex attribute.
    pub fn bone_indices(&self) -> Vec<[u32; MAX_INFLUENCES]> {
        self.vertices.iter().map(|v| v.bone_indices).collect()
    }

    /// The skin weights for each vertex for use as a vertex attribute.
    pub fn weights(&self) -> Vec<Vec4> {
        self.vertices
            .iter()
            .map(|v| Vec4::from_array(v.weights))
            .collect()
    }
}
