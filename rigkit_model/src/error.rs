use smol_str::SmolStr;
use thiserror::Error;

use crate::animation::TrackKind;

#[derive(Debug, PartialEq, Error)]
pub enum AddInfluenceError {
    #[error("vertex {vertex} already has 4 influences and cannot add bone {bone}")]
    TooManyInfluences { vertex: usize, bone: usize },

    #[error("vertex {vertex} out of range for weight table with {vertex_count} vertices")]
    VertexOutOfRange { vertex: usize, vertex_count: usize },
}

#[derive(Debug, PartialEq, Error)]
pub enum CreateModelError {
    #[error("error adding skin influence for bone {bone_name:?}")]
    Influence {
        bone_name: SmolStr,
        #[source]
        source: AddInfluenceError,
    },

    #[error(
        "vertex {vertex_index} of mesh {mesh_index} out of range for mesh with {vertex_count} vertices"
    )]
    VertexOutOfRange {
        mesh_index: usize,
        vertex_index: u32,
        vertex_count: usize,
    },

    #[error("bone {bone_name:?} does not match any node in the hierarchy")]
    MissingBoneNode { bone_name: SmolStr },

    #[error("{kind:?} keyframes for node {node_name:?} are empty")]
    EmptyKeyframes { node_name: String, kind: TrackKind },

    #[error("root node {node_name:?} has a transform that cannot be inverted")]
    SingularRootTransform { node_name: String },
}
