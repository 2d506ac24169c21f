//! # rigkit_model
//! rigkit_model computes the skinning matrices for skeletal animation
//! from the node hierarchy, meshes, and animation produced by a scene importer.
//!
//! Loading a [SkinnedModel] assigns a dense index to each bone in the order
//! the bones are first referenced by the meshes.
//! This index is used for the per vertex bone indices in the [WeightTable]
//! and for the matrices returned by [SkinnedModel::skinning_transforms].
//!
//! ```rust
//! use glam::{vec3, Mat4, Quat, Vec3};
//! use rigkit_model::{
//!     Animation, Channel, Influence, Keyframe, MeshSkin, ModelOptions, Node, SkinWeight,
//!     SkinnedModel,
//! };
//!
//! let meshes = vec![MeshSkin {
//!     vertex_count: 3,
//!     index_count: 3,
//!     material_index: 0,
//!     influences: vec![Influence {
//!         bone_name: "arm".to_string(),
//!         offset: Mat4::IDENTITY,
//!         weights: vec![SkinWeight { vertex_index: 0, weight: 1.0 }],
//!     }],
//! }];
//! let root = Node::new("root", Mat4::IDENTITY)
//!     .with_children(vec![Node::new("arm", Mat4::IDENTITY)]);
//! let animation = Animation {
//!     name: "wave".to_string(),
//!     duration: 10.0,
//!     ticks_per_second: 0.0,
//!     channels: vec![Channel {
//!         node_name: "arm".to_string(),
//!         translation_keys: vec![Keyframe::new(0.0, Vec3::ZERO), Keyframe::new(10.0, vec3(0.0, 1.0, 0.0))],
//!         rotation_keys: vec![Keyframe::new(0.0, Quat::IDENTITY)],
//!         scale_keys: vec![Keyframe::new(0.0, Vec3::ONE)],
//!     }],
//! };
//!
//! let model = SkinnedModel::from_meshes(&meshes, root, Some(animation), ModelOptions::default())?;
//! let transforms = model.skinning_transforms(0.2);
//! assert_eq!(1, transforms.len());
//! # Ok::<(), rigkit_model::error::CreateModelError>(())
//! ```

pub mod animation;
pub mod error;
mod model;
mod node;
pub mod skeleton;
pub mod skinning;

pub use animation::{Animation, Channel, Keyframe, KeyframeFallback, Transform};
pub use model::{MeshEntry, MeshSkin, ModelOptions, SkinnedModel, mesh_entries};
pub use node::{Node, NodeIter};
pub use skeleton::{BoneInfo, Skeleton};
pub use skinning::{Influence, InfluenceOverflow, SkinWeight, VertexInfluences, WeightTable};
