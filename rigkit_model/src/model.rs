use glam::Mat4;
use log::{debug, warn};

use crate::{
    Animation, KeyframeFallback, Node, Skeleton,
    error::CreateModelError,
    skinning::{Influence, InfluenceOverflow, WeightTable},
};

/// The skinning data for a single mesh from an importer.
#[derive(Debug, PartialEq, Clone)]
pub struct MeshSkin {
    pub vertex_count: usize,
    pub index_count: usize,
    pub material_index: usize,
    /// The bones affecting this mesh in the order they should be registered.
    pub influences: Vec<Influence>,
}

/// The range of a mesh in the model's combined vertex and index buffers.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct MeshEntry {
    pub vertex_count: usize,
    pub index_count: usize,
    /// The number of vertices in all previous meshes.
    pub base_vertex: usize,
    /// The number of indices in all previous meshes.
    pub base_index: usize,
    pub material_index: usize,
}

/// Settings for how model data is interpreted.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct ModelOptions {
    pub overflow: InfluenceOverflow,
    pub fallback: KeyframeFallback,
}

/// A skinned model with a node hierarchy and an optional looping animation.
#[derive(Debug, Clone)]
pub struct SkinnedModel {
    meshes: Vec<MeshEntry>,
    skeleton: Skeleton,
    weights: WeightTable,
    root: Node,
    animation: Option<Animation>,
    global_inverse: Mat4,
    nodes: Vec<NodeBinding>,
    fallback: KeyframeFallback,
}

// Names are resolved once when loading since the hierarchy and animation don't change.
#[derive(Debug, Clone, Copy)]
struct NodeBinding {
    /// Parents always appear before their children.
    parent: Option<usize>,
    rest_transform: Mat4,
    channel: Option<usize>,
    bone: Option<usize>,
}

impl SkinnedModel {
    /// Build the skeleton and vertex weights from `meshes`
    /// and bind the bones and animation channels to the nodes in `root`.
    ///
    /// Meshes share a single combined vertex buffer in the order they appear in `meshes`.
    #[tracing::instrument(skip_all)]
    pub fn from_meshes(
        meshes: &[MeshSkin],
        root: Node,
        animation: Option<Animation>,
        options: ModelOptions,
    ) -> Result<Self, CreateModelError> {
        let entries = mesh_entries(meshes);
        let vertex_count = entries.iter().map(|e| e.vertex_count).sum();

        let mut skeleton = Skeleton::new();
        let mut weights = WeightTable::new(vertex_count);
        for (mesh_index, (mesh, entry)) in meshes.iter().zip(&entries).enumerate() {
            add_mesh_influences(
                &mut skeleton,
                &mut weights,
                mesh_index,
                mesh,
                entry,
                options.overflow,
            )?;
        }

        if let Some(animation) = &animation {
            animation.validate()?;
        }

        let global_inverse =
            root.global_inverse()
                .ok_or_else(|| CreateModelError::SingularRootTransform {
                    node_name: root.name.clone(),
                })?;

        let nodes = bind_nodes(&root, &skeleton, animation.as_ref());
        check_bone_nodes(&nodes, &skeleton)?;

        debug!(
            "Created model with {} meshes, {} vertices, {} bones, {} nodes",
            entries.len(),
            vertex_count,
            skeleton.len(),
            nodes.len()
        );

        Ok(Self {
            meshes: entries,
            skeleton,
            weights,
            root,
            animation,
            global_inverse,
            nodes,
            fallback: options.fallback,
        })
    }

    /// Compute the matrix for each bone in the [Skeleton] that transforms a vertex
    /// in the bind pose to its animated position at `time_seconds`.
    ///
    /// This can be used in a vertex shader to apply linear blend skinning
    /// by transforming the vertex by up to 4 skinning matrices
    /// and blending with the weights in the [WeightTable].
    ///
    /// Models without an animation use the rest pose of the hierarchy.
    pub fn skinning_transforms(&self, time_seconds: f32) -> Vec<Mat4> {
        let time = self.animation_time(time_seconds);
        self.evaluate(time)
    }

    /// Identical to [Self::skinning_transforms] but using the rest transform for every node.
    pub fn rest_pose_transforms(&self) -> Vec<Mat4> {
        self.evaluate(None)
    }

    /// Update the final transform for each bone in the [Skeleton] for `time_seconds`.
    pub fn update(&mut self, time_seconds: f32) {
        let transforms = self.skinning_transforms(time_seconds);
        for (i, transform) in transforms.into_iter().enumerate() {
            self.skeleton.set_final_transform(i, transform);
        }
    }

    /// Convert `time_seconds` to the looped animation time in ticks
    /// or `None` if the model has no animation.
    pub fn animation_time(&self, time_seconds: f32) -> Option<f32> {
        self.animation
            .as_ref()
            .map(|a| a.animation_time(time_seconds))
    }

    pub fn meshes(&self) -> &[MeshEntry] {
        &self.meshes
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn animation(&self) -> Option<&Animation> {
        self.animation.as_ref()
    }

    /// The inverse of the root node's rest transform.
    pub fn global_inverse(&self) -> Mat4 {
        self.global_inverse
    }

    /// The total number of vertices for all meshes.
    pub fn vertex_count(&self) -> usize {
        self.weights.len()
    }

    /// The total number of indices for all meshes.
    pub fn index_count(&self) -> usize {
        self.meshes.iter().map(|m| m.index_count).sum()
    }

    fn evaluate(&self, time: Option<f32>) -> Vec<Mat4> {
        let mut transforms = vec![Mat4::ZERO; self.skeleton.len()];
        let mut node_transforms: Vec<Mat4> = Vec::with_capacity(self.nodes.len());

        for node in &self.nodes {
            let local = self.local_transform(node, time);

            // The correction is applied once at the root and inherited by all descendants.
            let parent = match node.parent {
                Some(p) => node_transforms[p],
                None => self.global_inverse,
            };
            let global = parent * local;

            if let Some(bone) = node.bone {
                transforms[bone] = global * self.skeleton.offset(bone);
            }

            node_transforms.push(global);
        }

        transforms
    }

    fn local_transform(&self, node: &NodeBinding, time: Option<f32>) -> Mat4 {
        match (&self.animation, node.channel, time) {
            (Some(animation), Some(channel), Some(time)) => animation.channels[channel]
                .sample_transform(time, self.fallback)
                .map(|t| t.to_matrix())
                .unwrap_or(node.rest_transform),
            _ => node.rest_transform,
        }
    }
}

/// Calculate the offsets for each mesh in the combined vertex and index buffers.
pub fn mesh_entries(meshes: &[MeshSkin]) -> Vec<MeshEntry> {
    let mut base_vertex = 0;
    let mut base_index = 0;
    meshes
        .iter()
        .map(|mesh| {
            let entry = MeshEntry {
                vertex_count: mesh.vertex_count,
                index_count: mesh.index_count,
                base_vertex,
                base_index,
                material_index: mesh.material_index,
            };
            base_vertex += mesh.vertex_count;
            base_index += mesh.index_count;
            entry
        })
        .collect()
}

fn add_mesh_influences(
    skeleton: &mut Skeleton,
    weights: &mut WeightTable,
    mesh_index: usize,
    mesh: &MeshSkin,
    entry: &MeshEntry,
    overflow: InfluenceOverflow,
) -> Result<(), CreateModelError> {
    for influence in &mesh.influences {
        let bone = skeleton.bone_index_or_insert(&influence.bone_name, influence.offset);

        for weight in &influence.weights {
            let vertex_index = weight.vertex_index as usize;
            if vertex_index >= entry.vertex_count {
                return Err(CreateModelError::VertexOutOfRange {
                    mesh_index,
                    vertex_index: weight.vertex_index,
                    vertex_count: entry.vertex_count,
                });
            }

            weights
                .add_influence(entry.base_vertex + vertex_index, bone, weight.weight, overflow)
                .map_err(|source| CreateModelError::Influence {
                    bone_name: influence.bone_name.as_str().into(),
                    source,
                })?;
        }
    }
    Ok(())
}

fn bind_nodes(root: &Node, skeleton: &Skeleton, animation: Option<&Animation>) -> Vec<NodeBinding> {
    // Flatten the hierarchy in pre-order to avoid recursion when animating.
    let mut nodes = Vec::new();
    let mut stack = vec![(root, None)];
    while let Some((node, parent)) = stack.pop() {
        let index = nodes.len();
        nodes.push(NodeBinding {
            parent,
            rest_transform: node.transform,
            channel: animation.and_then(|a| a.channel_index(&node.name)),
            bone: skeleton.bone_index(&node.name),
        });
        stack.extend(node.children.iter().rev().map(|c| (c, Some(index))));
    }
    nodes
}

fn check_bone_nodes(nodes: &[NodeBinding], skeleton: &Skeleton) -> Result<(), CreateModelError> {
    let mut node_counts = vec![0usize; skeleton.len()];
    for bone in nodes.iter().filter_map(|n| n.bone) {
        node_counts[bone] += 1;
    }

    for (i, count) in node_counts.into_iter().enumerate() {
        let name = skeleton.bone_name(i).unwrap_or_default();
        match count {
            0 => {
                return Err(CreateModelError::MissingBoneNode {
                    bone_name: name.into(),
                });
            }
            1 => (),
            _ => warn!("Bone {name:?} matches {count} nodes. Using the last node in the hierarchy."),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use glam::{Quat, Vec3, vec3};
    use pretty_assertions::assert_eq;

    use crate::{
        Channel, Keyframe, error::AddInfluenceError, skinning::SkinWeight,
        skinning::VertexInfluences,
    };

    macro_rules! assert_matrix_relative_eq {
        ($a:expr, $b:expr) => {
            assert!(
                $a.to_cols_array()
                    .iter()
                    .zip($b.to_cols_array().iter())
                    .all(|(a, b)| approx::relative_eq!(a, b, epsilon = 0.0001f32)),
                "Matrices not equal to within 0.0001.\nleft = {:?}\nright = {:?}",
                $a,
                $b
            )
        };
    }

    fn influence(name: &str, offset: Mat4, weights: &[(u32, f32)]) -> Influence {
        Influence {
            bone_name: name.to_string(),
            offset,
            weights: weights
                .iter()
                .map(|(vertex_index, weight)| SkinWeight {
                    vertex_index: *vertex_index,
                    weight: *weight,
                })
                .collect(),
        }
    }

    fn mesh(vertex_count: usize, influences: Vec<Influence>) -> MeshSkin {
        MeshSkin {
            vertex_count,
            index_count: vertex_count * 3,
            material_index: 0,
            influences,
        }
    }

    fn translation_channel(name: &str, keys: &[(f32, Vec3)]) -> Channel {
        Channel {
            node_name: name.to_string(),
            translation_keys: keys.iter().map(|(t, v)| Keyframe::new(*t, *v)).collect(),
            rotation_keys: vec![Keyframe::new(0.0, Quat::IDENTITY)],
            scale_keys: vec![Keyframe::new(0.0, Vec3::ONE)],
        }
    }

    #[test]
    fn mesh_entries_base_offsets() {
        let meshes = [
            MeshSkin {
                vertex_count: 4,
                index_count: 6,
                material_index: 1,
                influences: Vec::new(),
            },
            MeshSkin {
                vertex_count: 3,
                index_count: 3,
                material_index: 0,
                influences: Vec::new(),
            },
            MeshSkin {
                vertex_count: 8,
                index_count: 36,
                material_index: 2,
                influences: Vec::new(),
            },
        ];
        assert_eq!(
            vec![
                MeshEntry {
                    vertex_count: 4,
                    index_count: 6,
                    base_vertex: 0,
                    base_index: 0,
                    material_index: 1
                },
                MeshEntry {
                    vertex_count: 3,
                    index_count: 3,
                    base_vertex: 4,
                    base_index: 6,
                    material_index: 0
                },
                MeshEntry {
                    vertex_count: 8,
                    index_count: 36,
                    base_vertex: 7,
                    base_index: 9,
                    material_index: 2
                },
            ],
            mesh_entries(&meshes)
        );
    }

    #[test]
    fn weights_use_base_vertex() {
        let meshes = [
            mesh(2, vec![influence("a", Mat4::IDENTITY, &[(1, 0.5)])]),
            mesh(
                3,
                vec![
                    influence("b", Mat4::IDENTITY, &[(0, 0.25), (2, 1.0)]),
                    influence("a", Mat4::IDENTITY, &[(0, 0.75)]),
                ],
            ),
        ];
        let root = Node::new("root", Mat4::IDENTITY).with_children(vec![
            Node::new("a", Mat4::IDENTITY),
            Node::new("b", Mat4::IDENTITY),
        ]);

        let model =
            SkinnedModel::from_meshes(&meshes, root, None, ModelOptions::default()).unwrap();
        assert_eq!(5, model.vertex_count());
        assert_eq!(15, model.index_count());
        assert_eq!(
            vec![
                VertexInfluences::default(),
                VertexInfluences {
                    bone_indices: [0, 0, 0, 0],
                    weights: [0.5, 0.0, 0.0, 0.0]
                },
                VertexInfluences {
                    bone_indices: [1, 0, 0, 0],
                    weights: [0.25, 0.75, 0.0, 0.0]
                },
                VertexInfluences::default(),
                VertexInfluences {
                    bone_indices: [1, 0, 0, 0],
                    weights: [1.0, 0.0, 0.0, 0.0]
                },
            ],
            model.weights().vertices()
        );
    }

    #[test]
    fn vertex_out_of_range() {
        let meshes = [
            mesh(2, Vec::new()),
            mesh(2, vec![influence("a", Mat4::IDENTITY, &[(2, 1.0)])]),
        ];
        let root = Node::new("a", Mat4::IDENTITY);
        assert_eq!(
            Err(CreateModelError::VertexOutOfRange {
                mesh_index: 1,
                vertex_index: 2,
                vertex_count: 2
            }),
            SkinnedModel::from_meshes(&meshes, root, None, ModelOptions::default())
                .map(|_| ())
        );
    }

    #[test]
    fn too_many_influences() {
        let meshes = [mesh(
            1,
            ["a", "b", "c", "d", "e"]
                .iter()
                .map(|n| influence(n, Mat4::IDENTITY, &[(0, 0.2)]))
                .collect(),
        )];
        let root = Node::new("root", Mat4::IDENTITY).with_children(
            ["a", "b", "c", "d", "e"]
                .iter()
                .map(|n| Node::new(*n, Mat4::IDENTITY))
                .collect(),
        );
        assert_eq!(
            Err(CreateModelError::Influence {
                bone_name: "e".into(),
                source: AddInfluenceError::TooManyInfluences { vertex: 0, bone: 4 }
            }),
            SkinnedModel::from_meshes(&meshes, root, None, ModelOptions::default())
                .map(|_| ())
        );
    }

    #[test]
    fn missing_bone_node() {
        let meshes = [mesh(
            1,
            vec![
                influence("a", Mat4::IDENTITY, &[(0, 0.5)]),
                influence("b", Mat4::IDENTITY, &[(0, 0.5)]),
            ],
        )];
        let root = Node::new("a", Mat4::IDENTITY);
        assert_eq!(
            Err(CreateModelError::MissingBoneNode {
                bone_name: "b".into()
            }),
            SkinnedModel::from_meshes(&meshes, root, None, ModelOptions::default())
                .map(|_| ())
        );
    }

    #[test]
    fn singular_root_transform() {
        let root = Node::new("root", Mat4::ZERO);
        assert_eq!(
            Err(CreateModelError::SingularRootTransform {
                node_name: "root".to_string()
            }),
            SkinnedModel::from_meshes(&[], root, None, ModelOptions::default()).map(|_| ())
        );
    }

    #[test]
    fn rest_pose_without_animation() {
        let offset = Mat4::from_translation(vec3(0.0, -1.0, 0.0));
        let meshes = [mesh(1, vec![influence("b", offset, &[(0, 1.0)])])];
        let root = Node::new("root", Mat4::IDENTITY).with_children(vec![Node::new(
            "b",
            Mat4::from_translation(vec3(0.0, 1.0, 0.0)),
        )]);

        let model =
            SkinnedModel::from_meshes(&meshes, root, None, ModelOptions::default()).unwrap();
        assert_eq!(None, model.animation_time(1.0));
        assert_eq!(vec![Mat4::IDENTITY], model.skinning_transforms(1.0));
        assert_eq!(vec![Mat4::IDENTITY], model.rest_pose_transforms());
    }

    #[test]
    fn unanimated_nodes_propagate_transforms() {
        // Intermediate nodes without bones still affect their descendants.
        let meshes = [mesh(1, vec![influence("c", Mat4::IDENTITY, &[(0, 1.0)])])];
        let root = Node::new("root", Mat4::IDENTITY).with_children(vec![
            Node::new("group", Mat4::from_translation(vec3(1.0, 0.0, 0.0))).with_children(vec![
                Node::new("c", Mat4::from_translation(vec3(0.0, 2.0, 0.0))),
            ]),
        ]);

        let model =
            SkinnedModel::from_meshes(&meshes, root, None, ModelOptions::default()).unwrap();
        assert_matrix_relative_eq!(
            Mat4::from_translation(vec3(1.0, 2.0, 0.0)),
            model.rest_pose_transforms()[0]
        );
    }

    #[test]
    fn root_transform_cancelled() {
        let meshes = [mesh(1, vec![influence("root", Mat4::IDENTITY, &[(0, 1.0)])])];
        let root = Node::new("root", Mat4::from_scale(vec3(100.0, 100.0, 100.0)));

        let model =
            SkinnedModel::from_meshes(&meshes, root, None, ModelOptions::default()).unwrap();
        assert_matrix_relative_eq!(Mat4::IDENTITY, model.rest_pose_transforms()[0]);
    }

    #[test]
    fn update_writes_final_transforms() {
        let meshes = [mesh(1, vec![influence("a", Mat4::IDENTITY, &[(0, 1.0)])])];
        let root = Node::new("a", Mat4::IDENTITY);
        let animation = Animation {
            name: "move".to_string(),
            duration: 4.0,
            ticks_per_second: 2.0,
            channels: vec![translation_channel(
                "a",
                &[(0.0, Vec3::ZERO), (4.0, vec3(4.0, 0.0, 0.0))],
            )],
        };

        let mut model =
            SkinnedModel::from_meshes(&meshes, root, Some(animation), ModelOptions::default())
                .unwrap();
        assert_eq!(vec![Mat4::ZERO], model.skeleton().final_transforms());

        model.update(0.5);
        assert_eq!(Some(1.0), model.animation_time(0.5));
        assert_eq!(
            vec![Mat4::from_translation(vec3(1.0, 0.0, 0.0))],
            model.skeleton().final_transforms()
        );
    }

    #[test]
    fn duplicate_bone_nodes_use_last() {
        let meshes = [mesh(1, vec![influence("a", Mat4::IDENTITY, &[(0, 1.0)])])];
        let root = Node::new("root", Mat4::IDENTITY).with_children(vec![
            Node::new("a", Mat4::from_translation(vec3(1.0, 0.0, 0.0))),
            Node::new("a", Mat4::from_translation(vec3(2.0, 0.0, 0.0))),
        ]);

        let model =
            SkinnedModel::from_meshes(&meshes, root, None, ModelOptions::default()).unwrap();
        assert_eq!(
            vec![Mat4::from_translation(vec3(2.0, 0.0, 0.0))],
            model.rest_pose_transforms()
        );
    }
}
