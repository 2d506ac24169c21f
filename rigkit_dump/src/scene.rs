//! The JSON scene description produced by an external importer.
use std::path::Path;

use anyhow::Context;
use glam::{Mat4, Quat, Vec3};
use rigkit_model::{
    Animation, Channel, Influence, Keyframe, MeshSkin, ModelOptions, Node, SkinWeight,
    SkinnedModel, error::CreateModelError,
};
use serde::Deserialize;

#[derive(Debug, PartialEq, Deserialize)]
pub struct Scene {
    pub meshes: Vec<SceneMesh>,
    pub root: SceneNode,
    #[serde(default)]
    pub animation: Option<SceneAnimation>,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct SceneMesh {
    pub vertex_count: usize,
    #[serde(default)]
    pub index_count: usize,
    #[serde(default)]
    pub material_index: usize,
    #[serde(default)]
    pub bones: Vec<SceneBone>,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct SceneBone {
    pub name: String,
    /// Matrix columns.
    #[serde(default = "identity")]
    pub offset: [[f32; 4]; 4],
    pub weights: Vec<SceneWeight>,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct SceneWeight {
    pub vertex: u32,
    pub weight: f32,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct SceneNode {
    pub name: String,
    /// Matrix columns.
    #[serde(default = "identity")]
    pub transform: [[f32; 4]; 4],
    #[serde(default)]
    pub children: Vec<SceneNode>,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct SceneAnimation {
    #[serde(default)]
    pub name: String,
    pub duration: f32,
    #[serde(default)]
    pub ticks_per_second: f32,
    pub channels: Vec<SceneChannel>,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct SceneChannel {
    pub node_name: String,
    pub translation: Vec<SceneKey<[f32; 3]>>,
    /// Quaternions as `[x, y, z, w]`.
    pub rotation: Vec<SceneKey<[f32; 4]>>,
    pub scale: Vec<SceneKey<[f32; 3]>>,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct SceneKey<T> {
    pub time: f32,
    pub value: T,
}

fn identity() -> [[f32; 4]; 4] {
    Mat4::IDENTITY.to_cols_array_2d()
}

impl Scene {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {path:?}"))?;
        serde_json::from_str(&json).with_context(|| format!("failed to parse {path:?}"))
    }

    pub fn to_model(&self, options: ModelOptions) -> Result<SkinnedModel, CreateModelError> {
        let meshes: Vec<_> = self.meshes.iter().map(mesh_skin).collect();
        let animation = self.animation.as_ref().map(animation);
        SkinnedModel::from_meshes(&meshes, node(&self.root), animation, options)
    }
}

fn mesh_skin(mesh: &SceneMesh) -> MeshSkin {
    MeshSkin {
        vertex_count: mesh.vertex_count,
        index_count: mesh.index_count,
        material_index: mesh.material_index,
        influences: mesh
            .bones
            .iter()
            .map(|b| Influence {
                bone_name: b.name.clone(),
                offset: Mat4::from_cols_array_2d(&b.offset),
                weights: b
                    .weights
                    .iter()
                    .map(|w| SkinWeight {
                        vertex_index: w.vertex,
                        weight: w.weight,
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn node(node: &SceneNode) -> Node {
    Node::new(&node.name, Mat4::from_cols_array_2d(&node.transform))
        .with_children(node.children.iter().map(self::node).collect())
}

fn animation(animation: &SceneAnimation) -> Animation {
    Animation {
        name: animation.name.clone(),
        duration: animation.duration,
        ticks_per_second: animation.ticks_per_second,
        channels: animation
            .channels
            .iter()
            .map(|c| Channel {
                node_name: c.node_name.clone(),
                translation_keys: keyframes(&c.translation, Vec3::from_array),
                rotation_keys: keyframes(&c.rotation, Quat::from_array),
                scale_keys: keyframes(&c.scale, Vec3::from_array),
            })
            .collect(),
    }
}

fn keyframes<T: Copy, U>(keys: &[SceneKey<T>], f: impl Fn(T) -> U) -> Vec<Keyframe<U>> {
    keys.iter().map(|k| Keyframe::new(k.time, f(k.value))).collect()
}
