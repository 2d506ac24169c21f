use std::io::Write;

use glam::Mat4;
use rigkit_model::{SkinnedModel, Transform};
use serde::Serialize;

/// The skinning matrices sampled at a single point in time.
#[derive(Debug, PartialEq)]
pub struct Frame {
    pub time_seconds: f32,
    /// The looped animation time in ticks or `None` for the rest pose.
    pub ticks: Option<f32>,
    pub transforms: Vec<Mat4>,
}

impl Frame {
    pub fn sample(model: &SkinnedModel, time_seconds: f32) -> Self {
        Self {
            time_seconds,
            ticks: model.animation_time(time_seconds),
            transforms: model.skinning_transforms(time_seconds),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    /// Print translation, rotation, and scale instead of matrices.
    pub decompose: bool,
    /// Include the bone indices and weights for each vertex.
    pub weights: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    node_count: usize,
    depth: usize,
    meshes: Vec<MeshReport>,
    bones: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vertices: Option<Vec<VertexReport>>,
    frames: Vec<FrameReport<'a>>,
}

#[derive(Serialize)]
struct MeshReport {
    vertex_count: usize,
    index_count: usize,
    base_vertex: usize,
    base_index: usize,
    material_index: usize,
}

#[derive(Serialize)]
struct VertexReport {
    bone_indices: [u32; 4],
    weights: [f32; 4],
}

#[derive(Serialize)]
struct FrameReport<'a> {
    time: f32,
    ticks: Option<f32>,
    bones: Vec<BoneReport<'a>>,
}

#[derive(Serialize)]
struct BoneReport<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    matrix: Option<[[f32; 4]; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    translation: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rotation: Option<[f32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scale: Option<[f32; 3]>,
}

impl<'a> BoneReport<'a> {
    fn new(name: &'a str, transform: Mat4, decompose: bool) -> Self {
        if decompose {
            let t = Transform::from_matrix(transform);
            Self {
                name,
                matrix: None,
                translation: Some(t.translation.to_array()),
                rotation: Some(t.rotation.to_array()),
                scale: Some(t.scale.to_array()),
            }
        } else {
            Self {
                name,
                matrix: Some(transform.to_cols_array_2d()),
                translation: None,
                rotation: None,
                scale: None,
            }
        }
    }
}

pub fn write_json<W: Write>(
    writer: W,
    model: &SkinnedModel,
    frames: &[Frame],
    options: OutputOptions,
) -> serde_json::Result<()> {
    let names: Vec<_> = model.skeleton().names().collect();

    let report = Report {
        node_count: model.root().node_count(),
        depth: model.root().depth(),
        meshes: model
            .meshes()
            .iter()
            .map(|m| MeshReport {
                vertex_count: m.vertex_count,
                index_count: m.index_count,
                base_vertex: m.base_vertex,
                base_index: m.base_index,
                material_index: m.material_index,
            })
            .collect(),
        bones: names.clone(),
        vertices: options.weights.then(|| {
            model
                .weights()
                .vertices()
                .iter()
                .map(|v| VertexReport {
                    bone_indices: v.bone_indices,
                    weights: v.weights,
                })
                .collect()
        }),
        frames: frames
            .iter()
            .map(|f| FrameReport {
                time: f.time_seconds,
                ticks: f.ticks,
                bones: names
                    .iter()
                    .zip(&f.transforms)
                    .map(|(name, transform)| BoneReport::new(name, *transform, options.decompose))
                    .collect(),
            })
            .collect(),
    };

    serde_json::to_writer_pretty(writer, &report)
}

pub fn write_text<W: Write>(
    mut writer: W,
    model: &SkinnedModel,
    frames: &[Frame],
    options: OutputOptions,
) -> std::io::Result<()> {
    writeln!(
        writer,
        "nodes: {}, depth {}",
        model.root().node_count(),
        model.root().depth()
    )?;

    for (i, mesh) in model.meshes().iter().enumerate() {
        writeln!(
            writer,
            "mesh {i}: vertices {}..{}, indices {}..{}, material {}",
            mesh.base_vertex,
            mesh.base_vertex + mesh.vertex_count,
            mesh.base_index,
            mesh.base_index + mesh.index_count,
            mesh.material_index
        )?;
    }

    if options.weights {
        for (i, vertex) in model.weights().vertices().iter().enumerate() {
            write!(writer, "vertex {i}:")?;
            for (bone, weight) in vertex
                .bone_indices
                .iter()
                .zip(vertex.weights)
                .take(vertex.count())
            {
                write!(writer, " {bone}:{weight}")?;
            }
            writeln!(writer)?;
        }
    }

    for frame in frames {
        match frame.ticks {
            Some(ticks) => writeln!(writer, "time {}s (tick {ticks})", frame.time_seconds)?,
            None => writeln!(writer, "time {}s (rest pose)", frame.time_seconds)?,
        }

        for (i, (name, transform)) in model
            .skeleton()
            .names()
            .zip(&frame.transforms)
            .enumerate()
        {
            if options.decompose {
                let t = Transform::from_matrix(*transform);
                writeln!(
                    writer,
                    "  {i} {name}: t={:?} r={:?} s={:?}",
                    t.translation.to_array(),
                    t.rotation.to_array(),
                    t.scale.to_array()
                )?;
            } else {
                writeln!(writer, "  {i} {name}: {:?}", transform.to_cols_array_2d())?;
            }
        }
    }

    Ok(())
}
