use std::io::{BufWriter, Write};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::info;
use rayon::prelude::*;
use rigkit_model::{InfluenceOverflow, KeyframeFallback, ModelOptions};
#[cfg(feature = "tracing")]
use tracing_subscriber::prelude::*;

use output::{Frame, OutputOptions};
use scene::Scene;

mod output;
mod scene;

#[derive(Parser)]
#[command(author, version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// The JSON scene description with meshes, nodes, and an optional animation.
    scene: String,

    /// Times in seconds to sample.
    /// Defaults to 0.0 if no times or frames are specified.
    #[arg(long = "time", num_args = 1.., allow_negative_numbers = true)]
    times: Vec<f32>,

    /// Sample this many evenly spaced frames starting at 0.0 seconds.
    #[arg(long)]
    frames: Option<usize>,

    /// The sample rate for --frames.
    #[arg(long, default_value_t = 30.0)]
    fps: f32,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// The behavior when a vertex has more than 4 bone influences.
    #[arg(long, value_enum, default_value_t = Overflow::Strict)]
    overflow: Overflow,

    /// The keyframe used at or after the final keyframe of a channel.
    #[arg(long, value_enum, default_value_t = Fallback::Clamp)]
    fallback: Fallback,

    /// Print translation, rotation, and scale instead of matrices.
    #[arg(long)]
    decompose: bool,

    /// Print the bone indices and weights for each vertex.
    #[arg(long)]
    weights: bool,
}

#[derive(Copy, PartialEq, Clone, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Copy, PartialEq, Clone, Eq, ValueEnum)]
enum Overflow {
    Strict,
    KeepLargest,
}

impl From<Overflow> for InfluenceOverflow {
    fn from(value: Overflow) -> Self {
        match value {
            Overflow::Strict => Self::Strict,
            Overflow::KeepLargest => Self::KeepLargest,
        }
    }
}

#[derive(Copy, PartialEq, Clone, Eq, ValueEnum)]
enum Fallback {
    Clamp,
    FirstBracket,
}

impl From<Fallback> for KeyframeFallback {
    fn from(value: Fallback) -> Self {
        match value {
            Fallback::Clamp => Self::Clamp,
            Fallback::FirstBracket => Self::FirstBracket,
        }
    }
}

impl Cli {
    fn sample_times(&self) -> Vec<f32> {
        let mut times = self.times.clone();
        if let Some(frames) = self.frames {
            times.extend((0..frames).map(|i| i as f32 / self.fps));
        }
        if times.is_empty() {
            times.push(0.0);
        }
        times
    }
}

fn main() -> anyhow::Result<()> {
    // Ignore most logs to avoid flooding the console.
    #[cfg(not(feature = "tracing"))]
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init()?;

    #[cfg(feature = "tracing")]
    tracing::subscriber::set_global_default(
        tracing_subscriber::registry().with(tracing_tracy::TracyLayer::default()),
    )?;

    let cli = Cli::parse();
    if cli.frames.is_some() && cli.fps <= 0.0 {
        anyhow::bail!("--fps must be positive but was {}", cli.fps);
    }

    let scene = Scene::from_file(&cli.scene)?;
    let model = scene
        .to_model(ModelOptions {
            overflow: cli.overflow.into(),
            fallback: cli.fallback.into(),
        })
        .with_context(|| format!("failed to create model from {:?}", cli.scene))?;

    let start = std::time::Instant::now();
    let frames: Vec<_> = cli
        .sample_times()
        .into_par_iter()
        .map(|t| Frame::sample(&model, t))
        .collect();
    info!("Sampled {} frames in {:?}", frames.len(), start.elapsed());

    let options = OutputOptions {
        decompose: cli.decompose,
        weights: cli.weights,
    };
    let mut writer = BufWriter::new(std::io::stdout().lock());
    match cli.format {
        Format::Text => output::write_text(&mut writer, &model, &frames, options)?,
        Format::Json => {
            output::write_json(&mut writer, &model, &frames, options)?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;

    Ok(())
}
