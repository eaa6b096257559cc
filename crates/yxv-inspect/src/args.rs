//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use yxv::atlas::DEFAULT_MAX_TEXTURE_SIZE;
use yxv::{PackStrategy, ViewerConfig};

/// Atlas layout to pack basis images into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Strategy {
    /// One atlas per four basis images.
    Multi,
    /// One tall texture per channel.
    #[default]
    Stacked,
}

impl From<Strategy> for PackStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Multi => PackStrategy::Multi,
            Strategy::Stacked => PackStrategy::Stacked,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Load a YXV model and report what it contains")]
pub struct CliArgs {
    /// Path to the model file.
    pub path: PathBuf,

    /// Bytes delivered to the parser per read, to mimic a streaming download.
    #[arg(long, default_value_t = 64 * 1024)]
    pub slice_size: usize,

    /// Atlas layout.
    #[arg(long, value_enum, default_value_t = Strategy::default())]
    pub strategy: Strategy,

    /// Largest texture dimension available for packing.
    #[arg(long, default_value_t = DEFAULT_MAX_TEXTURE_SIZE)]
    pub max_texture_size: u32,

    /// Render only this percentage of each channel's basis images.
    #[arg(long)]
    pub basis_percent: Option<f32>,

    /// Rotations about the vertical axis, in degrees, to evaluate
    /// coefficients at.
    #[arg(long, value_delimiter = ',', default_values_t = [0.0, 90.0, 180.0, 270.0])]
    pub angles: Vec<f32>,

    /// Number of threads decoding basis images.
    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    /// Write packed atlases as PNG files into this directory.
    #[arg(long)]
    pub dump_atlases: Option<PathBuf>,
}

impl CliArgs {
    pub fn config(&self) -> ViewerConfig {
        ViewerConfig {
            pack_strategy: self.strategy.into(),
            max_texture_size: self.max_texture_size,
            basis_percent: self.basis_percent,
            ..ViewerConfig::default()
        }
    }
}
