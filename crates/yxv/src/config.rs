//! Viewer configuration and GPU capability checks.

use std::fmt;

use crate::atlas::{DEFAULT_MAX_TEXTURE_SIZE, PackStrategy};

/// Smallest maximum texture size a GPU must support.
pub const MIN_TEXTURE_SIZE: u32 = 4096;

/// Fewest texture units a GPU must offer.
pub const MIN_TEXTURE_UNITS: u32 = 2;

/// Settings for loading and packing a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerConfig {
    pub pack_strategy: PackStrategy,
    /// Largest texture dimension the host can upload.
    pub max_texture_size: u32,
    /// Percentage of each channel's basis budget to render. `None` renders
    /// every loaded basis image.
    pub basis_percent: Option<f32>,
    pub min_texture_size: u32,
    pub min_texture_units: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            pack_strategy: PackStrategy::default(),
            max_texture_size: DEFAULT_MAX_TEXTURE_SIZE,
            basis_percent: None,
            min_texture_size: MIN_TEXTURE_SIZE,
            min_texture_units: MIN_TEXTURE_UNITS,
        }
    }
}

/// Limits reported by the host's GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuLimits {
    pub max_texture_size: u32,
    pub max_texture_units: u32,
}

/// Why a GPU cannot display models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuLimitError {
    TextureSize { required: u32, actual: u32 },
    TextureUnits { required: u32, actual: u32 },
}

impl fmt::Display for GpuLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuLimitError::TextureSize { required, actual } => write!(
                f,
                "maximum texture size {actual} is below the required {required}"
            ),
            GpuLimitError::TextureUnits { required, actual } => write!(
                f,
                "{actual} texture units available, {required} required"
            ),
        }
    }
}

impl std::error::Error for GpuLimitError {}

impl ViewerConfig {
    /// Check that a GPU meets the minimum requirements.
    ///
    /// # Errors
    ///
    /// Returns the first requirement the GPU does not meet.
    pub fn check_gpu_limits(&self, limits: &GpuLimits) -> Result<(), GpuLimitError> {
        if limits.max_texture_size < self.min_texture_size {
            return Err(GpuLimitError::TextureSize {
                required: self.min_texture_size,
                actual: limits.max_texture_size,
            });
        }
        if limits.max_texture_units < self.min_texture_units {
            return Err(GpuLimitError::TextureUnits {
                required: self.min_texture_units,
                actual: limits.max_texture_units,
            });
        }
        Ok(())
    }

    /// Lower the packing texture size to what the GPU supports.
    #[must_use]
    pub fn with_gpu_limits(mut self, limits: &GpuLimits) -> Self {
        self.max_texture_size = self.max_texture_size.min(limits.max_texture_size);
        self
    }
}
