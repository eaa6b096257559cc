//! Core data types for decoded objects.

use std::sync::Arc;

use glam::{DVec3, Mat3, Mat4, Vec3, Vec4};

/// Size and basis budget of one channel's basis images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasisDesc {
    /// Basis image width in pixels.
    pub width: u32,
    /// Basis image height in pixels.
    pub height: u32,
    /// Maximum number of basis images for the channel.
    pub max_basis: usize,
}

/// Size of one channel's angular lookup table grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LutDesc {
    /// Samples along the rotation axis.
    pub width: u32,
    /// Samples along the second (usually unused) axis.
    pub height: u32,
}

impl LutDesc {
    /// Number of samples in one LUT row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the grid has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Angular domain covered by the LUTs, in degrees.
///
/// Each field holds one value per rotation axis. Only rotation about the
/// vertical axis (`y`) is populated in practice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LutRange {
    pub mean: Vec3,
    pub min: Vec3,
    pub max: Vec3,
}

impl LutRange {
    /// Minimum and maximum angle about the vertical axis.
    #[must_use]
    pub fn vertical(&self) -> (f32, f32) {
        (self.min.y, self.max.y)
    }
}

impl Default for LutRange {
    /// A full turn, used until a `LUTR` chunk arrives.
    fn default() -> Self {
        Self {
            mean: Vec3::splat(180.0),
            min: Vec3::ZERO,
            max: Vec3::splat(360.0),
        }
    }
}

/// Object orientation as last written by the file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Orientation {
    /// Euler angles from a `ROT ` chunk.
    Euler(DVec3),
    /// Explicit basis-change matrix from an `EUA ` chunk, stored by rows.
    Matrix(Mat3),
}

impl Default for Orientation {
    fn default() -> Self {
        Self::Euler(DVec3::ZERO)
    }
}

/// Placement of an object in its scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub scale: Vec3,
    pub orientation: Orientation,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            orientation: Orientation::default(),
        }
    }
}

/// An undecoded image stream, cheap to clone and share with decoders.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBlob(Arc<[u8]>);

impl ImageBlob {
    #[must_use]
    pub fn new(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ImageBlob({} bytes)", self.0.len())
    }
}

/// A flat fallback texture shown before the basis images are ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticTexture {
    pub blob: ImageBlob,
    /// Width claimed by the file. Informational only.
    pub width_hint: u32,
    /// Height claimed by the file. Informational only.
    pub height_hint: u32,
}

/// Default YUV to RGB colour matrix for reconstructed basis sums.
///
/// In row-major form the rows are `(1, 0, 1, 0)`, `(1, 0, 0, 0)`,
/// `(1, 1, 0, 0)` and `(0, 0, 0, 1)`.
pub const YUV_TO_RGB: Mat4 = Mat4::from_cols(
    Vec4::new(1.0, 1.0, 1.0, 0.0),
    Vec4::new(0.0, 0.0, 1.0, 0.0),
    Vec4::new(1.0, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 0.0, 1.0),
);
