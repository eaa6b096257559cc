//! The decoded, mutable representation of one relightable object.
//!
//! A [`PcaObject`] is created once from its `POBJ` header, which fixes the
//! channel count and the per-channel basis and LUT sizes. Later chunks fill
//! in LUT rows, basis image blobs, the transform and the geometry.

use glam::{DVec3, Mat3, Vec3};
use yxv_decode::Geometry;
use yxv_decode::lut::coefficient_from_byte;

use crate::coefficients::{Coefficients, interpolate};
use crate::error::{Error, Result};
use crate::types::{
    BasisDesc, ImageBlob, LutDesc, LutRange, Orientation, StaticTexture, Transform,
};

/// Camera distance factor applied to the object's half height.
const CAMERA_DISTANCE_FACTOR: f32 = 1.7;

/// One relightable object.
#[derive(Debug, Clone, PartialEq)]
pub struct PcaObject {
    id: u32,
    basis_desc: Vec<BasisDesc>,
    lut_desc: Vec<LutDesc>,
    lut_range: LutRange,
    /// LUT samples indexed `[channel][row][sample]`. Row 0 is the DC term.
    lut: Vec<Vec<Vec<f32>>>,
    basis: Vec<Vec<Option<ImageBlob>>>,
    /// Per channel, the most basis images the host can sample.
    basis_limit: Vec<usize>,
    static_texture: Option<StaticTexture>,
    transform: Transform,
    geometry: Option<Geometry>,
    basis_percent: Option<f32>,
    frozen: bool,
    coefficients: Option<Coefficients>,
}

impl PcaObject {
    /// Create an object with empty LUTs and no basis images.
    ///
    /// `basis_desc` and `lut_desc` must describe the same number of channels;
    /// extra entries in the longer list are ignored.
    #[must_use]
    pub fn new(id: u32, mut basis_desc: Vec<BasisDesc>, mut lut_desc: Vec<LutDesc>) -> Self {
        let channels = basis_desc.len().min(lut_desc.len());
        basis_desc.truncate(channels);
        lut_desc.truncate(channels);

        let lut = basis_desc
            .iter()
            .zip(&lut_desc)
            .map(|(basis, lut)| vec![vec![0.0; lut.len()]; basis.max_basis + 1])
            .collect();
        let basis = vec![Vec::new(); channels];
        let basis_limit = basis_desc.iter().map(|d| d.max_basis).collect();

        Self {
            id,
            basis_desc,
            lut_desc,
            lut_range: LutRange::default(),
            lut,
            basis,
            basis_limit,
            static_texture: None,
            transform: Transform::default(),
            geometry: None,
            basis_percent: None,
            frozen: false,
            coefficients: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn num_channels(&self) -> usize {
        self.basis_desc.len()
    }

    #[must_use]
    pub fn basis_desc(&self) -> &[BasisDesc] {
        &self.basis_desc
    }

    #[must_use]
    pub fn lut_desc(&self) -> &[LutDesc] {
        &self.lut_desc
    }

    #[must_use]
    pub fn lut_range(&self) -> &LutRange {
        &self.lut_range
    }

    /// One LUT row of a channel, or `None` if either index is out of range.
    #[must_use]
    pub fn lut_row(&self, channel: usize, row: usize) -> Option<&[f32]> {
        self.lut.get(channel)?.get(row).map(Vec::as_slice)
    }

    /// The basis blobs received so far for a channel, with gaps as `None`.
    #[must_use]
    pub fn basis(&self, channel: usize) -> &[Option<ImageBlob>] {
        self.basis.get(channel).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn static_texture(&self) -> Option<&StaticTexture> {
        self.static_texture.as_ref()
    }

    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    #[must_use]
    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn geometry_mut(&mut self) -> Option<&mut Geometry> {
        self.geometry.as_mut()
    }

    fn check_channel(&self, channel: usize) -> Result<()> {
        if channel < self.num_channels() {
            Ok(())
        } else {
            Err(Error::InvalidChannel {
                id: self.id,
                channel,
                channels: self.num_channels(),
            })
        }
    }

    /// Write `num_basis` LUT rows for a channel from signed bytes.
    ///
    /// Basis `basis_start + b` lands in row `basis_start + b + 1`; row 0 is
    /// filled with 1.0 whenever `basis_start` is 0.
    pub fn set_lookup_table(
        &mut self,
        channel: usize,
        basis_start: usize,
        num_basis: usize,
        bytes: &[i8],
    ) -> Result<()> {
        self.check_channel(channel)?;
        let max_basis = self.basis_desc[channel].max_basis;
        let row_len = self.lut_desc[channel].len();

        if basis_start + num_basis > max_basis {
            return Err(Error::BasisOutOfRange {
                id: self.id,
                channel,
                index: basis_start + num_basis,
                max_basis,
            });
        }
        if bytes.len() < num_basis * row_len {
            return Err(Error::LutSize {
                id: self.id,
                channel,
                expected: num_basis * row_len,
                actual: bytes.len(),
            });
        }

        let lut = &mut self.lut[channel];
        if basis_start == 0 {
            lut[0].fill(1.0);
        }
        for (b, row_bytes) in bytes.chunks(row_len.max(1)).take(num_basis).enumerate() {
            for (dst, &src) in lut[basis_start + b + 1].iter_mut().zip(row_bytes) {
                *dst = coefficient_from_byte(src);
            }
        }
        Ok(())
    }

    /// Store basis blobs for a channel starting at `start`.
    pub fn set_basis(&mut self, channel: usize, start: usize, blobs: Vec<ImageBlob>) -> Result<()> {
        self.check_channel(channel)?;
        let max_basis = self.basis_desc[channel].max_basis;
        let end = start + blobs.len();
        if end > max_basis {
            return Err(Error::BasisOutOfRange {
                id: self.id,
                channel,
                index: end - 1,
                max_basis,
            });
        }

        let slots = &mut self.basis[channel];
        if slots.len() < end {
            slots.resize(end, None);
        }
        for (slot, blob) in slots[start..end].iter_mut().zip(blobs) {
            *slot = Some(blob);
        }
        Ok(())
    }

    pub fn set_static_texture(&mut self, texture: StaticTexture) {
        self.static_texture = Some(texture);
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.transform.position = position;
    }

    /// Set the scale. Use [`Vec3::splat`] for a uniform scale.
    pub fn set_scale(&mut self, scale: Vec3) {
        self.transform.scale = scale;
    }

    pub fn set_euler_angles(&mut self, angles: DVec3) {
        self.transform.orientation = Orientation::Euler(angles);
    }

    /// Set an explicit rotation from three row vectors.
    pub fn set_euler_matrix(&mut self, rows: [Vec3; 3]) {
        self.transform.orientation =
            Orientation::Matrix(Mat3::from_cols(rows[0], rows[1], rows[2]).transpose());
    }

    pub fn set_lut_range(&mut self, range: LutRange) {
        self.lut_range = range;
    }

    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.geometry = Some(geometry);
    }

    /// Longest run of basis images with no gaps, starting at index 0.
    #[must_use]
    pub fn loaded_basis_count(&self, channel: usize) -> usize {
        let max_basis = self.basis_desc.get(channel).map_or(0, |d| d.max_basis);
        self.basis(channel)
            .iter()
            .take_while(|b| b.is_some())
            .count()
            .min(max_basis)
    }

    /// Limit rendering to a percentage of each channel's basis budget.
    ///
    /// `None` removes the limit.
    pub fn set_basis_percent(&mut self, percent: Option<f32>) {
        self.basis_percent = percent;
    }

    #[must_use]
    pub fn basis_percent(&self) -> Option<f32> {
        self.basis_percent
    }

    /// Cap the basis images of `channel` that rendering may use, for a
    /// layout that stores fewer than the channel declares. The cap never
    /// exceeds the declared `max_basis`.
    pub fn set_basis_limit(&mut self, channel: usize, limit: usize) {
        let max_basis = self.basis_desc.get(channel).map_or(0, |d| d.max_basis);
        if let Some(slot) = self.basis_limit.get_mut(channel) {
            *slot = limit.min(max_basis);
        }
    }

    #[must_use]
    pub fn basis_limit(&self, channel: usize) -> usize {
        self.basis_limit.get(channel).copied().unwrap_or(0)
    }

    /// Number of basis images used when rendering a channel.
    ///
    /// Without a percentage budget this is the loaded count, capped at the
    /// channel's [`basis_limit`](Self::basis_limit). With one, the budget is
    /// rounded down to a multiple of 4, raised to at least 4 and capped the
    /// same way.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn effective_basis_count(&self, channel: usize) -> usize {
        let usable = self
            .loaded_basis_count(channel)
            .min(self.basis_limit(channel));
        let Some(percent) = self.basis_percent else {
            return usable;
        };
        let max_basis = self.basis_desc.get(channel).map_or(0, |d| d.max_basis);
        let budget = (max_basis as f32 * percent.max(0.0) / 100.0).floor() as usize;
        (budget / 4 * 4).max(4).min(usable)
    }

    /// Stop or resume coefficient updates.
    pub fn set_freeze(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Recompute the coefficients for `angle` degrees unless frozen.
    ///
    /// Returns `true` if the coefficients were recomputed.
    pub fn update_coefficients(&mut self, angle: f32) -> bool {
        if self.frozen {
            return false;
        }
        self.coefficients = Some(interpolate(self, angle));
        true
    }

    /// The coefficients from the last update.
    #[must_use]
    pub fn coefficients(&self) -> Option<&Coefficients> {
        self.coefficients.as_ref()
    }

    /// Largest vertical extent of the geometry, scaled.
    #[must_use]
    pub fn max_height(&self) -> f32 {
        let Some(geometry) = &self.geometry else {
            return 0.0;
        };
        let extent = geometry
            .positions
            .iter()
            .fold(0.0f32, |acc, p| acc.max(p.y.abs()));
        extent * self.transform.scale.y.abs()
    }

    /// Distance at which a camera with vertical field of view `fovy_degrees`
    /// comfortably frames the object.
    #[must_use]
    pub fn camera_distance(&self, fovy_degrees: f32) -> f32 {
        CAMERA_DISTANCE_FACTOR * self.max_height() / (fovy_degrees.to_radians() / 2.0).tan()
    }
}

/// Convert a rotation about the vertical axis (radians) to a LUT angle in
/// degrees. A rotation of `-π` faces LUT angle 0.
#[must_use]
pub fn lut_angle(rotation_y: f32) -> f32 {
    (rotation_y + std::f32::consts::PI).to_degrees()
}
