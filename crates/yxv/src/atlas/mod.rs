//! Packing of decoded basis images into GPU-uploadable RGBA atlases.
//!
//! Basis images are greyscale, so four of them share one RGBA texel: image
//! `4g + k` of a channel goes to component `k` of group `g`. Two layouts are
//! available:
//!
//! - [`MultiAtlasPacker`]: one `w x h` atlas per group
//! - [`StackedAtlasPacker`]: one tall texture per channel with every group
//!   stacked vertically, highest group at the top
//!
//! Packing is incremental. A [`PackJob`] covers only images past each
//! channel's packed high-water mark and writes one group per
//! [`step`](PackJob::step), so hosts can interleave it with rendering.
//! Running every step back to back gives the same result.

mod multi;
mod stacked;

pub use multi::MultiAtlasPacker;
pub use stacked::StackedAtlasPacker;

use std::ops::Range;

use yxv_decode::DecodedTexture;
use yxv_decode::texture::RED;

use crate::error::{Error, Result};
use crate::types::BasisDesc;

/// Number of basis images sharing one RGBA texel.
pub const IMAGES_PER_GROUP: usize = 4;

/// Default maximum texture dimension when the host does not report one.
pub const DEFAULT_MAX_TEXTURE_SIZE: u32 = 8192;

/// Which layout to pack basis images into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackStrategy {
    /// One atlas per four basis images.
    Multi,
    /// One tall texture per channel.
    #[default]
    Stacked,
}

impl PackStrategy {
    /// Build a packer for this strategy.
    #[must_use]
    pub fn packer(self, max_texture_size: u32) -> Box<dyn AtlasPacker> {
        match self {
            PackStrategy::Multi => Box::new(MultiAtlasPacker::new()),
            PackStrategy::Stacked => Box::new(StackedAtlasPacker::new(max_texture_size)),
        }
    }
}

/// An RGBA texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atlas {
    pub width: u32,
    pub height: u32,
    /// RGBA pixel data (4 bytes per pixel).
    pub data: Vec<u8>,
}

impl Atlas {
    /// A zero-filled atlas.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Read one component of the pixel at `(x, y)`.
    #[must_use]
    pub fn component(&self, x: u32, y: u32, component: usize) -> u8 {
        self.data[(y as usize * self.width as usize + x as usize) * 4 + component]
    }
}

/// Packed storage for one channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PackedChannel {
    /// One atlas per group ([`MultiAtlasPacker`]) or a single stacked texture
    /// ([`StackedAtlasPacker`]).
    pub atlases: Vec<Atlas>,
    /// Vertical size of one group band in texture coordinates. 1.0 for
    /// per-group atlases.
    pub offset: f32,
    /// Number of leading basis images packed so far.
    pub packed_basis: usize,
    /// Number of basis images the storage holds.
    pub capacity: usize,
}

/// A layout for packed basis images.
///
/// Implementations own their per-channel storage. [`PackJob`] decides what
/// to write and calls [`write_group`](Self::write_group) one group at a time.
pub trait AtlasPacker: Send + std::fmt::Debug {
    fn strategy(&self) -> PackStrategy;

    /// Number of basis images of a channel this layout can hold.
    fn usable_basis(&self, desc: &BasisDesc) -> usize;

    /// Allocate storage for `channel`, keeping anything already packed.
    fn reserve(&mut self, channel: usize, desc: &BasisDesc);

    /// Write the red samples of up to four images as group `group`.
    ///
    /// `sources[k]` holds `w * h` samples for image `4 * group + k`, or
    /// `None` to leave that component zero.
    fn write_group(
        &mut self,
        channel: usize,
        desc: &BasisDesc,
        group: usize,
        sources: &[Option<Vec<u8>>; IMAGES_PER_GROUP],
    );

    fn channels(&self) -> &[PackedChannel];

    fn channels_mut(&mut self) -> &mut [PackedChannel];
}

/// Number of groups needed for `count` images.
#[must_use]
pub fn group_count(count: usize) -> usize {
    count.div_ceil(IMAGES_PER_GROUP)
}

/// Result of one [`PackJob::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackStep {
    /// More groups remain.
    Continue,
    /// Every requested image is packed.
    Done,
}

/// Progress callback: fraction in `[0, 1]` and a display message.
pub type Progress<'a> = &'a mut dyn FnMut(f32, &str);

/// An in-flight pack of newly available basis images.
#[derive(Debug, Clone)]
pub struct PackJob {
    id: u32,
    descs: Vec<BasisDesc>,
    /// Number of leading images to have packed per channel when done.
    targets: Vec<usize>,
    /// Groups still to write per channel.
    pending: Vec<Range<usize>>,
    channel: usize,
}

impl PackJob {
    /// Plan a pack of the first `loaded[c]` images of every channel.
    ///
    /// Only channels with images past their packed count take part, starting
    /// from the group holding the first unpacked image. Returns `None` when
    /// no channel has anything new, so repeated calls with the same counts
    /// do nothing.
    #[must_use]
    pub fn begin(
        id: u32,
        packer: &mut dyn AtlasPacker,
        descs: &[BasisDesc],
        loaded: &[usize],
    ) -> Option<Self> {
        let mut targets = Vec::with_capacity(descs.len());
        let mut pending = Vec::with_capacity(descs.len());
        for (channel, desc) in descs.iter().enumerate() {
            packer.reserve(channel, desc);
            let usable = packer.usable_basis(desc);
            let available = loaded.get(channel).copied().unwrap_or(0);
            let target = available.min(usable);
            let packed = packer.channels()[channel].packed_basis;
            if target > packed {
                if available > usable {
                    tracing::warn!(
                        id,
                        channel,
                        available,
                        usable,
                        "basis count clamped to fit texture size"
                    );
                }
                pending.push(packed / IMAGES_PER_GROUP..group_count(target));
                targets.push(target);
            } else {
                pending.push(0..0);
                targets.push(packed);
            }
        }
        if pending.iter().all(Range::is_empty) {
            return None;
        }
        tracing::debug!(id, ?targets, "packing basis images");
        Some(Self {
            id,
            descs: descs.to_vec(),
            targets,
            pending,
            channel: 0,
        })
    }

    /// Object the job packs for.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Basis images each channel will have packed when the job is done.
    #[must_use]
    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    /// Pack the next group of four images.
    ///
    /// `images[c][i]` is the decoded basis image `i` of channel `c`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingImage`] if an image the job needs has not
    /// been decoded, or [`Error::Image`] if it cannot be resampled.
    #[allow(clippy::cast_precision_loss)]
    pub fn step(
        &mut self,
        packer: &mut dyn AtlasPacker,
        images: &[Vec<Option<DecodedTexture>>],
        progress: Progress<'_>,
    ) -> Result<PackStep> {
        while self
            .pending
            .get(self.channel)
            .is_some_and(Range::is_empty)
        {
            self.channel += 1;
        }
        let Some(group) = self.pending.get_mut(self.channel).and_then(Iterator::next) else {
            return Ok(PackStep::Done);
        };

        let channel = self.channel;
        let desc = self.descs[channel];
        let target = self.targets[channel];
        let first = group * IMAGES_PER_GROUP;

        let mut sources: [Option<Vec<u8>>; IMAGES_PER_GROUP] = Default::default();
        for (k, source) in sources.iter_mut().enumerate() {
            let index = first + k;
            if index >= target {
                continue;
            }
            let image = images
                .get(channel)
                .and_then(|c| c.get(index))
                .and_then(Option::as_ref)
                .ok_or(Error::MissingImage { channel, index })?;
            let image = image
                .resized(desc.width, desc.height)
                .map_err(|source| Error::Image {
                    id: self.id,
                    channel,
                    index,
                    source,
                })?;
            *source = Some(image.channel(RED).collect());
        }

        packer.write_group(channel, &desc, group, &sources);
        let packed = &mut packer.channels_mut()[channel];
        packed.packed_basis = packed.packed_basis.max((first + IMAGES_PER_GROUP).min(target));

        let channels = self.targets.len() as f32;
        let capacity = packed.capacity.max(1) as f32;
        let fraction = channel as f32 / channels + (1.0 / channels) * (first as f32 / capacity);
        progress(
            fraction,
            &format!("Loaded texture channel:{channel} basis:{first}"),
        );
        tracing::debug!(id = self.id, channel, group, "packed basis group");
        Ok(PackStep::Continue)
    }

    /// Run every remaining step.
    pub fn run(
        &mut self,
        packer: &mut dyn AtlasPacker,
        images: &[Vec<Option<DecodedTexture>>],
        progress: Progress<'_>,
    ) -> Result<()> {
        while self.step(packer, images, progress)? == PackStep::Continue {}
        Ok(())
    }
}

/// Pack every loaded image synchronously.
///
/// Returns `false` when there was nothing new to pack.
pub fn pack_all(
    id: u32,
    packer: &mut dyn AtlasPacker,
    descs: &[BasisDesc],
    images: &[Vec<Option<DecodedTexture>>],
    progress: Progress<'_>,
) -> Result<bool> {
    let loaded: Vec<usize> = images
        .iter()
        .map(|c| c.iter().take_while(|i| i.is_some()).count())
        .collect();
    match PackJob::begin(id, packer, descs, &loaded) {
        Some(mut job) => {
            job.run(packer, images, progress)?;
            Ok(true)
        }
        None => Ok(false),
    }
}


#[cfg(test)]
mod tests {
    use super::test_images::{image, images};
    use super::*;

    fn desc(max_basis: usize) -> BasisDesc {
        BasisDesc {
            width: 2,
            height: 2,
            max_basis,
        }
    }

    #[test]
    fn test_group_count() {
        assert_eq!(group_count(0), 0);
        assert_eq!(group_count(4), 1);
        assert_eq!(group_count(5), 2);
    }

    #[test]
    fn test_begin_without_new_images_is_none() {
        let mut packer = MultiAtlasPacker::new();
        assert!(PackJob::begin(0, &mut packer, &[desc(4)], &[0]).is_none());

        let all = vec![images(2, 2, 4)];
        assert!(pack_all(0, &mut packer, &[desc(4)], &all, &mut |_, _| {}).unwrap());
        assert!(!pack_all(0, &mut packer, &[desc(4)], &all, &mut |_, _| {}).unwrap());
        assert!(PackJob::begin(0, &mut packer, &[desc(4)], &[3]).is_none());
    }

    #[test]
    fn test_progress_reports_each_group() {
        let mut packer = StackedAtlasPacker::new(DEFAULT_MAX_TEXTURE_SIZE);
        let all = vec![images(2, 2, 8), images(2, 2, 8)];
        let mut reports = Vec::new();
        pack_all(
            0,
            &mut packer,
            &[desc(8), desc(8)],
            &all,
            &mut |fraction, message| reports.push((fraction, message.to_string())),
        )
        .unwrap();

        assert_eq!(
            reports,
            vec![
                (0.0, "Loaded texture channel:0 basis:0".to_string()),
                (0.25, "Loaded texture channel:0 basis:4".to_string()),
                (0.5, "Loaded texture channel:1 basis:0".to_string()),
                (0.75, "Loaded texture channel:1 basis:4".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_image_is_an_error() {
        let mut packer = MultiAtlasPacker::new();
        let mut all = vec![images(2, 2, 4)];
        all[0][2] = None;
        let mut job = PackJob::begin(0, &mut packer, &[desc(4)], &[4]).unwrap();
        let err = job.step(&mut packer, &all, &mut |_, _| {}).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingImage {
                channel: 0,
                index: 2
            }
        ));
    }

    #[test]
    fn test_mismatched_image_is_resampled() {
        let mut packer = MultiAtlasPacker::new();
        let big = DecodedTexture::new([77, 0, 0, 255].repeat(16), 4, 4);
        let all = vec![vec![Some(big), Some(image(2, 2, 0))]];
        pack_all(0, &mut packer, &[desc(2)], &all, &mut |_, _| {}).unwrap();

        let atlas = &packer.channels()[0].atlases[0];
        assert_eq!((atlas.width, atlas.height), (2, 2));
        assert!((0..4).all(|p| atlas.data[p * 4] == 77));
    }

    #[test]
    fn test_partial_group_is_repacked() {
        let mut packer = MultiAtlasPacker::new();
        let all = vec![images(2, 2, 6)];

        let mut job = PackJob::begin(0, &mut packer, &[desc(8)], &[5]).unwrap();
        job.run(&mut packer, &all, &mut |_, _| {}).unwrap();
        assert_eq!(packer.channels()[0].packed_basis, 5);
        // Image 5 is not part of the job yet.
        assert_eq!(packer.channels()[0].atlases[1].component(0, 0, 1), 0);

        let mut job = PackJob::begin(0, &mut packer, &[desc(8)], &[6]).unwrap();
        let mut steps = 0;
        while job.step(&mut packer, &all, &mut |_, _| {}).unwrap() == PackStep::Continue {
            steps += 1;
        }
        assert_eq!(steps, 1);
        assert_eq!(packer.channels()[0].packed_basis, 6);
        assert_eq!(packer.channels()[0].atlases[1].component(0, 0, 1), 80);
    }

    #[test]
    fn test_strategy_packer() {
        assert_eq!(
            PackStrategy::Multi.packer(4096).strategy(),
            PackStrategy::Multi
        );
        assert_eq!(
            PackStrategy::default().packer(4096).strategy(),
            PackStrategy::Stacked
        );
    }
}
