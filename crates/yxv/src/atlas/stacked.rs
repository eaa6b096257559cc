//! One tall texture per channel with every group stacked vertically.
//!
//! Group `g` of `n` occupies the band of rows `[(n - 1 - g) * h, (n - g) * h)`,
//! so the highest group sits at the top. A sampler reaches group `g` by
//! offsetting its vertical texture coordinate by `g * offset`, counting up
//! from the bottom band.

use super::{
    Atlas, AtlasPacker, DEFAULT_MAX_TEXTURE_SIZE, IMAGES_PER_GROUP, PackStrategy, PackedChannel,
    group_count,
};
use crate::types::BasisDesc;

/// Packs every basis image of a channel into a single texture.
#[derive(Debug, Clone)]
pub struct StackedAtlasPacker {
    max_texture_size: u32,
    channels: Vec<PackedChannel>,
}

impl Default for StackedAtlasPacker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TEXTURE_SIZE)
    }
}

impl StackedAtlasPacker {
    #[must_use]
    pub fn new(max_texture_size: u32) -> Self {
        Self {
            max_texture_size,
            channels: Vec::new(),
        }
    }

    #[must_use]
    pub fn max_texture_size(&self) -> u32 {
        self.max_texture_size
    }
}

/// Byte offset of group `group`'s band in a texture of `groups` bands.
fn band_offset(group: usize, groups: usize, band_len: usize) -> usize {
    (groups - 1 - group) * band_len
}

impl AtlasPacker for StackedAtlasPacker {
    fn strategy(&self) -> PackStrategy {
        PackStrategy::Stacked
    }

    fn usable_basis(&self, desc: &BasisDesc) -> usize {
        if desc.height == 0 {
            return desc.max_basis;
        }
        let max_groups = (self.max_texture_size / desc.height) as usize;
        if group_count(desc.max_basis) <= max_groups {
            desc.max_basis
        } else {
            max_groups * IMAGES_PER_GROUP
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn reserve(&mut self, channel: usize, desc: &BasisDesc) {
        if self.channels.len() <= channel {
            self.channels.resize_with(channel + 1, PackedChannel::default);
        }
        let capacity = self.usable_basis(desc);
        let packed = &mut self.channels[channel];
        if packed.capacity == capacity && !packed.atlases.is_empty() {
            return;
        }

        let groups = group_count(capacity);
        let band_len = desc.width as usize * desc.height as usize * 4;
        let height = desc.height * u32::try_from(groups).unwrap_or(u32::MAX);
        let mut atlas = Atlas::new(desc.width, height);

        // Keep already-packed groups in their band.
        if let Some(old) = packed.atlases.first() {
            let old_groups = group_count(packed.capacity);
            let kept = group_count(packed.packed_basis).min(groups);
            for group in 0..kept {
                let from = band_offset(group, old_groups, band_len);
                let to = band_offset(group, groups, band_len);
                atlas.data[to..to + band_len].copy_from_slice(&old.data[from..from + band_len]);
            }
            packed.packed_basis = packed.packed_basis.min(capacity);
        }

        tracing::debug!(channel, capacity, height, "allocated stacked atlas");
        packed.atlases = vec![atlas];
        packed.capacity = capacity;
        packed.offset = if groups == 0 { 0.0 } else { 1.0 / groups as f32 };
    }

    fn write_group(
        &mut self,
        channel: usize,
        desc: &BasisDesc,
        group: usize,
        sources: &[Option<Vec<u8>>; IMAGES_PER_GROUP],
    ) {
        let packed = &mut self.channels[channel];
        let groups = group_count(packed.capacity);
        let band_len = desc.width as usize * desc.height as usize * 4;
        let base = band_offset(group, groups, band_len);
        let band = &mut packed.atlases[0].data[base..base + band_len];
        for (component, source) in sources.iter().enumerate() {
            let Some(source) = source else { continue };
            for (pixel, value) in band.chunks_exact_mut(4).zip(source) {
                pixel[component] = *value;
            }
        }
    }

    fn channels(&self) -> &[PackedChannel] {
        &self.channels
    }

    fn channels_mut(&mut self) -> &mut [PackedChannel] {
        &mut self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_images::images;
    use super::super::{PackJob, pack_all};
    use super::*;

    fn desc(max_basis: usize) -> BasisDesc {
        BasisDesc {
            width: 2,
            height: 2,
            max_basis,
        }
    }

    #[test]
    fn test_bands_are_in_reverse_order() {
        let all = vec![images(2, 2, 8)];
        let mut packer = StackedAtlasPacker::default();
        pack_all(0, &mut packer, &[desc(8)], &all, &mut |_, _| {}).unwrap();

        let channel = &packer.channels()[0];
        assert_eq!(channel.atlases.len(), 1);
        assert_eq!(channel.offset, 0.5);
        let atlas = &channel.atlases[0];
        assert_eq!((atlas.width, atlas.height), (2, 4));
        // Top band holds images 4..8, bottom band images 0..4.
        assert_eq!(atlas.component(0, 0, 0), 64);
        assert_eq!(atlas.component(0, 2, 0), 0);
        assert_eq!(atlas.component(0, 2, 3), 48);
    }

    #[test]
    fn test_packing_more_keeps_earlier_rows() {
        let all = vec![images(2, 2, 12)];
        let mut packer = StackedAtlasPacker::default();
        let descs = [desc(12)];

        let mut job = PackJob::begin(0, &mut packer, &descs, &[4]).unwrap();
        job.run(&mut packer, &all, &mut |_, _| {}).unwrap();
        let before = packer.channels()[0].atlases[0].data.clone();
        // Bottom band holds group 0.
        let band = 2 * 2 * 4;
        assert!(before[..2 * band].iter().all(|&v| v == 0));

        let mut job = PackJob::begin(0, &mut packer, &descs, &[12]).unwrap();
        job.run(&mut packer, &all, &mut |_, _| {}).unwrap();
        let after = &packer.channels()[0].atlases[0].data;
        assert_eq!(before[2 * band..], after[2 * band..]);
        assert_eq!(packer.channels()[0].packed_basis, 12);
    }

    #[test]
    fn test_tall_atlas_is_clamped() {
        let packer = StackedAtlasPacker::new(16);
        let tall = BasisDesc {
            width: 4,
            height: 4,
            max_basis: 20,
        };
        assert_eq!(packer.usable_basis(&tall), 16);
        let fits = BasisDesc {
            max_basis: 14,
            ..tall
        };
        assert_eq!(packer.usable_basis(&fits), 14);
    }

    #[test]
    fn test_clamped_pack_ignores_extra_images() {
        let all = vec![images(2, 2, 12)];
        let mut packer = StackedAtlasPacker::new(4);
        pack_all(0, &mut packer, &[desc(12)], &all, &mut |_, _| {}).unwrap();

        let channel = &packer.channels()[0];
        assert_eq!(channel.capacity, 8);
        assert_eq!(channel.packed_basis, 8);
        assert_eq!(channel.atlases[0].height, 4);
    }

    #[test]
    fn test_growing_capacity_relocates_bands() {
        let all = vec![images(2, 2, 8)];
        let mut packer = StackedAtlasPacker::default();
        pack_all(0, &mut packer, &[desc(4)], &all, &mut |_, _| {}).unwrap();
        assert_eq!(packer.channels()[0].atlases[0].component(0, 0, 1), 16);

        packer.reserve(0, &desc(8));
        let channel = &packer.channels()[0];
        assert_eq!(channel.capacity, 8);
        assert_eq!(channel.packed_basis, 4);
        // Group 0 moved to the bottom band.
        assert_eq!(channel.atlases[0].component(0, 2, 1), 16);
        assert_eq!(channel.atlases[0].component(0, 0, 1), 0);
    }
}
