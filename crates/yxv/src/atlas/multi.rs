//! One `w x h` atlas per group of four basis images.

use super::{Atlas, AtlasPacker, IMAGES_PER_GROUP, PackStrategy, PackedChannel, group_count};
use crate::types::BasisDesc;

/// Packs each group of four basis images into its own RGBA atlas.
#[derive(Debug, Clone, Default)]
pub struct MultiAtlasPacker {
    channels: Vec<PackedChannel>,
}

impl MultiAtlasPacker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AtlasPacker for MultiAtlasPacker {
    fn strategy(&self) -> PackStrategy {
        PackStrategy::Multi
    }

    fn usable_basis(&self, desc: &BasisDesc) -> usize {
        desc.max_basis
    }

    fn reserve(&mut self, channel: usize, desc: &BasisDesc) {
        if self.channels.len() <= channel {
            self.channels.resize_with(channel + 1, PackedChannel::default);
        }
        let packed = &mut self.channels[channel];
        let groups = group_count(desc.max_basis);
        while packed.atlases.len() < groups {
            packed.atlases.push(Atlas::new(desc.width, desc.height));
        }
        packed.capacity = packed.capacity.max(desc.max_basis);
        packed.offset = 1.0;
    }

    fn write_group(
        &mut self,
        channel: usize,
        _desc: &BasisDesc,
        group: usize,
        sources: &[Option<Vec<u8>>; IMAGES_PER_GROUP],
    ) {
        let atlas = &mut self.channels[channel].atlases[group];
        for (component, source) in sources.iter().enumerate() {
            let Some(source) = source else { continue };
            for (pixel, value) in atlas.data.chunks_exact_mut(4).zip(source) {
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
