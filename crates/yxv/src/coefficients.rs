//! Interpolation of basis coefficients from the angular LUT.
//!
//! Each channel's LUT spans `[min, max]` degrees across its `width` samples.
//! Angles outside that window wrap modulo 360. The gap between `max` and
//! `min + 360` (the seam) blends the last sample back into the first.

use crate::object::PcaObject;

/// Interpolated coefficients, one vector per channel.
///
/// Entry `j` of a channel's vector weights basis image `j`; entry 0 is the
/// constant term and is 1.0 once the channel's first LUT rows have arrived.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coefficients {
    pub channels: Vec<Vec<f32>>,
}

impl Coefficients {
    #[must_use]
    pub fn channel(&self, channel: usize) -> &[f32] {
        self.channels.get(channel).map_or(&[], Vec::as_slice)
    }
}

/// The two LUT samples an angle falls between and the weight of the second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LutSample {
    pub lo: usize,
    pub hi: usize,
    pub blend: f32,
}

impl LutSample {
    /// Blend two samples of a row. Missing samples read as 0.
    #[must_use]
    pub fn apply(&self, row: &[f32]) -> f32 {
        let lo = row.get(self.lo).copied().unwrap_or(0.0);
        let hi = row.get(self.hi).copied().unwrap_or(0.0);
        lo * (1.0 - self.blend) + hi * self.blend
    }
}

/// Locate `angle` (degrees) on a LUT of `width` samples spanning `[min, max]`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn lut_sample(angle: f32, min: f32, max: f32, width: usize) -> LutSample {
    let span = max - min;
    if width < 2 || span <= 0.0 {
        return LutSample {
            lo: 0,
            hi: 0,
            blend: 0.0,
        };
    }
    let last = width - 1;

    let angle = min + (angle - min).rem_euclid(360.0);
    let in_seam = angle > max;

    let coord = last as f32 * (angle - min) / span;
    let lo = (coord.floor().max(0.0) as usize).min(last);
    let hi = (lo + 1).min(last);

    if in_seam || (lo == last && hi == last) {
        let gap = min + 360.0 - max;
        let blend = if gap > 0.0 {
            ((angle - max) / gap).clamp(0.0, 1.0)
        } else {
            0.0
        };
        return LutSample {
            lo: last,
            hi: 0,
            blend,
        };
    }

    LutSample {
        lo,
        hi,
        blend: coord - lo as f32,
    }
}

/// Interpolate every channel's coefficients at `angle` degrees.
///
/// A channel yields one coefficient per basis image in use
/// ([`PcaObject::effective_basis_count`]).
#[must_use]
pub fn interpolate(object: &PcaObject, angle: f32) -> Coefficients {
    let (min, max) = object.lut_range().vertical();
    let channels = object
        .lut_desc()
        .iter()
        .enumerate()
        .map(|(channel, desc)| {
            let sample = lut_sample(angle, min, max, desc.width as usize);
            (0..object.effective_basis_count(channel))
                .map(|row| object.lut_row(channel, row).map_or(0.0, |r| sample.apply(r)))
                .collect()
        })
        .collect();
    Coefficients { channels }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::object::lut_angle;
    use crate::types::{BasisDesc, ImageBlob, LutDesc, LutRange};

    fn ramp_object() -> PcaObject {
        let (w, h) = (16u32, 2u32);
        let mut object = PcaObject::new(
            0,
            vec![
                BasisDesc {
                    width: 32,
                    height: 32,
                    max_basis: 4,
                };
                3
            ],
            vec![LutDesc {
                width: w,
                height: h,
            }; 3],
        );
        let mut data = Vec::new();
        for _ in 0..4 {
            for _ in 0..h {
                for x in 0..w {
                    data.push(i8::try_from(i32::try_from(x).unwrap() * 16 - 128).unwrap());
                }
            }
        }
        for channel in 0..3 {
            object.set_lookup_table(channel, 0, 3, &data).unwrap();
            object
                .set_basis(channel, 0, vec![ImageBlob::new(&[0]); 4])
                .unwrap();
        }
        object.set_lut_range(LutRange {
            mean: Vec3::splat(180.0),
            min: Vec3::new(0.0, 1.0, 0.0),
            max: Vec3::new(0.0, 359.0, 0.0),
        });
        object
    }

    #[test]
    fn test_lut_sample_grid_points() {
        // Range [10, 310] over 16 samples puts sample x at 10 + 20x degrees.
        let row: Vec<f32> = (0..16).map(|x| x as f32 * 0.1 - 0.75).collect();
        for x in 0..16 {
            let angle = 10.0 + x as f32 * 20.0;
            let sample = lut_sample(angle, 10.0, 310.0, 16);
            assert_eq!(sample.lo, x);
            assert_eq!(sample.blend, 0.0);
            assert_eq!(sample.apply(&row), row[x]);
        }
    }

    #[test]
    fn test_lut_sample_wraps() {
        let a = lut_sample(370.0, 0.0, 360.0, 16);
        let b = lut_sample(10.0, 0.0, 360.0, 16);
        assert_eq!(a, b);

        let a = lut_sample(-350.0, 0.0, 360.0, 16);
        assert_eq!(a, b);
    }

    #[test]
    fn test_lut_sample_seam() {
        // Range [10, 350] leaves a 20 degree seam.
        let at_max = lut_sample(350.0, 10.0, 350.0, 8);
        assert_eq!((at_max.lo, at_max.hi, at_max.blend), (7, 0, 0.0));

        let mid = lut_sample(0.0, 10.0, 350.0, 8);
        assert_eq!((mid.lo, mid.hi), (7, 0));
        assert!((mid.blend - 0.5).abs() < 1e-5);

        let near_min = lut_sample(9.999, 10.0, 350.0, 8);
        assert!((near_min.blend - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_seam_is_continuous() {
        let row: Vec<f32> = (0..8).map(|x| x as f32 * 0.1).collect();
        let at_max = lut_sample(350.0, 10.0, 350.0, 8).apply(&row);
        let below_max = lut_sample(349.999, 10.0, 350.0, 8).apply(&row);
        assert!((at_max - row[7]).abs() < 1e-6);
        assert!((at_max - below_max).abs() < 1e-3);

        let at_min = lut_sample(10.0, 10.0, 350.0, 8).apply(&row);
        let before_min = lut_sample(9.999, 10.0, 350.0, 8).apply(&row);
        assert!((at_min - before_min).abs() < 1e-3);
    }

    #[test]
    fn test_lut_sample_degenerate() {
        let single = lut_sample(45.0, 0.0, 360.0, 1);
        assert_eq!((single.lo, single.hi), (0, 0));
        let empty_range = lut_sample(45.0, 10.0, 10.0, 8);
        assert_eq!(empty_range.blend, 0.0);
    }

    #[test]
    fn test_interpolate_fixture_angles() {
        let object = ramp_object();

        let at = |degrees: f32| {
            let rotation = degrees.to_radians() - std::f32::consts::PI;
            interpolate(&object, lut_angle(rotation))
        };

        let c = at(1.0);
        for channel in 0..3 {
            assert_eq!(c.channel(channel).len(), 4);
            assert!((c.channel(channel)[0] - 1.0).abs() < 1e-5);
            assert!((c.channel(channel)[1] + 1.0).abs() < 1e-3);
        }

        let c = at(359.0);
        for channel in 0..3 {
            assert!((c.channel(channel)[0] - 1.0).abs() < 1e-5);
            assert!((c.channel(channel)[1] - 0.875).abs() < 1e-3);
        }

        let c = at(192.0);
        for channel in 0..3 {
            assert!((c.channel(channel)[0] - 1.0).abs() < 1e-5);
            assert!(c.channel(channel)[1].abs() < 1e-2);
        }
    }

    #[test]
    fn test_interpolate_length_follows_loaded_basis() {
        let mut object = PcaObject::new(
            0,
            vec![BasisDesc {
                width: 2,
                height: 2,
                max_basis: 8,
            }],
            vec![LutDesc {
                width: 4,
                height: 1,
            }],
        );
        assert!(interpolate(&object, 0.0).channel(0).is_empty());

        object
            .set_basis(0, 0, vec![ImageBlob::new(&[0]); 3])
            .unwrap();
        object.set_lookup_table(0, 0, 2, &[64; 8]).unwrap();
        let c = interpolate(&object, 0.0);
        assert_eq!(c.channel(0), &[1.0, 0.5, 0.5]);
    }
}
