//! Expansion of sky domes into directional lights.

use alloc::vec::Vec;

use crate::light::{LightEntry, LightKey, MAX_SAMPLES, SUN_COLOR_REFERENCE, SkyLight, scaled_color};
use crate::math::{Aab, FreeVector, Rgb, spherical_direction};

/// One direction of a sky dome.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SkySample {
    /// Direction of light travel, from the sky toward the scene.
    pub direction: FreeVector,
    pub intensity: f64,
}

/// Layout of a sky dome: rings of directions, plus a single direction at each pole
/// the elevation range reaches. Individual samples are computed from their index.
#[derive(Debug)]
struct Dome {
    angle_steps: usize,
    rings: usize,
    bottom_cap: bool,
    top_cap: bool,
    /// Radians.
    first_elevation: f64,
    /// Radians.
    elevation_step: f64,
    /// Radians.
    angle_step: f64,
    intensity: f64,
}

impl Dome {
    fn new(sky: &SkyLight) -> Option<Self> {
        if sky.value <= 0.0 || sky.iterations < 2 || sky.horizon_min > sky.horizon_max {
            return None;
        }

        let iterations = sky.iterations.min(SkyLight::MAX_ITERATIONS);
        let horizon_min = sky.horizon_min.clamp(-90, 90);
        let horizon_max = sky.horizon_max.clamp(-90, 90);
        let bottom_cap = horizon_min == -90;
        let top_cap = horizon_max == 90;

        let angle_steps = (iterations as usize - 1) * 4;
        let elevation_step_degrees = 90.0 / f64::from(iterations);

        let elevation_min = if bottom_cap {
            -90.0 + elevation_step_degrees * 1.5
        } else {
            f64::from(horizon_min) + elevation_step_degrees * 0.5
        };
        let elevation_max = if top_cap {
            90.0 - elevation_step_degrees * 1.5
        } else {
            f64::from(horizon_max) - elevation_step_degrees * 0.5
        };
        let rings = {
            let steps = 1.0 + ((elevation_max - elevation_min) / elevation_step_degrees).max(0.0);
            ((steps + 0.5).floor() as usize).max(1)
        };

        let count = angle_steps * rings + usize::from(bottom_cap) + usize::from(top_cap);
        let horizon_scale = (f64::from(horizon_max - horizon_min) / 90.0).max(0.25);

        Some(Self {
            angle_steps,
            rings,
            bottom_cap,
            top_cap,
            first_elevation: elevation_min.min(f64::from(horizon_max)).to_radians(),
            elevation_step: elevation_step_degrees.to_radians(),
            angle_step: (360.0 / angle_steps as f64).to_radians(),
            intensity: sky.value / count as f64 * horizon_scale,
        })
    }

    fn len(&self) -> usize {
        self.angle_steps * self.rings + usize::from(self.bottom_cap) + usize::from(self.top_cap)
    }

    /// Sample `index`, in ring order with the bottom cap and then the top cap last.
    fn sample(&self, index: usize) -> SkySample {
        let ring_samples = self.angle_steps * self.rings;
        let direction = if index < ring_samples {
            let ring = index / self.angle_steps;
            // Successive rings are staggered by a fraction of a step.
            let angle = index as f64 * self.angle_step
                + ring as f64 * self.angle_step / self.rings as f64;
            let elevation = self.first_elevation + ring as f64 * self.elevation_step;
            -spherical_direction(angle, elevation)
        } else if self.bottom_cap && index == ring_samples {
            FreeVector::new(0.0, 0.0, 1.0)
        } else {
            FreeVector::new(0.0, 0.0, -1.0)
        };
        SkySample {
            direction,
            intensity: self.intensity,
        }
    }
}

/// Distributes the sky light over at most `max` directions, or over the whole dome if
/// `max` is zero.
///
/// A dome with more than `max` directions keeps only every `ceil(n / max)`-th one, with
/// intensities raised so that the total is preserved. Only the kept directions are
/// computed.
pub(crate) fn dome_samples(sky: &SkyLight, max: usize) -> Vec<SkySample> {
    let Some(dome) = Dome::new(sky) else {
        return Vec::new();
    };
    let len = dome.len();
    let stride = if max == 0 { 1 } else { len.div_ceil(max).max(1) };
    let scale = len as f64 / len.div_ceil(stride) as f64;
    (0..len)
        .step_by(stride)
        .map(|index| {
            let mut sample = dome.sample(index);
            sample.intensity *= scale;
            sample
        })
        .collect()
}

/// Produces the directional lights of one sky light of one shader.
///
/// `color` is the normalized color of the sky.
pub(crate) fn sky_light_entries(
    shader_hash: u64,
    sky_index: usize,
    sky: &SkyLight,
    color: Rgb,
    influence: Aab,
) -> impl Iterator<Item = (LightKey, LightEntry)> {
    dome_samples(sky, MAX_SAMPLES)
        .into_iter()
        .enumerate()
        .map(move |(i, sample)| {
            (
                LightKey::ShaderSkyLight {
                    shader: shader_hash,
                    index: LightKey::sample_index(sky_index, i),
                },
                LightEntry::directional(
                    sample.direction,
                    scaled_color(color, sample.intensity, SUN_COLOR_REFERENCE),
                    influence,
                ),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::Light;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn total_intensity(samples: &[SkySample]) -> f64 {
        samples.iter().map(|s| s.intensity).sum()
    }

    #[test]
    fn hemisphere_with_three_iterations() {
        let samples = dome_samples(&SkyLight::new(120.0, 3), MAX_SAMPLES);
        // 8 azimuths, elevations 15..=60 in steps of 30 rounds to 2 rings, plus the top cap.
        assert_eq!(samples.len(), 8 * 2 + 1);
        assert!((total_intensity(&samples) - 120.0).abs() < 1e-9);
        assert_eq!(
            samples.last().map(|s| s.direction),
            Some(FreeVector::new(0.0, 0.0, -1.0))
        );
        for sample in &samples {
            assert!(sample.direction.z < 0.0, "{sample:?} should shine downward");
            assert!((sample.direction.length() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn rings_are_staggered() {
        let samples = dome_samples(&SkyLight::new(120.0, 3), MAX_SAMPLES);
        let azimuth = |s: &SkySample| s.direction.y.atan2(s.direction.x);
        let first_ring = azimuth(&samples[0]);
        let second_ring = azimuth(&samples[8]);
        // 45 degree steps between azimuths, offset by half a step per ring.
        let offset = (second_ring - first_ring).to_degrees().rem_euclid(360.0);
        assert!((offset - 22.5).abs() < 1e-9, "{offset}");
    }

    #[test]
    fn full_sphere_has_both_caps() {
        let samples = dome_samples(&SkyLight::new(100.0, 2).with_horizon(-90, 90), MAX_SAMPLES);
        let up = samples.iter().filter(|s| s.direction == FreeVector::new(0.0, 0.0, 1.0));
        let down = samples.iter().filter(|s| s.direction == FreeVector::new(0.0, 0.0, -1.0));
        assert_eq!((up.count(), down.count()), (1, 1));
        // Horizon range of 180 degrees doubles the total.
        assert!((total_intensity(&samples) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn narrow_band_has_minimum_scale() {
        let samples = dome_samples(&SkyLight::new(100.0, 4).with_horizon(10, 20), MAX_SAMPLES);
        assert!(!samples.is_empty());
        assert!((total_intensity(&samples) - 25.0).abs() < 1e-9);
    }

    #[rstest]
    #[case::zero_value(SkyLight::new(0.0, 4))]
    #[case::inverted_horizon(SkyLight::new(100.0, 4).with_horizon(40, 10))]
    #[case::too_few_iterations(SkyLight { iterations: 1, ..SkyLight::new(100.0, 4) })]
    fn empty_domes(#[case] sky: SkyLight) {
        assert_eq!(dome_samples(&sky, MAX_SAMPLES), vec![]);
    }

    #[test]
    fn decimation_preserves_total() {
        let sky = SkyLight::new(100.0, 8);
        let all = dome_samples(&sky, 0);
        assert!(all.len() > MAX_SAMPLES);
        let stride = all.len().div_ceil(MAX_SAMPLES);

        let kept = dome_samples(&sky, MAX_SAMPLES);
        assert!(kept.len() <= MAX_SAMPLES);
        assert!((total_intensity(&kept) - total_intensity(&all)).abs() < 1e-6);
        assert_eq!(kept[0].direction, all[0].direction);
        assert_eq!(kept[1].direction, all[stride].direction);
    }

    #[test]
    fn decimation_is_noop_when_small() {
        let sky = SkyLight::new(100.0, 2);
        assert_eq!(dome_samples(&sky, MAX_SAMPLES), dome_samples(&sky, 0));
    }

    #[rstest]
    #[case::largest_parsed(SkyLight::new(100.0, i32::MAX), 100.0)]
    #[case::largest_field(SkyLight { iterations: u32::MAX, ..SkyLight::new(100.0, 2) }, 100.0)]
    #[case::full_sphere(
        SkyLight { iterations: u32::MAX, ..SkyLight::new(100.0, 2).with_horizon(-90, 90) },
        200.0
    )]
    fn huge_iteration_counts_stay_bounded(#[case] sky: SkyLight, #[case] total: f64) {
        let samples = dome_samples(&sky, MAX_SAMPLES);
        assert!(!samples.is_empty());
        assert!(samples.len() <= MAX_SAMPLES, "{} samples", samples.len());
        assert!((total_intensity(&samples) - total).abs() < 1e-6);
        for sample in &samples {
            assert!((sample.direction.length() - 1.0).abs() < 1e-9, "{sample:?}");
        }
    }

    #[test]
    fn entries_are_keyed_and_colored() {
        let sky = SkyLight::new(100.0, 2);
        let count = dome_samples(&sky, MAX_SAMPLES).len();
        let entries: Vec<_> = sky_light_entries(7, 1, &sky, Rgb::ONE, Aab::ZERO).collect();
        assert_eq!(entries.len(), count);
        assert_eq!(
            entries[2].0,
            LightKey::ShaderSkyLight {
                shader: 7,
                index: 0x0001_0002
            }
        );
        let Light::Directional(light) = entries[0].1.light else {
            panic!("expected directional light");
        };
        let expected = (100.0 / count as f64 / SUN_COLOR_REFERENCE) as f32;
        assert!((light.color.red() - expected).abs() < 1e-6);
    }
}
