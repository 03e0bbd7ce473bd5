//! Suns: parsing the worldspawn's sun keys, and expanding a [`SunSource`] into
//! jittered directional light samples.

use core::f64::consts::TAU;

use crate::light::entity::Targets;
use crate::light::{LightEntry, LightKey, MAX_SAMPLES, SUN_COLOR_REFERENCE, SunSource, scaled_color};
use crate::math::{Aab, FreePoint, FreeVector, Rgb, spherical_direction, try_normalize};
use crate::scene::Entity;

/// Jitter seed of the worldspawn sun.
pub(crate) const WORLDSPAWN_SEED: u32 = 0x9e37_79b9;

/// Jitter seed of the `sun_index`th sun of the shader whose name digest is `shader_hash`.
pub(crate) fn shader_sun_seed(shader_hash: u64, sun_index: usize) -> u32 {
    (shader_hash as u32) ^ (sun_index as u32).wrapping_mul(WORLDSPAWN_SEED)
}

/// Van der Corput radical inverse in base 2: the bits of `bits` mirrored about the
/// binary point, giving a well-distributed sequence in `0..1`.
pub(crate) fn radical_inverse_vdc(bits: u32) -> f64 {
    f64::from(bits.reverse_bits()) / 4_294_967_296.0
}

/// Perturbs `base` by up to `deviance` radians in azimuth and elevation, spreading
/// `count` samples over a disc. Sample 0 is always `base` itself (normalized).
pub(crate) fn jitter_direction(
    base: FreeVector,
    deviance: f64,
    index: u32,
    count: u32,
    seed: u32,
) -> FreeVector {
    let base = try_normalize(base).unwrap_or(FreeVector::new(0.0, 0.0, 1.0));
    if count <= 1 || index == 0 || deviance <= 0.0 {
        return base;
    }

    let horizontal = base.x.hypot(base.y);
    let angle = base.y.atan2(base.x);
    let elevation = base.z.atan2(horizontal);

    let u = ((f64::from(index) + 0.5) / f64::from(count)).clamp(0.0, 1.0);
    let v = radical_inverse_vdc(index ^ seed);
    let r = u.sqrt() * deviance;
    let (sin_phi, cos_phi) = (TAU * v).sin_cos();

    spherical_direction(angle + cos_phi * r, elevation + sin_phi * r)
}

/// Expands `sun` into its samples. Each sample carries an equal share of the sun's
/// color, and is keyed by `key(sample_index)`.
pub(crate) fn sun_entries(
    sun: &SunSource,
    seed: u32,
    influence: Aab,
    key: impl Fn(u32) -> LightKey,
) -> impl Iterator<Item = (LightKey, LightEntry)> {
    let count = sun.samples.clamp(1, MAX_SAMPLES as u32);
    let color = scaled_color(sun.color, sun.intensity, SUN_COLOR_REFERENCE) / count as f32;
    let SunSource {
        direction,
        deviance,
        ..
    } = *sun;
    (0..count).map(move |i| {
        let direction = jitter_direction(direction, deviance.max(0.0), i, count, seed);
        (key(i), LightEntry::directional(direction, color, influence))
    })
}

const SUN_VECTOR_KEYS: [&str; 4] = ["_sun_vector", "sun_vector", "sunlight_vector", "sunlight_dir"];
const SUN_MANGLE_KEYS: [&str; 4] = [
    "_sunlight_mangle",
    "sunlight_mangle",
    "_sun_mangle",
    "sun_mangle",
];
const SUN_ANGLE_KEYS: [&str; 3] = ["_sun_angle", "sun_angle", "sunlight_angle"];
const SUN_TARGET_KEYS: [&str; 2] = ["_sun_target", "sun_target"];
const SUN_INTENSITY_KEYS: [&str; 4] = ["_sunlight", "sunlight", "_sun_light", "sun_light"];
const SUN_COLOR_KEYS: [&str; 4] = [
    "_sunlight_color",
    "sunlight_color",
    "_sun_color",
    "sun_color",
];

/// Reads the sun defined by keys of the worldspawn entity, if any.
///
/// Either the compact `_sun` key (`r g b intensity degrees elevation`) is used, or an
/// intensity key together with optional color and direction keys.
pub(crate) fn worldspawn_sun(
    worldspawn: &Entity,
    targets: &Targets,
    map_center: FreePoint,
) -> Option<SunSource> {
    for key in ["_sun", "sun"] {
        if worldspawn.value(key).is_some() {
            // Only the first present key is considered, even if it is malformed.
            let ([r, g, b, intensity, degrees, elevation], count) =
                worldspawn.leading_numbers::<6>(key);
            if count == 6 {
                return Some(SunSource::from_angles(
                    Rgb::new(r as f32, g as f32, b as f32),
                    intensity,
                    degrees,
                    elevation,
                ));
            }
            break;
        }
    }

    let intensity = SUN_INTENSITY_KEYS
        .iter()
        .find_map(|key| worldspawn.float(key).ok())?;
    let color = SUN_COLOR_KEYS
        .iter()
        .find_map(|key| worldspawn.vector(key).ok())
        .map_or(Rgb::ONE, |c| Rgb::new(c.x as f32, c.y as f32, c.z as f32));
    let direction = worldspawn_sun_direction(worldspawn, targets, map_center)
        .and_then(try_normalize)
        .unwrap_or(FreeVector::new(0.0, 0.0, 1.0));

    let mut sun = SunSource::from_angles(color, intensity, 0.0, 0.0);
    sun.direction = direction;
    Some(sun)
}

fn worldspawn_sun_direction(
    worldspawn: &Entity,
    targets: &Targets,
    map_center: FreePoint,
) -> Option<FreeVector> {
    if let Some(vector) = SUN_VECTOR_KEYS.iter().find_map(|key| worldspawn.vector(key).ok()) {
        return Some(vector);
    }
    if let Some(mangle) = SUN_MANGLE_KEYS.iter().find_map(|key| worldspawn.vector(key).ok()) {
        return Some(spherical_direction(
            mangle.x.to_radians(),
            mangle.y.to_radians(),
        ));
    }
    for key in SUN_ANGLE_KEYS {
        if let ([yaw, pitch], 2) = worldspawn.leading_numbers::<2>(key) {
            return Some(spherical_direction(yaw.to_radians(), pitch.to_radians()));
        }
    }
    let target_name = SUN_TARGET_KEYS.iter().find_map(|key| worldspawn.value(key))?;
    let target = targets.get(target_name)?;
    Some(*target - map_center)
}
