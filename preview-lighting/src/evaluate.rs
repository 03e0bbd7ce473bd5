//! Lighting evaluation at a single surface point.

use alloc::vec::Vec;

use crate::bvh::Bvh;
use crate::light::{Light, LightSet};
use crate::math::{Aab, FreeCoordinate, FreePoint, FreeVector, Rgb, try_normalize};

/// Light present everywhere regardless of light sources, per color channel.
pub const AMBIENT: f32 = 0.12;

/// Distance by which shadow rays start off the surface, so that the surface does not
/// shadow itself.
pub const SHADOW_BIAS: FreeCoordinate = 0.5;

/// Point-light attenuation at or below which the light is ignored.
pub const LIGHT_CUTOFF: f64 = 0.002;

/// How far shadow rays toward directional lights are traced: four times the distance
/// from the center to a corner of the map, but at least 4096; or 65536 if the map is
/// empty.
pub fn directional_distance(map_bounds: Option<Aab>) -> FreeCoordinate {
    match map_bounds {
        Some(bounds) => (bounds.half_extents().length() * 4.0).max(4096.0),
        None => 65536.0,
    }
}

/// Returns the lights whose influence intersects `bounds`, in a consistent order.
pub fn gather_affecting_lights(lights: &LightSet, bounds: Aab) -> Vec<Light> {
    let mut affecting: Vec<_> = lights
        .iter()
        .filter(|(_, entry)| entry.influence.intersects(bounds))
        .collect();
    affecting.sort_unstable_by_key(|&(key, _)| *key);
    affecting.into_iter().map(|(_, entry)| entry.light).collect()
}

/// Computes the light arriving at `position` on a surface facing `normal`.
///
/// The result includes [`AMBIENT`] and is clamped to `0..=1`. If `occluders` is
/// given, lights are tested for shadowing against it.
pub fn evaluate(
    position: FreePoint,
    normal: FreeVector,
    lights: &[Light],
    directional_distance: FreeCoordinate,
    occluders: Option<&Bvh>,
) -> Rgb {
    let mut result = Rgb::from_luminance(AMBIENT);
    let Some(normal) = try_normalize(normal) else {
        return result;
    };
    let biased_origin = position + normal * SHADOW_BIAS;
    let shadowed = |direction: FreeVector, distance: FreeCoordinate| {
        occluders.is_some_and(|bvh| bvh.occluded(biased_origin, direction, distance))
    };

    for light in lights {
        match *light {
            Light::Directional(ref light) => {
                let to_light = -light.direction;
                let n_dot_l = normal.dot(to_light);
                if n_dot_l <= 0.0 || shadowed(to_light, directional_distance) {
                    continue;
                }
                result += light.color * n_dot_l as f32;
            }
            Light::Point(ref light) => {
                let offset = light.origin - position;
                let distance = offset.length();
                if distance <= 1e-4 || distance > light.radius {
                    continue;
                }
                let to_light = offset / distance;
                let n_dot_l = normal.dot(to_light);
                if n_dot_l <= 0.0 {
                    continue;
                }
                let attenuation = light.falloff.attenuation(distance, light.radius);
                if attenuation <= LIGHT_CUTOFF
                    || shadowed(to_light, (distance - SHADOW_BIAS).max(0.0))
                {
                    continue;
                }
                result += light.color * (n_dot_l * attenuation) as f32;
            }
        }
    }

    unit_clamp(result)
}

fn unit_clamp(color: Rgb) -> Rgb {
    // `f32::max` discards NaN, so NaN becomes zero.
    let c = |v: f32| v.max(0.0).min(1.0);
    Rgb::new(c(color.red()), c(color.green()), c(color.blue()))
}
