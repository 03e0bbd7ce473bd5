//! Lights defined by entities: `light`, `light_*` classnames, and entity suns.

use alloc::string::String;

use hashbrown::HashMap as HbHashMap;

use crate::light::{
    DEFAULT_ENTITY_INTENSITY, ENTITY_COLOR_REFERENCE, Falloff, LightEntry, inverse_square_radius,
    linear_radius, normalize_color, scaled_color,
};
use crate::math::{Aab, FreeVector, Rgb, spherical_direction, try_normalize};
use crate::options::GameConvention;
use crate::scene::Entity;

/// Positions of entities by `targetname`. The first entity with a given name wins.
pub(crate) type Targets = HbHashMap<String, crate::math::FreePoint>;

/// Records `entity`'s position if it has a `targetname`.
pub(crate) fn register_target(targets: &mut Targets, entity: &Entity) {
    if let Some(name) = entity.value("targetname") {
        if !targets.contains_key(name) {
            targets.insert(name.into(), entity.origin());
        }
    }
}

/// Whether `entity` defines a light: its classname begins with `light`.
pub(crate) fn is_light_entity(entity: &Entity) -> bool {
    let classname = entity.classname();
    classname
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("light"))
        && !entity.is_worldspawn()
}

/// Builds the light of a light entity.
///
/// Returns [`None`] if the entity is a point light whose radius comes out
/// non-positive.
pub(crate) fn entity_light(
    entity: &Entity,
    targets: &Targets,
    game: GameConvention,
    sun_influence: Aab,
) -> Option<LightEntry> {
    let origin = entity.origin();
    let mut color = entity
        .vector("_color")
        .map_or(Rgb::ONE, |c| Rgb::new(c.x as f32, c.y as f32, c.z as f32));
    let intensity = light_intensity(entity, &mut color).unwrap_or(DEFAULT_ENTITY_INTENSITY);
    let scale = entity.float("scale").ok().filter(|&s| s > 0.0).unwrap_or(1.0);
    let linear = game.linear_falloff(entity.int("spawnflags").unwrap_or(0));

    let intensity = (intensity * scale).abs();
    let color = scaled_color(normalize_color(color), intensity, ENTITY_COLOR_REFERENCE);

    if entity.classname().eq_ignore_ascii_case("light_environment") || entity.truthy("_sun") {
        let target = entity.value("target").and_then(|name| targets.get(name));
        let direction = match target {
            Some(&target) => origin - target,
            None => {
                let (yaw, pitch) = entity_yaw_pitch(entity);
                spherical_direction(yaw.to_radians(), pitch.to_radians())
            }
        };
        let direction = try_normalize(direction).unwrap_or(FreeVector::new(0.0, 0.0, 1.0));
        return Some(LightEntry::directional(direction, color, sun_influence));
    }

    let falloff = if linear {
        Falloff::Linear
    } else {
        Falloff::InverseSquare
    };
    let radius = entity
        .vector("light_radius")
        .map(|r| r.x.abs().max(r.y.abs()).max(r.z.abs()))
        .ok()
        .filter(|&r| r > 0.0)
        .unwrap_or_else(|| match falloff {
            Falloff::Linear => linear_radius(intensity),
            Falloff::InverseSquare => inverse_square_radius(intensity),
        });
    if radius > 0.0 {
        Some(LightEntry::point(origin, color, radius, falloff))
    } else {
        log::trace!("light entity {} has no reach", entity.node);
        None
    }
}

/// Reads the intensity from `_light` or `light`, also taking the color from `_light`
/// if it has at least three components.
fn light_intensity(entity: &Entity, color: &mut Rgb) -> Option<f64> {
    let ([r, g, b, i], count) = entity.leading_numbers::<4>("_light");
    if count >= 3 {
        *color = Rgb::new(r as f32, g as f32, b as f32);
    }
    match count {
        4 => Some(i),
        1 => Some(r),
        _ => entity
            .float("_light")
            .or_else(|_| entity.float("light"))
            .ok(),
    }
}

/// Reads the facing of an entity, in degrees, from `angles` (`pitch yaw roll`),
/// `angle` (yaw), and `pitch`. Later keys override earlier ones.
fn entity_yaw_pitch(entity: &Entity) -> (f64, f64) {
    let mut yaw = 0.0;
    let mut pitch = 0.0;
    let mut found = false;
    if let Ok(angles) = entity.vector("angles") {
        yaw = angles.y;
        pitch = angles.x;
        found = true;
    }
    if let Ok(angle) = entity.float("angle") {
        yaw = angle;
        found = true;
    }
    if let Ok(value) = entity.float("pitch") {
        pitch = value;
        found = true;
    }
    if !found {
        if let ([a, b], 2) = entity.leading_numbers::<2>("angles") {
            yaw = a;
            pitch = b;
        }
    }
    (yaw, pitch)
}
