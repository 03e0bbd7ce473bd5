//! The uniform light model, and extraction of lights from entities, shaders, and
//! emissive surfaces.
//!
//! Every rescan rebuilds the complete set of lights, keyed by [`LightKey`]. Each
//! [`LightEntry`] carries a content hash, so that the new set can be diffed against
//! the previous one and only the lights that actually changed cause relighting.

use core::fmt;

use hashbrown::HashMap as HbHashMap;

use crate::hash::ContentHasher;
use crate::math::{Aab, FreeCoordinate, FreePoint, FreeVector, Rgb, try_normalize};
use crate::scene::NodeId;

pub(crate) mod entity;
pub(crate) mod shader;
pub(crate) mod sky;
pub(crate) mod sun;
pub(crate) mod surface;

pub use shader::{ShaderLighting, SkyLight, SunSource};

// -------------------------------------------------------------------------------------------------

/// Intensity of a light entity which does not specify one.
pub const DEFAULT_ENTITY_INTENSITY: f64 = 300.0;

/// Intensity at which an entity or surface light has exactly its nominal color.
pub(crate) const ENTITY_COLOR_REFERENCE: f64 = 300.0;

/// Intensity at which a sun or sky light has exactly its nominal color.
pub(crate) const SUN_COLOR_REFERENCE: f64 = 100.0;

/// Upper limit on the number of directional lights one sun or sky light may expand to.
pub(crate) const MAX_SAMPLES: usize = 64;

const POINT_SCALE: f64 = 7500.0;
const LINEAR_DIVISOR: f64 = 8000.0;
const FALLOFF_TOLERANCE: f64 = 1.0;

/// Radius at which an inverse-square light of the given intensity becomes negligible.
pub fn inverse_square_radius(intensity: f64) -> FreeCoordinate {
    (intensity * POINT_SCALE / FALLOFF_TOLERANCE).sqrt()
}

/// Radius at which a linear-falloff light of the given intensity becomes negligible.
/// May be negative for very dim lights.
pub fn linear_radius(intensity: f64) -> FreeCoordinate {
    intensity * POINT_SCALE / LINEAR_DIVISOR - FALLOFF_TOLERANCE
}

/// Interprets a color given either in `0..=1` or `0..=255` units, and scales it down
/// so that no component exceeds 1.
///
/// ```
/// use preview_lighting::light::normalize_color;
/// use preview_lighting::math::Rgb;
///
/// assert_eq!(normalize_color(Rgb::new(255.0, 51.0, 0.0)), Rgb::new(1.0, 0.2, 0.0));
/// assert_eq!(normalize_color(Rgb::new(0.5, 0.25, 1.0)), Rgb::new(0.5, 0.25, 1.0));
/// ```
pub fn normalize_color(color: Rgb) -> Rgb {
    let color = if color.max_component() > 1.0 {
        color / 255.0
    } else {
        color
    };
    let max = color.max_component();
    if max > 1.0 { color / max } else { color }
}

/// Scales `color` by `intensity / reference`.
pub(crate) fn scaled_color(color: Rgb, intensity: f64, reference: f64) -> Rgb {
    if reference <= 0.0 {
        color
    } else {
        color * (intensity / reference) as f32
    }
}

// -------------------------------------------------------------------------------------------------

/// A light source, in the form used for evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
#[expect(clippy::exhaustive_enums)]
pub enum Light {
    #[allow(missing_docs)]
    Point(PointLight),
    #[allow(missing_docs)]
    Directional(DirectionalLight),
}

/// A light radiating from a point, with a finite radius.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub struct PointLight {
    #[allow(missing_docs)]
    pub origin: FreePoint,
    /// Color at full strength. Components may exceed 1.
    pub color: Rgb,
    /// Distance at which the light's contribution reaches zero. Never negative.
    pub radius: FreeCoordinate,
    #[allow(missing_docs)]
    pub falloff: Falloff,
}

/// How a [`PointLight`] dims with distance.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[expect(clippy::exhaustive_enums)]
pub enum Falloff {
    /// Attenuation `1 - d / r`.
    Linear,
    /// Attenuation `(1 - d / r)²`. This is the default.
    InverseSquare,
}

impl Falloff {
    /// Attenuation at `distance` from a light of the given `radius`, in `0..=1`.
    pub fn attenuation(self, distance: FreeCoordinate, radius: FreeCoordinate) -> f64 {
        if radius <= 0.0 {
            return 0.0;
        }
        let x = (1.0 - distance / radius).clamp(0.0, 1.0);
        match self {
            Falloff::Linear => x,
            Falloff::InverseSquare => x * x,
        }
    }
}

/// A light arriving from infinitely far away, such as the sun.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub struct DirectionalLight {
    /// Unit vector in the direction the light travels (from the light toward the
    /// surface).
    pub direction: FreeVector,
    /// Color at full strength. Components may exceed 1.
    pub color: Rgb,
}

/// Identity of a light, stable across rescans as long as its source persists.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum LightKey {
    /// A light entity.
    Entity(NodeId),
    /// An emissive brush face, by face index.
    #[allow(missing_docs)]
    SurfaceFace { node: NodeId, face: u32 },
    /// An emissive patch.
    SurfacePatch(NodeId),
    /// One sample of the sun defined by worldspawn keys.
    #[allow(missing_docs)]
    WorldspawnSun { node: NodeId, sample: u32 },
    /// One sample of a sun defined in a sky shader. `index` is
    /// `sun_index << 16 | sample`.
    #[allow(missing_docs)]
    ShaderSun { shader: u64, index: u32 },
    /// One direction of a sky dome defined in a sky shader. `index` is
    /// `sky_index << 16 | sample`.
    #[allow(missing_docs)]
    ShaderSkyLight { shader: u64, index: u32 },
}

impl LightKey {
    /// Packs a definition index and a sample index into the `index` of
    /// [`LightKey::ShaderSun`] and [`LightKey::ShaderSkyLight`].
    pub(crate) fn sample_index(definition: usize, sample: usize) -> u32 {
        ((definition as u32) << 16) | (sample as u32 & 0xFFFF)
    }
}

/// A [`Light`] together with its culling bounds and content hash.
#[derive(Clone, Copy, PartialEq)]
#[non_exhaustive]
pub struct LightEntry {
    #[allow(missing_docs)]
    pub light: Light,
    /// Region outside which the light is not considered at all.
    pub influence: Aab,
    /// Hash of everything about the light that affects its contribution.
    pub hash: u64,
}

impl LightEntry {
    /// Constructs a point light. A negative radius is treated as zero.
    pub fn point(origin: FreePoint, color: Rgb, radius: FreeCoordinate, falloff: Falloff) -> Self {
        let radius = radius.max(0.0);
        let hash = ContentHasher::new()
            .u32(0)
            .point(origin)
            .color(color)
            .f64(radius)
            .bool(falloff == Falloff::Linear)
            .finish();
        Self {
            light: Light::Point(PointLight {
                origin,
                color,
                radius,
                falloff,
            }),
            influence: Aab::from_center_half_extent(origin, radius),
            hash,
        }
    }

    /// Constructs a directional light affecting the region `influence`.
    ///
    /// `direction` is normalized; if it has no direction, straight up is used.
    pub fn directional(direction: FreeVector, color: Rgb, influence: Aab) -> Self {
        let direction = try_normalize(direction).unwrap_or(FreeVector::new(0.0, 0.0, 1.0));
        let hash = ContentHasher::new()
            .u32(1)
            .vector(direction)
            .color(color)
            .finish();
        Self {
            light: Light::Directional(DirectionalLight { direction, color }),
            influence,
            hash,
        }
    }
}

#[mutants::skip]
impl fmt::Debug for LightEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            light,
            influence,
            hash,
        } = self;
        f.debug_struct("LightEntry")
            .field("light", light)
            .field("influence", influence)
            .field("hash", &format_args!("{hash:016x}"))
            .finish()
    }
}

/// The complete set of lights found by one rescan.
pub type LightSet = HbHashMap<LightKey, LightEntry>;
