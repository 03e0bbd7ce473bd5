//! Emissive surfaces (`q3map_surfacelight`), approximated as one point light at the
//! surface's centroid.

use crate::light::{
    ENTITY_COLOR_REFERENCE, Falloff, LightEntry, ShaderLighting, inverse_square_radius,
    scaled_color,
};
use crate::math::{FreeCoordinate, FreePoint, FreeVector, Matrix4, Rgb};
use crate::scene::{Face, Patch};

/// Area and centroid of a surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct AreaCentroid {
    pub area: FreeCoordinate,
    pub centroid: FreePoint,
}

/// Accumulates area-weighted triangle centroids.
#[derive(Default)]
struct Accumulator {
    area: FreeCoordinate,
    weighted: FreeVector,
}

impl Accumulator {
    fn triangle(&mut self, a: FreePoint, b: FreePoint, c: FreePoint) {
        let area = (b - a).cross(c - a).length() * 0.5;
        let center = (a.to_vector() + b.to_vector() + c.to_vector()) / 3.0;
        self.area += area;
        self.weighted += center * area;
    }

    fn finish(self) -> Option<AreaCentroid> {
        (self.area > 0.0).then(|| AreaCentroid {
            area: self.area,
            centroid: (self.weighted / self.area).to_point(),
        })
    }
}

/// World-space area and centroid of a convex face, triangulated as a fan.
pub(crate) fn face_area_centroid(face: &Face, local_to_world: &Matrix4) -> Option<AreaCentroid> {
    let [first, rest @ ..] = face.winding.as_slice() else {
        return None;
    };
    let v0 = local_to_world.transform_point(*first);
    let mut accumulator = Accumulator::default();
    for pair in rest.windows(2) {
        accumulator.triangle(
            v0,
            local_to_world.transform_point(pair[0]),
            local_to_world.transform_point(pair[1]),
        );
    }
    accumulator.finish()
}

/// World-space area and centroid of a patch's tessellated mesh.
pub(crate) fn patch_area_centroid(patch: &Patch) -> Option<AreaCentroid> {
    let mut accumulator = Accumulator::default();
    for [a, b, c] in patch.tessellation.triangles() {
        let t = |p: FreePoint| patch.local_to_world.transform_point(p);
        accumulator.triangle(t(a.position), t(b.position), t(c.position));
    }
    accumulator.finish()
}

/// Multiplier on surface light intensity for the size of the surface, so that larger
/// surfaces reach farther.
pub(crate) fn area_scale(area: FreeCoordinate) -> f64 {
    (area.max(0.0).sqrt() / 128.0).clamp(0.25, 4.0)
}

/// Builds the light emitted by a surface with the given shape and shader.
///
/// Returns [`None`] if the shader is not emissive or the light would have no reach.
pub(crate) fn surface_light(
    shape: AreaCentroid,
    lighting: &ShaderLighting,
    average_color: Rgb,
) -> Option<LightEntry> {
    let value = lighting.surface_light?;
    let intensity = value.abs() * area_scale(shape.area);
    let radius = inverse_square_radius(intensity);
    if radius.is_nan() || radius <= 0.0 {
        return None;
    }
    let color = scaled_color(
        lighting.emitted_color(average_color),
        intensity,
        ENTITY_COLOR_REFERENCE,
    );
    Some(LightEntry::point(
        shape.centroid,
        color,
        radius,
        Falloff::InverseSquare,
    ))
}
