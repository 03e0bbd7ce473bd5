//! Mathematical utilities and decisions.

mod aab;
pub use aab::*;
mod color;
pub use color::*;
mod coord;
pub use coord::*;
mod matrix;
pub use matrix::*;
#[cfg(feature = "serde")]
mod serde_impls;

/// Returns the unit vector pointing at the given angles, in the editor's convention:
/// `yaw` rotates counterclockwise about +Z starting from +X, and `elevation` tilts
/// toward +Z.
///
/// Both angles are in radians.
///
/// ```
/// # extern crate preview_lighting_base as preview_lighting;
/// use preview_lighting::math::spherical_direction;
///
/// let v = spherical_direction(0.0, core::f64::consts::FRAC_PI_2);
/// assert!(v.x.abs() < 1e-12 && v.y.abs() < 1e-12 && (v.z - 1.0).abs() < 1e-12);
/// ```
#[inline]
pub fn spherical_direction(yaw: FreeCoordinate, elevation: FreeCoordinate) -> FreeVector {
    let (sin_yaw, cos_yaw) = yaw.sin_cos();
    let (sin_elevation, cos_elevation) = elevation.sin_cos();
    FreeVector::new(cos_yaw * cos_elevation, sin_yaw * cos_elevation, sin_elevation)
}

/// Normalizes `vector`, or returns [`None`] if its length is too small to have a
/// meaningful direction.
///
/// ```
/// # extern crate preview_lighting_base as preview_lighting;
/// use preview_lighting::math::{FreeVector, try_normalize};
///
/// assert_eq!(try_normalize(FreeVector::new(0.0, 3.0, 0.0)), Some(FreeVector::new(0.0, 1.0, 0.0)));
/// assert_eq!(try_normalize(FreeVector::zero()), None);
/// ```
#[inline]
pub fn try_normalize(vector: FreeVector) -> Option<FreeVector> {
    let length = vector.length();
    if length > 1e-12 && length.is_finite() {
        Some(vector / length)
    } else {
        None
    }
}

/// Returns a pair of unit vectors perpendicular to `normal` and to each other, for
/// projecting points on a plane with that normal into 2D coordinates.
///
/// The first axis is `normal × Z`, or `normal × Y` when the normal is (anti)parallel
/// to Z. The second is `first × normal`.
///
/// Returns [`None`] if `normal` is degenerate.
#[allow(clippy::missing_inline_in_public_items)]
pub fn plane_basis(normal: FreeVector) -> Option<(FreeVector, FreeVector)> {
    let normal = try_normalize(normal)?;
    let mut u = normal.cross(FreeVector::new(0.0, 0.0, 1.0));
    if u.length() < 1e-4 {
        u = normal.cross(FreeVector::new(0.0, 1.0, 0.0));
    }
    let u = try_normalize(u)?;
    let v = try_normalize(u.cross(normal))?;
    Some((u, v))
}
