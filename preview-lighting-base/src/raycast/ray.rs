use crate::math::{Aab, FreeCoordinate, FreePoint, FreeVector};
use crate::raycast::{PARALLEL_EPSILON, TRIANGLE_EPSILON};

/// A ray; a half-infinite line segment, which the intersection tests below treat as
/// finite by taking a maximum distance in units of the direction vector's length.
#[allow(clippy::exhaustive_structs)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    /// The sole endpoint of the ray.
    pub origin: FreePoint,

    /// The direction in which the ray extends infinitely.
    ///
    /// Shadow rays use unit vectors, so that distances are in world units.
    pub direction: FreeVector,
}

impl Ray {
    /// Constructs a [`Ray`] from convertible types (e.g. tuples or 3-element arrays).
    /// Other than the use of [`Into`], this is equivalent to a struct literal.
    ///
    /// ```
    /// # use preview_lighting_base as preview_lighting;
    /// use preview_lighting::euclid::{point3, vec3};
    /// use preview_lighting::raycast::Ray;
    ///
    /// assert_eq!(
    ///     Ray::new([1., 2., 3.], [4., 5., 6.]),
    ///     Ray {
    ///         origin: point3(1., 2., 3.),
    ///         direction: vec3(4., 5., 6.),
    ///     }
    /// );
    /// ```
    #[allow(clippy::missing_inline_in_public_items)] // is generic already
    pub fn new(origin: impl Into<FreePoint>, direction: impl Into<FreeVector>) -> Self {
        Self {
            origin: origin.into(),
            direction: direction.into(),
        }
    }

    /// Returns the point at parameter `t` along the ray.
    #[must_use]
    #[inline]
    pub fn at(self, t: FreeCoordinate) -> FreePoint {
        self.origin + self.direction * t
    }

    /// Slab test: returns whether the ray passes through `aab` somewhere in the
    /// parameter range `[0, max_distance]`.
    ///
    /// A ray parallel to a pair of slabs intersects only if its origin lies between
    /// them. A box entirely behind the origin does not count.
    #[allow(clippy::missing_inline_in_public_items)]
    pub fn intersects_aab_within(&self, aab: Aab, max_distance: FreeCoordinate) -> bool {
        let lower = aab.lower_bounds_p().to_array();
        let upper = aab.upper_bounds_p().to_array();
        let origin = self.origin.to_array();
        let direction = self.direction.to_array();

        let mut t_min: FreeCoordinate = 0.0;
        let mut t_max = max_distance;
        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            if d.abs() < PARALLEL_EPSILON {
                if o < lower[axis] || o > upper[axis] {
                    return false;
                }
                continue;
            }

            let inverse = 1.0 / d;
            let mut t1 = (lower[axis] - o) * inverse;
            let mut t2 = (upper[axis] - o) * inverse;
            if t1 > t2 {
                core::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return false;
            }
        }

        t_max > 0.0
    }

    /// Möller–Trumbore ray/triangle test. Two-sided.
    ///
    /// Returns the ray parameter of the hit, or [`None`] if the ray misses or the
    /// triangle is degenerate or (nearly) edge-on to the ray. Hits at a distance not
    /// greater than [`TRIANGLE_EPSILON`] are ignored so that a ray leaving a surface
    /// does not hit that surface.
    #[allow(clippy::missing_inline_in_public_items)]
    pub fn triangle_hit(&self, [v0, v1, v2]: [FreePoint; 3]) -> Option<FreeCoordinate> {
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let p = self.direction.cross(e2);
        let determinant = e1.dot(p);
        if determinant.abs() < TRIANGLE_EPSILON {
            return None;
        }

        let inverse = 1.0 / determinant;
        let to_origin = self.origin - v0;
        let u = to_origin.dot(p) * inverse;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = to_origin.cross(e1);
        let v = self.direction.dot(q) * inverse;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = e2.dot(q) * inverse;
        (t > TRIANGLE_EPSILON).then_some(t)
    }

    /// Returns whether the ray hits the triangle strictly before `max_distance`.
    #[inline]
    pub fn intersects_triangle_within(
        &self,
        triangle: [FreePoint; 3],
        max_distance: FreeCoordinate,
    ) -> bool {
        self.triangle_hit(triangle).is_some_and(|t| t < max_distance)
    }
}
