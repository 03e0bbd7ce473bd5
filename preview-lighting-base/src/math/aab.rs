use core::fmt;

use euclid::{Point3D, Size3D, Vector3D};

use crate::math::{FreeCoordinate, FreePoint, FreeVector, World};

/// An axis-aligned box in world coordinates.
///
/// Used for the world bounds of scene nodes and for the regions of influence of
/// lights. The bounds are inclusive, so a box of zero size still contains its
/// single point and intersects boxes touching it.
#[derive(Copy, Clone, PartialEq)]
pub struct Aab {
    // The upper >= lower checks reject NaNs.
    lower_bounds: FreePoint,
    upper_bounds: FreePoint,
}

impl Aab {
    /// The box of zero size at the origin.
    pub const ZERO: Aab = Aab {
        lower_bounds: Point3D::new(0., 0., 0.),
        upper_bounds: Point3D::new(0., 0., 0.),
    };

    /// Constructs a box from its low and high coordinate on each axis, in x, y, z order.
    #[inline]
    #[track_caller]
    pub fn new(
        lx: FreeCoordinate,
        hx: FreeCoordinate,
        ly: FreeCoordinate,
        hy: FreeCoordinate,
        lz: FreeCoordinate,
        hz: FreeCoordinate,
    ) -> Self {
        Self::from_lower_upper(Point3D::new(lx, ly, lz), Point3D::new(hx, hy, hz))
    }

    /// Constructs a box from its lowest and highest corners.
    ///
    /// Panics if any coordinate of `lower_bounds` exceeds the matching one of
    /// `upper_bounds`, or if any coordinate is NaN.
    #[inline]
    #[track_caller]
    pub fn from_lower_upper(
        lower_bounds: impl Into<FreePoint>,
        upper_bounds: impl Into<FreePoint>,
    ) -> Self {
        let lower_bounds = lower_bounds.into();
        let upper_bounds = upper_bounds.into();
        match Self::checked_from_lower_upper(lower_bounds, upper_bounds) {
            Some(aab) => aab,
            None => panic!("box corners out of order or NaN: {lower_bounds:?} to {upper_bounds:?}"),
        }
    }

    /// Like [`Aab::from_lower_upper`], but returns [`None`] instead of panicking.
    #[inline]
    pub fn checked_from_lower_upper(
        lower_bounds: FreePoint,
        upper_bounds: FreePoint,
    ) -> Option<Self> {
        let ordered = (lower_bounds.x <= upper_bounds.x)
            & (lower_bounds.y <= upper_bounds.y)
            & (lower_bounds.z <= upper_bounds.z);
        ordered.then_some(Self {
            lower_bounds,
            upper_bounds,
        })
    }

    /// Constructs the box centered on `center` that extends `half_extent` in every
    /// direction.
    ///
    /// A negative or NaN `half_extent` is treated as zero.
    ///
    /// ```
    /// # extern crate preview_lighting_base as preview_lighting;
    /// use preview_lighting::math::{Aab, FreePoint};
    ///
    /// assert_eq!(
    ///     Aab::from_center_half_extent(FreePoint::new(1.0, 2.0, 3.0), 2.0),
    ///     Aab::new(-1.0, 3.0, 0.0, 4.0, 1.0, 5.0),
    /// );
    /// ```
    #[inline]
    pub fn from_center_half_extent(center: FreePoint, half_extent: FreeCoordinate) -> Self {
        let half_extent = if half_extent > 0.0 { half_extent } else { 0.0 };
        let offset = Vector3D::splat(half_extent);
        Self::checked_from_lower_upper(center - offset, center + offset)
            .unwrap_or(Aab::from_point(center))
    }

    /// Constructs the box of zero size containing only `point`, or [`Aab::ZERO`] if
    /// the point is NaN.
    #[inline]
    pub fn from_point(point: FreePoint) -> Self {
        Self::checked_from_lower_upper(point, point).unwrap_or(Aab::ZERO)
    }

    /// Returns the smallest box containing all of the given points, or [`None`] if
    /// there are no points. NaN coordinates are ignored.
    #[allow(clippy::missing_inline_in_public_items)]
    pub fn from_points(points: impl IntoIterator<Item = FreePoint>) -> Option<Self> {
        let mut accumulator: Option<Aab> = None;
        for point in points {
            if let Some(point_box) = Self::checked_from_lower_upper(point, point) {
                accumulator = Some(match accumulator {
                    Some(aab) => aab.union(point_box),
                    None => point_box,
                });
            }
        }
        accumulator
    }

    /// The most negative corner of the box.
    #[inline]
    pub const fn lower_bounds_p(&self) -> FreePoint {
        self.lower_bounds
    }

    /// The most positive corner of the box.
    #[inline]
    pub const fn upper_bounds_p(&self) -> FreePoint {
        self.upper_bounds
    }

    /// Extent of the box along each axis.
    #[inline]
    pub fn size(&self) -> Size3D<FreeCoordinate, World> {
        Size3D::from(self.upper_bounds - self.lower_bounds)
    }

    /// Half of the size of the box, as a vector from the center to the most positive
    /// corner.
    #[inline]
    pub fn half_extents(&self) -> FreeVector {
        (self.upper_bounds - self.lower_bounds) * 0.5
    }

    /// The midpoint of the box.
    ///
    /// ```
    /// # extern crate preview_lighting_base as preview_lighting;
    /// use preview_lighting::math::{Aab, FreePoint};
    ///
    /// let floor = Aab::new(0.0, 64.0, 0.0, 64.0, -8.0, 0.0);
    /// assert_eq!(floor.center(), FreePoint::new(32.0, 32.0, -4.0));
    /// ```
    #[inline]
    pub fn center(&self) -> FreePoint {
        self.lower_bounds.lerp(self.upper_bounds, 0.5)
    }

    /// Returns whether `point` lies inside the box or on its surface.
    #[inline]
    pub fn contains(&self, point: FreePoint) -> bool {
        self.intersects(Aab {
            lower_bounds: point,
            upper_bounds: point,
        })
    }

    /// Returns whether the two boxes overlap. Boxes which only touch count as overlapping.
    ///
    /// ```
    /// # extern crate preview_lighting_base as preview_lighting;
    /// use preview_lighting::math::Aab;
    ///
    /// let a = Aab::new(0.0, 1.0, 0.0, 1.0, 0.0, 1.0);
    /// assert!(a.intersects(Aab::new(1.0, 2.0, 0.0, 1.0, 0.0, 1.0)));
    /// assert!(!a.intersects(Aab::new(1.5, 2.0, 0.0, 1.0, 0.0, 1.0)));
    /// ```
    #[inline]
    pub fn intersects(&self, other: Aab) -> bool {
        let lower = self.lower_bounds.max(other.lower_bounds);
        let upper = self.upper_bounds.min(other.upper_bounds);
        lower.x <= upper.x && lower.y <= upper.y && lower.z <= upper.z
    }

    /// Returns the smallest box containing both `self` and `other`.
    #[inline]
    #[must_use]
    pub fn union(self, other: Aab) -> Self {
        Aab {
            lower_bounds: self.lower_bounds.min(other.lower_bounds),
            upper_bounds: self.upper_bounds.max(other.upper_bounds),
        }
    }
}

impl fmt::Debug for Aab {
    #[allow(clippy::missing_inline_in_public_items)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (l, u) = (self.lower_bounds, self.upper_bounds);
        f.debug_tuple("Aab")
            .field(&(l.x..=u.x))
            .field(&(l.y..=u.y))
            .field(&(l.z..=u.z))
            .finish()
    }
}

// Construction rejects NaN.
impl Eq for Aab {}

#[cfg(test)]
mod tests {
    use super::*;
    use euclid::point3;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case::x_reversed(point3(5., 0., 0.), point3(4., 1., 1.))]
    #[case::z_reversed(point3(0., 0., 1.), point3(1., 1., 0.))]
    #[case::nan_lower(point3(f64::NAN, 0., 0.), point3(1., 1., 1.))]
    #[case::nan_upper(point3(0., 0., 0.), point3(1., f64::NAN, 1.))]
    fn rejects_bad_corners(#[case] lower: FreePoint, #[case] upper: FreePoint) {
        assert_eq!(Aab::checked_from_lower_upper(lower, upper), None);
    }

    #[test]
    #[should_panic = "box corners out of order or NaN: (2.0, 0.0, 0.0) to (1.0, 1.0, 1.0)"]
    fn panics_on_bad_corners() {
        Aab::from_lower_upper([2., 0., 0.], [1., 1., 1.]);
    }

    #[test]
    fn debug_shows_ranges() {
        let brush = Aab::new(-16.0, 16.0, 0.0, 128.0, 0.5, 8.0);
        assert_eq!(
            format!("{brush:?}"),
            "Aab(-16.0..=16.0, 0.0..=128.0, 0.5..=8.0)"
        );
        assert_eq!(
            format!("{brush:#?}\n"),
            indoc::indoc! {"
                Aab(
                    -16.0..=16.0,
                    0.0..=128.0,
                    0.5..=8.0,
                )
            "}
        );
    }

    #[test]
    fn size() {
        let floor = Aab::new(0.0, 64.0, 0.0, 64.0, -8.0, 0.0);
        assert_eq!(floor.size(), Size3D::new(64.0, 64.0, 8.0));
        assert_eq!(Aab::ZERO.size(), Size3D::zero());
    }

    #[test]
    fn from_points() {
        assert_eq!(Aab::from_points([]), None);
        assert_eq!(
            Aab::from_points([
                point3(1., 5., -2.),
                point3(f64::NAN, 0., 0.),
                point3(-1., 2., 3.),
            ]),
            Some(Aab::new(-1., 1., 2., 5., -2., 3.))
        );
    }

    #[test]
    fn zero_size_boxes_touch() {
        let a = Aab::from_point(point3(1., 1., 1.));
        assert!(a.intersects(Aab::new(1., 2., 1., 2., 1., 2.)));
        assert!(a.contains(point3(1., 1., 1.)));
        assert!(!a.contains(point3(1., 1., 1.0001)));
    }

    #[test]
    fn center_and_half_extents() {
        let aab = Aab::from_center_half_extent(point3(10., 0., -4.), 300.0);
        assert_eq!(aab.center(), point3(10., 0., -4.));
        assert_eq!(aab.half_extents(), Vector3D::splat(300.0));
        assert_eq!(
            Aab::from_center_half_extent(point3(1., 1., 1.), -3.0),
            Aab::from_point(point3(1., 1., 1.))
        );
    }

    #[test]
    fn union() {
        let a = Aab::new(0., 1., 0., 1., 0., 1.);
        assert_eq!(
            a.union(Aab::new(2., 3., -1., 0., 0., 1.)),
            Aab::new(0., 3., -1., 1., 0., 1.)
        );
        assert_eq!(a.union(a), a);
    }
}
