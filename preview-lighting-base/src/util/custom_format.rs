#![allow(clippy::missing_inline_in_public_items)]

use core::fmt;
use core::time::Duration;

use manyfmt::{Fmt, Refmt as _};

/// Format type for [`manyfmt::Fmt`] which is similar to [`fmt::Debug`], but uses an
/// alternate concise format.
///
/// This format may be on one line despite the pretty-printing option, and may lose
/// precision or Rust syntax in favor of a short at-a-glance representation.
#[expect(clippy::exhaustive_structs)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ConciseDebug;

impl<T: fmt::Debug, U> Fmt<ConciseDebug> for euclid::Point3D<T, U> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>, _: &ConciseDebug) -> fmt::Result {
        write!(fmt, "({:+.3?}, {:+.3?}, {:+.3?})", self.x, self.y, self.z)
    }
}

impl Fmt<ConciseDebug> for crate::math::Aab {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>, fopt: &ConciseDebug) -> fmt::Result {
        write!(
            fmt,
            "{}..{}",
            self.lower_bounds_p().refmt(fopt),
            self.upper_bounds_p().refmt(fopt)
        )
    }
}

/// Durations are per-surface timings, so the interesting precision is in the
/// millisecond-to-microsecond range.
impl Fmt<ConciseDebug> for Duration {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>, _: &ConciseDebug) -> fmt::Result {
        write!(fmt, "{:5.2?} ms", (self.as_micros() as f32) / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Aab, FreePoint};

    #[test]
    fn concise_point() {
        assert_eq!(
            FreePoint::new(1.0, -2.5, 0.0).refmt(&ConciseDebug).to_string(),
            "(+1.000, -2.500, +0.000)"
        );
    }

    #[test]
    fn concise_duration() {
        assert_eq!(
            Duration::from_micros(2500).refmt(&ConciseDebug).to_string(),
            " 2.50 ms"
        );
    }

    #[test]
    fn concise_aab() {
        assert_eq!(
            Aab::new(0., 1., 0., 2., 0., 3.).refmt(&ConciseDebug).to_string(),
            "(+0.000, +0.000, +0.000)..(+1.000, +2.000, +3.000)"
        );
    }
}
