//! Time budgets for incremental work, and statistics about how they were spent.

use core::fmt;
use core::ops;

use crate::util::ConciseDebug;
use manyfmt::Refmt as _;

#[doc(no_inline)]
pub use bevy_platform::time::Instant;
#[doc(no_inline)]
pub use core::time::Duration;

/// When a unit of incremental work should stop and return to its caller.
///
/// Work loops always complete at least one step before consulting the deadline, so
/// calling them repeatedly with any deadline, even [`Deadline::Asap`], eventually
/// finishes all the work.
///
/// Deadlines are ordered from soonest to latest, with [`Deadline::Asap`] before every
/// [`Deadline::At`] and [`Deadline::Whenever`] after every one.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum Deadline {
    /// Do one step and stop.
    Asap,
    /// Keep stepping until this time has been reached.
    At(Instant),
    /// Do all the work there is. Results do not depend on how fast the machine is.
    Whenever,
}

impl Deadline {
    /// A deadline `budget` from now.
    #[inline]
    pub fn after(budget: Duration) -> Self {
        Self::At(Instant::now() + budget)
    }

    /// Returns whether, at time `now`, work should stop.
    #[inline]
    pub fn is_past(&self, now: Instant) -> bool {
        match *self {
            Self::Asap => true,
            Self::At(limit) => now >= limit,
            Self::Whenever => false,
        }
    }
}

/// Count, total, and extremes of a set of measured durations.
///
/// [`TimeStats::default()`] contains no measurements. Statistics may be combined with `+=`,
/// and are displayed in a compact single-line form.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
#[expect(clippy::module_name_repetitions)]
pub struct TimeStats {
    /// How many durations were measured.
    pub count: usize,
    /// Total of all the measured durations.
    pub sum: Duration,
    /// Shortest measured duration; [`None`] exactly when `count` is zero.
    pub min: Option<Duration>,
    /// Longest measured duration; zero when `count` is zero.
    pub max: Duration,
}

impl TimeStats {
    /// Statistics of a single measurement.
    #[inline]
    pub const fn one(duration: Duration) -> Self {
        Self {
            count: 1,
            sum: duration,
            min: Some(duration),
            max: duration,
        }
    }

    /// Measures the time from `*since` to `now`, and moves `*since` to `now` so that the
    /// next call measures the following interval.
    #[inline]
    pub fn record_consecutive_interval(&mut self, since: &mut Instant, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(*since);
        *since = now;
        *self += Self::one(elapsed);
        elapsed
    }
}

impl ops::AddAssign for TimeStats {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.count += rhs.count;
        self.sum += rhs.sum;
        self.min = match (self.min, rhs.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = self.max.max(rhs.max);
    }
}

impl fmt::Display for TimeStats {
    #[allow(clippy::missing_inline_in_public_items)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.min {
            Some(min) => write!(f, "({}", min.refmt(&ConciseDebug))?,
            None => write!(f, "(--------")?,
        }
        write!(
            f,
            " .. {max}) for {count:3}, total {sum}",
            max = self.max.refmt(&ConciseDebug),
            count = self.count,
            sum = self.sum.refmt(&ConciseDebug),
        )
    }
}
