//! Color data types. This module is private but reexported by its parent.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Div, Mul};

use euclid::{Vector3D, vec3};

/// A floating-point linear RGB color value, as used for light colors and lighting
/// results.
///
/// * Each color component is nonnegative and not NaN; construction replaces
///   violating values with zero.
/// * Components are unbounded above. Light colors are routinely brighter than 1,
///   and lighting results are only clamped to the displayable range at the end of
///   evaluation.
#[derive(Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "[f32; 3]", into = "[f32; 3]"))]
pub struct Rgb(Vector3D<f32, Intensity>);

/// Unit-of-measure type for vectors that contain color channels.
#[expect(clippy::exhaustive_enums)]
#[derive(Debug, Eq, PartialEq)]
pub enum Intensity {}

/// Coerces negative and NaN components to zero.
#[inline]
fn sanitize(component: f32) -> f32 {
    if component > 0.0 { component } else { 0.0 }
}

impl Rgb {
    /// Black.
    pub const ZERO: Rgb = Rgb(vec3(0.0, 0.0, 0.0));
    /// Nominal white.
    ///
    /// Note that brighter values may exist.
    pub const ONE: Rgb = Rgb(vec3(1.0, 1.0, 1.0));

    /// Constructs a color from components.
    ///
    /// Negative and NaN components are replaced with zero.
    #[inline]
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self(vec3(sanitize(r), sanitize(g), sanitize(b)))
    }

    /// Constructs a shade of gray (components all equal).
    #[inline]
    pub fn from_luminance(luminance: f32) -> Self {
        Self::new(luminance, luminance, luminance)
    }

    /// Returns the red color component.
    #[inline]
    pub const fn red(self) -> f32 {
        self.0.x
    }

    /// Returns the green color component.
    #[inline]
    pub const fn green(self) -> f32 {
        self.0.y
    }

    /// Returns the blue color component.
    #[inline]
    pub const fn blue(self) -> f32 {
        self.0.z
    }

    /// Returns the largest of the three components.
    #[inline]
    pub fn max_component(self) -> f32 {
        self.0.x.max(self.0.y).max(self.0.z)
    }

    /// Combines the R, G, B components to produce a luminance (grayscale) value.
    ///
    /// This assumes the standard sRGB primaries.
    #[inline]
    pub fn luminance(self) -> f32 {
        self.0.x * 0.2126 + self.0.y * 0.7152 + self.0.z * 0.0722
    }

    /// Clamps each component to at most `maximum`.
    #[inline]
    #[must_use]
    pub fn clamp(self, maximum: f32) -> Self {
        Self::new(
            self.0.x.min(maximum),
            self.0.y.min(maximum),
            self.0.z.min(maximum),
        )
    }

    /// Converts to 8-bit components, clamping to the `0..=1` range and truncating.
    ///
    /// ```
    /// # extern crate preview_lighting_base as preview_lighting;
    /// use preview_lighting::math::Rgb;
    ///
    /// assert_eq!(Rgb::new(0.5, 2.0, 0.0).to_unorm8(), [127, 255, 0]);
    /// ```
    #[inline]
    pub fn to_unorm8(self) -> [u8; 3] {
        let convert = |c: f32| (c * 255.0).clamp(0.0, 255.0) as u8;
        [convert(self.0.x), convert(self.0.y), convert(self.0.z)]
    }
}

impl From<[f32; 3]> for Rgb {
    #[inline]
    fn from([r, g, b]: [f32; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl From<Rgb> for [f32; 3] {
    #[inline]
    fn from(value: Rgb) -> Self {
        value.0.to_array()
    }
}

impl Add<Rgb> for Rgb {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl AddAssign<Rgb> for Rgb {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Multiplies this color value by a scalar.
///
/// A negative or NaN scalar produces black.
impl Mul<f32> for Rgb {
    type Output = Self;
    #[inline]
    fn mul(self, scalar: f32) -> Self {
        let scalar = sanitize(scalar);
        Self::new(self.0.x * scalar, self.0.y * scalar, self.0.z * scalar)
    }
}

/// Divides this color value by a scalar.
///
/// Division by zero, a negative value, or NaN produces black.
impl Div<f32> for Rgb {
    type Output = Self;
    #[inline]
    fn div(self, scalar: f32) -> Self {
        if scalar > 0.0 {
            Self::new(self.0.x / scalar, self.0.y / scalar, self.0.z / scalar)
        } else {
            Self::ZERO
        }
    }
}

impl Sum for Rgb {
    #[allow(clippy::missing_inline_in_public_items)]
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Rgb::ZERO, Add::add)
    }
}

impl fmt::Debug for Rgb {
    #[allow(clippy::missing_inline_in_public_items)]
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            fmt,
            "Rgb({:?}, {:?}, {:?})",
            self.red(),
            self.green(),
            self.blue()
        )
    }
}
