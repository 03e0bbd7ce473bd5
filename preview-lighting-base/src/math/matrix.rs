//! Affine transformation matrices.
//! This module is private but reexported by its parent.

use euclid::Vector3D;

use crate::math::{FreeCoordinate, FreePoint, FreeVector};

/// A 4×3 affine transformation matrix in [`FreeCoordinate`]s, as used for the
/// local-to-world transform of scene nodes.
///
/// The implied fourth row is always `0 0 0 1`.
#[expect(clippy::exhaustive_structs)]
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(from = "[[FreeCoordinate; 3]; 4]", into = "[[FreeCoordinate; 3]; 4]")
)]
pub struct Matrix4 {
    /// First column
    pub x: FreeVector,
    /// Second column
    pub y: FreeVector,
    /// Third column
    pub z: FreeVector,
    /// Fourth column (translation)
    pub w: FreeVector,
}

impl Matrix4 {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        x: Vector3D::new(1., 0., 0.),
        y: Vector3D::new(0., 1., 0.),
        z: Vector3D::new(0., 0., 1.),
        w: Vector3D::new(0., 0., 0.),
    };

    /// Constructs a pure translation.
    #[inline]
    pub const fn from_translation(offset: FreeVector) -> Self {
        Self {
            w: offset,
            ..Self::IDENTITY
        }
    }

    /// Constructs a matrix from its four columns.
    #[inline]
    pub const fn from_columns(
        x: FreeVector,
        y: FreeVector,
        z: FreeVector,
        w: FreeVector,
    ) -> Self {
        Self { x, y, z, w }
    }

    /// Returns the sixteen elements of the full 4×4 matrix in column-major order.
    #[inline]
    pub fn to_cols_array(&self) -> [FreeCoordinate; 16] {
        let Self { x, y, z, w } = *self;
        [
            x.x, x.y, x.z, 0.0, //
            y.x, y.y, y.z, 0.0, //
            z.x, z.y, z.z, 0.0, //
            w.x, w.y, w.z, 1.0, //
        ]
    }

    /// Returns the translation part of the transform.
    #[inline]
    pub const fn translation(&self) -> FreeVector {
        self.w
    }

    /// Transforms a position (applying the translation).
    #[inline]
    pub fn transform_point(&self, point: FreePoint) -> FreePoint {
        (self.transform_vector(point.to_vector()) + self.w).to_point()
    }

    /// Transforms a direction or offset (ignoring the translation).
    ///
    /// Surface normals are transformed with this too. The result is not renormalized.
    #[inline]
    pub fn transform_vector(&self, vector: FreeVector) -> FreeVector {
        self.x * vector.x + self.y * vector.y + self.z * vector.z
    }
}

impl Default for Matrix4 {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<[[FreeCoordinate; 3]; 4]> for Matrix4 {
    #[inline]
    fn from([x, y, z, w]: [[FreeCoordinate; 3]; 4]) -> Self {
        Self::from_columns(x.into(), y.into(), z.into(), w.into())
    }
}

impl From<Matrix4> for [[FreeCoordinate; 3]; 4] {
    #[inline]
    fn from(value: Matrix4) -> Self {
        [
            value.x.to_array(),
            value.y.to_array(),
            value.z.to_array(),
            value.w.to_array(),
        ]
    }
}
