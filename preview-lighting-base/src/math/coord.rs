//! Numeric types used for coordinates and related quantities.

use euclid::{Point3D, Vector3D};

/// Unit-of-measure type for map coordinates, as used by the editor's scene graph.
#[expect(clippy::exhaustive_enums)]
#[derive(Debug)]
pub enum World {}

/// Coordinates in map space.
pub type FreeCoordinate = f64;

/// Positions in map space.
pub type FreePoint = Point3D<FreeCoordinate, World>;

/// Vectors in map space.
pub type FreeVector = Vector3D<FreeCoordinate, World>;
