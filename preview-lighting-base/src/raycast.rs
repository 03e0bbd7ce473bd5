//! Ray intersection tests used for shadow queries.

mod ray;
pub use ray::Ray;

#[cfg(test)]
mod tests;

/// Directions whose component along an axis is smaller than this are treated as
/// parallel to that axis's slabs.
pub const PARALLEL_EPSILON: f64 = 1e-8;

/// Minimum determinant magnitude for a ray/triangle test, and minimum hit distance.
pub const TRIANGLE_EPSILON: f64 = 1e-6;
