//! Content hashing of surfaces and lights, for detecting changes between rescans
//! without keeping or comparing copies of the data.
//!
//! These hashes are change detectors: equal inputs always give equal hashes, and
//! unequal inputs almost always give unequal ones. They are not stable across
//! versions of this crate and must not be persisted.

use crate::math::{FreePoint, FreeVector, Matrix4, Rgb};
use crate::scene::{Brush, Patch, ShaderSystem};

/// Incremental 64-bit hash accumulator.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct ContentHasher(u64);

impl ContentHasher {
    pub fn new() -> Self {
        Self(0)
    }

    #[inline]
    pub fn u64(&mut self, value: u64) -> &mut Self {
        let seed = self.0;
        self.0 = seed
            ^ value
                .wrapping_add(0x9e3779b97f4a7c15)
                .wrapping_add(seed << 6)
                .wrapping_add(seed >> 2);
        self
    }

    #[inline]
    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.u64(u64::from(value))
    }

    #[inline]
    pub fn usize(&mut self, value: usize) -> &mut Self {
        self.u64(value as u64)
    }

    #[inline]
    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.u32(u32::from(value))
    }

    /// Floats are hashed by bit pattern, so `0.0` and `-0.0` differ.
    #[inline]
    pub fn f64(&mut self, value: f64) -> &mut Self {
        self.u64(value.to_bits())
    }

    #[inline]
    pub fn f32(&mut self, value: f32) -> &mut Self {
        self.u32(value.to_bits())
    }

    pub fn vector(&mut self, v: FreeVector) -> &mut Self {
        self.f64(v.x).f64(v.y).f64(v.z)
    }

    pub fn point(&mut self, p: FreePoint) -> &mut Self {
        self.vector(p.to_vector())
    }

    pub fn color(&mut self, c: Rgb) -> &mut Self {
        self.f32(c.red()).f32(c.green()).f32(c.blue())
    }

    pub fn matrix(&mut self, m: &Matrix4) -> &mut Self {
        for element in m.to_cols_array() {
            self.f64(element);
        }
        self
    }

    /// Strings are first reduced to a [`str_digest()`].
    pub fn str(&mut self, s: &str) -> &mut Self {
        self.u64(str_digest(s))
    }

    pub fn finish(&self) -> u64 {
        self.0
    }
}

/// 64-bit FNV-1a digest of a string.
///
/// This is also the “shader hash” which identifies shader-defined lights across rescans.
pub(crate) fn str_digest(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x100000001b3)
    })
}

/// Hashes everything about a brush that can affect the lighting it casts or receives.
pub(crate) fn hash_brush(brush: &Brush, shaders: &dyn ShaderSystem) -> u64 {
    let mut hasher = ContentHasher::new();
    hasher
        .matrix(&brush.local_to_world)
        .bool(brush.participates());
    for face in &brush.faces {
        let flags = shaders.shader(&face.shader).unwrap_or_default().flags;
        hasher
            .bool(face.contributes)
            .bool(face.filtered)
            .vector(face.plane.normal)
            .f64(face.plane.distance)
            .str(&face.shader)
            .u32(flags.bits());
    }
    hasher.usize(brush.faces.len());
    hasher.finish()
}

/// Hashes everything about a patch that can affect the lighting it casts or receives.
pub(crate) fn hash_patch(patch: &Patch, shaders: &dyn ShaderSystem) -> u64 {
    let flags = shaders.shader(&patch.shader).unwrap_or_default().flags;
    let tess = &patch.tessellation;

    let mut hasher = ContentHasher::new();
    hasher
        .matrix(&patch.local_to_world)
        .bool(patch.visible)
        .str(&patch.shader)
        .u32(flags.bits())
        .bool(patch.filtered)
        .usize(tess.vertices.len())
        .usize(tess.indices.len())
        .usize(tess.strip_count)
        .usize(tess.strip_len);
    for vertex in &tess.vertices {
        hasher.point(vertex.position).vector(vertex.normal);
    }
    for &index in &tess.indices {
        hasher.u32(index);
    }
    hasher.finish()
}
