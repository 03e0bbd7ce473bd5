//! The view of the host editor's scene which preview lighting consumes.
//!
//! Nothing here is owned by the lighting engine. The host implements [`SceneGraph`],
//! [`ShaderSystem`], and [`VirtualFileSystem`], and hands them over bundled in a
//! [`SceneAccess`] each time the engine needs to look at the scene.
//! [`memory::MemoryScene`] is a self-contained implementation of all three.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::math::{Aab, FreeCoordinate, FreePoint, FreeVector, Matrix4, Rgb};

pub mod memory;

// -------------------------------------------------------------------------------------------------

/// Stable identity of a scene-graph node (entity, brush, or patch).
///
/// Identities must not be reused for a different node while the engine may still
/// hold cached data for the old one.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "save", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "save", serde(transparent))]
#[expect(clippy::exhaustive_structs)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// -------------------------------------------------------------------------------------------------

/// An entity: a bag of string key/value pairs attached to a node.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "save", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub struct Entity {
    /// Identity of the entity's node.
    pub node: NodeId,
    /// World-space bounds of the entity, used as its position when it has no
    /// `origin` key.
    #[cfg_attr(feature = "save", serde(default))]
    pub world_bounds: Option<Aab>,
    /// Key/value pairs. Keys are case-sensitive.
    pub keys: BTreeMap<String, String>,
}

/// Error from one of the typed key accessors of [`Entity`].
#[derive(Clone, Debug, displaydoc::Display, Eq, PartialEq)]
#[non_exhaustive]
pub enum KeyParseError {
    /// key {key:?} is absent or empty
    #[allow(missing_docs)]
    Missing { key: String },
    /// key {key:?} has value {value:?} which is not {expected}
    #[allow(missing_docs)]
    Malformed {
        key: String,
        value: String,
        expected: &'static str,
    },
}

impl core::error::Error for KeyParseError {}

impl Entity {
    /// Constructs an entity with no keys and no bounds.
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            world_bounds: None,
            keys: BTreeMap::new(),
        }
    }

    /// Builder-style key insertion.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.keys.insert(key.into(), value.into());
        self
    }

    /// Builder-style bounds assignment.
    #[must_use]
    pub fn with_bounds(mut self, bounds: Aab) -> Self {
        self.world_bounds = Some(bounds);
        self
    }

    /// Returns the value of `key`, treating an empty value the same as an absent key.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.keys
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Returns the `classname` key, or the empty string.
    pub fn classname(&self) -> &str {
        self.value("classname").unwrap_or("")
    }

    /// Whether this is the map's global `worldspawn` entity.
    pub fn is_worldspawn(&self) -> bool {
        self.classname().eq_ignore_ascii_case("worldspawn")
    }

    /// Parses `key` as a single number.
    pub fn float(&self, key: &str) -> Result<f64, KeyParseError> {
        let value = self.required(key)?;
        finite_number(value.trim()).ok_or_else(|| malformed(key, value, "a number"))
    }

    /// Parses `key` as a single integer.
    pub fn int(&self, key: &str) -> Result<i32, KeyParseError> {
        let value = self.required(key)?;
        value
            .trim()
            .parse::<i32>()
            .map_err(|_| malformed(key, value, "an integer"))
    }

    /// Parses `key` as exactly three whitespace-separated numbers.
    pub fn vector(&self, key: &str) -> Result<FreeVector, KeyParseError> {
        let value = self.required(key)?;
        let mut numbers = [0.0; 3];
        let mut tokens = value.split_whitespace();
        for slot in &mut numbers {
            *slot = tokens
                .next()
                .and_then(finite_number)
                .ok_or_else(|| malformed(key, value, "three numbers"))?;
        }
        if tokens.next().is_some() {
            return Err(malformed(key, value, "three numbers"));
        }
        Ok(FreeVector::from(numbers))
    }

    /// Parses up to `N` leading numbers of `key`, stopping at the first token that is
    /// not a number. Returns how many were parsed; the rest of the array is zero.
    ///
    /// This is the lenient reading used for multi-part keys such as `_light` and `_sun`,
    /// whose meaning depends on how many numbers are present.
    pub fn leading_numbers<const N: usize>(&self, key: &str) -> ([f64; N], usize) {
        let mut numbers = [0.0; N];
        let mut count = 0;
        if let Some(value) = self.value(key) {
            for (slot, token) in numbers.iter_mut().zip(value.split_whitespace()) {
                match finite_number(token) {
                    Some(number) => {
                        *slot = number;
                        count += 1;
                    }
                    None => break,
                }
            }
        }
        (numbers, count)
    }

    /// Interprets `key` as a boolean: `true` and `yes` (in any case) and nonzero
    /// integers are true; anything else, including absence, is false.
    pub fn truthy(&self, key: &str) -> bool {
        match self.value(key) {
            None => false,
            Some(value) => {
                value.eq_ignore_ascii_case("true")
                    || value.eq_ignore_ascii_case("yes")
                    || value.trim().parse::<i32>().is_ok_and(|i| i != 0)
            }
        }
    }

    /// The entity's position: the `origin` key if it parses, else the center of its
    /// world bounds, else the world origin.
    pub fn origin(&self) -> FreePoint {
        match self.vector("origin") {
            Ok(origin) => origin.to_point(),
            Err(_) => self
                .world_bounds
                .map_or(FreePoint::origin(), |bounds| bounds.center()),
        }
    }

    fn required(&self, key: &str) -> Result<&str, KeyParseError> {
        self.value(key).ok_or_else(|| KeyParseError::Missing {
            key: key.into(),
        })
    }
}

/// Parses a number, rejecting the NaN and infinity spellings that [`str::parse`] accepts.
pub(crate) fn finite_number(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|number| number.is_finite())
}

fn malformed(key: &str, value: &str, expected: &'static str) -> KeyParseError {
    KeyParseError::Malformed {
        key: key.into(),
        value: value.into(),
        expected,
    }
}

// -------------------------------------------------------------------------------------------------

/// A plane in `normal · p = distance` form.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "save", derive(serde::Serialize, serde::Deserialize))]
#[expect(clippy::exhaustive_structs)]
pub struct Plane {
    #[allow(missing_docs)]
    pub normal: FreeVector,
    #[allow(missing_docs)]
    pub distance: FreeCoordinate,
}

/// One face of a [`Brush`], in the brush's local coordinates.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "save", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub struct Face {
    /// Name of the face's shader (material).
    pub shader: String,
    /// Plane the face lies on. The normal points out of the brush.
    pub plane: Plane,
    /// Convex polygon of the face, in order.
    pub winding: Vec<FreePoint>,
    /// Whether the face contributes to the brush at all (a face clipped away
    /// entirely by the others does not).
    #[cfg_attr(feature = "save", serde(default = "default_true"))]
    pub contributes: bool,
    /// Whether the face is hidden by an editor filter.
    #[cfg_attr(feature = "save", serde(default))]
    pub filtered: bool,
}

impl Face {
    /// Constructs a contributing, unfiltered face. The plane is derived from the
    /// winding; if it is degenerate the plane normal is zero.
    pub fn new(shader: impl Into<String>, winding: Vec<FreePoint>) -> Self {
        let plane = polygon_plane(&winding);
        Self {
            shader: shader.into(),
            plane,
            winding,
            contributes: true,
            filtered: false,
        }
    }

    /// Builder-style filter flag.
    #[must_use]
    pub fn filtered(mut self, filtered: bool) -> Self {
        self.filtered = filtered;
        self
    }
}

/// Computes the plane of a counterclockwise polygon by Newell's method.
fn polygon_plane(winding: &[FreePoint]) -> Plane {
    let mut normal = FreeVector::zero();
    for (i, a) in winding.iter().enumerate() {
        let b = winding[(i + 1) % winding.len()];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    let normal = crate::math::try_normalize(normal).unwrap_or(FreeVector::zero());
    let distance = winding.first().map_or(0.0, |p| normal.dot(p.to_vector()));
    Plane { normal, distance }
}

#[cfg(feature = "save")]
fn default_true() -> bool {
    true
}

/// A convex brush: a set of faces under a transform.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "save", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub struct Brush {
    #[allow(missing_docs)]
    pub node: NodeId,
    /// Whether the node is visible (not hidden, not in a hidden layer).
    #[cfg_attr(feature = "save", serde(default = "default_true"))]
    pub visible: bool,
    #[allow(missing_docs)]
    #[cfg_attr(feature = "save", serde(default))]
    pub local_to_world: Matrix4,
    #[allow(missing_docs)]
    pub faces: Vec<Face>,
}

impl Brush {
    /// Constructs a visible brush with an identity transform.
    pub fn new(node: NodeId, faces: Vec<Face>) -> Self {
        Self {
            node,
            visible: true,
            local_to_world: Matrix4::IDENTITY,
            faces,
        }
    }

    /// Constructs an axis-aligned box brush with the same shader on every face.
    pub fn from_aab(node: NodeId, aab: Aab, shader: &str) -> Self {
        let l = aab.lower_bounds_p();
        let u = aab.upper_bounds_p();
        let p = FreePoint::new;
        // Each winding is counterclockwise as seen from outside.
        let windings = [
            [p(l.x, l.y, l.z), p(l.x, l.y, u.z), p(l.x, u.y, u.z), p(l.x, u.y, l.z)],
            [p(u.x, l.y, l.z), p(u.x, u.y, l.z), p(u.x, u.y, u.z), p(u.x, l.y, u.z)],
            [p(l.x, l.y, l.z), p(u.x, l.y, l.z), p(u.x, l.y, u.z), p(l.x, l.y, u.z)],
            [p(l.x, u.y, l.z), p(l.x, u.y, u.z), p(u.x, u.y, u.z), p(u.x, u.y, l.z)],
            [p(l.x, l.y, l.z), p(l.x, u.y, l.z), p(u.x, u.y, l.z), p(u.x, l.y, l.z)],
            [p(l.x, l.y, u.z), p(u.x, l.y, u.z), p(u.x, u.y, u.z), p(l.x, u.y, u.z)],
        ];
        Self::new(
            node,
            windings
                .into_iter()
                .map(|winding| Face::new(shader, winding.to_vec()))
                .collect(),
        )
    }

    /// Builder-style transform assignment.
    #[must_use]
    pub fn with_transform(mut self, local_to_world: Matrix4) -> Self {
        self.local_to_world = local_to_world;
        self
    }

    /// Whether the brush takes part in preview lighting at all.
    pub fn participates(&self) -> bool {
        self.visible
    }

    /// Whether `face` (which must belong to this brush) casts and emits light.
    pub fn face_participates(&self, face: &Face) -> bool {
        self.participates() && face.contributes && !face.filtered
    }

    /// Returns the bounds of all face vertices in world space, or [`None`] if the
    /// brush has no vertices.
    pub fn world_bounds(&self) -> Option<Aab> {
        Aab::from_points(
            self.faces
                .iter()
                .flat_map(|face| &face.winding)
                .map(|&p| self.local_to_world.transform_point(p)),
        )
    }
}

// -------------------------------------------------------------------------------------------------

/// A vertex of a tessellated [`Patch`], in the patch's local coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "save", derive(serde::Serialize, serde::Deserialize))]
#[expect(clippy::exhaustive_structs)]
pub struct PatchVertex {
    #[allow(missing_docs)]
    pub position: FreePoint,
    /// Interpolated surface normal.
    pub normal: FreeVector,
}

/// The triangle mesh of a curved patch, as a set of equal-length quad strips.
///
/// Strip `s` consists of `indices[s * strip_len .. (s + 1) * strip_len]`; each
/// consecutive index pair is one row of the strip.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "save", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub struct PatchTessellation {
    #[allow(missing_docs)]
    pub vertices: Vec<PatchVertex>,
    #[allow(missing_docs)]
    pub indices: Vec<u32>,
    #[allow(missing_docs)]
    pub strip_count: usize,
    #[allow(missing_docs)]
    pub strip_len: usize,
}

impl PatchTessellation {
    /// Tessellates a `width` by `height` grid of vertices, given in row-major order,
    /// into `height - 1` strips.
    ///
    /// Returns [`None`] if `vertices` has the wrong length or the grid is smaller than
    /// 2 by 2.
    pub fn from_grid(width: usize, height: usize, vertices: Vec<PatchVertex>) -> Option<Self> {
        if width < 2 || height < 2 || vertices.len() != width.checked_mul(height)? {
            return None;
        }
        let mut indices = Vec::with_capacity((height - 1) * width * 2);
        for row in 0..height - 1 {
            for column in 0..width {
                indices.push(u32::try_from(row * width + column).ok()?);
                indices.push(u32::try_from((row + 1) * width + column).ok()?);
            }
        }
        Some(Self {
            vertices,
            indices,
            strip_count: height - 1,
            strip_len: width * 2,
        })
    }

    /// Iterates over the index slices of the strips.
    pub fn strips(&self) -> impl Iterator<Item = &[u32]> + '_ {
        self.indices
            .chunks_exact(self.strip_len.max(1))
            .take(if self.strip_len == 0 { 0 } else { self.strip_count })
    }

    /// Iterates over the triangles of the mesh as vertex index triples: each quad of
    /// a strip, `i0 i1 i2 i3`, is split into `(i0, i1, i2)` and `(i2, i1, i3)`.
    ///
    /// Triangles referring to nonexistent vertices are skipped. If the strips are too
    /// short to form any quad, there are no triangles.
    pub fn triangles(&self) -> impl Iterator<Item = [&PatchVertex; 3]> + '_ {
        let usable = self.strip_count > 0 && self.strip_len >= 4;
        self.strips()
            .filter(move |_| usable)
            .flat_map(|strip| {
                (0..strip.len().saturating_sub(3))
                    .step_by(2)
                    .flat_map(move |i| {
                        let [i0, i1, i2, i3] = [strip[i], strip[i + 1], strip[i + 2], strip[i + 3]];
                        [[i0, i1, i2], [i2, i1, i3]]
                    })
            })
            .filter_map(|[a, b, c]| {
                let vertex = |i: u32| self.vertices.get(usize::try_from(i).ok()?);
                Some([vertex(a)?, vertex(b)?, vertex(c)?])
            })
    }
}

/// A curved patch surface, already tessellated by the host.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "save", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub struct Patch {
    #[allow(missing_docs)]
    pub node: NodeId,
    /// Whether the node is visible.
    #[cfg_attr(feature = "save", serde(default = "default_true"))]
    pub visible: bool,
    /// Whether the patch is hidden by an editor filter.
    #[cfg_attr(feature = "save", serde(default))]
    pub filtered: bool,
    #[allow(missing_docs)]
    pub shader: String,
    #[allow(missing_docs)]
    #[cfg_attr(feature = "save", serde(default))]
    pub local_to_world: Matrix4,
    #[allow(missing_docs)]
    pub tessellation: PatchTessellation,
}

impl Patch {
    /// Constructs a visible, unfiltered patch with an identity transform.
    pub fn new(node: NodeId, shader: impl Into<String>, tessellation: PatchTessellation) -> Self {
        Self {
            node,
            visible: true,
            filtered: false,
            shader: shader.into(),
            local_to_world: Matrix4::IDENTITY,
            tessellation,
        }
    }

    /// Whether the patch casts, emits, and receives light.
    pub fn participates(&self) -> bool {
        self.visible && !self.filtered
    }

    /// Returns the bounds of all vertices in world space, or [`None`] if there are no
    /// vertices.
    pub fn world_bounds(&self) -> Option<Aab> {
        Aab::from_points(
            self.tessellation
                .vertices
                .iter()
                .map(|v| self.local_to_world.transform_point(v.position)),
        )
    }
}

// -------------------------------------------------------------------------------------------------

bitflags::bitflags! {
    /// Flags of a shader which affect preview lighting.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[cfg_attr(feature = "save", derive(serde::Serialize, serde::Deserialize))]
    pub struct ShaderFlags: u32 {
        /// Surfaces with this shader are not drawn, so they receive no lighting.
        const NODRAW = 1 << 0;
        /// Surfaces with this shader are sky portals: they neither cast shadows nor
        /// receive lighting, and may carry sun and sky light definitions.
        const SKY = 1 << 1;
    }
}

/// What the host knows about one shader.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "save", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "save", serde(default))]
#[non_exhaustive]
pub struct ShaderInfo {
    #[allow(missing_docs)]
    pub flags: ShaderFlags,
    /// Representative color of the shader's texture, used to tint emitted light.
    pub average_color: Rgb,
    /// Path, in the [`VirtualFileSystem`], of the script file defining the shader.
    pub source_file: Option<String>,
}

impl ShaderInfo {
    /// Shader information with the given flags, white color, and no source file.
    pub fn new(flags: ShaderFlags) -> Self {
        Self {
            flags,
            average_color: Rgb::ONE,
            source_file: None,
        }
    }

    /// Builder-style color assignment.
    #[must_use]
    pub fn with_color(mut self, average_color: Rgb) -> Self {
        self.average_color = average_color;
        self
    }

    /// Builder-style source file assignment.
    #[must_use]
    pub fn with_source_file(mut self, path: impl Into<String>) -> Self {
        self.source_file = Some(path.into());
        self
    }
}

impl Default for ShaderInfo {
    /// The information assumed for unknown and default shaders.
    fn default() -> Self {
        Self::new(ShaderFlags::empty())
    }
}

/// Error reading a file from a [`VirtualFileSystem`].
#[derive(Clone, Debug, displaydoc::Display, Eq, PartialEq)]
#[non_exhaustive]
pub enum ReadError {
    /// file {path:?} not found
    #[allow(missing_docs)]
    NotFound { path: String },
    /// file {path:?} could not be read: {message}
    #[allow(missing_docs)]
    Unreadable { path: String, message: String },
}

impl core::error::Error for ReadError {}

// -------------------------------------------------------------------------------------------------

/// Traversal of the host's scene graph.
///
/// Traversal order is up to the host but should be stable, since it decides the order
/// in which surfaces are first relit.
pub trait SceneGraph {
    /// Calls `f` for every entity, including `worldspawn`.
    fn for_each_entity(&self, f: &mut dyn FnMut(&Entity));

    /// Calls `f` for every brush, visible or not.
    fn for_each_brush(&self, f: &mut dyn FnMut(&Brush));

    /// Calls `f` for every patch, visible or not.
    fn for_each_patch(&self, f: &mut dyn FnMut(&Patch));

    /// Looks up a brush by node identity.
    fn brush(&self, node: NodeId) -> Option<&Brush>;

    /// Looks up a patch by node identity.
    fn patch(&self, node: NodeId) -> Option<&Patch>;
}

/// Shader (material) lookup.
pub trait ShaderSystem {
    /// Returns information about the named shader, or [`None`] if it is unknown or a
    /// default placeholder shader.
    ///
    /// Shader names are case-insensitive.
    fn shader(&self, name: &str) -> Option<ShaderInfo>;
}

/// Read-only access to game data files.
pub trait VirtualFileSystem {
    /// Reads an entire text file.
    fn read_text(&self, path: &str) -> Result<String, ReadError>;
}

/// Bundle of the host collaborators that the engine reads from.
#[derive(Clone, Copy)]
#[expect(clippy::exhaustive_structs)]
pub struct SceneAccess<'a> {
    #[allow(missing_docs)]
    pub graph: &'a dyn SceneGraph,
    #[allow(missing_docs)]
    pub shaders: &'a dyn ShaderSystem,
    #[allow(missing_docs)]
    pub files: &'a dyn VirtualFileSystem,
}

impl<'a> SceneAccess<'a> {
    #[allow(missing_docs)]
    pub fn new(
        graph: &'a dyn SceneGraph,
        shaders: &'a dyn ShaderSystem,
        files: &'a dyn VirtualFileSystem,
    ) -> Self {
        Self {
            graph,
            shaders,
            files,
        }
    }

    /// Looks up a shader, substituting [`ShaderInfo::default()`] for unknown shaders.
    pub(crate) fn shader_or_default(&self, name: &str) -> ShaderInfo {
        self.shaders.shader(name).unwrap_or_default()
    }
}

impl fmt::Debug for SceneAccess<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneAccess").finish_non_exhaustive()
    }
}
