//! Drawing the lighting overlay through a host-provided [`OverlayBackend`].
//!
//! The overlay is multiplied over the already-rendered scene. In the baked model,
//! brush faces are drawn with their cached lightmap textures and patches with their
//! cached vertex colors. In the fast model, colors are computed every frame from the
//! current light list, without shadows.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap as HbHashMap;

use crate::evaluate::{evaluate, gather_affecting_lights};
use crate::light::LightSet;
use crate::lightmap::{BrushCache, PatchCache, receives_lighting, rgba};
use crate::math::{FreeCoordinate, FreePoint, FreeVector, Matrix4};
use crate::scene::{NodeId, PatchTessellation, SceneAccess};

/// Color data of vertex-colored overlay geometry: sRGB-agnostic `[R, G, B, A]`, where
/// alpha is always 255.
pub type Texel = [u8; 4];

/// Handle of a lightmap texture owned by an [`OverlayBackend`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[expect(clippy::exhaustive_structs)]
pub struct TextureId(pub u64);

/// Object-linear texture coordinate generation: a vertex at local position `p` gets
/// the coordinate `axis · p + offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[expect(clippy::exhaustive_structs)]
pub struct TexGenPlane {
    #[allow(missing_docs)]
    pub axis: FreeVector,
    #[allow(missing_docs)]
    pub offset: FreeCoordinate,
}

impl TexGenPlane {
    /// Texture coordinate of the point `p`.
    #[inline]
    pub fn apply(&self, p: FreePoint) -> FreeCoordinate {
        self.axis.dot(p.to_vector()) + self.offset
    }

    /// The plane as `[a, b, c, d]` coefficients, as fixed-function texgen expects.
    pub fn to_array(&self) -> [FreeCoordinate; 4] {
        [self.axis.x, self.axis.y, self.axis.z, self.offset]
    }
}

/// An RGB8 image to upload, in tightly packed rows, bottom row (`t = 0`) first.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct LightmapImage<'a> {
    #[allow(missing_docs)]
    pub width: u32,
    #[allow(missing_docs)]
    pub height: u32,
    /// `width * height * 3` bytes.
    pub rgb: &'a [u8],
}

/// The graphics API the overlay is drawn with.
///
/// Every method must be called with the host's graphics context current. Geometry is
/// given in the local coordinates of its node, together with the node's local-to-world
/// matrix.
pub trait OverlayBackend {
    /// Uploads a lightmap image, replacing the contents of `existing` if given, and
    /// returns the handle now holding the image.
    ///
    /// Textures should be sampled with linear filtering and clamped at the edges.
    fn upload_lightmap(&mut self, existing: Option<TextureId>, image: LightmapImage<'_>)
    -> TextureId;

    /// Releases a texture previously returned by [`Self::upload_lightmap()`].
    fn delete_texture(&mut self, texture: TextureId);

    /// Starts the overlay pass: depth-tested without depth writes, blended so that the
    /// destination color is multiplied by the source color.
    fn begin_overlay(&mut self);

    /// Ends the overlay pass and restores ordinary blending.
    fn end_overlay(&mut self);

    /// Draws a convex polygon textured with `texture`, generating texture coordinates
    /// from the `[s, t]` planes.
    fn draw_lightmapped_polygon(
        &mut self,
        local_to_world: &Matrix4,
        texture: TextureId,
        planes: [TexGenPlane; 2],
        polygon: &[FreePoint],
    );

    /// Draws a convex polygon with one color per vertex.
    fn draw_colored_polygon(&mut self, local_to_world: &Matrix4, polygon: &[FreePoint], colors: &[Texel]);

    /// Draws each quad strip of `mesh`, with `colors` parallel to its vertices.
    fn draw_colored_strips(
        &mut self,
        local_to_world: &Matrix4,
        mesh: &PatchTessellation,
        colors: &[Texel],
    );
}

// -------------------------------------------------------------------------------------------------

/// Draws the cached lightmaps and vertex colors.
///
/// Faces without a lightmap (sky, no-draw, or not yet built) and patches whose colors
/// do not match their current mesh are not drawn, leaving the scene unaffected there.
pub(crate) fn render_baked(
    access: &SceneAccess<'_>,
    brushes: &HbHashMap<NodeId, BrushCache>,
    patches: &HbHashMap<NodeId, PatchCache>,
    backend: &mut dyn OverlayBackend,
) {
    backend.begin_overlay();

    access.graph.for_each_brush(&mut |brush| {
        let Some(cache) = brushes.get(&brush.node) else {
            return;
        };
        if !brush.participates() {
            return;
        }
        for (face, slot) in brush.faces.iter().zip(cache.faces()) {
            let Some(lightmap) = slot else {
                continue;
            };
            let Some(texture) = lightmap.texture() else {
                continue;
            };
            if face.winding.len() < 3 || !receives_lighting(access, brush, face) {
                continue;
            }
            backend.draw_lightmapped_polygon(
                &brush.local_to_world,
                texture,
                lightmap.planes(),
                &face.winding,
            );
        }
    });

    access.graph.for_each_patch(&mut |patch| {
        let Some(cache) = patches.get(&patch.node) else {
            return;
        };
        let colors = cache.colors();
        if !patch.participates()
            || colors.is_empty()
            || colors.len() != patch.tessellation.vertices.len()
        {
            return;
        }
        backend.draw_colored_strips(&patch.local_to_world, &patch.tessellation, colors);
    });

    backend.end_overlay();
}

/// Draws unshadowed lighting computed directly from `lights` and the live scene,
/// ignoring cached results, so nodes added or moved since the last rescan are drawn
/// where they are now.
pub(crate) fn render_fast(
    access: &SceneAccess<'_>,
    lights: &LightSet,
    directional_distance: FreeCoordinate,
    backend: &mut dyn OverlayBackend,
) {
    backend.begin_overlay();
    let mut colors: Vec<Texel> = Vec::new();

    access.graph.for_each_brush(&mut |brush| {
        if !brush.participates() {
            return;
        }
        let Some(bounds) = brush.world_bounds() else {
            return;
        };
        let affecting = gather_affecting_lights(lights, bounds);
        let transform = &brush.local_to_world;
        for face in &brush.faces {
            if face.winding.len() < 3 || !receives_lighting(access, brush, face) {
                continue;
            }
            let normal = transform.transform_vector(face.plane.normal);
            colors.clear();
            colors.extend(face.winding.iter().map(|&p| {
                rgba(evaluate(
                    transform.transform_point(p),
                    normal,
                    &affecting,
                    directional_distance,
                    None,
                ))
            }));
            backend.draw_colored_polygon(transform, &face.winding, &colors);
        }
    });

    access.graph.for_each_patch(&mut |patch| {
        if !patch.participates() {
            return;
        }
        let Some(bounds) = patch.world_bounds() else {
            return;
        };
        let affecting = gather_affecting_lights(lights, bounds);
        let transform = &patch.local_to_world;
        colors.clear();
        colors.extend(patch.tessellation.vertices.iter().map(|vertex| {
            rgba(evaluate(
                transform.transform_point(vertex.position),
                transform.transform_vector(vertex.normal),
                &affecting,
                directional_distance,
                None,
            ))
        }));
        backend.draw_colored_strips(transform, &patch.tessellation, &colors);
    });

    backend.end_overlay();
}

// -------------------------------------------------------------------------------------------------

/// An [`OverlayBackend`] which keeps uploaded images in memory and records draw calls
/// instead of drawing; for tests and offline tools.
#[derive(Default)]
pub struct RecordingBackend {
    textures: BTreeMap<TextureId, RecordedTexture>,
    next_id: u64,
    upload_count: usize,
    delete_count: usize,
    in_pass: bool,
    commands: Vec<DrawCommand>,
}

/// A texture held by a [`RecordingBackend`].
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct RecordedTexture {
    #[allow(missing_docs)]
    pub width: u32,
    #[allow(missing_docs)]
    pub height: u32,
    /// Tightly packed RGB8 rows.
    pub rgb: Vec<u8>,
}

/// A draw call recorded by [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum DrawCommand {
    #[allow(missing_docs)]
    BeginOverlay,
    #[allow(missing_docs)]
    EndOverlay,
    #[allow(missing_docs)]
    LightmappedPolygon {
        local_to_world: Matrix4,
        texture: TextureId,
        planes: [TexGenPlane; 2],
        vertex_count: usize,
    },
    #[allow(missing_docs)]
    ColoredPolygon {
        local_to_world: Matrix4,
        colors: Vec<Texel>,
    },
    #[allow(missing_docs)]
    ColoredStrips {
        local_to_world: Matrix4,
        strip_count: usize,
        colors: Vec<Texel>,
    },
}

impl RecordingBackend {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the texture with the given handle, if it has not been deleted.
    pub fn texture(&self, id: TextureId) -> Option<&RecordedTexture> {
        self.textures.get(&id)
    }

    /// Number of textures currently allocated.
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Number of [`OverlayBackend::upload_lightmap()`] calls so far.
    pub fn upload_count(&self) -> usize {
        self.upload_count
    }

    /// Number of [`OverlayBackend::delete_texture()`] calls so far.
    pub fn delete_count(&self) -> usize {
        self.delete_count
    }

    /// Draw calls recorded since the last [`Self::take_commands()`].
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Removes and returns the recorded draw calls.
    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        core::mem::take(&mut self.commands)
    }

    #[track_caller]
    fn assert_in_pass(&self) {
        assert!(self.in_pass, "draw call outside of overlay pass");
    }
}

impl OverlayBackend for RecordingBackend {
    fn upload_lightmap(
        &mut self,
        existing: Option<TextureId>,
        image: LightmapImage<'_>,
    ) -> TextureId {
        assert_eq!(
            image.rgb.len(),
            image.width as usize * image.height as usize * 3,
            "lightmap data did not match resolution"
        );
        self.upload_count += 1;
        let id = match existing {
            Some(id) if self.textures.contains_key(&id) => id,
            _ => {
                self.next_id += 1;
                TextureId(self.next_id)
            }
        };
        self.textures.insert(
            id,
            RecordedTexture {
                width: image.width,
                height: image.height,
                rgb: image.rgb.to_vec(),
            },
        );
        id
    }

    fn delete_texture(&mut self, texture: TextureId) {
        let removed = self.textures.remove(&texture);
        assert!(removed.is_some(), "deleted unknown texture {texture:?}");
        self.delete_count += 1;
    }

    fn begin_overlay(&mut self) {
        assert!(!self.in_pass, "overlay pass begun twice");
        self.in_pass = true;
        self.commands.push(DrawCommand::BeginOverlay);
    }

    fn end_overlay(&mut self) {
        self.assert_in_pass();
        self.in_pass = false;
        self.commands.push(DrawCommand::EndOverlay);
    }

    fn draw_lightmapped_polygon(
        &mut self,
        local_to_world: &Matrix4,
        texture: TextureId,
        planes: [TexGenPlane; 2],
        polygon: &[FreePoint],
    ) {
        self.assert_in_pass();
        assert!(
            self.textures.contains_key(&texture),
            "drew with unknown texture {texture:?}"
        );
        self.commands.push(DrawCommand::LightmappedPolygon {
            local_to_world: *local_to_world,
            texture,
            planes,
            vertex_count: polygon.len(),
        });
    }

    fn draw_colored_polygon(&mut self, local_to_world: &Matrix4, polygon: &[FreePoint], colors: &[Texel]) {
        self.assert_in_pass();
        assert_eq!(polygon.len(), colors.len());
        self.commands.push(DrawCommand::ColoredPolygon {
            local_to_world: *local_to_world,
            colors: colors.to_vec(),
        });
    }

    fn draw_colored_strips(
        &mut self,
        local_to_world: &Matrix4,
        mesh: &PatchTessellation,
        colors: &[Texel],
    ) {
        self.assert_in_pass();
        assert_eq!(mesh.vertices.len(), colors.len());
        self.commands.push(DrawCommand::ColoredStrips {
            local_to_world: *local_to_world,
            strip_count: mesh.strips().count(),
            colors: colors.to_vec(),
        });
    }
}

impl fmt::Debug for RecordingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            textures,
            next_id: _,
            upload_count,
            delete_count,
            in_pass,
            commands,
        } = self;
        f.debug_struct("RecordingBackend")
            .field("textures", &textures.keys())
            .field("upload_count", upload_count)
            .field("delete_count", delete_count)
            .field("in_pass", in_pass)
            .field("commands", &commands.len())
            .finish_non_exhaustive()
    }
}
