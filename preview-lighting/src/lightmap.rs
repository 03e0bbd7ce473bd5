//! Cached lighting of surfaces: lightmap textures for brush faces, and vertex colors
//! for patches.

use alloc::vec::Vec;
use core::fmt;

use crate::bvh::Bvh;
use crate::evaluate::{evaluate, gather_affecting_lights};
use crate::light::LightSet;
use crate::math::{Aab, FreeCoordinate, FreePoint, FreeVector, Rgb, plane_basis};
use crate::options::PreviewOptions;
use crate::render::{LightmapImage, OverlayBackend, TexGenPlane, Texel, TextureId};
use crate::scene::{Brush, Face, Patch, SceneAccess, ShaderFlags};

/// Smallest extent, along either lightmap axis, of a face that gets a lightmap.
const MIN_FACE_EXTENT: FreeCoordinate = 1e-3;

/// Whether `face` of `brush` is lit: it participates and is neither sky nor no-draw.
pub(crate) fn receives_lighting(access: &SceneAccess<'_>, brush: &Brush, face: &Face) -> bool {
    brush.face_participates(face)
        && !access
            .shader_or_default(&face.shader)
            .flags
            .intersects(ShaderFlags::NODRAW | ShaderFlags::SKY)
}

/// Converts a light value to an opaque 8-bit color.
pub(crate) fn rgba(color: Rgb) -> Texel {
    let [r, g, b] = color.to_unorm8();
    [r, g, b, 255]
}

// -------------------------------------------------------------------------------------------------

/// The lightmap of one brush face.
#[derive(Clone, PartialEq)]
pub struct FaceLightmap {
    texture: Option<TextureId>,
    width: u32,
    height: u32,
    planes: [TexGenPlane; 2],
    rgb: Vec<u8>,
}

impl FaceLightmap {
    /// The texture holding this lightmap, or [`None`] if the backend has not been
    /// given it.
    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    /// Size in luxels.
    pub fn size(&self) -> [u32; 2] {
        [self.width, self.height]
    }

    /// Texture coordinate generation planes `[s, t]`, in the brush's local
    /// coordinates. Every point of the face maps into `0..=1`.
    pub fn planes(&self) -> [TexGenPlane; 2] {
        self.planes
    }

    /// The luxels, as tightly packed RGB8 rows with `t = 0` first.
    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }

    /// Mean color of all luxels.
    pub fn average_color(&self) -> Rgb {
        average_of(self.rgb.chunks_exact(3))
    }
}

#[mutants::skip]
impl fmt::Debug for FaceLightmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            texture,
            width,
            height,
            planes,
            rgb: _,
        } = self;
        f.debug_struct("FaceLightmap")
            .field("texture", texture)
            .field("size", &[width, height])
            .field("planes", planes)
            .finish_non_exhaustive()
    }
}

/// Mean of 8-bit color components; only the first three of each item are used.
pub(crate) fn average_of<'a>(items: impl ExactSizeIterator<Item = &'a [u8]>) -> Rgb {
    let count = items.len();
    if count == 0 {
        return Rgb::ZERO;
    }
    let sum = items.fold([0u64; 3], |mut sum, item| {
        for (s, &c) in sum.iter_mut().zip(item) {
            *s += u64::from(c);
        }
        sum
    });
    let channel = |s: u64| (s as f64 / count as f64 / 255.0) as f32;
    Rgb::new(channel(sum[0]), channel(sum[1]), channel(sum[2]))
}

/// Cached state of one brush.
#[derive(Debug)]
pub(crate) struct BrushCache {
    hash: u64,
    world_bounds: Option<Aab>,
    /// One slot per face, in face order, once the brush has been lit.
    faces: Vec<Option<FaceLightmap>>,
}

impl BrushCache {
    pub fn new(hash: u64, world_bounds: Option<Aab>) -> Self {
        Self {
            hash,
            world_bounds,
            faces: Vec::new(),
        }
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn world_bounds(&self) -> Option<Aab> {
        self.world_bounds
    }

    pub fn faces(&self) -> &[Option<FaceLightmap>] {
        &self.faces
    }

    /// Deletes every texture and forgets all lightmaps.
    pub fn release(&mut self, backend: &mut dyn OverlayBackend) {
        for lightmap in self.faces.drain(..).flatten() {
            release_lightmap(lightmap, backend);
        }
    }
}

fn release_lightmap(lightmap: FaceLightmap, backend: &mut dyn OverlayBackend) {
    if let Some(texture) = lightmap.texture {
        backend.delete_texture(texture);
    }
}

/// Cached state of one patch.
#[derive(Debug)]
pub(crate) struct PatchCache {
    hash: u64,
    world_bounds: Option<Aab>,
    /// Parallel to the patch's tessellation vertices, or empty.
    colors: Vec<Texel>,
}

impl PatchCache {
    pub fn new(hash: u64, world_bounds: Option<Aab>) -> Self {
        Self {
            hash,
            world_bounds,
            colors: Vec::new(),
        }
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn world_bounds(&self) -> Option<Aab> {
        self.world_bounds
    }

    pub fn colors(&self) -> &[Texel] {
        &self.colors
    }
}

// -------------------------------------------------------------------------------------------------

/// Everything that surface relighting reads besides the surface itself.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LightingInput<'a> {
    pub lights: &'a LightSet,
    pub occluders: Option<&'a Bvh>,
    pub directional_distance: FreeCoordinate,
    pub options: &'a PreviewOptions,
}

/// Placement of a lightmap's luxel grid on a face, in the brush's local coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct FaceLayout {
    origin: FreePoint,
    u_axis: FreeVector,
    v_axis: FreeVector,
    min: [FreeCoordinate; 2],
    step: [FreeCoordinate; 2],
    pub width: u32,
    pub height: u32,
    pub planes: [TexGenPlane; 2],
}

impl FaceLayout {
    /// Computes the layout of `face`, or returns [`None`] if it is degenerate.
    pub fn new(face: &Face, options: &PreviewOptions) -> Option<Self> {
        let origin = *face.winding.first()?;
        if face.winding.len() < 3 {
            return None;
        }
        let (u_axis, v_axis) = plane_basis(face.plane.normal)?;

        let mut min = [FreeCoordinate::INFINITY; 2];
        let mut max = [FreeCoordinate::NEG_INFINITY; 2];
        for &p in &face.winding {
            let d = p - origin;
            for (axis, coordinate) in [d.dot(u_axis), d.dot(v_axis)].into_iter().enumerate() {
                min[axis] = min[axis].min(coordinate);
                max[axis] = max[axis].max(coordinate);
            }
        }
        let range = [max[0] - min[0], max[1] - min[1]];
        // Negated so that NaN is rejected too.
        if !(range[0] > MIN_FACE_EXTENT && range[1] > MIN_FACE_EXTENT) {
            return None;
        }

        let resolution = |range: FreeCoordinate| -> u32 {
            let luxels = (range / options.luxel_size).ceil();
            (luxels.min(f64::from(u32::MAX)) as u32)
                .max(options.min_lightmap_resolution)
                .min(options.max_lightmap_resolution)
                .max(1)
        };
        let width = resolution(range[0]);
        let height = resolution(range[1]);

        let plane = |axis: FreeVector, min: FreeCoordinate, range: FreeCoordinate| TexGenPlane {
            axis: axis / range,
            offset: (-origin.to_vector().dot(axis) - min) / range,
        };

        Some(Self {
            origin,
            u_axis,
            v_axis,
            min,
            step: [range[0] / f64::from(width), range[1] / f64::from(height)],
            width,
            height,
            planes: [plane(u_axis, min[0], range[0]), plane(v_axis, min[1], range[1])],
        })
    }

    /// Local position of the center of luxel `(x, y)`.
    pub fn luxel_center(&self, x: u32, y: u32) -> FreePoint {
        let u = self.min[0] + (f64::from(x) + 0.5) * self.step[0];
        let v = self.min[1] + (f64::from(y) + 0.5) * self.step[1];
        self.origin + self.u_axis * u + self.v_axis * v
    }
}

/// Recomputes every face lightmap of `brush` and uploads them through `backend`,
/// reusing each face's previous texture.
pub(crate) fn build_brush_lightmaps(
    cache: &mut BrushCache,
    brush: &Brush,
    access: &SceneAccess<'_>,
    input: &LightingInput<'_>,
    backend: &mut dyn OverlayBackend,
) {
    let face_count = brush.faces.len();
    if !cache.faces.is_empty() && cache.faces.len() != face_count {
        log::warn!(
            "brush {node} has {face_count} faces but {slots} lightmap slots; \
            was a scene change not reported?",
            node = brush.node,
            slots = cache.faces.len(),
        );
    }
    if cache.faces.len() > face_count {
        for lightmap in cache.faces.drain(face_count..).flatten() {
            release_lightmap(lightmap, backend);
        }
    }
    cache.faces.resize_with(face_count, || None);

    let affecting = match cache.world_bounds {
        Some(bounds) => gather_affecting_lights(input.lights, bounds),
        None => Vec::new(),
    };
    let transform = &brush.local_to_world;
    let mut built = 0;

    for (face, slot) in brush.faces.iter().zip(cache.faces.iter_mut()) {
        let layout = if receives_lighting(access, brush, face) {
            FaceLayout::new(face, input.options)
        } else {
            None
        };
        let Some(layout) = layout else {
            if let Some(old) = slot.take() {
                release_lightmap(old, backend);
            }
            continue;
        };

        let normal = transform.transform_vector(face.plane.normal);
        let mut rgb = Vec::with_capacity(layout.width as usize * layout.height as usize * 3);
        for y in 0..layout.height {
            for x in 0..layout.width {
                let lit = evaluate(
                    transform.transform_point(layout.luxel_center(x, y)),
                    normal,
                    &affecting,
                    input.directional_distance,
                    input.occluders,
                );
                rgb.extend_from_slice(&lit.to_unorm8());
            }
        }

        let existing = slot.as_ref().and_then(|old| old.texture);
        let texture = backend.upload_lightmap(
            existing,
            LightmapImage {
                width: layout.width,
                height: layout.height,
                rgb: &rgb,
            },
        );
        *slot = Some(FaceLightmap {
            texture: Some(texture),
            width: layout.width,
            height: layout.height,
            planes: layout.planes,
            rgb,
        });
        built += 1;
    }

    log::trace!(
        "relit brush {node}: {built} of {face_count} faces, {lights} lights",
        node = brush.node,
        lights = affecting.len(),
    );
}

/// Recomputes the vertex colors of `patch`.
pub(crate) fn build_patch_colors(cache: &mut PatchCache, patch: &Patch, input: &LightingInput<'_>) {
    cache.colors.clear();
    if !patch.participates() || patch.tessellation.vertices.is_empty() {
        log::trace!("cleared patch {node}", node = patch.node);
        return;
    }

    let affecting = match cache.world_bounds {
        Some(bounds) => gather_affecting_lights(input.lights, bounds),
        None => Vec::new(),
    };
    let transform = &patch.local_to_world;
    cache
        .colors
        .extend(patch.tessellation.vertices.iter().map(|vertex| {
            rgba(evaluate(
                transform.transform_point(vertex.position),
                transform.transform_vector(vertex.normal),
                &affecting,
                input.directional_distance,
                input.occluders,
            ))
        }));

    log::trace!(
        "relit patch {node}: {count} vertices, {lights} lights",
        node = patch.node,
        count = cache.colors.len(),
        lights = affecting.len(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::AMBIENT;
    use crate::light::{Falloff, LightEntry, LightKey};
    use crate::render::RecordingBackend;
    use crate::scene::memory::MemoryScene;
    use crate::scene::{NodeId, PatchTessellation, PatchVertex, ShaderInfo};
    use euclid::{point3, vec3};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const AMBIENT_BYTE: u8 = 30;

    fn floor_brush() -> Brush {
        Brush::from_aab(NodeId(1), Aab::new(0.0, 64.0, 0.0, 64.0, -8.0, 0.0), "floor")
    }

    fn sun_lights() -> LightSet {
        let mut lights = LightSet::new();
        lights.insert(
            LightKey::Entity(NodeId(100)),
            LightEntry::directional(
                vec3(0.0, 0.0, -1.0),
                Rgb::new(0.5, 0.5, 0.5),
                Aab::from_center_half_extent(FreePoint::origin(), 8192.0),
            ),
        );
        lights
    }

    fn input<'a>(lights: &'a LightSet, options: &'a PreviewOptions) -> LightingInput<'a> {
        LightingInput {
            lights,
            occluders: None,
            directional_distance: 4096.0,
            options,
        }
    }

    #[test]
    fn layout_of_square_face() {
        let brush = floor_brush();
        let top = &brush.faces[5];
        let layout = FaceLayout::new(top, &PreviewOptions::default()).unwrap();
        assert_eq!((layout.width, layout.height), (4, 4));

        // Every vertex of the face lies within the texture.
        for &p in &top.winding {
            for plane in layout.planes {
                let st = plane.apply(p);
                assert!((-1e-9..=1.0 + 1e-9).contains(&st), "{p:?} -> {st}");
            }
        }
        // Luxel centers map to texel centers.
        for (x, y) in [(0, 0), (3, 1), (2, 3)] {
            let center = layout.luxel_center(x, y);
            assert!((center.z - 0.0).abs() < 1e-9);
            let [s, t] = layout.planes.map(|plane| plane.apply(center));
            let expected = [(f64::from(x) + 0.5) / 4.0, (f64::from(y) + 0.5) / 4.0];
            assert!((s - expected[0]).abs() < 1e-9 && (t - expected[1]).abs() < 1e-9);
        }
    }

    #[rstest]
    #[case(24.0, 1000.0, 42)]
    #[case(24.0, 10.0, 4)]
    #[case(24.0, 100_000.0, 64)]
    #[case(1.0, 3.0, 4)]
    fn layout_resolution(#[case] luxel_size: f64, #[case] extent: f64, #[case] expected: u32) {
        let options = PreviewOptions {
            luxel_size,
            ..PreviewOptions::default()
        };
        let brush = Brush::from_aab(NodeId(1), Aab::new(0.0, extent, 0.0, 1.0, 0.0, 1.0), "x");
        let layout = FaceLayout::new(&brush.faces[5], &options).unwrap();
        assert_eq!(layout.width, expected);
    }

    #[test]
    fn layout_of_degenerate_faces() {
        let options = PreviewOptions::default();
        let sliver = Face::new(
            "x",
            vec![point3(0.0, 0.0, 0.0), point3(10.0, 0.0, 0.0), point3(10.0, 0.0001, 0.0)],
        );
        assert_eq!(FaceLayout::new(&sliver, &options), None);
        let line = Face::new(
            "x",
            vec![point3(0.0, 0.0, 0.0), point3(1.0, 0.0, 0.0), point3(2.0, 0.0, 0.0)],
        );
        assert_eq!(FaceLayout::new(&line, &options), None);
        assert_eq!(FaceLayout::new(&Face::new("x", vec![]), &options), None);
    }

    #[test]
    fn brush_lightmaps_follow_light() {
        let brush = floor_brush();
        let scene = MemoryScene::new().with_brush(brush.clone());
        let lights = sun_lights();
        let options = PreviewOptions::default();
        let mut backend = RecordingBackend::new();
        let mut cache = BrushCache::new(0, brush.world_bounds());

        build_brush_lightmaps(&mut cache, &brush, &scene.access(), &input(&lights, &options), &mut backend);

        assert_eq!(cache.faces().len(), 6);
        assert!(cache.faces().iter().all(Option::is_some));
        assert_eq!(backend.live_texture_count(), 6);
        let top = cache.faces()[5].as_ref().unwrap();
        let bottom = cache.faces()[4].as_ref().unwrap();
        let lit_byte = ((AMBIENT + 0.5) * 255.0) as u8;
        assert!(top.rgb().iter().all(|&c| c == lit_byte), "{:?}", top.rgb());
        assert!(bottom.rgb().iter().all(|&c| c == AMBIENT_BYTE));
        assert_eq!(
            backend.texture(top.texture().unwrap()).unwrap().rgb,
            top.rgb().to_vec()
        );
        assert!(top.average_color().luminance() > AMBIENT);
    }

    #[test]
    fn rebuild_reuses_textures() {
        let brush = floor_brush();
        let scene = MemoryScene::new().with_brush(brush.clone());
        let lights = sun_lights();
        let options = PreviewOptions::default();
        let mut backend = RecordingBackend::new();
        let mut cache = BrushCache::new(0, brush.world_bounds());
        let input = input(&lights, &options);

        build_brush_lightmaps(&mut cache, &brush, &scene.access(), &input, &mut backend);
        let first: Vec<_> = cache.faces().iter().map(|f| f.as_ref().unwrap().texture()).collect();
        build_brush_lightmaps(&mut cache, &brush, &scene.access(), &input, &mut backend);
        let second: Vec<_> = cache.faces().iter().map(|f| f.as_ref().unwrap().texture()).collect();

        assert_eq!(first, second);
        assert_eq!(backend.upload_count(), 12);
        assert_eq!(backend.live_texture_count(), 6);

        cache.release(&mut backend);
        assert!(cache.faces().is_empty());
        assert_eq!(backend.live_texture_count(), 0);
    }

    #[test]
    fn non_receiving_faces_have_empty_slots() {
        let mut brush = floor_brush();
        brush.faces[0].shader = "nodraw".into();
        brush.faces[1].shader = "sky".into();
        brush.faces[2].filtered = true;
        let scene = MemoryScene::new()
            .with_brush(brush.clone())
            .with_shader("nodraw", ShaderInfo::new(ShaderFlags::NODRAW))
            .with_shader("sky", ShaderInfo::new(ShaderFlags::SKY));
        let lights = sun_lights();
        let options = PreviewOptions::default();
        let mut backend = RecordingBackend::new();
        let mut cache = BrushCache::new(0, brush.world_bounds());

        build_brush_lightmaps(&mut cache, &brush, &scene.access(), &input(&lights, &options), &mut backend);

        let present: Vec<bool> = cache.faces().iter().map(Option::is_some).collect();
        assert_eq!(present, vec![false, false, false, true, true, true]);
        assert_eq!(backend.live_texture_count(), 3);
    }

    #[test]
    fn face_that_stops_receiving_releases_texture() {
        let mut brush = floor_brush();
        let scene = MemoryScene::new().with_brush(brush.clone());
        let lights = sun_lights();
        let options = PreviewOptions::default();
        let mut backend = RecordingBackend::new();
        let mut cache = BrushCache::new(0, brush.world_bounds());
        let input = input(&lights, &options);

        build_brush_lightmaps(&mut cache, &brush, &scene.access(), &input, &mut backend);
        brush.faces[5].filtered = true;
        build_brush_lightmaps(&mut cache, &brush, &scene.access(), &input, &mut backend);

        assert!(cache.faces()[5].is_none());
        assert_eq!(backend.live_texture_count(), 5);
        assert_eq!(backend.delete_count(), 1);
    }

    #[test]
    fn shadowed_lightmap() {
        let floor = floor_brush();
        let roof = Brush::from_aab(NodeId(2), Aab::new(-100.0, 200.0, -100.0, 200.0, 50.0, 60.0), "roof");
        let bvh = Bvh::new(
            roof.faces
                .iter()
                .flat_map(|face| {
                    let w = &face.winding;
                    [[w[0], w[1], w[2]], [w[0], w[2], w[3]]]
                })
                .collect(),
        );
        let scene = MemoryScene::new().with_brush(floor.clone()).with_brush(roof);
        let lights = sun_lights();
        let options = PreviewOptions::default();
        let mut backend = RecordingBackend::new();
        let mut cache = BrushCache::new(0, floor.world_bounds());
        let input = LightingInput {
            occluders: Some(&bvh),
            ..input(&lights, &options)
        };

        build_brush_lightmaps(&mut cache, &floor, &scene.access(), &input, &mut backend);

        let top = cache.faces()[5].as_ref().unwrap();
        assert!(top.rgb().iter().all(|&c| c == AMBIENT_BYTE));
    }

    fn patch() -> Patch {
        let vertices = (0..3)
            .flat_map(|y| {
                (0..2).map(move |x| PatchVertex {
                    position: point3(f64::from(x) * 16.0, f64::from(y) * 16.0, 0.0),
                    normal: vec3(0.0, 0.0, 1.0),
                })
            })
            .collect();
        Patch::new(NodeId(5), "curve", PatchTessellation::from_grid(2, 3, vertices).unwrap())
    }

    #[test]
    fn patch_colors() {
        let patch = patch();
        let mut lights = LightSet::new();
        lights.insert(
            LightKey::Entity(NodeId(9)),
            LightEntry::point(point3(0.0, 0.0, 10.0), Rgb::ONE, 1000.0, Falloff::Linear),
        );
        let options = PreviewOptions::default();
        let mut cache = PatchCache::new(0, patch.world_bounds());

        build_patch_colors(&mut cache, &patch, &input(&lights, &options));

        assert_eq!(cache.colors().len(), 6);
        assert!(cache.colors().iter().all(|c| c[3] == 255 && c[0] > AMBIENT_BYTE));
        // The vertex nearest the light is brightest.
        assert!(cache.colors()[0][0] > cache.colors()[5][0]);
    }

    #[test]
    fn hidden_patch_has_no_colors() {
        let mut patch = patch();
        let lights = sun_lights();
        let options = PreviewOptions::default();
        let mut cache = PatchCache::new(0, patch.world_bounds());
        build_patch_colors(&mut cache, &patch, &input(&lights, &options));
        assert_eq!(cache.colors().len(), 6);

        patch.visible = false;
        build_patch_colors(&mut cache, &patch, &input(&lights, &options));
        assert!(cache.colors().is_empty());
    }

    #[test]
    fn average() {
        let data: [&[u8]; 2] = [&[0, 255, 10, 255], &[255, 255, 20, 255]];
        let average = average_of(data.into_iter());
        assert_eq!(average.red(), 0.5);
        assert_eq!(average.green(), 1.0);
        assert_eq!(average_of(core::iter::empty()), Rgb::ZERO);
    }
}
