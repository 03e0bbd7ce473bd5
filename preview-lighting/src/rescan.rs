//! Rescanning the scene: extracting every light, hashing every surface, and working
//! out which cached results may be stale.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use hashbrown::{HashMap as HbHashMap, HashSet as HbHashSet};
use manyfmt::Refmt as _;

use crate::hash::{hash_brush, hash_patch, str_digest};
use crate::light::entity::{Targets, entity_light, is_light_entity, register_target};
use crate::light::shader::ShaderCache;
use crate::light::sky::sky_light_entries;
use crate::light::sun::{WORLDSPAWN_SEED, shader_sun_seed, sun_entries, worldspawn_sun};
use crate::light::surface::{face_area_centroid, patch_area_centroid, surface_light};
use crate::light::{LightKey, LightSet, ShaderLighting};
use crate::lightmap::{BrushCache, PatchCache};
use crate::math::{Aab, FreePoint, Rgb};
use crate::options::GameConvention;
use crate::render::OverlayBackend;
use crate::scene::{Entity, NodeId, SceneAccess};
use crate::util::ConciseDebug;


/// Half-extent of the region affected by directional lights when the map is empty.
const DEFAULT_SUN_HALF_EXTENT: f64 = 8192.0;

/// The state carried over from the previous rescan.
#[derive(Debug, Default)]
pub(crate) struct Previous {
    pub lights: LightSet,
    pub brushes: HbHashMap<NodeId, BrushCache>,
    pub patches: HbHashMap<NodeId, PatchCache>,
}

/// Everything found by one rescan.
#[derive(Debug, Default)]
pub(crate) struct RescanResult {
    pub lights: LightSet,
    pub brushes: HbHashMap<NodeId, BrushCache>,
    pub patches: HbHashMap<NodeId, PatchCache>,
    /// Brushes and patches in traversal order.
    brush_order: Vec<NodeId>,
    patch_order: Vec<NodeId>,
    dirty_brushes: HbHashSet<NodeId>,
    dirty_patches: HbHashSet<NodeId>,
    /// Regions in which some light appeared, disappeared, or changed.
    pub changed_light_influences: Vec<Aab>,
    /// Old and new bounds of every surface that appeared, disappeared, or changed.
    pub changed_occluders: Vec<Aab>,
    /// Whether any surface appeared, disappeared, or changed.
    pub geometry_dirty: bool,
    /// Bounds of all brushes and patches, visible or not.
    pub map_bounds: Option<Aab>,
}

impl RescanResult {
    /// Marks as dirty every surface within a changed light's influence, and every
    /// surface within the influence of a light whose influence contains a changed
    /// occluder (since that occluder may cast or lift a shadow anywhere the light
    /// reaches).
    pub fn propagate_dirty(&mut self) {
        let mut regions = self.changed_light_influences.clone();
        regions.extend(
            self.lights
                .values()
                .map(|entry| entry.influence)
                .filter(|&influence| {
                    self.changed_occluders
                        .iter()
                        .any(|occluder| occluder.intersects(influence))
                }),
        );
        if regions.is_empty() {
            return;
        }
        let touched = |bounds: Option<Aab>| {
            bounds.is_some_and(|bounds| regions.iter().any(|region| region.intersects(bounds)))
        };
        for (&node, cache) in &self.brushes {
            if touched(cache.world_bounds()) {
                self.dirty_brushes.insert(node);
            }
        }
        for (&node, cache) in &self.patches {
            if touched(cache.world_bounds()) {
                self.dirty_patches.insert(node);
            }
        }
    }

    /// Marks every surface dirty, as when lightmap layout parameters changed.
    pub fn mark_all_dirty(&mut self) {
        self.dirty_brushes.extend(self.brush_order.iter().copied());
        self.dirty_patches.extend(self.patch_order.iter().copied());
    }

    /// Dirty brushes, in traversal order.
    pub fn dirty_brushes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.brush_order
            .iter()
            .copied()
            .filter(|node| self.dirty_brushes.contains(node))
    }

    /// Dirty patches, in traversal order.
    pub fn dirty_patches(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.patch_order
            .iter()
            .copied()
            .filter(|node| self.dirty_patches.contains(node))
    }

    fn include_bounds(&mut self, bounds: Option<Aab>) {
        if let Some(bounds) = bounds {
            self.map_bounds = Some(match self.map_bounds {
                Some(map_bounds) => map_bounds.union(bounds),
                None => bounds,
            });
        }
    }
}

/// A sky shader found on some surface, whose suns and sky lights apply to the whole
/// map.
struct SkyShader {
    digest: u64,
    lighting: Arc<ShaderLighting>,
    average_color: Rgb,
}

/// Scans the whole scene, reusing the caches in `previous` for surfaces whose content
/// hash is unchanged.
///
/// Textures of stale and removed brushes are released through `backend`. The
/// returned dirty sets only reflect changed hashes until
/// [`RescanResult::propagate_dirty()`] is called.
pub(crate) fn rescan(
    access: &SceneAccess<'_>,
    shaders: &mut ShaderCache,
    game: GameConvention,
    mut previous: Previous,
    backend: &mut dyn OverlayBackend,
) -> RescanResult {
    let mut out = RescanResult::default();

    let mut targets = Targets::new();
    let mut worldspawn: Option<Entity> = None;
    access.graph.for_each_entity(&mut |entity| {
        if entity.is_worldspawn() {
            worldspawn = Some(entity.clone());
        }
        register_target(&mut targets, entity);
    });
    let suppress_shader_suns = worldspawn
        .as_ref()
        .is_some_and(|entity| entity.truthy("_noshadersun"));

    let mut sky_shaders: Vec<SkyShader> = Vec::new();
    let mut seen_sky: HbHashSet<String> = HbHashSet::new();
    let mut note_sky = |name: &str, lighting: &Arc<ShaderLighting>| {
        if seen_sky.contains(name) {
            return;
        }
        seen_sky.insert(name.into());
        sky_shaders.push(SkyShader {
            digest: str_digest(name),
            lighting: Arc::clone(lighting),
            average_color: access.shader_or_default(name).average_color,
        });
    };

    access.graph.for_each_brush(&mut |brush| {
        let node = brush.node;
        let bounds = brush.world_bounds();
        out.include_bounds(bounds);

        let hash = hash_brush(brush, access.shaders);
        let cache = match previous.brushes.remove(&node) {
            Some(old) if old.hash() == hash => old,
            old => {
                out.geometry_dirty = true;
                out.dirty_brushes.insert(node);
                if let Some(mut old) = old {
                    out.changed_occluders.extend(old.world_bounds());
                    old.release(backend);
                }
                out.changed_occluders.extend(bounds);
                BrushCache::new(hash, bounds)
            }
        };
        out.brushes.insert(node, cache);
        out.brush_order.push(node);

        for (index, face) in brush.faces.iter().enumerate() {
            if !brush.face_participates(face) {
                continue;
            }
            let lighting = shaders.get(&face.shader, access);
            let info = access.shader_or_default(&face.shader);
            if lighting.behaves_like_sky(info.flags) {
                note_sky(&face.shader, &lighting);
                continue;
            }
            if lighting.surface_light.is_none() {
                continue;
            }
            let entry = face_area_centroid(face, &brush.local_to_world)
                .and_then(|shape| surface_light(shape, &lighting, info.average_color));
            if let Some(entry) = entry {
                let face = u32::try_from(index).unwrap_or(u32::MAX);
                out.lights.insert(LightKey::SurfaceFace { node, face }, entry);
            }
        }
    });

    access.graph.for_each_patch(&mut |patch| {
        let node = patch.node;
        let bounds = patch.world_bounds();
        out.include_bounds(bounds);

        let hash = hash_patch(patch, access.shaders);
        let cache = match previous.patches.remove(&node) {
            Some(old) if old.hash() == hash => old,
            old => {
                out.geometry_dirty = true;
                out.dirty_patches.insert(node);
                if let Some(old) = old {
                    out.changed_occluders.extend(old.world_bounds());
                }
                out.changed_occluders.extend(bounds);
                PatchCache::new(hash, bounds)
            }
        };
        out.patches.insert(node, cache);
        out.patch_order.push(node);

        if !patch.participates() {
            return;
        }
        let lighting = shaders.get(&patch.shader, access);
        let info = access.shader_or_default(&patch.shader);
        if lighting.behaves_like_sky(info.flags) {
            note_sky(&patch.shader, &lighting);
            return;
        }
        if lighting.surface_light.is_none() {
            return;
        }
        if let Some(entry) = patch_area_centroid(patch)
            .and_then(|shape| surface_light(shape, &lighting, info.average_color))
        {
            out.lights.insert(LightKey::SurfacePatch(node), entry);
        }
    });

    for (_, mut old) in previous.brushes.drain() {
        out.geometry_dirty = true;
        out.changed_occluders.extend(old.world_bounds());
        old.release(backend);
    }
    for (_, old) in previous.patches.drain() {
        out.geometry_dirty = true;
        out.changed_occluders.extend(old.world_bounds());
    }

    let map_center = out.map_bounds.map_or(FreePoint::origin(), |b| b.center());
    let sun_influence = out.map_bounds.unwrap_or(Aab::from_center_half_extent(
        FreePoint::origin(),
        DEFAULT_SUN_HALF_EXTENT,
    ));

    for sky in &sky_shaders {
        let color = sky.lighting.emitted_color(sky.average_color);
        for (index, sky_light) in sky.lighting.sky_lights.iter().enumerate() {
            if sky_light.value <= 0.0 {
                continue;
            }
            out.lights.extend(sky_light_entries(
                sky.digest,
                index,
                sky_light,
                color,
                sun_influence,
            ));
        }
    }

    let world_sun = worldspawn
        .as_ref()
        .and_then(|entity| Some((entity.node, worldspawn_sun(entity, &targets, map_center)?)));
    if let Some((node, sun)) = world_sun {
        out.lights.extend(sun_entries(&sun, WORLDSPAWN_SEED, sun_influence, |sample| {
            LightKey::WorldspawnSun { node, sample }
        }));
    } else if !suppress_shader_suns {
        for sky in &sky_shaders {
            for (sun_index, sun) in sky.lighting.suns.iter().enumerate() {
                let shader = sky.digest;
                out.lights.extend(sun_entries(
                    sun,
                    shader_sun_seed(shader, sun_index),
                    sun_influence,
                    |sample| LightKey::ShaderSun {
                        shader,
                        index: LightKey::sample_index(sun_index, sample as usize),
                    },
                ));
            }
        }
    }

    access.graph.for_each_entity(&mut |entity| {
        if !is_light_entity(entity) {
            return;
        }
        if let Some(entry) = entity_light(entity, &targets, game, sun_influence) {
            out.lights.insert(LightKey::Entity(entity.node), entry);
        }
    });

    for (key, entry) in &out.lights {
        match previous.lights.remove(key) {
            None => out.changed_light_influences.push(entry.influence),
            Some(old) if old.hash != entry.hash => out
                .changed_light_influences
                .push(old.influence.union(entry.influence)),
            Some(_) => {}
        }
    }
    out.changed_light_influences
        .extend(previous.lights.values().map(|entry| entry.influence));

    log::debug!(
        "rescanned {brushes} brushes and {patches} patches: {lights} lights, \
        {changed_lights} changed light regions, {changed_occluders} changed occluders, \
        {sky} sky shaders",
        brushes = out.brushes.len(),
        patches = out.patches.len(),
        lights = out.lights.len(),
        changed_lights = out.changed_light_influences.len(),
        changed_occluders = out.changed_occluders.len(),
        sky = sky_shaders.len(),
    );
    if let Some(bounds) = out.map_bounds {
        log::trace!("map bounds {}", bounds.refmt(&ConciseDebug));
    }

    out
}
