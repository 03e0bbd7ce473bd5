//! [`PreviewLighting`], the context object which owns all preview lighting state.

use alloc::vec::Vec;
use core::{fmt, mem};

use hashbrown::HashMap as HbHashMap;
use manyfmt::Refmt as _;

use crate::bvh::{Bvh, occluder_triangles};
use crate::evaluate::directional_distance;
use crate::light::LightSet;
use crate::light::shader::ShaderCache;
use crate::lightmap::{
    BrushCache, FaceLightmap, LightingInput, PatchCache, build_brush_lightmaps,
    build_patch_colors,
};
use crate::math::Aab;
use crate::options::{PreviewModel, PreviewOptions};
use crate::queue::WorkQueue;
use crate::render::{OverlayBackend, Texel, render_baked, render_fast};
use crate::rescan::{self, Previous};
use crate::scene::{NodeId, SceneAccess};
use crate::time::{Deadline, Instant, TimeStats};
use crate::util::ConciseDebug;


/// Preview lighting state for one scene.
///
/// The host owns this object and drives it from its main loop:
///
/// * Call [`mark_dirty()`](Self::mark_dirty) whenever anything in the scene changed.
///   This is cheap; the work happens during the next update.
/// * Call [`update()`](Self::update) once per frame. It rescans the scene if needed,
///   and then relights queued surfaces until the time budget in [`PreviewOptions`]
///   is used up.
/// * Call [`render_overlay()`](Self::render_overlay) after drawing the scene normally.
/// * Call [`teardown()`](Self::teardown) before the graphics context goes away, since
///   textures can only be deleted through the backend.
///
/// Nothing happens until preview lighting is [enabled](Self::enable).
pub struct PreviewLighting {
    options: PreviewOptions,
    enabled: bool,

    /// The scene may have changed since the last rescan.
    scene_dirty: bool,
    /// Some surface's geometry or participation changed since the occluders were built.
    geometry_dirty: bool,
    /// Every surface must be relit after the next rescan, regardless of what changed.
    relight_all: bool,

    lights: LightSet,
    brushes: HbHashMap<NodeId, BrushCache>,
    patches: HbHashMap<NodeId, PatchCache>,
    brush_queue: WorkQueue<NodeId>,
    patch_queue: WorkQueue<NodeId>,
    occluders: Option<Bvh>,
    map_bounds: Option<Aab>,
    shaders: ShaderCache,
}

impl PreviewLighting {
    /// Constructs a disabled preview with nothing cached.
    ///
    /// `options` are [repaired](PreviewOptions::repair) before use.
    pub fn new(options: PreviewOptions) -> Self {
        Self {
            options: options.repair(),
            enabled: false,
            scene_dirty: true,
            geometry_dirty: true,
            relight_all: false,
            lights: LightSet::new(),
            brushes: HbHashMap::new(),
            patches: HbHashMap::new(),
            brush_queue: WorkQueue::new(),
            patch_queue: WorkQueue::new(),
            occluders: None,
            map_bounds: None,
            shaders: ShaderCache::new(),
        }
    }

    /// Returns the options in effect.
    pub fn options(&self) -> &PreviewOptions {
        &self.options
    }

    /// Replaces the options.
    ///
    /// Changing the model or game marks the scene dirty; changing the lightmap
    /// resolution parameters additionally queues every surface for relighting.
    pub fn set_options(&mut self, options: PreviewOptions) {
        let options = options.repair();
        let old = mem::replace(&mut self.options, options);
        let new = &self.options;
        if old.model != new.model || old.game != new.game {
            self.scene_dirty = true;
        }
        if old.luxel_size != new.luxel_size
            || old.min_lightmap_resolution != new.min_lightmap_resolution
            || old.max_lightmap_resolution != new.max_lightmap_resolution
        {
            self.scene_dirty = true;
            self.relight_all = true;
        }
    }

    /// Turns preview lighting on or off.
    ///
    /// Turning it on marks the scene dirty, so the next update rescans. Turning it off
    /// keeps everything cached. Has no effect if the game does not support preview
    /// lighting.
    pub fn enable(&mut self, enabled: bool) {
        if !self.options.game.supports_preview() {
            log::debug!("preview lighting is not supported for {:?}", self.options.game);
            return;
        }
        if enabled != self.enabled {
            self.enabled = enabled;
            if enabled {
                self.scene_dirty = true;
            }
        }
    }

    /// Returns whether preview lighting was turned on by [`enable()`](Self::enable).
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn is_active(&self) -> bool {
        self.enabled && self.options.game.supports_preview()
    }

    /// Returns the current display model.
    pub fn model(&self) -> PreviewModel {
        self.options.model
    }

    /// Switches the display model. A change marks the scene dirty.
    pub fn set_model(&mut self, model: PreviewModel) {
        if model != self.options.model {
            self.options.model = model;
            self.scene_dirty = true;
        }
    }

    /// Switches the display model by its host-side index; see
    /// [`PreviewModel::from_index()`].
    pub fn set_model_index(&mut self, index: i64) {
        self.set_model(PreviewModel::from_index(index));
    }

    /// Notifies that the scene changed in some way.
    pub fn mark_dirty(&mut self) {
        self.scene_dirty = true;
    }

    /// Returns whether an [`update()`](Self::update) would do anything.
    pub fn needs_update(&self) -> bool {
        self.is_active()
            && (self.scene_dirty
                || (self.options.model.uses_shadows()
                    && (self.geometry_dirty
                        || !self.brush_queue.is_empty()
                        || !self.patch_queue.is_empty())))
    }

    /// Advances the preview by one tick, spending about
    /// [`PreviewOptions::work_budget`] on relighting.
    pub fn update(
        &mut self,
        access: &SceneAccess<'_>,
        backend: &mut dyn OverlayBackend,
    ) -> UpdateInfo {
        self.update_until(access, backend, Deadline::after(self.options.work_budget))
    }

    /// Advances the preview by one tick, relighting surfaces until `deadline`.
    ///
    /// At least one queued surface is relit if any is queued, whatever the deadline.
    pub fn update_until(
        &mut self,
        access: &SceneAccess<'_>,
        backend: &mut dyn OverlayBackend,
        deadline: Deadline,
    ) -> UpdateInfo {
        let mut info = UpdateInfo::default();
        if !self.is_active() {
            return info;
        }

        if self.scene_dirty {
            self.rescan(access, backend);
            info.rescanned = true;
        }

        if self.options.model.uses_shadows() {
            if self.geometry_dirty {
                self.rebuild_occluders(access);
                info.occluders_rebuilt = true;
            }
            self.relight_from_queues(access, backend, deadline, &mut info);
        }

        info.brushes_remaining = self.brush_queue.len();
        info.patches_remaining = self.patch_queue.len();
        info
    }

    fn rescan(&mut self, access: &SceneAccess<'_>, backend: &mut dyn OverlayBackend) {
        let previous = Previous {
            lights: mem::take(&mut self.lights),
            brushes: mem::take(&mut self.brushes),
            patches: mem::take(&mut self.patches),
        };
        let mut result = rescan::rescan(
            access,
            &mut self.shaders,
            self.options.game,
            previous,
            backend,
        );
        result.propagate_dirty();
        if mem::take(&mut self.relight_all) {
            result.mark_all_dirty();
        }

        self.brush_queue
            .merge(result.dirty_brushes(), |node| result.brushes.contains_key(node));
        self.patch_queue
            .merge(result.dirty_patches(), |node| result.patches.contains_key(node));

        self.lights = result.lights;
        self.brushes = result.brushes;
        self.patches = result.patches;
        self.geometry_dirty |= result.geometry_dirty;
        self.map_bounds = result.map_bounds;
        self.scene_dirty = false;
    }

    fn rebuild_occluders(&mut self, access: &SceneAccess<'_>) {
        let triangles = occluder_triangles(
            access,
            &mut self.shaders,
            sorted_nodes(&self.brushes),
            sorted_nodes(&self.patches),
        );
        let bvh = Bvh::new(triangles);
        log::debug!(
            "rebuilt occluders: {triangles} triangles, {nodes} nodes",
            triangles = bvh.triangle_count(),
            nodes = bvh.node_count(),
        );
        if let Some(bounds) = bvh.bounds() {
            log::trace!("occluder bounds {}", bounds.refmt(&ConciseDebug));
        }
        self.occluders = Some(bvh);
        self.geometry_dirty = false;
    }

    fn relight_from_queues(
        &mut self,
        access: &SceneAccess<'_>,
        backend: &mut dyn OverlayBackend,
        deadline: Deadline,
        info: &mut UpdateInfo,
    ) {
        let input = LightingInput {
            lights: &self.lights,
            occluders: self.occluders.as_ref(),
            directional_distance: directional_distance(self.map_bounds),
            options: &self.options,
        };
        let mut last = Instant::now();
        let mut progressed = false;

        while !progressed || !deadline.is_past(last) {
            let Some(node) = self.brush_queue.pop() else {
                break;
            };
            let (Some(cache), Some(brush)) = (self.brushes.get_mut(&node), access.graph.brush(node))
            else {
                continue;
            };
            build_brush_lightmaps(cache, brush, access, &input, backend);
            info.relight_times
                .record_consecutive_interval(&mut last, Instant::now());
            info.brushes_processed += 1;
            progressed = true;
        }

        while !progressed || !deadline.is_past(last) {
            let Some(node) = self.patch_queue.pop() else {
                break;
            };
            let (Some(cache), Some(patch)) = (self.patches.get_mut(&node), access.graph.patch(node))
            else {
                continue;
            };
            build_patch_colors(cache, patch, &input);
            info.relight_times
                .record_consecutive_interval(&mut last, Instant::now());
            info.patches_processed += 1;
            progressed = true;
        }
    }

    /// Draws the overlay for the current model, if preview lighting is active.
    ///
    /// In the baked model, only cached results are drawn; in the fast model, colors are
    /// computed from the current lights without shadows.
    pub fn render_overlay(&self, access: &SceneAccess<'_>, backend: &mut dyn OverlayBackend) {
        if !self.is_active() {
            return;
        }
        match self.options.model {
            PreviewModel::BakedOverlay => {
                render_baked(access, &self.brushes, &self.patches, backend);
            }
            PreviewModel::FastInteraction => render_fast(
                access,
                &self.lights,
                directional_distance(self.map_bounds),
                backend,
            ),
        }
    }

    /// Releases every texture and forgets everything cached, including parsed shader
    /// lighting. The next update (if enabled) starts from scratch.
    pub fn teardown(&mut self, backend: &mut dyn OverlayBackend) {
        for cache in self.brushes.values_mut() {
            cache.release(backend);
        }
        self.brushes.clear();
        self.patches.clear();
        self.lights.clear();
        self.brush_queue.clear();
        self.patch_queue.clear();
        self.occluders = None;
        self.map_bounds = None;
        self.shaders.clear();
        self.relight_all = false;
        self.geometry_dirty = true;
        self.scene_dirty = true;
    }

    /// Returns the lights found by the most recent rescan.
    pub fn lights(&self) -> &LightSet {
        &self.lights
    }

    /// Returns the face lightmaps of a brush, one slot per face, or [`None`] if the
    /// brush is unknown. The slice is empty until the brush has been relit.
    pub fn brush_lightmaps(&self, node: NodeId) -> Option<&[Option<FaceLightmap>]> {
        self.brushes.get(&node).map(BrushCache::faces)
    }

    /// Returns the vertex colors of a patch, or [`None`] if the patch is unknown.
    /// The slice is empty until the patch has been relit.
    pub fn patch_colors(&self, node: NodeId) -> Option<&[Texel]> {
        self.patches.get(&node).map(PatchCache::colors)
    }

    /// Brushes waiting to be relit, in the order they will be.
    pub fn queued_brushes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.brush_queue.iter().copied()
    }

    /// Patches waiting to be relit, in the order they will be.
    pub fn queued_patches(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.patch_queue.iter().copied()
    }

    /// Returns the occluder hierarchy, if it has been built.
    pub fn occluders(&self) -> Option<&Bvh> {
        self.occluders.as_ref()
    }

    /// Returns the bounds of all brushes and patches as of the last rescan.
    pub fn map_bounds(&self) -> Option<Aab> {
        self.map_bounds
    }
}

/// Node identities in ascending order, so that rebuilt hierarchies do not depend on
/// hash table order.
fn sorted_nodes<V>(map: &HbHashMap<NodeId, V>) -> Vec<NodeId> {
    let mut nodes: Vec<NodeId> = map.keys().copied().collect();
    nodes.sort_unstable();
    nodes
}

impl Default for PreviewLighting {
    fn default() -> Self {
        Self::new(PreviewOptions::default())
    }
}

#[mutants::skip]
impl fmt::Debug for PreviewLighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewLighting")
            .field("options", &self.options)
            .field("enabled", &self.enabled)
            .field("scene_dirty", &self.scene_dirty)
            .field("geometry_dirty", &self.geometry_dirty)
            .field("lights", &self.lights.len())
            .field("brushes", &self.brushes.len())
            .field("patches", &self.patches.len())
            .field("brush_queue", &self.brush_queue.len())
            .field("patch_queue", &self.patch_queue.len())
            .field("occluders", &self.occluders)
            .finish_non_exhaustive()
    }
}

/// Performance data returned by [`PreviewLighting::update()`].
///
/// The exact contents of this structure are unstable; use only `Debug` and `Display`
/// formatting for stable results.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct UpdateInfo {
    /// Whether the scene was rescanned.
    pub rescanned: bool,
    /// Whether the occluder hierarchy was rebuilt.
    pub occluders_rebuilt: bool,
    /// Number of brushes relit.
    pub brushes_processed: usize,
    /// Number of patches relit.
    pub patches_processed: usize,
    /// Number of brushes still queued.
    pub brushes_remaining: usize,
    /// Number of patches still queued.
    pub patches_remaining: usize,
    /// Time taken to relight each surface.
    pub relight_times: TimeStats,
}

impl UpdateInfo {
    /// Whether no surfaces remain queued after this update.
    pub fn is_settled(&self) -> bool {
        self.brushes_remaining == 0 && self.patches_remaining == 0
    }
}

impl fmt::Display for UpdateInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, name: &'static str| if set { name } else { "" };
        writeln!(
            f,
            "Brushes: {:4} relit, {:4} queued  Patches: {:4} relit, {:4} queued{}{}",
            self.brushes_processed,
            self.brushes_remaining,
            self.patches_processed,
            self.patches_remaining,
            flag(self.rescanned, " [rescan]"),
            flag(self.occluders_rebuilt, " [occluders]"),
        )?;
        write!(f, "Relight {}", self.relight_times)
    }
}
