//! [`MemoryScene`], a self-contained scene held in plain data structures.
//!
//! This serves tests, benchmarks, and tools that drive the engine without an editor.
//! With the `save` feature, it can be read from and written to any `serde` format;
//! `preview-lighting-desktop` reads it as JSON.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::scene::{
    Brush, Entity, NodeId, Patch, ReadError, SceneAccess, SceneGraph, ShaderInfo, ShaderSystem,
    VirtualFileSystem,
};

/// A complete scene, shader table, and file system.
///
/// Node lookups are linear searches; this is intended for modest scenes.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "save", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "save", serde(default))]
#[non_exhaustive]
pub struct MemoryScene {
    /// Entities, in traversal order.
    pub entities: Vec<Entity>,
    /// Brushes, in traversal order.
    pub brushes: Vec<Brush>,
    /// Patches, in traversal order.
    pub patches: Vec<Patch>,
    /// Known shaders by name. Lookup is case-insensitive, preferring an exact match.
    pub shaders: BTreeMap<String, ShaderInfo>,
    /// Text files by path, such as shader scripts.
    pub files: BTreeMap<String, String>,
}

impl MemoryScene {
    /// Constructs an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style entity insertion.
    #[must_use]
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Builder-style brush insertion.
    #[must_use]
    pub fn with_brush(mut self, brush: Brush) -> Self {
        self.brushes.push(brush);
        self
    }

    /// Builder-style patch insertion.
    #[must_use]
    pub fn with_patch(mut self, patch: Patch) -> Self {
        self.patches.push(patch);
        self
    }

    /// Builder-style shader definition.
    #[must_use]
    pub fn with_shader(mut self, name: impl Into<String>, info: ShaderInfo) -> Self {
        self.shaders.insert(name.into(), info);
        self
    }

    /// Builder-style file insertion.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }

    /// Mutable access to a brush, for editing the scene between updates.
    pub fn brush_mut(&mut self, node: NodeId) -> Option<&mut Brush> {
        self.brushes.iter_mut().find(|b| b.node == node)
    }

    /// Mutable access to a patch, for editing the scene between updates.
    pub fn patch_mut(&mut self, node: NodeId) -> Option<&mut Patch> {
        self.patches.iter_mut().find(|p| p.node == node)
    }

    /// Mutable access to an entity, for editing the scene between updates.
    pub fn entity_mut(&mut self, node: NodeId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.node == node)
    }

    /// Bundles this scene as all three collaborators.
    pub fn access(&self) -> SceneAccess<'_> {
        SceneAccess::new(self, self, self)
    }
}

impl SceneGraph for MemoryScene {
    fn for_each_entity(&self, f: &mut dyn FnMut(&Entity)) {
        self.entities.iter().for_each(f);
    }

    fn for_each_brush(&self, f: &mut dyn FnMut(&Brush)) {
        self.brushes.iter().for_each(f);
    }

    fn for_each_patch(&self, f: &mut dyn FnMut(&Patch)) {
        self.patches.iter().for_each(f);
    }

    fn brush(&self, node: NodeId) -> Option<&Brush> {
        self.brushes.iter().find(|b| b.node == node)
    }

    fn patch(&self, node: NodeId) -> Option<&Patch> {
        self.patches.iter().find(|p| p.node == node)
    }
}

impl ShaderSystem for MemoryScene {
    fn shader(&self, name: &str) -> Option<ShaderInfo> {
        self.shaders
            .get(name)
            .or_else(|| {
                self.shaders
                    .iter()
                    .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
                    .map(|(_, info)| info)
            })
            .cloned()
    }
}

impl VirtualFileSystem for MemoryScene {
    fn read_text(&self, path: &str) -> Result<String, ReadError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ReadError::NotFound { path: path.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Aab;
    use crate::scene::ShaderFlags;
    use pretty_assertions::assert_eq;

    fn scene() -> MemoryScene {
        MemoryScene::new()
            .with_entity(Entity::new(NodeId(1)).with_key("classname", "worldspawn"))
            .with_brush(Brush::from_aab(NodeId(2), Aab::new(0., 1., 0., 1., 0., 1.), "a"))
            .with_shader("textures/Sky", ShaderInfo::new(ShaderFlags::SKY))
            .with_file("scripts/sky.shader", "textures/sky { }")
    }

    #[test]
    fn traversal_and_lookup() {
        let scene = scene();
        let mut seen = Vec::new();
        scene.for_each_entity(&mut |e| seen.push(e.node));
        scene.for_each_brush(&mut |b| seen.push(b.node));
        scene.for_each_patch(&mut |p| seen.push(p.node));
        assert_eq!(seen, vec![NodeId(1), NodeId(2)]);
        assert!(scene.brush(NodeId(2)).is_some());
        assert!(scene.brush(NodeId(1)).is_none());
        assert!(scene.patch(NodeId(2)).is_none());
    }

    #[test]
    fn shader_lookup_ignores_case() {
        let scene = scene();
        assert_eq!(
            scene.shader("TEXTURES/SKY").map(|s| s.flags),
            Some(ShaderFlags::SKY)
        );
        assert_eq!(scene.shader("textures/ground"), None);
    }

    #[test]
    fn files() {
        let scene = scene();
        assert_eq!(
            scene.read_text("scripts/sky.shader").as_deref(),
            Ok("textures/sky { }")
        );
        assert_eq!(
            scene.read_text("nope").unwrap_err().to_string(),
            "file \"nope\" not found"
        );
    }

    #[test]
    fn editing() {
        let mut scene = scene();
        scene.brush_mut(NodeId(2)).unwrap().visible = false;
        assert!(!scene.brush(NodeId(2)).unwrap().visible);
        scene.entity_mut(NodeId(1)).unwrap().keys.insert("_sunlight".into(), "5".into());
        assert_eq!(scene.entities[0].float("_sunlight"), Ok(5.0));
    }

    #[cfg(feature = "save")]
    #[test]
    fn from_json() {
        let json = indoc::indoc! {r#"
            {
                "entities": [
                    {"node": 1, "keys": {"classname": "worldspawn", "_sunlight": "200"}}
                ],
                "brushes": [
                    {
                        "node": 2,
                        "faces": [{
                            "shader": "floor",
                            "plane": {"normal": [0, 0, 1], "distance": 0},
                            "winding": [[0, 0, 0], [64, 0, 0], [64, 64, 0], [0, 64, 0]]
                        }]
                    }
                ],
                "shaders": {
                    "floor": {"flags": "NODRAW", "average_color": [1, 0.5, 0]}
                }
            }
        "#};
        let scene: MemoryScene = serde_json::from_str(json).unwrap();
        assert_eq!(scene.entities[0].float("_sunlight"), Ok(200.0));
        let brush = &scene.brushes[0];
        assert!(brush.visible);
        assert!(brush.faces[0].contributes);
        assert_eq!(brush.local_to_world, crate::math::Matrix4::IDENTITY);
        assert_eq!(scene.shaders["floor"].flags, ShaderFlags::NODRAW);
        assert_eq!(scene.shaders["floor"].source_file, None);
        assert!(scene.patches.is_empty());
    }
}
