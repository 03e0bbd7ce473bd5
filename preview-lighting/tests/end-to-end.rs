//! Complete scenarios, from scene description to drawn overlay.

use pretty_assertions::assert_eq;

use preview_lighting::bvh::Bvh;
use preview_lighting::evaluate::{AMBIENT, evaluate};
use preview_lighting::light::{Falloff, Light, LightEntry, LightKey};
use preview_lighting::math::{Aab, FreePoint, FreeVector, Rgb};
use preview_lighting::render::{DrawCommand, RecordingBackend};
use preview_lighting::scene::memory::MemoryScene;
use preview_lighting::scene::{
    Brush, Entity, NodeId, Patch, PatchTessellation, PatchVertex, ShaderFlags, ShaderInfo,
};
use preview_lighting::time::Deadline;
use preview_lighting::{PreviewLighting, PreviewModel, PreviewOptions};

fn sunlit_floor() -> MemoryScene {
    MemoryScene::new()
        .with_entity(
            Entity::new(NodeId(0))
                .with_key("classname", "worldspawn")
                .with_key("_sunlight", "300")
                .with_key("_sunlight_color", "1 1 1")
                .with_key("_sun_mangle", "90 -45 0"),
        )
        .with_brush(Brush::from_aab(
            NodeId(1),
            Aab::new(-512.0, 512.0, -512.0, 512.0, -16.0, 0.0),
            "base_floor/concrete",
        ))
}

#[test]
fn worldspawn_sun_lights_floor() {
    let scene = sunlit_floor();
    let mut backend = RecordingBackend::new();
    let mut preview = PreviewLighting::new(PreviewOptions::default());
    preview.enable(true);

    let info = preview.update_until(&scene.access(), &mut backend, Deadline::Whenever);
    assert!(info.rescanned);
    assert!(info.is_settled());

    let lights = preview.lights();
    assert_eq!(lights.len(), 1);
    let entry = lights[&LightKey::WorldspawnSun {
        node: NodeId(0),
        sample: 0,
    }];
    let Light::Directional(sun) = entry.light else {
        panic!("expected directional light, got {entry:?}");
    };
    let half = core::f64::consts::FRAC_1_SQRT_2;
    let expected = FreeVector::new(0.0, half, -half);
    assert!(
        (sun.direction - expected).length() < 1e-9,
        "{:?}",
        sun.direction
    );
    assert_eq!(entry.influence, preview.map_bounds().unwrap());

    let lightmaps = preview.brush_lightmaps(NodeId(1)).unwrap();
    let top = lightmaps[5].as_ref().unwrap();
    assert_eq!(top.size(), [43, 43]);
    let average = top.average_color().luminance();
    assert!(average > AMBIENT && average <= 1.0 + 1e-6, "{average}");
    // The bottom face faces away from the sun.
    let bottom = lightmaps[4].as_ref().unwrap();
    assert!(bottom.average_color().luminance() < AMBIENT + 0.01);

    preview.render_overlay(&scene.access(), &mut backend);
    let commands = backend.take_commands();
    assert_eq!(commands.first(), Some(&DrawCommand::BeginOverlay));
    assert_eq!(commands.last(), Some(&DrawCommand::EndOverlay));
    let textured = commands
        .iter()
        .filter(|command| matches!(command, DrawCommand::LightmappedPolygon { .. }))
        .count();
    assert_eq!(textured, 6);
}

#[test]
fn sky_brush_provides_sun_but_no_shadow() {
    let sky_shader = "textures/skies/clear";
    let scene = MemoryScene::new()
        .with_entity(Entity::new(NodeId(0)).with_key("classname", "worldspawn"))
        .with_brush(Brush::from_aab(
            NodeId(1),
            Aab::new(0.0, 64.0, 0.0, 64.0, -8.0, 0.0),
            "base_floor/concrete",
        ))
        .with_brush(Brush::from_aab(
            NodeId(2),
            Aab::new(-256.0, 256.0, -256.0, 256.0, 512.0, 520.0),
            sky_shader,
        ))
        .with_shader(
            sky_shader,
            ShaderInfo::new(ShaderFlags::SKY)
                .with_color(Rgb::new(0.5, 0.6, 1.0))
                .with_source_file("scripts/skies.shader"),
        )
        .with_file(
            "scripts/skies.shader",
            "textures/skies/clear\n{\n\tsurfaceparm sky\n\tq3map_sun 1 1 1 150 0 90\n}\n",
        );
    let mut backend = RecordingBackend::new();
    let mut preview = PreviewLighting::new(PreviewOptions::default());
    preview.enable(true);
    preview.update_until(&scene.access(), &mut backend, Deadline::Whenever);

    assert_eq!(preview.lights().len(), 1);
    assert!(
        preview
            .lights()
            .keys()
            .all(|key| matches!(key, LightKey::ShaderSun { .. }))
    );
    // Only the floor occludes, and the sky brush has no lightmaps.
    assert_eq!(preview.occluders().unwrap().triangle_count(), 12);
    assert!(preview.brush_lightmaps(NodeId(2)).unwrap().iter().all(Option::is_none));
    // The sun shines straight down through the sky brush.
    let top = preview.brush_lightmaps(NodeId(1)).unwrap()[5].as_ref().unwrap();
    assert!(top.average_color().luminance() > 0.9);
}

#[test]
fn patches_get_vertex_colors() {
    let vertex = |x: f64, y: f64| PatchVertex {
        position: FreePoint::new(x, y, 0.0),
        normal: FreeVector::new(0.0, 0.0, 1.0),
    };
    let tessellation = PatchTessellation::from_grid(
        2,
        2,
        vec![
            vertex(0.0, 0.0),
            vertex(64.0, 0.0),
            vertex(0.0, 64.0),
            vertex(64.0, 64.0),
        ],
    )
    .unwrap();
    let scene = sunlit_floor().with_patch(Patch::new(NodeId(5), "curve", tessellation));
    let mut backend = RecordingBackend::new();
    let mut preview = PreviewLighting::new(PreviewOptions::default());
    preview.enable(true);
    let info = preview.update_until(&scene.access(), &mut backend, Deadline::Whenever);
    assert_eq!(info.patches_processed, 1);

    let colors = preview.patch_colors(NodeId(5)).unwrap();
    assert_eq!(colors.len(), 4);
    assert!(colors.iter().all(|&[r, g, b, a]| r == g && g == b && r > 128 && a == 255));
}

#[test]
fn fast_model_draws_without_shadows() {
    let occluded = MemoryScene::new()
        .with_entity(
            Entity::new(NodeId(10))
                .with_key("classname", "light")
                .with_key("origin", "32 32 200"),
        )
        .with_brush(Brush::from_aab(
            NodeId(1),
            Aab::new(0.0, 64.0, 0.0, 64.0, -8.0, 0.0),
            "floor",
        ))
        .with_brush(Brush::from_aab(
            NodeId(2),
            Aab::new(-100.0, 164.0, -100.0, 164.0, 100.0, 108.0),
            "roof",
        ));
    let mut backend = RecordingBackend::new();
    let mut options = PreviewOptions::default();
    options.model = PreviewModel::FastInteraction;
    let mut preview = PreviewLighting::new(options);
    preview.enable(true);
    preview.update(&occluded.access(), &mut backend);
    preview.render_overlay(&occluded.access(), &mut backend);

    // The floor's top face is the sixth polygon drawn; it is lit despite the roof.
    let colors: Vec<_> = backend
        .commands()
        .iter()
        .filter_map(|command| match command {
            DrawCommand::ColoredPolygon { colors, .. } => Some(colors),
            _ => None,
        })
        .collect();
    assert_eq!(colors.len(), 12);
    assert!(colors[5].iter().all(|&[r, ..]| r > 200), "{:?}", colors[5]);
}

#[test]
fn fast_model_draws_brushes_added_since_rescan() {
    let scene = MemoryScene::new()
        .with_entity(
            Entity::new(NodeId(10))
                .with_key("classname", "light")
                .with_key("origin", "32 32 200"),
        )
        .with_brush(Brush::from_aab(
            NodeId(1),
            Aab::new(0.0, 64.0, 0.0, 64.0, -8.0, 0.0),
            "floor",
        ));
    let mut backend = RecordingBackend::new();
    let mut options = PreviewOptions::default();
    options.model = PreviewModel::FastInteraction;
    let mut preview = PreviewLighting::new(options);
    preview.enable(true);
    preview.update(&scene.access(), &mut backend);

    // Not yet rescanned.
    let scene = scene.with_brush(Brush::from_aab(
        NodeId(3),
        Aab::new(100.0, 164.0, 0.0, 64.0, -8.0, 0.0),
        "floor",
    ));
    preview.render_overlay(&scene.access(), &mut backend);

    let colors: Vec<_> = backend
        .commands()
        .iter()
        .filter_map(|command| match command {
            DrawCommand::ColoredPolygon { colors, .. } => Some(colors),
            _ => None,
        })
        .collect();
    assert_eq!(colors.len(), 12);
    assert!(colors[11].iter().all(|&[r, ..]| r > 64), "{:?}", colors[11]);
}

#[test]
fn evaluation_is_pure_and_clamped() {
    let lights = [
        LightEntry::point(
            FreePoint::new(0.0, 0.0, 100.0),
            Rgb::new(4.0, 0.5, 0.0),
            300.0,
            Falloff::Linear,
        )
        .light,
        LightEntry::directional(
            FreeVector::new(0.3, 0.0, -1.0).normalize(),
            Rgb::new(0.2, 0.9, 0.1),
            Aab::ZERO,
        )
        .light,
    ];
    let bvh = Bvh::new(vec![[
        FreePoint::new(-10.0, -10.0, 50.0),
        FreePoint::new(10.0, -10.0, 50.0),
        FreePoint::new(0.0, 10.0, 50.0),
    ]]);
    for (position, normal) in [
        (FreePoint::origin(), FreeVector::new(0.0, 0.0, 1.0)),
        (FreePoint::new(50.0, 0.0, 0.0), FreeVector::new(1.0, 0.0, 1.0)),
        (FreePoint::new(0.0, 30.0, 0.0), FreeVector::new(0.0, 0.0, -1.0)),
    ] {
        let first = evaluate(position, normal, &lights, 4096.0, Some(&bvh));
        let second = evaluate(position, normal, &lights, 4096.0, Some(&bvh));
        assert_eq!(first, second);
        for channel in [first.red(), first.green(), first.blue()] {
            assert!((0.0..=1.0).contains(&channel), "{first:?}");
        }
    }
}

#[test]
fn occluder_blocks_point_light() {
    let light = [LightEntry::point(
        FreePoint::new(0.0, 0.0, 100.0),
        Rgb::ONE,
        500.0,
        Falloff::InverseSquare,
    )
    .light];
    let up = FreeVector::new(0.0, 0.0, 1.0);
    let quad = Bvh::new(vec![
        [
            FreePoint::new(-20.0, -20.0, 50.0),
            FreePoint::new(20.0, -20.0, 50.0),
            FreePoint::new(20.0, 20.0, 50.0),
        ],
        [
            FreePoint::new(-20.0, -20.0, 50.0),
            FreePoint::new(20.0, 20.0, 50.0),
            FreePoint::new(-20.0, 20.0, 50.0),
        ],
    ]);
    let shadowed = evaluate(FreePoint::origin(), up, &light, 4096.0, Some(&quad));
    assert_eq!(shadowed, Rgb::from_luminance(AMBIENT));
    let lit = evaluate(FreePoint::origin(), up, &light, 4096.0, Some(&Bvh::new(vec![])));
    assert!(lit.red() > AMBIENT);
}
