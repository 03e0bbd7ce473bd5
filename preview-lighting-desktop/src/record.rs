//! Writing computed lighting to files.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use preview_lighting::PreviewLighting;
use preview_lighting::lightmap::FaceLightmap;
use preview_lighting::scene::memory::MemoryScene;

/// Summary written to `report.json`.
#[derive(Debug, PartialEq, serde::Serialize)]
pub(crate) struct Report {
    pub ticks: usize,
    pub settled: bool,
    pub lights: usize,
    pub brushes: Vec<BrushReport>,
    pub patches: Vec<PatchReport>,
}

#[derive(Debug, PartialEq, serde::Serialize)]
pub(crate) struct BrushReport {
    pub node: u64,
    /// Lightmap size of each face, or `None` for faces which receive no lightmap.
    pub faces: Vec<Option<[u32; 2]>>,
}

#[derive(Debug, PartialEq, serde::Serialize)]
pub(crate) struct PatchReport {
    pub node: u64,
    pub vertices: usize,
    /// Mean RGB of the vertex colors.
    pub average_color: [u8; 3],
}

impl Report {
    /// Collects the cached results for every brush and patch of `scene`.
    pub fn new(scene: &MemoryScene, preview: &PreviewLighting, ticks: usize, settled: bool) -> Self {
        let brushes = scene
            .brushes
            .iter()
            .filter_map(|brush| {
                let lightmaps = preview.brush_lightmaps(brush.node)?;
                Some(BrushReport {
                    node: brush.node.0,
                    faces: lightmaps
                        .iter()
                        .map(|slot| slot.as_ref().map(FaceLightmap::size))
                        .collect(),
                })
            })
            .collect();
        let patches = scene
            .patches
            .iter()
            .filter_map(|patch| {
                let colors = preview.patch_colors(patch.node)?;
                Some(PatchReport {
                    node: patch.node.0,
                    vertices: colors.len(),
                    average_color: average_texel(colors),
                })
            })
            .collect();
        Self {
            ticks,
            settled,
            lights: preview.lights().len(),
            brushes,
            patches,
        }
    }
}

fn average_texel(colors: &[[u8; 4]]) -> [u8; 3] {
    if colors.is_empty() {
        return [0; 3];
    }
    let mut sum = [0u64; 3];
    for texel in colors {
        for (total, &channel) in sum.iter_mut().zip(texel) {
            *total += u64::from(channel);
        }
    }
    sum.map(|total| (total / colors.len() as u64) as u8)
}

/// Writes every face lightmap as a PNG, and the report as JSON, into `directory`.
///
/// Returns the paths of the files written.
pub(crate) fn write_output(
    directory: &Path,
    scene: &MemoryScene,
    preview: &PreviewLighting,
    report: &Report,
) -> Result<Vec<PathBuf>, anyhow::Error> {
    std::fs::create_dir_all(directory)
        .with_context(|| format!("failed to create output directory {}", directory.display()))?;

    let mut written = Vec::new();
    for brush in &scene.brushes {
        let Some(lightmaps) = preview.brush_lightmaps(brush.node) else {
            continue;
        };
        for (index, lightmap) in lightmaps.iter().enumerate() {
            let Some(lightmap) = lightmap else { continue };
            let path = directory.join(format!("brush-{}-face-{index}.png", brush.node.0));
            write_lightmap_png(&path, lightmap)
                .with_context(|| format!("failed to write {}", path.display()))?;
            written.push(path);
        }
    }

    let report_path = directory.join("report.json");
    let file = File::create(&report_path)
        .with_context(|| format!("failed to create {}", report_path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("failed to write {}", report_path.display()))?;
    written.push(report_path);

    log::info!("wrote {} files to {}", written.len(), directory.display());
    Ok(written)
}

fn write_lightmap_png(path: &Path, lightmap: &FaceLightmap) -> Result<(), anyhow::Error> {
    let [width, height] = lightmap.size();
    let file = File::create(path)?;
    let mut png_encoder = png::Encoder::new(BufWriter::new(file), width, height);
    png_encoder.set_color(png::ColorType::Rgb);
    png_encoder.set_depth(png::BitDepth::Eight);
    png_encoder.set_compression(png::Compression::Best);
    let mut png_writer = png_encoder.write_header()?;
    png_writer.write_image_data(lightmap.rgb())?;
    png_writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use preview_lighting::PreviewOptions;
    use preview_lighting::math::Aab;
    use preview_lighting::render::RecordingBackend;
    use preview_lighting::scene::{Brush, Entity, NodeId};
    use preview_lighting::time::Deadline;

    fn lit_floor() -> (MemoryScene, PreviewLighting) {
        let scene = MemoryScene::new()
            .with_entity(
                Entity::new(NodeId(0))
                    .with_key("classname", "light")
                    .with_key("origin", "32 32 100"),
            )
            .with_brush(Brush::from_aab(
                NodeId(7),
                Aab::new(0.0, 64.0, 0.0, 64.0, -8.0, 0.0),
                "floor",
            ));
        let mut preview = PreviewLighting::new(PreviewOptions::default());
        preview.enable(true);
        preview.update_until(&scene.access(), &mut RecordingBackend::new(), Deadline::Whenever);
        (scene, preview)
    }

    #[test]
    fn average_of_texels() {
        assert_eq!(average_texel(&[]), [0, 0, 0]);
        assert_eq!(
            average_texel(&[[10, 20, 30, 255], [20, 40, 60, 0]]),
            [15, 30, 45]
        );
    }

    #[test]
    fn report_contents() {
        let (scene, preview) = lit_floor();
        let report = Report::new(&scene, &preview, 1, true);
        assert_eq!(
            report,
            Report {
                ticks: 1,
                settled: true,
                lights: 1,
                brushes: vec![BrushReport {
                    node: 7,
                    faces: vec![Some([4, 4]); 6],
                }],
                patches: vec![],
            }
        );
    }

    #[test]
    fn writes_pngs_and_report() {
        let (scene, preview) = lit_floor();
        let report = Report::new(&scene, &preview, 1, true);
        let directory = tempfile::tempdir().unwrap();

        let written = write_output(directory.path(), &scene, &preview, &report).unwrap();

        assert_eq!(written.len(), 7);
        assert!(directory.path().join("brush-7-face-5.png").is_file());
        let json: serde_json::Value = serde_json::from_reader(
            File::open(directory.path().join("report.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(json["lights"], 1);
        assert_eq!(json["brushes"][0]["faces"][5], serde_json::json!([4, 4]));
    }
}
