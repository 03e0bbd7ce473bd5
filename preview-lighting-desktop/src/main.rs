//! Binary which computes preview lighting for a scene file without a host editor,
//! and writes out the results.

use std::fs;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser as _;

use preview_lighting::render::RecordingBackend;
use preview_lighting::scene::memory::MemoryScene;
use preview_lighting::{GameConvention, PreviewLighting, PreviewModel, PreviewOptions};

mod logging;
mod record;

#[derive(Clone, Debug, clap::Parser)]
#[command(author, version, about)]
struct CommandArgs {
    /// Scene description file, in JSON.
    #[arg(value_name = "SCENE")]
    scene_file: PathBuf,

    /// Directory in which to write lightmap images and `report.json`.
    #[arg(long = "output", short = 'o', value_name = "DIR", default_value = "preview-output")]
    output_dir: PathBuf,

    /// Which preview model to use.
    /// Overrides the options file.
    #[arg(long, value_enum)]
    model: Option<ModelArg>,

    /// Which game's entity conventions the scene follows.
    /// Overrides the options file.
    #[arg(long, value_enum)]
    game: Option<GameArg>,

    /// Give up after this many updates, even if lighting has not settled.
    #[arg(long, value_name = "N", default_value_t = 10_000)]
    max_ticks: usize,

    /// JSON file of preview options. Unspecified options take their default values.
    #[arg(long = "options", value_name = "FILE")]
    options_file: Option<PathBuf>,

    #[command(flatten)]
    logging: logging::LoggingArgs,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
enum ModelArg {
    /// Shadowed lightmaps, computed incrementally.
    Baked,
    /// Unshadowed per-vertex lighting.
    Fast,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
enum GameArg {
    Quake3,
    Wolf,
    Doom3,
}

impl From<ModelArg> for PreviewModel {
    fn from(value: ModelArg) -> Self {
        match value {
            ModelArg::Baked => PreviewModel::BakedOverlay,
            ModelArg::Fast => PreviewModel::FastInteraction,
        }
    }
}

impl From<GameArg> for GameConvention {
    fn from(value: GameArg) -> Self {
        match value {
            GameArg::Quake3 => GameConvention::Quake3,
            GameArg::Wolf => GameConvention::Wolf,
            GameArg::Doom3 => GameConvention::Doom3,
        }
    }
}

impl CommandArgs {
    fn preview_options(&self) -> Result<PreviewOptions, anyhow::Error> {
        let mut options = match &self.options_file {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read options file {}", path.display()))?;
                serde_json::from_str::<PreviewOptions>(&text)
                    .with_context(|| format!("failed to parse options file {}", path.display()))?
            }
            None => PreviewOptions::default(),
        };
        if let Some(model) = self.model {
            options.model = model.into();
        }
        if let Some(game) = self.game {
            options.game = game.into();
        }
        Ok(options)
    }
}

fn main() -> Result<(), anyhow::Error> {
    let args = CommandArgs::parse();
    logging::install(&args.logging)?;

    let options = args.preview_options()?;
    let scene_text = fs::read_to_string(&args.scene_file)
        .with_context(|| format!("failed to read scene file {}", args.scene_file.display()))?;
    let scene: MemoryScene = serde_json::from_str(&scene_text)
        .with_context(|| format!("failed to parse scene file {}", args.scene_file.display()))?;
    log::info!(
        "loaded {} entities, {} brushes, {} patches",
        scene.entities.len(),
        scene.brushes.len(),
        scene.patches.len()
    );

    let mut preview = PreviewLighting::new(options);
    preview.enable(true);
    if !preview.is_enabled() {
        log::warn!("preview lighting is not available for {:?}", preview.options().game);
    }

    let mut backend = RecordingBackend::new();
    let (ticks, settled) = run(&mut preview, &scene, &mut backend, args.max_ticks);
    if settled {
        log::info!("lighting settled after {ticks} updates");
    } else {
        log::warn!("lighting did not settle within {ticks} updates");
    }

    let report = record::Report::new(&scene, &preview, ticks, settled);
    record::write_output(&args.output_dir, &scene, &preview, &report)?;
    Ok(())
}

/// Updates until nothing remains to do or `max_ticks` updates have happened.
///
/// Returns the number of updates and whether lighting settled.
fn run(
    preview: &mut PreviewLighting,
    scene: &MemoryScene,
    backend: &mut RecordingBackend,
    max_ticks: usize,
) -> (usize, bool) {
    let mut ticks = 0;
    while ticks < max_ticks {
        if !preview.needs_update() {
            return (ticks, true);
        }
        let info = preview.update(&scene.access(), backend);
        ticks += 1;
        log::debug!("update {ticks}: {info}");
    }
    (ticks, !preview.needs_update())
}
