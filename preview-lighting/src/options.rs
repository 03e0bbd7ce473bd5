use core::fmt;

use crate::time::Duration;

/// Options for controlling how preview lighting is computed and displayed.
///
/// Options which are out of range are not an error; use [`PreviewOptions::repair()`]
/// to constrain them. [`PreviewLighting`](crate::PreviewLighting) always repairs the
/// options it is given.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "save", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "save", serde(default))]
#[non_exhaustive]
pub struct PreviewOptions {
    /// Which of the two display strategies to use.
    pub model: PreviewModel,

    /// Which game's conventions to follow where games disagree about entity keys.
    pub game: GameConvention,

    /// Wall-clock time which one [`update()`](crate::PreviewLighting::update) may
    /// spend relighting surfaces.
    ///
    /// At least one surface is always relit when there is work to do, so this is a
    /// target, not a hard limit.
    pub work_budget: Duration,

    /// Size, in world units, that one lightmap luxel should cover.
    pub luxel_size: f64,

    /// Smallest lightmap width or height, in luxels.
    pub min_lightmap_resolution: u32,

    /// Largest lightmap width or height, in luxels.
    pub max_lightmap_resolution: u32,
}

impl PreviewOptions {
    /// Constrain fields to valid/practical values.
    #[must_use]
    pub fn repair(mut self) -> Self {
        self.work_budget = self
            .work_budget
            .clamp(Duration::from_micros(100), Duration::from_millis(100));
        self.luxel_size = if self.luxel_size.is_nan() {
            Self::default().luxel_size
        } else {
            self.luxel_size.clamp(1.0, 1024.0)
        };
        self.max_lightmap_resolution = self.max_lightmap_resolution.clamp(1, 1024);
        self.min_lightmap_resolution = self
            .min_lightmap_resolution
            .clamp(1, self.max_lightmap_resolution);
        self
    }
}

#[mutants::skip]
impl fmt::Debug for PreviewOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            model,
            game,
            work_budget,
            luxel_size,
            min_lightmap_resolution,
            max_lightmap_resolution,
        } = self;
        // Resolution is shown as a range to keep the output short.
        f.debug_struct("PreviewOptions")
            .field("model", model)
            .field("game", game)
            .field("work_budget", work_budget)
            .field("luxel_size", luxel_size)
            .field(
                "lightmap_resolution",
                &(min_lightmap_resolution..=max_lightmap_resolution),
            )
            .finish()
    }
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            model: PreviewModel::BakedOverlay,
            game: GameConvention::Quake3,
            work_budget: Duration::from_millis(6),
            luxel_size: 24.0,
            min_lightmap_resolution: 4,
            max_lightmap_resolution: 64,
        }
    }
}

/// Choices for [`PreviewOptions::model`].
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "save", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PreviewModel {
    /// Shadowed lighting is computed incrementally and cached in lightmap textures and
    /// vertex colors, which are then multiplied over the scene.
    #[default]
    BakedOverlay,

    /// No shadows and no caching: every frame, each vertex is lit directly from the
    /// current light list. Suited to continuous editing.
    FastInteraction,
}

impl PreviewModel {
    /// Converts a host-side numeric selection to a model.
    ///
    /// Out-of-range values select the default model rather than failing.
    ///
    /// ```
    /// use preview_lighting::PreviewModel;
    ///
    /// assert_eq!(PreviewModel::from_index(1), PreviewModel::FastInteraction);
    /// assert_eq!(PreviewModel::from_index(7), PreviewModel::BakedOverlay);
    /// ```
    pub fn from_index(index: i64) -> Self {
        match index {
            1 => Self::FastInteraction,
            _ => Self::BakedOverlay,
        }
    }

    /// Inverse of [`PreviewModel::from_index()`].
    pub fn index(self) -> i64 {
        match self {
            Self::BakedOverlay => 0,
            Self::FastInteraction => 1,
        }
    }

    /// Whether this model traces shadows, and therefore needs the occluder hierarchy
    /// and the relighting queues.
    pub fn uses_shadows(self) -> bool {
        match self {
            Self::BakedOverlay => true,
            Self::FastInteraction => false,
        }
    }
}

/// Game family whose entity conventions the scene follows.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "save", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum GameConvention {
    /// Quake III Arena and its derivatives.
    #[default]
    Quake3,
    /// Wolfenstein family games, which invert the meaning of the linear falloff flag.
    Wolf,
    /// Doom 3 family games, whose lighting model this preview does not support.
    /// All preview operations are no-ops.
    Doom3,
}

impl GameConvention {
    /// Returns whether a light entity with the given `spawnflags` uses linear rather
    /// than inverse-square falloff.
    ///
    /// ```
    /// use preview_lighting::GameConvention;
    ///
    /// assert!(GameConvention::Quake3.linear_falloff(1));
    /// assert!(!GameConvention::Wolf.linear_falloff(1));
    /// ```
    pub fn linear_falloff(self, spawnflags: i32) -> bool {
        let bit = spawnflags & 1 != 0;
        match self {
            Self::Wolf => !bit,
            Self::Quake3 | Self::Doom3 => bit,
        }
    }

    /// Whether preview lighting is available at all for this game.
    pub fn supports_preview(self) -> bool {
        !matches!(self, Self::Doom3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn default_is_repaired() {
        assert_eq!(PreviewOptions::default().repair(), PreviewOptions::default());
    }

    #[test]
    fn repair_clamps() {
        let options = PreviewOptions {
            work_budget: Duration::from_secs(10),
            luxel_size: f64::NAN,
            min_lightmap_resolution: 500,
            max_lightmap_resolution: 100,
            ..PreviewOptions::default()
        }
        .repair();
        assert_eq!(options.work_budget, Duration::from_millis(100));
        assert_eq!(options.luxel_size, 24.0);
        assert_eq!(
            (options.min_lightmap_resolution, options.max_lightmap_resolution),
            (100, 100)
        );
    }

    #[test]
    fn repair_zero_resolution() {
        let options = PreviewOptions {
            min_lightmap_resolution: 0,
            max_lightmap_resolution: 0,
            ..PreviewOptions::default()
        }
        .repair();
        assert_eq!(
            (options.min_lightmap_resolution, options.max_lightmap_resolution),
            (1, 1)
        );
    }

    #[rstest]
    #[case(-1, PreviewModel::BakedOverlay)]
    #[case(0, PreviewModel::BakedOverlay)]
    #[case(1, PreviewModel::FastInteraction)]
    #[case(2, PreviewModel::BakedOverlay)]
    fn model_from_index(#[case] index: i64, #[case] expected: PreviewModel) {
        assert_eq!(PreviewModel::from_index(index), expected);
    }

    #[rstest]
    #[case(GameConvention::Quake3, 0, false)]
    #[case(GameConvention::Quake3, 1, true)]
    #[case(GameConvention::Quake3, 3, true)]
    #[case(GameConvention::Wolf, 0, true)]
    #[case(GameConvention::Wolf, 1, false)]
    #[case(GameConvention::Doom3, 1, true)]
    fn linear_falloff_flag(
        #[case] game: GameConvention,
        #[case] spawnflags: i32,
        #[case] expected: bool,
    ) {
        assert_eq!(game.linear_falloff(spawnflags), expected);
    }

    #[test]
    fn debug() {
        assert_eq!(
            format!("{:?}", PreviewOptions::default()),
            "PreviewOptions { model: BakedOverlay, game: Quake3, work_budget: 6ms, \
            luxel_size: 24.0, lightmap_resolution: 4..=64 }"
        );
    }
}
