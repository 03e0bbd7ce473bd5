//! Light definitions embedded in shader scripts: emissive surfaces, sky domes, and
//! suns.
//!
//! Shader scripts are only read for the lighting directives; everything else in them
//! is skipped. A malformed directive is logged and ignored, and never prevents the
//! rest of the shader from being used.

use alloc::string::{String, ToString as _};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::iter::Peekable;

use hashbrown::HashMap as HbHashMap;

use crate::light::normalize_color;
use crate::math::{FreeVector, Rgb, spherical_direction};
use crate::scene::{SceneAccess, ShaderFlags, finite_number};

/// Lighting-relevant contents of one shader definition.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct ShaderLighting {
    /// Intensity of light emitted by surfaces using this shader, if they are
    /// emissive (`q3map_surfacelight`).
    pub surface_light: Option<f64>,
    /// Explicit color of emitted light (`q3map_lightRGB`), normalized. If absent, the
    /// shader's average texture color is used.
    pub light_color: Option<Rgb>,
    /// Sky domes (`q3map_skyLight`).
    pub sky_lights: Vec<SkyLight>,
    /// Suns (`q3map_sun`, `q3map_sunExt`, `sun`).
    pub suns: Vec<SunSource>,
}

impl ShaderLighting {
    /// Whether surfaces with this shader and the given flags act as sky: they
    /// do not cast shadows or receive light, and contribute their suns and sky lights.
    pub fn behaves_like_sky(&self, flags: ShaderFlags) -> bool {
        flags.contains(ShaderFlags::SKY) || !self.suns.is_empty() || !self.sky_lights.is_empty()
    }

    /// The color of light emitted by this shader's surfaces or sky, given the
    /// shader's average texture color.
    pub(crate) fn emitted_color(&self, average_color: Rgb) -> Rgb {
        normalize_color(self.light_color.unwrap_or(average_color))
    }
}

/// A hemisphere (or band) of sky that illuminates the scene from many directions.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub struct SkyLight {
    /// Total intensity; never negative.
    pub value: f64,
    /// Number of elevation bands, in `2..=SkyLight::MAX_ITERATIONS`.
    pub iterations: u32,
    /// Lowest elevation, in degrees, in `-90..=90`.
    pub horizon_min: i32,
    /// Highest elevation, in degrees, in `-90..=90`.
    pub horizon_max: i32,
    /// Whether the light color was meant to be sampled from the sky texture.
    /// The preview always uses the shader's color, so this is informational.
    pub sample_color: bool,
}

impl SkyLight {
    /// Largest number of elevation bands a sky light may have. Larger requests are
    /// reduced to this.
    pub const MAX_ITERATIONS: u32 = 1024;

    /// Constructs a sky light covering the upper hemisphere.
    ///
    /// Out-of-range values are clamped.
    pub fn new(value: f64, iterations: i32) -> Self {
        Self {
            value: value.max(0.0),
            iterations: iterations.max(2).unsigned_abs().min(Self::MAX_ITERATIONS),
            horizon_min: 0,
            horizon_max: 90,
            sample_color: true,
        }
    }

    /// Builder-style assignment of the elevation range. Values are clamped to
    /// `-90..=90`.
    #[must_use]
    pub fn with_horizon(mut self, min: i32, max: i32) -> Self {
        self.horizon_min = min.clamp(-90, 90);
        self.horizon_max = max.clamp(-90, 90);
        self
    }
}

/// A sun: a directional light which may be split into several jittered samples to
/// soften its shadows.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub struct SunSource {
    /// Normalized color.
    pub color: Rgb,
    #[allow(missing_docs)]
    pub intensity: f64,
    /// Direction of light travel (pointing away from the sun).
    pub direction: FreeVector,
    /// Angular radius, in radians, over which samples are spread.
    pub deviance: f64,
    /// Number of samples; at least 1.
    pub samples: u32,
}

impl SunSource {
    /// Constructs a hard-shadowed sun from the `r g b intensity degrees elevation`
    /// form used by shaders and the worldspawn `_sun` key. The angles locate the sun
    /// in the sky; the resulting direction points away from it.
    pub fn from_angles(color: Rgb, intensity: f64, degrees: f64, elevation: f64) -> Self {
        Self {
            color: normalize_color(color),
            intensity,
            direction: -spherical_direction(degrees.to_radians(), elevation.to_radians()),
            deviance: 0.0,
            samples: 1,
        }
    }

    /// Builder-style assignment of soft shadow parameters. The deviance is in degrees.
    #[must_use]
    pub fn with_deviance(mut self, degrees: f64, samples: i32) -> Self {
        self.deviance = degrees.max(0.0).to_radians();
        self.samples = samples.max(1) as u32;
        self
    }
}

// -------------------------------------------------------------------------------------------------

/// Memoized [`ShaderLighting`] per shader name.
///
/// Shader scripts are read at most once each until [`ShaderCache::clear()`].
#[derive(Debug, Default)]
pub(crate) struct ShaderCache {
    parsed: HbHashMap<String, Arc<ShaderLighting>>,
}

impl ShaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lighting information of the named shader, reading and parsing its
    /// script if this is the first request.
    pub fn get(&mut self, name: &str, access: &SceneAccess<'_>) -> Arc<ShaderLighting> {
        self.parsed
            .entry_ref(name)
            .or_insert_with(|| Arc::new(load(name, access)))
            .clone()
    }

    /// Whether surfaces with the named shader act as sky.
    pub fn is_sky(&mut self, name: &str, access: &SceneAccess<'_>) -> bool {
        self.get(name, access)
            .behaves_like_sky(access.shader_or_default(name).flags)
    }

    pub fn len(&self) -> usize {
        self.parsed.len()
    }

    pub fn clear(&mut self) {
        self.parsed.clear();
    }
}

fn load(name: &str, access: &SceneAccess<'_>) -> ShaderLighting {
    let Some(path) = access
        .shaders
        .shader(name)
        .and_then(|info| info.source_file)
        .filter(|path| !path.is_empty())
    else {
        return ShaderLighting::default();
    };
    match access.files.read_text(&path) {
        Ok(text) => parse_shader_lighting(name, &text),
        Err(error) => {
            log::debug!("no lighting data for shader {name:?}: {error}");
            ShaderLighting::default()
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// A malformed lighting directive.
#[derive(Clone, Debug, displaydoc::Display, PartialEq)]
enum DirectiveError {
    /// {directive} is missing its arguments
    Missing { directive: String },
    /// {directive} has argument {token:?} which is not {expected}
    Malformed {
        directive: String,
        token: String,
        expected: &'static str,
    },
}

impl core::error::Error for DirectiveError {}

/// Extracts the lighting directives of the shader named `name` from the text of a
/// shader script, which may define many shaders.
///
/// Only the first top-level block named `name` (case-insensitively) is examined;
/// blocks nested within it (rendering stages) are skipped.
pub fn parse_shader_lighting(name: &str, text: &str) -> ShaderLighting {
    let mut info = ShaderLighting::default();
    let mut tokens = Tokenizer::new(text).peekable();

    if !seek_block(&mut tokens, name) {
        return info;
    }

    let mut depth = 1;
    while let Some(token) = tokens.next() {
        match token {
            "{" => depth += 1,
            "}" => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ if depth == 1 => {
                if let Err(error) = parse_directive(token, &mut tokens, &mut info) {
                    log::debug!("in shader {name:?}, skipping directive: {error}");
                }
            }
            _ => {}
        }
    }

    log::trace!(
        "shader {name:?}: surface light {:?}, {} sky lights, {} suns",
        info.surface_light,
        info.sky_lights.len(),
        info.suns.len()
    );
    info
}

/// Advances `tokens` to just inside the top-level block named `name`, returning
/// false if there is none.
fn seek_block<'a>(tokens: &mut Peekable<Tokenizer<'a>>, name: &str) -> bool {
    let mut depth = 0u32;
    while let Some(token) = tokens.next() {
        match token {
            "{" => depth += 1,
            "}" => depth = depth.saturating_sub(1),
            _ if depth == 0 && token.eq_ignore_ascii_case(name) => {
                if tokens.peek() == Some(&"{") {
                    tokens.next();
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

fn parse_directive<'a>(
    directive: &'a str,
    tokens: &mut Peekable<Tokenizer<'a>>,
    info: &mut ShaderLighting,
) -> Result<(), DirectiveError> {
    let mut args = Arguments { directive, tokens };
    let lower = directive.to_ascii_lowercase();
    match lower.as_str() {
        "q3map_surfacelight" => {
            info.surface_light = Some(args.number()?);
        }
        "q3map_lightrgb" => {
            let [r, g, b] = [args.number()?, args.number()?, args.number()?];
            info.light_color = Some(normalize_color(Rgb::new(r as f32, g as f32, b as f32)));
        }
        "q3map_skylight" => {
            let value = args.number()?;
            let iterations = args.integer()?;
            let mut sky = SkyLight::new(value, iterations);
            if let Some(min) = args.optional_integer() {
                let max = args.optional_integer();
                sky = sky.with_horizon(min, max.unwrap_or(sky.horizon_max));
                if let Some(sample_color) = max.and_then(|_| args.optional_integer()) {
                    sky.sample_color = sample_color != 0;
                }
            }
            info.sky_lights.push(sky);
        }
        "sun" | "q3map_sun" | "q3map_sunext" => {
            let [r, g, b] = [args.number()?, args.number()?, args.number()?];
            let [intensity, degrees, elevation] = [args.number()?, args.number()?, args.number()?];
            let mut sun =
                SunSource::from_angles(Rgb::new(r as f32, g as f32, b as f32), intensity, degrees, elevation);
            if lower == "q3map_sunext" {
                if let Some(deviance) = args.optional_number() {
                    sun = sun.with_deviance(deviance, args.optional_integer().unwrap_or(1));
                }
            }
            info.suns.push(sun);
        }
        _ => {}
    }
    Ok(())
}

/// Reads the arguments of one directive.
struct Arguments<'a, 't> {
    directive: &'a str,
    tokens: &'t mut Peekable<Tokenizer<'a>>,
}

impl Arguments<'_, '_> {
    /// Consumes the next token, which must be a number.
    fn number(&mut self) -> Result<f64, DirectiveError> {
        self.required("a number", finite_number)
    }

    /// Consumes the next token, which must be an integer.
    fn integer(&mut self) -> Result<i32, DirectiveError> {
        self.required("an integer", |token| token.parse::<i32>().ok())
    }

    /// Consumes the next token only if it is a number.
    fn optional_number(&mut self) -> Option<f64> {
        self.tokens.next_if_map_ok(finite_number)
    }

    /// Consumes the next token only if it is an integer.
    fn optional_integer(&mut self) -> Option<i32> {
        self.tokens.next_if_map_ok(|token| token.parse::<i32>().ok())
    }

    fn required<T>(
        &mut self,
        expected: &'static str,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> Result<T, DirectiveError> {
        // Braces end the directive rather than being consumed as bad arguments.
        match self.tokens.next_if(|&token| token != "{" && token != "}") {
            None => Err(DirectiveError::Missing {
                directive: self.directive.to_string(),
            }),
            Some(token) => parse(token).ok_or_else(|| DirectiveError::Malformed {
                directive: self.directive.to_string(),
                token: token.to_string(),
                expected,
            }),
        }
    }
}

trait NextIfMapOk<'a> {
    fn next_if_map_ok<T>(&mut self, parse: impl Fn(&'a str) -> Option<T>) -> Option<T>;
}

impl<'a> NextIfMapOk<'a> for Peekable<Tokenizer<'a>> {
    fn next_if_map_ok<T>(&mut self, parse: impl Fn(&'a str) -> Option<T>) -> Option<T> {
        let value = parse(self.peek().copied()?)?;
        self.next();
        Some(value)
    }
}

// -------------------------------------------------------------------------------------------------

/// Splits shader script text into tokens.
///
/// * Tokens are separated by whitespace.
/// * `{` and `}` are always tokens by themselves.
/// * `// ...` and `/* ... */` comments are skipped.
/// * A double-quoted string is one token, without its quotes.
#[derive(Clone, Debug)]
pub(crate) struct Tokenizer<'a> {
    rest: &'a str,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            self.rest = self.rest.trim_start();
            if let Some(after) = self.rest.strip_prefix("//") {
                self.rest = after.find('\n').map_or("", |i| &after[i..]);
            } else if let Some(after) = self.rest.strip_prefix("/*") {
                self.rest = after.find("*/").map_or("", |i| &after[i + 2..]);
            } else {
                return;
            }
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        self.skip_whitespace_and_comments();
        let text = self.rest;
        let first = text.chars().next()?;
        let (token, rest) = match first {
            '{' | '}' => text.split_at(1),
            '"' => {
                let body = &text[1..];
                match body.find('"') {
                    Some(end) => (&body[..end], &body[end + 1..]),
                    None => (body, ""),
                }
            }
            _ => {
                let end = text
                    .find(|c: char| c.is_whitespace() || c == '{' || c == '}')
                    .unwrap_or(text.len());
                text.split_at(end)
            }
        };
        self.rest = rest;
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn tokenizer() {
        let text = indoc! {r#"
            // leading comment
            textures/sky{ q3map_sun 1 1 1 /* inline
            comment */ 100 "quoted token" }
            trailing"#};
        assert_eq!(
            Tokenizer::new(text).collect::<Vec<_>>(),
            vec![
                "textures/sky",
                "{",
                "q3map_sun",
                "1",
                "1",
                "1",
                "100",
                "quoted token",
                "}",
                "trailing"
            ]
        );
    }

    #[test]
    fn tokenizer_unterminated() {
        assert_eq!(Tokenizer::new("a /* never closed").collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(Tokenizer::new("\"open").collect::<Vec<_>>(), vec!["open"]);
        assert_eq!(Tokenizer::new("   ").next(), None);
    }

    const SCRIPT: &str = indoc! {r"
        textures/base/lamp
        {
            qer_editorimage textures/base/lamp.tga
            q3map_surfacelight 2500
            q3map_lightRGB 255 128 0
            {
                map $lightmap
                // nested stages are not directives
                q3map_surfacelight 1
            }
        }

        textures/skies/dusk
        {
            surfaceparm sky
            q3map_sunExt 1 0.9 0.8 140 45 60 2 8
            q3map_skyLight 80 3
            q3map_sun 0.5 0.5 1 30 270 10
        }

        textures/skies/band
        {
            q3map_skylight 100 4 -90 30 0
        }
    "};

    #[test]
    fn surface_light_shader() {
        let info = parse_shader_lighting("textures/base/lamp", SCRIPT);
        assert_eq!(info.surface_light, Some(2500.0));
        assert_eq!(info.light_color, Some(Rgb::new(1.0, 128.0 / 255.0, 0.0)));
        assert!(info.sky_lights.is_empty() && info.suns.is_empty());
        assert!(!info.behaves_like_sky(ShaderFlags::empty()));
        assert!(info.behaves_like_sky(ShaderFlags::SKY));
    }

    #[test]
    fn sky_shader() {
        let info = parse_shader_lighting("TEXTURES/SKIES/DUSK", SCRIPT);
        assert_eq!(info.surface_light, None);
        assert_eq!(info.sky_lights, vec![SkyLight::new(80.0, 3)]);
        assert_eq!(info.suns.len(), 2);

        let ext = info.suns[0];
        assert_eq!(ext.intensity, 140.0);
        assert_eq!(ext.samples, 8);
        assert!((ext.deviance - 2f64.to_radians()).abs() < 1e-12);
        let expected = -spherical_direction(45f64.to_radians(), 60f64.to_radians());
        assert!((ext.direction - expected).length() < 1e-12);
        assert!(ext.direction.z < 0.0, "sun shines downward");

        let plain = info.suns[1];
        assert_eq!((plain.samples, plain.deviance), (1, 0.0));
        assert_eq!(plain.color, Rgb::new(0.5, 0.5, 1.0));
        assert!(info.behaves_like_sky(ShaderFlags::empty()));
    }

    #[test]
    fn sky_light_horizons() {
        let info = parse_shader_lighting("textures/skies/band", SCRIPT);
        assert_eq!(
            info.sky_lights,
            vec![SkyLight {
                sample_color: false,
                ..SkyLight::new(100.0, 4).with_horizon(-90, 30)
            }]
        );
    }

    #[test]
    fn sky_light_optional_arguments() {
        let text = indoc! {"
            sky
            {
                q3map_skylight 100 4 20
                q3map_skylight 100 4 20 70
                q3map_skylight 100 2000000000
            }
        "};
        let info = parse_shader_lighting("sky", text);
        assert_eq!(
            info.sky_lights,
            vec![
                SkyLight::new(100.0, 4).with_horizon(20, 90),
                SkyLight::new(100.0, 4).with_horizon(20, 70),
                SkyLight::new(100.0, 1024),
            ]
        );
        assert!(info.sky_lights.iter().all(|sky| sky.sample_color));
    }

    #[test]
    fn missing_shader() {
        assert_eq!(
            parse_shader_lighting("textures/nope", SCRIPT),
            ShaderLighting::default()
        );
    }

    #[test]
    fn name_must_be_followed_by_block() {
        let text = indoc! {"
            textures/a textures/a
            {
                q3map_surfacelight 10
            }
        "};
        assert_eq!(parse_shader_lighting("textures/a", text).surface_light, Some(10.0));
        assert_eq!(parse_shader_lighting("textures/a", "textures/a").surface_light, None);
    }

    #[test]
    fn malformed_directives_are_skipped() {
        let text = indoc! {"
            broken
            {
                q3map_surfacelight bright
                q3map_lightRGB 1 1
                q3map_skyLight 50 2.5
                q3map_sunExt 1 1 1 100 0 45 soft
                q3map_skyLight -5 1 45 120
                q3map_sun nan 1 1 100 0 45
                q3map_surfacelight inf
            }
        "};
        let info = parse_shader_lighting("broken", text);
        assert_eq!(info.surface_light, None);
        assert_eq!(info.light_color, None);
        assert_eq!(info.suns.len(), 1, "optional extension arguments may be absent");
        assert_eq!(info.suns[0].samples, 1);
        assert_eq!(
            info.sky_lights,
            vec![SkyLight::new(0.0, 2).with_horizon(45, 90)],
            "clamped values"
        );
    }

    #[test]
    fn directive_error_messages() {
        let mut tokens = Tokenizer::new("x }").peekable();
        let mut args = Arguments {
            directive: "q3map_sun",
            tokens: &mut tokens,
        };
        assert_eq!(
            args.number().unwrap_err().to_string(),
            "q3map_sun has argument \"x\" which is not a number"
        );
        assert_eq!(
            args.number().unwrap_err().to_string(),
            "q3map_sun is missing its arguments"
        );
        assert_eq!(tokens.next(), Some("}"), "brace was not consumed");
    }

    #[test]
    fn emitted_color() {
        let info = parse_shader_lighting("textures/base/lamp", SCRIPT);
        assert_eq!(info.emitted_color(Rgb::ONE), Rgb::new(1.0, 128.0 / 255.0, 0.0));
        assert_eq!(
            ShaderLighting::default().emitted_color(Rgb::new(0.2, 0.4, 0.6)),
            Rgb::new(0.2, 0.4, 0.6)
        );
    }
}
