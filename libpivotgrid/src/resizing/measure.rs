use std::sync::{Mutex, MutexGuard};

use epaint::text::{FontDefinitions, Fonts, TextOptions};
use epaint::{Color32, FontFamily, FontId};

use super::autosize::FontSpec;

/// Measures the rendered width of text.
pub trait TextMeasurer: Send + Sync {
    fn measure(&self, font: &FontSpec, text: &str) -> f32;
}

/// Lays text out off screen with epaint and reports the width of the galley.
///
/// CSS families are mapped onto the epaint families by their first entry: monospace
/// looking names go to [`FontFamily::Monospace`], everything else to
/// [`FontFamily::Proportional`]. The bundled fonts have no bold face, so weights of 600
/// and above get one pixel of synthetic emboldening per glyph, like browsers do.
pub struct FontMeasurer {
    fonts: Mutex<Fonts>,
}

impl FontMeasurer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_definitions(FontDefinitions::default())
    }

    /// Measures with custom font data, for hosts that render with their own fonts.
    #[must_use]
    pub fn with_definitions(definitions: FontDefinitions) -> Self {
        Self {
            fonts: Mutex::new(Fonts::new(TextOptions::default(), definitions)),
        }
    }

    fn lock_fonts(&self) -> MutexGuard<'_, Fonts> {
        match self.fonts.lock() {
            Ok(fonts) => fonts,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for FontMeasurer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FontMeasurer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMeasurer").finish_non_exhaustive()
    }
}

impl TextMeasurer for FontMeasurer {
    fn measure(&self, font: &FontSpec, text: &str) -> f32 {
        if text.is_empty() {
            return 0.;
        }
        let galley = self.lock_fonts().with_pixels_per_point(1.).layout_no_wrap(
            text.to_string(),
            font_id(font),
            Color32::PLACEHOLDER,
        );
        let emboldening = if font.weight >= 600 {
            text.chars().count() as f32
        } else {
            0.
        };
        galley.size().x + emboldening
    }
}

fn font_id(font: &FontSpec) -> FontId {
    let family = if font.family.split(',').next().is_some_and(is_monospace_family) {
        FontFamily::Monospace
    } else {
        FontFamily::Proportional
    };
    FontId::new(font.size_px, family)
}

fn is_monospace_family(name: &str) -> bool {
    let name = name.trim().trim_matches(|c| c == '"' || c == '\'').to_lowercase();
    name == "monospace"
        || ["mono", "courier", "consolas", "menlo", "monaco"]
            .iter()
            .any(|known| name.contains(known))
}
