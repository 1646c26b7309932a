use super::font::{FontFace, FontSet};

/// Average glyph width as a fraction of the font size, used when no font metrics exist.
pub const APPROX_GLYPH_WIDTH_RATIO: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec {
    pub size: f32,
    pub bold: bool,
}

impl FontSpec {
    pub fn regular(size: f32) -> Self {
        Self { size, bold: false }
    }

    pub fn bold(size: f32) -> Self {
        Self { size, bold: true }
    }
}

/// Width measurement strategy injected into layout.
pub trait TextMeasure {
    fn text_width(&self, text: &str, font: FontSpec) -> f32;
}

/// Average glyph width times character count. Used by the SVG backend and
/// whenever no font could be loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxMeasure;

impl TextMeasure for ApproxMeasure {
    fn text_width(&self, text: &str, font: FontSpec) -> f32 {
        text.chars().count() as f32 * font.size * APPROX_GLYPH_WIDTH_RATIO
    }
}

/// Advances read from the loaded font faces.
impl TextMeasure for FontSet {
    fn text_width(&self, text: &str, font: FontSpec) -> f32 {
        match self.face(font.bold) {
            Some(face) => measure_with_face(text, font.size, face),
            None => ApproxMeasure.text_width(text, font),
        }
    }
}

pub(crate) fn measure_with_face(text: &str, font_size: f32, font: &FontFace) -> f32 {
    let mut advance = 0u32;
    for ch in text.chars() {
        if ch == '\n' {
            continue;
        }
        let glyph_advance = font.advance(ch).unwrap_or(font.space_advance());
        advance = advance.saturating_add(glyph_advance as u32);
    }
    advance as f32 * (font_size / font.units_per_em().max(1) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approximate_width_scales_with_length_and_size() {
        let measure = ApproxMeasure;
        assert_eq!(measure.text_width("", FontSpec::regular(10.0)), 0.0);
        assert_eq!(measure.text_width("abcd", FontSpec::regular(10.0)), 24.0);
        assert_eq!(measure.text_width("abcd", FontSpec::bold(20.0)), 48.0);
    }

    #[test]
    fn font_set_without_faces_matches_approximation() {
        let fonts = FontSet::empty();
        assert_eq!(
            fonts.text_width("hello", FontSpec::regular(14.0)),
            ApproxMeasure.text_width("hello", FontSpec::regular(14.0))
        );
    }
}
