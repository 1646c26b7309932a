use tiny_skia::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn with_opacity(self, opacity: f32) -> Self {
        Self {
            a: (self.a as f32 * opacity.clamp(0.0, 1.0)).round() as u8,
            ..self
        }
    }

    pub fn to_skia(self) -> Color {
        Color::from_rgba8(self.r, self.g, self.b, self.a)
    }

    /// Perceived brightness in `0.0..=1.0`.
    pub fn luminance(self) -> f32 {
        (0.299 * self.r as f32 + 0.587 * self.g as f32 + 0.114 * self.b as f32) / 255.0
    }
}

/// Parses `#rgb`, `#rrggbb` or `#rrggbbaa`.
pub fn parse_hex(value: &str) -> Option<Rgba> {
    let hex = value.trim().strip_prefix('#')?;
    if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    match hex.len() {
        3 => {
            let short = |idx: usize| channel(idx..idx + 1).map(|value| value * 17);
            Some(Rgba::opaque(short(0)?, short(1)?, short(2)?))
        }
        6 => Some(Rgba::opaque(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        8 => Some(Rgba {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
            a: channel(6..8)?,
        }),
        _ => None,
    }
}

pub fn parse_or(value: &str, fallback: Rgba) -> Rgba {
    parse_hex(value).unwrap_or(fallback)
}

/// Text colour that stays readable on top of `background`.
pub fn contrast_text(background: Rgba) -> Rgba {
    if background.luminance() > 0.6 {
        Rgba::BLACK
    } else {
        Rgba::WHITE
    }
}
