use serde::Deserialize;
use std::fmt;

pub const DEFAULT_FONT_FAMILY: &str = "Inter, system-ui, sans-serif";
pub const RASTER_DEFAULT_SCALE: f32 = 2.0;
pub const VECTOR_DEFAULT_SCALE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
    Custom,
}

impl Theme {
    /// Unknown names fall back to the dark palette.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "light" => Theme::Light,
            "custom" => Theme::Custom,
            _ => Theme::Dark,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
            Theme::Custom => "custom",
        }
    }

    pub fn palette(&self) -> ThemePalette {
        match self {
            Theme::Dark => ThemePalette {
                background: "#1a1a1a",
                text: "#ffffff",
                message_background: "#2d2d2d",
                border: "#404040",
            },
            Theme::Light => ThemePalette {
                background: "#ffffff",
                text: "#1a1a1a",
                message_background: "#f5f5f5",
                border: "#e5e5e5",
            },
            Theme::Custom => ThemePalette {
                background: "#0f172a",
                text: "#e2e8f0",
                message_background: "#1e293b",
                border: "#334155",
            },
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemePalette {
    pub background: &'static str,
    pub text: &'static str,
    pub message_background: &'static str,
    pub border: &'static str,
}

/// Which backend a style is resolved for; only the default scale differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Raster,
    Vector,
}

impl Backend {
    fn default_scale(&self) -> f32 {
        match self {
            Backend::Raster => RASTER_DEFAULT_SCALE,
            Backend::Vector => VECTOR_DEFAULT_SCALE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportStyle {
    pub theme: Theme,
    pub background_color: String,
    pub text_color: String,
    pub message_background_color: String,
    pub border_color: String,
    pub border_radius: f32,
    pub padding: f32,
    pub font_size: f32,
    pub font_family: String,
    pub show_timestamps: bool,
    pub show_models: bool,
    pub show_agent_avatars: bool,
    pub custom_css: Option<String>,
    pub scale: f32,
}

impl ExportStyle {
    pub fn line_height(&self) -> f32 {
        self.font_size * crate::render::layout::LINE_HEIGHT_RATIO
    }
}

impl Default for ExportStyle {
    fn default() -> Self {
        resolve_style(&StyleOverride::default(), Backend::Raster)
    }
}

/// Partial style as supplied by settings files or the command line.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StyleOverride {
    pub theme: Option<String>,
    pub background_color: Option<String>,
    pub text_color: Option<String>,
    pub message_background_color: Option<String>,
    pub border_color: Option<String>,
    pub border_radius: Option<f32>,
    pub padding: Option<f32>,
    pub font_size: Option<f32>,
    pub font_family: Option<String>,
    pub show_timestamps: Option<bool>,
    pub show_models: Option<bool>,
    pub show_agent_avatars: Option<bool>,
    pub custom_css: Option<String>,
    pub scale: Option<f32>,
}

impl StyleOverride {
    /// Applies `incoming` on top of `self`, field by field.
    pub fn merge(&mut self, incoming: StyleOverride) {
        fn take_text(slot: &mut Option<String>, value: Option<String>) {
            if let Some(value) = value
                && !value.trim().is_empty()
            {
                *slot = Some(value);
            }
        }
        take_text(&mut self.theme, incoming.theme);
        take_text(&mut self.background_color, incoming.background_color);
        take_text(&mut self.text_color, incoming.text_color);
        take_text(
            &mut self.message_background_color,
            incoming.message_background_color,
        );
        take_text(&mut self.border_color, incoming.border_color);
        take_text(&mut self.font_family, incoming.font_family);
        take_text(&mut self.custom_css, incoming.custom_css);
        if incoming.border_radius.is_some() {
            self.border_radius = incoming.border_radius;
        }
        if incoming.padding.is_some() {
            self.padding = incoming.padding;
        }
        if let Some(size) = incoming.font_size
            && size > 0.0
        {
            self.font_size = Some(size);
        }
        if let Some(scale) = incoming.scale
            && scale > 0.0
        {
            self.scale = Some(scale);
        }
        if incoming.show_timestamps.is_some() {
            self.show_timestamps = incoming.show_timestamps;
        }
        if incoming.show_models.is_some() {
            self.show_models = incoming.show_models;
        }
        if incoming.show_agent_avatars.is_some() {
            self.show_agent_avatars = incoming.show_agent_avatars;
        }
    }
}

pub fn resolve_style(overrides: &StyleOverride, backend: Backend) -> ExportStyle {
    let theme = overrides
        .theme
        .as_deref()
        .map(Theme::from_name)
        .unwrap_or_default();
    let palette = theme.palette();
    let color = |value: &Option<String>, fallback: &str| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(fallback)
            .to_string()
    };
    let non_negative = |value: Option<f32>, fallback: f32| {
        value
            .filter(|value| value.is_finite())
            .unwrap_or(fallback)
            .max(0.0)
    };

    ExportStyle {
        theme,
        background_color: color(&overrides.background_color, palette.background),
        text_color: color(&overrides.text_color, palette.text),
        message_background_color: color(
            &overrides.message_background_color,
            palette.message_background,
        ),
        border_color: color(&overrides.border_color, palette.border),
        border_radius: non_negative(overrides.border_radius, 12.0),
        padding: non_negative(overrides.padding, 16.0),
        font_size: non_negative(overrides.font_size, 14.0),
        font_family: color(&overrides.font_family, DEFAULT_FONT_FAMILY),
        show_timestamps: overrides.show_timestamps.unwrap_or(true),
        show_models: overrides.show_models.unwrap_or(true),
        show_agent_avatars: overrides.show_agent_avatars.unwrap_or(true),
        custom_css: overrides
            .custom_css
            .clone()
            .filter(|css| !css.trim().is_empty()),
        scale: overrides
            .scale
            .filter(|scale| scale.is_finite() && *scale > 0.0)
            .unwrap_or_else(|| backend.default_scale()),
    }
}
