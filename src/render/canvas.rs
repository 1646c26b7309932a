use anyhow::{Context, anyhow};
use std::io::Cursor;
use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Stroke, Transform};
use tracing::debug;
use ttf_parser::{Face, OutlineBuilder};

use super::color::{self, Rgba};
use super::font::{FontFace, FontSet, FontSource, FontStatus};
use super::layout::{DocumentSize, META_FONT_RATIO, MessageBlock, Rect};
use super::measure::{FontSpec, TextMeasure};
use super::{Cancellation, ProgressSink, RenderJob, Renderer};
use crate::error::RenderError;
use crate::model::{AgentDirectory, Message};
use crate::style::ExportStyle;
use crate::timestamp::TimestampFormatter;

const FALLBACK_AGENT_COLOR: Rgba = Rgba::opaque(0x6b, 0x72, 0x80);
const TIMESTAMP_OPACITY: f32 = 0.5;
const BADGE_FILL_OPACITY: f32 = 0.25;
const BADGE_TEXT_OPACITY: f32 = 0.7;
const BORDER_WIDTH: f32 = 1.0;

/// A painted raster document.
pub struct Surface {
    pixmap: Pixmap,
    size: DocumentSize,
    scale: f32,
    font_status: FontStatus,
}

impl Surface {
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn logical_size(&self) -> DocumentSize {
        self.size
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Whether text was painted with the requested font, a fallback, or not at all.
    pub fn font_status(&self) -> FontStatus {
        self.font_status
    }

    pub fn encode_png(&self) -> anyhow::Result<Vec<u8>> {
        let mut rgba = Vec::with_capacity(self.pixmap.data().len());
        for pixel in self.pixmap.pixels() {
            let color = pixel.demultiply();
            rgba.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        let image = image::RgbaImage::from_raw(self.width(), self.height(), rgba)
            .ok_or_else(|| anyhow!("failed to build image buffer from surface"))?;
        let mut bytes = Vec::new();
        let mut cursor = Cursor::new(&mut bytes);
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut cursor, image::ImageFormat::Png)
            .with_context(|| "failed to encode PNG")?;
        Ok(bytes)
    }
}

pub(crate) fn surface_dimensions(size: DocumentSize, scale: f32) -> (u32, u32) {
    (
        (size.width * scale).ceil().max(0.0) as u32,
        (size.height * scale).ceil().max(0.0) as u32,
    )
}

/// Faces parsed once per render; outlines are read from these for every text run.
struct Glyphs<'f> {
    regular: Option<(Face<'f>, &'f FontFace)>,
    bold: Option<(Face<'f>, &'f FontFace)>,
}

impl<'f> Glyphs<'f> {
    fn new(fonts: &'f FontSet) -> Self {
        let parse = |font: Option<&'f FontFace>| -> Option<(Face<'f>, &'f FontFace)> {
            let font = font?;
            match Face::parse(font.data(), font.face_index()) {
                Ok(face) => Some((face, font)),
                Err(err) => {
                    debug!("font face unusable for painting: {}", err);
                    None
                }
            }
        };
        Self {
            regular: parse(fonts.face(false)),
            bold: parse(fonts.bold_face()),
        }
    }

    fn path(&self, text: &str, x: f32, baseline: f32, font: FontSpec) -> Option<Path> {
        let (face, metrics) = if font.bold {
            self.bold.as_ref().or(self.regular.as_ref())
        } else {
            self.regular.as_ref()
        }?;
        text_path(text, x, baseline, font.size, face, metrics)
    }
}

pub struct CanvasRenderer<'f> {
    style: ExportStyle,
    fonts: &'f FontSet,
    glyphs: Glyphs<'f>,
    font_status: FontStatus,
    transform: Transform,
    surface: Option<Surface>,
}

impl<'f> CanvasRenderer<'f> {
    pub fn new(style: ExportStyle, fonts: &'f FontSet, font_status: FontStatus) -> Self {
        let transform = Transform::from_scale(style.scale, style.scale);
        Self {
            style,
            fonts,
            glyphs: Glyphs::new(fonts),
            font_status,
            transform,
            surface: None,
        }
    }

    fn pixmap(&mut self) -> Result<&mut Pixmap, RenderError> {
        self.surface
            .as_mut()
            .map(|surface| &mut surface.pixmap)
            .ok_or(RenderError::RenderingUnavailable {
                width: 0,
                height: 0,
            })
    }

    fn fill(&mut self, path: &Path, color: Rgba) -> Result<(), RenderError> {
        let transform = self.transform;
        let paint = solid_paint(color);
        self.pixmap()?
            .fill_path(path, &paint, FillRule::Winding, transform, None);
        Ok(())
    }

    fn stroke(&mut self, path: &Path, color: Rgba, width: f32) -> Result<(), RenderError> {
        let transform = self.transform;
        let paint = solid_paint(color);
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        self.pixmap()?
            .stroke_path(path, &paint, &stroke, transform, None);
        Ok(())
    }

    fn draw_text(
        &mut self,
        text: &str,
        x: f32,
        baseline: f32,
        font: FontSpec,
        color: Rgba,
    ) -> Result<(), RenderError> {
        let Some(path) = self.glyphs.path(text, x, baseline, font) else {
            return Ok(());
        };
        self.fill(&path, color)
    }

    fn paint_avatar(&mut self, block: &MessageBlock<'_>) -> Result<(), RenderError> {
        let (cx, cy, radius) = block.avatar(&self.style);
        let fill = color::parse_or(&block.agent.color, FALLBACK_AGENT_COLOR);
        if let Some(circle) = PathBuilder::from_circle(cx, cy, radius) {
            self.fill(&circle, fill)?;
        }
        let initial = block.agent.initial();
        let font = FontSpec::bold(self.style.font_size);
        let width = self.fonts.text_width(&initial, font);
        let baseline = block.avatar_baseline(&self.style);
        self.draw_text(
            &initial,
            cx - width / 2.0,
            baseline,
            font,
            color::contrast_text(fill),
        )
    }
}

impl Renderer for CanvasRenderer<'_> {
    type Output = Surface;

    fn style(&self) -> &ExportStyle {
        &self.style
    }

    fn measure(&self) -> &dyn TextMeasure {
        self.fonts
    }

    fn begin(&mut self, size: DocumentSize) -> Result<(), RenderError> {
        let (width, height) = surface_dimensions(size, self.style.scale);
        let mut pixmap =
            Pixmap::new(width, height).ok_or(RenderError::RenderingUnavailable { width, height })?;
        pixmap.fill(color::parse_or(&self.style.background_color, Rgba::BLACK).to_skia());
        debug!("allocated {}x{} surface (scale {})", width, height, self.style.scale);
        self.surface = Some(Surface {
            pixmap,
            size,
            scale: self.style.scale,
            font_status: self.font_status,
        });
        Ok(())
    }

    fn paint_message(&mut self, block: &MessageBlock<'_>) -> Result<(), RenderError> {
        let style = self.style.clone();
        let text_color = color::parse_or(&style.text_color, Rgba::WHITE);

        let frame = block.frame(&style);
        if let Some(bubble) = rounded_rect(frame, style.border_radius) {
            self.fill(
                &bubble,
                color::parse_or(&style.message_background_color, Rgba::BLACK),
            )?;
            self.stroke(
                &bubble,
                color::parse_or(&style.border_color, Rgba::BLACK),
                BORDER_WIDTH,
            )?;
        }

        if style.show_agent_avatars {
            self.paint_avatar(block)?;
        }

        let content_x = block.content_x(&style);
        self.draw_text(
            &block.agent.name,
            content_x,
            block.name_baseline(&style),
            FontSpec::bold(style.font_size),
            text_color,
        )?;

        if let Some(timestamp) = &block.timestamp {
            self.draw_text(
                timestamp,
                content_x,
                block.meta_baseline(&style),
                FontSpec::regular(style.font_size * META_FONT_RATIO),
                text_color.with_opacity(TIMESTAMP_OPACITY),
            )?;
        }

        if let Some(badge) = &block.badge {
            let agent_color = color::parse_or(&block.agent.color, FALLBACK_AGENT_COLOR);
            if let Some(pill) = rounded_rect(badge.rect, badge.rect.h / 2.0) {
                self.fill(&pill, agent_color.with_opacity(BADGE_FILL_OPACITY))?;
            }
            self.draw_text(
                &badge.text,
                badge.text_x,
                badge.baseline,
                FontSpec::regular(badge.font_size),
                text_color.with_opacity(BADGE_TEXT_OPACITY),
            )?;
        }

        for (idx, line) in block.lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            self.draw_text(
                line,
                content_x,
                block.body_baseline(idx, &style),
                FontSpec::regular(style.font_size),
                text_color,
            )?;
        }
        Ok(())
    }

    fn finalize(self) -> Result<Surface, RenderError> {
        self.surface.ok_or(RenderError::RenderingUnavailable {
            width: 0,
            height: 0,
        })
    }
}

/// Renders the conversation to a raster surface.
///
/// Fails with [`RenderError::Cancelled`] before any font loading or allocation
/// when `cancel` is already set. Font loading is best effort.
pub fn render_canvas<A>(
    messages: &[Message],
    agents: &A,
    style: &ExportStyle,
    formatter: &dyn TimestampFormatter,
    font_source: &FontSource,
    cancel: &dyn Cancellation,
    progress: &mut dyn ProgressSink,
) -> Result<Surface, RenderError>
where
    A: AgentDirectory + ?Sized,
{
    if cancel.is_cancelled() {
        return Err(RenderError::Cancelled);
    }
    let (fonts, status) = FontSet::load_or_fallback(font_source, &style.font_family);
    let renderer = CanvasRenderer::new(style.clone(), &fonts, status);
    RenderJob::new(messages, agents, formatter, cancel, progress).run(renderer)
}

fn solid_paint(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;
    paint
}

/// Rounded rectangle; the radius is clamped to half the shorter side.
fn rounded_rect(rect: Rect, radius: f32) -> Option<Path> {
    if rect.w <= 0.0 || rect.h <= 0.0 {
        return None;
    }
    let r = radius.clamp(0.0, rect.w.min(rect.h) / 2.0);
    let (x, y, w, h) = (rect.x, rect.y, rect.w, rect.h);
    if r == 0.0 {
        let bounds = tiny_skia::Rect::from_xywh(x, y, w, h)?;
        return Some(PathBuilder::from_rect(bounds));
    }
    // Cubic approximation of a quarter circle.
    let k = r * 0.552_284_8;
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.cubic_to(x + w - r + k, y, x + w, y + r - k, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.cubic_to(x + w, y + h - r + k, x + w - r + k, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.cubic_to(x + r - k, y + h, x, y + h - r + k, x, y + h - r);
    pb.line_to(x, y + r);
    pb.cubic_to(x, y + r - k, x + r - k, y, x + r, y);
    pb.close();
    pb.finish()
}

struct GlyphOutline<'p> {
    builder: &'p mut PathBuilder,
    origin_x: f32,
    baseline: f32,
    scale: f32,
}

impl GlyphOutline<'_> {
    fn point(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.baseline - y * self.scale)
    }
}

impl OutlineBuilder for GlyphOutline<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.point(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.point(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.point(x1, y1);
        let (x, y) = self.point(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.point(x1, y1);
        let (x2, y2) = self.point(x2, y2);
        let (x, y) = self.point(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

/// Glyph outlines of `text` laid out on one baseline, in logical pixels.
fn text_path(
    text: &str,
    x: f32,
    baseline: f32,
    font_size: f32,
    face: &Face<'_>,
    font: &FontFace,
) -> Option<Path> {
    let scale = font_size / font.units_per_em().max(1) as f32;
    let mut builder = PathBuilder::new();
    let mut pen_x = x;
    for ch in text.chars() {
        let advance = match face.glyph_index(ch) {
            Some(glyph) => {
                let mut outline = GlyphOutline {
                    builder: &mut builder,
                    origin_x: pen_x,
                    baseline,
                    scale,
                };
                face.outline_glyph(glyph, &mut outline);
                font.advance(ch).unwrap_or(font.space_advance())
            }
            None => font.space_advance(),
        };
        pen_x += advance as f32 * scale;
    }
    builder.finish()
}
