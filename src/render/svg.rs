use quick_xml::escape::escape;
use std::fmt::Write as _;

use super::color::{self, Rgba};
use super::layout::{DocumentSize, META_FONT_RATIO, MessageBlock};
use super::measure::{ApproxMeasure, FontSpec, TextMeasure};
use super::{NeverCancelled, NoProgress, RenderJob, Renderer};
use crate::error::RenderError;
use crate::model::{AgentDirectory, Message};
use crate::style::ExportStyle;
use crate::timestamp::TimestampFormatter;

const FALLBACK_AGENT_COLOR: &str = "#6b7280";

/// Emits SVG markup. Text is measured with the average-glyph approximation,
/// so wrapping can differ from the raster output.
pub struct SvgRenderer {
    style: ExportStyle,
    svg: String,
    started: bool,
}

impl SvgRenderer {
    pub fn new(style: ExportStyle) -> Self {
        Self {
            style,
            svg: String::new(),
            started: false,
        }
    }

    fn text(&mut self, content: &str, x: f32, y: f32, font: FontSpec, fill: &str, extra: &str) {
        let weight = if font.bold { r#" font-weight="bold""# } else { "" };
        let _ = write!(
            self.svg,
            r#"<text x="{x:.2}" y="{y:.2}" font-size="{size:.2}" fill="{fill}"{weight}{extra}>{text}</text>"#,
            size = font.size,
            fill = escape(fill),
            text = escape(content),
        );
    }
}

impl Renderer for SvgRenderer {
    type Output = String;

    fn style(&self) -> &ExportStyle {
        &self.style
    }

    fn measure(&self) -> &dyn TextMeasure {
        &ApproxMeasure
    }

    fn begin(&mut self, size: DocumentSize) -> Result<(), RenderError> {
        let scale = self.style.scale;
        let _ = write!(
            self.svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{pw:.2}" height="{ph:.2}" viewBox="0 0 {w:.2} {h:.2}" font-family="{family}">"#,
            pw = size.width * scale,
            ph = size.height * scale,
            w = size.width,
            h = size.height,
            family = escape(&self.style.font_family),
        );
        if let Some(css) = &self.style.custom_css {
            let _ = write!(
                self.svg,
                "<style><![CDATA[{}]]></style>",
                css.replace("]]>", "]]]]><![CDATA[>")
            );
        }
        let _ = write!(
            self.svg,
            r#"<rect x="0" y="0" width="{w:.2}" height="{h:.2}" fill="{fill}"/>"#,
            w = size.width,
            h = size.height,
            fill = escape(&self.style.background_color),
        );
        self.started = true;
        Ok(())
    }

    fn paint_message(&mut self, block: &MessageBlock<'_>) -> Result<(), RenderError> {
        let style = self.style.clone();
        let agent_color = if color::parse_hex(&block.agent.color).is_some() {
            block.agent.color.clone()
        } else {
            FALLBACK_AGENT_COLOR.to_string()
        };

        let _ = write!(
            self.svg,
            r#"<g class="message" data-agent="{agent}">"#,
            agent = escape(&block.agent.id)
        );
        let frame = block.frame(&style);
        let _ = write!(
            self.svg,
            r#"<rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" rx="{r:.2}" fill="{fill}" stroke="{stroke}" stroke-width="1"/>"#,
            x = frame.x,
            y = frame.y,
            w = frame.w,
            h = frame.h,
            r = style.border_radius.min(frame.w.min(frame.h) / 2.0),
            fill = escape(&style.message_background_color),
            stroke = escape(&style.border_color),
        );

        if style.show_agent_avatars {
            let (cx, cy, radius) = block.avatar(&style);
            let _ = write!(
                self.svg,
                r#"<circle class="avatar" cx="{cx:.2}" cy="{cy:.2}" r="{radius:.2}" fill="{fill}"/>"#,
                fill = escape(&agent_color),
            );
            let initial_color = color::contrast_text(color::parse_or(&agent_color, Rgba::BLACK));
            let initial_fill = format!(
                "#{:02x}{:02x}{:02x}",
                initial_color.r, initial_color.g, initial_color.b
            );
            let baseline = block.avatar_baseline(&style);
            self.text(
                &block.agent.initial(),
                cx,
                baseline,
                FontSpec::bold(style.font_size),
                &initial_fill,
                r#" text-anchor="middle""#,
            );
        }

        let content_x = block.content_x(&style);
        self.text(
            &block.agent.name,
            content_x,
            block.name_baseline(&style),
            FontSpec::bold(style.font_size),
            &style.text_color,
            "",
        );

        if let Some(timestamp) = &block.timestamp {
            self.text(
                timestamp,
                content_x,
                block.meta_baseline(&style),
                FontSpec::regular(style.font_size * META_FONT_RATIO),
                &style.text_color,
                r#" opacity="0.5""#,
            );
        }

        if let Some(badge) = &block.badge {
            let rect = badge.rect;
            let _ = write!(
                self.svg,
                r#"<rect class="model-badge" x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" rx="{r:.2}" fill="{fill}" fill-opacity="0.25"/>"#,
                x = rect.x,
                y = rect.y,
                w = rect.w,
                h = rect.h,
                r = rect.h / 2.0,
                fill = escape(&agent_color),
            );
            self.text(
                &badge.text,
                badge.text_x,
                badge.baseline,
                FontSpec::regular(badge.font_size),
                &style.text_color,
                r#" opacity="0.7""#,
            );
        }

        for (idx, line) in block.lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            self.text(
                line,
                content_x,
                block.body_baseline(idx, &style),
                FontSpec::regular(style.font_size),
                &style.text_color,
                "",
            );
        }
        self.svg.push_str("</g>");
        Ok(())
    }

    fn finalize(mut self) -> Result<String, RenderError> {
        if !self.started {
            return Err(RenderError::RenderingUnavailable {
                width: 0,
                height: 0,
            });
        }
        self.svg.push_str("</svg>");
        Ok(self.svg)
    }
}

/// Renders the conversation as an SVG document. Synchronous; no cancellation or progress.
pub fn render_svg<A>(
    messages: &[Message],
    agents: &A,
    style: &ExportStyle,
    formatter: &dyn TimestampFormatter,
) -> Result<String, RenderError>
where
    A: AgentDirectory + ?Sized,
{
    let mut progress = NoProgress;
    RenderJob::new(messages, agents, formatter, &NeverCancelled, &mut progress)
        .run(SvgRenderer::new(style.clone()))
}
