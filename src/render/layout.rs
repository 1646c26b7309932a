use tracing::debug;

use super::measure::{FontSpec, TextMeasure};
use super::wrap::wrap_text;
use crate::markdown::strip_markdown;
use crate::model::{Agent, AgentDirectory, Message};
use crate::style::ExportStyle;
use crate::timestamp::TimestampFormatter;

pub const DOCUMENT_WIDTH: f32 = 800.0;
pub const AVATAR_SIZE: f32 = 32.0;
pub const AVATAR_GAP: f32 = 12.0;
pub const MESSAGE_SPACING: f32 = 16.0;
pub const BODY_GAP: f32 = 8.0;
pub const LINE_HEIGHT_RATIO: f32 = 1.4;
pub const META_ROW_RATIO: f32 = 0.85;
pub const META_FONT_RATIO: f32 = 0.8;
pub const BADGE_FONT_RATIO: f32 = 0.75;
const BADGE_GAP: f32 = 8.0;
const BASELINE_RATIO: f32 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentSize {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub text: String,
    pub rect: Rect,
    pub text_x: f32,
    pub baseline: f32,
    pub font_size: f32,
}

/// Height of the decorative row above a message body.
pub fn header_height(style: &ExportStyle) -> f32 {
    if style.show_agent_avatars {
        return AVATAR_SIZE;
    }
    let line_height = style.line_height();
    if style.show_timestamps || style.show_models {
        line_height + META_ROW_RATIO * line_height
    } else {
        line_height
    }
}

pub fn message_height(line_count: usize, style: &ExportStyle) -> f32 {
    let mut height = 2.0 * style.padding + header_height(style);
    if line_count > 0 {
        height += BODY_GAP + line_count as f32 * style.line_height();
    }
    if style.show_agent_avatars {
        height = height.max(AVATAR_SIZE + 2.0 * style.padding);
    }
    height
}

fn bubble_width(style: &ExportStyle) -> f32 {
    (DOCUMENT_WIDTH - 2.0 * style.padding).max(0.0)
}

fn content_indent(style: &ExportStyle) -> f32 {
    if style.show_agent_avatars {
        AVATAR_SIZE + AVATAR_GAP
    } else {
        0.0
    }
}

/// Width available to wrapped body lines.
pub fn body_width(style: &ExportStyle) -> f32 {
    (bubble_width(style) - 2.0 * style.padding - content_indent(style)).max(0.0)
}

fn baseline(row_top: f32, row_height: f32, font_size: f32) -> f32 {
    row_top + row_height / 2.0 + font_size * BASELINE_RATIO
}

/// One resolved message, measured and positioned.
#[derive(Debug, Clone)]
pub struct MessageBlock<'a> {
    pub index: usize,
    pub message: &'a Message,
    pub agent: &'a Agent,
    pub top: f32,
    pub height: f32,
    pub timestamp: Option<String>,
    pub badge: Option<Badge>,
    pub lines: Vec<String>,
}

impl MessageBlock<'_> {
    pub fn frame(&self, style: &ExportStyle) -> Rect {
        Rect {
            x: style.padding,
            y: self.top,
            w: bubble_width(style),
            h: self.height,
        }
    }

    fn header_top(&self, style: &ExportStyle) -> f32 {
        self.top + style.padding
    }

    pub fn content_x(&self, style: &ExportStyle) -> f32 {
        2.0 * style.padding + content_indent(style)
    }

    /// Centre and radius of the avatar circle.
    pub fn avatar(&self, style: &ExportStyle) -> (f32, f32, f32) {
        let radius = AVATAR_SIZE / 2.0;
        (
            2.0 * style.padding + radius,
            self.header_top(style) + radius,
            radius,
        )
    }

    pub fn avatar_baseline(&self, style: &ExportStyle) -> f32 {
        baseline(self.header_top(style), AVATAR_SIZE, style.font_size)
    }

    pub fn name_baseline(&self, style: &ExportStyle) -> f32 {
        baseline(self.header_top(style), style.line_height(), style.font_size)
    }

    pub fn meta_baseline(&self, style: &ExportStyle) -> f32 {
        meta_baseline_at(self.header_top(style), style)
    }

    pub fn body_baseline(&self, line: usize, style: &ExportStyle) -> f32 {
        let line_height = style.line_height();
        let body_top = self.header_top(style) + header_height(style) + BODY_GAP;
        baseline(
            body_top + line as f32 * line_height,
            line_height,
            style.font_size,
        )
    }
}

fn meta_baseline_at(header_top: f32, style: &ExportStyle) -> f32 {
    let line_height = style.line_height();
    baseline(
        header_top + line_height,
        META_ROW_RATIO * line_height,
        style.font_size * META_FONT_RATIO,
    )
}

/// Measures one message. `top` is filled in by [`layout_document`].
pub fn layout_message<'a>(
    index: usize,
    message: &'a Message,
    agent: &'a Agent,
    style: &ExportStyle,
    measure: &dyn TextMeasure,
    formatter: &dyn TimestampFormatter,
) -> MessageBlock<'a> {
    let body = strip_markdown(&message.content);
    let body = body.trim();
    let body_font = FontSpec::regular(style.font_size);
    let lines = if body.is_empty() {
        Vec::new()
    } else {
        wrap_text(body, body_width(style), |text| {
            measure.text_width(text, body_font)
        })
    };

    let timestamp = if style.show_timestamps {
        Some(formatter.format(&message.timestamp)).filter(|value| !value.is_empty())
    } else {
        None
    };

    let content_x = 2.0 * style.padding + content_indent(style);
    let badge = if style.show_models && !agent.model.trim().is_empty() {
        let meta_font = FontSpec::regular(style.font_size * META_FONT_RATIO);
        let badge_font = style.font_size * BADGE_FONT_RATIO;
        let mut x = content_x;
        if let Some(timestamp) = &timestamp {
            x += measure.text_width(timestamp, meta_font) + BADGE_GAP;
        }
        let text_width = measure.text_width(&agent.model, FontSpec::regular(badge_font));
        let h = badge_font * 1.5;
        let line_height = style.line_height();
        // Relative to the block top until the block is placed.
        let row_center = style.padding + line_height + META_ROW_RATIO * line_height / 2.0;
        Some(Badge {
            text: agent.model.clone(),
            rect: Rect {
                x,
                y: row_center - h / 2.0,
                w: text_width + badge_font,
                h,
            },
            text_x: x + badge_font / 2.0,
            baseline: row_center + badge_font * BASELINE_RATIO,
            font_size: badge_font,
        })
    } else {
        None
    };

    MessageBlock {
        index,
        message,
        agent,
        top: 0.0,
        height: message_height(lines.len(), style),
        timestamp,
        badge,
        lines,
    }
}

/// Every input message in order; `None` marks one whose agent could not be resolved.
#[derive(Debug, Clone)]
pub struct DocumentLayout<'a> {
    pub size: DocumentSize,
    pub entries: Vec<Option<MessageBlock<'a>>>,
}

impl DocumentLayout<'_> {
    pub fn painted_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.entries.len() - self.painted_count()
    }
}

/// Measures the whole document. Must complete before anything is painted.
pub fn layout_document<'a, A>(
    messages: &'a [Message],
    agents: &'a A,
    style: &ExportStyle,
    measure: &dyn TextMeasure,
    formatter: &dyn TimestampFormatter,
) -> DocumentLayout<'a>
where
    A: AgentDirectory + ?Sized,
{
    let mut entries = Vec::with_capacity(messages.len());
    let mut y = style.padding;
    let mut placed = 0usize;
    for (index, message) in messages.iter().enumerate() {
        let Some(agent) = agents.resolve(&message.agent_id) else {
            debug!("skipping message {}: unknown agent {}", message.id, message.agent_id);
            entries.push(None);
            continue;
        };
        let mut block = layout_message(index, message, agent, style, measure, formatter);
        block.top = y;
        if let Some(badge) = block.badge.as_mut() {
            badge.rect.y += y;
            badge.baseline += y;
        }
        y += block.height + MESSAGE_SPACING;
        placed += 1;
        entries.push(Some(block));
    }
    if placed > 0 {
        y -= MESSAGE_SPACING;
    }
    let size = DocumentSize {
        width: DOCUMENT_WIDTH,
        height: y + style.padding,
    };
    debug!(
        "document layout: {}x{} for {} messages ({} placed)",
        size.width,
        size.height,
        messages.len(),
        placed
    );
    DocumentLayout { size, entries }
}
