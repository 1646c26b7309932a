pub mod cancel;
pub mod canvas;
pub mod color;
pub mod font;
pub mod layout;
pub mod measure;
pub mod svg;
pub mod wrap;

use tracing::debug;

pub use cancel::{Cancellation, CancellationToken, NeverCancelled};
pub use canvas::{CanvasRenderer, Surface, render_canvas};
pub use font::{FontFace, FontSet, FontSource, FontStatus, SystemFonts};
pub use layout::{DocumentLayout, DocumentSize, MessageBlock};
pub use measure::{ApproxMeasure, FontSpec, TextMeasure};
pub use svg::{SvgRenderer, render_svg};

use crate::error::RenderError;
use crate::model::{AgentDirectory, Message};
use crate::style::ExportStyle;
use crate::timestamp::TimestampFormatter;

/// A paint backend. Layout is shared; only measurement and painting differ.
pub trait Renderer {
    type Output;

    fn style(&self) -> &ExportStyle;

    fn measure(&self) -> &dyn TextMeasure;

    fn compute_document_size<'a, A>(
        &self,
        messages: &'a [Message],
        agents: &'a A,
        formatter: &dyn TimestampFormatter,
    ) -> DocumentLayout<'a>
    where
        A: AgentDirectory + ?Sized,
    {
        layout::layout_document(messages, agents, self.style(), self.measure(), formatter)
    }

    /// Allocates the output at the measured size and paints the background.
    fn begin(&mut self, size: DocumentSize) -> Result<(), RenderError>;

    fn paint_message(&mut self, block: &MessageBlock<'_>) -> Result<(), RenderError>;

    fn finalize(self) -> Result<Self::Output, RenderError>;
}

/// Receives completion percentages, synchronously, after each message paint.
pub trait ProgressSink {
    fn report(&mut self, percent: f32);
}

impl<F> ProgressSink for F
where
    F: FnMut(f32),
{
    fn report(&mut self, percent: f32) {
        self(percent)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _percent: f32) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    Measuring,
    Painting(usize),
    Done,
    Cancelled,
    Failed,
}

impl RenderPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RenderPhase::Done | RenderPhase::Cancelled | RenderPhase::Failed
        )
    }
}

/// One export invocation: measure every message, then paint them in order.
pub struct RenderJob<'a, A: AgentDirectory + ?Sized> {
    messages: &'a [Message],
    agents: &'a A,
    formatter: &'a dyn TimestampFormatter,
    cancel: &'a dyn Cancellation,
    progress: &'a mut dyn ProgressSink,
    phase: RenderPhase,
}

impl<'a, A: AgentDirectory + ?Sized> RenderJob<'a, A> {
    pub fn new(
        messages: &'a [Message],
        agents: &'a A,
        formatter: &'a dyn TimestampFormatter,
        cancel: &'a dyn Cancellation,
        progress: &'a mut dyn ProgressSink,
    ) -> Self {
        Self {
            messages,
            agents,
            formatter,
            cancel,
            progress,
            phase: RenderPhase::Idle,
        }
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    pub fn run<R: Renderer>(&mut self, renderer: R) -> Result<R::Output, RenderError> {
        let result = self.execute(renderer);
        self.phase = match &result {
            Ok(_) => RenderPhase::Done,
            Err(RenderError::Cancelled) => RenderPhase::Cancelled,
            Err(_) => RenderPhase::Failed,
        };
        debug!("render job finished: {:?}", self.phase);
        result
    }

    fn execute<R: Renderer>(&mut self, mut renderer: R) -> Result<R::Output, RenderError> {
        self.ensure_active()?;

        self.phase = RenderPhase::Measuring;
        let layout = renderer.compute_document_size(self.messages, self.agents, self.formatter);
        renderer.begin(layout.size)?;

        let total = layout.entries.len();
        if total == 0 {
            self.progress.report(100.0);
        }
        for (index, entry) in layout.entries.iter().enumerate() {
            self.ensure_active()?;
            self.phase = RenderPhase::Painting(index);
            if let Some(block) = entry {
                renderer.paint_message(block)?;
            }
            self.progress
                .report((index + 1) as f32 / total as f32 * 100.0);
        }
        renderer.finalize()
    }

    fn ensure_active(&self) -> Result<(), RenderError> {
        if self.cancel.is_cancelled() {
            debug!("render job cancelled during {:?}", self.phase);
            return Err(RenderError::Cancelled);
        }
        Ok(())
    }
}
