pub mod error;
pub mod export;
pub mod logging;
pub mod markdown;
pub mod model;
pub mod render;
pub mod settings;
pub mod style;
pub mod timestamp;
pub mod transcript;

#[cfg(test)]
mod test_util;

pub use error::{ExportError, RenderError};
pub use export::{ExportFile, ExportFormat, ExportRequest, export};
pub use markdown::strip_markdown;
pub use model::{Agent, AgentDirectory, Conversation, Message, load_conversation};
pub use render::{
    Cancellation, CancellationToken, FontSource, NeverCancelled, NoProgress, ProgressSink,
    RenderJob, RenderPhase, Renderer,
};
pub use settings::{Settings, load_settings};
pub use style::{Backend, ExportStyle, StyleOverride, Theme, resolve_style};
pub use timestamp::{DefaultTimestampFormatter, TimestampFormatter, format_timestamp};
