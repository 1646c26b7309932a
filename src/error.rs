use thiserror::Error;

use crate::export::ExportFormat;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("export cancelled")]
    Cancelled,
    #[error("rendering surface unavailable ({width}x{height})")]
    RenderingUnavailable { width: u32, height: u32 },
    #[error("failed to encode output: {0:#}")]
    Encode(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export cancelled")]
    Cancelled,
    #[error("failed to export {format}: {error:#}")]
    Failed {
        format: ExportFormat,
        error: anyhow::Error,
    },
}

impl ExportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExportError::Cancelled)
    }

    pub(crate) fn failed(format: ExportFormat, source: impl Into<anyhow::Error>) -> Self {
        ExportError::Failed {
            format,
            error: source.into(),
        }
    }

    pub(crate) fn from_render(format: ExportFormat, err: RenderError) -> Self {
        match err {
            RenderError::Cancelled => ExportError::Cancelled,
            other => ExportError::failed(format, other),
        }
    }
}
