use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::error::ExportError;
use crate::model::{AgentDirectory, Message};
use crate::render::{self, Cancellation, FontSource, ProgressSink};
use crate::style::{Backend, StyleOverride, resolve_style};
use crate::timestamp::TimestampFormatter;
use crate::transcript;

pub const DEFAULT_EXPORT_NAME: &str = "conversation";
pub const DEFAULT_TITLE: &str = "Conversation Export";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Svg,
    Json,
    Markdown,
    Text,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 5] = [
        ExportFormat::Png,
        ExportFormat::Svg,
        ExportFormat::Json,
        ExportFormat::Markdown,
        ExportFormat::Text,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Svg => "svg",
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
            ExportFormat::Text => "txt",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Svg => "image/svg+xml",
            ExportFormat::Json => "application/json",
            ExportFormat::Markdown => "text/markdown",
            ExportFormat::Text => "text/plain",
        }
    }

    /// Graphical formats go through layout and a render job.
    pub fn is_graphical(&self) -> bool {
        matches!(self, ExportFormat::Png | ExportFormat::Svg)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExportFormat::Png => "PNG",
            ExportFormat::Svg => "SVG",
            ExportFormat::Json => "JSON",
            ExportFormat::Markdown => "Markdown",
            ExportFormat::Text => "text",
        };
        f.write_str(label)
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" | "image" => Ok(ExportFormat::Png),
            "svg" => Ok(ExportFormat::Svg),
            "json" => Ok(ExportFormat::Json),
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            "txt" | "text" => Ok(ExportFormat::Text),
            other => Err(format!(
                "unsupported export format '{}' (expected png, svg, json, md or txt)",
                other
            )),
        }
    }
}

/// A finished export, ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
    /// Problems that did not stop the export but degraded its output.
    pub warnings: Vec<String>,
}

impl ExportFile {
    fn new(name: &str, format: ExportFormat, bytes: Vec<u8>) -> Self {
        Self {
            file_name: format!("{}.{}", sanitize_name(name), format.extension()),
            mime: format.mime(),
            bytes,
            warnings: Vec::new(),
        }
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory: {}", dir.display()))?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)
            .with_context(|| format!("failed to write export: {}", path.display()))?;
        Ok(path)
    }
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            ch if ch.is_control() => '-',
            ch => ch,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        DEFAULT_EXPORT_NAME.to_string()
    } else {
        cleaned
    }
}

pub struct ExportRequest<'a, A: AgentDirectory + ?Sized> {
    pub name: &'a str,
    pub title: &'a str,
    pub messages: &'a [Message],
    pub agents: &'a A,
    pub style: &'a StyleOverride,
    pub formatter: &'a dyn TimestampFormatter,
    pub font_source: FontSource,
}

/// Produces `format` for the request.
///
/// Cancellation comes back as [`ExportError::Cancelled`]; every other failure
/// is wrapped with the name of the format that failed.
pub fn export<A>(
    request: &ExportRequest<'_, A>,
    format: ExportFormat,
    cancel: &dyn Cancellation,
    progress: &mut dyn ProgressSink,
) -> Result<ExportFile, ExportError>
where
    A: AgentDirectory + ?Sized,
{
    debug!(
        "exporting {} messages as {}",
        request.messages.len(),
        format
    );
    let mut warnings = Vec::new();
    let bytes = match format {
        ExportFormat::Png => {
            let style = resolve_style(request.style, Backend::Raster);
            let surface = render::render_canvas(
                request.messages,
                request.agents,
                &style,
                request.formatter,
                &request.font_source,
                cancel,
                progress,
            )
            .map_err(|err| ExportError::from_render(format, err))?;
            if !surface.font_status().paints_text() {
                warnings.push("no usable font was found; text was not painted".to_string());
            }
            surface
                .encode_png()
                .map_err(|err| ExportError::failed(format, err))?
        }
        ExportFormat::Svg => {
            if cancel.is_cancelled() {
                return Err(ExportError::Cancelled);
            }
            let style = resolve_style(request.style, Backend::Vector);
            let svg =
                render::render_svg(request.messages, request.agents, &style, request.formatter)
                    .map_err(|err| ExportError::from_render(format, err))?;
            progress.report(100.0);
            svg.into_bytes()
        }
        ExportFormat::Json => {
            transcript::to_json(request.title, request.messages, request.agents)
                .map_err(|err| ExportError::failed(format, err))?
                .into_bytes()
        }
        ExportFormat::Markdown => transcript::to_markdown(
            request.title,
            request.messages,
            request.agents,
            request.formatter,
        )
        .into_bytes(),
        ExportFormat::Text => transcript::to_text(
            request.title,
            request.messages,
            request.agents,
            request.formatter,
        )
        .into_bytes(),
    };
    let mut file = ExportFile::new(request.name, format, bytes);
    for warning in &warnings {
        warn!("{}: {}", file.file_name, warning);
    }
    file.warnings = warnings;
    info!("exported {} ({} bytes)", file.file_name, file.bytes.len());
    Ok(file)
}
