use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{debug, info};

use chat_export_rust::export::{DEFAULT_TITLE, ExportFile, ExportFormat, ExportRequest, export};
use chat_export_rust::render::{CancellationToken, FontSource};
use chat_export_rust::settings::{self, Settings};
use chat_export_rust::style::StyleOverride;
use chat_export_rust::timestamp::DefaultTimestampFormatter;
use chat_export_rust::{Conversation, ExportError, load_conversation, logging};

#[derive(Parser, Debug)]
#[command(
    name = "chat-export-rust",
    version,
    about = "Export a multi-agent conversation to PNG, SVG, JSON, Markdown or text"
)]
struct Cli {
    /// Conversation JSON file ({"agents": [...], "messages": [...]})
    input: PathBuf,

    /// Output formats, comma separated (png, svg, json, md, txt)
    #[arg(short = 'f', long = "format", default_value = "png", value_delimiter = ',')]
    formats: Vec<ExportFormat>,

    /// Base file name for the exported files (default from settings [export])
    #[arg(short = 'n', long = "name")]
    name: Option<String>,

    /// Title used by the JSON, Markdown and text transcripts
    #[arg(short = 't', long = "title")]
    title: Option<String>,

    /// Directory the exported files are written to
    #[arg(short = 'o', long = "output-dir")]
    output_dir: Option<PathBuf>,

    /// Write the export to stdout instead of a file (single format only)
    #[arg(long = "stdout")]
    stdout: bool,

    /// Theme name (dark, light, custom)
    #[arg(long = "theme")]
    theme: Option<String>,

    /// Device scale for the exported image
    #[arg(long = "scale")]
    scale: Option<f32>,

    /// Base font size in logical pixels
    #[arg(long = "font-size")]
    font_size: Option<f32>,

    /// Document and bubble padding in logical pixels
    #[arg(long = "padding")]
    padding: Option<f32>,

    /// Corner radius of message bubbles
    #[arg(long = "border-radius")]
    border_radius: Option<f32>,

    /// CSS-like font family list (e.g. "Inter, sans-serif")
    #[arg(long = "font-family")]
    font_family: Option<String>,

    /// Font file used for PNG text instead of the system fonts
    #[arg(long = "font-path")]
    font_path: Option<PathBuf>,

    /// Hide message timestamps
    #[arg(long = "no-timestamps")]
    no_timestamps: bool,

    /// Hide model badges
    #[arg(long = "no-models")]
    no_models: bool,

    /// Hide agent avatars
    #[arg(long = "no-avatars")]
    no_avatars: bool,

    /// CSS file embedded into SVG exports
    #[arg(long = "custom-css")]
    custom_css: Option<PathBuf>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

struct ExportPlan {
    conversation: Conversation,
    formats: Vec<ExportFormat>,
    name: String,
    title: String,
    style: StyleOverride,
    font_source: FontSource,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    if cli.stdout && cli.formats.len() != 1 {
        return Err(anyhow!("--stdout needs exactly one --format"));
    }
    let settings = settings::load_settings(cli.read_settings.as_deref())?;
    let output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| settings.output_dir.clone());
    let to_stdout = cli.stdout;
    let plan = build_plan(cli, settings)?;

    let token = CancellationToken::new();
    let trigger = token.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, cancelling export");
            trigger.cancel();
        }
    });

    let worker = tokio::task::spawn_blocking(move || run_exports(&plan, &token));
    let outcome = worker.await.context("export worker stopped unexpectedly")?;
    signal.abort();

    let files = match outcome {
        Ok(files) => files,
        Err(err) if err.is_cancelled() => {
            eprintln!("export cancelled");
            std::process::exit(130);
        }
        Err(err) => return Err(err.into()),
    };

    if to_stdout {
        let mut stdout = io::stdout().lock();
        for file in &files {
            stdout.write_all(&file.bytes)?;
        }
        stdout.flush()?;
        return Ok(());
    }
    for file in &files {
        let path = file.save(&output_dir)?;
        println!("{}", path.display());
    }
    Ok(())
}

fn build_plan(cli: Cli, settings: Settings) -> Result<ExportPlan> {
    let conversation = load_conversation(&cli.input)?;
    debug!(
        "loaded {} agents and {} messages from {}",
        conversation.agents.len(),
        conversation.messages.len(),
        cli.input.display()
    );

    let custom_css = match &cli.custom_css {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read custom css: {}", path.display()))?,
        ),
        None => None,
    };

    let mut style = settings.style;
    style.merge(StyleOverride {
        theme: cli.theme,
        border_radius: cli.border_radius,
        padding: cli.padding,
        font_size: cli.font_size,
        font_family: cli.font_family,
        show_timestamps: cli.no_timestamps.then_some(false),
        show_models: cli.no_models.then_some(false),
        show_agent_avatars: cli.no_avatars.then_some(false),
        custom_css,
        scale: cli.scale,
        ..StyleOverride::default()
    });

    let font_source = match cli.font_path.or(settings.font_path) {
        Some(path) => FontSource::File(path),
        None => FontSource::System,
    };

    Ok(ExportPlan {
        conversation,
        formats: cli.formats,
        name: cli.name.unwrap_or(settings.export_name),
        title: cli.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        style,
        font_source,
    })
}

fn run_exports(plan: &ExportPlan, token: &CancellationToken) -> Result<Vec<ExportFile>, ExportError> {
    let formatter = DefaultTimestampFormatter;
    let request = ExportRequest {
        name: &plan.name,
        title: &plan.title,
        messages: &plan.conversation.messages,
        agents: plan.conversation.agents.as_slice(),
        style: &plan.style,
        formatter: &formatter,
        font_source: plan.font_source.clone(),
    };

    let mut files = Vec::with_capacity(plan.formats.len());
    for &format in &plan.formats {
        let mut last_logged = -1.0_f32;
        let mut progress = |percent: f32| {
            if format.is_graphical() && (percent - last_logged >= 10.0 || percent >= 100.0) {
                last_logged = percent;
                info!("{}: {:.0}%", format, percent);
            }
        };
        files.push(export(&request, format, token, &mut progress)?);
    }
    Ok(files)
}
