use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

/// Logs go to stderr so exported bytes can be piped from stdout.
/// Warnings (font fallback, unreadable inputs) are always shown; `verbose`
/// adds progress and layout details.
pub fn init(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let _ = fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .with_level(true)
        .without_time()
        .try_init();
    Ok(())
}
