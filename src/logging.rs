use crate::config::{Settings, UiMode};
use anyhow::{Context, Result};
use simplelog::*;
use std::fs::File;

/// Installs the global logger. The full-screen interface owns the terminal, so it only ever
/// logs to a file.
pub fn init(settings: &Settings) -> Result<()> {
    let level = settings.log_level;
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();

    if let Some(path) = &settings.log_file {
        let file = File::create(path)
            .with_context(|| format!("cannot create log file {}", path.display()))?;
        loggers.push(WriteLogger::new(level, Config::default(), file));
    } else if settings.mode == UiMode::Line {
        loggers.push(TermLogger::new(
            level,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }

    if !loggers.is_empty() {
        CombinedLogger::init(loggers)
            .map_err(|e| anyhow::anyhow!("failed to initialise logging: {}", e))?;
    }
    Ok(())
}
