use clap::{Args, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;

/// Fewest points used to estimate a graph's y range.
pub const MIN_RANGE_SAMPLES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UiMode {
    /// Full-screen terminal interface
    Tui,
    /// Line editor in the current terminal
    Line,
}

impl UiMode {
    /// The front end used when `--mode` is not given.
    pub fn for_build() -> Self {
        if cfg!(feature = "tui") {
            UiMode::Tui
        } else {
            UiMode::Line
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Values the graph dialog offers when the user just presses Enter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphDefaults {
    pub width: usize,
    pub height: usize,
    pub x_min: f64,
    pub x_max: f64,
    pub density: usize,
}

impl Default for GraphDefaults {
    fn default() -> Self {
        GraphDefaults {
            width: 80,
            height: 25,
            x_min: -10.0,
            x_max: 10.0,
            density: 1,
        }
    }
}

/// Samples taken to estimate the y range: twice the plotted points, at least [`MIN_RANGE_SAMPLES`].
pub fn range_samples(width: usize, density: usize) -> usize {
    width
        .saturating_mul(density)
        .saturating_mul(2)
        .max(MIN_RANGE_SAMPLES)
}

/// Options of the `calc` subcommand.
#[derive(Debug, Clone, Args)]
pub struct CalcArgs {
    /// Front end to run
    #[arg(long, value_enum)]
    pub mode: Option<UiMode>,

    /// Default graph width in characters
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Default graph height in characters
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Default left end of the graphed x range
    #[arg(long, default_value_t = -10.0, allow_negative_numbers = true)]
    pub x_min: f64,

    /// Default right end of the graphed x range
    #[arg(long, default_value_t = 10.0, allow_negative_numbers = true)]
    pub x_max: f64,

    /// Default samples per graph column
    #[arg(long, default_value_t = 1)]
    pub density: usize,

    /// Log verbosity
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Write log records to this file instead of the terminal
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: UiMode,
    pub graph: GraphDefaults,
    pub log_level: LevelFilter,
    pub log_file: Option<PathBuf>,
}

impl From<CalcArgs> for Settings {
    fn from(args: CalcArgs) -> Self {
        Settings {
            mode: args.mode.unwrap_or_else(UiMode::for_build),
            graph: GraphDefaults {
                width: args.width,
                height: args.height,
                x_min: args.x_min,
                x_max: args.x_max,
                density: args.density.max(1),
            },
            log_level: args.log_level.into(),
            log_file: args.log_file,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            mode: UiMode::for_build(),
            graph: GraphDefaults::default(),
            log_level: LevelFilter::Warn,
            log_file: None,
        }
    }
}
