mod calc_engine;
mod commands;
mod config;
mod error;
mod format;
#[cfg(feature = "line")]
mod line_mode;
mod logging;
mod menu;
mod plot;
#[cfg(feature = "tui")]
mod render_help;
mod sampler;
mod series;
mod session;
#[cfg(feature = "tui")]
mod tui_mode;

use anyhow::{bail, Result};
use commands::{cli, dispatch, Dispatch};
use config::{Settings, UiMode};

fn run_calculator(settings: &Settings) -> Result<()> {
    match settings.mode {
        #[cfg(feature = "tui")]
        UiMode::Tui => tui_mode::run_tui(settings),
        #[cfg(feature = "line")]
        UiMode::Line => line_mode::run_line(settings),
        #[allow(unreachable_patterns)]
        mode => bail!("{:?} mode is not available in this build", mode),
    }
}

fn main() -> Result<()> {
    let matches = cli().get_matches();

    match dispatch(&matches).unwrap_or_else(|e| e.exit()) {
        Dispatch::Help => {
            cli().print_help()?;
            println!();
        }
        Dispatch::NotImplemented(spec) => println!("{}", spec.not_implemented_message()),
        Dispatch::Calculator(args) => {
            let settings = Settings::from(args);
            logging::init(&settings)?;
            log::debug!("starting calculator with {:?}", settings);
            run_calculator(&settings)?;
        }
    }
    Ok(())
}
