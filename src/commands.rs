use crate::config::CalcArgs;
use clap::{Arg, ArgAction, ArgMatches, Args, Command, FromArgMatches};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Calculator,
    /// Listed so the name is reserved and documented, but there is nothing to run.
    NotImplemented,
}

#[derive(Debug)]
pub struct CommandSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub about: &'static str,
    /// How the command is referred to in messages.
    pub label: &'static str,
    pub handler: Handler,
}

impl CommandSpec {
    pub fn not_implemented_message(&self) -> String {
        format!("The {} command is not yet implemented.", self.label)
    }
}

pub const REGISTRY: &[CommandSpec] = &[
    CommandSpec {
        name: "calc",
        aliases: &[],
        about: "Perform mathematical and graphing calculations",
        label: "'calc'",
        handler: Handler::Calculator,
    },
    CommandSpec {
        name: "hpc",
        aliases: &[],
        about: "High Precision/Performance Calculator (no graphing)",
        label: "'hpc' (High Precision/Performance Calculator)",
        handler: Handler::NotImplemented,
    },
    CommandSpec {
        name: "cc",
        aliases: &[],
        about: "Cache and garbage collection for pacman and marked git repos, remove unused packages",
        label: "'cc' (cache cleaner)",
        handler: Handler::NotImplemented,
    },
    CommandSpec {
        name: "mark",
        aliases: &[],
        about: "Mark files for recalling and garbage collection for git repos",
        label: "'mark'",
        handler: Handler::NotImplemented,
    },
    CommandSpec {
        name: "au",
        aliases: &[],
        about: "Running pacman -Syu and mkinitcpio as a service",
        label: "'au'",
        handler: Handler::NotImplemented,
    },
    CommandSpec {
        name: "autotune",
        aliases: &["at"],
        about: "Auto tune your system for better power efficiency and performance",
        label: "'autotune'",
        handler: Handler::NotImplemented,
    },
    CommandSpec {
        name: "resmgr",
        aliases: &["rm"],
        about: "Show temps, cpu, gpu, ram usage",
        label: "'rm' (Resource Manager)",
        handler: Handler::NotImplemented,
    },
];

pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    REGISTRY
        .iter()
        .find(|spec| spec.name == name || spec.aliases.iter().any(|alias| *alias == name))
}

/// What `main` has to do for a parsed command line.
#[derive(Debug)]
pub enum Dispatch {
    Help,
    Calculator(CalcArgs),
    NotImplemented(&'static CommandSpec),
}

pub fn cli() -> Command {
    let mut command = Command::new("smctl")
        .about("smctl - A Powerful system manager for Arch-based distro")
        .version(env!("CARGO_PKG_VERSION"))
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .short('v')
                .long("version")
                .action(ArgAction::Version)
                .help("Display version information"),
        );

    for spec in REGISTRY {
        let mut sub = Command::new(spec.name)
            .about(spec.about)
            .visible_aliases(spec.aliases.iter().copied());
        if spec.handler == Handler::Calculator {
            sub = CalcArgs::augment_args(sub);
        }
        command = command.subcommand(sub);
    }
    command
}

pub fn dispatch(matches: &ArgMatches) -> Result<Dispatch, clap::Error> {
    let Some((name, sub_matches)) = matches.subcommand() else {
        return Ok(Dispatch::Help);
    };
    let Some(spec) = lookup(name) else {
        return Ok(Dispatch::Help);
    };

    match spec.handler {
        Handler::Calculator => Ok(Dispatch::Calculator(CalcArgs::from_arg_matches(sub_matches)?)),
        Handler::NotImplemented => {
            log::info!("'{}' is registered without an implementation", spec.name);
            Ok(Dispatch::NotImplemented(spec))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UiMode;

    fn parse(args: &[&str]) -> Dispatch {
        let matches = cli().try_get_matches_from(args.iter().copied()).unwrap();
        dispatch(&matches).unwrap()
    }

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn stubs_report_not_implemented() {
        for name in ["hpc", "cc", "mark", "au", "autotune", "at", "resmgr", "rm"] {
            match parse(&["smctl", name]) {
                Dispatch::NotImplemented(spec) => assert_eq!(spec.handler, Handler::NotImplemented),
                other => panic!("{} dispatched to {:?}", name, other),
            }
        }
    }

    #[test]
    fn stub_message_names_the_command() {
        let spec = lookup("cc").unwrap();
        assert_eq!(
            spec.not_implemented_message(),
            "The 'cc' (cache cleaner) command is not yet implemented."
        );
        assert_eq!(lookup("rm").map(|s| s.name), Some("resmgr"));
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn calc_carries_its_options() {
        match parse(&["smctl", "calc", "--mode", "line", "--height", "12"]) {
            Dispatch::Calculator(args) => {
                assert_eq!(args.mode, Some(UiMode::Line));
                assert_eq!(args.height, 12);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn lowercase_v_prints_the_version() {
        for flag in ["-v", "--version"] {
            let err = cli().try_get_matches_from(["smctl", flag]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        }
        let err = cli().try_get_matches_from(["smctl", "-V"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn no_subcommand_means_help() {
        assert!(matches!(parse(&["smctl"]), Dispatch::Help));
    }
}
