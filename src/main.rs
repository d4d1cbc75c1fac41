mod app;
mod candidate;
mod config;
mod dispatch;
mod error;
mod input;
mod logging;
mod overlay;
mod platform;
mod selection;
mod window_source;

use crate::config::{config_write_path, load_config, save_config, ConfigHandle, SwitcherConfig};
use crate::input::keys::ShortcutSlot;
use crate::logging::LogArgs;
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

/// Keyboard-driven application and window switcher.
#[derive(Debug, Parser)]
#[command(name = "app-switcher", version, about)]
struct Cli {
    /// Open the settings file in the default editor and exit
    #[arg(long)]
    settings: bool,

    /// Start by capturing a new binding for this shortcut
    #[arg(long, value_enum, value_name = "SLOT")]
    rebind: Option<ShortcutSlot>,

    #[command(flatten)]
    log: LogArgs,
}

fn open_settings() -> error::Result<()> {
    let path = config_write_path().ok_or_else(|| error::Error::Os("no config directory".into()))?;
    if !path.is_file() {
        save_config(&path, &SwitcherConfig::default())?;
    }
    info!(path = %path.display(), "opening settings");
    open::that(&path)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log);

    if cli.settings {
        return match open_settings() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "failed to open settings");
                ExitCode::FAILURE
            }
        };
    }

    let config = ConfigHandle::new(load_config());
    let platform = match platform::connect() {
        Ok(platform) => platform,
        Err(e) => {
            error!(error = %e, "window system unavailable");
            return ExitCode::FAILURE;
        }
    };
    match app::run(platform, config, cli.rebind) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "switcher stopped");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let cases: [(&[&str], bool, Option<ShortcutSlot>); 4] = [
            (&["app-switcher"], false, None),
            (&["app-switcher", "--settings"], true, None),
            (&["app-switcher", "--rebind", "trigger"], false, Some(ShortcutSlot::Trigger)),
            (&["app-switcher", "--rebind", "new-window", "--debug"], false, Some(ShortcutSlot::NewWindow)),
        ];
        for (argv, settings, rebind) in cases {
            let cli = Cli::try_parse_from(argv).unwrap();
            assert_eq!(cli.settings, settings, "argv: {argv:?}");
            assert_eq!(cli.rebind, rebind, "argv: {argv:?}");
        }
        assert!(Cli::try_parse_from(["app-switcher", "--rebind", "bogus"]).is_err());
    }
}
