//! `mirrorlink config` — view and edit persistent settings.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use mirrorlink_core::settings;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show a setting by dot path, or everything.
    View {
        /// Dot path such as `display.table.format`; omit for the whole tree.
        #[arg(default_value = "all")]
        key: String,
    },

    /// Change one setting. The new value must match the existing type.
    Edit {
        /// Dot path such as `display.info.process-id`.
        key: String,
        value: String,
    },

    /// Restore the default settings.
    Reset,
}

pub fn run(command: ConfigCommand) -> Result<()> {
    let home = super::home()?;

    match command {
        ConfigCommand::View { key } => {
            let value = settings::view_at(&home, &key)
                .with_context(|| format!("no setting at '{key}'"))?;
            let rendered = serde_yaml::to_string(&value).context("failed to render setting")?;
            print!("{rendered}");
        }
        ConfigCommand::Edit { key, value } => {
            settings::edit_at(&home, &key, &value)
                .with_context(|| format!("cannot set '{key}'"))?;
            println!("{} {key} = {value}", "set".green().bold());
        }
        ConfigCommand::Reset => {
            settings::reset_at(&home).context("failed to reset settings")?;
            println!("{} settings to defaults", "reset".yellow().bold());
        }
    }
    Ok(())
}
