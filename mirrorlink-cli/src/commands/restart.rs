//! `mirrorlink restart` — relaunch stopped links under fresh ids.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use mirrorlink_core::{registry, LinkSelector, RegistryError};
use mirrorlink_daemon::{supervisor, DaemonError};

/// Arguments for `mirrorlink restart`.
#[derive(Args, Debug)]
pub struct RestartArgs {
    /// Which links to restart: an id, "last", or "all".
    pub selector: LinkSelector,
}

impl RestartArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let exe = super::current_exe()?;

        let links = registry::select_at(&home, self.selector)
            .with_context(|| format!("no link matches '{}'", self.selector))?;
        if links.is_empty() {
            println!("no links to restart");
            return Ok(());
        }

        for link in &links {
            match supervisor::restart_at(&home, link.id, &exe) {
                Ok(fresh) => println!(
                    "{} link {} as link {}",
                    "restarted".green().bold(),
                    link.id,
                    fresh.id
                ),
                // Running links keep running; report and move on.
                Err(DaemonError::Registry(RegistryError::LinkActive { .. })) => println!(
                    "link {} is still running, not restarting it",
                    link.id
                ),
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("failed to restart link {}", link.id))
                }
            }
        }
        Ok(())
    }
}
