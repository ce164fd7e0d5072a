//! `mirrorlink stop` — cooperative shutdown of running links.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use mirrorlink_core::{registry, workspace, LinkSelector};
use mirrorlink_daemon::supervisor;

/// Arguments for `mirrorlink stop`.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Which links to stop: an id, "last", or "all".
    pub selector: LinkSelector,

    /// Also remove the records after stopping.
    #[arg(long)]
    pub clear: bool,
}

impl StopArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;

        let mut links = registry::select_at(&home, self.selector)
            .with_context(|| format!("no link matches '{}'", self.selector))?;
        if matches!(self.selector, LinkSelector::All) {
            links.retain(|l| l.active);
        }
        if links.is_empty() {
            println!("no running links to stop");
            return Ok(());
        }

        for link in &links {
            supervisor::terminate_at(&home, link.id, false)
                .with_context(|| format!("failed to stop link {}", link.id))?;
            println!("{} link {}", "stopped".yellow().bold(), link.id);
            if self.clear {
                registry::remove_at(&home, link.id, false)
                    .with_context(|| format!("failed to clear link {}", link.id))?;
                println!("{} link {}", "cleared".red().bold(), link.id);
            }
        }
        if self.clear {
            workspace::set_current_at(&home, None)?;
        }
        Ok(())
    }
}
