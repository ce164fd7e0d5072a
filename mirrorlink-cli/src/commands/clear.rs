//! `mirrorlink clear` — remove link records from the registry.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use mirrorlink_core::{registry, workspace, LinkSelector};

/// Arguments for `mirrorlink clear`.
#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Which links to clear: an id, "last", or "all".
    pub selector: LinkSelector,

    /// Remove records even for links still marked active. The backing
    /// process notices its record is gone and shuts down.
    #[arg(long)]
    pub force: bool,
}

impl ClearArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;

        let links = registry::select_at(&home, self.selector)
            .with_context(|| format!("no link matches '{}'", self.selector))?;
        if links.is_empty() {
            println!("no links to clear");
            return Ok(());
        }

        for link in &links {
            registry::remove_at(&home, link.id, self.force).with_context(|| {
                format!("cannot clear link {} (stop it first, or use --force)", link.id)
            })?;
            println!("{} link {}", "cleared".red().bold(), link.id);
        }

        workspace::set_current_at(&home, None)?;
        Ok(())
    }
}
