//! `mirrorlink run <id>` — hidden entry point of the detached engine process.

use anyhow::Result;
use clap::Args;

use mirrorlink_core::LinkId;
use mirrorlink_daemon::runtime;

/// Arguments for the hidden `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Registry id of the link to drive.
    pub id: u64,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        runtime::run_link_at(&home, LinkId(self.id))?;
        Ok(())
    }
}
