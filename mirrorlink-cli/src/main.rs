//! mirrorlink — background file mirroring onto devices and directories.
//!
//! # Usage
//!
//! ```text
//! mirrorlink start <read-spec> <write-path> [--name <name>] [--path] [--recursive]
//!                  [--wipe-dest] [--skip-presave]
//! mirrorlink stop <id|last|all> [--clear]
//! mirrorlink restart <id|last|all>
//! mirrorlink clear <id|last|all> [--force]
//! mirrorlink list [id|last|all] [--abs-path]
//! mirrorlink ledger
//! mirrorlink detect
//! mirrorlink workspace save|load|list|current|delete|rename|export|import
//! mirrorlink config view|edit|reset
//! ```

mod commands;
mod device;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    clear::ClearArgs, config::ConfigCommand, list::ListArgs, restart::RestartArgs, run::RunArgs,
    start::StartArgs, stop::StopArgs, workspace::WorkspaceCommand,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "mirrorlink",
    version,
    about = "Mirror local files onto devices and directories in the background",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a background link mirroring files that match a read spec.
    Start(StartArgs),

    /// Stop running links.
    Stop(StopArgs),

    /// Restart stopped links under fresh ids.
    Restart(RestartArgs),

    /// Remove link records from the registry.
    Clear(ClearArgs),

    /// Show link records as a table.
    List(ListArgs),

    /// Show which mirror files each running link claims.
    Ledger,

    /// Report the device a `start` without --path would write to.
    Detect,

    /// Save, restore and manage workspace snapshots of the registry.
    Workspace {
        #[command(subcommand)]
        command: WorkspaceCommand,
    },

    /// View and edit persistent settings.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Engine process entry point; spawned internally by `start`.
    #[command(hide = true)]
    Run(RunArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Start(args) => args.run(),
        Commands::Stop(args) => args.run(),
        Commands::Restart(args) => args.run(),
        Commands::Clear(args) => args.run(),
        Commands::List(args) => args.run(),
        Commands::Ledger => commands::ledger::run(),
        Commands::Detect => commands::detect::run(),
        Commands::Workspace { command } => commands::workspace::run(command),
        Commands::Config { command } => commands::config::run(command),
        Commands::Run(args) => args.run(),
    }
}
