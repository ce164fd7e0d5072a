//! `mirrorlink workspace` — snapshot and restore the link registry.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use mirrorlink_core::{workspace, WorkspaceName};

#[derive(Subcommand, Debug)]
pub enum WorkspaceCommand {
    /// Snapshot the current registry under a name.
    Save {
        name: String,
        /// Replace an existing snapshot of the same name.
        #[arg(long)]
        overwrite: bool,
    },

    /// Materialize a snapshot's links into the (empty) registry, stopped.
    Load { name: String },

    /// List saved workspace names.
    List,

    /// Show the workspace the registry was last loaded from or saved as.
    Current,

    /// Delete a saved workspace.
    Delete { name: String },

    /// Rename a saved workspace.
    Rename { old: String, new: String },

    /// Copy a workspace file out for sharing.
    Export {
        name: String,
        /// Target file, or a directory to place `<name>.yaml` in.
        #[arg(default_value = ".")]
        dest: PathBuf,
    },

    /// Bring an exported workspace file in under its embedded name.
    Import {
        file: PathBuf,
        /// Replace an existing workspace of the same name.
        #[arg(long)]
        overwrite: bool,
    },
}

pub fn run(command: WorkspaceCommand) -> Result<()> {
    let home = super::home()?;

    match command {
        WorkspaceCommand::Save { name, overwrite } => {
            let name = WorkspaceName::from(name);
            workspace::save_at(&home, &name, overwrite)
                .with_context(|| format!("failed to save workspace '{name}'"))?;
            println!("{} workspace '{name}'", "saved".green().bold());
        }
        WorkspaceCommand::Load { name } => {
            let name = WorkspaceName::from(name);
            let links = workspace::load_at(&home, &name)
                .with_context(|| format!("failed to load workspace '{name}'"))?;
            println!(
                "{} workspace '{name}' ({} links, stopped; use `mirrorlink restart all`)",
                "loaded".green().bold(),
                links.len()
            );
        }
        WorkspaceCommand::List => {
            let names = workspace::list_at(&home).context("failed to list workspaces")?;
            if names.is_empty() {
                println!("no saved workspaces");
            }
            for name in names {
                println!("{name}");
            }
        }
        WorkspaceCommand::Current => match workspace::current_at(&home)? {
            Some(name) => println!("{name}"),
            None => println!("no current workspace"),
        },
        WorkspaceCommand::Delete { name } => {
            let name = WorkspaceName::from(name);
            workspace::delete_at(&home, &name)
                .with_context(|| format!("failed to delete workspace '{name}'"))?;
            println!("{} workspace '{name}'", "deleted".red().bold());
        }
        WorkspaceCommand::Rename { old, new } => {
            let old = WorkspaceName::from(old);
            let new = WorkspaceName::from(new);
            workspace::rename_at(&home, &old, &new)
                .with_context(|| format!("failed to rename workspace '{old}'"))?;
            println!("{} workspace '{old}' -> '{new}'", "renamed".green().bold());
        }
        WorkspaceCommand::Export { name, dest } => {
            let name = WorkspaceName::from(name);
            let written = workspace::export_at(&home, &name, &dest)
                .with_context(|| format!("failed to export workspace '{name}'"))?;
            println!("{} {}", "exported".green().bold(), written.display());
        }
        WorkspaceCommand::Import { file, overwrite } => {
            let name = workspace::import_at(&home, &file, overwrite)
                .with_context(|| format!("failed to import '{}'", file.display()))?;
            println!("{} workspace '{name}'", "imported".green().bold());
        }
    }
    Ok(())
}
