//! `mirrorlink start` — validate, create, and spawn a new link.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use mirrorlink_core::{workspace, LinkConfig};
use mirrorlink_daemon::supervisor;
use mirrorlink_engine::PathMatcher;

use crate::device;

/// Arguments for `mirrorlink start`.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Literal file path or glob pattern to mirror, relative to the current
    /// directory.
    pub read_spec: String,

    /// Destination directory. Joined onto the detected device mount unless
    /// --path is given.
    pub write_path: PathBuf,

    /// Friendly name shown in listings.
    #[arg(long)]
    pub name: Option<String>,

    /// Use the write path exactly as given instead of joining it onto a
    /// detected device.
    #[arg(long)]
    pub path: bool,

    /// Match the pattern in subdirectories of the current directory too.
    #[arg(short, long)]
    pub recursive: bool,

    /// Recursively wipe the destination before the initial save.
    #[arg(long)]
    pub wipe_dest: bool,

    /// Skip the initial full copy pass; only changes made after start sync.
    #[arg(long)]
    pub skip_presave: bool,
}

impl StartArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let base_dir = std::env::current_dir().context("could not read current directory")?;

        let matcher = PathMatcher::new(&self.read_spec, &base_dir, self.recursive)
            .with_context(|| format!("invalid read spec '{}'", self.read_spec))?;
        if self.recursive && !matcher.is_pattern() {
            bail!("--recursive only applies to glob patterns, not literal paths");
        }
        if !matcher.is_pattern() {
            matcher
                .resolve()
                .with_context(|| format!("cannot start link for '{}'", self.read_spec))?;
        }
        let spec_path = Path::new(&self.read_spec);
        if spec_path.is_absolute() && !spec_path.starts_with(&base_dir) {
            bail!(
                "absolute read path '{}' must live under the current directory '{}'",
                spec_path.display(),
                base_dir.display()
            );
        }

        let write_path = if self.path {
            self.write_path.clone()
        } else {
            device::find_device()?.join(&self.write_path)
        };
        ensure_writable(&write_path)?;

        let config = LinkConfig {
            name: self.name,
            read_spec: self.read_spec,
            recursive: self.recursive,
            write_path,
            base_dir,
            absolute: self.path,
            wipe_dest: self.wipe_dest,
            skip_presave: self.skip_presave,
        };

        let exe = super::current_exe()?;
        let link =
            supervisor::spawn_at(&home, config, &exe).context("failed to start the link")?;

        // The registry no longer matches any loaded snapshot.
        workspace::set_current_at(&home, None)?;

        println!(
            "{} link {} -> {}",
            "started".green().bold(),
            link.id,
            link.config.write_path.display()
        );
        Ok(())
    }
}

/// The destination must exist (created if needed) and accept writes before a
/// detached process is pointed at it.
fn ensure_writable(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("cannot create write path '{}'", path.display()))?;
    let probe = path.join(".mirrorlink-write-probe");
    fs::write(&probe, b"")
        .with_context(|| format!("write path '{}' is not writable", path.display()))?;
    let _ = fs::remove_file(&probe);
    Ok(())
}
