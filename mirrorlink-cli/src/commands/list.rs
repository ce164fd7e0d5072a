//! `mirrorlink list` — tabular view of link records.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::settings::{locator::ByColumnName, Disable};
use tabled::{Table, Tabled};

use mirrorlink_core::{registry, settings, Link, LinkSelector};
use mirrorlink_daemon::supervisor;

/// Arguments for `mirrorlink list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Which links to show: an id, "last", or "all".
    #[arg(default_value = "all")]
    pub selector: LinkSelector,

    /// Show read paths as absolute instead of relative to the current
    /// directory.
    #[arg(long)]
    pub abs_path: bool,
}

#[derive(Tabled)]
struct LinkRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "read")]
    read: String,
    #[tabled(rename = "write")]
    write: String,
    #[tabled(rename = "created")]
    created: String,
    #[tabled(rename = "pid")]
    pid: String,
}

impl ListArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let settings = settings::load_at(&home).context("failed to load settings")?;

        let links = registry::select_at(&home, self.selector)
            .with_context(|| format!("no link matches '{}'", self.selector))?;
        if links.is_empty() {
            println!("no links in the registry");
            return Ok(());
        }

        let cwd = std::env::current_dir().ok();
        let rows: Vec<LinkRow> = links
            .iter()
            .map(|link| self.row(link, cwd.as_deref()))
            .collect();

        let mut table = Table::new(rows);
        super::apply_style(&mut table, &settings);
        if !settings.display.info.process_id {
            table.with(Disable::column(ByColumnName::new("pid")));
        }
        println!("{table}");
        Ok(())
    }

    fn row(&self, link: &Link, cwd: Option<&Path>) -> LinkRow {
        let read = link.config.base_dir.join(&link.config.read_spec);
        let read = if self.abs_path {
            read.display().to_string()
        } else {
            match cwd.and_then(|cwd| read.strip_prefix(cwd).ok()) {
                Some(rel) => rel.display().to_string(),
                None => read.display().to_string(),
            }
        };

        LinkRow {
            id: link.id.to_string(),
            name: link.display_name().to_owned(),
            status: status_label(link),
            read,
            write: link.config.write_path.display().to_string(),
            created: link.created_at.format("%Y-%m-%d %H:%M").to_string(),
            pid: link
                .pid
                .map(|p| p.to_string())
                .unwrap_or_else(|| "---".to_owned()),
        }
    }
}

fn status_label(link: &Link) -> String {
    if !link.active {
        return "stopped".to_string();
    }
    if supervisor::is_running(link) {
        "running".green().bold().to_string()
    } else {
        // Marked active but no live process behind it.
        "stale".yellow().bold().to_string()
    }
}
