pub mod clear;
pub mod config;
pub mod detect;
pub mod ledger;
pub mod list;
pub mod restart;
pub mod run;
pub mod start;
pub mod stop;
pub mod workspace;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tabled::settings::Style;
use tabled::Table;

use mirrorlink_core::Settings;

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Path of this binary, re-invoked as `mirrorlink run <id>` for each spawn.
pub(crate) fn current_exe() -> Result<PathBuf> {
    std::env::current_exe().context("could not determine the mirrorlink binary path")
}

/// Style a table per the `display.table.format` setting; unknown names fall
/// back to the rounded default.
pub(crate) fn apply_style(table: &mut Table, settings: &Settings) {
    match settings.display.table.format.as_str() {
        "ascii" => table.with(Style::ascii()),
        "modern" => table.with(Style::modern()),
        "sharp" => table.with(Style::sharp()),
        "markdown" => table.with(Style::markdown()),
        "blank" => table.with(Style::blank()),
        _ => table.with(Style::rounded()),
    };
}
