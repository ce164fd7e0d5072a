//! `mirrorlink ledger` — tabular view of which mirror files each link claims.

use anyhow::{Context, Result};
use tabled::settings::{locator::ByColumnName, Disable};
use tabled::{Table, Tabled};

use mirrorlink_core::{ledger, settings, LedgerEntry};

#[derive(Tabled)]
struct LedgerRow {
    #[tabled(rename = "write path")]
    write_path: String,
    #[tabled(rename = "link")]
    link: String,
    #[tabled(rename = "pid")]
    pid: String,
}

pub fn run() -> Result<()> {
    let home = super::home()?;
    let settings = settings::load_at(&home).context("failed to load settings")?;

    let entries = ledger::load_at(&home).context("failed to load the write ledger")?;
    if entries.is_empty() {
        println!("no ledger entries; no running link has mirrored a file yet");
        return Ok(());
    }

    let rows: Vec<LedgerRow> = entries.iter().map(row).collect();
    let mut table = Table::new(rows);
    super::apply_style(&mut table, &settings);
    if !settings.display.info.process_id {
        table.with(Disable::column(ByColumnName::new("pid")));
    }
    println!("{table}");
    Ok(())
}

fn row(entry: &LedgerEntry) -> LedgerRow {
    LedgerRow {
        write_path: entry.write_path.display().to_string(),
        link: entry.link_id.to_string(),
        pid: entry.pid.to_string(),
    }
}
