//! `mirrorlink detect` — report the device a deviceless `start` would use.

use anyhow::Result;
use colored::Colorize;

use crate::device;

pub fn run() -> Result<()> {
    match device::find_device() {
        Ok(path) => println!("{} {}", "device detected:".green().bold(), path.display()),
        Err(_) => println!("no device detected"),
    }
    Ok(())
}
