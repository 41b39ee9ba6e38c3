use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Context;
use env_logger::{Builder, Target};
use log::LevelFilter;

/// Route warnings and debug traces to the companion log file. Stderr stays
/// reserved for the progress bar and user-facing prompts.
pub fn init(log_file: &Path, debug: bool) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("unable to open log file: {}", log_file.display()))?;
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    Builder::new()
        .filter_level(level)
        .target(Target::Pipe(Box::new(file)))
        .try_init()
        .context("logger already initialized")?;
    Ok(())
}
