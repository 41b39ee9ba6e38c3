use clap::Parser;

use rompick::cli::Cli;
use rompick::config::Config;
use rompick::{logging, selector};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::try_from(cli)?;
    logging::init(&config.log_file, config.debug)?;

    selector::run(&config)
}
