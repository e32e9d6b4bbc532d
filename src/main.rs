use clap::Parser;
use log::LevelFilter;

mod auth;
mod cli;
mod commands;
mod dates;
mod error;
mod format;
mod freshbooks;
mod invoice;
mod models;
mod pagination;
mod resources;
mod storage;
mod timer;
mod weekly;

use cli::Opts;

fn main() {
    let opts = Opts::parse();

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    if let Err(error) = commands::run(opts.command) {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}
