mod cli;
mod commands;
mod config;
mod model;
mod rules;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::config::ParserConfig;

fn main() {
    let cli = Cli::parse();

    // Logging is not up yet when the config fails to load.
    let config = match ParserConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            init_tracing(&ParserConfig::default().log_filter);
            report_failure(&err);
        }
    };
    init_tracing(&config.log_filter);

    if let Err(err) = run(cli, &config) {
        report_failure(&err);
    }
}

fn run(cli: Cli, config: &ParserConfig) -> Result<()> {
    match cli.command {
        Commands::Inventory(args) => commands::inventory::run(args),
        Commands::Ingest(args) => commands::ingest::run(args, config, cli.config.as_deref()),
        Commands::Status(args) => commands::status::run(args),
        Commands::Query(args) => commands::query::run(args),
    }
}

fn report_failure(err: &anyhow::Error) -> ! {
    error!(error = %err, "command failed");
    for cause in err.chain().skip(1) {
        error!(cause = %cause, "caused by");
    }
    std::process::exit(1);
}

fn init_tracing(default_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
