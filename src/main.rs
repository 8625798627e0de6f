// CLI binary entry point for chunkio

mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Config;

/// Environment variable overriding the log filter
const LOG_ENV: &str = "CHUNKIO_LOG";

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(config.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_logging(&config);
    cli::run(config)?;
    Ok(())
}
