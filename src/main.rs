use std::path::PathBuf;

use clap::Parser;
use pmfeed_rs::config::{AppConfig, InstrumentConfig};
use pmfeed_rs::market_data::router;
use pmfeed_rs::telemetry;

/// Stream normalized Polymarket book deltas, quotes and trades.
#[derive(Debug, Parser)]
#[command(name = "pmfeed", version, about)]
struct Cli {
    /// TOML config file
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Log filter, overrides the config file (RUST_LOG still wins)
    #[arg(long)]
    log_filter: Option<String>,

    /// Extra instrument as `market:asset`, may be repeated
    #[arg(short, long = "instrument", value_parser = InstrumentConfig::parse_pair)]
    instruments: Vec<InstrumentConfig>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(Some(&cli.config))?;
    if let Some(filter) = cli.log_filter {
        config.log_filter = filter;
    }
    config.instruments.extend(cli.instruments);

    telemetry::init_tracing(&config.log_filter);
    telemetry::init_metrics(config.metrics_port)?;

    router::run(config).await
}
