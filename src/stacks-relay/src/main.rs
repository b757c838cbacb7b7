use clap::Parser;
use cli::RelayCli;

mod cli;
mod relay;

const PACKAGE: &str = env!("CARGO_PKG_NAME");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = RelayCli::parse();

    init_logger(&cli.log_level)?;

    log::info!("{PACKAGE}");
    log::info!("----------------------");
    log::info!("- network: {}", cli.network);
    log::info!("- request_timeout_secs: {}", cli.request_timeout_secs);
    log::info!("----------------------");

    cli.exec().await
}

fn init_logger(log_level: &str) -> anyhow::Result<()> {
    let level = log_level
        .parse::<log::LevelFilter>()
        .unwrap_or(log::LevelFilter::Info);

    env_logger::Builder::new().filter(None, level).try_init()?;

    Ok(())
}
