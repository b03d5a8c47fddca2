use anyhow::Result;
use clap::Parser;
use receivables::cli::Cli;
use receivables::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_filter(), cli.log_format)?;
    cli.run().await
}
