use clap::Parser;
use gbmsim_io::cli::{run_calibrate_command, run_simulate_command, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Calibrate(args) => run_calibrate_command(args).await?,
        Commands::Simulate(args) => run_simulate_command(args).await?,
    }

    Ok(())
}
