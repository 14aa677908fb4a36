use clap::Parser;
use tracing_subscriber::EnvFilter;

use fanout_ssh::Cli;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let stdout = std::io::stdout();
    if let Err(e) = fanout_ssh::run(&cli, &mut stdout.lock()).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
