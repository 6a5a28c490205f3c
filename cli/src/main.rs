//! Vouch - provision, verify, and tear down ephemeral cloud instances

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vouch_cli::cli::Cli;
use vouch_cli::output::json::format_error;

#[tokio::main]
async fn main() {
    // Logs go to stderr so `--json` output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;
    if let Err(e) = cli.run().await {
        // stdout may already hold a summary document, so errors stay on stderr.
        match format_error(&format!("{e:#}"), "failed") {
            Ok(obj) if json => eprintln!("{obj}"),
            _ => eprintln!("Error: {e:#}"),
        }
        std::process::exit(1);
    }
}
