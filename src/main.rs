// CertHound - Real-time Certificate Transparency firehose monitor

use anyhow::Result;
use certhound::cli::{Cli, Command};
use certhound::daemon::{Daemon, RunOutcome};
use certhound::Config;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Version => {
            println!("certhound v{}", env!("CARGO_PKG_VERSION"));
            println!("Real-time CT firehose monitor");
            Ok(())
        }
        Command::Start { config, log_level } => {
            let config_path = config;

            let config = match Config::from_file(&config_path) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Configuration error: {}", e);
                    std::process::exit(1);
                }
            };

            init_logging(&config, log_level.as_deref());
            display_banner();
            info!("Loaded configuration from {}", config_path.display());

            let daemon = Daemon::new(config);
            match daemon.run().await {
                Ok(RunOutcome::Clean) => Ok(()),
                Ok(RunOutcome::Interrupted) => std::process::exit(130),
                Ok(RunOutcome::Forced) => std::process::exit(1),
                Err(e) => {
                    eprintln!("Fatal: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Initialize tracing; precedence: --log-level, RUST_LOG, config
fn init_logging(config: &Config, override_level: Option<&str>) {
    let directive = override_level
        .map(String::from)
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| config.logging.level.clone());

    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.logging.console_colors)
        .init();
}

fn display_banner() {
    println!(
        r#"
   ________________  ________  ______  __  ___   ______
  / ____/ ____/ __ \/_  __/ / / / __ \/ / / / | / / __ \
 / /   / __/ / /_/ / / / / /_/ / / / / / / /  |/ / / / /
/ /___/ /___/ _, _/ / / / __  / /_/ / /_/ / /|  / /_/ /
\____/_____/_/ |_| /_/ /_/ /_/\____/\____/_/ |_/_____/

    CT firehose monitor v{}
    "#,
        env!("CARGO_PKG_VERSION")
    );
}
