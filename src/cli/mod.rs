// CLI module - command line interface and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(name = "certhound")]
#[command(about = "Real-time CT firehose monitor with wildcard scope filtering", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the monitoring pipeline
    Start {
        /// Path to the TOML configuration file
        #[arg(long = "config", value_name = "PATH", default_value = "certhound.toml")]
        config: PathBuf,

        /// Log level override (trace, debug, info, warn, error)
        #[arg(long = "log-level", value_name = "LEVEL")]
        log_level: Option<String>,
    },

    /// Print version information
    Version,
}
