use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "vitatrack",
    about = "Daily health plan tracking & statistics service"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the API server and the daily provisioning scheduler.
    Service,
    /// Run the provisioning job once, synchronously.
    Provision {
        #[arg(long)]
        date: Option<String>,
    },
    /// Recompute the daily statistic for one user and day.
    Recalculate {
        #[arg(long)]
        user: String,
        #[arg(long)]
        date: Option<String>,
    },
    Status,
    Doctor,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}
