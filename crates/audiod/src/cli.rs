use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "audiod", version)]
pub struct Args {
    /// Optional daemon config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Sound card listing file
    #[arg(long)]
    pub cards_file: Option<PathBuf>,

    /// Root directory holding the per-card state nodes
    #[arg(long)]
    pub cards_root: Option<PathBuf>,

    /// Audio service notification socket (datagram); log-only when unset
    #[arg(long)]
    pub service_socket: Option<PathBuf>,

    /// List detected sound cards with their current state and exit
    #[arg(long)]
    pub list_cards: bool,
}
