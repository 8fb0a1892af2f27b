use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera Index (default 0)
    #[arg(short, long, default_value_t = 0)]
    pub cam_index: u32,

    /// Configuration file (created with defaults if missing)
    #[arg(long, default_value = rusty_jewels::config::DEFAULT_PATH)]
    pub config: PathBuf,

    /// Category to open at startup, e.g. gold_earrings
    #[arg(long)]
    pub category: Option<String>,

    /// Override the configured mirror mode
    #[arg(long)]
    pub mirror: Option<bool>,

    /// Show anchor markers from the start
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// List available cameras
    #[arg(long)]
    pub list: bool,
}
