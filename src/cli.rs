use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "clearfetch", about = "Clearance-gated listing harvester")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the configured listing pages and extract records
    Harvest {
        /// Run the solver browser with a visible window
        #[arg(long)]
        headed: bool,

        /// Solve a fresh token before fetching, even if one is cached
        #[arg(long)]
        fresh: bool,
    },
    /// Mint a clearance token and append it to the token file
    Solve {
        /// Target URL (defaults to the configured site root)
        #[arg(long)]
        url: Option<String>,

        /// Token file to append to (defaults to the configured path)
        #[arg(short, long)]
        file: Option<String>,

        /// Solve timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Run the solver browser with a visible window
        #[arg(long)]
        headed: bool,
    },
    /// Write a plain-text summary of previously harvested records
    Export {
        /// Output file
        #[arg(short, long, default_value = "listing_summary.txt")]
        output: String,
    },
}
