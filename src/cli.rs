use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "beatscoin")]
#[command(author, version, about = "Audio-to-Opus conversion server and client")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the conversion server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send audio files to a server and save the converted results
    Convert {
        /// Files to convert, one after another
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Server base URL (overrides config)
        #[arg(long)]
        server: Option<String>,

        /// Directory to save artifacts into
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Print status lines without the typing delay
        #[arg(long)]
        no_delay: bool,

        /// Add tokens to the balance before converting
        #[arg(long, value_name = "TOKENS")]
        top_up: Option<u64>,
    },

    /// Check that the configured encoder is available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
