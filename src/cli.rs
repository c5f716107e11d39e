use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Srt,
}

#[derive(Parser)]
#[command(
    name = "ytscribe",
    about = "YouTube transcript server and client",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Config file (default: ~/.config/ytscribe/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write logs to stderr instead of the log file
    #[arg(long, global = true)]
    pub log_stderr: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the transcript API server
    Serve {
        /// Address to listen on
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Fetch a transcript from a running server
    Get {
        /// YouTube video URL
        url: String,

        /// Transcript language by display name, e.g. "Spanish"
        #[arg(short, long)]
        lang: Option<String>,

        /// Output format: text (default), json, srt
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Omit [HH:MM:SS] prefixes from text output
        #[arg(long)]
        no_timestamps: bool,

        /// Write output to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the languages the transcript is available in and exit
        #[arg(long)]
        list_languages: bool,

        /// Server base URL (default from config, else http://127.0.0.1:3000)
        #[arg(long)]
        server: Option<String>,

        /// Show video title, thumbnail and languages
        #[arg(short, long)]
        verbose: bool,
    },
}
