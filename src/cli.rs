use clap::{Parser, Subcommand};

use crate::commands;
use crate::error::Result;

/// Bilibili archive checker - is the video in your tab on the Internet Archive?
#[derive(Parser)]
#[command(name = "bili-archive-checker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Host of the browser's remote debugging endpoint
    #[arg(long, env = "BILI_ARCHIVE_CDP_HOST", global = true)]
    pub cdp_host: Option<String>,

    /// Remote debugging port (browser started with --remote-debugging-port)
    #[arg(long, env = "BILI_ARCHIVE_CDP_PORT", global = true)]
    pub cdp_port: Option<u16>,

    /// CDP target id of the tab to follow (default: first video tab)
    #[arg(long, global = true)]
    pub target: Option<String>,

    /// Base URL of the archiver service that accepts archive requests
    #[arg(long, env = "BILI_ARCHIVE_ARCHIVER_URL", global = true)]
    pub archiver_url: Option<String>,

    /// Navigation poll interval in milliseconds
    #[arg(long, global = true)]
    pub interval: Option<u64>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the Internet Archive identifier of a video
    Encode {
        /// BV id, av id or video URL (e.g., "BV1xx411c7mD")
        video: String,

        /// Part number of a multi-part video
        #[arg(short, long)]
        page: Option<u32>,
    },

    /// Check one video without a browser
    Check {
        /// BV id, av id or video URL
        video: String,

        /// Part number of a multi-part video
        #[arg(short, long)]
        page: Option<u32>,
    },

    /// Check the video in the browser tab once
    Status,

    /// Follow the browser tab and re-check on every navigation
    Watch,

    /// Ask the archiver to preserve a video
    Archive {
        /// BV id, av id or video URL (default: the browser tab)
        video: Option<String>,

        /// Part number of a multi-part video
        #[arg(short, long)]
        page: Option<u32>,
    },

    /// Show a video's position in the archiver queue
    Queue {
        /// BV id, av id or video URL
        video: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "archiver.base_url")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Show configuration file path
    Path,

    /// Delete the configuration file
    Reset,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Encode { video, page } => commands::encode::run(self, video, *page).await,
            Commands::Check { video, page } => commands::check::run(self, video, *page).await,
            Commands::Status => commands::check::status(self).await,
            Commands::Watch => commands::watch::run(self).await,
            Commands::Archive { video, page } => {
                commands::archive::run(self, video.as_deref(), *page).await
            }
            Commands::Queue { video } => commands::archive::queue(self, video).await,
            Commands::Config { command } => commands::config::run(self, command).await,
        }
    }
}
