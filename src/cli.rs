// ABOUTME: Command-line interface definitions using clap
// ABOUTME: Defines all subcommands and global flags

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pixseek")]
#[command(about = "Rank a folder of images by similarity to an image or text query", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override model directory (defaults to <data-dir>/models)
    #[arg(long, global = true)]
    pub model_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn parse_score(s: &str) -> Result<f32, String> {
    let score: f32 = s.parse().map_err(|_| "Expected a number")?;
    if !(0.0..=1.0).contains(&score) {
        return Err("Score must be between 0 and 1".into());
    }
    Ok(score)
}

fn parse_positive(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|_| "Expected a whole number")?;
    if n == 0 {
        return Err("Must be at least 1".into());
    }
    Ok(n)
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Search a folder for images similar to a query
    #[command(group(ArgGroup::new("query").required(true).args(["image", "text"])))]
    Search {
        /// Folder to scan recursively
        folder: PathBuf,

        /// Query image
        #[arg(long)]
        image: Option<PathBuf>,

        /// Query text
        #[arg(long)]
        text: Option<String>,

        /// Drop results scoring below this value (0..=1)
        #[arg(long, default_value_t = 0.0, value_parser = parse_score)]
        min_score: f32,

        /// Files embedded per batch
        #[arg(long, default_value_t = crate::model::DEFAULT_BATCH_SIZE, value_parser = parse_positive)]
        batch_size: usize,

        /// Concurrent encodes per batch
        #[arg(long, default_value_t = crate::search::DEFAULT_WORKERS, value_parser = parse_positive)]
        workers: usize,

        /// Skip content descriptions for image queries
        #[arg(long)]
        no_describe: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the last search and its results (default)
    Last {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download the CLIP model files
    FetchModel,

    /// Run the MCP tool server on stdio
    #[cfg(feature = "mcp")]
    Serve,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Last { json: false })
    }
}
