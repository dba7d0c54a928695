use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Browse and manage a post board from the terminal
#[derive(Parser)]
#[command(name = "postboard", version)]
#[command(about = "Browse and manage a post board from the terminal", long_about = None)]
pub struct Cli {
    /// Config file (defaults to postboard.toml in the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database URL, overrides the config file
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List posts, newest first
    List {
        /// Case-insensitive title filter
        #[arg(short, long)]
        search: Option<String>,
        /// Page to show (1-based)
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// Show a post with its images
    Show {
        id: String,
        /// Open as the admin page (does not count a view)
        #[arg(long)]
        admin: bool,
        /// Report each image as it arrives
        #[arg(long, conflicts_with = "preload")]
        progressive: bool,
        /// Wait for every image before showing the post
        #[arg(long)]
        preload: bool,
    },
    /// Create a post
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        thumbnail: Option<PathBuf>,
        /// Detail image, up to three
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    /// Edit a post; omitted fields keep their current value
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        /// Replace the thumbnail
        #[arg(long)]
        thumbnail: Option<PathBuf>,
        /// Append a detail image (the post keeps at most three)
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    /// Delete a post and its detail images
    Delete { id: String },
    /// Remove one detail image
    RemoveImage {
        id: String,
        /// Image number as shown by `show` (1-based)
        n: usize,
    },
    /// Remove the thumbnail
    RemoveThumbnail { id: String },
}
