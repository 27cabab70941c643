//! CLI command definitions and handlers.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use studio_core::StudioConfig;

use crate::client::StudioClient;

pub mod approve;
pub mod compress;
pub mod design;
pub mod order;
pub mod select;
pub mod serve;
pub mod session;
pub mod try_on;

/// Dress Studio - sketch to tailor-ready dress designs
#[derive(Parser)]
#[command(name = "studio")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory (defaults to current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Configuration file (defaults to <project>/studio.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of a running studio server
    #[arg(
        long,
        global = true,
        env = "STUDIO_SERVER",
        default_value = "http://127.0.0.1:3030"
    )]
    pub server: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve(serve::ServeArgs),

    /// Compress an image the way uploads are compressed
    Compress(compress::CompressArgs),

    /// Upload drawings and generate design variations
    Design(design::DesignArgs),

    /// Choose the front/back design variations
    Select(select::SelectArgs),

    /// Generate a virtual try-on of the selected design
    TryOn(try_on::TryOnArgs),

    /// Fill in measurements and submit the order to the tailor
    Order(order::OrderArgs),

    /// Approve the current try-on and place an order
    Approve(approve::ApproveArgs),

    /// Inspect, navigate or reset the saved wizard session
    #[command(subcommand)]
    Session(session::SessionCommands),
}

/// Everything a command needs besides its own arguments.
pub struct Context {
    pub project_dir: PathBuf,
    pub config: StudioConfig,
    pub server: String,
}

impl Context {
    pub fn client(&self) -> StudioClient {
        StudioClient::new(&self.server, self.config.request_timeout_secs)
    }
}

/// Spinner shown while waiting on the server.
pub fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("  {spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

impl Cli {
    pub fn project_dir(&self) -> Result<PathBuf> {
        match &self.project {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("Failed to resolve current directory"),
        }
    }

    pub async fn execute(self) -> Result<()> {
        let project_dir = self.project_dir()?;
        let config_path = self
            .config
            .clone()
            .unwrap_or_else(|| project_dir.join("studio.toml"));
        let config = StudioConfig::load(Some(&config_path))
            .with_context(|| format!("Failed to load {}", config_path.display()))?;

        let ctx = Context {
            project_dir,
            config,
            server: self.server.trim_end_matches('/').to_string(),
        };

        match self.command {
            Commands::Serve(args) => serve::execute(args, &ctx).await,
            Commands::Compress(args) => compress::execute(args).await,
            Commands::Design(args) => design::execute(args, &ctx).await,
            Commands::Select(args) => select::execute(args, &ctx),
            Commands::TryOn(args) => try_on::execute(args, &ctx).await,
            Commands::Order(args) => order::execute(args, &ctx).await,
            Commands::Approve(args) => approve::execute(args, &ctx).await,
            Commands::Session(cmd) => session::execute(cmd, &ctx),
        }
    }
}
