//! Web server command.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::Context;

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, default_value = "3030")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Also write logs to a file
    #[arg(long)]
    pub log: bool,

    /// Log file path (defaults to <project>/.studio/serve.log)
    #[arg(long, requires = "log")]
    pub log_file: Option<PathBuf>,
}

pub async fn execute(args: ServeArgs, ctx: &Context) -> Result<()> {
    let config = ctx.config.clone();
    let provider_status = |configured: bool| {
        if configured {
            "configured".green()
        } else {
            "missing".red()
        }
    };

    println!();
    println!("  {} {}", "Dress Studio".cyan().bold(), "API Server".bold());
    println!();
    println!("  {}       http://{}:{}/api", "API".green(), args.host, args.port);
    println!("  {}    http://{}:{}/health", "Health".green(), args.host, args.port);
    println!();
    println!(
        "  {}    {}",
        "OpenAI".bold(),
        provider_status(config.openai_api_key.is_some())
    );
    println!(
        "  {}    {}",
        "Fal AI".bold(),
        provider_status(config.fal_api_key.is_some())
    );
    println!(
        "  {}    {} MB per file",
        "Upload".bold(),
        config.max_upload_mb()
    );
    println!();
    println!("  {}", "Ctrl+C to stop".dimmed());
    println!();

    studio_web::run_server(config, &args.host, args.port).await?;

    Ok(())
}
