//! Dress Studio CLI
//!
//! Runs the studio API server and drives the design → try-on → order wizard
//! against it from the terminal.

use anyhow::Result;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod client;
mod commands;
mod state;

use commands::{Cli, Commands};

const SERVER_FILTER: &str = "studio=info,studio_web=debug,studio_core=info,tower_http=debug";
const CLIENT_FILTER: &str = "studio=warn,studio_core=warn";

/// Initialize tracing with optional file logging.
///
/// The returned guard flushes the file writer and must outlive the command.
fn init_tracing(log_file: Option<&std::path::Path>, serving: bool) -> Option<WorkerGuard> {
    let default_filter = if serving { SERVER_FILTER } else { CLIENT_FILTER };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if let Some(path) = log_file {
        let directory = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let _ = std::fs::create_dir_all(directory);
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "serve.log".into());

        let appender = tracing_appender::rolling::never(directory, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);

        // Log to both stdout and file when --log is used
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false),
            )
            .init();
        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
        None
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let serving = matches!(&cli.command, Commands::Serve(_));
    let log_file = match &cli.command {
        Commands::Serve(args) if args.log => {
            let project_dir = cli.project_dir()?;
            Some(
                args.log_file
                    .clone()
                    .unwrap_or_else(|| project_dir.join(".studio/serve.log")),
            )
        }
        _ => None,
    };

    let _guard = init_tracing(log_file.as_deref(), serving || cli.verbose);

    cli.execute().await
}
