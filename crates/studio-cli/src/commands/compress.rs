//! Image compression command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use studio_core::compress::{compress_image_async, CompressOptions, ImageSource};

#[derive(Args)]
pub struct CompressArgs {
    /// Image to compress
    pub input: PathBuf,

    /// Output path (defaults to the input name with a .jpg extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value = "1024")]
    pub max_width: u32,

    #[arg(long, default_value = "1536")]
    pub max_height: u32,

    /// Initial JPEG quality, 0.1 to 0.95
    #[arg(long, default_value = "0.8")]
    pub quality: f64,

    /// Byte budget in KiB
    #[arg(long, default_value = "1024")]
    pub max_kb: usize,

    /// Print every encode attempt
    #[arg(long)]
    pub history: bool,
}

pub async fn execute(args: CompressArgs) -> Result<()> {
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let original_size = bytes.len();
    let name = args
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let options = CompressOptions {
        max_width: args.max_width,
        max_height: args.max_height,
        quality: args.quality,
        max_bytes: args.max_kb * 1024,
        ..CompressOptions::default()
    };
    let result = compress_image_async(ImageSource::bytes(name, bytes), options).await?;

    let output = args
        .output
        .unwrap_or_else(|| args.input.with_file_name(&result.file_name));
    std::fs::write(&output, &result.bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} {} → {}",
        "✓".green(),
        args.input.display(),
        output.display().to_string().cyan()
    );
    println!(
        "  {:>10} → {:>10}  {}x{}  quality {:.2}  {} retries",
        format_size(original_size),
        format_size(result.bytes.len()),
        result.width,
        result.height,
        result.quality,
        result.retries()
    );

    if args.history {
        println!();
        println!("  {:<4} {:<11} {:<8} {}", "#", "Size", "Quality", "Bytes");
        for (i, attempt) in result.history.iter().enumerate() {
            println!(
                "  {:<4} {:<11} {:<8.2} {}",
                i + 1,
                format!("{}x{}", attempt.width, attempt.height),
                attempt.quality,
                attempt.size
            );
        }
    }

    Ok(())
}

fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}
