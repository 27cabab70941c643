//! Design step: drawings in, variations out.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use studio_core::model::{DesignVariation, UploadedImage};
use studio_core::wizard::WizardState;

use super::{spinner, Context};
use crate::client::{prepare_upload, Upload};
use crate::state::Session;

#[derive(Args)]
pub struct DesignArgs {
    /// Front drawing (required unless one is already in the session)
    #[arg(short, long)]
    pub front: Option<PathBuf>,

    /// Back drawing
    #[arg(short, long)]
    pub back: Option<PathBuf>,

    /// Drop the back drawing kept in the session
    #[arg(long, conflicts_with = "back")]
    pub no_back: bool,

    /// Free-text description of the dress
    #[arg(short, long)]
    pub description: Option<String>,

    /// Primary color as a hex value, e.g. #8b0000
    #[arg(short, long)]
    pub color: Option<String>,
}

pub async fn execute(args: DesignArgs, ctx: &Context) -> Result<()> {
    let mut session = Session::open(&ctx.project_dir)?;

    if let Some(path) = &args.front {
        let image = UploadedImage::from_path(session.registry(), path)?;
        session.wizard.set_front_drawing(image);
    }
    if let Some(path) = &args.back {
        let image = UploadedImage::from_path(session.registry(), path)?;
        session.wizard.set_back_drawing(image);
    } else if args.no_back {
        session.wizard.remove_back_drawing();
    }
    if let Some(description) = args.description {
        session.wizard.set_description(description);
    }
    if let Some(color) = args.color {
        session.wizard.set_color(normalize_color(&color)?);
    }
    session.save()?;

    let Some(front) = session.wizard.front_drawing() else {
        bail!("No front drawing in the session. Pass one with --front <image>.");
    };
    let front = to_upload(front).await?;
    let back = match session.wizard.back_drawing() {
        Some(image) => Some(to_upload(image).await?),
        None => None,
    };

    let bar = spinner("Generating design variations...");
    let result = ctx
        .client()
        .generate_design(
            front,
            back,
            session.wizard.description(),
            session.wizard.color(),
        )
        .await;
    bar.finish_and_clear();
    let response = result?;

    session.wizard.set_variations(response.variations);
    session.save()?;

    println!("{}", "Design variations generated".green().bold());
    print_variations(&session.wizard);
    println!();
    println!(
        "Next: {}",
        "studio select --front <id> [--back <id>]".cyan()
    );
    Ok(())
}

async fn to_upload(image: &UploadedImage) -> Result<Upload> {
    prepare_upload(&image.file_name, image.bytes.clone()).await
}

/// Print the session's variations, marking the selected ones.
pub fn print_variations(wizard: &WizardState) {
    let selected = |variation: &DesignVariation| {
        wizard.selected_front().map(|v| v.id.as_str()) == Some(variation.id.as_str())
            || wizard.selected_back().map(|v| v.id.as_str()) == Some(variation.id.as_str())
    };
    for variation in wizard.variations() {
        let marker = if selected(variation) {
            "●".green()
        } else {
            "○".dimmed()
        };
        println!(
            "  {} {:<8} {}",
            marker,
            variation.id.bold(),
            variation.description
        );
        println!("             {}", shorten(&variation.image_url).dimmed());
    }
}

fn shorten(reference: &str) -> String {
    if reference.starts_with("data:") {
        let mime = reference
            .trim_start_matches("data:")
            .split(';')
            .next()
            .unwrap_or("image");
        format!("<inline {}, {} KB>", mime, reference.len() * 3 / 4 / 1024)
    } else {
        reference.to_string()
    }
}

fn normalize_color(color: &str) -> Result<String> {
    let hex = color.trim().trim_start_matches('#');
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(format!("#{}", hex.to_lowercase()))
    } else {
        bail!("Invalid color '{}'. Use a hex value such as #8b0000.", color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_color() {
        assert_eq!(normalize_color("8B0000").unwrap(), "#8b0000");
        assert_eq!(normalize_color(" #00ff7f ").unwrap(), "#00ff7f");
        assert!(normalize_color("red").is_err());
    }

    #[test]
    fn test_shorten_inline() {
        assert_eq!(shorten("https://x.test/a.png"), "https://x.test/a.png");
        assert!(shorten("data:image/jpeg;base64,AAAA").starts_with("<inline image/jpeg"));
    }
}
