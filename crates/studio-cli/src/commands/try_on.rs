//! Try-on step.

use anyhow::{bail, Context as _, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use studio_core::model::{TryOnResponse, TryOnResult, UploadedImage};
use studio_core::wizard::WizardStep;

use super::{spinner, Context};
use crate::client::{prepare_upload, StudioClient, Upload};
use crate::state::{last_try_on_path, state_dir, Session};

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum TryOnModelArg {
    #[default]
    #[value(name = "fal-ai")]
    FalAi,
    #[value(name = "openai")]
    OpenAi,
}

impl TryOnModelArg {
    fn as_str(self) -> &'static str {
        match self {
            Self::FalAi => "fal-ai",
            Self::OpenAi => "openai",
        }
    }
}

#[derive(Args)]
pub struct TryOnArgs {
    /// Photo of the person (kept in the session once given)
    #[arg(long)]
    pub person: Option<PathBuf>,

    /// Garment photo to use instead of the selected front design
    #[arg(long)]
    pub clothing: Option<PathBuf>,

    /// Try-on backend
    #[arg(short, long, value_enum, default_value_t = TryOnModelArg::FalAi)]
    pub model: TryOnModelArg,

    /// Save the generated image here
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn execute(args: TryOnArgs, ctx: &Context) -> Result<()> {
    let mut session = Session::open(&ctx.project_dir)?;
    let client = ctx.client();

    if let Some(path) = &args.person {
        let image = UploadedImage::from_path(session.registry(), path)?;
        session.wizard.set_person_image(image);
    }
    if let Some(path) = &args.clothing {
        let image = UploadedImage::from_path(session.registry(), path)?;
        session.wizard.set_clothing_image(image);
    }
    session.save()?;

    let Some(person) = session.wizard.person_image() else {
        bail!("No photo of you in the session. Pass one with --person <image>.");
    };
    let person = prepare_upload(&person.file_name, person.bytes.clone()).await?;
    let garment = garment_upload(&session, &client).await?;

    let bar = spinner("Generating virtual try-on...");
    let result = client.try_on(person, garment, args.model.as_str()).await;
    bar.finish_and_clear();
    let response = result?;

    session
        .wizard
        .set_try_on_result(TryOnResult::now(response.image_url.clone()));
    if session.wizard.max_reachable_step() == WizardStep::Order {
        session.wizard.go_to(WizardStep::Order)?;
    }
    session.save()?;

    std::fs::create_dir_all(state_dir(&ctx.project_dir))?;
    std::fs::write(
        last_try_on_path(&ctx.project_dir),
        serde_json::to_vec_pretty(&response)?,
    )?;

    print_response(&response);

    if let Some(output) = &args.output {
        let (_, bytes) = client.fetch_image(&response.image_url).await?;
        std::fs::write(output, bytes)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("  {} {}", "Saved".green(), output.display());
    }

    println!();
    println!(
        "Next: {} or {}",
        "studio order".cyan(),
        "studio approve".cyan()
    );
    Ok(())
}

/// The explicit garment photo, else the selected front design.
async fn garment_upload(session: &Session, client: &StudioClient) -> Result<Upload> {
    if let Some(clothing) = session.wizard.clothing_image() {
        return prepare_upload(&clothing.file_name, clothing.bytes.clone()).await;
    }
    let Some(design) = session.wizard.selected_front() else {
        bail!("No garment to try on. Select a front design or pass --clothing <image>.");
    };
    if is_placeholder(&design.image_url) {
        bail!(
            "Design {} could not be generated and only has a placeholder. Pass --clothing <image> instead.",
            design.id
        );
    }
    let (_, bytes) = client
        .fetch_image(&design.image_url)
        .await
        .with_context(|| format!("Design {} has no usable image", design.id))?;
    prepare_upload(&format!("design-{}.jpg", design.id), bytes).await
}

/// Variations the server could not generate point at its placeholder SVG.
fn is_placeholder(url: &str) -> bool {
    url.starts_with("/placeholder.svg")
}

fn print_response(response: &TryOnResponse) {
    println!("{}", "Try-on generated".green().bold());
    println!(
        "  {} {} ({}, {})",
        "Provider".bold(),
        response.provider,
        response.model_used,
        response.method
    );
    println!("  {}     {}", "Time".bold(), response.processing_time);

    if let Some(person) = &response.person_details {
        println!();
        println!("  {}", "You".bold());
        println!("    Body type  {}", person.body_type);
        println!("    Age range  {}", person.age_range);
        println!("    Height     {}", person.height);
        println!(
            "    Chest/Waist/Hips/Shoulders  {} / {} / {} / {}",
            person.measurements.chest,
            person.measurements.waist,
            person.measurements.hips,
            person.measurements.shoulders
        );
        println!("    Confidence {}", person.analysis_confidence);
    }
    if let Some(clothing) = &response.clothing_details {
        println!();
        println!("  {}", "Garment".bold());
        println!("    Type       {}", clothing.clothing_type);
        println!(
            "    Colors     {}{}",
            clothing.primary_color,
            clothing
                .secondary_color
                .as_deref()
                .map(|c| format!(", {}", c))
                .unwrap_or_default()
        );
        println!("    Style      {} / {}", clothing.style, clothing.fit);
        println!("    Material   {}", clothing.material);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_core::model::{DesignVariation, Orientation};

    fn variation(id: &str, image_url: &str) -> DesignVariation {
        DesignVariation {
            id: id.to_string(),
            image_url: image_url.to_string(),
            orientation: Orientation::Front,
            description: String::new(),
        }
    }

    #[test]
    fn test_is_placeholder() {
        assert!(is_placeholder(
            "/placeholder.svg?height=600&width=400&query=elegant_dress_design_variation_1_ff0066"
        ));
        assert!(!is_placeholder("https://img.test/front-1.png"));
        assert!(!is_placeholder("data:image/jpeg;base64,/9j/"));
    }

    #[tokio::test]
    async fn test_placeholder_design_asks_for_clothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::open(dir.path()).unwrap();
        session.wizard.set_variations(vec![variation(
            "front_1",
            "/placeholder.svg?height=600&width=400&query=elegant_dress_design_variation_1_000000",
        )]);
        session.wizard.select_front("front_1").unwrap();

        let client = StudioClient::new("http://127.0.0.1:9", 1);
        let err = garment_upload(&session, &client).await.unwrap_err();
        assert!(err.to_string().contains("--clothing"));
        assert!(err.to_string().contains("front_1"));
    }
}
