//! Order step: tailor form and submission.

use anyhow::{bail, Context as _, Result};
use chrono::{SecondsFormat, Utc};
use clap::Args;
use colored::Colorize;
use dialoguer::Input;
use studio_core::model::TailorField;
use studio_core::order::{DesignImages, OrderRequest};
use studio_core::wizard::{WizardState, WizardStep};

use super::{spinner, Context};
use crate::state::Session;

#[derive(Args)]
pub struct OrderArgs {
    #[arg(long)]
    pub name: Option<String>,

    /// Email or phone number
    #[arg(long)]
    pub contact: Option<String>,

    /// Bust in cm
    #[arg(long)]
    pub bust: Option<String>,

    /// Waist in cm
    #[arg(long)]
    pub waist: Option<String>,

    /// Hips in cm
    #[arg(long)]
    pub hips: Option<String>,

    /// Shoulders in cm
    #[arg(long)]
    pub shoulders: Option<String>,

    /// Height in cm
    #[arg(long)]
    pub height: Option<String>,

    /// Weight in kg
    #[arg(long)]
    pub weight: Option<String>,

    /// Notes for the tailor
    #[arg(long)]
    pub notes: Option<String>,

    /// Prompt for every field
    #[arg(short, long)]
    pub interactive: bool,

    /// Save the form without submitting it
    #[arg(long)]
    pub save_only: bool,
}

impl OrderArgs {
    fn updates(&self) -> Vec<(TailorField, &str)> {
        [
            (TailorField::FullName, &self.name),
            (TailorField::Contact, &self.contact),
            (TailorField::Bust, &self.bust),
            (TailorField::Waist, &self.waist),
            (TailorField::Hips, &self.hips),
            (TailorField::Shoulders, &self.shoulders),
            (TailorField::Height, &self.height),
            (TailorField::Weight, &self.weight),
            (TailorField::AdditionalNotes, &self.notes),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|value| (field, value)))
        .collect()
    }
}

pub async fn execute(args: OrderArgs, ctx: &Context) -> Result<()> {
    let mut session = Session::open(&ctx.project_dir)?;
    session.wizard.go_to(WizardStep::Order)?;

    for (field, value) in args.updates() {
        session.wizard.update_tailor_field(field, value.trim());
    }
    if args.interactive {
        prompt_form(&mut session.wizard)?;
    }
    session.save()?;

    if args.save_only {
        println!("{}", "Tailor form saved".green());
        return Ok(());
    }
    if !session.wizard.tailor_form().is_submittable() {
        bail!("Please fill in your name and contact information (--name, --contact).");
    }

    let order = build_order(&session.wizard);
    let bar = spinner("Submitting order to tailor...");
    let result = ctx.client().submit_order(&order).await;
    bar.finish_and_clear();
    let response = result?;

    println!("{}", response.message.green().bold());
    println!("  {} {}", "Order".bold(), response.order_id.cyan());
    Ok(())
}

/// The order as the tailor receives it: the form plus the chosen designs.
pub fn build_order(wizard: &WizardState) -> OrderRequest {
    OrderRequest {
        form: wizard.tailor_form().clone(),
        design_images: DesignImages {
            front: wizard.selected_front().map(|v| v.id.clone()),
            back: wizard.selected_back().map(|v| v.id.clone()),
        },
        try_on_image: wizard.try_on_result().map(|r| r.image_url.clone()),
        timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    }
}

fn prompt_form(wizard: &mut WizardState) -> Result<()> {
    let form = wizard.tailor_form().clone();
    let fields = [
        (TailorField::FullName, "Full name", form.full_name),
        (TailorField::Contact, "Email or phone", form.contact),
        (TailorField::Bust, "Bust (cm)", form.bust),
        (TailorField::Waist, "Waist (cm)", form.waist),
        (TailorField::Hips, "Hips (cm)", form.hips),
        (TailorField::Shoulders, "Shoulders (cm)", form.shoulders),
        (TailorField::Height, "Height (cm)", form.height),
        (TailorField::Weight, "Weight (kg)", form.weight),
        (TailorField::AdditionalNotes, "Notes for the tailor", form.additional_notes),
    ];
    for (field, prompt, current) in fields {
        let value: String = Input::new()
            .with_prompt(prompt)
            .default(current)
            .allow_empty(true)
            .interact_text()
            .with_context(|| format!("Failed to read {}", prompt.to_lowercase()))?;
        wizard.update_tailor_field(field, value.trim());
    }
    Ok(())
}
