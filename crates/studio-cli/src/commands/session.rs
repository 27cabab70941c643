//! Session inspection and navigation.

use anyhow::Result;
use clap::{Subcommand, ValueEnum};
use colored::Colorize;
use studio_core::model::UploadedImage;
use studio_core::wizard::{WizardState, WizardStep};

use super::design::print_variations;
use super::Context;
use crate::state::Session;

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Show everything kept in the session
    Show,

    /// Move to a wizard step
    Step {
        #[arg(value_enum)]
        step: StepArg,
    },

    /// Move to the next step
    Next,

    /// Move to the previous step
    Back,

    /// Discard the session
    Reset {
        /// Confirm destructive operation
        #[arg(long)]
        confirm: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StepArg {
    Design,
    TryOn,
    Order,
}

impl From<StepArg> for WizardStep {
    fn from(step: StepArg) -> Self {
        match step {
            StepArg::Design => WizardStep::Design,
            StepArg::TryOn => WizardStep::TryOn,
            StepArg::Order => WizardStep::Order,
        }
    }
}

pub fn execute(cmd: SessionCommands, ctx: &Context) -> Result<()> {
    let mut session = Session::open(&ctx.project_dir)?;

    match cmd {
        SessionCommands::Show => show(&session.wizard),
        SessionCommands::Step { step } => {
            session.wizard.go_to(step.into())?;
            session.save()?;
            print_progress(&session.wizard);
        }
        SessionCommands::Next => {
            session.wizard.next()?;
            session.save()?;
            print_progress(&session.wizard);
        }
        SessionCommands::Back => {
            session.wizard.back();
            session.save()?;
            print_progress(&session.wizard);
        }
        SessionCommands::Reset { confirm } => {
            if !confirm {
                println!("{}", "This will discard the saved session:".red().bold());
                println!("  {} drawings, photos and design variations", "•".red());
                println!("  {} the try-on result and tailor form", "•".red());
                println!();
                println!("Run with {} to confirm.", "--confirm".bold());
                return Ok(());
            }
            session.clear(&ctx.project_dir)?;
            println!("{} Session reset", "✓".green());
        }
    }
    Ok(())
}

fn print_progress(wizard: &WizardState) {
    let current = wizard.step();
    let reachable = wizard.max_reachable_step();
    let steps: Vec<String> = WizardStep::ALL
        .iter()
        .map(|&step| {
            let label = format!("{}. {}", step.index() + 1, step.label());
            if step == current {
                label.cyan().bold().to_string()
            } else if step <= reachable {
                label
            } else {
                label.dimmed().to_string()
            }
        })
        .collect();
    println!("  {}", steps.join(" → "));
}

fn show(wizard: &WizardState) {
    println!("{}", "Dress Studio session".bold());
    print_progress(wizard);

    println!();
    println!("{}", "Images".bold());
    print_image("Front drawing", wizard.front_drawing());
    print_image("Back drawing", wizard.back_drawing());
    print_image("Person photo", wizard.person_image());
    print_image("Garment photo", wizard.clothing_image());

    println!();
    println!("{}", "Design".bold());
    let description = wizard.description();
    println!(
        "  Description  {}",
        if description.is_empty() { "-" } else { description }
    );
    println!("  Color        {}", wizard.color());
    if !wizard.variations().is_empty() {
        print_variations(wizard);
    }

    if let Some(result) = wizard.try_on_result() {
        println!();
        println!("{}", "Try-on".bold());
        println!("  {}", result.image_url);
        println!("  at {}", result.timestamp.format("%Y-%m-%d %H:%M"));
    }

    let form = wizard.tailor_form();
    let fields = [
        ("Name", &form.full_name),
        ("Contact", &form.contact),
        ("Bust", &form.bust),
        ("Waist", &form.waist),
        ("Hips", &form.hips),
        ("Shoulders", &form.shoulders),
        ("Height", &form.height),
        ("Weight", &form.weight),
        ("Notes", &form.additional_notes),
    ];
    if fields.iter().any(|(_, value)| !value.is_empty()) {
        println!();
        println!("{}", "Tailor form".bold());
        for (label, value) in fields.iter().filter(|(_, value)| !value.is_empty()) {
            println!("  {:<12} {}", label, value);
        }
    }
}

fn print_image(label: &str, image: Option<&UploadedImage>) {
    match image {
        Some(image) => println!(
            "  {:<14} {} ({} KB)",
            label,
            image.file_name,
            image.size().div_ceil(1024)
        ),
        None => println!("  {:<14} {}", label, "-".dimmed()),
    }
}
