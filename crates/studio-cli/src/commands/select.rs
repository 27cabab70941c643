//! Variation selection.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use studio_core::wizard::WizardStep;

use super::design::print_variations;
use super::Context;
use crate::state::Session;

#[derive(Args)]
pub struct SelectArgs {
    /// Front variation id, e.g. front_1
    #[arg(short, long)]
    pub front: Option<String>,

    /// Back variation id, e.g. back_2
    #[arg(short, long)]
    pub back: Option<String>,
}

pub fn execute(args: SelectArgs, ctx: &Context) -> Result<()> {
    let mut session = Session::open(&ctx.project_dir)?;
    if session.wizard.variations().is_empty() {
        bail!("No design variations yet. Run `studio design` first.");
    }

    if args.front.is_none() && args.back.is_none() {
        print_variations(&session.wizard);
        return Ok(());
    }

    if let Some(id) = &args.front {
        session.wizard.select_front(id)?;
    }
    if let Some(id) = &args.back {
        session.wizard.select_back(id)?;
    }
    if session.wizard.step() == WizardStep::Design && session.wizard.selected_front().is_some() {
        session.wizard.go_to(WizardStep::TryOn)?;
    }
    session.save()?;

    print_variations(&session.wizard);
    println!();
    println!(
        "Next: {}",
        "studio try-on --person <photo>".cyan()
    );
    Ok(())
}
