//! Approve the current try-on and place an order from it.

use anyhow::{bail, Context as _, Result};
use chrono::{SecondsFormat, Utc};
use clap::Args;
use colored::Colorize;
use dialoguer::Confirm;
use serde_json::{json, Value};
use std::path::Path;
use studio_core::model::TryOnResponse;

use super::{spinner, Context};
use crate::state::{last_try_on_path, Session};

#[derive(Args)]
pub struct ApproveArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

pub async fn execute(args: ApproveArgs, ctx: &Context) -> Result<()> {
    let session = Session::open(&ctx.project_dir)?;
    let Some(result) = session.wizard.try_on_result() else {
        bail!("No try-on to approve. Run `studio try-on` first.");
    };

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt("Approve this design and place the order?")
            .default(true)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            println!("{}", "Approval cancelled".yellow());
            return Ok(());
        }
    }

    let details = load_last_try_on(&ctx.project_dir, &result.image_url);
    let approval = approval_body(&result.image_url, details.as_ref());

    let bar = spinner("Placing order...");
    let response = ctx.client().approve_design(&approval).await;
    bar.finish_and_clear();
    let response = response?;

    println!("{}", response.message.green().bold());
    println!("  {}     {}", "Order".bold(), response.order_id.cyan());
    println!("  {}  {}", "Delivery".bold(), response.estimated_delivery);
    println!(
        "  {}    {} (next update in {})",
        "Status".bold(),
        response.tracking_info.status,
        response.tracking_info.next_update
    );
    Ok(())
}

/// The saved try-on response, if it belongs to the image being approved.
fn load_last_try_on(project_dir: &Path, image_url: &str) -> Option<TryOnResponse> {
    let bytes = std::fs::read(last_try_on_path(project_dir)).ok()?;
    let response: TryOnResponse = serde_json::from_slice(&bytes).ok()?;
    (response.image_url == image_url).then_some(response)
}

fn approval_body(image_url: &str, details: Option<&TryOnResponse>) -> Value {
    let person = details
        .and_then(|d| d.person_details.as_ref())
        .and_then(|p| serde_json::to_value(p).ok());
    let clothing = details
        .and_then(|d| d.clothing_details.as_ref())
        .and_then(|c| serde_json::to_value(c).ok());
    json!({
        "imageUrl": image_url,
        "personDetails": person,
        "clothingDetails": clothing,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
