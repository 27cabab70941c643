//! Design variation handler.

use std::time::Instant;

use axum::{
    extract::{Multipart, State},
    Json,
};
use futures::future::join_all;
use studio_core::compress::{compress_image_async, ImageSource};
use studio_core::model::{DesignResponse, DesignVariation, Orientation};
use studio_core::providers::{GeneratedImage, ImageEditRequest, ImageEditor, ImageInput};
use studio_core::StudioConfig;
use tracing::{info, warn};

use super::UploadForm;
use crate::error::ApiError;
use crate::state::AppState;

/// Variations generated per side.
pub const VARIATIONS_PER_SIDE: usize = 2;

const DEFAULT_COLOR: &str = "#000000";

/// `POST /api/design`
pub async fn generate_design(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<DesignResponse>, ApiError> {
    let form = UploadForm::read(multipart).await?;
    let front = form
        .file("frontDrawing")
        .ok_or_else(|| ApiError::bad_request("Front drawing is required"))?;
    let back = form.file("backDrawing");
    form.ensure_within(state.config.max_upload_bytes)?;

    let description = form.text("description").unwrap_or_default();
    let color = form.text("color").unwrap_or(DEFAULT_COLOR);
    let designer = state.designer()?;

    let started = Instant::now();
    let front_side = generate_side(
        designer.as_ref(),
        &state.config,
        front,
        Orientation::Front,
        description,
        color,
    );
    let back_side = async {
        match back {
            Some(drawing) => {
                generate_side(
                    designer.as_ref(),
                    &state.config,
                    drawing,
                    Orientation::Back,
                    description,
                    color,
                )
                .await
            }
            None => Vec::new(),
        }
    };
    let (mut variations, back_variations) = tokio::join!(front_side, back_side);
    variations.extend(back_variations);

    info!(
        count = variations.len(),
        has_back = back.is_some(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Design variations generated"
    );

    Ok(Json(DesignResponse {
        success: true,
        variations,
    }))
}

/// Generate every variation for one side.
///
/// One batched edit is tried first; slots it leaves empty are filled by
/// individual edits run concurrently, and any slot that still fails gets a
/// placeholder. Never fails as a whole.
pub async fn generate_side(
    designer: &dyn ImageEditor,
    config: &StudioConfig,
    drawing: &ImageInput,
    orientation: Orientation,
    description: &str,
    color: &str,
) -> Vec<DesignVariation> {
    let prompt = design_prompt(orientation, description, color);
    let request = |n: usize| ImageEditRequest {
        image: drawing.clone(),
        prompt: prompt.clone(),
        n: n as u32,
        size: config.design_size.clone(),
    };

    let mut slots: Vec<Option<GeneratedImage>> = match designer.edit(request(VARIATIONS_PER_SIDE)).await
    {
        Ok(images) => images.into_iter().map(Some).collect(),
        Err(e) => {
            warn!(side = %orientation, error = %e, "Batched design edit failed, retrying per variation");
            Vec::new()
        }
    };
    slots.resize(VARIATIONS_PER_SIDE, None);

    let missing: Vec<usize> = (0..VARIATIONS_PER_SIDE)
        .filter(|&index| slots[index].is_none())
        .collect();
    if !missing.is_empty() {
        let request = &request;
        let retries = missing.iter().map(|_| async move {
            match designer.edit(request(1)).await {
                Ok(images) => images.into_iter().next(),
                Err(e) => {
                    warn!(side = %orientation, error = %e, "Design variation failed");
                    None
                }
            }
        });
        let retried = join_all(retries).await;
        for (index, image) in missing.into_iter().zip(retried) {
            slots[index] = image;
        }
    }

    let embedded = slots.into_iter().enumerate().map(|(index, slot)| async move {
        let number = index + 1;
        let image_url = match slot {
            Some(image) => embed(image, config, orientation, number).await,
            None => placeholder_url(orientation, number, color),
        };
        DesignVariation {
            id: format!("{}_{}", orientation, number),
            image_url,
            orientation,
            description: variation_description(orientation, number).to_string(),
        }
    });
    join_all(embedded).await
}

/// Remote URLs pass through; inline payloads are recompressed to a data URL.
async fn embed(
    image: GeneratedImage,
    config: &StudioConfig,
    orientation: Orientation,
    number: usize,
) -> String {
    match image {
        GeneratedImage::Url(url) => url,
        inline @ GeneratedImage::Inline { .. } => {
            let reference = inline.to_reference();
            let name = format!("{}_{}.png", orientation, number);
            let source = ImageSource::data_url(name, reference.clone());
            match compress_image_async(source, config.embed_options()).await {
                Ok(compressed) => compressed.to_data_url(),
                Err(e) => {
                    warn!(error = %e, "Could not recompress generated image, embedding as returned");
                    reference
                }
            }
        }
    }
}

pub fn design_prompt(orientation: Orientation, description: &str, color: &str) -> String {
    let description = if description.is_empty() {
        "No additional description provided"
    } else {
        description
    };
    format!(
        "Create a realistic dress design rendering based on this {} drawing.\n\
         Description: {}\n\
         Primary color: {}\n\
         Generate a professional fashion design rendering that could be used by a tailor. \
         Make the design wearable and realistic, with proper proportions and details.",
        orientation, description, color
    )
}

/// Deterministic stand-in for a variation that could not be generated.
pub fn placeholder_url(orientation: Orientation, number: usize, color: &str) -> String {
    let style = if number == 1 { "elegant" } else { "modern" };
    let subject = match orientation {
        Orientation::Front => "dress",
        Orientation::Back => "back",
    };
    format!(
        "/placeholder.svg?height=600&width=400&query={}_{}_design_variation_{}_{}",
        style,
        subject,
        number,
        color.replace('#', "")
    )
}

fn variation_description(orientation: Orientation, number: usize) -> &'static str {
    match (orientation, number) {
        (Orientation::Front, 1) => "Elegant variation with refined details",
        (Orientation::Front, _) => "Modern interpretation with contemporary styling",
        (Orientation::Back, 1) => "Elegant back design variation",
        (Orientation::Back, _) => "Modern back design variation",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(
            placeholder_url(Orientation::Front, 1, "#ff0066"),
            "/placeholder.svg?height=600&width=400&query=elegant_dress_design_variation_1_ff0066"
        );
        assert_eq!(
            placeholder_url(Orientation::Back, 2, "#000000"),
            "/placeholder.svg?height=600&width=400&query=modern_back_design_variation_2_000000"
        );
    }

    #[test]
    fn test_prompt_mentions_inputs() {
        let prompt = design_prompt(Orientation::Back, "", "#112233");
        assert!(prompt.contains("back drawing"));
        assert!(prompt.contains("#112233"));
        assert!(prompt.contains("No additional description provided"));
    }
}
