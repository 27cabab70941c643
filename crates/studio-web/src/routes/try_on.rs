//! Virtual try-on handler.

use std::str::FromStr;
use std::time::Instant;

use axum::{
    extract::{Multipart, State},
    Json,
};
use studio_core::analysis::{
    normalize_clothing, normalize_person, AnalysisOutcome, CLOTHING_PROMPT,
    CLOTHING_SYSTEM_PROMPT, PERSON_PROMPT, PERSON_SYSTEM_PROMPT,
};
use studio_core::model::{ClothingDetails, PersonDetails, TryOnResponse};
use studio_core::providers::{ImageInput, VisionAnalyzer};
use studio_core::StudioError;
use tracing::{info, warn};

use super::UploadForm;
use crate::error::ApiError;
use crate::state::AppState;

/// Which try-on backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TryOnModel {
    #[default]
    FalAi,
    OpenAi,
}

impl TryOnModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FalAi => "fal-ai",
            Self::OpenAi => "openai",
        }
    }
}

impl FromStr for TryOnModel {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fal-ai" | "fal" => Ok(Self::FalAi),
            "openai" => Ok(Self::OpenAi),
            other => Err(StudioError::validation(format!(
                "Unsupported model: {}. Use fal-ai or openai.",
                other
            ))),
        }
    }
}

/// `POST /api/try-on`
pub async fn try_on(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<TryOnResponse>, ApiError> {
    let form = UploadForm::read(multipart).await?;
    let model = form
        .text("selectedModel")
        .map(TryOnModel::from_str)
        .transpose()?
        .unwrap_or_default();

    let people = form.files_with_prefix("personImage");
    let garments = form.files_with_prefix("clothingImage");
    let (Some(person), Some(garment)) = (people.first().copied(), garments.first().copied()) else {
        return Err(ApiError::bad_request(
            "Both person and clothing images are required",
        ));
    };
    form.ensure_within(state.config.max_upload_bytes)?;

    let vision = state.vision()?;
    let generator = match model {
        TryOnModel::FalAi => state.fal_try_on()?,
        TryOnModel::OpenAi => state.openai_try_on()?,
    };
    if garments.len() > 1 {
        info!(
            garments = garments.len(),
            model = model.as_str(),
            "Only the first garment is sent to the try-on model"
        );
    }

    let started = Instant::now();
    let (person_details, clothing_details, generated) = tokio::join!(
        analyze_person(vision.as_ref(), person),
        analyze_clothing(vision.as_ref(), garment),
        generator.try_on(person, garment),
    );
    let output = generated.map_err(StudioError::from)?;
    let processing_time = format!("{:.1}s", started.elapsed().as_secs_f64());

    info!(
        provider = %output.provider,
        model_used = %output.model_used,
        processing_time = %processing_time,
        "Try-on generated"
    );

    Ok(Json(TryOnResponse {
        success: true,
        image_url: output.image_url,
        person_details,
        clothing_details,
        processing_time,
        model_used: output.model_used,
        provider: output.provider,
        prompt: output.prompt,
        method: output.method,
    }))
}

async fn analyze_person(vision: &dyn VisionAnalyzer, image: &ImageInput) -> Option<PersonDetails> {
    match vision.analyze(image, PERSON_SYSTEM_PROMPT, PERSON_PROMPT).await {
        Ok(text) => Some(normalize_person(&AnalysisOutcome::from_text(&text))),
        Err(e) => {
            warn!(error = %e, "Person analysis failed");
            None
        }
    }
}

async fn analyze_clothing(
    vision: &dyn VisionAnalyzer,
    image: &ImageInput,
) -> Option<ClothingDetails> {
    match vision
        .analyze(image, CLOTHING_SYSTEM_PROMPT, CLOTHING_PROMPT)
        .await
    {
        Ok(text) => Some(normalize_clothing(&AnalysisOutcome::from_text(&text))),
        Err(e) => {
            warn!(error = %e, "Clothing analysis failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_selection() {
        assert_eq!("fal-ai".parse::<TryOnModel>().unwrap(), TryOnModel::FalAi);
        assert_eq!(" OpenAI ".parse::<TryOnModel>().unwrap(), TryOnModel::OpenAi);
        assert!("midjourney".parse::<TryOnModel>().is_err());
        assert_eq!(TryOnModel::default().as_str(), "fal-ai");
    }
}
