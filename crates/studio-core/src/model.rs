//! Studio domain model.
//!
//! Wire-facing types serialize in camelCase to match the HTTP API.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StudioError, StudioResult};
use crate::preview::{PreviewHandle, PreviewRegistry};

/// A user-selected image with its preview handle.
#[derive(Debug)]
pub struct UploadedImage {
    pub id: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    preview: PreviewHandle,
}

impl UploadedImage {
    /// Wrap a selected file. Non-image MIME types are rejected.
    pub fn new(
        registry: &PreviewRegistry,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> StudioResult<Self> {
        let mime_type = mime_type.into();
        if !mime_type.starts_with("image/") {
            return Err(StudioError::validation(format!(
                "Unsupported file type: {}",
                mime_type
            )));
        }
        Ok(Self {
            id: Uuid::new_v4().simple().to_string()[..9].to_string(),
            file_name: file_name.into(),
            preview: registry.create(&mime_type),
            mime_type,
            bytes,
        })
    }

    /// Read an image from disk, guessing the MIME type from its extension.
    pub fn from_path(registry: &PreviewRegistry, path: &Path) -> StudioResult<Self> {
        let bytes = std::fs::read(path)?;
        let mime_type = image::ImageFormat::from_path(path)
            .map(|format| format.to_mime_type().to_string())
            .map_err(|_| {
                StudioError::validation(format!("Not a recognised image: {}", path.display()))
            })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Self::new(registry, file_name, mime_type, bytes)
    }

    pub fn preview_url(&self) -> &str {
        self.preview.url()
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Which side of the garment a variation renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Front,
    Back,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Front => "front",
            Orientation::Back => "back",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate rendering returned by the design step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignVariation {
    pub id: String,
    pub image_url: String,
    #[serde(rename = "type")]
    pub orientation: Orientation,
    #[serde(default)]
    pub description: String,
}

/// The current try-on composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TryOnResult {
    pub image_url: String,
    pub timestamp: DateTime<Utc>,
}

impl TryOnResult {
    pub fn now(image_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Customer details and measurements sent to the tailor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TailorForm {
    pub full_name: String,
    pub contact: String,
    pub bust: String,
    pub waist: String,
    pub hips: String,
    pub shoulders: String,
    pub height: String,
    pub weight: String,
    pub additional_notes: String,
}

/// Addressable fields of [`TailorForm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailorField {
    FullName,
    Contact,
    Bust,
    Waist,
    Hips,
    Shoulders,
    Height,
    Weight,
    AdditionalNotes,
}

impl FromStr for TailorField {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "fullname" | "name" => Ok(Self::FullName),
            "contact" => Ok(Self::Contact),
            "bust" => Ok(Self::Bust),
            "waist" => Ok(Self::Waist),
            "hips" => Ok(Self::Hips),
            "shoulders" => Ok(Self::Shoulders),
            "height" => Ok(Self::Height),
            "weight" => Ok(Self::Weight),
            "notes" | "additionalnotes" => Ok(Self::AdditionalNotes),
            other => Err(StudioError::validation(format!("Unknown tailor field: {}", other))),
        }
    }
}

impl TailorForm {
    pub fn set(&mut self, field: TailorField, value: impl Into<String>) {
        let value = value.into();
        match field {
            TailorField::FullName => self.full_name = value,
            TailorField::Contact => self.contact = value,
            TailorField::Bust => self.bust = value,
            TailorField::Waist => self.waist = value,
            TailorField::Hips => self.hips = value,
            TailorField::Shoulders => self.shoulders = value,
            TailorField::Height => self.height = value,
            TailorField::Weight => self.weight = value,
            TailorField::AdditionalNotes => self.additional_notes = value,
        }
    }

    /// Name and contact are the only mandatory fields.
    pub fn is_submittable(&self) -> bool {
        !self.full_name.trim().is_empty() && !self.contact.trim().is_empty()
    }
}

/// Estimated body measurements of a person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub chest: String,
    pub waist: String,
    pub hips: String,
    pub shoulders: String,
}

/// Attributes of the person in a try-on photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDetails {
    pub body_type: String,
    pub gender: String,
    pub age_range: String,
    pub height: String,
    pub measurements: Measurements,
    pub skin_tone: String,
    pub pose: String,
    pub analysis_confidence: String,
}

/// Attributes of a garment photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClothingDetails {
    #[serde(rename = "type")]
    pub clothing_type: String,
    pub primary_color: String,
    pub secondary_color: Option<String>,
    pub pattern: String,
    pub material: String,
    pub style: String,
    pub fit: String,
    pub sleeves: String,
    pub neckline: String,
    pub analysis_confidence: String,
}

/// Body of a successful `POST /api/design`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignResponse {
    pub success: bool,
    pub variations: Vec<DesignVariation>,
}

/// Body of a successful `POST /api/try-on`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TryOnResponse {
    pub success: bool,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_details: Option<PersonDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clothing_details: Option<ClothingDetails>,
    pub processing_time: String,
    pub model_used: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub method: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variation_wire_shape() {
        let variation = DesignVariation {
            id: "front_1".to_string(),
            image_url: "https://example.com/a.png".to_string(),
            orientation: Orientation::Front,
            description: "Elegant".to_string(),
        };
        let json = serde_json::to_value(&variation).unwrap();
        assert_eq!(json["type"], "front");
        assert_eq!(json["imageUrl"], "https://example.com/a.png");
    }

    #[test]
    fn test_uploaded_image_rejects_non_images() {
        let registry = PreviewRegistry::new();
        assert!(UploadedImage::new(&registry, "a.txt", "text/plain", vec![1]).is_err());
        let image = UploadedImage::new(&registry, "a.png", "image/png", vec![1, 2]).unwrap();
        assert_eq!(image.id.len(), 9);
        assert!(registry.is_live(image.preview_url()));
    }

    #[test]
    fn test_tailor_field_parsing() {
        let mut form = TailorForm::default();
        form.set("full-name".parse().unwrap(), "Ada");
        form.set("notes".parse().unwrap(), "A-line");
        assert_eq!(form.full_name, "Ada");
        assert_eq!(form.additional_notes, "A-line");
        assert!(!form.is_submittable());
        assert!("sleeve".parse::<TailorField>().is_err());
    }
}
