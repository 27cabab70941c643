//! Studio configuration.
//!
//! Values come from an optional `studio.toml`, then environment variables
//! override them. API keys are normally supplied through the environment only.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compress::CompressOptions;
use crate::error::{StudioError, StudioResult};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_FAL_BASE_URL: &str = "https://fal.run";

/// Runtime configuration shared by the server and the CLI client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    #[serde(skip_serializing)]
    pub fal_api_key: Option<String>,
    pub fal_base_url: String,

    /// Image-edit model used for design variations.
    pub design_model: String,
    pub design_size: String,
    /// Image-edit model used for OpenAI try-on.
    pub try_on_model: String,
    /// Fal endpoint used for try-on.
    pub fal_try_on_model: String,
    pub vision_model: String,

    /// Per-file upload ceiling in bytes.
    pub max_upload_bytes: u64,
    /// Byte budget for generated images embedded inline as data URLs.
    pub embed_max_bytes: usize,
    pub request_timeout_secs: u64,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            fal_api_key: None,
            fal_base_url: DEFAULT_FAL_BASE_URL.to_string(),
            design_model: "gpt-image-1".to_string(),
            design_size: "1024x1536".to_string(),
            try_on_model: "dall-e-2".to_string(),
            fal_try_on_model: "fal-ai/idm-vton".to_string(),
            vision_model: "gpt-4o".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            embed_max_bytes: 1024 * 1024,
            request_timeout_secs: 120,
        }
    }
}

impl StudioConfig {
    /// Load from `path` (if it exists) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> StudioResult<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)?;
                let config: StudioConfig = toml::from_str(&raw)
                    .map_err(|e| StudioError::Config(format!("{}: {}", path.display(), e)))?;
                debug!(path = %path.display(), "Loaded configuration file");
                config
            }
            _ => StudioConfig::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from `lookup`, ignoring blank values.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(key) = get("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(key) = get("FAL_KEY").or_else(|| get("FAL_API_KEY")) {
            self.fal_api_key = Some(key);
        }
        if let Some(url) = get("STUDIO_OPENAI_BASE_URL") {
            self.openai_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = get("STUDIO_FAL_BASE_URL") {
            self.fal_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("STUDIO_DESIGN_MODEL") {
            self.design_model = model;
        }
        if let Some(model) = get("STUDIO_TRY_ON_MODEL") {
            self.try_on_model = model;
        }
        if let Some(model) = get("STUDIO_FAL_MODEL") {
            self.fal_try_on_model = model;
        }
        if let Some(model) = get("STUDIO_VISION_MODEL") {
            self.vision_model = model;
        }
        if let Some(bytes) = get("STUDIO_MAX_UPLOAD_BYTES").and_then(|v| v.parse().ok()) {
            self.max_upload_bytes = bytes;
        }
        if let Some(secs) = get("STUDIO_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = secs;
        }
    }

    /// Upload ceiling in megabytes, rounded up, for error messages.
    pub fn max_upload_mb(&self) -> u64 {
        self.max_upload_bytes.div_ceil(1024 * 1024)
    }

    /// Compression applied to inline provider results before embedding.
    pub fn embed_options(&self) -> CompressOptions {
        CompressOptions {
            max_bytes: self.embed_max_bytes,
            ..CompressOptions::default()
        }
    }
}
