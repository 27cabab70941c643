//! Fal AI virtual try-on.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{
    json_or_error, transport, ImageInput, ProviderError, TryOnGenerator, TryOnOutput,
};
use crate::config::StudioConfig;

const PROVIDER: &str = "Fal AI";
const GARMENT_DESCRIPTION: &str = "A garment to be worn by the person";

/// Client for the synchronous `fal.run` endpoints.
#[derive(Clone)]
pub struct FalClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl FalClient {
    pub fn new(api_key: impl Into<String>, config: &StudioConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            http,
            api_key: api_key.into(),
            base_url: config.fal_base_url.trim_end_matches('/').to_string(),
            model: config.fal_try_on_model.trim_matches('/').to_string(),
        }
    }

    /// Build a client when `FAL_KEY` is configured.
    pub fn from_config(config: &StudioConfig) -> Option<Self> {
        config.fal_api_key.as_deref().map(|key| Self::new(key, config))
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url, self.model)
    }
}

#[async_trait]
impl TryOnGenerator for FalClient {
    async fn try_on(
        &self,
        person: &ImageInput,
        garment: &ImageInput,
    ) -> Result<TryOnOutput, ProviderError> {
        let payload = json!({
            "human_image_url": person.to_data_url(),
            "garment_image_url": garment.to_data_url(),
            "description": GARMENT_DESCRIPTION,
        });

        debug!(model = %self.model, "Requesting Fal try-on");
        let response = self
            .http
            .post(self.endpoint())
            .header("Authorization", format!("Key {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(transport(PROVIDER))?;

        let body = json_or_error(PROVIDER, response).await?;
        let mut urls = Vec::new();
        extract_urls(&body, &mut urls);
        let image_url = urls
            .into_iter()
            .next()
            .ok_or(ProviderError::Empty { provider: PROVIDER })?;
        info!(model = %self.model, "Fal try-on generated");

        Ok(TryOnOutput {
            image_url,
            model_used: self.model.clone(),
            provider: PROVIDER.to_string(),
            prompt: None,
            method: "virtual-try-on".to_string(),
        })
    }
}

/// Collect image URLs from a Fal response, in document order, without duplicates.
pub fn extract_urls(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(url) => {
            let trimmed = url.trim();
            if (trimmed.starts_with("http") || trimmed.starts_with("data:image/"))
                && !out.iter().any(|existing| existing == trimmed)
            {
                out.push(trimmed.to_string());
            }
        }
        Value::Array(rows) => {
            for row in rows {
                extract_urls(row, out);
            }
        }
        Value::Object(obj) => {
            for key in ["url", "image", "images", "output"] {
                if let Some(inner) = obj.get(key) {
                    extract_urls(inner, out);
                }
            }
        }
        _ => {}
    }
}
