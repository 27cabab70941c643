//! OpenAI image edits and vision chat completions.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{
    json_or_error, transport, GeneratedImage, ImageEditRequest, ImageEditor, ImageInput,
    ProviderError, TryOnGenerator, TryOnOutput, VisionAnalyzer,
};
use crate::config::StudioConfig;

const PROVIDER: &str = "OpenAI";
const VISION_MAX_TOKENS: u32 = 500;
const TRY_ON_SIZE: &str = "1024x1024";

pub const TRY_ON_PROMPT: &str = "Create a virtual try-on image by combining the person in the first image with the clothing item in the second image. Ensure the clothing fits naturally on the person, maintaining realistic proportions, lighting, and shadows. The final image should look like the person is wearing the clothing item in a natural pose with proper fit and draping.";

/// Client for the OpenAI REST API.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    vision_model: String,
    try_on_model: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, config: &StudioConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            vision_model: config.vision_model.clone(),
            try_on_model: config.try_on_model.clone(),
        }
    }

    /// Image editor bound to `model`.
    pub fn image_editor(&self, model: impl Into<String>) -> OpenAiImageEditor {
        OpenAiImageEditor::new(self.clone(), model)
    }

    /// Build a client when `OPENAI_API_KEY` is configured.
    pub fn from_config(config: &StudioConfig) -> Option<Self> {
        config
            .openai_api_key
            .as_deref()
            .map(|key| Self::new(key, config))
    }

    async fn edit_with_model(
        &self,
        model: &str,
        request: ImageEditRequest,
    ) -> Result<Vec<GeneratedImage>, ProviderError> {
        let ImageEditRequest {
            image,
            prompt,
            n,
            size,
        } = request;

        let part = Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.mime_type)
            .map_err(transport(PROVIDER))?;
        let form = Form::new()
            .text("model", model.to_string())
            .part("image", part)
            .text("prompt", prompt)
            .text("n", n.to_string())
            .text("size", size);

        debug!(model, n, "Requesting image edit");
        let response = self
            .client
            .post(format!("{}/images/edits", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(transport(PROVIDER))?;

        let body = json_or_error(PROVIDER, response).await?;
        let images = parse_images(&body);
        if images.is_empty() {
            return Err(ProviderError::Empty { provider: PROVIDER });
        }
        Ok(images)
    }

    /// Fetch a hosted result and inline it as a data URL.
    async fn download_as_data_url(&self, url: &str) -> Result<String, ProviderError> {
        let response = self.client.get(url).send().await.map_err(transport(PROVIDER))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
                body: format!("failed to download generated image from {}", url),
            });
        }
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let bytes = response.bytes().await.map_err(transport(PROVIDER))?;
        Ok(format!(
            "data:{};base64,{}",
            mime,
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        ))
    }
}

/// Image-edit client bound to one model.
#[derive(Clone)]
pub struct OpenAiImageEditor {
    client: OpenAiClient,
    model: String,
}

impl OpenAiImageEditor {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ImageEditor for OpenAiImageEditor {
    async fn edit(&self, request: ImageEditRequest) -> Result<Vec<GeneratedImage>, ProviderError> {
        self.client.edit_with_model(&self.model, request).await
    }
}

#[async_trait]
impl VisionAnalyzer for OpenAiClient {
    async fn analyze(
        &self,
        image: &ImageInput,
        system_prompt: &str,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.vision_model,
            "messages": [
                { "role": "system", "content": system_prompt },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": prompt },
                        {
                            "type": "image_url",
                            "image_url": { "url": image.to_data_url(), "detail": "high" }
                        }
                    ]
                }
            ],
            "max_tokens": VISION_MAX_TOKENS,
            "response_format": { "type": "json_object" }
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport(PROVIDER))?;

        let body = json_or_error(PROVIDER, response).await?;
        chat_content(&body).ok_or_else(|| ProviderError::Decode {
            provider: PROVIDER,
            message: "no message content in completion".to_string(),
        })
    }
}

#[async_trait]
impl TryOnGenerator for OpenAiClient {
    async fn try_on(
        &self,
        person: &ImageInput,
        _garment: &ImageInput,
    ) -> Result<TryOnOutput, ProviderError> {
        // The edits endpoint takes a single image; the garment is carried by the prompt.
        let request = ImageEditRequest {
            image: person.clone(),
            prompt: TRY_ON_PROMPT.to_string(),
            n: 1,
            size: TRY_ON_SIZE.to_string(),
        };
        let images = self.edit_with_model(&self.try_on_model, request).await?;
        let image_url = match images.into_iter().next() {
            Some(GeneratedImage::Url(url)) => self.download_as_data_url(&url).await?,
            Some(inline) => inline.to_reference(),
            None => return Err(ProviderError::Empty { provider: PROVIDER }),
        };
        info!(model = %self.try_on_model, "OpenAI try-on generated");

        Ok(TryOnOutput {
            image_url,
            model_used: self.try_on_model.clone(),
            provider: PROVIDER.to_string(),
            prompt: Some(TRY_ON_PROMPT.to_string()),
            method: "image-edit".to_string(),
        })
    }
}

/// Images from an `images/*` response, in order. Entries without a usable
/// payload are skipped.
pub fn parse_images(body: &Value) -> Vec<GeneratedImage> {
    body.get("data")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    if let Some(b64) = item.get("b64_json").and_then(Value::as_str) {
                        Some(GeneratedImage::Inline {
                            mime_type: "image/png".to_string(),
                            base64: b64.to_string(),
                        })
                    } else {
                        item.get("url")
                            .and_then(Value::as_str)
                            .map(|url| GeneratedImage::Url(url.to_string()))
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

/// First choice's message text from a chat completion.
pub fn chat_content(body: &Value) -> Option<String> {
    body.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}
