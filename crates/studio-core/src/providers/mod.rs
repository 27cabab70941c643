//! External image providers.
//!
//! The studio never synthesizes or analyzes images itself. Each capability is
//! a narrow trait so the HTTP layer can be exercised against fakes.

pub mod fal;
pub mod openai;

use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;
use thiserror::Error;

pub use fal::FalClient;
pub use openai::OpenAiClient;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} API error (HTTP {status}): {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} returned an unexpected response: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} returned no images")]
    Empty { provider: &'static str },
}

impl ProviderError {
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Transport { provider, .. }
            | Self::Api { provider, .. }
            | Self::Decode { provider, .. }
            | Self::Empty { provider } => provider,
        }
    }

    /// User-facing message; recognizable failures get a plainer wording.
    pub fn friendly_message(&self) -> String {
        let text = self.to_string().to_lowercase();
        let provider = self.provider();
        if text.contains("billing") {
            format!("{} API billing issue. Please check your {} account.", provider, provider)
        } else if text.contains("rate limit") {
            format!("{} API rate limit exceeded. Please try again later.", provider)
        } else if text.contains("invalid") {
            "Invalid image format. Please use JPG or PNG images.".to_string()
        } else {
            format!("{} generation failed: {}", provider, self)
        }
    }
}

/// An image handed to a provider.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageInput {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// A provider result: hosted remotely or returned inline.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedImage {
    Url(String),
    Inline { mime_type: String, base64: String },
}

impl GeneratedImage {
    /// Reference usable directly as an `<img src>`.
    pub fn to_reference(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Inline { mime_type, base64 } => format!("data:{};base64,{}", mime_type, base64),
        }
    }
}

/// Request for an image-edit call.
#[derive(Debug, Clone)]
pub struct ImageEditRequest {
    pub image: ImageInput,
    pub prompt: String,
    /// Number of images to return.
    pub n: u32,
    pub size: String,
}

/// Output of a try-on generation.
#[derive(Debug, Clone, PartialEq)]
pub struct TryOnOutput {
    pub image_url: String,
    pub model_used: String,
    pub provider: String,
    pub prompt: Option<String>,
    pub method: String,
}

/// Image editing / generation.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    async fn edit(&self, request: ImageEditRequest) -> Result<Vec<GeneratedImage>, ProviderError>;
}

/// Vision-capable language model.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// Returns the model's raw text reply.
    async fn analyze(
        &self,
        image: &ImageInput,
        system_prompt: &str,
        prompt: &str,
    ) -> Result<String, ProviderError>;
}

/// Person + garment composite.
#[async_trait]
pub trait TryOnGenerator: Send + Sync {
    async fn try_on(
        &self,
        person: &ImageInput,
        garment: &ImageInput,
    ) -> Result<TryOnOutput, ProviderError>;
}

/// Read a JSON body, turning non-2xx statuses into [`ProviderError::Api`].
pub(crate) async fn json_or_error(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<Value, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Api {
            provider,
            status: status.as_u16(),
            body: truncate(&body, 512),
        });
    }
    response.json().await.map_err(|e| ProviderError::Decode {
        provider,
        message: e.to_string(),
    })
}

pub(crate) fn transport(provider: &'static str) -> impl Fn(reqwest::Error) -> ProviderError {
    move |e| ProviderError::Transport {
        provider,
        message: e.to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}
