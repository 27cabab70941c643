//! HTTP client for the studio API.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::Value;
use studio_core::compress::{compress_image_async, parse_data_url, CompressOptions, ImageSource};
use studio_core::model::{DesignResponse, TryOnResponse};
use studio_core::order::{ApprovalResponse, OrderRequest, OrderResponse};
use tracing::debug;

/// A file ready to be attached to a multipart request.
#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Talks to a running `studio serve`.
#[derive(Clone)]
pub struct StudioClient {
    client: reqwest::Client,
    base_url: String,
}

impl StudioClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        debug!(base_url = %base_url, "StudioClient initialized");
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn generate_design(
        &self,
        front: Upload,
        back: Option<Upload>,
        description: &str,
        color: &str,
    ) -> Result<DesignResponse> {
        let mut form = Form::new()
            .part("frontDrawing", part(front)?)
            .text("description", description.to_string())
            .text("color", color.to_string());
        if let Some(back) = back {
            form = form.part("backDrawing", part(back)?);
        }
        self.send_multipart("/api/design", form).await
    }

    pub async fn try_on(
        &self,
        person: Upload,
        clothing: Upload,
        model: &str,
    ) -> Result<TryOnResponse> {
        let form = Form::new()
            .part("personImage", part(person)?)
            .part("clothingImage", part(clothing)?)
            .text("selectedModel", model.to_string());
        self.send_multipart("/api/try-on", form).await
    }

    pub async fn submit_order(&self, order: &OrderRequest) -> Result<OrderResponse> {
        let request = self.client.post(self.url("/api/submit-order")).json(order);
        self.send(request).await
    }

    pub async fn approve_design(&self, approval: &Value) -> Result<ApprovalResponse> {
        let request = self.client.post(self.url("/api/approve-design")).json(approval);
        self.send(request).await
    }

    /// Bytes behind an image reference: a data URL, an absolute URL, or a
    /// path on the studio server.
    pub async fn fetch_image(&self, reference: &str) -> Result<(String, Vec<u8>)> {
        if reference.starts_with("data:") {
            let (mime, bytes) = parse_data_url(reference)?;
            return Ok((mime.to_string(), bytes));
        }
        let url = if reference.starts_with("http://") || reference.starts_with("https://") {
            reference.to_string()
        } else {
            self.url(reference)
        };
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to download {}", url))?;
        if !response.status().is_success() {
            bail!("Failed to download {} (HTTP {})", url, response.status());
        }
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        if !mime.starts_with("image/") {
            bail!("{} is not an image ({})", url, mime);
        }
        Ok((mime, response.bytes().await?.to_vec()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send_multipart<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T> {
        let request = self.client.post(self.url(path)).multipart(form);
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Could not reach the studio server at {}", self.base_url))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .context("Studio server returned a non-JSON response")?;

        if !status.is_success() || body.get("success") == Some(&Value::Bool(false)) {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Request failed");
            bail!("{} (HTTP {})", message, status.as_u16());
        }
        serde_json::from_value(body).context("Unexpected response shape")
    }
}

fn part(upload: Upload) -> Result<Part> {
    Ok(Part::bytes(upload.bytes)
        .file_name(upload.file_name)
        .mime_str(&upload.mime_type)?)
}

/// Compress an image for upload with the same settings the browser used.
pub async fn prepare_upload(file_name: &str, bytes: Vec<u8>) -> Result<Upload> {
    let compressed =
        compress_image_async(ImageSource::bytes(file_name, bytes), CompressOptions::default())
            .await
            .with_context(|| format!("Failed to compress {}", file_name))?;
    debug!(
        file = %compressed.file_name,
        size = compressed.bytes.len(),
        width = compressed.width,
        height = compressed.height,
        retries = compressed.retries(),
        "Prepared upload"
    );
    Ok(Upload {
        file_name: compressed.file_name,
        mime_type: compressed.mime_type.to_string(),
        bytes: compressed.bytes,
    })
}
