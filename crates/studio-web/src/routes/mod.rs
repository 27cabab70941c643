//! Route handlers.

pub mod design;
pub mod health;
pub mod orders;
pub mod try_on;

use std::collections::HashMap;

use axum::extract::Multipart;
use studio_core::compress::guess_mime;
use studio_core::providers::ImageInput;
use studio_core::StudioError;

use crate::error::ApiError;

/// A parsed multipart body: file parts in arrival order plus text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    files: Vec<(String, ImageInput)>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let declared = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?.to_vec();
                    // Browsers send empty file parts for untouched inputs.
                    if bytes.is_empty() {
                        continue;
                    }
                    let mime_type = declared
                        .filter(|mime| mime.starts_with("image/"))
                        .or_else(|| guess_mime(&bytes, &file_name).map(str::to_string))
                        .unwrap_or_else(|| "application/octet-stream".to_string());
                    form.files
                        .push((name, ImageInput::new(file_name, mime_type, bytes)));
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }
        Ok(form)
    }

    /// The first file sent under exactly `name`.
    pub fn file(&self, name: &str) -> Option<&ImageInput> {
        self.files
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, image)| image)
    }

    /// Files sent as `prefix` or `prefix_N`, in arrival order.
    pub fn files_with_prefix(&self, prefix: &str) -> Vec<&ImageInput> {
        self.files
            .iter()
            .filter(|(field, _)| {
                field == prefix
                    || field
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('_'))
            })
            .map(|(_, image)| image)
            .collect()
    }

    /// A non-blank text field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Reject any file above `max_bytes`.
    pub fn ensure_within(&self, max_bytes: u64) -> Result<(), StudioError> {
        for (_, image) in &self.files {
            if image.bytes.len() as u64 > max_bytes {
                return Err(StudioError::FileTooLarge {
                    name: image.file_name.clone(),
                    limit_mb: max_bytes.div_ceil(1024 * 1024),
                });
            }
        }
        Ok(())
    }
}
