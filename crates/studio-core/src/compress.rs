//! Adaptive image compression.
//!
//! Re-encodes an arbitrary image as JPEG so that it fits a byte budget and a
//! dimension ceiling. Quality is lowered first; once the quality floor is hit
//! the image is scaled down and quality partially restored. The smallest
//! attempt is kept as the fallback when the budget cannot be met.

use std::io::Cursor;
use std::path::Path;

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use thiserror::Error;
use tracing::debug;

/// Output MIME type. Every compressed image is re-encoded to JPEG.
pub const OUTPUT_MIME: &str = "image/jpeg";

const OUTPUT_EXTENSION: &str = "jpg";
const MAX_ATTEMPTS: u32 = 15;
const QUALITY_FLOOR: f64 = 0.2;
const QUALITY_CEILING_AFTER_SCALE: f64 = 0.9;
const EPSILON: f64 = 1e-9;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Failed to load image: {0}")]
    Decode(String),

    #[error("Invalid data URL")]
    InvalidDataUrl,

    #[error("Compression failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Compression worker failed: {0}")]
    Worker(String),
}

/// Knobs for [`compress_image`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// Initial quality in `0.0..=1.0`.
    pub quality: f64,
    pub max_bytes: usize,
    pub min_quality: f64,
    pub quality_step: f64,
    /// Multiplicative shrink applied once the quality floor is reached.
    pub scale_step: f64,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            max_width: 1024,
            max_height: 1536,
            quality: 0.8,
            max_bytes: 1024 * 1024,
            min_quality: 0.5,
            quality_step: 0.1,
            scale_step: 0.85,
            min_width: 256,
            min_height: 256,
        }
    }
}

/// An image to compress: raw file bytes or a `data:` URL.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Bytes { name: String, bytes: Vec<u8> },
    DataUrl { name: String, url: String },
}

impl ImageSource {
    pub fn bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::Bytes { name: name.into(), bytes }
    }

    pub fn data_url(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::DataUrl { name: name.into(), url: url.into() }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Bytes { name, .. } | Self::DataUrl { name, .. } => name,
        }
    }
}

/// One encode pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attempt {
    pub width: u32,
    pub height: u32,
    pub quality: f64,
    pub size: usize,
}

/// Result of a compression run.
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub quality: f64,
    /// Every encode pass in order, the initial one included.
    pub history: Vec<Attempt>,
}

impl CompressedImage {
    /// Number of re-encodes after the initial pass.
    pub fn retries(&self) -> usize {
        self.history.len().saturating_sub(1)
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Compress `source` to fit `options`.
pub fn compress_image(
    source: &ImageSource,
    options: &CompressOptions,
) -> Result<CompressedImage, CompressError> {
    let image = decode(source)?;
    let (intrinsic_w, intrinsic_h) = (image.width(), image.height());
    let (mut width, mut height) =
        fit_within(intrinsic_w, intrinsic_h, options.max_width, options.max_height);

    let min_quality = options.min_quality.max(QUALITY_FLOOR);
    let mut quality = options.quality.clamp(0.1, 0.95);
    let canvas = flatten_alpha(&image);
    drop(image);

    let mut history = Vec::new();
    let mut output = encode(&canvas, width, height, quality)?;
    history.push(Attempt { width, height, quality, size: output.len() });
    let mut best = Best { bytes: output.clone(), width, height, quality };

    let mut retries = 0;
    while output.len() > options.max_bytes && retries < MAX_ATTEMPTS {
        retries += 1;
        if quality - options.quality_step >= min_quality - EPSILON {
            quality = (quality - options.quality_step).max(min_quality);
        } else if width > options.min_width && height > options.min_height {
            width = scale(width, options.scale_step).max(options.min_width);
            height = scale(height, options.scale_step).max(options.min_height);
            quality = (quality + options.quality_step / 2.0)
                .max(min_quality)
                .min(QUALITY_CEILING_AFTER_SCALE);
        } else {
            debug!(width, height, quality, "Compression hit hard floor");
            break;
        }

        output = encode(&canvas, width, height, quality)?;
        history.push(Attempt { width, height, quality, size: output.len() });
        if output.len() < best.bytes.len() {
            best = Best { bytes: output.clone(), width, height, quality };
        }
    }

    // Any attempt within budget ended the loop and is necessarily the smallest,
    // so the best attempt is always the answer.
    debug!(
        original = ?(intrinsic_w, intrinsic_h),
        result = ?(best.width, best.height),
        size = best.bytes.len(),
        attempts = history.len(),
        "Image compressed"
    );

    Ok(CompressedImage {
        file_name: output_file_name(source.name()),
        mime_type: OUTPUT_MIME,
        bytes: best.bytes,
        width: best.width,
        height: best.height,
        quality: best.quality,
        history,
    })
}

/// Run [`compress_image`] on the blocking pool.
pub async fn compress_image_async(
    source: ImageSource,
    options: CompressOptions,
) -> Result<CompressedImage, CompressError> {
    tokio::task::spawn_blocking(move || compress_image(&source, &options))
        .await
        .map_err(|e| CompressError::Worker(e.to_string()))?
}

struct Best {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
    quality: f64,
}

/// Fit `(width, height)` within the bounds while keeping the aspect ratio.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let aspect = f64::from(width) / f64::from(height.max(1));
    let mut target_w = max_width.min(width);
    let mut target_h = (f64::from(target_w) / aspect).round() as u32;
    if target_h > max_height {
        target_h = max_height.min(height);
        target_w = (f64::from(target_h) * aspect).round() as u32;
    }
    (target_w.clamp(1, max_width.max(1)), target_h.clamp(1, max_height.max(1)))
}

fn scale(value: u32, factor: f64) -> u32 {
    (f64::from(value) * factor).round() as u32
}

fn decode(source: &ImageSource) -> Result<DynamicImage, CompressError> {
    let (bytes, hint) = match source {
        ImageSource::Bytes { name, bytes } => {
            (std::borrow::Cow::Borrowed(bytes.as_slice()), format_from_name(name))
        }
        ImageSource::DataUrl { url, .. } => {
            let (mime, bytes) = parse_data_url(url)?;
            (std::borrow::Cow::Owned(bytes), ImageFormat::from_mime_type(mime))
        }
    };

    match image::load_from_memory(&bytes) {
        Ok(image) => Ok(image),
        Err(primary) => {
            debug!(error = %primary, "Primary decode failed, trying format hint");
            let format = hint.ok_or_else(|| CompressError::Decode(primary.to_string()))?;
            image::load_from_memory_with_format(&bytes, format)
                .map_err(|e| CompressError::Decode(e.to_string()))
        }
    }
}

fn format_from_name(name: &str) -> Option<ImageFormat> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension)
}

/// Split a base64 `data:` URL into its MIME type and payload.
pub fn parse_data_url(url: &str) -> Result<(&str, Vec<u8>), CompressError> {
    let rest = url.strip_prefix("data:").ok_or(CompressError::InvalidDataUrl)?;
    let (meta, payload) = rest.split_once(',').ok_or(CompressError::InvalidDataUrl)?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or(CompressError::InvalidDataUrl)?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|_| CompressError::InvalidDataUrl)?;
    Ok((mime, bytes))
}

/// MIME type of an image payload: sniffed from the bytes, else from the name.
pub fn guess_mime(bytes: &[u8], file_name: &str) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .or_else(|| format_from_name(file_name))
        .map(|format| format.to_mime_type())
}

/// JPEG has no alpha channel; composite onto white.
fn flatten_alpha(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend =
            |channel: u8| -> u8 { ((u16::from(channel) * alpha + 255 * (255 - alpha)) / 255) as u8 };
        flattened.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    flattened
}

fn encode(canvas: &RgbImage, width: u32, height: u32, quality: f64) -> Result<Vec<u8>, CompressError> {
    let resized;
    let frame = if canvas.width() == width && canvas.height() == height {
        canvas
    } else {
        resized = image::imageops::resize(canvas, width.max(1), height.max(1), FilterType::Triangle);
        &resized
    };
    let mut bytes = Vec::new();
    let jpeg_quality = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
    JpegEncoder::new_with_quality(Cursor::new(&mut bytes), jpeg_quality).encode_image(frame)?;
    Ok(bytes)
}

fn output_file_name(original: &str) -> String {
    let name = if original.trim().is_empty() { "image" } else { original };
    Path::new(name)
        .with_extension(OUTPUT_EXTENSION)
        .to_string_lossy()
        .into_owned()
}
