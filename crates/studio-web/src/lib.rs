//! Dress Studio web server.
//!
//! Axum-based JSON API for design generation, virtual try-on and orders.

pub mod error;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use studio_core::StudioConfig;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use state::AppState;

/// Uploaded files a single request may carry at the size ceiling.
const FILES_PER_REQUEST: usize = 4;
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = usize::try_from(state.config.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_mul(FILES_PER_REQUEST)
        .saturating_add(FORM_OVERHEAD_BYTES);

    let api_routes = Router::new()
        // Generation
        .route("/design", post(routes::design::generate_design))
        .route("/generate-design", post(routes::design::generate_design))
        .route("/try-on", post(routes::try_on::try_on))
        // Orders
        .route("/submit-order", post(routes::orders::submit_order))
        .route("/approve-design", post(routes::orders::approve_design))
        .route("/orders/{id}", get(routes::orders::get_order))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(routes::health::health))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the web server.
pub async fn run_server(config: StudioConfig, host: &str, port: u16) -> anyhow::Result<()> {
    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY not set; design and try-on requests will fail");
    }
    let state = AppState::from_config(config);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::info!("Web server listening on http://{}:{}", host, port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use studio_core::providers::{
        GeneratedImage, ImageEditRequest, ImageEditor, ImageInput, ProviderError, TryOnGenerator,
        TryOnOutput, VisionAnalyzer,
    };
    use tower::ServiceExt;

    const BOUNDARY: &str = "studio-test-boundary";

    /// Returns `n` hosted URLs, or fails batched calls when `fail_batches` is set.
    #[derive(Default)]
    struct FakeDesigner {
        calls: AtomicUsize,
        fail_batches: bool,
        fail_singles: bool,
        /// Images a batched call returns instead of `n`.
        batch_returns: Option<u32>,
    }

    #[async_trait]
    impl ImageEditor for FakeDesigner {
        async fn edit(&self, request: ImageEditRequest) -> Result<Vec<GeneratedImage>, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if (request.n > 1 && self.fail_batches) || (request.n == 1 && self.fail_singles) {
                return Err(ProviderError::Api {
                    provider: "OpenAI",
                    status: 500,
                    body: "upstream unavailable".to_string(),
                });
            }
            let count = match self.batch_returns {
                Some(count) if request.n > 1 => count,
                _ => request.n,
            };
            Ok((0..count)
                .map(|i| GeneratedImage::Url(format!("https://img.test/{}-{}.png", call, i)))
                .collect())
        }
    }

    struct InlineDesigner;

    #[async_trait]
    impl ImageEditor for InlineDesigner {
        async fn edit(&self, request: ImageEditRequest) -> Result<Vec<GeneratedImage>, ProviderError> {
            let image = image::DynamicImage::new_rgb8(64, 96);
            let mut png = Vec::new();
            image
                .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
                .map_err(|e| ProviderError::Decode {
                    provider: "OpenAI",
                    message: e.to_string(),
                })?;
            let inline = ImageInput::new("x.png", "image/png", png).to_data_url();
            let base64 = inline.trim_start_matches("data:image/png;base64,").to_string();
            Ok((0..request.n)
                .map(|_| GeneratedImage::Inline {
                    mime_type: "image/png".to_string(),
                    base64: base64.clone(),
                })
                .collect())
        }
    }

    struct FakeVision {
        fail: bool,
    }

    #[async_trait]
    impl VisionAnalyzer for FakeVision {
        async fn analyze(
            &self,
            _image: &ImageInput,
            system_prompt: &str,
            _prompt: &str,
        ) -> Result<String, ProviderError> {
            if self.fail {
                return Err(ProviderError::Empty { provider: "OpenAI" });
            }
            if system_prompt.contains("secondaryColor") {
                Ok(r#"{"type":"Dress","primaryColor":"Red","style":"Evening"}"#.to_string())
            } else {
                Ok("A woman in her mid 20s, about 5'6\", standing".to_string())
            }
        }
    }

    struct FakeTryOn {
        provider: &'static str,
        fail: bool,
    }

    #[async_trait]
    impl TryOnGenerator for FakeTryOn {
        async fn try_on(
            &self,
            _person: &ImageInput,
            _garment: &ImageInput,
        ) -> Result<TryOnOutput, ProviderError> {
            if self.fail {
                return Err(ProviderError::Api {
                    provider: "OpenAI",
                    status: 400,
                    body: "Billing hard limit has been reached".to_string(),
                });
            }
            Ok(TryOnOutput {
                image_url: "https://img.test/try-on.png".to_string(),
                model_used: "test-model".to_string(),
                provider: self.provider.to_string(),
                prompt: None,
                method: "virtual-try-on".to_string(),
            })
        }
    }

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        image::DynamicImage::new_rgb8(8, 8)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    enum Part<'a> {
        File(&'a str, &'a str, Vec<u8>),
        Text(&'a str, &'a str),
    }

    fn multipart(path: &str, parts: Vec<Part<'_>>) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::File(name, file_name, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n",
                            name, file_name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(&bytes);
                }
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}", name, value)
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(path: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn design_state(designer: impl ImageEditor + 'static) -> AppState {
        AppState::new(StudioConfig::default()).with_designer(Arc::new(designer))
    }

    fn try_on_state(vision_fails: bool, generation_fails: bool) -> AppState {
        AppState::new(StudioConfig::default())
            .with_vision(Arc::new(FakeVision { fail: vision_fails }))
            .with_fal_try_on(Arc::new(FakeTryOn {
                provider: "Fal AI",
                fail: generation_fails,
            }))
            .with_openai_try_on(Arc::new(FakeTryOn {
                provider: "OpenAI",
                fail: generation_fails,
            }))
    }

    #[tokio::test]
    async fn test_design_requires_front_drawing() {
        let request = multipart("/api/design", vec![Part::Text("description", "A-line")]);
        let (status, body) = send(design_state(FakeDesigner::default()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Front drawing is required");
    }

    #[tokio::test]
    async fn test_design_front_only() {
        let request = multipart(
            "/api/design",
            vec![
                Part::File("frontDrawing", "front.png", png_bytes()),
                Part::Text("color", "#aa0033"),
            ],
        );
        let (status, body) = send(design_state(FakeDesigner::default()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let variations = body["variations"].as_array().unwrap();
        assert_eq!(variations.len(), 2);
        assert!(variations.iter().all(|v| v["type"] == "front"));
        assert_eq!(variations[0]["id"], "front_1");
        assert_eq!(variations[1]["id"], "front_2");
    }

    #[tokio::test]
    async fn test_design_front_and_back() {
        let request = multipart(
            "/api/generate-design",
            vec![
                Part::File("frontDrawing", "front.png", png_bytes()),
                Part::File("backDrawing", "back.png", png_bytes()),
                Part::Text("description", "Silk evening gown"),
            ],
        );
        let (status, body) = send(design_state(FakeDesigner::default()), request).await;
        assert_eq!(status, StatusCode::OK);
        let variations = body["variations"].as_array().unwrap();
        assert_eq!(variations.len(), 4);
        assert_eq!(variations.iter().filter(|v| v["type"] == "front").count(), 2);
        assert_eq!(variations.iter().filter(|v| v["type"] == "back").count(), 2);
        assert!(variations
            .iter()
            .all(|v| !v["imageUrl"].as_str().unwrap().is_empty()));
    }

    #[tokio::test]
    async fn test_design_falls_back_per_variation() {
        let designer = FakeDesigner {
            fail_batches: true,
            ..FakeDesigner::default()
        };
        let request = multipart(
            "/api/design",
            vec![Part::File("frontDrawing", "front.png", png_bytes())],
        );
        let (status, body) = send(design_state(designer), request).await;
        assert_eq!(status, StatusCode::OK);
        let urls: Vec<&str> = body["variations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["imageUrl"].as_str().unwrap())
            .collect();
        assert_eq!(urls.len(), 2);
        assert!(urls.iter().all(|url| url.starts_with("https://img.test/")));
        assert_ne!(urls[0], urls[1]);
    }

    #[tokio::test]
    async fn test_design_short_batch_is_filled_individually() {
        let designer = FakeDesigner {
            batch_returns: Some(1),
            ..FakeDesigner::default()
        };
        let request = multipart(
            "/api/design",
            vec![Part::File("frontDrawing", "front.png", png_bytes())],
        );
        let (status, body) = send(design_state(designer), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["variations"][0]["id"], "front_1");
        assert_eq!(body["variations"][0]["imageUrl"], "https://img.test/0-0.png");
        assert_eq!(body["variations"][1]["id"], "front_2");
        assert_eq!(body["variations"][1]["imageUrl"], "https://img.test/1-0.png");
    }

    #[tokio::test]
    async fn test_design_failed_variations_become_placeholders() {
        let designer = FakeDesigner {
            fail_batches: true,
            fail_singles: true,
            ..FakeDesigner::default()
        };
        let request = multipart(
            "/api/design",
            vec![
                Part::File("frontDrawing", "front.png", png_bytes()),
                Part::Text("color", "#123456"),
            ],
        );
        let (status, body) = send(design_state(designer), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(
            body["variations"][0]["imageUrl"],
            "/placeholder.svg?height=600&width=400&query=elegant_dress_design_variation_1_123456"
        );
        assert_eq!(
            body["variations"][1]["imageUrl"],
            "/placeholder.svg?height=600&width=400&query=modern_dress_design_variation_2_123456"
        );
    }

    #[tokio::test]
    async fn test_design_inline_results_are_embedded_as_jpeg() {
        let request = multipart(
            "/api/design",
            vec![Part::File("frontDrawing", "front.png", png_bytes())],
        );
        let (status, body) = send(design_state(InlineDesigner), request).await;
        assert_eq!(status, StatusCode::OK);
        let url = body["variations"][0]["imageUrl"].as_str().unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_design_without_credentials() {
        let request = multipart(
            "/api/design",
            vec![Part::File("frontDrawing", "front.png", png_bytes())],
        );
        let (status, body) = send(AppState::new(StudioConfig::default()), request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "OPENAI_API_KEY not configured");
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let config = StudioConfig {
            max_upload_bytes: 1024,
            ..StudioConfig::default()
        };
        let state = AppState::new(config).with_designer(Arc::new(FakeDesigner::default()));
        let request = multipart(
            "/api/design",
            vec![Part::File("frontDrawing", "huge.png", vec![7; 4096])],
        );
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "File \"huge.png\" is too large. Maximum size is 1MB."
        );
    }

    #[tokio::test]
    async fn test_try_on_requires_both_images() {
        let request = multipart(
            "/api/try-on",
            vec![Part::File("personImage_0", "me.png", png_bytes())],
        );
        let (status, body) = send(try_on_state(false, false), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Both person and clothing images are required");
    }

    #[tokio::test]
    async fn test_try_on_with_analysis() {
        let request = multipart(
            "/api/try-on",
            vec![
                Part::File("personImage_0", "me.png", png_bytes()),
                Part::File("clothingImage_0", "dress.png", png_bytes()),
                Part::File("clothingImage_1", "scarf.png", png_bytes()),
            ],
        );
        let (status, body) = send(try_on_state(false, false), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["provider"], "Fal AI");
        assert_eq!(body["imageUrl"], "https://img.test/try-on.png");
        assert!(body["processingTime"].as_str().unwrap().ends_with('s'));
        assert_eq!(body["personDetails"]["ageRange"], "27-32");
        assert_eq!(body["personDetails"]["height"], "168cm");
        assert_eq!(body["personDetails"]["pose"], "Standing");
        assert_eq!(body["clothingDetails"]["type"], "Dress");
        assert_eq!(body["clothingDetails"]["fit"], "Unknown");
        assert!(body.get("prompt").is_none());
    }

    #[tokio::test]
    async fn test_try_on_openai_and_failed_analysis() {
        let request = multipart(
            "/api/try-on",
            vec![
                Part::File("personImage", "me.png", png_bytes()),
                Part::File("clothingImage", "dress.png", png_bytes()),
                Part::Text("selectedModel", "openai"),
            ],
        );
        let (status, body) = send(try_on_state(true, false), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["provider"], "OpenAI");
        assert!(body.get("personDetails").is_none());
        assert!(body.get("clothingDetails").is_none());
    }

    #[tokio::test]
    async fn test_try_on_generation_failure_is_friendly() {
        let request = multipart(
            "/api/try-on",
            vec![
                Part::File("personImage_0", "me.png", png_bytes()),
                Part::File("clothingImage_0", "dress.png", png_bytes()),
            ],
        );
        let (status, body) = send(try_on_state(false, true), request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(
            body["error"],
            "OpenAI API billing issue. Please check your OpenAI account."
        );
    }

    #[tokio::test]
    async fn test_try_on_missing_fal_key() {
        let state = AppState::new(StudioConfig::default())
            .with_vision(Arc::new(FakeVision { fail: false }));
        let request = multipart(
            "/api/try-on",
            vec![
                Part::File("personImage_0", "me.png", png_bytes()),
                Part::File("clothingImage_0", "dress.png", png_bytes()),
            ],
        );
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "FAL_KEY not configured");
    }

    #[tokio::test]
    async fn test_orders_are_distinct_and_retrievable() {
        let state = AppState::new(StudioConfig::default());
        let order = json!({
            "fullName": "Ada Lovelace",
            "contact": "ada@example.com",
            "bust": "88", "waist": "70", "hips": "95",
            "designImages": { "front": "https://img.test/front.png", "back": null },
            "tryOnImage": null,
            "timestamp": "2024-05-01T10:00:00Z"
        });

        let (status, first) = send(state.clone(), json_request("/api/submit-order", order.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["message"], "Order submitted successfully to tailor");
        let (_, second) = send(state.clone(), json_request("/api/submit-order", order)).await;
        let first_id = first["orderId"].as_str().unwrap().to_string();
        assert!(first_id.starts_with("ORD-"));
        assert_ne!(first["orderId"], second["orderId"]);

        let lookup = Request::builder()
            .uri(format!("/api/orders/{}", first_id))
            .body(Body::empty())
            .unwrap();
        let (status, record) = send(state.clone(), lookup).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["kind"], "tailor");
        assert_eq!(record["payload"]["fullName"], "Ada Lovelace");

        let missing = Request::builder()
            .uri("/api/orders/ORD-0-NOPE00")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(state, missing).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_approve_design() {
        let state = AppState::new(StudioConfig::default());
        let approval = json!({
            "imageUrl": "https://img.test/try-on.png",
            "personDetails": { "bodyType": "Slim" },
            "clothingDetails": { "type": "Dress", "style": "Evening" },
            "timestamp": "2024-05-01T10:00:00Z"
        });
        let (status, body) = send(state, json_request("/api/approve-design", approval)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["orderId"].as_str().unwrap().starts_with("TRY-"));
        assert_eq!(body["message"], "Design approved and order placed successfully!");
        assert_eq!(body["trackingInfo"]["status"], "Processing");
        assert_eq!(body["trackingInfo"]["nextUpdate"], "24 hours");
        assert_eq!(body["estimatedDelivery"].as_str().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_invalid_json_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/submit-order")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(AppState::new(StudioConfig::default()), request).await;
        assert!(status.is_client_error());
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(AppState::new(StudioConfig::default()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["providers"]["openai"], false);
    }
}
