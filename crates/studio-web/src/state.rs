//! Application state.

use std::sync::Arc;

use studio_core::order::OrderBook;
use studio_core::providers::{
    FalClient, ImageEditor, OpenAiClient, TryOnGenerator, VisionAnalyzer,
};
use studio_core::{StudioConfig, StudioError};

/// Application state shared across handlers.
///
/// Providers are optional: a missing API key leaves the slot empty and the
/// handler that needs it fails with a configuration error before any network
/// traffic.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<StudioConfig>,
    pub designer: Option<Arc<dyn ImageEditor>>,
    pub vision: Option<Arc<dyn VisionAnalyzer>>,
    pub openai_try_on: Option<Arc<dyn TryOnGenerator>>,
    pub fal_try_on: Option<Arc<dyn TryOnGenerator>>,
    pub orders: Arc<OrderBook>,
}

impl AppState {
    /// State with no providers wired in.
    pub fn new(config: StudioConfig) -> Self {
        Self {
            config: Arc::new(config),
            designer: None,
            vision: None,
            openai_try_on: None,
            fal_try_on: None,
            orders: Arc::new(OrderBook::new()),
        }
    }

    /// State with the real provider clients for every configured key.
    pub fn from_config(config: StudioConfig) -> Self {
        let openai = OpenAiClient::from_config(&config);
        let fal = FalClient::from_config(&config);

        let mut state = Self::new(config);
        if let Some(client) = openai {
            state.designer = Some(Arc::new(client.image_editor(state.config.design_model.clone())));
            state.vision = Some(Arc::new(client.clone()));
            state.openai_try_on = Some(Arc::new(client));
        }
        if let Some(client) = fal {
            state.fal_try_on = Some(Arc::new(client));
        }
        state
    }

    pub fn with_designer(mut self, designer: Arc<dyn ImageEditor>) -> Self {
        self.designer = Some(designer);
        self
    }

    pub fn with_vision(mut self, vision: Arc<dyn VisionAnalyzer>) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_openai_try_on(mut self, generator: Arc<dyn TryOnGenerator>) -> Self {
        self.openai_try_on = Some(generator);
        self
    }

    pub fn with_fal_try_on(mut self, generator: Arc<dyn TryOnGenerator>) -> Self {
        self.fal_try_on = Some(generator);
        self
    }

    pub fn designer(&self) -> Result<Arc<dyn ImageEditor>, StudioError> {
        self.designer
            .clone()
            .ok_or(StudioError::MissingCredentials("OPENAI_API_KEY"))
    }

    pub fn vision(&self) -> Result<Arc<dyn VisionAnalyzer>, StudioError> {
        self.vision
            .clone()
            .ok_or(StudioError::MissingCredentials("OPENAI_API_KEY"))
    }

    pub fn openai_try_on(&self) -> Result<Arc<dyn TryOnGenerator>, StudioError> {
        self.openai_try_on
            .clone()
            .ok_or(StudioError::MissingCredentials("OPENAI_API_KEY"))
    }

    pub fn fal_try_on(&self) -> Result<Arc<dyn TryOnGenerator>, StudioError> {
        self.fal_try_on
            .clone()
            .ok_or(StudioError::MissingCredentials("FAL_KEY"))
    }
}
