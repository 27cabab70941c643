//! Dress Studio Core Library
//!
//! Domain model, wizard state, image compression, vision-attribute
//! normalization and the adapters for the external image providers.

pub mod analysis;
pub mod compress;
pub mod config;
pub mod error;
pub mod model;
pub mod order;
pub mod preview;
pub mod providers;
pub mod store;
pub mod wizard;

pub use config::StudioConfig;
pub use error::{StudioError, StudioResult};
