//! Application state management

use crate::cache::{ModelBuilder, ModelCache};
use crate::training::HousingRegressionBuilder;

use super::ServerConfig;

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    /// The one fitted model this process serves
    pub model: ModelCache<serde_json::Value>,
}

impl AppState {
    /// State backed by the CSV regression builder named in `config`.
    pub fn new(config: ServerConfig) -> Self {
        let builder = HousingRegressionBuilder::new(&config.dataset_path, &config.target_column);
        Self::with_builder(config, builder)
    }

    /// State backed by an arbitrary builder.
    pub fn with_builder<B>(config: ServerConfig, builder: B) -> Self
    where
        B: ModelBuilder<Artifact = serde_json::Value>,
    {
        let model = ModelCache::with_config(builder, config.cache_config());
        Self { config, model }
    }
}
