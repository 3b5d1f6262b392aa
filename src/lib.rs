//! Housing Model Server
//!
//! Fits a housing price regression model at most once per process and serves
//! it over HTTP.
//!
//! # Modules
//!
//! - [`cache`] - Single-flight, process-lifetime model cache
//! - [`training`] - OLS regression and the housing model builder
//! - [`utils`] - CSV loading and small numeric helpers
//! - [`server`] - HTTP server with REST API
//! - [`cli`] - Command-line interface

pub mod error;

pub mod cache;
pub mod training;
pub mod utils;

pub mod cli;
pub mod server;

pub use error::{HousingError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{CacheConfig, CacheState, ModelBuilder, ModelCache, ModelCacheError};
    pub use crate::error::{HousingError, Result};
    pub use crate::server::{create_router, AppState, ServerConfig};
    pub use crate::training::{HousingModel, HousingRegressionBuilder, LinearRegression};
}
