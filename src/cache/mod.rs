//! Caching Module
//!
//! Process-lifetime memoization of the fitted model:
//! - Single-flight builds (concurrent misses share one builder run)
//! - Explicit Unset / Building / Ready state
//! - Optional build timeout and failure cooldown

mod model_cache;

pub use model_cache::{
    BoxError, CacheConfig, CacheState, CacheStats, FnBuilder, ModelBuilder, ModelCache,
    ModelCacheError,
};
