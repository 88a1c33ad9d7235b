//! Core infrastructure for Boardpulse.
//!
//! Configuration, fetch retries, and degradation bookkeeping shared by the
//! source adapters and the refresh pipeline.

mod config;
mod degradation;
mod retry;

pub use config::{
    Config, ConfigError, EngineConfig, OutputConfig, SourceConfig, StallOverride, CONFIG_ENV_VAR,
};
pub use degradation::{
    DataFeed, DegradationReason, DegradationReport, DegradedFeed, FallbackResult,
};
pub use retry::{retry_async, AttemptTimedOut, RetryConfig, RetryResult};
