//! asnake-core: Model geometry, prediction types and configuration shared by the export crates.

pub mod config;
pub mod model;

pub use config::{validate_config, Config, ConfigError};
pub use model::{input_dim_for, softmax, PolicyValue, Prediction, ACTIONS, CHANNELS};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
