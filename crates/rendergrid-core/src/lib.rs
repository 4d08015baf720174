pub mod config;
pub mod error;
pub mod types;

pub use config::{DeploymentConfig, parse_duration};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
