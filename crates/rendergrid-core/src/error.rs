//! Errors raised while loading a deployment profile.

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse deployment profile: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render deployment profile: {0}")]
    Render(#[from] toml::ser::Error),
}
