use thiserror::Error;

/// Top-level error type for the Stargaze service.
///
/// Pipeline crates (`stargaze-archive`, `stargaze-chat`) define their own
/// error enums; this one covers startup concerns shared by every binary:
/// configuration, credentials and the server socket.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StargazeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential: {0} is not set")]
    MissingCredential(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for StargazeError {
    fn from(err: toml::de::Error) -> Self {
        StargazeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for StargazeError {
    fn from(err: toml::ser::Error) -> Self {
        StargazeError::Config(err.to_string())
    }
}

/// A specialized `Result` type for Stargaze startup operations.
pub type Result<T> = std::result::Result<T, StargazeError>;
