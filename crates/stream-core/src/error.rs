use thiserror::Error;

/// Errors raised while configuring a reading stream.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to spawn generator thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl GeneratorError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}
