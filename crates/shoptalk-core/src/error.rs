use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{provider} backend unavailable: {message}")]
    ProviderUnavailable { provider: &'static str, message: String },

    #[error("Corpus store unavailable: {0}")]
    StoreUnavailable(String),
}

impl Error {
    pub fn provider(provider: &'static str, err: impl std::fmt::Display) -> Self {
        Error::ProviderUnavailable { provider, message: err.to_string() }
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        Error::StoreUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
