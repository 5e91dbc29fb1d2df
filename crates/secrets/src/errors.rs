use papertrade_market_data::MarketDataError;
use thiserror::Error;

/// Errors raised by the credential file.
#[derive(Error, Debug)]
pub enum SecretsError {
    #[error("Secret store error: {0}")]
    Secret(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid credential file: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SecretsError>;

impl From<SecretsError> for MarketDataError {
    fn from(error: SecretsError) -> Self {
        MarketDataError::Persistence(error.to_string())
    }
}
