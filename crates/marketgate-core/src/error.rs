//! Error types for MarketGate Core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(
        "EDS host '{host_key}' for market '{market}' is already registered by market '{existing_market}'"
    )]
    EdsHostConflict {
        host_key: String,
        market: String,
        existing_market: String,
    },

    // Provisioning errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration not found")]
    ConfigNotFound,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
