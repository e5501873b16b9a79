use thiserror::Error;

#[derive(Error, Debug)]
pub enum PwrpcError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No free snapshot slot")]
    NoFreeSlot,
}

pub type Result<T> = std::result::Result<T, PwrpcError>;
