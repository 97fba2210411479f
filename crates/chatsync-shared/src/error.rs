use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unknown image resolution: {0}")]
    UnknownResolution(String),

    #[error("Server rejected request: {code}: {message}")]
    Rejected { code: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
