use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("invalid peer url: {0}")]
    InvalidUrl(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("peer answered {status}: {detail}")]
    BadResponse { status: u16, detail: String },

    #[error("response body did not decode: {0}")]
    Decode(String),

    #[error("sync failed: {0}")]
    SyncFailed(String),
}
