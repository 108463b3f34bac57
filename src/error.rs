use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Classified failures surfaced to the connection layer.
///
/// `MalformedRecord` is fatal to the connection (framing is unrecoverable),
/// `MalformedRequest` rejects the request while the connection may continue,
/// `UnsupportedMethod` is answered with a client error by the response layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
