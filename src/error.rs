use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Signature header missing a required segment or otherwise unparseable.
    #[error("Malformed signature header: {0}")]
    MalformedSignature(&'static str),

    /// Signature digest mismatch, or timestamp outside tolerance.
    #[error("Signature verification failed")]
    SignatureInvalid,

    /// Body was not valid JSON or lacked a required field.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
