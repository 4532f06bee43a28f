//! Error types for reference operations.

use hcf_blob::BlobError;
use thiserror::Error;

/// Errors that can occur while encoding, decoding or relocating references.
#[derive(Debug, Error)]
pub enum RefError {
    /// A handle or container could not be resolved.
    #[error("invalid location: {0}")]
    BadType(String),

    /// A location mode outside the legal set was requested.
    #[error("invalid reference datatype location: {0}")]
    BadRange(String),

    /// A stored discriminant or field value is out of range.
    #[error("invalid reference value: {0}")]
    BadValue(String),

    #[error("unable to encode reference: {0}")]
    CantEncode(String),

    #[error("unable to decode reference: {0}")]
    CantDecode(String),

    /// Container or heap information could not be queried.
    #[error("unable to get {0}")]
    CantGet(String),

    #[error("unable to set {0}")]
    CantSet(String),

    /// A legacy reference could not be converted to the current form.
    #[error("unable to create reference: {0}")]
    CantCreate(String),

    #[error("unable to remove blob: {0}")]
    CantRemove(String),

    #[error("unable to release {0}")]
    CantFree(String),

    #[error("heap read failed: {0}")]
    ReadError(String),

    #[error("heap write failed: {0}")]
    WriteError(String),

    /// The operation does not exist for this reference kind or location.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Configuration could not be parsed or is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RefError {
    pub(crate) fn encode(e: impl std::fmt::Display) -> Self {
        Self::CantEncode(e.to_string())
    }

    pub(crate) fn decode(e: impl std::fmt::Display) -> Self {
        Self::CantDecode(e.to_string())
    }
}

impl From<BlobError> for RefError {
    fn from(e: BlobError) -> Self {
        match e {
            BlobError::WriteError(_) => Self::WriteError(e.to_string()),
            BlobError::ReadError(_) => Self::ReadError(e.to_string()),
            BlobError::RemoveError(_) => Self::CantRemove(e.to_string()),
            other => Self::CantGet(format!("blob: {other}")),
        }
    }
}

/// Convenience type alias for reference operations.
pub type Result<T> = std::result::Result<T, RefError>;
