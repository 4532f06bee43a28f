use hcf_types::TypeError;

use crate::heap::HeapId;

/// Errors from blob and heap operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// The heap has no object at this id.
    #[error("heap object not found: {0}")]
    NotFound(HeapId),

    /// The heap cannot allocate more space.
    #[error("heap is full: {requested} bytes requested, {available} available")]
    HeapFull { requested: usize, available: usize },

    /// A heap object or its bookkeeping is malformed.
    #[error("corrupt heap object {id}: {reason}")]
    Corrupt { id: HeapId, reason: String },

    /// Storing a blob failed.
    #[error("unable to write blob: {0}")]
    WriteError(#[source] Box<BlobError>),

    /// Fetching a blob failed.
    #[error("unable to read blob: {0}")]
    ReadError(#[source] Box<BlobError>),

    /// Freeing a blob failed.
    #[error("unable to remove blob: {0}")]
    RemoveError(#[source] Box<BlobError>),

    /// A blob field could not be encoded or decoded.
    #[error("blob field codec error: {0}")]
    Codec(#[from] TypeError),
}

/// Result alias for blob operations.
pub type BlobResult<T> = Result<T, BlobError>;
