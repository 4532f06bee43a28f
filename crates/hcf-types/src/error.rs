use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("buffer too short: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("unsupported address width: {0}")]
    InvalidAddressWidth(u8),

    #[error("address {address:#x} does not fit in {width} bytes")]
    AddressOverflow { address: u64, width: u8 },

    #[error("invalid token size: {0}")]
    InvalidTokenSize(usize),

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("unknown selection encoding version: {0}")]
    UnknownSelectionVersion(u8),

    #[error("value {value} exceeds encoding limit {max}")]
    ValueOutOfRange { value: u64, max: u64 },
}
