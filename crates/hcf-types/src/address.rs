use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Physical byte offset within a container file.
///
/// Address `0` is never a valid object location and is used as the "nil"
/// heap address. [`Address::UNDEF`] marks an address that was never
/// assigned; on disk it is stored as all `0xff` bytes at any width.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(u64);

impl Address {
    /// The nil address.
    pub const NIL: Address = Address(0);

    /// The undefined address.
    pub const UNDEF: Address = Address(u64::MAX);

    /// Wrap a raw offset.
    pub const fn new(offset: u64) -> Self {
        Self(offset)
    }

    /// The raw offset.
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns `true` for the nil address.
    pub fn is_nil(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` unless this is [`Address::UNDEF`].
    pub fn is_defined(&self) -> bool {
        self.0 != u64::MAX
    }

    /// Encode as `width` little-endian bytes.
    pub fn to_le_bytes(&self, width: AddressWidth) -> Result<Vec<u8>, TypeError> {
        let w = width.bytes();
        if !self.is_defined() {
            return Ok(vec![0xff; w]);
        }
        if w < 8 && self.0 >> (w * 8) != 0 {
            return Err(TypeError::AddressOverflow {
                address: self.0,
                width: width.get(),
            });
        }
        Ok(self.0.to_le_bytes()[..w].to_vec())
    }

    /// Decode from exactly `width` little-endian bytes.
    pub fn from_le_bytes(bytes: &[u8], width: AddressWidth) -> Result<Self, TypeError> {
        let w = width.bytes();
        if bytes.len() != w {
            return Err(TypeError::InvalidLength {
                expected: w,
                actual: bytes.len(),
            });
        }
        if bytes.iter().all(|b| *b == 0xff) {
            return Ok(Self::UNDEF);
        }
        let mut raw = [0u8; 8];
        raw[..w].copy_from_slice(bytes);
        Ok(Self(u64::from_le_bytes(raw)))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_defined() {
            write!(f, "Address({:#x})", self.0)
        } else {
            write!(f, "Address(UNDEF)")
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for Address {
    fn from(offset: u64) -> Self {
        Self(offset)
    }
}

/// Number of bytes an [`Address`] occupies on disk for a given container.
///
/// Containers use 2-, 4- or 8-byte addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct AddressWidth(u8);

impl AddressWidth {
    /// 8-byte addresses, the common default.
    pub const W8: AddressWidth = AddressWidth(8);

    /// Width in bytes.
    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Width in bytes as `usize`.
    pub const fn bytes(&self) -> usize {
        self.0 as usize
    }
}

impl Default for AddressWidth {
    fn default() -> Self {
        Self::W8
    }
}

impl TryFrom<u8> for AddressWidth {
    type Error = TypeError;

    fn try_from(width: u8) -> Result<Self, Self::Error> {
        match width {
            2 | 4 | 8 => Ok(Self(width)),
            other => Err(TypeError::InvalidAddressWidth(other)),
        }
    }
}

impl From<AddressWidth> for u8 {
    fn from(width: AddressWidth) -> Self {
        width.0
    }
}
