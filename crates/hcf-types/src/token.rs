use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::TypeError;

/// Largest token any container may use.
pub const MAX_TOKEN_SIZE: usize = 16;

/// Opaque, container-scoped identifier for an object.
///
/// Tokens replace raw physical addresses in the current reference encoding.
/// Their width is a property of the container (see
/// [`ContainerInfo::token_width`](crate::ContainerInfo)); for native files a
/// token is the object's address in little-endian form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectToken {
    bytes: [u8; MAX_TOKEN_SIZE],
    len: u8,
}

impl ObjectToken {
    /// Build a token from its raw bytes (1 to [`MAX_TOKEN_SIZE`] bytes).
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        if bytes.is_empty() || bytes.len() > MAX_TOKEN_SIZE {
            return Err(TypeError::InvalidTokenSize(bytes.len()));
        }
        let mut raw = [0u8; MAX_TOKEN_SIZE];
        raw[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            bytes: raw,
            len: bytes.len() as u8,
        })
    }

    /// Token of `size` bytes for a native object located at `address`.
    ///
    /// The address is stored little-endian and zero-extended; the undefined
    /// address becomes an all-`0xff` token.
    pub fn from_address(address: Address, size: usize) -> Result<Self, TypeError> {
        if size == 0 || size > MAX_TOKEN_SIZE {
            return Err(TypeError::InvalidTokenSize(size));
        }
        if !address.is_defined() {
            return Self::from_slice(&vec![0xff; size]);
        }
        if size < 8 && address.get() >> (size * 8) != 0 {
            return Err(TypeError::AddressOverflow {
                address: address.get(),
                width: size as u8,
            });
        }
        let mut raw = [0u8; MAX_TOKEN_SIZE];
        let le = address.get().to_le_bytes();
        let n = size.min(8);
        raw[..n].copy_from_slice(&le[..n]);
        Self::from_slice(&raw[..size])
    }

    /// An all-zero token of the given size, used for worst-case sizing.
    pub fn zeroed(size: usize) -> Result<Self, TypeError> {
        Self::from_slice(&vec![0u8; size])
    }

    /// Interpret a native token as an address.
    pub fn to_address(&self) -> Result<Address, TypeError> {
        let bytes = self.as_bytes();
        if bytes.iter().all(|b| *b == 0xff) {
            return Ok(Address::UNDEF);
        }
        if bytes.len() > 8 && bytes[8..].iter().any(|b| *b != 0) {
            return Err(TypeError::InvalidLength {
                expected: 8,
                actual: bytes.len(),
            });
        }
        let mut raw = [0u8; 8];
        let n = bytes.len().min(8);
        raw[..n].copy_from_slice(&bytes[..n]);
        Ok(Address::new(u64::from_le_bytes(raw)))
    }

    /// The meaningful token bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Token size in bytes.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Always `false`; tokens have at least one byte.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for ObjectToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectToken({})", self.to_hex())
    }
}

impl fmt::Display for ObjectToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_token_roundtrip() {
        let token = ObjectToken::from_address(Address::new(0x1000), 8).unwrap();
        assert_eq!(token.len(), 8);
        assert_eq!(token.as_bytes(), &[0x00, 0x10, 0, 0, 0, 0, 0, 0]);
        assert_eq!(token.to_address().unwrap(), Address::new(0x1000));
    }

    #[test]
    fn wide_tokens_zero_extend() {
        let token = ObjectToken::from_address(Address::new(0x2000), 16).unwrap();
        assert_eq!(token.len(), 16);
        assert_eq!(&token.as_bytes()[8..], &[0u8; 8]);
        assert_eq!(token.to_address().unwrap(), Address::new(0x2000));
    }

    #[test]
    fn narrow_tokens_reject_large_addresses() {
        let err = ObjectToken::from_address(Address::new(0x1_0000), 2).unwrap_err();
        assert!(matches!(err, TypeError::AddressOverflow { width: 2, .. }));
        let token = ObjectToken::from_address(Address::new(0xffee), 2).unwrap();
        assert_eq!(token.to_address().unwrap(), Address::new(0xffee));
    }

    #[test]
    fn undefined_address_token() {
        let token = ObjectToken::from_address(Address::UNDEF, 4).unwrap();
        assert_eq!(token.as_bytes(), &[0xff; 4]);
        assert_eq!(token.to_address().unwrap(), Address::UNDEF);
    }

    #[test]
    fn size_limits() {
        assert_eq!(
            ObjectToken::from_slice(&[]).unwrap_err(),
            TypeError::InvalidTokenSize(0)
        );
        assert_eq!(
            ObjectToken::from_slice(&[0; 17]).unwrap_err(),
            TypeError::InvalidTokenSize(17)
        );
        assert_eq!(ObjectToken::from_slice(&[7; 16]).unwrap().len(), 16);
    }

    #[test]
    fn equality_ignores_padding() {
        let a = ObjectToken::from_slice(&[1, 2]).unwrap();
        let b = ObjectToken::from_slice(&[1, 2]).unwrap();
        let c = ObjectToken::from_slice(&[1, 2, 0]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn hex_roundtrip() {
        let token = ObjectToken::from_slice(&[0xde, 0xad, 0xbe, 0xef]).unwrap();
        assert_eq!(token.to_hex(), "deadbeef");
        assert_eq!(ObjectToken::from_hex("deadbeef").unwrap(), token);
        assert!(matches!(
            ObjectToken::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn high_bytes_must_be_zero_for_addresses() {
        let mut bytes = [0u8; 12];
        bytes[10] = 1;
        let token = ObjectToken::from_slice(&bytes).unwrap();
        assert!(token.to_address().is_err());
    }
}
