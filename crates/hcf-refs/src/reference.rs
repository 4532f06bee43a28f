use std::cell::Cell;

use hcf_types::{Address, ObjectToken, Selection, SelectionEncoding};
use serde::{Deserialize, Serialize};

use crate::error::{RefError, Result};
use crate::handle::LocationHandle;

/// Size of a reference slot in a memory-form record.
pub const REF_MEM_SIZE: usize = 64;

/// Memory slot size of a legacy object reference (one address).
pub const LEGACY_OBJECT_MEM_SIZE: usize = 8;

/// Memory slot size of a legacy region reference (address plus selection handle).
pub const LEGACY_REGION_MEM_SIZE: usize = 12;

/// Discriminant stored in the first byte of every encoded reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RefType {
    /// Legacy object reference (raw address).
    Object1 = 0,
    /// Legacy dataset region reference.
    DatasetRegion1 = 1,
    Object2 = 2,
    DatasetRegion2 = 3,
    Attribute = 4,
}

impl RefType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Object1),
            1 => Some(Self::DatasetRegion1),
            2 => Some(Self::Object2),
            3 => Some(Self::DatasetRegion2),
            4 => Some(Self::Attribute),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns `true` for the deprecated address-based kinds.
    pub fn is_legacy(self) -> bool {
        matches!(self, Self::Object1 | Self::DatasetRegion1)
    }
}

/// What a reference points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefValue {
    Object {
        token: ObjectToken,
    },
    Region {
        token: ObjectToken,
        selection: Selection,
    },
    Attribute {
        token: ObjectToken,
        name: String,
    },
}

/// Cached local encoding size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct EncodedSize {
    /// Selection encoding the size was computed for; `None` when the
    /// reference has no selection.
    pub selection: Option<SelectionEncoding>,
    pub len: usize,
}

/// The in-memory form of a reference.
///
/// A reference either names its target file explicitly (`file_name`, the
/// external case) or is implicitly local and, once read from a container,
/// carries a [`LocationHandle`] back to it.
#[derive(Clone, Debug)]
pub struct Reference {
    value: RefValue,
    file_name: Option<String>,
    location: Option<LocationHandle>,
    encode_size: Cell<Option<EncodedSize>>,
}

impl Reference {
    fn new(value: RefValue) -> Self {
        Self {
            value,
            file_name: None,
            location: None,
            encode_size: Cell::new(None),
        }
    }

    /// Reference to a whole object.
    pub fn create_object(token: &[u8]) -> Result<Self> {
        let token = ObjectToken::from_slice(token).map_err(|e| RefError::CantCreate(e.to_string()))?;
        let r = Self::new(RefValue::Object { token });
        r.cache_local_size(None)?;
        Ok(r)
    }

    /// Reference to a region of an object. The selection is copied.
    pub fn create_region(token: &[u8], selection: &Selection) -> Result<Self> {
        let token = ObjectToken::from_slice(token).map_err(|e| RefError::CantCreate(e.to_string()))?;
        Ok(Self::new(RefValue::Region {
            token,
            selection: selection.clone(),
        }))
    }

    /// Reference to the attribute `name` of an object.
    pub fn create_attribute(token: &[u8], name: impl Into<String>) -> Result<Self> {
        let token = ObjectToken::from_slice(token).map_err(|e| RefError::CantCreate(e.to_string()))?;
        let r = Self::new(RefValue::Attribute {
            token,
            name: name.into(),
        });
        r.cache_local_size(None)?;
        Ok(r)
    }

    /// Legacy object reference at `address`, with a native token of `token_width` bytes.
    pub fn from_legacy_object(address: Address, token_width: usize) -> Result<Self> {
        let token = ObjectToken::from_address(address, token_width)
            .map_err(|e| RefError::CantCreate(e.to_string()))?;
        Self::create_object(token.as_bytes())
    }

    /// Legacy region reference, with a native token of `token_width` bytes.
    pub fn from_legacy_region(region: &LegacyRegion, token_width: usize) -> Result<Self> {
        let token = ObjectToken::from_address(region.address, token_width)
            .map_err(|e| RefError::CantCreate(e.to_string()))?;
        Self::create_region(token.as_bytes(), &region.selection)
    }

    /// Make this reference explicitly external to the file `name`.
    ///
    /// Drops any attached location handle.
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self.location = None;
        self
    }

    pub(crate) fn from_parts(value: RefValue, file_name: Option<String>) -> Self {
        Self {
            file_name,
            ..Self::new(value)
        }
    }

    /// Attach a handle to the container this reference was read from.
    ///
    /// Only implicitly local references accept a handle; the handle is
    /// cloned, so the caller keeps its own.
    pub fn set_location_id(&mut self, handle: &LocationHandle) -> Result<()> {
        if self.file_name.is_some() {
            return Err(RefError::CantSet(
                "location of a reference with an explicit file name".into(),
            ));
        }
        self.location = Some(handle.clone());
        Ok(())
    }

    pub fn ref_type(&self) -> RefType {
        match self.value {
            RefValue::Object { .. } => RefType::Object2,
            RefValue::Region { .. } => RefType::DatasetRegion2,
            RefValue::Attribute { .. } => RefType::Attribute,
        }
    }

    pub fn value(&self) -> &RefValue {
        &self.value
    }

    pub fn token(&self) -> &ObjectToken {
        match &self.value {
            RefValue::Object { token }
            | RefValue::Region { token, .. }
            | RefValue::Attribute { token, .. } => token,
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        match &self.value {
            RefValue::Region { selection, .. } => Some(selection),
            _ => None,
        }
    }

    pub fn attribute_name(&self) -> Option<&str> {
        match &self.value {
            RefValue::Attribute { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Returns `true` when the reference names its target file explicitly.
    pub fn is_external(&self) -> bool {
        self.file_name.is_some()
    }

    pub fn location(&self) -> Option<&LocationHandle> {
        self.location.as_ref()
    }

    /// Cached local encoding size for `encoding`, if one was computed.
    pub(crate) fn cached_size(&self, encoding: SelectionEncoding) -> Option<usize> {
        let cached = self.encode_size.get()?;
        match cached.selection {
            None => Some(cached.len),
            Some(e) if e == encoding => Some(cached.len),
            Some(_) => None,
        }
    }

    pub(crate) fn set_cached_size(&self, encoding: Option<SelectionEncoding>, len: usize) {
        self.encode_size.set(Some(EncodedSize {
            selection: encoding,
            len,
        }));
    }

    fn cache_local_size(&self, encoding: Option<SelectionEncoding>) -> Result<()> {
        let len = crate::codec::local_size(self, encoding.unwrap_or(SelectionEncoding::V1))?;
        self.set_cached_size(encoding, len);
        Ok(())
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.file_name == other.file_name
    }
}

impl Eq for Reference {}

/// Memory form of a legacy region reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyRegion {
    pub address: Address,
    pub selection: Selection,
}
