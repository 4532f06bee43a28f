//! Location state of a reference-typed record field.
//!
//! A field is interpreted either in its memory form (a [`Reference`]) or in
//! its on-disk form (bytes inside a container record). [`RefDatatype`]
//! tracks which, sizes the slot accordingly, and hands out the operation
//! set for the current location through [`RefDatatype::ops`].
//!
//! [`Reference`]: crate::reference::Reference

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::codec::{self, ENCODE_HEADER_SIZE};
use crate::container::Container;
use crate::disk::{DiskOps, ObjectCompatOps, RegionCompatOps};
use crate::error::{RefError, Result};
use crate::handle::HandleRegistry;
use crate::memory::MemoryOps;
use crate::reference::{LEGACY_OBJECT_MEM_SIZE, LEGACY_REGION_MEM_SIZE, REF_MEM_SIZE};

/// Where a reference field currently lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LocationMode {
    Uninitialized = 0,
    Memory = 1,
    Disk = 2,
    /// Decoded but not yet placed; the caller still has to choose.
    Invalid = 3,
}

impl TryFrom<u8> for LocationMode {
    type Error = RefError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Uninitialized),
            1 => Ok(Self::Memory),
            2 => Ok(Self::Disk),
            3 => Ok(Self::Invalid),
            other => Err(RefError::BadRange(format!("location mode {other}"))),
        }
    }
}

impl fmt::Display for LocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

/// Which reference datatype a field holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// Current polymorphic references (object, region, attribute).
    Opaque,
    /// Legacy object references.
    Object1,
    /// Legacy dataset region references.
    Region1,
}

/// Size of a source value and whether it may be copied byte for byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeHint {
    pub size: usize,
    /// The source encoding can be copied to the destination slot verbatim.
    pub direct_copy: bool,
}

/// Operations available in the current location.
#[derive(Clone, Debug)]
pub enum RefOps {
    Memory(MemoryOps),
    Disk(DiskOps),
    ObjectCompat(ObjectCompatOps),
    RegionCompat(RegionCompatOps),
}

/// A reference datatype bound to a location.
pub struct RefDatatype {
    kind: RefKind,
    registry: Arc<HandleRegistry>,
    mode: LocationMode,
    container: Option<Arc<dyn Container>>,
    size: usize,
}

impl RefDatatype {
    /// An uninitialized datatype of `kind`; handles for references read
    /// through it are issued by `registry`.
    pub fn new(kind: RefKind, registry: Arc<HandleRegistry>) -> Self {
        Self {
            kind,
            registry,
            mode: LocationMode::Uninitialized,
            container: None,
            size: 0,
        }
    }

    pub fn kind(&self) -> RefKind {
        self.kind
    }

    pub fn mode(&self) -> LocationMode {
        self.mode
    }

    /// Slot size in the current location.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Container the datatype is bound to, when on disk.
    pub fn container(&self) -> Option<&Arc<dyn Container>> {
        self.container.as_ref()
    }

    /// Move the datatype to `mode`.
    ///
    /// Returns `Ok(false)` when the datatype already is in `mode` (bound to
    /// the same container for [`LocationMode::Disk`]), `Ok(true)` when the
    /// location changed.
    pub fn set_location(
        &mut self,
        mode: LocationMode,
        container: Option<Arc<dyn Container>>,
    ) -> Result<bool> {
        match mode {
            LocationMode::Uninitialized => Err(RefError::BadRange(format!(
                "cannot move a reference datatype to {mode}"
            ))),
            LocationMode::Memory => {
                if container.is_some() {
                    return Err(RefError::BadType(
                        "memory location does not take a container".into(),
                    ));
                }
                if self.mode == LocationMode::Memory {
                    return Ok(false);
                }
                self.size = match self.kind {
                    RefKind::Opaque => REF_MEM_SIZE,
                    RefKind::Object1 => LEGACY_OBJECT_MEM_SIZE,
                    RefKind::Region1 => LEGACY_REGION_MEM_SIZE,
                };
                self.container = None;
                self.transition(mode);
                Ok(true)
            }
            LocationMode::Disk => {
                let container = container.ok_or_else(|| {
                    RefError::BadType("disk location requires a container".into())
                })?;
                if self.mode == LocationMode::Disk
                    && self.container.as_ref().map(|c| c.id()) == Some(container.id())
                {
                    return Ok(false);
                }
                self.size = disk_slot_size(self.kind, container.as_ref())?;
                self.container = Some(container);
                self.transition(mode);
                Ok(true)
            }
            LocationMode::Invalid => {
                if self.mode == LocationMode::Invalid {
                    return Ok(false);
                }
                self.container = None;
                self.transition(mode);
                Ok(true)
            }
        }
    }

    fn transition(&mut self, mode: LocationMode) {
        debug!(
            kind = ?self.kind,
            from = %self.mode,
            to = %mode,
            size = self.size,
            "reference location changed"
        );
        self.mode = mode;
    }

    /// Operations for the current location.
    ///
    /// `None` when uninitialized or invalid, and for legacy kinds in
    /// memory, which are plain values with nothing to convert.
    pub fn ops(&self) -> Option<RefOps> {
        match (self.mode, self.kind, &self.container) {
            (LocationMode::Memory, RefKind::Opaque, _) => {
                Some(RefOps::Memory(MemoryOps::new(Arc::clone(&self.registry))))
            }
            (LocationMode::Disk, RefKind::Opaque, Some(c)) => {
                Some(RefOps::Disk(DiskOps::new(Arc::clone(c), self.size)))
            }
            (LocationMode::Disk, RefKind::Object1, Some(c)) => {
                Some(RefOps::ObjectCompat(ObjectCompatOps::new(Arc::clone(c))))
            }
            (LocationMode::Disk, RefKind::Region1, Some(c)) => {
                Some(RefOps::RegionCompat(RegionCompatOps::new(Arc::clone(c))))
            }
            _ => None,
        }
    }
}

/// On-disk slot size of `kind` in `container`.
pub fn disk_slot_size(kind: RefKind, container: &dyn Container) -> Result<usize> {
    let aw = container.address_width().bytes();
    match kind {
        RefKind::Object1 => Ok(aw),
        RefKind::Region1 => Ok(container.heap().heap_id_width()),
        RefKind::Opaque => {
            let info = container
                .info()
                .map_err(|e| RefError::CantGet(format!("container info: {e}")))?;
            let blob_slot = ENCODE_HEADER_SIZE + 4 + info.blob_id_width;
            let min = codec::min_encode_size(info.token_width as usize)?;
            Ok(blob_slot.max(min))
        }
    }
}

impl fmt::Debug for RefDatatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefDatatype")
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .field("container", &self.container.as_ref().map(|c| c.id()))
            .field("size", &self.size)
            .finish()
    }
}
