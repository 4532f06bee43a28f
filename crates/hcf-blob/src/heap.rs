use std::fmt;

use hcf_types::{Address, AddressWidth};
use serde::{Deserialize, Serialize};

use crate::error::BlobResult;

/// Identifies one object in a global heap: collection address plus index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HeapId {
    pub addr: Address,
    pub index: u32,
}

impl HeapId {
    /// The nil heap id; never refers to a stored object.
    pub const NIL: HeapId = HeapId {
        addr: Address::NIL,
        index: 0,
    };

    pub fn new(addr: Address, index: u32) -> Self {
        Self { addr, index }
    }

    /// Returns `true` when the collection address is zero.
    pub fn is_nil(&self) -> bool {
        self.addr.is_nil()
    }

    /// On-disk width of a heap id: address plus 4-byte index.
    pub fn width(address_width: AddressWidth) -> usize {
        address_width.bytes() + 4
    }
}

impl fmt::Display for HeapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.index)
    }
}

/// The heap allocator blobs are stored in.
///
/// Implementations own the durable bytes; the blob layer only inserts,
/// reads and removes whole objects. Invariants:
/// - An id returned by `insert` stays readable until it is removed.
/// - Removing an id twice fails (the second call reports `NotFound`).
/// - Ids are never nil.
///
/// The heap is a shared mutable resource. Callers must hold whatever
/// container-level lock protects it before calling in.
pub trait GlobalHeap: Send + Sync {
    /// Width of the collection addresses this heap hands out.
    fn address_width(&self) -> AddressWidth;

    /// Store `data` as a new heap object and return its id.
    fn insert(&self, data: &[u8]) -> BlobResult<HeapId>;

    /// Read the object stored under `id`.
    fn read(&self, id: &HeapId) -> BlobResult<Vec<u8>>;

    /// Free the object stored under `id`.
    fn remove(&self, id: &HeapId) -> BlobResult<()>;

    /// Check whether `id` refers to a live object.
    fn contains(&self, id: &HeapId) -> BlobResult<bool>;

    /// Width of an encoded [`HeapId`].
    fn heap_id_width(&self) -> usize {
        HeapId::width(self.address_width())
    }

    /// Width of a blob field: 4-byte sequence length plus a heap id.
    fn blob_id_width(&self) -> usize {
        4 + self.heap_id_width()
    }
}
