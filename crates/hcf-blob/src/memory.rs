use std::collections::BTreeMap;
use std::sync::RwLock;

use hcf_types::{Address, AddressWidth};

use crate::error::{BlobError, BlobResult};
use crate::heap::{GlobalHeap, HeapId};

/// First collection address handed out; zero is reserved for nil.
const FIRST_COLLECTION: u64 = 0x800;

/// Bytes per collection before a new collection address is started.
const COLLECTION_SIZE: usize = 4096;

/// Operation counters for an [`InMemoryHeap`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub inserts: usize,
    pub reads: usize,
    pub removes: usize,
}

struct HeapState {
    objects: BTreeMap<HeapId, Vec<u8>>,
    collection: u64,
    next_index: u32,
    collection_used: usize,
    total_bytes: usize,
    stats: HeapStats,
}

/// In-memory global heap.
///
/// Intended for tests and embedding. Objects are grouped into collections
/// of roughly [`COLLECTION_SIZE`] bytes, mirroring how a file heap assigns
/// `(collection address, index)` pairs. An optional capacity makes the heap
/// report [`BlobError::HeapFull`] once exhausted.
pub struct InMemoryHeap {
    address_width: AddressWidth,
    capacity: Option<usize>,
    state: RwLock<HeapState>,
}

impl InMemoryHeap {
    /// Create an empty heap with unlimited capacity.
    pub fn new(address_width: AddressWidth) -> Self {
        Self {
            address_width,
            capacity: None,
            state: RwLock::new(HeapState {
                objects: BTreeMap::new(),
                collection: FIRST_COLLECTION,
                next_index: 1,
                collection_used: 0,
                total_bytes: 0,
                stats: HeapStats::default(),
            }),
        }
    }

    /// Create an empty heap holding at most `capacity` bytes.
    pub fn with_capacity(address_width: AddressWidth, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new(address_width)
        }
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.state.read().expect("lock poisoned").objects.len()
    }

    /// Returns `true` if no objects are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes across all live objects.
    pub fn total_bytes(&self) -> usize {
        self.state.read().expect("lock poisoned").total_bytes
    }

    /// Counters of heap operations performed so far.
    pub fn stats(&self) -> HeapStats {
        self.state.read().expect("lock poisoned").stats
    }

    /// Sorted ids of all live objects.
    pub fn all_ids(&self) -> Vec<HeapId> {
        self.state
            .read()
            .expect("lock poisoned")
            .objects
            .keys()
            .copied()
            .collect()
    }
}

impl GlobalHeap for InMemoryHeap {
    fn address_width(&self) -> AddressWidth {
        self.address_width
    }

    fn insert(&self, data: &[u8]) -> BlobResult<HeapId> {
        let mut state = self.state.write().expect("lock poisoned");
        if let Some(capacity) = self.capacity {
            let available = capacity.saturating_sub(state.total_bytes);
            if data.len() > available {
                return Err(BlobError::HeapFull {
                    requested: data.len(),
                    available,
                });
            }
        }
        if state.collection_used > 0 && state.collection_used + data.len() > COLLECTION_SIZE {
            state.collection += COLLECTION_SIZE as u64;
            state.next_index = 1;
            state.collection_used = 0;
        }
        let id = HeapId::new(Address::new(state.collection), state.next_index);
        state.next_index += 1;
        state.collection_used += data.len();
        state.total_bytes += data.len();
        state.stats.inserts += 1;
        state.objects.insert(id, data.to_vec());
        Ok(id)
    }

    fn read(&self, id: &HeapId) -> BlobResult<Vec<u8>> {
        let mut state = self.state.write().expect("lock poisoned");
        state.stats.reads += 1;
        state.objects.get(id).cloned().ok_or(BlobError::NotFound(*id))
    }

    fn remove(&self, id: &HeapId) -> BlobResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        let data = state.objects.remove(id).ok_or(BlobError::NotFound(*id))?;
        state.total_bytes -= data.len();
        state.stats.removes += 1;
        Ok(())
    }

    fn contains(&self, id: &HeapId) -> BlobResult<bool> {
        Ok(self
            .state
            .read()
            .expect("lock poisoned")
            .objects
            .contains_key(id))
    }
}

impl std::fmt::Debug for InMemoryHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryHeap")
            .field("address_width", &self.address_width)
            .field("object_count", &self.len())
            .finish()
    }
}
