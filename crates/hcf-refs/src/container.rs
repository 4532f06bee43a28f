use hcf_blob::{BlobStore, GlobalHeap, InMemoryHeap};
use hcf_types::{
    AddressWidth, ContainerId, ContainerInfo, FormatBounds, SelectionEncoding,
    CONTAINER_INFO_VERSION,
};

use crate::config::ContainerConfig;
use crate::error::Result;

/// An open container as seen by the reference layer.
///
/// Supplies the layout parameters that size on-disk reference slots and the
/// global heap blob-backed references live in.
pub trait Container: Send + Sync {
    /// Unique id of this open container.
    fn id(&self) -> ContainerId;

    /// Name recorded in external references pointing into this container.
    fn name(&self) -> &str;

    fn address_width(&self) -> AddressWidth;

    /// Token width, blob-id width and layout version.
    fn info(&self) -> Result<ContainerInfo>;

    fn format_bounds(&self) -> FormatBounds;

    /// The heap blob-backed references are stored in.
    fn heap(&self) -> &dyn GlobalHeap;

    fn blob_store(&self) -> BlobStore<'_> {
        BlobStore::new(self.heap())
    }

    /// Encoding used for selections written into this container.
    fn selection_encoding(&self) -> SelectionEncoding {
        SelectionEncoding::for_bounds(&self.format_bounds())
    }
}

/// A container backed entirely by memory.
pub struct InMemoryContainer {
    id: ContainerId,
    config: ContainerConfig,
    heap: InMemoryHeap,
}

impl InMemoryContainer {
    /// Create an empty container after validating `config`.
    pub fn new(config: ContainerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            id: ContainerId::new(),
            heap: InMemoryHeap::new(config.address_width),
            config,
        })
    }

    /// The concrete heap, for inspecting counters.
    pub fn memory_heap(&self) -> &InMemoryHeap {
        &self.heap
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }
}

impl Container for InMemoryContainer {
    fn id(&self) -> ContainerId {
        self.id
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn address_width(&self) -> AddressWidth {
        self.config.address_width
    }

    fn info(&self) -> Result<ContainerInfo> {
        Ok(ContainerInfo {
            version: CONTAINER_INFO_VERSION,
            token_width: self.config.token_width(),
            blob_id_width: self.heap.blob_id_width(),
        })
    }

    fn format_bounds(&self) -> FormatBounds {
        self.config.format_bounds
    }

    fn heap(&self) -> &dyn GlobalHeap {
        &self.heap
    }
}

impl std::fmt::Debug for InMemoryContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryContainer")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("heap", &self.heap)
            .finish()
    }
}
