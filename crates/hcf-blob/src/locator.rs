use hcf_types::{AddressWidth, ByteReader, ByteWriter};

use crate::error::BlobResult;
use crate::heap::HeapId;

/// Decoded blob field: the sequence length and where the bytes live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlobLocator {
    /// Length of the stored sequence, as recorded next to the heap id.
    pub seq_len: u32,
    /// Heap object holding the bytes; nil for an empty blob.
    pub heap_id: HeapId,
}

impl BlobLocator {
    /// The canonical empty blob: zero length, nil heap id.
    pub const NULL: BlobLocator = BlobLocator {
        seq_len: 0,
        heap_id: HeapId::NIL,
    };

    /// Encoded width for the given address width.
    pub fn width(address_width: AddressWidth) -> usize {
        4 + HeapId::width(address_width)
    }

    /// Returns `true` when the heap address is zero.
    pub fn is_null(&self) -> bool {
        self.heap_id.is_nil()
    }

    pub fn encode(&self, w: &mut ByteWriter<'_>, address_width: AddressWidth) -> BlobResult<()> {
        w.put_u32(self.seq_len)?;
        w.put_address(self.heap_id.addr, address_width)?;
        w.put_u32(self.heap_id.index)?;
        Ok(())
    }

    pub fn decode(r: &mut ByteReader<'_>, address_width: AddressWidth) -> BlobResult<Self> {
        let seq_len = r.read_u32()?;
        let addr = r.read_address(address_width)?;
        let index = r.read_u32()?;
        Ok(Self {
            seq_len,
            heap_id: HeapId::new(addr, index),
        })
    }
}
