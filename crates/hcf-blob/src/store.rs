use hcf_types::{AddressWidth, ByteReader, ByteWriter};
use tracing::debug;

use crate::error::{BlobError, BlobResult};
use crate::heap::GlobalHeap;
use crate::locator::BlobLocator;

/// Put/get/delete operations on blob fields backed by a [`GlobalHeap`].
///
/// Every method takes the raw field bytes (`[seq len][heap id]`) as they sit
/// inside a record. Only [`put`](Self::put) and [`delete`](Self::delete)
/// touch the heap's durable state.
#[derive(Clone, Copy)]
pub struct BlobStore<'h> {
    heap: &'h dyn GlobalHeap,
}

impl<'h> BlobStore<'h> {
    pub fn new(heap: &'h dyn GlobalHeap) -> Self {
        Self { heap }
    }

    fn address_width(&self) -> AddressWidth {
        self.heap.address_width()
    }

    /// Width of a blob field in this store.
    pub fn field_width(&self) -> usize {
        BlobLocator::width(self.address_width())
    }

    /// Store `data` as a new heap object and write its field into `dst`.
    ///
    /// `seq_len` is recorded as the field's sequence length.
    pub fn put(&self, data: &[u8], seq_len: u32, dst: &mut [u8]) -> BlobResult<BlobLocator> {
        if dst.len() < self.field_width() {
            return Err(BlobError::WriteError(Box::new(BlobError::Codec(
                hcf_types::TypeError::Truncated {
                    needed: self.field_width(),
                    remaining: dst.len(),
                },
            ))));
        }
        let heap_id = self
            .heap
            .insert(data)
            .map_err(|e| BlobError::WriteError(Box::new(e)))?;
        let locator = BlobLocator { seq_len, heap_id };
        locator.encode(&mut ByteWriter::new(dst), self.address_width())?;
        debug!(heap_id = %heap_id, len = data.len(), "blob stored");
        Ok(locator)
    }

    /// Copy the blob referenced by the field in `src` into `out`.
    ///
    /// A null field leaves `out` untouched and returns `0`. Otherwise returns
    /// the number of bytes copied; `out` must be large enough, sized by the
    /// caller beforehand (see [`get_size`](Self::get_size)).
    pub fn get(&self, src: &[u8], out: &mut [u8]) -> BlobResult<usize> {
        let locator = BlobLocator::decode(&mut ByteReader::new(src), self.address_width())?;
        if locator.is_null() {
            return Ok(0);
        }
        let data = self
            .heap
            .read(&locator.heap_id)
            .map_err(|e| BlobError::ReadError(Box::new(e)))?;
        if data.len() > out.len() {
            return Err(BlobError::ReadError(Box::new(BlobError::Corrupt {
                id: locator.heap_id,
                reason: format!(
                    "object holds {} bytes, buffer has room for {}",
                    data.len(),
                    out.len()
                ),
            })));
        }
        out[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    /// The sequence length recorded in the field's 4-byte prefix.
    pub fn get_size(src: &[u8]) -> BlobResult<usize> {
        Ok(ByteReader::new(src).read_u32()? as usize)
    }

    /// Returns `true` when the field's heap address is zero.
    pub fn is_null(&self, src: &[u8]) -> BlobResult<bool> {
        let locator = BlobLocator::decode(&mut ByteReader::new(src), self.address_width())?;
        Ok(locator.is_null())
    }

    /// Overwrite `dst` with the canonical null field.
    pub fn set_null(&self, dst: &mut [u8]) -> BlobResult<()> {
        BlobLocator::NULL.encode(&mut ByteWriter::new(dst), self.address_width())
    }

    /// Free the heap object referenced by the field in `src`.
    ///
    /// Fields with a zero sequence length or a nil address refer to nothing
    /// and cause no heap operation. Returns `true` if an object was freed.
    pub fn delete(&self, src: &[u8]) -> BlobResult<bool> {
        let locator = BlobLocator::decode(&mut ByteReader::new(src), self.address_width())?;
        if locator.seq_len == 0 || locator.is_null() {
            return Ok(false);
        }
        self.heap
            .remove(&locator.heap_id)
            .map_err(|e| BlobError::RemoveError(Box::new(e)))?;
        debug!(heap_id = %locator.heap_id, "blob deleted");
        Ok(true)
    }
}

impl std::fmt::Debug for BlobStore<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStore")
            .field("address_width", &self.address_width())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeapId;
    use crate::memory::InMemoryHeap;
    use hcf_types::Address;

    fn heap() -> InMemoryHeap {
        InMemoryHeap::new(AddressWidth::W8)
    }

    // -----------------------------------------------------------------------
    // put / get
    // -----------------------------------------------------------------------

    #[test]
    fn put_then_get() {
        let heap = heap();
        let store = BlobStore::new(&heap);
        let mut field = [0u8; 16];
        let locator = store.put(b"payload", 7, &mut field).unwrap();
        assert_eq!(locator.seq_len, 7);
        assert_eq!(BlobStore::get_size(&field).unwrap(), 7);

        let mut out = vec![0u8; 7];
        assert_eq!(store.get(&field, &mut out).unwrap(), 7);
        assert_eq!(out, b"payload");
    }

    #[test]
    fn get_null_leaves_buffer_untouched() {
        let heap = heap();
        let store = BlobStore::new(&heap);
        let mut field = [0xaau8; 16];
        store.set_null(&mut field).unwrap();
        let mut out = [0x55u8; 4];
        assert_eq!(store.get(&field, &mut out).unwrap(), 0);
        assert_eq!(out, [0x55; 4]);
        assert_eq!(heap.stats().reads, 0);
    }

    #[test]
    fn get_missing_object_is_read_error() {
        let heap = heap();
        let store = BlobStore::new(&heap);
        let mut field = [0u8; 16];
        BlobLocator {
            seq_len: 3,
            heap_id: HeapId::new(Address::new(0x4000), 9),
        }
        .encode(&mut ByteWriter::new(&mut field), AddressWidth::W8)
        .unwrap();
        let mut out = [0u8; 3];
        let err = store.get(&field, &mut out).unwrap_err();
        assert!(matches!(err, BlobError::ReadError(_)));
    }

    #[test]
    fn get_into_short_buffer_fails() {
        let heap = heap();
        let store = BlobStore::new(&heap);
        let mut field = [0u8; 16];
        store.put(b"0123456789", 10, &mut field).unwrap();
        let mut out = [0u8; 4];
        assert!(matches!(
            store.get(&field, &mut out),
            Err(BlobError::ReadError(_))
        ));
    }

    #[test]
    fn put_into_full_heap_is_write_error() {
        let heap = InMemoryHeap::with_capacity(AddressWidth::W8, 2);
        let store = BlobStore::new(&heap);
        let mut field = [0u8; 16];
        let err = store.put(b"too big", 7, &mut field).unwrap_err();
        assert!(matches!(err, BlobError::WriteError(_)));
        assert!(heap.is_empty());
    }

    #[test]
    fn put_into_short_field_does_not_allocate() {
        let heap = heap();
        let store = BlobStore::new(&heap);
        let mut field = [0u8; 8];
        assert!(store.put(b"x", 1, &mut field).is_err());
        assert_eq!(heap.stats().inserts, 0);
    }

    // -----------------------------------------------------------------------
    // null handling
    // -----------------------------------------------------------------------

    #[test]
    fn set_null_then_is_null() {
        let heap = heap();
        let store = BlobStore::new(&heap);
        let mut field = [0xffu8; 16];
        assert!(!store.is_null(&field).unwrap());
        store.set_null(&mut field).unwrap();
        assert!(store.is_null(&field).unwrap());
        assert_eq!(field, [0u8; 16]);
    }

    #[test]
    fn stored_field_is_not_null() {
        let heap = heap();
        let store = BlobStore::new(&heap);
        let mut field = [0u8; 16];
        store.put(b"x", 1, &mut field).unwrap();
        assert!(!store.is_null(&field).unwrap());
    }

    // -----------------------------------------------------------------------
    // delete
    // -----------------------------------------------------------------------

    #[test]
    fn delete_frees_object() {
        let heap = heap();
        let store = BlobStore::new(&heap);
        let mut field = [0u8; 16];
        let locator = store.put(b"doomed", 6, &mut field).unwrap();
        assert!(store.delete(&field).unwrap());
        assert!(!heap.contains(&locator.heap_id).unwrap());
        assert_eq!(heap.stats().removes, 1);
    }

    #[test]
    fn delete_null_is_noop() {
        let heap = heap();
        let store = BlobStore::new(&heap);
        let mut field = [0u8; 16];
        store.set_null(&mut field).unwrap();
        assert!(!store.delete(&field).unwrap());
        assert_eq!(heap.stats(), Default::default());
    }

    #[test]
    fn double_delete_is_remove_error() {
        let heap = heap();
        let store = BlobStore::new(&heap);
        let mut field = [0u8; 16];
        store.put(b"once", 4, &mut field).unwrap();
        store.delete(&field).unwrap();
        let err = store.delete(&field).unwrap_err();
        assert!(matches!(err, BlobError::RemoveError(_)));
    }

    #[test]
    fn narrow_addresses() {
        let heap = InMemoryHeap::new(AddressWidth::try_from(2).unwrap());
        let store = BlobStore::new(&heap);
        assert_eq!(store.field_width(), 10);
        let mut field = [0u8; 10];
        store.put(b"abc", 3, &mut field).unwrap();
        let mut out = [0u8; 3];
        store.get(&field, &mut out).unwrap();
        assert_eq!(&out, b"abc");
    }
}
