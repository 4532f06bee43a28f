//! Read-only decoding of legacy on-disk references.
//!
//! Legacy object slots hold a raw object address. Legacy region slots hold
//! a heap id whose heap object is `[object address][selection]`.

use hcf_blob::HeapId;
use hcf_types::{Address, AddressWidth, ByteReader, Selection};

use crate::container::Container;
use crate::error::{RefError, Result};
use crate::reference::LegacyRegion;

/// Decode a legacy object slot. Consumes exactly `address_width` bytes.
pub fn decode_object_address(src: &[u8], address_width: AddressWidth) -> Result<Address> {
    ByteReader::new(src)
        .read_address(address_width)
        .map_err(|e| RefError::CantDecode(format!("legacy object address: {e}")))
}

/// Decode a legacy region slot, fetching its selection from `container`'s heap.
pub fn decode_region(container: &dyn Container, src: &[u8]) -> Result<LegacyRegion> {
    let aw = container.address_width();
    let mut r = ByteReader::new(src);
    let heap_id = r
        .read_address(aw)
        .and_then(|addr| Ok(HeapId::new(addr, r.read_u32()?)))
        .map_err(|e| RefError::CantDecode(format!("legacy region heap id: {e}")))?;
    if heap_id.is_nil() {
        return Err(RefError::CantDecode("legacy region has a nil heap id".into()));
    }

    let data = container
        .heap()
        .read(&heap_id)
        .map_err(|e| RefError::CantDecode(format!("legacy region {heap_id}: {e}")))?;
    let mut r = ByteReader::new(&data);
    let address = r
        .read_address(aw)
        .map_err(|e| RefError::CantDecode(format!("legacy region object address: {e}")))?;
    let selection = Selection::decode(&mut r)
        .map_err(|e| RefError::CantDecode(format!("legacy region selection: {e}")))?;
    Ok(LegacyRegion { address, selection })
}
