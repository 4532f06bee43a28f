//! On-disk reference slots.
//!
//! A generic slot is laid out as
//!
//! ```text
//! [1 byte: reference type][1 byte: flags][u32: payload length][blob field]
//! ```
//!
//! where the payload is the reference encoding minus its two header bytes,
//! stored as a blob. A local object reference skips the blob and is stored
//! as its plain encoding, zero padded to the slot size.

use std::sync::Arc;

use hcf_blob::BlobStore;
use hcf_types::{Address, ByteReader, ByteWriter};
use tracing::debug;

use crate::codec::{EncodeFlags, ENCODE_HEADER_SIZE};
use crate::compat;
use crate::container::Container;
use crate::error::{RefError, Result};
use crate::location::SizeHint;
use crate::reference::{LegacyRegion, RefType, LEGACY_OBJECT_MEM_SIZE, LEGACY_REGION_MEM_SIZE};

/// Offset of the blob field inside a generic slot.
const BLOB_OFFSET: usize = ENCODE_HEADER_SIZE + 4;

/// Operations on generic reference slots of one container.
#[derive(Clone)]
pub struct DiskOps {
    container: Arc<dyn Container>,
    slot_size: usize,
}

impl DiskOps {
    pub(crate) fn new(container: Arc<dyn Container>, slot_size: usize) -> Self {
        Self {
            container,
            slot_size,
        }
    }

    pub fn container(&self) -> &Arc<dyn Container> {
        &self.container
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Size of the encoding held in `src`.
    ///
    /// A local object reference is stored directly, so the whole slot is
    /// reported and may be copied as is.
    pub fn get_size(&self, src: &[u8]) -> Result<SizeHint> {
        let mut r = ByteReader::new(src);
        let (ref_type, flags) = read_header(&mut r)?;
        if !flags.external && ref_type == RefType::Object2 {
            return Ok(SizeHint {
                size: src.len(),
                direct_copy: true,
            });
        }
        let len = r.read_u32().map_err(RefError::decode)? as usize;
        let seq_len = BlobStore::get_size(&src[BLOB_OFFSET..]).map_err(RefError::decode)?;
        if len != seq_len {
            return Err(RefError::CantDecode(format!(
                "slot records {len} payload bytes, blob field records {seq_len}"
            )));
        }
        Ok(SizeHint {
            size: len + ENCODE_HEADER_SIZE,
            direct_copy: false,
        })
    }

    /// Reassemble the encoding stored in `src` into `dst`.
    ///
    /// `dst` must be exactly the size [`get_size`](Self::get_size) reported.
    pub fn read(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        if dst.len() < ENCODE_HEADER_SIZE || src.len() < BLOB_OFFSET {
            return Err(RefError::CantDecode(format!(
                "slot of {} bytes cannot hold a reference",
                src.len()
            )));
        }
        dst[..ENCODE_HEADER_SIZE].copy_from_slice(&src[..ENCODE_HEADER_SIZE]);
        let expected = dst.len() - ENCODE_HEADER_SIZE;
        let fetched = self
            .container
            .blob_store()
            .get(&src[BLOB_OFFSET..], &mut dst[ENCODE_HEADER_SIZE..])?;
        if fetched != expected {
            return Err(RefError::CantDecode(format!(
                "blob holds {fetched} bytes, expected {expected}"
            )));
        }
        Ok(dst.len())
    }

    /// Store the encoding `src` into the slot `dst`.
    ///
    /// When `previous` holds the slot's old contents, the blob it refers to
    /// is deleted first. The two steps are not atomic.
    pub fn write(&self, src: &[u8], dst: &mut [u8], previous: Option<&[u8]>) -> Result<()> {
        if src.len() < ENCODE_HEADER_SIZE {
            return Err(RefError::CantEncode(format!(
                "encoding of {} bytes has no header",
                src.len()
            )));
        }
        self.check_slot(dst)?;
        if let Some(previous) = previous {
            self.release(previous)?;
        }

        let payload = &src[ENCODE_HEADER_SIZE..];
        let len = u32::try_from(payload.len())
            .map_err(|_| RefError::CantEncode(format!("payload of {} bytes", payload.len())))?;
        dst[..ENCODE_HEADER_SIZE].copy_from_slice(&src[..ENCODE_HEADER_SIZE]);
        ByteWriter::new(&mut dst[ENCODE_HEADER_SIZE..BLOB_OFFSET])
            .put_u32(len)
            .map_err(RefError::encode)?;
        let store = self.container.blob_store();
        store.put(payload, len, &mut dst[BLOB_OFFSET..])?;
        dst[BLOB_OFFSET + store.field_width()..].fill(0);
        Ok(())
    }

    /// Copy a directly stored encoding into the slot, zero padding the rest.
    pub fn write_direct(&self, src: &[u8], dst: &mut [u8], previous: Option<&[u8]>) -> Result<()> {
        self.check_slot(dst)?;
        if src.len() > dst.len() {
            return Err(RefError::CantEncode(format!(
                "encoding of {} bytes exceeds slot of {}",
                src.len(),
                dst.len()
            )));
        }
        if let Some(previous) = previous {
            self.release(previous)?;
        }
        dst[..src.len()].copy_from_slice(src);
        dst[src.len()..].fill(0);
        Ok(())
    }

    /// Delete the blob behind a slot. Returns `true` if a blob was freed.
    ///
    /// Slots without a blob (null slots and directly stored references)
    /// cause no heap operation.
    pub fn release(&self, slot: &[u8]) -> Result<bool> {
        if !slot_has_blob(slot) {
            return Ok(false);
        }
        if slot.len() < self.min_slot_size() {
            return Err(RefError::CantDecode(format!(
                "slot of {} bytes cannot hold a blob field",
                slot.len()
            )));
        }
        let freed = self.container.blob_store().delete(&slot[BLOB_OFFSET..])?;
        if freed {
            debug!(container = %self.container.id(), "released reference blob");
        }
        Ok(freed)
    }

    /// Returns `true` for a slot that was never written or was set to null.
    pub fn is_null(&self, slot: &[u8]) -> Result<bool> {
        if slot.len() < BLOB_OFFSET {
            return Err(RefError::CantDecode(format!(
                "slot of {} bytes cannot hold a reference",
                slot.len()
            )));
        }
        if slot[0] != 0 || slot[1] != 0 {
            return Ok(false);
        }
        Ok(self.container.blob_store().is_null(&slot[BLOB_OFFSET..])?)
    }

    /// Reset the slot to null, releasing the blob of `previous` first.
    pub fn set_null(&self, dst: &mut [u8], previous: Option<&[u8]>) -> Result<()> {
        self.check_slot(dst)?;
        if let Some(previous) = previous {
            self.release(previous)?;
        }
        dst.fill(0);
        Ok(())
    }

    /// Smallest slot that fits the header, the length and a blob field.
    fn min_slot_size(&self) -> usize {
        BLOB_OFFSET + self.container.blob_store().field_width()
    }

    fn check_slot(&self, dst: &[u8]) -> Result<()> {
        let need = self.slot_size.max(self.min_slot_size());
        if dst.len() < need {
            return Err(RefError::CantEncode(format!(
                "slot of {} bytes, need {need}",
                dst.len()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for DiskOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskOps")
            .field("container", &self.container.id())
            .field("slot_size", &self.slot_size)
            .finish()
    }
}

fn read_header(r: &mut ByteReader<'_>) -> Result<(RefType, EncodeFlags)> {
    let raw = r.read_u8().map_err(RefError::decode)?;
    let ref_type = RefType::from_u8(raw)
        .ok_or_else(|| RefError::BadValue(format!("reference type {raw}")))?;
    let flags = EncodeFlags::from_bits(r.read_u8().map_err(RefError::decode)?);
    Ok((ref_type, flags))
}

/// Whether a generic slot's bytes past the header form a blob field.
fn slot_has_blob(slot: &[u8]) -> bool {
    let mut r = ByteReader::new(slot);
    match read_header(&mut r) {
        Ok((ref_type, flags)) => {
            !ref_type.is_legacy() && (flags.external || ref_type != RefType::Object2)
        }
        Err(_) => false,
    }
}

/// Legacy object slots: a raw address.
#[derive(Clone)]
pub struct ObjectCompatOps {
    container: Arc<dyn Container>,
}

impl ObjectCompatOps {
    pub fn new(container: Arc<dyn Container>) -> Self {
        Self { container }
    }

    pub fn container(&self) -> &Arc<dyn Container> {
        &self.container
    }

    /// Memory size of a decoded legacy object reference.
    pub fn get_size(&self) -> usize {
        LEGACY_OBJECT_MEM_SIZE
    }

    /// Decode the address in `src`, returning it and the bytes consumed.
    pub fn read(&self, src: &[u8]) -> Result<(Address, usize)> {
        let aw = self.container.address_width();
        let address = compat::decode_object_address(src, aw)?;
        Ok((address, aw.bytes()))
    }

    pub fn write(&self, _src: &[u8], _dst: &mut [u8]) -> Result<()> {
        Err(RefError::Unsupported(
            "legacy object references cannot be written".into(),
        ))
    }
}

impl std::fmt::Debug for ObjectCompatOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCompatOps")
            .field("container", &self.container.id())
            .finish()
    }
}

/// Legacy region slots: a heap id pointing at `[address][selection]`.
#[derive(Clone)]
pub struct RegionCompatOps {
    container: Arc<dyn Container>,
}

impl RegionCompatOps {
    pub fn new(container: Arc<dyn Container>) -> Self {
        Self { container }
    }

    pub fn container(&self) -> &Arc<dyn Container> {
        &self.container
    }

    /// Memory size of a decoded legacy region reference.
    pub fn get_size(&self) -> usize {
        LEGACY_REGION_MEM_SIZE
    }

    pub fn read(&self, src: &[u8]) -> Result<LegacyRegion> {
        compat::decode_region(self.container.as_ref(), src)
    }

    pub fn write(&self, _src: &[u8], _dst: &mut [u8]) -> Result<()> {
        Err(RefError::Unsupported(
            "legacy region references cannot be written".into(),
        ))
    }
}

impl std::fmt::Debug for RegionCompatOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionCompatOps")
            .field("container", &self.container.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, EncodeContext};
    use crate::compat::fixtures;
    use crate::config::ContainerConfig;
    use crate::container::InMemoryContainer;
    use crate::location::{disk_slot_size, RefKind};
    use crate::reference::Reference;
    use hcf_types::{AddressWidth, Selection, SelectionEncoding};

    fn setup() -> (Arc<InMemoryContainer>, DiskOps) {
        let c = Arc::new(InMemoryContainer::new(ContainerConfig::named("d.hcf")).unwrap());
        let slot = disk_slot_size(RefKind::Opaque, c.as_ref()).unwrap();
        let dyn_c: Arc<dyn Container> = c.clone();
        (c, DiskOps::new(dyn_c, slot))
    }

    fn encoding(r: &Reference, external: bool) -> Vec<u8> {
        let ctx = EncodeContext::new("src.hcf", SelectionEncoding::V1);
        let flags = EncodeFlags { external };
        let mut buf = vec![0u8; codec::encode(&ctx, r, None, flags).unwrap()];
        codec::encode(&ctx, r, Some(&mut buf), flags).unwrap();
        buf
    }

    fn region_encoding() -> Vec<u8> {
        let sel = Selection::rectangle(vec![16, 16], &[4, 4], &[8, 2]).unwrap();
        encoding(&Reference::create_region(&[0, 0x20, 0, 0, 0, 0, 0, 0], &sel).unwrap(), false)
    }

    // -----------------------------------------------------------------------
    // Generic slots
    // -----------------------------------------------------------------------

    #[test]
    fn blob_slot_roundtrip() {
        let (c, ops) = setup();
        let enc = region_encoding();
        let mut slot = vec![0xeeu8; ops.slot_size()];
        ops.write(&enc, &mut slot, None).unwrap();
        assert_eq!(&slot[..2], &enc[..2]);
        assert_eq!(c.memory_heap().len(), 1);

        let hint = ops.get_size(&slot).unwrap();
        assert_eq!(hint, SizeHint { size: enc.len(), direct_copy: false });
        let mut out = vec![0u8; hint.size];
        assert_eq!(ops.read(&slot, &mut out).unwrap(), enc.len());
        assert_eq!(out, enc);
    }

    #[test]
    fn external_object_uses_blob() {
        let (c, ops) = setup();
        let enc = encoding(&Reference::create_object(&[1; 8]).unwrap(), true);
        let mut slot = vec![0u8; ops.slot_size()];
        ops.write(&enc, &mut slot, None).unwrap();
        assert_eq!(c.memory_heap().len(), 1);
        assert!(!ops.get_size(&slot).unwrap().direct_copy);
    }

    #[test]
    fn local_object_is_stored_directly() {
        let (c, ops) = setup();
        let enc = encoding(&Reference::create_object(&[1; 8]).unwrap(), false);
        let mut slot = vec![0xeeu8; ops.slot_size()];
        ops.write_direct(&enc, &mut slot, None).unwrap();
        assert_eq!(&slot[..enc.len()], enc.as_slice());
        assert!(slot[enc.len()..].iter().all(|b| *b == 0));
        assert!(c.memory_heap().is_empty());

        let hint = ops.get_size(&slot).unwrap();
        assert_eq!(hint, SizeHint { size: slot.len(), direct_copy: true });
    }

    #[test]
    fn read_with_wrong_size_fails() {
        let (_c, ops) = setup();
        let enc = region_encoding();
        let mut slot = vec![0u8; ops.slot_size()];
        ops.write(&enc, &mut slot, None).unwrap();
        let mut out = vec![0u8; enc.len() + 3];
        assert!(matches!(
            ops.read(&slot, &mut out),
            Err(RefError::CantDecode(_))
        ));
    }

    #[test]
    fn invalid_type_is_bad_value() {
        let (_c, ops) = setup();
        let mut slot = vec![0u8; ops.slot_size()];
        slot[0] = 7;
        assert!(matches!(ops.get_size(&slot), Err(RefError::BadValue(_))));
    }

    #[test]
    fn short_slot_is_rejected() {
        let (c, ops) = setup();
        let mut slot = vec![0u8; ops.slot_size() - 1];
        assert!(matches!(
            ops.write(&region_encoding(), &mut slot, None),
            Err(RefError::CantEncode(_))
        ));
        assert!(c.memory_heap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Overwrite and release
    // -----------------------------------------------------------------------

    #[test]
    fn overwrite_deletes_old_blob_once() {
        let (c, ops) = setup();
        let mut slot = vec![0u8; ops.slot_size()];
        ops.write(&region_encoding(), &mut slot, None).unwrap();
        let before = c.memory_heap().stats();

        let old = slot.clone();
        ops.write(&region_encoding(), &mut slot, Some(&old)).unwrap();
        let after = c.memory_heap().stats();
        assert_eq!(after.removes - before.removes, 1);
        assert_eq!(after.inserts - before.inserts, 1);
        assert_eq!(c.memory_heap().len(), 1);
    }

    #[test]
    fn null_slot_release_is_free() {
        let (c, ops) = setup();
        let slot = vec![0u8; ops.slot_size()];
        assert!(ops.is_null(&slot).unwrap());
        assert!(!ops.release(&slot).unwrap());
        assert_eq!(c.memory_heap().stats(), Default::default());
    }

    #[test]
    fn direct_slot_release_is_free() {
        let (c, ops) = setup();
        let enc = encoding(&Reference::create_object(&[0xff; 8]).unwrap(), false);
        let mut slot = vec![0u8; ops.slot_size()];
        ops.write_direct(&enc, &mut slot, None).unwrap();
        assert!(!ops.is_null(&slot).unwrap());
        assert!(!ops.release(&slot).unwrap());
        assert_eq!(c.memory_heap().stats().removes, 0);
    }

    #[test]
    fn set_null_releases_previous() {
        let (c, ops) = setup();
        let mut slot = vec![0u8; ops.slot_size()];
        ops.write(&region_encoding(), &mut slot, None).unwrap();
        let old = slot.clone();
        ops.set_null(&mut slot, Some(&old)).unwrap();
        assert!(ops.is_null(&slot).unwrap());
        assert!(c.memory_heap().is_empty());
    }

    #[test]
    fn double_release_is_cant_remove() {
        let (_c, ops) = setup();
        let mut slot = vec![0u8; ops.slot_size()];
        ops.write(&region_encoding(), &mut slot, None).unwrap();
        assert!(ops.release(&slot).unwrap());
        assert!(matches!(ops.release(&slot), Err(RefError::CantRemove(_))));
    }

    #[test]
    fn release_of_short_slot_is_cant_decode() {
        let (c, ops) = setup();
        assert!(matches!(ops.release(&[3, 0]), Err(RefError::CantDecode(_))));

        let mut slot = vec![0u8; ops.slot_size()];
        assert!(matches!(
            ops.set_null(&mut slot, Some(&[3, 0, 1, 0, 0, 0])),
            Err(RefError::CantDecode(_))
        ));
        assert_eq!(c.memory_heap().stats(), Default::default());
    }

    #[test]
    fn undersized_slot_size_is_clamped() {
        let (c, _) = setup();
        let ops = DiskOps::new(c.clone(), 0);
        let mut dst = [0u8; 5];
        assert!(matches!(
            ops.write(&region_encoding(), &mut dst, None),
            Err(RefError::CantEncode(_))
        ));
        assert!(matches!(
            ops.write_direct(&[2, 0], &mut dst, None),
            Err(RefError::CantEncode(_))
        ));
        assert!(c.memory_heap().is_empty());
    }

    #[test]
    fn payload_length_must_match_blob_field() {
        let (c, ops) = setup();
        let mut slot = vec![0u8; ops.slot_size()];
        ops.write(&region_encoding(), &mut slot, None).unwrap();
        slot[2..6].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(ops.get_size(&slot), Err(RefError::CantDecode(_))));
        assert_eq!(c.memory_heap().stats().reads, 0);
    }

    // -----------------------------------------------------------------------
    // Legacy slots
    // -----------------------------------------------------------------------

    #[test]
    fn legacy_object_read() {
        let (c, _) = setup();
        let ops = ObjectCompatOps::new(c);
        let slot = fixtures::object_slot(Address::new(0x1000), AddressWidth::W8);
        assert_eq!(ops.read(&slot).unwrap(), (Address::new(0x1000), 8));
        assert_eq!(ops.get_size(), 8);
        let mut dst = [0u8; 8];
        assert!(matches!(
            ops.write(&slot, &mut dst),
            Err(RefError::Unsupported(_))
        ));
    }

    #[test]
    fn legacy_region_read() {
        let (c, _) = setup();
        let sel = Selection::all(vec![3, 3]).unwrap();
        let slot = fixtures::region_slot(c.as_ref(), Address::new(0x2000), &sel);
        let ops = RegionCompatOps::new(c);
        let region = ops.read(&slot).unwrap();
        assert_eq!(region.address, Address::new(0x2000));
        assert_eq!(region.selection, sel);
        assert_eq!(ops.get_size(), 12);
        let mut dst = [0u8; 12];
        assert!(matches!(
            ops.write(&slot, &mut dst),
            Err(RefError::Unsupported(_))
        ));
    }
}
