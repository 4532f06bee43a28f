//! Record conversion between the memory and disk forms of a reference.
//!
//! Each direction asks the source side for a size hint, reads the value
//! into a scratch buffer (or copies it verbatim when the hint allows), and
//! hands it to the destination side's write.

use crate::disk::DiskOps;
use crate::error::{RefError, Result};
use crate::location::{RefDatatype, RefOps};
use crate::memory::{MemoryOps, RefSource};
use crate::reference::Reference;

fn memory_ops(dt: &RefDatatype) -> Result<MemoryOps> {
    match dt.ops() {
        Some(RefOps::Memory(ops)) => Ok(ops),
        _ => Err(RefError::Unsupported(format!(
            "{:?} reference datatype in {} location is not a memory form",
            dt.kind(),
            dt.mode()
        ))),
    }
}

fn disk_ops(dt: &RefDatatype) -> Result<DiskOps> {
    match dt.ops() {
        Some(RefOps::Disk(ops)) => Ok(ops),
        Some(RefOps::ObjectCompat(_)) | Some(RefOps::RegionCompat(_)) => Err(
            RefError::Unsupported("legacy references cannot be written".into()),
        ),
        _ => Err(RefError::Unsupported(format!(
            "{:?} reference datatype in {} location is not a disk form",
            dt.kind(),
            dt.mode()
        ))),
    }
}

/// Store `value` into the disk slot `slot`.
///
/// `previous` is the slot's old contents when an existing value is being
/// overwritten; its blob is released.
pub fn to_disk(
    mem: &RefDatatype,
    disk: &RefDatatype,
    value: &Reference,
    slot: &mut [u8],
    previous: Option<&[u8]>,
) -> Result<()> {
    let mem = memory_ops(mem)?;
    let disk = disk_ops(disk)?;
    let dst = disk.container().as_ref();

    let hint = mem.get_size(value, dst)?;
    let mut buf = vec![0u8; hint.size];
    let written = mem.read(value, dst, &mut buf)?;
    if written != hint.size {
        return Err(RefError::CantEncode(format!(
            "size hint {} does not match {written} bytes encoded",
            hint.size
        )));
    }
    if hint.direct_copy {
        disk.write_direct(&buf, slot, previous)
    } else {
        disk.write(&buf, slot, previous)
    }
}

/// Read the disk slot `slot` into its memory form.
///
/// Accepts generic and legacy slots. Returns `None` for a null generic slot.
pub fn to_memory(disk: &RefDatatype, mem: &RefDatatype, slot: &[u8]) -> Result<Option<Reference>> {
    let mem = memory_ops(mem)?;
    match disk.ops() {
        Some(RefOps::Disk(ops)) => {
            if ops.is_null(slot)? {
                return Ok(None);
            }
            let hint = ops.get_size(slot)?;
            let reference = if hint.direct_copy {
                mem.write(ops.container(), RefSource::Encoded(&slot[..hint.size]))?
            } else {
                let mut buf = vec![0u8; hint.size];
                ops.read(slot, &mut buf)?;
                mem.write(ops.container(), RefSource::Encoded(&buf))?
            };
            Ok(Some(reference))
        }
        Some(RefOps::ObjectCompat(ops)) => {
            let (address, _) = ops.read(slot)?;
            Ok(Some(mem.write(ops.container(), RefSource::Object1(address))?))
        }
        Some(RefOps::RegionCompat(ops)) => {
            let region = ops.read(slot)?;
            Ok(Some(mem.write(ops.container(), RefSource::Region1(&region))?))
        }
        _ => Err(RefError::Unsupported(format!(
            "{:?} reference datatype in {} location is not a disk form",
            disk.kind(),
            disk.mode()
        ))),
    }
}

/// Release the blob behind a generic disk slot when its record is removed.
pub fn release_disk_slot(disk: &RefDatatype, slot: &[u8]) -> Result<bool> {
    disk_ops(disk)?.release(slot)
}
