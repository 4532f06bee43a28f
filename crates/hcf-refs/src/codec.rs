//! Byte encoding of current-form references.
//!
//! ```text
//! [1 byte: reference type][1 byte: flags]
//! external only: [u16: file name length][file name]
//! [1 byte: token size][token]
//! region:        [u32: selection length][selection]
//! attribute:     [u16: name length][attribute name]
//! ```
//!
//! All integers are little-endian. Flag bit 0 marks an external reference,
//! one that embeds the name of the file it points into.

use hcf_types::{ByteReader, ByteWriter, ObjectToken, Selection, SelectionEncoding, TypeError};

use crate::error::{RefError, Result};
use crate::reference::{RefType, RefValue, Reference};

/// Size of the `[type][flags]` header.
pub const ENCODE_HEADER_SIZE: usize = 2;

const FLAG_EXTERNAL: u8 = 0x01;

/// Flags stored in the second header byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodeFlags {
    pub external: bool,
}

impl EncodeFlags {
    pub const EXTERNAL: EncodeFlags = EncodeFlags { external: true };

    pub fn bits(self) -> u8 {
        if self.external {
            FLAG_EXTERNAL
        } else {
            0
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            external: bits & FLAG_EXTERNAL != 0,
        }
    }
}

/// What the encoder needs to know about the source and destination.
#[derive(Clone, Copy, Debug)]
pub struct EncodeContext<'a> {
    /// Name of the file the reference points into; written for external
    /// references that do not carry a name of their own.
    pub file_name: Option<&'a str>,
    /// Selection encoding of the destination container.
    pub selection_encoding: SelectionEncoding,
}

impl<'a> EncodeContext<'a> {
    pub fn new(file_name: &'a str, selection_encoding: SelectionEncoding) -> Self {
        Self {
            file_name: Some(file_name),
            selection_encoding,
        }
    }

    /// Context for references that never leave their own file.
    pub fn local(selection_encoding: SelectionEncoding) -> Self {
        Self {
            file_name: None,
            selection_encoding,
        }
    }
}

/// Encode `reference` into `out`, or only measure it when `out` is `None`.
///
/// Returns the number of bytes the encoding occupies.
pub fn encode(
    ctx: &EncodeContext<'_>,
    reference: &Reference,
    out: Option<&mut [u8]>,
    flags: EncodeFlags,
) -> Result<usize> {
    let file_name = if flags.external {
        let name = reference.file_name().or(ctx.file_name).ok_or_else(|| {
            RefError::CantEncode("external reference without a file name".into())
        })?;
        Some(name)
    } else {
        None
    };

    let mut w = match out {
        Some(buf) => ByteWriter::new(buf),
        None => ByteWriter::counting(),
    };
    write_reference(&mut w, reference, file_name, ctx.selection_encoding, flags)
        .map_err(RefError::encode)?;
    Ok(w.written())
}

fn write_reference(
    w: &mut ByteWriter<'_>,
    reference: &Reference,
    file_name: Option<&str>,
    encoding: SelectionEncoding,
    flags: EncodeFlags,
) -> std::result::Result<(), TypeError> {
    w.put_u8(reference.ref_type().as_u8())?;
    w.put_u8(flags.bits())?;
    if let Some(name) = file_name {
        put_str(w, name)?;
    }
    let token = reference.token();
    w.put_u8(token.len() as u8)?;
    w.put_slice(token.as_bytes())?;
    match reference.value() {
        RefValue::Object { .. } => {}
        RefValue::Region { selection, .. } => {
            let len = selection.encoded_size(encoding)?;
            let len = u32::try_from(len).map_err(|_| TypeError::ValueOutOfRange {
                value: len as u64,
                max: u32::MAX as u64,
            })?;
            w.put_u32(len)?;
            selection.encode(w, encoding)?;
        }
        RefValue::Attribute { name, .. } => put_str(w, name)?,
    }
    Ok(())
}

fn put_str(w: &mut ByteWriter<'_>, s: &str) -> std::result::Result<(), TypeError> {
    let len = u16::try_from(s.len()).map_err(|_| TypeError::ValueOutOfRange {
        value: s.len() as u64,
        max: u16::MAX as u64,
    })?;
    w.put_u16(len)?;
    w.put_slice(s.as_bytes())
}

fn read_str(r: &mut ByteReader<'_>) -> Result<String> {
    let len = r.read_u16().map_err(RefError::decode)? as usize;
    let bytes = r.read_bytes(len).map_err(RefError::decode)?;
    String::from_utf8(bytes.to_vec()).map_err(RefError::decode)
}

/// Decode one reference from the front of `bytes`.
///
/// Returns the reference and the number of bytes consumed. Trailing bytes
/// (slot padding) are ignored.
pub fn decode(bytes: &[u8]) -> Result<(Reference, usize)> {
    let mut r = ByteReader::new(bytes);
    let raw_type = r.read_u8().map_err(RefError::decode)?;
    let ref_type = RefType::from_u8(raw_type)
        .ok_or_else(|| RefError::CantDecode(format!("invalid reference type {raw_type}")))?;
    let flags = EncodeFlags::from_bits(r.read_u8().map_err(RefError::decode)?);

    let file_name = if flags.external {
        Some(read_str(&mut r)?)
    } else {
        None
    };

    let token_len = r.read_u8().map_err(RefError::decode)? as usize;
    let token = r
        .read_bytes(token_len)
        .and_then(ObjectToken::from_slice)
        .map_err(RefError::decode)?;

    let value = match ref_type {
        RefType::Object2 => RefValue::Object { token },
        RefType::DatasetRegion2 => {
            let len = r.read_u32().map_err(RefError::decode)? as usize;
            let raw = r.read_bytes(len).map_err(RefError::decode)?;
            let mut sr = ByteReader::new(raw);
            let selection = Selection::decode(&mut sr).map_err(RefError::decode)?;
            if sr.remaining() != 0 {
                return Err(RefError::CantDecode(format!(
                    "selection length {len} leaves {} trailing bytes",
                    sr.remaining()
                )));
            }
            RefValue::Region { token, selection }
        }
        RefType::Attribute => RefValue::Attribute {
            token,
            name: read_str(&mut r)?,
        },
        RefType::Object1 | RefType::DatasetRegion1 => {
            return Err(RefError::CantDecode(format!(
                "legacy reference type {raw_type} has no current encoding"
            )))
        }
    };

    let consumed = r.consumed();
    let reference = Reference::from_parts(value, file_name);
    if !reference.is_external() && reference.selection().is_none() {
        reference.set_cached_size(None, consumed);
    }
    Ok((reference, consumed))
}

/// Encoded size of a local reference.
pub(crate) fn local_size(reference: &Reference, encoding: SelectionEncoding) -> Result<usize> {
    encode(
        &EncodeContext::local(encoding),
        reference,
        None,
        EncodeFlags::default(),
    )
}

/// Smallest encoding any reference can have in a container whose tokens
/// are `token_width` bytes: a local object reference.
pub fn min_encode_size(token_width: usize) -> Result<usize> {
    let probe = Reference::create_object(&vec![0u8; token_width])?;
    local_size(&probe, SelectionEncoding::V1)
}
