//! Bounds-checked little-endian cursors over byte slices.
//!
//! [`ByteReader`] and [`ByteWriter`] replace manual pointer/offset arithmetic
//! when encoding and decoding fixed layouts. Every read or write first checks
//! the remaining capacity and fails with [`TypeError::Truncated`] instead of
//! panicking; a failed call leaves the cursor where it was.
//!
//! A writer created with [`ByteWriter::counting`] has no backing buffer and
//! only tallies the bytes that would have been written, so the same encode
//! routine can compute sizes and produce bytes.

use bytes::{Buf, BufMut};

use crate::address::{Address, AddressWidth};
use crate::error::TypeError;

/// Cursor that consumes a byte slice front to back.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    consumed: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, consumed: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// The unconsumed tail.
    pub fn rest(&self) -> &'a [u8] {
        self.buf
    }

    fn ensure(&self, needed: usize) -> Result<(), TypeError> {
        if self.buf.remaining() < needed {
            return Err(TypeError::Truncated {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, TypeError> {
        self.ensure(1)?;
        self.consumed += 1;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16, TypeError> {
        self.ensure(2)?;
        self.consumed += 2;
        Ok(self.buf.get_u16_le())
    }

    pub fn read_u32(&mut self) -> Result<u32, TypeError> {
        self.ensure(4)?;
        self.consumed += 4;
        Ok(self.buf.get_u32_le())
    }

    pub fn read_u64(&mut self) -> Result<u64, TypeError> {
        self.ensure(8)?;
        self.consumed += 8;
        Ok(self.buf.get_u64_le())
    }

    /// Borrow the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], TypeError> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        self.consumed += len;
        Ok(head)
    }

    pub fn read_address(&mut self, width: AddressWidth) -> Result<Address, TypeError> {
        let bytes = self.read_bytes(width.bytes())?;
        Address::from_le_bytes(bytes, width)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), TypeError> {
        self.read_bytes(len).map(|_| ())
    }
}

enum Sink<'a> {
    Count,
    Slice(&'a mut [u8]),
}

/// Cursor that fills a mutable byte slice front to back, or only counts.
pub struct ByteWriter<'a> {
    sink: Sink<'a>,
    written: usize,
}

impl<'a> ByteWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            sink: Sink::Slice(buf),
            written: 0,
        }
    }

    /// A writer that records sizes without storing bytes.
    pub fn counting() -> ByteWriter<'static> {
        ByteWriter {
            sink: Sink::Count,
            written: 0,
        }
    }

    /// Returns `true` for a writer created with [`ByteWriter::counting`].
    pub fn is_counting(&self) -> bool {
        matches!(self.sink, Sink::Count)
    }

    /// Bytes written (or counted) so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Remaining capacity, `None` when counting.
    pub fn remaining(&self) -> Option<usize> {
        match &self.sink {
            Sink::Count => None,
            Sink::Slice(buf) => Some(buf.len()),
        }
    }

    fn reserve(&mut self, needed: usize) -> Result<Option<&mut &'a mut [u8]>, TypeError> {
        match &mut self.sink {
            Sink::Count => {
                self.written += needed;
                Ok(None)
            }
            Sink::Slice(buf) => {
                if buf.remaining_mut() < needed {
                    return Err(TypeError::Truncated {
                        needed,
                        remaining: buf.remaining_mut(),
                    });
                }
                self.written += needed;
                Ok(Some(buf))
            }
        }
    }

    pub fn put_u8(&mut self, value: u8) -> Result<(), TypeError> {
        if let Some(buf) = self.reserve(1)? {
            buf.put_u8(value);
        }
        Ok(())
    }

    pub fn put_u16(&mut self, value: u16) -> Result<(), TypeError> {
        if let Some(buf) = self.reserve(2)? {
            buf.put_u16_le(value);
        }
        Ok(())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<(), TypeError> {
        if let Some(buf) = self.reserve(4)? {
            buf.put_u32_le(value);
        }
        Ok(())
    }

    pub fn put_u64(&mut self, value: u64) -> Result<(), TypeError> {
        if let Some(buf) = self.reserve(8)? {
            buf.put_u64_le(value);
        }
        Ok(())
    }

    pub fn put_slice(&mut self, bytes: &[u8]) -> Result<(), TypeError> {
        if let Some(buf) = self.reserve(bytes.len())? {
            buf.put_slice(bytes);
        }
        Ok(())
    }

    pub fn put_address(&mut self, address: Address, width: AddressWidth) -> Result<(), TypeError> {
        let bytes = address.to_le_bytes(width)?;
        self.put_slice(&bytes)
    }

    /// Zero-fill the next `len` bytes.
    pub fn put_zeros(&mut self, len: usize) -> Result<(), TypeError> {
        if let Some(buf) = self.reserve(len)? {
            buf.put_bytes(0, len);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ByteWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteWriter")
            .field("counting", &self.is_counting())
            .field("written", &self.written)
            .field("remaining", &self.remaining())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_integers() {
        let mut buf = [0u8; 15];
        let mut w = ByteWriter::new(&mut buf);
        w.put_u8(0xab).unwrap();
        w.put_u16(0x1234).unwrap();
        w.put_u32(0xdead_beef).unwrap();
        w.put_u64(7).unwrap();
        assert_eq!(w.written(), 15);
        assert_eq!(w.remaining(), Some(0));

        let mut r = ByteReader::new(&buf);
        assert_eq!(r.read_u8().unwrap(), 0xab);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(r.read_u64().unwrap(), 7);
        assert_eq!(r.consumed(), 15);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn integers_are_little_endian() {
        let mut buf = [0u8; 4];
        ByteWriter::new(&mut buf).put_u32(1).unwrap();
        assert_eq!(buf, [1, 0, 0, 0]);
    }

    #[test]
    fn writer_overflow_is_an_error() {
        let mut buf = [0u8; 3];
        let mut w = ByteWriter::new(&mut buf);
        let err = w.put_u32(1).unwrap_err();
        assert_eq!(err, TypeError::Truncated { needed: 4, remaining: 3 });
        // Failed write does not advance.
        assert_eq!(w.written(), 0);
        w.put_u16(2).unwrap();
        assert_eq!(w.written(), 2);
    }

    #[test]
    fn reader_underflow_is_an_error() {
        let mut r = ByteReader::new(&[1, 2]);
        let err = r.read_u32().unwrap_err();
        assert_eq!(err, TypeError::Truncated { needed: 4, remaining: 2 });
        assert_eq!(r.consumed(), 0);
        assert_eq!(r.read_u16().unwrap(), 0x0201);
    }

    #[test]
    fn counting_writer_tallies_without_buffer() {
        let mut w = ByteWriter::counting();
        w.put_u8(1).unwrap();
        w.put_slice(&[0; 10]).unwrap();
        w.put_address(Address::new(5), AddressWidth::W8).unwrap();
        w.put_zeros(3).unwrap();
        assert!(w.is_counting());
        assert_eq!(w.written(), 22);
        assert_eq!(w.remaining(), None);
    }

    #[test]
    fn read_bytes_and_skip() {
        let data = [1u8, 2, 3, 4, 5];
        let mut r = ByteReader::new(&data);
        r.skip(1).unwrap();
        assert_eq!(r.read_bytes(3).unwrap(), &[2, 3, 4]);
        assert_eq!(r.rest(), &[5]);
    }

    #[test]
    fn address_roundtrip_through_cursor() {
        let width = AddressWidth::try_from(4).unwrap();
        let mut buf = [0u8; 4];
        ByteWriter::new(&mut buf)
            .put_address(Address::new(0x2000), width)
            .unwrap();
        let addr = ByteReader::new(&buf).read_address(width).unwrap();
        assert_eq!(addr, Address::new(0x2000));
    }

    #[test]
    fn put_zeros_clears_bytes() {
        let mut buf = [0xffu8; 4];
        let mut w = ByteWriter::new(&mut buf);
        w.put_u8(9).unwrap();
        w.put_zeros(3).unwrap();
        assert_eq!(buf, [9, 0, 0, 0]);
    }
}
