//! Bounds-checked big-endian read cursor over an immutable byte buffer.
//!
//! Every field read fails with `AvlError::Truncated` on underrun instead
//! of reading past the end, so a short TCP read surfaces as a decode
//! error rather than garbage fields.

use crate::types::{AvlError, Result};

pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes remaining.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Take `n` bytes, advancing the cursor.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(AvlError::Truncated {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Skip `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Everything after the cursor, without advancing.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let b = self.take(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_reads() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut cur = Cursor::new(&data);
        assert_eq!(cur.read_u8().unwrap(), 0x01);
        assert_eq!(cur.read_u16().unwrap(), 0x0203);
        assert_eq!(cur.read_u32().unwrap(), 0x04050607);
        assert_eq!(cur.remaining(), 0);
    }

    #[test]
    fn test_signed_reads() {
        let mut cur = Cursor::new(&[0xFF, 0xFF]);
        assert_eq!(cur.read_i16().unwrap(), -1);

        let raw = (-934_567_890_i32).to_be_bytes();
        let mut cur = Cursor::new(&raw);
        assert_eq!(cur.read_i32().unwrap(), -934_567_890);
    }

    #[test]
    fn test_read_u64() {
        let raw = 0x0123_4567_89AB_CDEF_u64.to_be_bytes();
        let mut cur = Cursor::new(&raw);
        assert_eq!(cur.read_u64().unwrap(), 0x0123_4567_89AB_CDEF);
    }

    #[test]
    fn test_underrun_is_error() {
        let mut cur = Cursor::new(&[0x01, 0x02]);
        let err = cur.read_u32().unwrap_err();
        match err {
            AvlError::Truncated { offset, needed } => {
                assert_eq!(offset, 0);
                assert_eq!(needed, 2);
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
        // A failed read must not advance the cursor
        assert_eq!(cur.position(), 0);
        assert_eq!(cur.read_u16().unwrap(), 0x0102);
    }

    #[test]
    fn test_skip_and_rest() {
        let data = [0xAA, 0xBB, 0xCC, 0xDD];
        let mut cur = Cursor::new(&data);
        cur.skip(2).unwrap();
        assert_eq!(cur.rest(), &[0xCC, 0xDD]);
        assert!(cur.skip(3).is_err());
    }
}
