//! A small big-endian reader over a byte slice.
//!
//! [`SliceReader`] tracks a position inside a borrowed slice and decodes the
//! fixed-width big-endian fields that PNG control chunks are made of. Every
//! read is bounds-checked and reports [`DecodeError::Truncated`] instead of
//! panicking.

use byteorder_lite::{BigEndian, ByteOrder};
use core::fmt;

use crate::DecodeError;

/// A reader that wraps a byte slice and tracks the current position.
#[derive(Clone)]
pub(crate) struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    /// Create a new SliceReader wrapping the given byte slice.
    #[inline]
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the number of bytes remaining from the current position.
    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    #[inline]
    fn ensure(&self, n: usize) -> Result<(), DecodeError> {
        match self.pos.checked_add(n) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(DecodeError::Truncated),
        }
    }

    /// Read a single byte.
    #[inline]
    pub(crate) fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.ensure(1)?;
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Read a u16 in big-endian byte order.
    #[inline]
    pub(crate) fn read_u16_be(&mut self) -> Result<u16, DecodeError> {
        self.ensure(2)?;
        let val = BigEndian::read_u16(&self.data[self.pos..]);
        self.pos += 2;
        Ok(val)
    }

    /// Read a u32 in big-endian byte order.
    #[inline]
    pub(crate) fn read_u32_be(&mut self) -> Result<u32, DecodeError> {
        self.ensure(4)?;
        let val = BigEndian::read_u32(&self.data[self.pos..]);
        self.pos += 4;
        Ok(val)
    }
}

impl fmt::Debug for SliceReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceReader")
            .field("len", &self.data.len())
            .field("pos", &self.pos)
            .finish()
    }
}
