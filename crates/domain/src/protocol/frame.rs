//! Bounds-checked little-endian reader over a notification frame.

use crate::error::DecodeError;

/// Cursor over a received frame.
///
/// Every read checks the remaining length, so a truncated frame surfaces as
/// [`DecodeError::Truncated`] instead of a panic. Unread trailing bytes are
/// never an error.
#[derive(Debug)]
pub struct FrameReader<'a> {
    frame: &'static str,
    data: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    /// Start reading `data`, naming it `frame` in errors.
    #[must_use]
    pub fn new(frame: &'static str, data: &'a [u8]) -> Self {
        Self {
            frame,
            data,
            pos: 0,
        }
    }

    /// Fail unless the whole frame holds at least `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] when the frame is shorter.
    pub fn require(&self, len: usize) -> Result<(), DecodeError> {
        if self.data.len() < len {
            return Err(DecodeError::Truncated {
                frame: self.frame,
                expected: len,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.pos + N;
        self.require(end)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(out)
    }

    /// Read one byte.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] past the end of the frame.
    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        self.take::<1>().map(|[b]| b)
    }

    /// Read one signed byte.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] past the end of the frame.
    pub fn i8(&mut self) -> Result<i8, DecodeError> {
        self.take::<1>().map(i8::from_le_bytes)
    }

    /// Read a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] past the end of the frame.
    pub fn u16(&mut self) -> Result<u16, DecodeError> {
        self.take::<2>().map(u16::from_le_bytes)
    }

    /// Read a little-endian `i16`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] past the end of the frame.
    pub fn i16(&mut self) -> Result<i16, DecodeError> {
        self.take::<2>().map(i16::from_le_bytes)
    }

    /// Read a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] past the end of the frame.
    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    /// Read a little-endian `f32`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] past the end of the frame.
    pub fn f32(&mut self) -> Result<f32, DecodeError> {
        self.take::<4>().map(f32::from_le_bytes)
    }

    /// Read a boolean byte (any non-zero value is `true`).
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] past the end of the frame.
    pub fn flag(&mut self) -> Result<bool, DecodeError> {
        self.u8().map(|b| b != 0)
    }

    /// Consume the rest of the frame.
    #[must_use]
    pub fn rest(self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }
}
