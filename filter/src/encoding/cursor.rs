//! Borrowing byte cursor.
//!
//! The cursor is the whole decoder state: a slice and a position. There is
//! no `io::Read` underneath and nothing buffered, so an error can always say
//! exactly *where* it happened.

use super::{DecodeError, MAX_COMPACT_SIZE};

/// A read position over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor at offset zero.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Current offset from the start of the input.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// `true` once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Looks at the next `n` bytes without consuming them.
    pub fn peek(&self, n: usize) -> Option<&'a [u8]> {
        self.data.get(self.position..self.position.checked_add(n)?)
    }

    /// Fails with [`DecodeError::TruncatedInput`] unless `n` bytes remain.
    fn ensure(&self, n: usize) -> Result<(), DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::TruncatedInput {
                offset: self.position,
                needed: n,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    /// Consumes `n` bytes and returns them as a borrowed slice.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        self.ensure(n)?;
        let bytes = &self.data[self.position..self.position + n];
        self.position += n;
        Ok(bytes)
    }

    /// Consumes exactly `N` bytes into a fixed-size array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, DecodeError> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_i32_le(&mut self) -> Result<i32, DecodeError> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub fn read_u64_le(&mut self) -> Result<u64, DecodeError> {
        self.read_array().map(u64::from_le_bytes)
    }

    /// Reads a compact-size integer, returning `(value, bytes_consumed)`.
    ///
    /// | prefix        | width | value                  |
    /// |---------------|-------|------------------------|
    /// | `0x00..=0xFC` | 1     | the prefix itself      |
    /// | `0xFD`        | 3     | next 2 bytes, LE       |
    /// | `0xFE`        | 5     | next 4 bytes, LE       |
    /// | `0xFF`        | 9     | next 8 bytes, LE       |
    ///
    /// The whole width is checked up front, so a truncated integer leaves
    /// the cursor untouched and reports the offset of its prefix byte.
    /// No canonical-form check happens here; see
    /// [`Cursor::read_compact_size_canonical`].
    pub fn read_compact_size(&mut self) -> Result<(u64, usize), DecodeError> {
        self.ensure(1)?;
        let width = match self.data[self.position] {
            0x00..=0xfc => 1,
            0xfd => 3,
            0xfe => 5,
            0xff => 9,
        };
        self.ensure(width)?;

        let prefix = self.read_u8()?;
        let value = match width {
            1 => u64::from(prefix),
            3 => u64::from(self.read_u16_le()?),
            5 => u64::from(self.read_u32_le()?),
            _ => self.read_u64_le()?,
        };
        Ok((value, width))
    }

    /// Reads a compact size the way a relaying node does: minimally encoded
    /// and no larger than [`MAX_COMPACT_SIZE`].
    pub fn read_compact_size_canonical(&mut self) -> Result<u64, DecodeError> {
        let offset = self.position;
        let (value, width) = self.read_compact_size()?;

        let minimal = match width {
            1 => true,
            3 => value >= 0xfd,
            5 => value > 0xffff,
            _ => value > 0xffff_ffff,
        };
        if !minimal {
            return Err(DecodeError::malformed(
                offset,
                "canonical compact size",
                format!("{} encoded in {} bytes", value, width),
            ));
        }
        if value > MAX_COMPACT_SIZE {
            return Err(DecodeError::malformed(
                offset,
                format!("compact size <= {}", MAX_COMPACT_SIZE),
                value.to_string(),
            ));
        }
        Ok(value)
    }

    /// Reads a canonical length prefix followed by that many bytes.
    pub fn read_var_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_compact_size_canonical()?;
        // Bounded by MAX_COMPACT_SIZE, so the cast cannot truncate.
        self.read_bytes(len as usize)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_size_widths() {
        let cases: &[(&[u8], u64, usize)] = &[
            (&[0x00], 0, 1),
            (&[0xfc], 0xfc, 1),
            (&[0xfd, 0xfd, 0x00], 0xfd, 3),
            (&[0xfd, 0xfd, 0xaa], 0xaafd, 3),
            (&[0xfe, 0x00, 0x00, 0x01, 0x00], 0x0001_0000, 5),
            (&[0xff, 0, 0, 0, 0, 1, 0, 0, 0], 0x1_0000_0000, 9),
        ];
        for (bytes, value, width) in cases {
            let mut cursor = Cursor::new(bytes);
            assert_eq!(cursor.read_compact_size().unwrap(), (*value, *width));
            assert!(cursor.is_empty());
        }
    }

    #[test]
    fn truncated_compact_size_reports_prefix_offset() {
        let mut cursor = Cursor::new(&[0x01, 0xfe, 0x00, 0x00]);
        cursor.read_u8().unwrap();

        let err = cursor.read_compact_size().unwrap_err();
        assert_eq!(
            err,
            DecodeError::TruncatedInput {
                offset: 1,
                needed: 5,
                remaining: 3
            }
        );
        // Failed reads do not move the cursor.
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn empty_input_is_truncated() {
        let mut cursor = Cursor::new(&[]);
        assert!(matches!(
            cursor.read_compact_size(),
            Err(DecodeError::TruncatedInput { needed: 1, .. })
        ));
    }

    #[test]
    fn non_canonical_compact_size_is_malformed() {
        let mut cursor = Cursor::new(&[0xfd, 0x10, 0x00]);
        assert!(matches!(
            cursor.read_compact_size_canonical(),
            Err(DecodeError::MalformedTransaction { offset: 0, .. })
        ));

        // The lenient reader still accepts it.
        let mut cursor = Cursor::new(&[0xfd, 0x10, 0x00]);
        assert_eq!(cursor.read_compact_size().unwrap(), (0x10, 3));
    }

    #[test]
    fn oversized_compact_size_is_malformed() {
        let mut cursor = Cursor::new(&[0xfe, 0x01, 0x00, 0x00, 0x02]);
        match cursor.read_compact_size_canonical() {
            Err(DecodeError::MalformedTransaction { found, .. }) => {
                assert_eq!(found, 0x0200_0001u64.to_string());
            }
            other => panic!("expected MalformedTransaction, got {:?}", other),
        }
    }

    #[test]
    fn fixed_width_reads_are_little_endian() {
        let bytes = [
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0xff, 0xff, 0xff, 0xff,
        ];
        let mut cursor = Cursor::new(&bytes);
        assert_eq!(cursor.read_u16_le().unwrap(), 0x0201);
        assert_eq!(cursor.read_u32_le().unwrap(), 0x0605_0403);
        assert_eq!(cursor.read_u16_le().unwrap(), 0x0807);
        assert_eq!(cursor.read_i32_le().unwrap(), -1);
        assert!(cursor.read_u64_le().is_err());
    }

    #[test]
    fn read_var_bytes_borrows_exact_slice() {
        let bytes = [0x03, 0xaa, 0xbb, 0xcc, 0xdd];
        let mut cursor = Cursor::new(&bytes);
        assert_eq!(cursor.read_var_bytes().unwrap(), &[0xaa, 0xbb, 0xcc]);
        assert_eq!(cursor.remaining(), 1);
        assert_eq!(cursor.peek(1), Some(&[0xdd][..]));
        assert_eq!(cursor.peek(2), None);
    }

    #[test]
    fn read_var_bytes_rejects_short_body() {
        let mut cursor = Cursor::new(&[0x05, 0xaa]);
        assert_eq!(
            cursor.read_var_bytes().unwrap_err(),
            DecodeError::TruncatedInput {
                offset: 1,
                needed: 5,
                remaining: 1
            }
        );
    }
}
