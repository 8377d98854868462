//! Variable-width unsigned byte fields.
//!
//! Mission policies fix the byte width of several otherwise optional packet
//! fields (TC source ID, TM message type counter and destination ID, the
//! verification failure code). [UnsignedByteField] carries such a value
//! together with its wire width.
use crate::ByteConversionError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnsignedByteFieldError {
    /// Value is too large for the specified width of the byte field.
    #[error("value {value} too large for byte field width {width}")]
    ValueTooLargeForWidth { width: usize, value: u64 },
    /// Only widths of 1, 2, 4 and 8 bytes are allowed.
    #[error("invalid byte field width {0}")]
    InvalidWidth(usize),
    #[error("byte field conversion: {0}")]
    ByteConversion(#[from] ByteConversionError),
}

/// An unsigned integer value with an explicit wire width of 1, 2, 4 or 8 bytes,
/// written and read as a big-endian field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UnsignedByteField {
    width: usize,
    value: u64,
}

impl UnsignedByteField {
    /// Create a checked byte field. Fails if the width is not one of 1, 2, 4 or
    /// 8 bytes or if the value does not fit the width.
    pub fn new(width: usize, value: u64) -> Result<Self, UnsignedByteFieldError> {
        verify_width(width)?;
        if width < 8 && value > 2u64.pow(8 * width as u32) - 1 {
            return Err(UnsignedByteFieldError::ValueTooLargeForWidth { width, value });
        }
        Ok(Self { width, value })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Read a byte field with the given width from the start of a buffer.
    pub fn from_be_bytes(width: usize, buf: &[u8]) -> Result<Self, UnsignedByteFieldError> {
        verify_width(width)?;
        if buf.len() < width {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: buf.len(),
                expected: width,
            }
            .into());
        }
        let mut raw = [0u8; 8];
        raw[8 - width..].copy_from_slice(&buf[0..width]);
        Ok(Self {
            width,
            value: u64::from_be_bytes(raw),
        })
    }

    /// Write the byte field to the start of a buffer. Returns the written width.
    pub fn write_to_be_bytes(&self, buf: &mut [u8]) -> Result<usize, ByteConversionError> {
        if buf.len() < self.width {
            return Err(ByteConversionError::ToSliceTooSmall {
                found: buf.len(),
                expected: self.width,
            });
        }
        buf[0..self.width].copy_from_slice(&self.value.to_be_bytes()[8 - self.width..]);
        Ok(self.width)
    }
}

fn verify_width(width: usize) -> Result<(), UnsignedByteFieldError> {
    if !matches!(width, 1 | 2 | 4 | 8) {
        return Err(UnsignedByteFieldError::InvalidWidth(width));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        let field = UnsignedByteField::new(2, 0x1f2f).unwrap();
        assert_eq!(field.width(), 2);
        assert_eq!(field.value(), 0x1f2f);
        let mut buf = [0; 2];
        assert_eq!(field.write_to_be_bytes(&mut buf).unwrap(), 2);
        assert_eq!(buf, [0x1f, 0x2f]);
    }

    #[test]
    fn test_invalid_width() {
        let res = UnsignedByteField::new(3, 0);
        assert_eq!(res.unwrap_err(), UnsignedByteFieldError::InvalidWidth(3));
    }

    #[test]
    fn test_value_too_large() {
        let res = UnsignedByteField::new(1, 256);
        assert_eq!(
            res.unwrap_err(),
            UnsignedByteFieldError::ValueTooLargeForWidth {
                width: 1,
                value: 256
            }
        );
    }

    #[test]
    fn test_full_u64() {
        let field = UnsignedByteField::new(8, u64::MAX).unwrap();
        let mut buf = [0; 8];
        field.write_to_be_bytes(&mut buf).unwrap();
        assert_eq!(buf, [0xFF; 8]);
    }

    #[test]
    fn test_from_be_bytes() {
        let buf = [0x12, 0x34, 0x56, 0x78, 0x9A];
        let field = UnsignedByteField::from_be_bytes(4, &buf).unwrap();
        assert_eq!(field.value(), 0x12345678);
        assert_eq!(field.width(), 4);
    }

    #[test]
    fn test_from_be_bytes_too_short() {
        let buf = [0x12];
        let res = UnsignedByteField::from_be_bytes(2, &buf);
        assert!(matches!(
            res.unwrap_err(),
            UnsignedByteFieldError::ByteConversion(ByteConversionError::FromSliceTooSmall { .. })
        ));
    }

    #[test]
    fn test_write_too_small_buffer() {
        let field = UnsignedByteField::new(4, 0xdeadbeef).unwrap();
        let mut buf = [0; 2];
        let res = field.write_to_be_bytes(&mut buf);
        assert_eq!(
            res.unwrap_err(),
            ByteConversionError::ToSliceTooSmall {
                found: 2,
                expected: 4
            }
        );
    }
}
