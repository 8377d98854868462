//! Packet error control checksum used by the PUS and CCSDS TC standards.

/// CRC-16/CCITT-FALSE as specified for the packet error control field:
/// polynomial 0x1021, initial value 0xFFFF, MSB first, no final XOR. The
/// [crc] implementation uses a precomputed 256-entry lookup table which is
/// generated once and immutable afterwards.
pub const CRC_CCITT_FALSE: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_IBM_3740);

/// Calculate the CRC-16/CCITT-FALSE checksum over a buffer.
pub fn calculate(buffer: &[u8]) -> u16 {
    CRC_CCITT_FALSE.checksum(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer_yields_preset() {
        assert_eq!(calculate(&[]), 0xFFFF);
    }

    #[test]
    fn test_check_value() {
        // Standard check value for CRC-16/CCITT-FALSE.
        assert_eq!(calculate(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_deterministic() {
        let buf = [0xDE, 0xAD, 0xBE, 0xEF];
        assert_eq!(calculate(&buf), calculate(&buf));
    }

    #[test]
    fn test_appended_crc_folds_to_zero() {
        let mut buf = vec![0x18, 0x10, 0xC0, 0x50, 0x00, 0x02];
        let crc = calculate(&buf);
        buf.extend_from_slice(&crc.to_be_bytes());
        assert_eq!(calculate(&buf), 0);
    }
}
