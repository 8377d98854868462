//! Common definitions and helpers useful for both PUS telecommands and
//! PUS telemetry, according to the ECSS-E-ST-70-41C standard.
use core::ops::{BitAnd, BitOr, BitOrAssign};

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::time::CucError;
use crate::util::UnsignedByteFieldError;
use crate::ByteConversionError;

pub mod tc;
pub mod tm;
pub mod verification;

/// Standard revision of the packet utilization standard. Encoded in the
/// upper nibble of the first secondary header byte.
#[derive(Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PusVersion {
    EsaPus = 0,
    PusA = 1,
    PusC = 2,
}

/// Standard PUS service IDs.
#[derive(Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PusServiceId {
    /// Service 1
    Verification = 1,
    /// Service 2
    DeviceAccess = 2,
    /// Service 3
    Housekeeping = 3,
    /// Service 4
    ParameterStatistics = 4,
    /// Service 5
    Event = 5,
    /// Service 6
    MemoryManagement = 6,
    /// Service 8
    FunctionManagement = 8,
    /// Service 9
    TimeManagement = 9,
    /// Service 11
    Scheduling = 11,
    /// Service 12
    OnBoardMonitoring = 12,
    /// Service 13
    LargePacketTransfer = 13,
    /// Service 14
    RealTimeForwardingControl = 14,
    /// Service 15
    StorageAndRetrieval = 15,
    /// Service 17
    Test = 17,
    /// Service 18
    OpsAndProcedures = 18,
    /// Service 19
    EventAction = 19,
    /// Service 20
    ParameterManagement = 20,
    /// Service 21
    RequestSequencing = 21,
    /// Service 22
    PositionBasedScheduling = 22,
    /// Service 23
    FileManagement = 23,
}

/// Acknowledgement request flags of a PUS telecommand, encoded in the lower
/// nibble of the first secondary header byte. Each bit requests a
/// verification report for one stage of the command lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct AckFlags(u8);

impl AckFlags {
    pub const NONE: AckFlags = AckFlags(0);
    pub const ACCEPTANCE: AckFlags = AckFlags(0b0001);
    pub const START_OF_EXECUTION: AckFlags = AckFlags(0b0010);
    pub const PROGRESS: AckFlags = AckFlags(0b0100);
    pub const COMPLETION: AckFlags = AckFlags(0b1000);
    pub const ALL: AckFlags = AckFlags(0b1111);

    /// Build from a raw nibble. Bits above the lower four are discarded.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        AckFlags(bits & 0b1111)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether all flags of `other` are set in `self`.
    #[inline]
    pub const fn contains(self, other: AckFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for AckFlags {
    type Output = AckFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        AckFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for AckFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for AckFlags {
    type Output = AckFlags;

    fn bitand(self, rhs: Self) -> Self::Output {
        AckFlags(self.0 & rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PusError {
    #[error("PUS version {0} not supported")]
    VersionNotSupported(u8),
    #[error("checksum verification for crc16 {0:#06x} failed")]
    ChecksumFailure(u16),
    #[error("packet size {0} exceeds the maximum CCSDS packet size")]
    PacketTooLarge(usize),
    #[error("packet data field must contain at least one byte")]
    EmptyDataField,
    #[error("value {value} for field {field} larger than allowed {max}")]
    ValueOutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },
    #[error("pus time: {0}")]
    CucTime(#[from] CucError),
    #[error("pus byte field: {0}")]
    ByteField(#[from] UnsignedByteFieldError),
    #[error("pus packet conversion: {0}")]
    ByteConversion(#[from] ByteConversionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_flags_contains() {
        let flags = AckFlags::ACCEPTANCE | AckFlags::COMPLETION;
        assert_eq!(flags.bits(), 0b1001);
        assert!(flags.contains(AckFlags::ACCEPTANCE));
        assert!(flags.contains(AckFlags::COMPLETION));
        assert!(!flags.contains(AckFlags::START_OF_EXECUTION));
        assert!(!flags.contains(AckFlags::PROGRESS));
        assert!(flags.contains(AckFlags::NONE));
        assert!(AckFlags::ALL.contains(flags));
    }

    #[test]
    fn test_ack_flags_bit_ops() {
        let mut flags = AckFlags::NONE;
        assert!(flags.is_empty());
        flags |= AckFlags::PROGRESS;
        assert_eq!(flags, AckFlags::PROGRESS);
        assert_eq!(flags & AckFlags::PROGRESS, AckFlags::PROGRESS);
        assert_eq!(flags & AckFlags::ACCEPTANCE, AckFlags::NONE);
    }

    #[test]
    fn test_ack_flags_from_bits_masks() {
        assert_eq!(AckFlags::from_bits(0xFF), AckFlags::ALL);
        assert_eq!(AckFlags::from_bits(0b0001), AckFlags::ACCEPTANCE);
    }

    #[test]
    fn test_pus_version_conversion() {
        assert_eq!(PusVersion::try_from(2).unwrap(), PusVersion::PusC);
        assert_eq!(u8::from(PusVersion::PusA), 1);
        assert!(PusVersion::try_from(0b1111).is_err());
    }

    #[test]
    fn test_service_id_conversion() {
        assert_eq!(PusServiceId::try_from(1).unwrap(), PusServiceId::Verification);
        assert_eq!(u8::from(PusServiceId::Test), 17);
        assert!(PusServiceId::try_from(200).is_err());
    }
}
