//! # CCSDS and ECSS PUS packet implementations
//!
//! This crate contains codecs for spacecraft command and telemetry packets:
//!
//!  - Space Packet implementation according to
//!    [CCSDS Blue Book 133.0-B-2](https://public.ccsds.org/Pubs/133x0b2e1.pdf)
//!  - PUS Telecommand and PUS Telemetry implementations according to the
//!    [ECSS-E-ST-70-41C standard](https://ecss.nl/standard/ecss-e-st-70-41c-space-engineering-telemetry-and-telecommand-packet-utilization-15-april-2016/),
//!    with mission-configurable optional fields
//!  - CCSDS Unsegmented Time Code (CUC) implementation according to
//!    [CCSDS 301.0-B-4](https://public.ccsds.org/Pubs/301x0b4e1.pdf)
//!  - The PUS service 1 (request verification) reporting protocol
//!
//! Optional secondary header fields (TC source ID, TM message type counter and
//! destination ID) and the CUC time format are not self-describing on the wire.
//! Their presence and widths are supplied through a [crate::policy::PusPolicy]
//! on the encode side and through explicit decode profiles on the decode side.
//!
//! The packet version number is handled with its wire value of 0 everywhere,
//! both in constructors and accessors.
//!
//! ## Example
//!
//! ```rust
//! use pus_tmtc::SpHeader;
//! let sp_header = SpHeader::tc(0x42, 12, 0).expect("Error creating SP header");
//! println!("{:?}", sp_header);
//! ```
use delegate::delegate;

use crate::crc::CRC_CCITT_FALSE;
use crate::ecss::PusError;

pub mod crc;
pub mod ecss;
pub mod policy;
pub mod seq_count;
pub mod time;
pub mod util;

pub const MAX_APID: u16 = 2u16.pow(11) - 1;
pub const MAX_SEQ_COUNT: u16 = 2u16.pow(14) - 1;
/// Total size of the largest representable space packet: 6 byte header plus
/// the data length field maximum plus one.
pub const MAX_PACKET_SIZE: usize = CCSDS_HEADER_LEN + u16::MAX as usize + 1;

pub const CCSDS_HEADER_LEN: usize = core::mem::size_of::<crate::zc::SpHeader>();
pub const PEC_FIELD_LEN: usize = 2;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ByteConversionError {
    /// The target slice is too small to hold the serialized representation.
    #[error("target slice with size {found} too small, expected at least {expected} bytes")]
    ToSliceTooSmall { found: usize, expected: usize },
    /// The source slice is too small to contain the declared structure.
    #[error("source slice with size {found} too small, expected at least {expected} bytes")]
    FromSliceTooSmall { found: usize, expected: usize },
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum PacketType {
    Tm = 0,
    Tc = 1,
}

impl TryFrom<u8> for PacketType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            x if x == PacketType::Tm as u8 => Ok(PacketType::Tm),
            x if x == PacketType::Tc as u8 => Ok(PacketType::Tc),
            _ => Err(()),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum SequenceFlags {
    ContinuationSegment = 0b00,
    FirstSegment = 0b01,
    LastSegment = 0b10,
    Unsegmented = 0b11,
}

impl TryFrom<u8> for SequenceFlags {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            x if x == SequenceFlags::ContinuationSegment as u8 => {
                Ok(SequenceFlags::ContinuationSegment)
            }
            x if x == SequenceFlags::FirstSegment as u8 => Ok(SequenceFlags::FirstSegment),
            x if x == SequenceFlags::LastSegment as u8 => Ok(SequenceFlags::LastSegment),
            x if x == SequenceFlags::Unsegmented as u8 => Ok(SequenceFlags::Unsegmented),
            _ => Err(()),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct PacketId {
    pub ptype: PacketType,
    pub sec_header_flag: bool,
    apid: u16,
}

impl PacketId {
    pub fn new(ptype: PacketType, sec_header_flag: bool, apid: u16) -> Option<PacketId> {
        let mut pid = PacketId {
            ptype,
            sec_header_flag,
            apid: 0,
        };
        pid.set_apid(apid).then_some(pid)
    }

    /// Set a new Application Process ID (APID). If the passed number exceeds the
    /// 11-bit maximum of 2047, the APID will not be set and false will be returned.
    pub fn set_apid(&mut self, apid: u16) -> bool {
        if apid > MAX_APID {
            return false;
        }
        self.apid = apid;
        true
    }

    pub fn apid(&self) -> u16 {
        self.apid
    }

    pub fn raw(&self) -> u16 {
        ((self.ptype as u16) << 12) | ((self.sec_header_flag as u16) << 11) | self.apid
    }
}

impl From<u16> for PacketId {
    fn from(raw_id: u16) -> Self {
        PacketId {
            ptype: PacketType::try_from(((raw_id >> 12) & 0b1) as u8).unwrap(),
            sec_header_flag: ((raw_id >> 11) & 0b1) != 0,
            apid: raw_id & 0x7FF,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct PacketSequenceCtrl {
    pub seq_flags: SequenceFlags,
    seq_count: u16,
}

impl PacketSequenceCtrl {
    /// Returns [None] if the passed sequence count exceeds [MAX_SEQ_COUNT].
    pub fn new(seq_flags: SequenceFlags, seq_count: u16) -> Option<PacketSequenceCtrl> {
        let mut psc = PacketSequenceCtrl {
            seq_flags,
            seq_count: 0,
        };
        psc.set_seq_count(seq_count).then_some(psc)
    }

    pub fn raw(&self) -> u16 {
        ((self.seq_flags as u16) << 14) | self.seq_count
    }

    /// Set a new sequence count. If the passed number exceeds the 14-bit maximum
    /// of 16383, the sequence count will not be set and false will be returned.
    pub fn set_seq_count(&mut self, ssc: u16) -> bool {
        if ssc > MAX_SEQ_COUNT {
            return false;
        }
        self.seq_count = ssc;
        true
    }

    pub fn seq_count(&self) -> u16 {
        self.seq_count
    }
}

impl From<u16> for PacketSequenceCtrl {
    fn from(raw: u16) -> Self {
        PacketSequenceCtrl {
            seq_flags: SequenceFlags::try_from(((raw >> 14) & 0b11) as u8).unwrap(),
            seq_count: raw & SSC_MASK,
        }
    }
}

const SSC_MASK: u16 = 0x3FFF;
const VERSION_MASK: u16 = 0xE000;

/// Generic trait to access fields of a CCSDS space packet header according to
/// CCSDS 133.0-B-2.
pub trait CcsdsPacket {
    fn ccsds_version(&self) -> u8;
    fn packet_id(&self) -> PacketId;
    fn psc(&self) -> PacketSequenceCtrl;

    /// Retrieve data length field
    fn data_len(&self) -> u16;

    /// Retrieve the total packet size based on the data length field
    #[inline]
    fn total_len(&self) -> usize {
        usize::from(self.data_len()) + CCSDS_HEADER_LEN + 1
    }

    /// Retrieve the 13 bit Packet Identification field
    #[inline]
    fn packet_id_raw(&self) -> u16 {
        self.packet_id().raw()
    }

    /// Retrieve Packet Sequence Control
    #[inline]
    fn psc_raw(&self) -> u16 {
        self.psc().raw()
    }

    /// Retrieve Packet Type (TM: 0, TC: 1)
    #[inline]
    fn ptype(&self) -> PacketType {
        self.packet_id().ptype
    }

    #[inline]
    fn is_tm(&self) -> bool {
        self.ptype() == PacketType::Tm
    }

    #[inline]
    fn is_tc(&self) -> bool {
        self.ptype() == PacketType::Tc
    }

    /// Retrieve the secondary header flag. Returns true if a secondary header is
    /// present and false if it is not.
    #[inline]
    fn sec_header_flag(&self) -> bool {
        self.packet_id().sec_header_flag
    }

    /// Retrieve Application Process ID
    #[inline]
    fn apid(&self) -> u16 {
        self.packet_id().apid
    }

    #[inline]
    fn seq_count(&self) -> u16 {
        self.psc().seq_count
    }

    #[inline]
    fn sequence_flags(&self) -> SequenceFlags {
        self.psc().seq_flags
    }
}

/// Space Packet Primary Header according to CCSDS 133.0-B-2.
///
/// # Arguments
///
/// * `version` - CCSDS version field, occupies the first 3 bits of the raw header.
///    Fixed to 0 on the wire.
/// * `packet_id` - Packet Identifier, which can also be used as a start marker.
///    Occupies the last 13 bits of the first two bytes of the raw header
/// * `psc` - Packet Sequence Control, occupies the third and fourth byte of the
///    raw header
/// * `data_len` - Data length field, occupies the fifth and sixth byte of the
///    raw header. Equal to the full packet length minus the header length minus 1
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct SpHeader {
    pub version: u8,
    pub packet_id: PacketId,
    pub psc: PacketSequenceCtrl,
    pub data_len: u16,
}

impl Default for SpHeader {
    fn default() -> Self {
        SpHeader {
            version: 0,
            packet_id: PacketId {
                ptype: PacketType::Tm,
                apid: 0,
                sec_header_flag: false,
            },
            psc: PacketSequenceCtrl {
                seq_flags: SequenceFlags::Unsegmented,
                seq_count: 0,
            },
            data_len: 0,
        }
    }
}

impl SpHeader {
    /// Create a new Space Packet Header instance. This will return [None] if the
    /// APID or sequence count argument exceed [MAX_APID] or [MAX_SEQ_COUNT]
    /// respectively. The sequence flags default to unsegmented.
    pub fn new(
        ptype: PacketType,
        sec_header: bool,
        apid: u16,
        seq_count: u16,
        data_len: u16,
    ) -> Option<Self> {
        if seq_count > MAX_SEQ_COUNT || apid > MAX_APID {
            return None;
        }
        let mut header = SpHeader::default();
        header.packet_id.sec_header_flag = sec_header;
        header.packet_id.apid = apid;
        header.packet_id.ptype = ptype;
        header.psc.seq_count = seq_count;
        header.data_len = data_len;
        Some(header)
    }

    /// Helper function for telemetry space packet headers. The packet type field
    /// will be set accordingly.
    pub fn tm(apid: u16, seq_count: u16, data_len: u16) -> Option<Self> {
        Self::new(PacketType::Tm, false, apid, seq_count, data_len)
    }

    /// Helper function for telecommand space packet headers. The packet type field
    /// will be set accordingly.
    pub fn tc(apid: u16, seq_count: u16, data_len: u16) -> Option<Self> {
        Self::new(PacketType::Tc, false, apid, seq_count, data_len)
    }

    delegate!(to self.packet_id {
        pub fn set_apid(&mut self, apid: u16) -> bool;
    });

    delegate!(to self.psc {
        pub fn set_seq_count(&mut self, seq_count: u16) -> bool;
    });

    pub fn set_seq_flags(&mut self, seq_flags: SequenceFlags) {
        self.psc.seq_flags = seq_flags;
    }

    pub fn set_sec_header_flag(&mut self) {
        self.packet_id.sec_header_flag = true;
    }

    pub fn clear_sec_header_flag(&mut self) {
        self.packet_id.sec_header_flag = false;
    }

    pub fn set_packet_type(&mut self, packet_type: PacketType) {
        self.packet_id.ptype = packet_type;
    }

    pub fn from_raw_slice(buf: &[u8]) -> Result<Self, ByteConversionError> {
        if buf.len() < CCSDS_HEADER_LEN {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: buf.len(),
                expected: CCSDS_HEADER_LEN,
            });
        }
        // Unwrap okay, the size was checked above.
        let zc_header = zc::SpHeader::from_bytes(&buf[0..CCSDS_HEADER_LEN]).unwrap();
        Ok(Self::from(zc_header))
    }

    pub fn write_to_be_bytes(&self, buf: &mut [u8]) -> Result<usize, ByteConversionError> {
        if buf.len() < CCSDS_HEADER_LEN {
            return Err(ByteConversionError::ToSliceTooSmall {
                found: buf.len(),
                expected: CCSDS_HEADER_LEN,
            });
        }
        let zc_header = zc::SpHeader::from(*self);
        // Unwrap okay, the size was checked above.
        zc_header.to_bytes(&mut buf[0..CCSDS_HEADER_LEN]).unwrap();
        Ok(CCSDS_HEADER_LEN)
    }
}

impl CcsdsPacket for SpHeader {
    #[inline]
    fn ccsds_version(&self) -> u8 {
        self.version
    }

    #[inline]
    fn packet_id(&self) -> PacketId {
        self.packet_id
    }

    #[inline]
    fn psc(&self) -> PacketSequenceCtrl {
        self.psc
    }

    #[inline]
    fn data_len(&self) -> u16 {
        self.data_len
    }
}

impl From<zc::SpHeader> for SpHeader {
    fn from(other: zc::SpHeader) -> Self {
        SpHeader {
            version: other.ccsds_version(),
            packet_id: other.packet_id(),
            psc: other.psc(),
            data_len: other.data_len(),
        }
    }
}

pub mod zc {
    use crate::{CcsdsPacket, PacketId, PacketSequenceCtrl, VERSION_MASK};
    use zerocopy::byteorder::NetworkEndian;
    use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned, U16};

    #[derive(FromBytes, FromZeroes, AsBytes, Unaligned, Debug)]
    #[repr(C)]
    pub struct SpHeader {
        version_packet_id: U16<NetworkEndian>,
        psc: U16<NetworkEndian>,
        data_len: U16<NetworkEndian>,
    }

    impl SpHeader {
        pub fn new(packet_id: PacketId, psc: PacketSequenceCtrl, data_len: u16) -> Self {
            SpHeader {
                version_packet_id: U16::from(packet_id.raw()),
                psc: U16::from(psc.raw()),
                data_len: U16::from(data_len),
            }
        }

        pub fn from_bytes(slice: &[u8]) -> Option<Self> {
            SpHeader::read_from(slice)
        }

        pub fn to_bytes(&self, slice: &mut [u8]) -> Option<()> {
            self.write_to(slice)
        }
    }

    impl CcsdsPacket for SpHeader {
        #[inline]
        fn ccsds_version(&self) -> u8 {
            ((self.version_packet_id.get() >> 13) as u8) & 0b111
        }

        fn packet_id(&self) -> PacketId {
            PacketId::from(self.packet_id_raw())
        }

        fn psc(&self) -> PacketSequenceCtrl {
            PacketSequenceCtrl::from(self.psc_raw())
        }

        #[inline]
        fn data_len(&self) -> u16 {
            self.data_len.get()
        }

        fn packet_id_raw(&self) -> u16 {
            self.version_packet_id.get() & (!VERSION_MASK)
        }

        fn psc_raw(&self) -> u16 {
            self.psc.get()
        }
    }

    impl From<crate::SpHeader> for SpHeader {
        fn from(header: crate::SpHeader) -> Self {
            let mut version_packet_id = header.packet_id.raw();
            version_packet_id |= (header.version as u16) << 13;
            SpHeader {
                version_packet_id: U16::from(version_packet_id),
                psc: U16::from(header.psc.raw()),
                data_len: U16::from(header.data_len),
            }
        }
    }
}

/// Generic CCSDS space packet: primary header, opaque payload bytes and an
/// optional trailing 2-byte packet error control (PEC) field.
///
/// The data length field of the header is always computed from the payload
/// length and the PEC presence, it is never supplied by the user. Whether a
/// PEC trailer is present is not self-describing on the wire, so decoding
/// requires the `has_pec` flag to be passed by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpacePacket {
    header: SpHeader,
    payload: Vec<u8>,
    has_pec: bool,
}

impl SpacePacket {
    /// Create a new space packet. Fails if the APID or sequence count are out
    /// of range, if the packet would exceed [MAX_PACKET_SIZE], or if the data
    /// field would be empty. CCSDS mandates at least one data field byte, so
    /// an empty payload is only allowed when a PEC trailer fills the field.
    pub fn new(
        ptype: PacketType,
        apid: u16,
        seq_count: u16,
        payload: Vec<u8>,
        has_pec: bool,
    ) -> Result<Self, PusError> {
        let header = SpHeader::new(ptype, false, apid, seq_count, 0).ok_or(
            PusError::ValueOutOfRange {
                field: "apid or sequence count",
                value: apid.max(seq_count) as u64,
                max: MAX_SEQ_COUNT as u64,
            },
        )?;
        if payload.is_empty() && !has_pec {
            return Err(PusError::EmptyDataField);
        }
        let mut packet = SpacePacket {
            header,
            payload,
            has_pec,
        };
        if packet.len_packed() > MAX_PACKET_SIZE {
            return Err(PusError::PacketTooLarge(packet.len_packed()));
        }
        packet.update_data_len();
        Ok(packet)
    }

    fn update_data_len(&mut self) {
        // The data field is never empty, checked at construction.
        let data_len = self.payload.len() + if self.has_pec { PEC_FIELD_LEN } else { 0 } - 1;
        self.header.data_len = data_len as u16;
    }

    #[inline]
    pub fn header(&self) -> &SpHeader {
        &self.header
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn has_pec(&self) -> bool {
        self.has_pec
    }

    /// Full serialized length: 6 byte header, payload and the PEC if present.
    pub fn len_packed(&self) -> usize {
        CCSDS_HEADER_LEN + self.payload.len() + if self.has_pec { PEC_FIELD_LEN } else { 0 }
    }

    pub fn write_to_bytes(&self, buf: &mut [u8]) -> Result<usize, ByteConversionError> {
        let total_len = self.len_packed();
        if buf.len() < total_len {
            return Err(ByteConversionError::ToSliceTooSmall {
                found: buf.len(),
                expected: total_len,
            });
        }
        let mut curr_idx = self.header.write_to_be_bytes(buf)?;
        buf[curr_idx..curr_idx + self.payload.len()].copy_from_slice(&self.payload);
        curr_idx += self.payload.len();
        if self.has_pec {
            let crc = CRC_CCITT_FALSE.checksum(&buf[0..curr_idx]);
            buf[curr_idx..curr_idx + PEC_FIELD_LEN].copy_from_slice(&crc.to_be_bytes());
            curr_idx += PEC_FIELD_LEN;
        }
        Ok(curr_idx)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut vec = vec![0; self.len_packed()];
        // Unwrap okay, the vector has the exact required length.
        self.write_to_bytes(&mut vec).unwrap();
        vec
    }

    /// Deserialize a space packet from its binary format.
    ///
    /// `has_pec` must match the encode-time configuration, the wire format does
    /// not describe whether a PEC trailer is present. If `validate_pec` is set
    /// and a PEC is present, the checksum over the whole packet is verified.
    pub fn from_bytes(buf: &[u8], has_pec: bool, validate_pec: bool) -> Result<Self, PusError> {
        let (header, packet_size) = parse_packet_prelude(buf, has_pec, validate_pec)?;
        let payload_len = packet_size - CCSDS_HEADER_LEN - if has_pec { PEC_FIELD_LEN } else { 0 };
        Ok(SpacePacket {
            header,
            payload: buf[CCSDS_HEADER_LEN..CCSDS_HEADER_LEN + payload_len].to_vec(),
            has_pec,
        })
    }
}

impl CcsdsPacket for SpacePacket {
    delegate!(to self.header {
        fn ccsds_version(&self) -> u8;
        fn packet_id(&self) -> PacketId;
        fn psc(&self) -> PacketSequenceCtrl;
        fn data_len(&self) -> u16;
    });
}

/// Common decode entry for all packet types: parses the primary header, checks
/// the declared length against the available bytes and the CCSDS maximum and
/// optionally verifies the PEC over the full packet.
///
/// Returns the parsed header and the total packet size in bytes.
pub(crate) fn parse_packet_prelude(
    buf: &[u8],
    has_pec: bool,
    validate_pec: bool,
) -> Result<(SpHeader, usize), PusError> {
    let header = SpHeader::from_raw_slice(buf)?;
    let packet_size = header.total_len();
    if packet_size > buf.len() {
        return Err(ByteConversionError::FromSliceTooSmall {
            found: buf.len(),
            expected: packet_size,
        }
        .into());
    }
    if packet_size > MAX_PACKET_SIZE {
        return Err(PusError::PacketTooLarge(packet_size));
    }
    if has_pec {
        if packet_size < CCSDS_HEADER_LEN + PEC_FIELD_LEN {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: packet_size,
                expected: CCSDS_HEADER_LEN + PEC_FIELD_LEN,
            }
            .into());
        }
        if validate_pec && CRC_CCITT_FALSE.checksum(&buf[0..packet_size]) != 0 {
            let crc = u16::from_be_bytes(buf[packet_size - 2..packet_size].try_into().unwrap());
            return Err(PusError::ChecksumFailure(crc));
        }
    }
    Ok((header, packet_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_flag_helpers() {
        assert_eq!(
            SequenceFlags::try_from(0b00).expect("SEQ flag creation failed"),
            SequenceFlags::ContinuationSegment
        );
        assert_eq!(
            SequenceFlags::try_from(0b01).expect("SEQ flag creation failed"),
            SequenceFlags::FirstSegment
        );
        assert_eq!(
            SequenceFlags::try_from(0b10).expect("SEQ flag creation failed"),
            SequenceFlags::LastSegment
        );
        assert_eq!(
            SequenceFlags::try_from(0b11).expect("SEQ flag creation failed"),
            SequenceFlags::Unsegmented
        );
        assert!(SequenceFlags::try_from(0b100).is_err());
    }

    #[test]
    fn test_packet_type_helper() {
        assert_eq!(PacketType::try_from(0b00).unwrap(), PacketType::Tm);
        assert_eq!(PacketType::try_from(0b01).unwrap(), PacketType::Tc);
        assert!(PacketType::try_from(0b10).is_err());
    }

    #[test]
    fn test_packet_id() {
        let packet_id =
            PacketId::new(PacketType::Tm, false, 0x42).expect("Packet ID creation failed");
        assert_eq!(packet_id.raw(), 0x0042);
        let packet_id_from_raw = PacketId::from(packet_id.raw());
        assert_eq!(packet_id_from_raw, packet_id);
    }

    #[test]
    fn test_invalid_packet_id() {
        let packet_id_invalid = PacketId::new(PacketType::Tc, true, 0xFFFF);
        assert!(packet_id_invalid.is_none());
    }

    #[test]
    fn test_invalid_apid_setter() {
        let mut packet_id =
            PacketId::new(PacketType::Tm, false, 0x42).expect("Packet ID creation failed");
        assert!(!packet_id.set_apid(0xffff));
    }

    #[test]
    fn test_packet_seq_ctrl() {
        let mut psc = PacketSequenceCtrl::new(SequenceFlags::ContinuationSegment, 77)
            .expect("PSC creation failed");
        assert_eq!(psc.raw(), 77);
        let psc_from_raw = PacketSequenceCtrl::from(psc.raw());
        assert_eq!(psc_from_raw, psc);
        // Fails because the SSC is limited to 14 bits.
        assert!(!psc.set_seq_count(2u16.pow(15)));
        assert_eq!(psc.raw(), 77);

        let psc_invalid = PacketSequenceCtrl::new(SequenceFlags::FirstSegment, 0xFFFF);
        assert!(psc_invalid.is_none());
    }

    #[test]
    fn test_sp_header_fields() {
        let sp_header = SpHeader::tc(0x42, 12, 0).expect("Error creating SP header");
        assert_eq!(sp_header.ccsds_version(), 0b000);
        assert!(sp_header.is_tc());
        assert!(!sp_header.sec_header_flag());
        assert_eq!(sp_header.ptype(), PacketType::Tc);
        assert_eq!(sp_header.seq_count(), 12);
        assert_eq!(sp_header.apid(), 0x42);
        assert_eq!(sp_header.sequence_flags(), SequenceFlags::Unsegmented);
        assert_eq!(sp_header.data_len(), 0);
        assert_eq!(sp_header.packet_id_raw(), 0x1042);
        assert_eq!(sp_header.psc_raw(), 0xC00C);
    }

    #[test]
    fn test_sp_header_setters() {
        let mut sp_header = SpHeader::tc(0x42, 12, 0).expect("Error creating SP header");
        assert_eq!(sp_header.apid(), 0x42);
        sp_header.set_apid(0x12);
        assert_eq!(sp_header.apid(), 0x12);

        sp_header.set_sec_header_flag();
        assert!(sp_header.sec_header_flag());
        sp_header.clear_sec_header_flag();
        assert!(!sp_header.sec_header_flag());
        sp_header.set_seq_count(0x45);
        assert_eq!(sp_header.seq_count(), 0x45);
        assert_eq!(sp_header.ptype(), PacketType::Tc);
        sp_header.set_packet_type(PacketType::Tm);
        assert_eq!(sp_header.ptype(), PacketType::Tm);
    }

    #[test]
    fn test_zc_sph() {
        let sp_header = SpHeader::tc(0x7FF, MAX_SEQ_COUNT, 0).expect("Error creating SP header");
        let sp_header_zc = zc::SpHeader::from(sp_header);
        let mut slice = [0; 6];
        sp_header_zc.to_bytes(slice.as_mut_slice()).unwrap();
        assert_eq!(slice[0], 0x17);
        assert_eq!(slice[1], 0xFF);
        assert_eq!(slice[2], 0xFF);
        assert_eq!(slice[3], 0xFF);
        assert_eq!(slice[4], 0x00);
        assert_eq!(slice[5], 0x00);

        let sp_header = zc::SpHeader::from_bytes(&slice).unwrap();
        assert_eq!(sp_header.ccsds_version(), 0b000);
        assert_eq!(sp_header.packet_id_raw(), 0x17FF);
        assert_eq!(sp_header.apid(), 0x7FF);
        assert_eq!(sp_header.ptype(), PacketType::Tc);
        assert_eq!(sp_header.data_len(), 0);
    }

    #[test]
    fn test_sp_header_decode_too_short() {
        let buf = [0x17, 0xFF, 0xFF];
        let res = SpHeader::from_raw_slice(&buf);
        assert_eq!(
            res.unwrap_err(),
            ByteConversionError::FromSliceTooSmall {
                found: 3,
                expected: 6
            }
        );
    }

    #[test]
    fn test_space_packet_length_invariant() {
        let packet =
            SpacePacket::new(PacketType::Tm, 0x20, 3, vec![1, 2, 3, 4], true).expect("creation");
        assert_eq!(packet.len_packed(), CCSDS_HEADER_LEN + 4 + 2);
        // Wire data length field covers payload and PEC minus one.
        assert_eq!(packet.data_len(), 4 + 2 - 1);
        let packet_no_pec =
            SpacePacket::new(PacketType::Tm, 0x20, 3, vec![1, 2, 3, 4], false).expect("creation");
        assert_eq!(packet_no_pec.len_packed(), CCSDS_HEADER_LEN + 4);
        assert_eq!(packet_no_pec.data_len(), 4 - 1);
    }

    #[test]
    fn test_space_packet_roundtrip_with_pec() {
        let packet =
            SpacePacket::new(PacketType::Tc, 0x101, 42, vec![0xAA, 0xBB], true).expect("creation");
        let raw = packet.to_vec();
        assert_eq!(raw.len(), packet.len_packed());
        // CRC over the full packet including its own PEC folds to zero.
        assert_eq!(CRC_CCITT_FALSE.checksum(&raw), 0);
        let decoded = SpacePacket::from_bytes(&raw, true, true).expect("decode failed");
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_space_packet_roundtrip_no_pec() {
        let packet =
            SpacePacket::new(PacketType::Tm, 0x05, 1, vec![1, 2, 3], false).expect("creation");
        let raw = packet.to_vec();
        let decoded = SpacePacket::from_bytes(&raw, false, false).expect("decode failed");
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_space_packet_oversized_payload_rejected() {
        let res = SpacePacket::new(PacketType::Tm, 0x20, 0, vec![0; 70000], false);
        assert_eq!(res.unwrap_err(), PusError::PacketTooLarge(CCSDS_HEADER_LEN + 70000));
        // The largest representable payload still works.
        let max_payload = MAX_PACKET_SIZE - CCSDS_HEADER_LEN;
        let packet = SpacePacket::new(PacketType::Tm, 0x20, 0, vec![0; max_payload], false)
            .expect("creation");
        assert_eq!(packet.data_len(), u16::MAX);
        assert_eq!(packet.header().total_len(), packet.len_packed());
        let res = SpacePacket::new(PacketType::Tm, 0x20, 0, vec![0; max_payload], true);
        assert!(matches!(res.unwrap_err(), PusError::PacketTooLarge(_)));
    }

    #[test]
    fn test_space_packet_empty_data_field_rejected() {
        let res = SpacePacket::new(PacketType::Tm, 0x20, 0, vec![], false);
        assert_eq!(res.unwrap_err(), PusError::EmptyDataField);
        // With a PEC trailer the data field is non-empty and representable.
        let packet = SpacePacket::new(PacketType::Tm, 0x20, 0, vec![], true).expect("creation");
        let raw = packet.to_vec();
        assert_eq!(raw.len(), packet.header().total_len());
        let decoded = SpacePacket::from_bytes(&raw, true, true).expect("decode failed");
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_space_packet_decode_truncated() {
        let packet =
            SpacePacket::new(PacketType::Tm, 0x05, 1, vec![1, 2, 3], true).expect("creation");
        let raw = packet.to_vec();
        let res = SpacePacket::from_bytes(&raw[0..raw.len() - 1], true, true);
        assert!(matches!(
            res.unwrap_err(),
            PusError::ByteConversion(ByteConversionError::FromSliceTooSmall { .. })
        ));
    }

    #[test]
    fn test_space_packet_decode_bad_crc() {
        let packet =
            SpacePacket::new(PacketType::Tm, 0x05, 1, vec![1, 2, 3], true).expect("creation");
        let mut raw = packet.to_vec();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let res = SpacePacket::from_bytes(&raw, true, true);
        assert!(matches!(res.unwrap_err(), PusError::ChecksumFailure(_)));
    }
}
