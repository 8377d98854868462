//! PUS telecommand packets.
//!
//! A PUS TC consists of the CCSDS primary header, the TC secondary header
//! (PUS version and acknowledgement flags, service type, service subtype and
//! an optional source ID), the application data and an optional packet error
//! control trailer. Source ID presence and width as well as PEC presence are
//! mission policy, not self-describing, so decoding takes a [TcDecodeProfile].
use delegate::delegate;

use crate::crc::CRC_CCITT_FALSE;
use crate::ecss::verification::RequestId;
use crate::ecss::{AckFlags, PusError, PusVersion};
use crate::util::UnsignedByteField;
use crate::{
    parse_packet_prelude, ByteConversionError, CcsdsPacket, PacketId, PacketSequenceCtrl,
    PacketType, SpHeader, CCSDS_HEADER_LEN, MAX_PACKET_SIZE, PEC_FIELD_LEN,
};

/// Fixed part of the TC secondary header: version/ack byte, service type and
/// service subtype.
pub const TC_SEC_HEADER_MIN_LEN: usize = 3;

/// Decode-side counterpart of the TC encoding policy. The profile must match
/// the encode-time configuration; a mismatched profile yields structurally
/// wrong field values without any way to detect it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct TcDecodeProfile {
    pub has_pec: bool,
    pub validate_pec: bool,
    pub source_id_width: Option<usize>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PusTcSecondaryHeader {
    pub pus_version: PusVersion,
    pub ack_flags: AckFlags,
    pub service_type: u8,
    pub service_subtype: u8,
    /// Source ID with its policy-determined width, or [None] if the mission
    /// does not use the field.
    pub source_id: Option<UnsignedByteField>,
}

impl PusTcSecondaryHeader {
    pub fn new(
        service_type: u8,
        service_subtype: u8,
        ack_flags: AckFlags,
        pus_version: PusVersion,
        source_id: Option<UnsignedByteField>,
    ) -> Self {
        Self {
            pus_version,
            ack_flags,
            service_type,
            service_subtype,
            source_id,
        }
    }

    /// Serialized length of this secondary header.
    pub fn len(&self) -> usize {
        TC_SEC_HEADER_MIN_LEN + self.source_id.map_or(0, |id| id.width())
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    fn write_to_bytes(&self, buf: &mut [u8]) -> Result<usize, ByteConversionError> {
        if buf.len() < self.len() {
            return Err(ByteConversionError::ToSliceTooSmall {
                found: buf.len(),
                expected: self.len(),
            });
        }
        buf[0] = (u8::from(self.pus_version) << 4) | self.ack_flags.bits();
        buf[1] = self.service_type;
        buf[2] = self.service_subtype;
        let mut curr_idx = TC_SEC_HEADER_MIN_LEN;
        if let Some(source_id) = &self.source_id {
            curr_idx += source_id.write_to_be_bytes(&mut buf[curr_idx..])?;
        }
        Ok(curr_idx)
    }

    fn from_bytes(buf: &[u8], source_id_width: Option<usize>) -> Result<Self, PusError> {
        let total_len = TC_SEC_HEADER_MIN_LEN + source_id_width.unwrap_or(0);
        if buf.len() < total_len {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: buf.len(),
                expected: total_len,
            }
            .into());
        }
        let raw_version = (buf[0] >> 4) & 0b1111;
        let pus_version = PusVersion::try_from(raw_version)
            .map_err(|_| PusError::VersionNotSupported(raw_version))?;
        let source_id = match source_id_width {
            Some(width) => Some(UnsignedByteField::from_be_bytes(
                width,
                &buf[TC_SEC_HEADER_MIN_LEN..],
            )?),
            None => None,
        };
        Ok(Self {
            pus_version,
            ack_flags: AckFlags::from_bits(buf[0]),
            service_type: buf[1],
            service_subtype: buf[2],
            source_id,
        })
    }
}

/// PUS telecommand packet. Immutable value object: all fields are fixed at
/// construction and the data length field of the primary header is always
/// consistent with the carried data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PusTc {
    sp_header: SpHeader,
    sec_header: PusTcSecondaryHeader,
    app_data: Vec<u8>,
    has_pec: bool,
}

impl PusTc {
    /// Create a PUS TC. The primary header is derived from the APID and
    /// sequence count with the packet type set to TC and the secondary header
    /// flag set. The data length field is computed, never supplied.
    pub fn new(
        apid: u16,
        seq_count: u16,
        sec_header: PusTcSecondaryHeader,
        app_data: Vec<u8>,
        has_pec: bool,
    ) -> Result<Self, PusError> {
        let sp_header = SpHeader::new(PacketType::Tc, true, apid, seq_count, 0).ok_or(
            PusError::ValueOutOfRange {
                field: "apid or sequence count",
                value: apid.max(seq_count) as u64,
                max: crate::MAX_SEQ_COUNT as u64,
            },
        )?;
        let mut tc = PusTc {
            sp_header,
            sec_header,
            app_data,
            has_pec,
        };
        if tc.len_packed() > MAX_PACKET_SIZE {
            return Err(PusError::PacketTooLarge(tc.len_packed()));
        }
        tc.update_data_len();
        Ok(tc)
    }

    fn update_data_len(&mut self) {
        let data_len = self.sec_header.len()
            + self.app_data.len()
            + if self.has_pec { PEC_FIELD_LEN } else { 0 }
            - 1;
        self.sp_header.data_len = data_len as u16;
    }

    #[inline]
    pub fn sec_header(&self) -> &PusTcSecondaryHeader {
        &self.sec_header
    }

    #[inline]
    pub fn service_type(&self) -> u8 {
        self.sec_header.service_type
    }

    #[inline]
    pub fn service_subtype(&self) -> u8 {
        self.sec_header.service_subtype
    }

    #[inline]
    pub fn source_id(&self) -> Option<UnsignedByteField> {
        self.sec_header.source_id
    }

    #[inline]
    pub fn app_data(&self) -> &[u8] {
        &self.app_data
    }

    #[inline]
    pub fn has_pec(&self) -> bool {
        self.has_pec
    }

    /// Whether a verification report was requested for the given stage.
    #[inline]
    pub fn ack(&self, flag: AckFlags) -> bool {
        self.sec_header.ack_flags.contains(flag)
    }

    /// Identifier correlating verification reports back to this command.
    pub fn request_id(&self) -> RequestId {
        RequestId::new(self.sp_header.packet_id_raw(), self.sp_header.psc_raw())
    }

    pub fn len_packed(&self) -> usize {
        CCSDS_HEADER_LEN
            + self.sec_header.len()
            + self.app_data.len()
            + if self.has_pec { PEC_FIELD_LEN } else { 0 }
    }

    pub fn write_to_bytes(&self, buf: &mut [u8]) -> Result<usize, ByteConversionError> {
        let total_len = self.len_packed();
        if buf.len() < total_len {
            return Err(ByteConversionError::ToSliceTooSmall {
                found: buf.len(),
                expected: total_len,
            });
        }
        let mut curr_idx = self.sp_header.write_to_be_bytes(buf)?;
        curr_idx += self.sec_header.write_to_bytes(&mut buf[curr_idx..])?;
        buf[curr_idx..curr_idx + self.app_data.len()].copy_from_slice(&self.app_data);
        curr_idx += self.app_data.len();
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

    /// Deserialize a PUS TC from its binary format using the given decode
    /// profile for the non-self-describing parts.
    pub fn from_bytes(buf: &[u8], profile: &TcDecodeProfile) -> Result<Self, PusError> {
        let (sp_header, packet_size) =
            parse_packet_prelude(buf, profile.has_pec, profile.validate_pec)?;
        let sec_header = PusTcSecondaryHeader::from_bytes(
            &buf[CCSDS_HEADER_LEN..packet_size],
            profile.source_id_width,
        )?;
        let trailer_len = if profile.has_pec { PEC_FIELD_LEN } else { 0 };
        let payload_start = CCSDS_HEADER_LEN + sec_header.len();
        if packet_size < payload_start + trailer_len {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: packet_size,
                expected: payload_start + trailer_len,
            }
            .into());
        }
        Ok(PusTc {
            sp_header,
            sec_header,
            app_data: buf[payload_start..packet_size - trailer_len].to_vec(),
            has_pec: profile.has_pec,
        })
    }
}

impl CcsdsPacket for PusTc {
    delegate!(to self.sp_header {
        fn ccsds_version(&self) -> u8;
        fn packet_id(&self) -> PacketId;
        fn psc(&self) -> PacketSequenceCtrl;
        fn data_len(&self) -> u16;
    });
}
