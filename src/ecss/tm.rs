//! PUS telemetry packets.
//!
//! A PUS TM consists of the CCSDS primary header, the TM secondary header
//! (PUS version and spacecraft time reference status, service type, service
//! subtype, optional message type counter, optional destination ID and the
//! mandatory CUC timestamp), the source data and an optional packet error
//! control trailer. The optional field widths, the PEC presence and a
//! preamble-less time format are mission policy, supplied through a
//! [TmDecodeProfile] on the decode side.
use delegate::delegate;

use crate::crc::CRC_CCITT_FALSE;
use crate::ecss::{PusError, PusVersion};
use crate::time::CucTime;
use crate::util::UnsignedByteField;
use crate::{
    parse_packet_prelude, ByteConversionError, CcsdsPacket, PacketId, PacketSequenceCtrl,
    PacketType, SpHeader, CCSDS_HEADER_LEN, MAX_PACKET_SIZE, PEC_FIELD_LEN,
};

/// Fixed part of the TM secondary header: version/status byte, service type
/// and service subtype. The timestamp length comes on top.
pub const TM_SEC_HEADER_MIN_LEN: usize = 3;

/// Decode-side counterpart of the TM encoding policy.
///
/// If `time_template` is given, the timestamp is decoded in the template's
/// format (widths, preamble presence and epoch taken from it). Without a
/// template the time field must carry a self-describing preamble.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct TmDecodeProfile {
    pub has_pec: bool,
    pub validate_pec: bool,
    pub msg_type_counter_width: Option<usize>,
    pub destination_id_width: Option<usize>,
    pub time_template: Option<CucTime>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PusTmSecondaryHeader {
    pub pus_version: PusVersion,
    /// 4-bit spacecraft time reference status, sharing the first byte with
    /// the version number.
    pub spacecraft_time_ref_status: u8,
    pub service_type: u8,
    pub service_subtype: u8,
    pub msg_type_counter: Option<UnsignedByteField>,
    pub destination_id: Option<UnsignedByteField>,
    pub time: CucTime,
}

impl PusTmSecondaryHeader {
    pub fn new(
        service_type: u8,
        service_subtype: u8,
        pus_version: PusVersion,
        msg_type_counter: Option<UnsignedByteField>,
        destination_id: Option<UnsignedByteField>,
        time: CucTime,
    ) -> Self {
        Self {
            pus_version,
            spacecraft_time_ref_status: 0,
            service_type,
            service_subtype,
            msg_type_counter,
            destination_id,
            time,
        }
    }

    /// Serialized length of this secondary header including the timestamp.
    pub fn len(&self) -> usize {
        TM_SEC_HEADER_MIN_LEN
            + self.msg_type_counter.map_or(0, |c| c.width())
            + self.destination_id.map_or(0, |d| d.width())
            + self.time.len_packed()
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
        buf[0] = (u8::from(self.pus_version) << 4) | (self.spacecraft_time_ref_status & 0b1111);
        buf[1] = self.service_type;
        buf[2] = self.service_subtype;
        let mut curr_idx = TM_SEC_HEADER_MIN_LEN;
        if let Some(counter) = &self.msg_type_counter {
            curr_idx += counter.write_to_be_bytes(&mut buf[curr_idx..])?;
        }
        if let Some(destination) = &self.destination_id {
            curr_idx += destination.write_to_be_bytes(&mut buf[curr_idx..])?;
        }
        curr_idx += self.time.write_to_bytes(&mut buf[curr_idx..])?;
        Ok(curr_idx)
    }

    fn from_bytes(buf: &[u8], profile: &TmDecodeProfile) -> Result<Self, PusError> {
        let fixed_len = TM_SEC_HEADER_MIN_LEN
            + profile.msg_type_counter_width.unwrap_or(0)
            + profile.destination_id_width.unwrap_or(0);
        if buf.len() < fixed_len {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: buf.len(),
                expected: fixed_len,
            }
            .into());
        }
        let raw_version = (buf[0] >> 4) & 0b1111;
        let pus_version = PusVersion::try_from(raw_version)
            .map_err(|_| PusError::VersionNotSupported(raw_version))?;
        let mut curr_idx = TM_SEC_HEADER_MIN_LEN;
        let msg_type_counter = match profile.msg_type_counter_width {
            Some(width) => {
                let counter = UnsignedByteField::from_be_bytes(width, &buf[curr_idx..])?;
                curr_idx += width;
                Some(counter)
            }
            None => None,
        };
        let destination_id = match profile.destination_id_width {
            Some(width) => {
                let destination = UnsignedByteField::from_be_bytes(width, &buf[curr_idx..])?;
                curr_idx += width;
                Some(destination)
            }
            None => None,
        };
        let time = match &profile.time_template {
            Some(template) => {
                let mut time = *template;
                time.from_bytes(&buf[curr_idx..])?;
                time
            }
            None => CucTime::deserialize(&buf[curr_idx..], true, None, None)?,
        };
        Ok(Self {
            pus_version,
            spacecraft_time_ref_status: buf[0] & 0b1111,
            service_type: buf[1],
            service_subtype: buf[2],
            msg_type_counter,
            destination_id,
            time,
        })
    }
}

/// PUS telemetry packet. Immutable value object, the data length field of the
/// primary header is always consistent with the carried data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PusTm {
    sp_header: SpHeader,
    sec_header: PusTmSecondaryHeader,
    source_data: Vec<u8>,
    has_pec: bool,
}

impl PusTm {
    /// Create a PUS TM. The primary header is derived from the APID and
    /// sequence count with the packet type set to TM and the secondary header
    /// flag set.
    pub fn new(
        apid: u16,
        seq_count: u16,
        sec_header: PusTmSecondaryHeader,
        source_data: Vec<u8>,
        has_pec: bool,
    ) -> Result<Self, PusError> {
        let sp_header = SpHeader::new(PacketType::Tm, true, apid, seq_count, 0).ok_or(
            PusError::ValueOutOfRange {
                field: "apid or sequence count",
                value: apid.max(seq_count) as u64,
                max: crate::MAX_SEQ_COUNT as u64,
            },
        )?;
        let mut tm = PusTm {
            sp_header,
            sec_header,
            source_data,
            has_pec,
        };
        if tm.len_packed() > MAX_PACKET_SIZE {
            return Err(PusError::PacketTooLarge(tm.len_packed()));
        }
        tm.update_data_len();
        Ok(tm)
    }

    fn update_data_len(&mut self) {
        let data_len = self.sec_header.len()
            + self.source_data.len()
            + if self.has_pec { PEC_FIELD_LEN } else { 0 }
            - 1;
        self.sp_header.data_len = data_len as u16;
    }

    #[inline]
    pub fn sec_header(&self) -> &PusTmSecondaryHeader {
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
    pub fn msg_type_counter(&self) -> Option<UnsignedByteField> {
        self.sec_header.msg_type_counter
    }

    #[inline]
    pub fn destination_id(&self) -> Option<UnsignedByteField> {
        self.sec_header.destination_id
    }

    #[inline]
    pub fn time(&self) -> &CucTime {
        &self.sec_header.time
    }

    #[inline]
    pub fn source_data(&self) -> &[u8] {
        &self.source_data
    }

    #[inline]
    pub fn has_pec(&self) -> bool {
        self.has_pec
    }

    pub fn len_packed(&self) -> usize {
        CCSDS_HEADER_LEN
            + self.sec_header.len()
            + self.source_data.len()
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
        buf[curr_idx..curr_idx + self.source_data.len()].copy_from_slice(&self.source_data);
        curr_idx += self.source_data.len();
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

    /// Deserialize a PUS TM from its binary format using the given decode
    /// profile for the non-self-describing parts.
    pub fn from_bytes(buf: &[u8], profile: &TmDecodeProfile) -> Result<Self, PusError> {
        let (sp_header, packet_size) =
            parse_packet_prelude(buf, profile.has_pec, profile.validate_pec)?;
        let sec_header =
            PusTmSecondaryHeader::from_bytes(&buf[CCSDS_HEADER_LEN..packet_size], profile)?;
        let trailer_len = if profile.has_pec { PEC_FIELD_LEN } else { 0 };
        let payload_start = CCSDS_HEADER_LEN + sec_header.len();
        if packet_size < payload_start + trailer_len {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: packet_size,
                expected: payload_start + trailer_len,
            }
            .into());
        }
        Ok(PusTm {
            sp_header,
            sec_header,
            source_data: buf[payload_start..packet_size - trailer_len].to_vec(),
            has_pec: profile.has_pec,
        })
    }
}

impl CcsdsPacket for PusTm {
    delegate!(to self.sp_header {
        fn ccsds_version(&self) -> u8;
        fn packet_id(&self) -> PacketId;
        fn psc(&self) -> PacketSequenceCtrl;
        fn data_len(&self) -> u16;
    });
}
