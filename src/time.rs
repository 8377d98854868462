//! CCSDS Unsegmented Time Code (CUC) according to
//! [CCSDS 301.0-B-4](https://public.ccsds.org/Pubs/301x0b4e1.pdf) section 3.2.
//!
//! The time code consists of an optional self-describing preamble (P-field),
//! a coarse time field counting seconds since an epoch and an optional fine
//! time field holding a binary fraction of a second. The byte widths of both
//! fields are mission-configurable: 1 to 7 bytes for the seconds and 0 to 10
//! bytes for the fraction. When no preamble is present on the wire, the widths
//! and the epoch have to be supplied out of band.
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};

use crate::ByteConversionError;

/// Minimum buffer length accepted by the CUC decoders.
pub const MIN_CUC_LEN: usize = 2;

/// International Atomic Time (TAI) epoch, 1958-01-01T00:00:00.
pub fn tai_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1958, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimeCodeId {
    Tai = 0b001,
    AgencyDefined = 0b010,
}

impl TryFrom<u8> for TimeCodeId {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            x if x == TimeCodeId::Tai as u8 => Ok(TimeCodeId::Tai),
            x if x == TimeCodeId::AgencyDefined as u8 => Ok(TimeCodeId::AgencyDefined),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CucError {
    #[error("basic time unit length {0} not in range 1..=7")]
    InvalidBasicUnitLength(u8),
    #[error("fractional time unit length {0} not in range 0..=10")]
    InvalidFracUnitLength(u8),
    #[error("seconds value {seconds} too large for unit length {unit_length}")]
    SecondsTooLarge { seconds: u64, unit_length: u8 },
    #[error("fraction value {fraction} too large for unit length {unit_length}")]
    FractionTooLarge { fraction: u128, unit_length: u8 },
    #[error("time code identification {0:#05b} not supported")]
    InvalidTimeCodeId(u8),
    #[error("datetime precedes the configured epoch")]
    DateBeforeEpoch,
    #[error("time configured without a fraction field")]
    NoFractionField,
    #[error("unit lengths required to decode a CUC time without preamble")]
    MissingUnitLengths,
    #[error("cuc time conversion: {0}")]
    ByteConversion(#[from] ByteConversionError),
}

/// Wire format parameters of a CUC time: unit lengths, epoch and the packed
/// preamble bytes. Fixed at construction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct TimeFormat {
    basic_unit_length: u8,
    frac_unit_length: u8,
    time_code_id: TimeCodeId,
    epoch: NaiveDateTime,
    preamble: [u8; 2],
    preamble_len: usize,
}

impl TimeFormat {
    fn new(
        basic_unit_length: u8,
        frac_unit_length: u8,
        epoch: Option<NaiveDateTime>,
    ) -> Result<Self, CucError> {
        let time_code_id = if epoch.is_some() {
            TimeCodeId::AgencyDefined
        } else {
            TimeCodeId::Tai
        };
        Self::new_with_time_code_id(basic_unit_length, frac_unit_length, epoch, time_code_id)
    }

    fn new_with_time_code_id(
        basic_unit_length: u8,
        frac_unit_length: u8,
        epoch: Option<NaiveDateTime>,
        time_code_id: TimeCodeId,
    ) -> Result<Self, CucError> {
        if !(1..=7).contains(&basic_unit_length) {
            return Err(CucError::InvalidBasicUnitLength(basic_unit_length));
        }
        if frac_unit_length > 10 {
            return Err(CucError::InvalidFracUnitLength(frac_unit_length));
        }
        let mut format = TimeFormat {
            basic_unit_length,
            frac_unit_length,
            time_code_id,
            epoch: epoch.unwrap_or_else(tai_epoch),
            preamble: [0; 2],
            preamble_len: 0,
        };
        format.pack_preamble();
        Ok(format)
    }

    /// Pack the P-field. The first octet holds the extension bit, the 3-bit
    /// time code identification and the capped unit length counts. If the basic
    /// unit length exceeds 4 or the fractional unit length exceeds 3, the
    /// extension bit is set and a second octet carries the overflow counts.
    fn pack_preamble(&mut self) {
        let extension = self.basic_unit_length > 4 || self.frac_unit_length > 3;
        let basic_octets = core::cmp::min(3, self.basic_unit_length - 1);
        let frac_octets = core::cmp::min(3, self.frac_unit_length);
        self.preamble[0] = ((extension as u8) << 7)
            | ((self.time_code_id as u8) << 4)
            | (basic_octets << 2)
            | frac_octets;
        if extension {
            let basic_additional = self.basic_unit_length.saturating_sub(4);
            let frac_additional = self.frac_unit_length.saturating_sub(3);
            self.preamble[1] = (basic_additional << 5) | (frac_additional << 2);
            self.preamble_len = 2;
        } else {
            self.preamble_len = 1;
        }
    }

    fn preamble(&self) -> &[u8] {
        &self.preamble[0..self.preamble_len]
    }

    fn from_bytes(buf: &[u8], epoch: Option<NaiveDateTime>) -> Result<Self, CucError> {
        if buf.len() < MIN_CUC_LEN {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: buf.len(),
                expected: MIN_CUC_LEN,
            }
            .into());
        }
        let octet1 = buf[0];
        let extension = (octet1 >> 7) & 0b1 == 1;
        let raw_time_code_id = (octet1 >> 4) & 0b111;
        let time_code_id = TimeCodeId::try_from(raw_time_code_id)
            .map_err(|_| CucError::InvalidTimeCodeId(raw_time_code_id))?;
        let mut basic_unit_length = ((octet1 >> 2) & 0b11) + 1;
        let mut frac_unit_length = octet1 & 0b11;
        if extension {
            let octet2 = buf[1];
            basic_unit_length += (octet2 >> 5) & 0b11;
            frac_unit_length += (octet2 >> 2) & 0b111;
        }
        Self::new_with_time_code_id(basic_unit_length, frac_unit_length, epoch, time_code_id)
    }
}

/// A CCSDS unsegmented time code value.
///
/// The format parameters (unit lengths, preamble presence and epoch) are fixed
/// at construction, while the carried seconds and fraction values can be
/// updated through checked setters or [Self::from_datetime].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CucTime {
    format: TimeFormat,
    has_preamble: bool,
    seconds: u64,
    fraction: u128,
}

impl CucTime {
    /// Create a CUC time instance.
    ///
    /// # Arguments
    ///
    /// * `seconds` - seconds since the epoch
    /// * `fraction` - binary fraction of a second, ignored if `frac_unit_length`
    ///   is 0
    /// * `basic_unit_length` - number of bytes representing the seconds, 1 to 7
    /// * `frac_unit_length` - number of bytes representing the fraction, 0 to 10
    /// * `has_preamble` - whether the serialized form carries the P-field
    /// * `epoch` - agency-defined epoch, or [None] for the TAI epoch
    pub fn new(
        seconds: u64,
        fraction: u128,
        basic_unit_length: u8,
        frac_unit_length: u8,
        has_preamble: bool,
        epoch: Option<NaiveDateTime>,
    ) -> Result<Self, CucError> {
        let format = TimeFormat::new(basic_unit_length, frac_unit_length, epoch)?;
        let mut cuc = CucTime {
            format,
            has_preamble,
            seconds: 0,
            fraction: 0,
        };
        cuc.set_seconds(seconds)?;
        if frac_unit_length > 0 {
            cuc.set_fraction(fraction)?;
        }
        Ok(cuc)
    }

    /// Create a CUC time stamped with the current UTC system time.
    pub fn now(
        basic_unit_length: u8,
        frac_unit_length: u8,
        has_preamble: bool,
        epoch: Option<NaiveDateTime>,
    ) -> Result<Self, CucError> {
        let mut cuc = Self::new(
            0,
            0,
            basic_unit_length,
            frac_unit_length,
            has_preamble,
            epoch,
        )?;
        cuc.from_datetime(Utc::now().naive_utc())?;
        Ok(cuc)
    }

    #[inline]
    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    /// Fraction of a second, or [None] if the format has no fraction field.
    #[inline]
    pub fn fraction(&self) -> Option<u128> {
        if self.format.frac_unit_length == 0 {
            return None;
        }
        Some(self.fraction)
    }

    #[inline]
    pub fn basic_unit_length(&self) -> u8 {
        self.format.basic_unit_length
    }

    #[inline]
    pub fn frac_unit_length(&self) -> u8 {
        self.format.frac_unit_length
    }

    #[inline]
    pub fn has_preamble(&self) -> bool {
        self.has_preamble
    }

    #[inline]
    pub fn epoch(&self) -> NaiveDateTime {
        self.format.epoch
    }

    #[inline]
    pub fn time_code_id(&self) -> TimeCodeId {
        self.format.time_code_id
    }

    /// Serialized length: preamble if present, seconds field and fraction field.
    pub fn len_packed(&self) -> usize {
        (if self.has_preamble {
            self.format.preamble_len
        } else {
            0
        }) + self.format.basic_unit_length as usize
            + self.format.frac_unit_length as usize
    }

    pub fn set_seconds(&mut self, seconds: u64) -> Result<(), CucError> {
        let max_val = (1u64 << (8 * self.format.basic_unit_length as u32)) - 1;
        if seconds > max_val {
            return Err(CucError::SecondsTooLarge {
                seconds,
                unit_length: self.format.basic_unit_length,
            });
        }
        self.seconds = seconds;
        Ok(())
    }

    pub fn set_fraction(&mut self, fraction: u128) -> Result<(), CucError> {
        if self.format.frac_unit_length == 0 {
            return Err(CucError::NoFractionField);
        }
        let max_val = (1u128 << (8 * self.format.frac_unit_length as u32)) - 1;
        if fraction > max_val {
            return Err(CucError::FractionTooLarge {
                fraction,
                unit_length: self.format.frac_unit_length,
            });
        }
        self.fraction = fraction;
        Ok(())
    }

    /// Set the carried time from a datetime. Fails if the datetime precedes the
    /// epoch or the elapsed seconds exceed the basic field range. The fraction
    /// is rounded to the nearest representable unit. Returns the full elapsed
    /// seconds since the epoch.
    pub fn from_datetime(&mut self, dt: NaiveDateTime) -> Result<f64, CucError> {
        let delta = dt.signed_duration_since(self.format.epoch);
        if delta < Duration::zero() {
            return Err(CucError::DateBeforeEpoch);
        }
        let full_seconds = delta.num_seconds();
        let subsec_nanos = (delta - Duration::seconds(full_seconds))
            .num_nanoseconds()
            .unwrap() as u64;
        let elapsed = full_seconds as f64 + subsec_nanos as f64 / 1e9;
        if self.format.frac_unit_length > 0 {
            let max_val = (1u128 << (8 * self.format.frac_unit_length as u32)) - 1;
            let fraction = (subsec_nanos as f64 / 1e9 * max_val as f64).round() as u128;
            self.set_seconds(full_seconds as u64)?;
            self.set_fraction(fraction)?;
        } else {
            self.set_seconds(elapsed.round() as u64)?;
        }
        Ok(elapsed)
    }

    /// Carried time as fractional seconds since the epoch.
    pub fn to_float(&self) -> f64 {
        if self.format.frac_unit_length == 0 {
            return self.seconds as f64;
        }
        let divisor = (1u128 << (8 * self.format.frac_unit_length as u32)) as f64;
        self.seconds as f64 + self.fraction as f64 / divisor
    }

    pub fn write_to_bytes(&self, buf: &mut [u8]) -> Result<usize, ByteConversionError> {
        let total_len = self.len_packed();
        if buf.len() < total_len {
            return Err(ByteConversionError::ToSliceTooSmall {
                found: buf.len(),
                expected: total_len,
            });
        }
        let mut curr_idx = 0;
        if self.has_preamble {
            let preamble = self.format.preamble();
            buf[0..preamble.len()].copy_from_slice(preamble);
            curr_idx += preamble.len();
        }
        let basic_len = self.format.basic_unit_length as usize;
        buf[curr_idx..curr_idx + basic_len]
            .copy_from_slice(&self.seconds.to_be_bytes()[8 - basic_len..]);
        curr_idx += basic_len;
        let frac_len = self.format.frac_unit_length as usize;
        if frac_len > 0 {
            buf[curr_idx..curr_idx + frac_len]
                .copy_from_slice(&self.fraction.to_be_bytes()[16 - frac_len..]);
            curr_idx += frac_len;
        }
        Ok(curr_idx)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut vec = vec![0; self.len_packed()];
        // Unwrap okay, the vector has the exact required length.
        self.write_to_bytes(&mut vec).unwrap();
        vec
    }

    /// Re-read the seconds and fraction values from a buffer holding a CUC time
    /// in this instance's own format. Used for template-driven decoding when
    /// the wire format is known out of band; preamble bytes, if configured, are
    /// skipped without inspection.
    pub fn from_bytes(&mut self, buf: &[u8]) -> Result<(), CucError> {
        let total_len = self.len_packed();
        if buf.len() < total_len {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: buf.len(),
                expected: total_len,
            }
            .into());
        }
        let preamble_len = if self.has_preamble {
            self.format.preamble_len
        } else {
            0
        };
        let basic_len = self.format.basic_unit_length as usize;
        let frac_len = self.format.frac_unit_length as usize;
        let mut raw_seconds = [0u8; 8];
        raw_seconds[8 - basic_len..].copy_from_slice(&buf[preamble_len..preamble_len + basic_len]);
        self.seconds = u64::from_be_bytes(raw_seconds);
        if frac_len > 0 {
            let frac_offset = preamble_len + basic_len;
            let mut raw_fraction = [0u8; 16];
            raw_fraction[16 - frac_len..].copy_from_slice(&buf[frac_offset..frac_offset + frac_len]);
            self.fraction = u128::from_be_bytes(raw_fraction);
        }
        Ok(())
    }

    /// Deserialize a binary coded CUC time into a new instance.
    ///
    /// With `has_preamble` set, the unit lengths are taken from the parsed
    /// P-field and `unit_lengths` is ignored. Without a preamble, the caller
    /// must supply `(basic_unit_length, frac_unit_length)` or decoding fails.
    /// The epoch is never carried on the wire; if [None] is passed, the TAI
    /// epoch is assumed.
    pub fn deserialize(
        buf: &[u8],
        has_preamble: bool,
        epoch: Option<NaiveDateTime>,
        unit_lengths: Option<(u8, u8)>,
    ) -> Result<Self, CucError> {
        if buf.len() < MIN_CUC_LEN {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: buf.len(),
                expected: MIN_CUC_LEN,
            }
            .into());
        }
        let format = if has_preamble {
            TimeFormat::from_bytes(buf, epoch)?
        } else {
            let (basic_unit_length, frac_unit_length) =
                unit_lengths.ok_or(CucError::MissingUnitLengths)?;
            TimeFormat::new(basic_unit_length, frac_unit_length, epoch)?
        };
        let mut cuc = CucTime {
            format,
            has_preamble,
            seconds: 0,
            fraction: 0,
        };
        cuc.from_bytes(buf)?;
        Ok(cuc)
    }
}
