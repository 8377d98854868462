//! Mission policy configuration.
//!
//! PUS leaves the presence and width of several packet fields to the mission:
//! the TC source ID, the TM message type counter and destination ID, the
//! packet error control trailer, the CUC time format and the verification
//! failure code width. A [PusPolicy] bundles these choices as plain data and
//! offers factory methods which stamp out packets consistent with them.
//! Policies are created once, passed by reference and never mutated.
use chrono::NaiveDateTime;

use crate::ecss::tc::{PusTc, PusTcSecondaryHeader, TcDecodeProfile};
use crate::ecss::tm::{PusTm, PusTmSecondaryHeader, TmDecodeProfile};
use crate::ecss::{AckFlags, PusError, PusVersion};
use crate::seq_count::PusIdent;
use crate::time::{CucError, CucTime};
use crate::util::UnsignedByteField;

/// CUC time format choices: preamble presence, field widths and epoch.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimePolicy {
    pub has_preamble: bool,
    pub basic_unit_length: u8,
    pub frac_unit_length: u8,
    /// Agency-defined epoch, [None] for the TAI epoch.
    pub epoch: Option<NaiveDateTime>,
}

impl Default for TimePolicy {
    fn default() -> Self {
        Self {
            has_preamble: true,
            basic_unit_length: 4,
            frac_unit_length: 2,
            epoch: None,
        }
    }
}

/// Telecommand field choices.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TcPolicy {
    pub source_id_width: Option<usize>,
    pub has_pec: bool,
}

impl Default for TcPolicy {
    fn default() -> Self {
        Self {
            source_id_width: None,
            has_pec: true,
        }
    }
}

/// Telemetry field choices.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TmPolicy {
    pub msg_type_counter_width: Option<usize>,
    pub destination_id_width: Option<usize>,
    pub has_pec: bool,
    pub time: TimePolicy,
}

impl Default for TmPolicy {
    fn default() -> Self {
        Self {
            msg_type_counter_width: Some(1),
            destination_id_width: None,
            has_pec: true,
            time: TimePolicy::default(),
        }
    }
}

/// Request verification service choices.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VerificationPolicy {
    pub failure_code_width: usize,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            failure_code_width: 1,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PusPolicy {
    pub pus_version: PusVersion,
    pub tc: TcPolicy,
    pub tm: TmPolicy,
    pub verification: VerificationPolicy,
}

impl Default for PusPolicy {
    fn default() -> Self {
        Self {
            pus_version: PusVersion::PusC,
            tc: TcPolicy::default(),
            tm: TmPolicy::default(),
            verification: VerificationPolicy::default(),
        }
    }
}

impl PusPolicy {
    /// CUC time in the policy's format carrying the given values.
    pub fn cuc_time(&self, seconds: u64, fraction: u128) -> Result<CucTime, CucError> {
        CucTime::new(
            seconds,
            fraction,
            self.tm.time.basic_unit_length,
            self.tm.time.frac_unit_length,
            self.tm.time.has_preamble,
            self.tm.time.epoch,
        )
    }

    /// CUC time in the policy's format stamped with the current UTC time.
    pub fn cuc_time_now(&self) -> Result<CucTime, CucError> {
        CucTime::now(
            self.tm.time.basic_unit_length,
            self.tm.time.frac_unit_length,
            self.tm.time.has_preamble,
            self.tm.time.epoch,
        )
    }

    /// Create a telecommand with the policy's optional fields. The sequence
    /// count is drawn from the identity; the source ID value is only used
    /// when the policy carries the field and defaults to 0 if omitted.
    pub fn new_tc(
        &self,
        ident: &PusIdent,
        service_type: u8,
        service_subtype: u8,
        ack_flags: AckFlags,
        source_id: Option<u64>,
        app_data: Vec<u8>,
    ) -> Result<PusTc, PusError> {
        let source_id = match self.tc.source_id_width {
            Some(width) => Some(UnsignedByteField::new(width, source_id.unwrap_or(0))?),
            None => None,
        };
        let sec_header = PusTcSecondaryHeader::new(
            service_type,
            service_subtype,
            ack_flags,
            self.pus_version,
            source_id,
        );
        PusTc::new(
            ident.apid(),
            ident.next_seq_count(),
            sec_header,
            app_data,
            self.tc.has_pec,
        )
    }

    /// Create a telemetry packet with the policy's optional fields, stamped
    /// with the current time. Counter and destination values are only used
    /// when the policy carries the respective field and default to 0.
    pub fn new_tm(
        &self,
        ident: &PusIdent,
        service_type: u8,
        service_subtype: u8,
        msg_type_counter: Option<u64>,
        destination_id: Option<u64>,
        source_data: Vec<u8>,
    ) -> Result<PusTm, PusError> {
        let msg_type_counter = match self.tm.msg_type_counter_width {
            Some(width) => Some(UnsignedByteField::new(width, msg_type_counter.unwrap_or(0))?),
            None => None,
        };
        let destination_id = match self.tm.destination_id_width {
            Some(width) => Some(UnsignedByteField::new(width, destination_id.unwrap_or(0))?),
            None => None,
        };
        let time = self.cuc_time_now()?;
        let sec_header = PusTmSecondaryHeader::new(
            service_type,
            service_subtype,
            self.pus_version,
            msg_type_counter,
            destination_id,
            time,
        );
        PusTm::new(
            ident.apid(),
            ident.next_seq_count(),
            sec_header,
            source_data,
            self.tm.has_pec,
        )
    }

    /// Decode profile matching telecommands produced under this policy.
    pub fn tc_decode_profile(&self) -> TcDecodeProfile {
        TcDecodeProfile {
            has_pec: self.tc.has_pec,
            validate_pec: true,
            source_id_width: self.tc.source_id_width,
        }
    }

    /// Decode profile matching telemetry produced under this policy. A time
    /// template is only included when the self-describing preamble alone is
    /// not sufficient, that is for preamble-less formats or non-TAI epochs.
    pub fn tm_decode_profile(&self) -> Result<TmDecodeProfile, CucError> {
        let time_template = if self.tm.time.has_preamble && self.tm.time.epoch.is_none() {
            None
        } else {
            Some(self.cuc_time(0, 0)?)
        };
        Ok(TmDecodeProfile {
            has_pec: self.tm.has_pec,
            validate_pec: true,
            msg_type_counter_width: self.tm.msg_type_counter_width,
            destination_id_width: self.tm.destination_id_width,
            time_template,
        })
    }
}
