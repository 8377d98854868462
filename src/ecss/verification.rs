//! PUS service 1: request verification reporting.
//!
//! Verification reports track a telecommand through the acceptance, start of
//! execution, progress and completion stages of its lifecycle. Each stage has
//! a success and a failure report subservice. A report is only emitted when
//! the originating telecommand requested acknowledgement for that stage;
//! gated calls succeed without producing output.
use std::collections::HashMap;
use std::collections::VecDeque;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::ecss::tc::PusTc;
use crate::ecss::tm::PusTm;
use crate::ecss::{AckFlags, PusError, PusServiceId};
use crate::policy::PusPolicy;
use crate::seq_count::PusIdent;
use crate::util::UnsignedByteField;
use crate::ByteConversionError;

/// Length of a serialized [RequestId].
pub const REQUEST_ID_LEN: usize = 4;

/// Subservice IDs of the request verification service.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Subservice {
    TmAcceptanceSuccess = 1,
    TmAcceptanceFailure = 2,
    TmStartSuccess = 3,
    TmStartFailure = 4,
    TmProgressSuccess = 5,
    TmProgressFailure = 6,
    TmCompletionSuccess = 7,
    TmCompletionFailure = 8,
}

/// Mission-independent failure codes for verification failure reports.
#[derive(Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CommonErrorCode {
    IllegalApid = 0,
    Incomplete = 1,
    IncorrectChecksum = 2,
    IllegalPacketType = 3,
    IllegalPacketSubtype = 4,
    IllegalAppData = 5,
}

impl CommonErrorCode {
    pub fn description(&self) -> &'static str {
        match self {
            CommonErrorCode::IllegalApid => "Illegal APID",
            CommonErrorCode::Incomplete => "Incomplete packet",
            CommonErrorCode::IncorrectChecksum => "Incorrect checksum",
            CommonErrorCode::IllegalPacketType => "Illegal packet type",
            CommonErrorCode::IllegalPacketSubtype => "Illegal packet subtype",
            CommonErrorCode::IllegalAppData => "Illegal or inconsistent application data",
        }
    }
}

/// Identifier correlating a verification report back to the telecommand it
/// verifies: the raw packet ID word and the raw packet sequence control word
/// of the originating TC, serialized as 4 big-endian bytes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RequestId {
    packet_id: u16,
    psc: u16,
}

impl RequestId {
    pub fn new(packet_id: u16, psc: u16) -> Self {
        Self { packet_id, psc }
    }

    #[inline]
    pub fn packet_id(&self) -> u16 {
        self.packet_id
    }

    #[inline]
    pub fn psc(&self) -> u16 {
        self.psc
    }

    pub fn to_bytes(self) -> [u8; REQUEST_ID_LEN] {
        let mut buf = [0; REQUEST_ID_LEN];
        buf[0..2].copy_from_slice(&self.packet_id.to_be_bytes());
        buf[2..4].copy_from_slice(&self.psc.to_be_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, ByteConversionError> {
        if buf.len() < REQUEST_ID_LEN {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: buf.len(),
                expected: REQUEST_ID_LEN,
            });
        }
        Ok(Self {
            packet_id: u16::from_be_bytes(buf[0..2].try_into().unwrap()),
            psc: u16::from_be_bytes(buf[2..4].try_into().unwrap()),
        })
    }
}

/// Destination for generated verification reports. Writes are synchronous,
/// errors propagate to the caller of the stage method.
pub trait TmSink {
    fn write(&mut self, report: PusTm) -> std::io::Result<()>;
}

/// In-memory sink collecting reports in a FIFO queue.
#[derive(Debug, Default)]
pub struct QueuedTmSink {
    queue: VecDeque<PusTm>,
}

impl QueuedTmSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&mut self) -> Option<PusTm> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl TmSink for QueuedTmSink {
    fn write(&mut self, report: PusTm) -> std::io::Result<()> {
        self.queue.push_back(report);
        Ok(())
    }
}

/// Failure information attached to a failure report. If no code is given,
/// the report carries [CommonErrorCode::IllegalAppData].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureNotice {
    pub code: Option<CommonErrorCode>,
    pub data: Vec<u8>,
}

impl FailureNotice {
    pub fn new(code: CommonErrorCode, data: Vec<u8>) -> Self {
        Self {
            code: Some(code),
            data,
        }
    }

    pub fn without_code(data: Vec<u8>) -> Self {
        Self { code: None, data }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("building verification report: {0}")]
    Report(#[from] PusError),
    #[error("writing verification report: {0}")]
    Sink(#[from] std::io::Error),
}

/// Request verification report generator.
///
/// Owns the reporting identity (APID and sequence counter), the mission
/// policy, the report sink and one message type counter per report
/// subservice. Each stage method consults the acknowledgement flags of the
/// passed telecommand first and returns `Ok(false)` without emitting anything
/// when the stage was not requested.
pub struct RequestVerification<Sink: TmSink> {
    ident: PusIdent,
    policy: PusPolicy,
    sink: Sink,
    msg_type_counters: HashMap<(u8, u8), u64>,
}

impl<Sink: TmSink> RequestVerification<Sink> {
    pub fn new(ident: PusIdent, policy: PusPolicy, sink: Sink) -> Self {
        Self {
            ident,
            policy,
            sink,
            msg_type_counters: HashMap::new(),
        }
    }

    #[inline]
    pub fn apid(&self) -> u16 {
        self.ident.apid()
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut Sink {
        &mut self.sink
    }

    pub fn acceptance_success(&mut self, tc: &PusTc) -> Result<bool, VerificationError> {
        self.report_success(tc, AckFlags::ACCEPTANCE, Subservice::TmAcceptanceSuccess)
    }

    pub fn acceptance_failure(
        &mut self,
        tc: &PusTc,
        notice: FailureNotice,
    ) -> Result<bool, VerificationError> {
        self.report_failure(tc, AckFlags::ACCEPTANCE, Subservice::TmAcceptanceFailure, notice)
    }

    pub fn start_success(&mut self, tc: &PusTc) -> Result<bool, VerificationError> {
        self.report_success(tc, AckFlags::START_OF_EXECUTION, Subservice::TmStartSuccess)
    }

    pub fn start_failure(
        &mut self,
        tc: &PusTc,
        notice: FailureNotice,
    ) -> Result<bool, VerificationError> {
        self.report_failure(
            tc,
            AckFlags::START_OF_EXECUTION,
            Subservice::TmStartFailure,
            notice,
        )
    }

    pub fn progress_success(&mut self, tc: &PusTc) -> Result<bool, VerificationError> {
        self.report_success(tc, AckFlags::PROGRESS, Subservice::TmProgressSuccess)
    }

    pub fn progress_failure(
        &mut self,
        tc: &PusTc,
        notice: FailureNotice,
    ) -> Result<bool, VerificationError> {
        self.report_failure(tc, AckFlags::PROGRESS, Subservice::TmProgressFailure, notice)
    }

    pub fn completion_success(&mut self, tc: &PusTc) -> Result<bool, VerificationError> {
        self.report_success(tc, AckFlags::COMPLETION, Subservice::TmCompletionSuccess)
    }

    pub fn completion_failure(
        &mut self,
        tc: &PusTc,
        notice: FailureNotice,
    ) -> Result<bool, VerificationError> {
        self.report_failure(
            tc,
            AckFlags::COMPLETION,
            Subservice::TmCompletionFailure,
            notice,
        )
    }

    fn report_success(
        &mut self,
        tc: &PusTc,
        stage: AckFlags,
        subservice: Subservice,
    ) -> Result<bool, VerificationError> {
        if !tc.ack(stage) {
            return Ok(false);
        }
        let source_data = tc.request_id().to_bytes().to_vec();
        self.emit(subservice, source_data)?;
        Ok(true)
    }

    fn report_failure(
        &mut self,
        tc: &PusTc,
        stage: AckFlags,
        subservice: Subservice,
        notice: FailureNotice,
    ) -> Result<bool, VerificationError> {
        if !tc.ack(stage) {
            return Ok(false);
        }
        let mut source_data = tc.request_id().to_bytes().to_vec();
        let code = notice.code.unwrap_or(CommonErrorCode::IllegalAppData);
        let code_width = self.policy.verification.failure_code_width;
        let code_field = UnsignedByteField::new(code_width, u8::from(code) as u64)
            .map_err(PusError::from)?;
        let mut code_buf = [0; 8];
        code_field
            .write_to_be_bytes(&mut code_buf)
            .map_err(PusError::from)?;
        source_data.extend_from_slice(&code_buf[0..code_width]);
        source_data.extend_from_slice(&notice.data);
        self.emit(subservice, source_data)?;
        Ok(true)
    }

    fn emit(
        &mut self,
        subservice: Subservice,
        source_data: Vec<u8>,
    ) -> Result<(), VerificationError> {
        let service = u8::from(PusServiceId::Verification);
        let counter = self.next_msg_type_counter(service, subservice.into());
        let report = self.policy.new_tm(
            &self.ident,
            service,
            subservice.into(),
            counter,
            None,
            source_data,
        )?;
        self.sink.write(report)?;
        Ok(())
    }

    /// Current message type counter for a (service, subtype) pair and
    /// post-increment, wrapping at the configured counter width. Yields
    /// [None] if the policy does not carry the counter field.
    fn next_msg_type_counter(&mut self, service: u8, subtype: u8) -> Option<u64> {
        let width = self.policy.tm.msg_type_counter_width?;
        let counter = self.msg_type_counters.entry((service, subtype)).or_insert(0);
        let val = *counter;
        *counter = if width < 8 {
            (val + 1) & ((1u64 << (8 * width as u32)) - 1)
        } else {
            val.wrapping_add(1)
        };
        Some(val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecss::tc::PusTcSecondaryHeader;
    use crate::ecss::PusVersion;
    use crate::CcsdsPacket;

    fn test_tc(ack_flags: AckFlags) -> PusTc {
        let sec_header =
            PusTcSecondaryHeader::new(17, 1, ack_flags, PusVersion::PusC, None);
        PusTc::new(0x10, 5, sec_header, vec![], true).unwrap()
    }

    fn reporter() -> RequestVerification<QueuedTmSink> {
        let ident = PusIdent::new(0x22).unwrap();
        RequestVerification::new(ident, PusPolicy::default(), QueuedTmSink::new())
    }

    #[test]
    fn test_subservice_codes() {
        assert_eq!(u8::from(Subservice::TmAcceptanceSuccess), 1);
        assert_eq!(u8::from(Subservice::TmAcceptanceFailure), 2);
        assert_eq!(u8::from(Subservice::TmStartSuccess), 3);
        assert_eq!(u8::from(Subservice::TmStartFailure), 4);
        assert_eq!(u8::from(Subservice::TmProgressSuccess), 5);
        assert_eq!(u8::from(Subservice::TmProgressFailure), 6);
        assert_eq!(u8::from(Subservice::TmCompletionSuccess), 7);
        assert_eq!(u8::from(Subservice::TmCompletionFailure), 8);
        assert!(Subservice::try_from(9).is_err());
    }

    #[test]
    fn test_request_id_roundtrip() {
        let req_id = RequestId::new(0x1810, 0xC050);
        let raw = req_id.to_bytes();
        assert_eq!(raw, [0x18, 0x10, 0xC0, 0x50]);
        assert_eq!(RequestId::from_bytes(&raw).unwrap(), req_id);
        assert!(RequestId::from_bytes(&raw[0..3]).is_err());
    }

    #[test]
    fn test_error_code_descriptions() {
        assert_eq!(u8::from(CommonErrorCode::IllegalApid), 0);
        assert_eq!(u8::from(CommonErrorCode::IllegalAppData), 5);
        assert_eq!(
            CommonErrorCode::IncorrectChecksum.description(),
            "Incorrect checksum"
        );
    }

    #[test]
    fn test_acceptance_success_report() {
        let mut reporter = reporter();
        let tc = test_tc(AckFlags::ACCEPTANCE);
        assert!(reporter.acceptance_success(&tc).unwrap());
        let report = reporter.sink_mut().pop().unwrap();
        assert_eq!(report.apid(), 0x22);
        assert_eq!(report.service_type(), 1);
        assert_eq!(
            report.service_subtype(),
            u8::from(Subservice::TmAcceptanceSuccess)
        );
        assert_eq!(report.source_data(), tc.request_id().to_bytes());
        assert!(reporter.sink().is_empty());
    }

    #[test]
    fn test_ack_gating() {
        let mut reporter = reporter();
        let tc = test_tc(AckFlags::NONE);
        assert!(!reporter.acceptance_success(&tc).unwrap());
        assert!(!reporter.start_success(&tc).unwrap());
        assert!(!reporter.progress_success(&tc).unwrap());
        assert!(!reporter.completion_success(&tc).unwrap());
        assert!(!reporter
            .completion_failure(&tc, FailureNotice::default())
            .unwrap());
        assert!(reporter.sink().is_empty());
    }

    #[test]
    fn test_partial_ack_flags() {
        let mut reporter = reporter();
        let tc = test_tc(AckFlags::ACCEPTANCE | AckFlags::COMPLETION);
        assert!(reporter.acceptance_success(&tc).unwrap());
        assert!(!reporter.start_success(&tc).unwrap());
        assert!(!reporter.progress_success(&tc).unwrap());
        assert!(reporter.completion_success(&tc).unwrap());
        assert_eq!(reporter.sink().len(), 2);
    }

    #[test]
    fn test_failure_report_payload() {
        let mut reporter = reporter();
        let tc = test_tc(AckFlags::ALL);
        let notice = FailureNotice::new(CommonErrorCode::IncorrectChecksum, vec![0xAB, 0xCD]);
        assert!(reporter.start_failure(&tc, notice).unwrap());
        let report = reporter.sink_mut().pop().unwrap();
        assert_eq!(
            report.service_subtype(),
            u8::from(Subservice::TmStartFailure)
        );
        let mut expected = tc.request_id().to_bytes().to_vec();
        expected.push(u8::from(CommonErrorCode::IncorrectChecksum));
        expected.extend_from_slice(&[0xAB, 0xCD]);
        assert_eq!(report.source_data(), expected);
    }

    #[test]
    fn test_failure_report_default_code() {
        let mut reporter = reporter();
        let tc = test_tc(AckFlags::ALL);
        assert!(reporter
            .completion_failure(&tc, FailureNotice::without_code(vec![]))
            .unwrap());
        let report = reporter.sink_mut().pop().unwrap();
        assert_eq!(
            report.source_data()[REQUEST_ID_LEN],
            u8::from(CommonErrorCode::IllegalAppData)
        );
    }

    #[test]
    fn test_report_sequence_counts() {
        let mut reporter = reporter();
        let tc = test_tc(AckFlags::ALL);
        reporter.acceptance_success(&tc).unwrap();
        reporter.completion_success(&tc).unwrap();
        let first = reporter.sink_mut().pop().unwrap();
        let second = reporter.sink_mut().pop().unwrap();
        assert_eq!(first.seq_count(), 0);
        assert_eq!(second.seq_count(), 1);
    }

    #[test]
    fn test_msg_type_counter_per_subservice() {
        let mut reporter = reporter();
        let tc = test_tc(AckFlags::ALL);
        reporter.acceptance_success(&tc).unwrap();
        reporter.acceptance_success(&tc).unwrap();
        reporter.completion_success(&tc).unwrap();
        let first = reporter.sink_mut().pop().unwrap();
        let second = reporter.sink_mut().pop().unwrap();
        let third = reporter.sink_mut().pop().unwrap();
        assert_eq!(first.msg_type_counter().unwrap().value(), 0);
        assert_eq!(second.msg_type_counter().unwrap().value(), 1);
        // Different subservice, independent counter.
        assert_eq!(third.msg_type_counter().unwrap().value(), 0);
    }

    #[test]
    fn test_msg_type_counter_wrap() {
        let mut reporter = reporter();
        for _ in 0..255 {
            reporter.next_msg_type_counter(1, 1);
        }
        assert_eq!(reporter.next_msg_type_counter(1, 1), Some(255));
        assert_eq!(reporter.next_msg_type_counter(1, 1), Some(0));
    }

    #[test]
    fn test_report_decodes_with_policy_profile() {
        let mut reporter = reporter();
        let tc = test_tc(AckFlags::ACCEPTANCE);
        reporter.acceptance_success(&tc).unwrap();
        let report = reporter.sink_mut().pop().unwrap();
        let raw = report.to_vec();
        let profile = PusPolicy::default().tm_decode_profile().unwrap();
        let decoded = crate::ecss::tm::PusTm::from_bytes(&raw, &profile).unwrap();
        assert_eq!(decoded, report);
        let req_id = RequestId::from_bytes(decoded.source_data()).unwrap();
        assert_eq!(req_id, tc.request_id());
    }
}
