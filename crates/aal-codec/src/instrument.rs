//! CASES instrument packet framing.
//!
//! ```text
//! | sync (4): 55 AA 33 CC | len (4, BE, covers type+data) | type (1) | data (len-1) | checksum (2, BE) |
//! ```
//!
//! `checksum = (type as u32 + sum(data bytes)) mod 2^16`.

use crate::CodecError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const SYNC: [u8; 4] = [0x55, 0xAA, 0x33, 0xCC];
pub const MAX_PKT_LEN: usize = 1024 * 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentType {
    SoftReset,
    HardReset,
    UploadDspImage,
    UploadDspConfig,
    UploadSbcConfig,
    SetPowerState,
    QueryStatus,
    RetrieveFile,
    ExecuteSysCmd,
    ReportStatusMsg,
    ReportBatchMsg,
    ReportIqBatchMsg,
    TransferFile,
}

impl InstrumentType {
    fn to_u8(self) -> u8 {
        match self {
            InstrumentType::SoftReset => 0x01,
            InstrumentType::HardReset => 0x02,
            InstrumentType::UploadDspImage => 0x10,
            InstrumentType::UploadDspConfig => 0x11,
            InstrumentType::UploadSbcConfig => 0x12,
            InstrumentType::SetPowerState => 0x20,
            InstrumentType::QueryStatus => 0x30,
            InstrumentType::RetrieveFile => 0x38,
            InstrumentType::ExecuteSysCmd => 0x40,
            InstrumentType::ReportStatusMsg => 0x80,
            InstrumentType::ReportBatchMsg => 0x88,
            InstrumentType::ReportIqBatchMsg => 0x89,
            InstrumentType::TransferFile => 0xE0,
        }
    }

    fn from_u8(b: u8) -> Result<Self, CodecError> {
        Ok(match b {
            0x01 => InstrumentType::SoftReset,
            0x02 => InstrumentType::HardReset,
            0x10 => InstrumentType::UploadDspImage,
            0x11 => InstrumentType::UploadDspConfig,
            0x12 => InstrumentType::UploadSbcConfig,
            0x20 => InstrumentType::SetPowerState,
            0x30 => InstrumentType::QueryStatus,
            0x38 => InstrumentType::RetrieveFile,
            0x40 => InstrumentType::ExecuteSysCmd,
            0x80 => InstrumentType::ReportStatusMsg,
            0x88 => InstrumentType::ReportBatchMsg,
            0x89 => InstrumentType::ReportIqBatchMsg,
            0xE0 => InstrumentType::TransferFile,
            other => return Err(CodecError::UnknownType(other)),
        })
    }

    /// Valid range for `type + data` length, inclusive on both ends.
    fn valid_length_range(self) -> (usize, usize) {
        match self {
            InstrumentType::SoftReset | InstrumentType::HardReset => (1, 1),
            InstrumentType::SetPowerState => (2, 2),
            InstrumentType::QueryStatus => (1, 1),
            InstrumentType::ReportStatusMsg => (5, 5),
            InstrumentType::UploadDspImage
            | InstrumentType::UploadDspConfig
            | InstrumentType::UploadSbcConfig
            | InstrumentType::RetrieveFile
            | InstrumentType::ExecuteSysCmd
            | InstrumentType::ReportBatchMsg
            | InstrumentType::ReportIqBatchMsg
            | InstrumentType::TransferFile => (1, MAX_PKT_LEN),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerLevel {
    Sleep,
    Low,
    Intermediate,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentPacket {
    pub ty: InstrumentType,
    pub data: Bytes,
}

fn checksum(ty: InstrumentType, data: &[u8]) -> u16 {
    let sum: u32 = data.iter().fold(ty.to_u8() as u32, |acc, &b| acc + b as u32);
    (sum & 0xFFFF) as u16
}

impl InstrumentPacket {
    /// Builds a frame, validating that `type + data` falls within the
    /// type's allowed length range.
    pub fn build(ty: InstrumentType, data: Bytes) -> Result<Self, CodecError> {
        let len = 1 + data.len();
        let (min, max) = ty.valid_length_range();
        if len < min || len > max {
            return Err(CodecError::BadLength { ty: ty.to_u8(), len });
        }
        Ok(Self { ty, data })
    }

    pub fn soft_reset() -> Self {
        Self {
            ty: InstrumentType::SoftReset,
            data: Bytes::new(),
        }
    }

    pub fn query_status() -> Self {
        Self {
            ty: InstrumentType::QueryStatus,
            data: Bytes::new(),
        }
    }

    pub fn set_power_state(level: PowerLevel) -> Self {
        let byte = match level {
            PowerLevel::Sleep => 0,
            PowerLevel::Low => 1,
            PowerLevel::Intermediate => 2,
            PowerLevel::Full => 3,
        };
        Self {
            ty: InstrumentType::SetPowerState,
            data: Bytes::copy_from_slice(&[byte]),
        }
    }

    /// Builds a status report. Unlike the original, this carries the given
    /// payload through to the wire rather than discarding it.
    pub fn report_status_msg(data: Bytes) -> Result<Self, CodecError> {
        Self::build(InstrumentType::ReportStatusMsg, data)
    }

    /// Builds a batch report, carrying the given payload through to the
    /// wire rather than discarding it.
    pub fn report_batch_msg(data: Bytes) -> Result<Self, CodecError> {
        Self::build(InstrumentType::ReportBatchMsg, data)
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&SYNC);
        let len = (1 + self.data.len()) as u32;
        buf.put_u32(len);
        buf.put_u8(self.ty.to_u8());
        buf.extend_from_slice(&self.data);
        buf.put_u16(checksum(self.ty, &self.data));
    }

    /// Decodes one packet from `buf`. Returns `Err(Incomplete)` without
    /// consuming anything if the frame is not yet fully buffered.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        const PREFIX_LEN: usize = 4 + 4; // sync + len
        if buf.remaining() < PREFIX_LEN {
            return Err(CodecError::Incomplete {
                needed: PREFIX_LEN,
                have: buf.remaining(),
            });
        }
        let prefix = buf.chunk()[..PREFIX_LEN].to_vec();
        if prefix[..4] != SYNC {
            return Err(CodecError::BadSync);
        }
        let len = u32::from_be_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]) as usize;

        let total_needed = PREFIX_LEN + len + 2; // + checksum
        if buf.remaining() < total_needed {
            return Err(CodecError::Incomplete {
                needed: total_needed,
                have: buf.remaining(),
            });
        }

        buf.advance(PREFIX_LEN);
        let ty_byte = buf.get_u8();
        let ty = InstrumentType::from_u8(ty_byte)?;

        let (min, max) = ty.valid_length_range();
        if len < min || len > max {
            return Err(CodecError::BadLength { ty: ty_byte, len });
        }

        let data = buf.copy_to_bytes(len - 1);
        let actual = buf.get_u16();
        let expected = checksum(ty, &data);
        if actual != expected {
            return Err(CodecError::BadChecksum { expected, actual });
        }

        Ok(Self { ty, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(pkt: &InstrumentPacket) -> InstrumentPacket {
        let mut buf = BytesMut::new();
        pkt.encode(&mut buf);
        let mut reader = buf.freeze();
        InstrumentPacket::decode(&mut reader).expect("decode should succeed")
    }

    #[test]
    fn soft_reset_round_trips() {
        let pkt = InstrumentPacket::soft_reset();
        assert_eq!(round_trip(&pkt), pkt);
    }

    #[test]
    fn set_power_state_round_trips() {
        let pkt = InstrumentPacket::set_power_state(PowerLevel::Full);
        assert_eq!(round_trip(&pkt), pkt);
    }

    #[test]
    fn report_status_msg_carries_payload_through_to_the_wire() {
        let payload = Bytes::from_static(&[1, 2, 3, 4]);
        let pkt = InstrumentPacket::report_status_msg(payload.clone()).unwrap();
        let decoded = round_trip(&pkt);
        assert_eq!(decoded.data, payload);
    }

    #[test]
    fn report_batch_msg_carries_payload_through_to_the_wire() {
        let payload = Bytes::from_static(b"batch of science data");
        let pkt = InstrumentPacket::report_batch_msg(payload.clone()).unwrap();
        let decoded = round_trip(&pkt);
        assert_eq!(decoded.data, payload);
    }

    #[test]
    fn build_rejects_data_outside_type_length_range() {
        let err = InstrumentPacket::build(InstrumentType::SoftReset, Bytes::from_static(b"x")).unwrap_err();
        assert!(matches!(err, CodecError::BadLength { .. }));
    }

    #[test]
    fn decode_rejects_bad_sync() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0, 0, 0, 0]);
        buf.put_u32(1);
        buf.put_u8(InstrumentType::SoftReset.to_u8());
        buf.put_u16(checksum(InstrumentType::SoftReset, &[]));
        let mut reader = buf.freeze();
        assert_eq!(InstrumentPacket::decode(&mut reader).unwrap_err(), CodecError::BadSync);
    }

    #[test]
    fn decode_rejects_corrupted_checksum() {
        let mut buf = BytesMut::new();
        let pkt = InstrumentPacket::soft_reset();
        pkt.encode(&mut buf);
        let mut corrupted = buf.to_vec();
        *corrupted.last_mut().unwrap() ^= 0xFF;
        let mut reader = Bytes::from(corrupted);
        assert!(matches!(
            InstrumentPacket::decode(&mut reader).unwrap_err(),
            CodecError::BadChecksum { .. }
        ));
    }

    #[test]
    fn decode_reports_incomplete_without_consuming() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&SYNC);
        let mut reader = buf.freeze();
        let remaining_before = reader.remaining();
        let err = InstrumentPacket::decode(&mut reader).unwrap_err();
        assert!(matches!(err, CodecError::Incomplete { .. }));
        assert_eq!(reader.remaining(), remaining_before);
    }
}
