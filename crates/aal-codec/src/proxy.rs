//! Proxy Packet: the frame multiplexing many local TCP streams across one
//! RUDICS serial link.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |          src_port (16)       |          dest_port (16)        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  type (8)     |      payload_length (16)      | payload ...   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! All integers are big-endian. `(src_port, dest_port)` identifies one
//! tunneled stream.

use crate::CodecError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Largest payload carried by a single PASSTHROUGH frame.
pub const MAX_PASSTHROUGH_DATA_LEN: usize = 4096;

const HEADER_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyPacketType {
    Connect,
    Disconnect,
    Passthrough,
    Ping,
    IccidReq,
    Iccid,
}

impl ProxyPacketType {
    fn to_u8(self) -> u8 {
        match self {
            ProxyPacketType::Connect => 1,
            ProxyPacketType::Disconnect => 2,
            ProxyPacketType::Passthrough => 3,
            ProxyPacketType::Ping => 4,
            ProxyPacketType::IccidReq => 5,
            ProxyPacketType::Iccid => 6,
        }
    }

    fn from_u8(b: u8) -> Result<Self, CodecError> {
        Ok(match b {
            1 => ProxyPacketType::Connect,
            2 => ProxyPacketType::Disconnect,
            3 => ProxyPacketType::Passthrough,
            4 => ProxyPacketType::Ping,
            5 => ProxyPacketType::IccidReq,
            6 => ProxyPacketType::Iccid,
            other => return Err(CodecError::UnknownType(other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyPacket {
    pub src_port: u16,
    pub dest_port: u16,
    pub ty: ProxyPacketType,
    pub payload: Bytes,
}

impl ProxyPacket {
    pub fn connect(src_port: u16, dest_port: u16) -> Self {
        Self {
            src_port,
            dest_port,
            ty: ProxyPacketType::Connect,
            payload: Bytes::new(),
        }
    }

    pub fn disconnect(src_port: u16, dest_port: u16) -> Self {
        Self {
            src_port,
            dest_port,
            ty: ProxyPacketType::Disconnect,
            payload: Bytes::new(),
        }
    }

    pub fn passthrough(src_port: u16, dest_port: u16, payload: Bytes) -> Self {
        Self {
            src_port,
            dest_port,
            ty: ProxyPacketType::Passthrough,
            payload,
        }
    }

    pub fn ping() -> Self {
        Self {
            src_port: 0,
            dest_port: 0,
            ty: ProxyPacketType::Ping,
            payload: Bytes::new(),
        }
    }

    pub fn iccid_req() -> Self {
        Self {
            src_port: 0,
            dest_port: 0,
            ty: ProxyPacketType::IccidReq,
            payload: Bytes::new(),
        }
    }

    pub fn iccid(iccid: &str) -> Self {
        Self {
            src_port: 0,
            dest_port: 0,
            ty: ProxyPacketType::Iccid,
            payload: Bytes::copy_from_slice(iccid.as_bytes()),
        }
    }

    pub fn stream_key(&self) -> (u16, u16) {
        (self.src_port, self.dest_port)
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.src_port);
        buf.put_u16(self.dest_port);
        buf.put_u8(self.ty.to_u8());
        buf.put_u16(self.payload.len() as u16);
        buf.extend_from_slice(&self.payload);
    }

    /// Decodes one packet from `buf`, advancing it past the consumed bytes.
    /// Returns `Err(Incomplete)` without consuming anything if the buffer
    /// doesn't yet hold a full frame.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        if buf.remaining() < HEADER_LEN {
            return Err(CodecError::Incomplete {
                needed: HEADER_LEN,
                have: buf.remaining(),
            });
        }
        let header = buf.chunk()[..HEADER_LEN].to_vec();
        let mut header = &header[..];
        let src_port = header.get_u16();
        let dest_port = header.get_u16();
        let ty_byte = header.get_u8();
        let payload_length = header.get_u16() as usize;

        if buf.remaining() < HEADER_LEN + payload_length {
            return Err(CodecError::Incomplete {
                needed: HEADER_LEN + payload_length,
                have: buf.remaining(),
            });
        }

        let ty = ProxyPacketType::from_u8(ty_byte)?;
        buf.advance(HEADER_LEN);
        let payload = buf.copy_to_bytes(payload_length);

        Ok(Self {
            src_port,
            dest_port,
            ty,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(pkt: &ProxyPacket) -> ProxyPacket {
        let mut buf = BytesMut::new();
        pkt.encode(&mut buf);
        let mut reader = buf.freeze();
        ProxyPacket::decode(&mut reader).expect("decode should succeed")
    }

    #[test]
    fn connect_round_trips() {
        let pkt = ProxyPacket::connect(1234, 80);
        assert_eq!(round_trip(&pkt), pkt);
    }

    #[test]
    fn passthrough_with_payload_round_trips() {
        let pkt = ProxyPacket::passthrough(1234, 80, Bytes::from_static(b"hello tunnel"));
        assert_eq!(round_trip(&pkt), pkt);
    }

    #[test]
    fn iccid_round_trips() {
        let pkt = ProxyPacket::iccid("89014103211118510720");
        assert_eq!(round_trip(&pkt), pkt);
    }

    #[test]
    fn decode_reports_incomplete_without_consuming() {
        let mut buf = BytesMut::new();
        buf.put_u16(1);
        let mut reader = buf.freeze();
        let remaining_before = reader.remaining();
        let err = ProxyPacket::decode(&mut reader).unwrap_err();
        assert!(matches!(err, CodecError::Incomplete { .. }));
        assert_eq!(reader.remaining(), remaining_before);
    }

    #[test]
    fn decode_rejects_unknown_type() {
        let mut buf = BytesMut::new();
        buf.put_u16(0);
        buf.put_u16(0);
        buf.put_u8(0xFF);
        buf.put_u16(0);
        let mut reader = buf.freeze();
        assert_eq!(
            ProxyPacket::decode(&mut reader).unwrap_err(),
            CodecError::UnknownType(0xFF)
        );
    }

    #[test]
    fn two_frames_back_to_back_decode_independently() {
        let a = ProxyPacket::ping();
        let b = ProxyPacket::passthrough(1, 2, Bytes::from_static(b"x"));
        let mut buf = BytesMut::new();
        a.encode(&mut buf);
        b.encode(&mut buf);
        let mut reader = buf.freeze();
        assert_eq!(ProxyPacket::decode(&mut reader).unwrap(), a);
        assert_eq!(ProxyPacket::decode(&mut reader).unwrap(), b);
    }
}
