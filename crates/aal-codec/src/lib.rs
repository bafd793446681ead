//! Wire codecs for the RUDICS tunnel (`proxy`) and the CASES instrument link.

pub mod instrument;
pub mod proxy;

pub use instrument::{InstrumentPacket, InstrumentType};
pub use proxy::{ProxyPacket, ProxyPacketType};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer too short: need at least {needed} bytes, have {have}")]
    Incomplete { needed: usize, have: usize },
    #[error("invalid sync bytes")]
    BadSync,
    #[error("unknown packet type {0:#x}")]
    UnknownType(u8),
    #[error("length {len} invalid for packet type {ty:#x}")]
    BadLength { ty: u8, len: usize },
    #[error("checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    BadChecksum { expected: u16, actual: u16 },
}
